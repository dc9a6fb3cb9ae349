//! The static line catalogue and its loader.

pub mod loader;
pub mod static_catalog;

pub use static_catalog::StaticCatalog;
