//! Spatial indexing and distance utilities.

pub mod index;
pub mod queries;

pub use queries::{haversine_distance, haversine_distance_km, haversine_distance_to_segment};
