//! Catalogue data models and errors.

pub mod schedule;
pub mod types;

// Re-exports for convenience
pub use schedule::{minute_of_day, Frequency, ServiceWindow};
pub use types::{Coordinate, Line, LineSummary, Result, Stop, StopKey, TransitError};
