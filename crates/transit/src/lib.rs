//! # commute-transit
//!
//! Offline bus-line catalogue with proximity search and route planning.
//!
//! ## Features
//!
//! - **Static catalogue**: lines with ordered stops, published frequency and
//!   daily service hours, loaded once from JSON
//! - **Spatial queries**: R-tree pre-filter with exact Haversine distances
//! - **Arrival estimates**: simulated from the published frequency, with an
//!   injected random source and clock
//! - **Route planning**: single-line walk → bus → walk itineraries, ranked by
//!   total time
//!
//! ## Example
//!
//! ```
//! use commute_transit::prelude::*;
//!
//! let line = Line {
//!     id: LineIdentifier::new("l1"),
//!     display_number: LineNumber::new("1"),
//!     name: "Harbour - Station".into(),
//!     color: "#1E88E5".into(),
//!     frequency: Frequency::new(10, 15),
//!     service_window: ServiceWindow::new(360, 1320),
//!     stops: vec![
//!         Stop::new("Harbour", Coordinate::new(44.4056, 8.9463).unwrap()),
//!         Stop::new("Station", Coordinate::new(44.4183, 8.9260).unwrap()),
//!     ],
//! };
//!
//! let catalog = StaticCatalog::from_lines(vec![line]).unwrap();
//!
//! // Query stops
//! let here = Coordinate::new(44.4060, 8.9470).unwrap();
//! let nearby = find_nearby_stops(&catalog, here, 500.0).unwrap();
//! assert_eq!(nearby.len(), 1);
//! assert_eq!(nearby[0].stop.name.as_ref(), "Harbour");
//! ```

pub mod arrival;
pub mod catalog;
pub mod identifiers;
pub mod models;
pub mod planner;
pub mod proximity;
pub mod spatial;

// Re-exports for convenience
pub mod prelude {
    pub use crate::arrival::{
        estimate_boarding_wait, estimate_next_arrival, is_in_service, ArrivalEstimate,
        ArrivalEstimator, Clock, FixedClock, LineArrival, SystemClock, WaitModel,
    };
    pub use crate::catalog::{loader, StaticCatalog};
    pub use crate::identifiers::*;
    pub use crate::models::*;
    pub use crate::planner::{PlannerConfig, RouteCandidate, RouteLeg, RoutePlanner, Step, WalkTarget};
    pub use crate::proximity::{find_nearby_stops, lines_near, nearest_stops, NearbyLine, NearbyStop};
    pub use crate::spatial::{haversine_distance, haversine_distance_km};
}

pub use prelude::*;
