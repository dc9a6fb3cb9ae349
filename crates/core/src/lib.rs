//! Commuter-facing state on top of the transit engine.
//!
//! `commute-transit` answers questions about the network. This crate keeps
//! what belongs to the rider: trip statistics, points and badges,
//! favorites, saved routes and preferences, persisted through a
//! [`storage::KeyValueStore`]. It also hosts the async edges of the app,
//! acquiring a position and keeping a nearby-stop board fresh.

pub mod error;
pub mod geolocation;
pub mod ledger;
pub mod refresh;
pub mod storage;

// Re-export transit from the transit crate
pub use commute_transit as transit;

pub use error::{CoreError, Result};
pub use geolocation::{
    CancelHandle, CancelToken, Geolocator, LocationError, ManualLocation, cancel_pair, locate,
};
pub use ledger::TripLedger;
pub use refresh::{BoardEntry, LiveBoard, spawn_live_board};
pub use storage::{FileStore, KeyValueStore, MemoryStore, StorageError, StorageKey};
