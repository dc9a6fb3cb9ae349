//! Core data types for the transit catalogue.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::identifiers::*;
use crate::models::schedule::{Frequency, ServiceWindow};

// ============================================================================
// Coordinates
// ============================================================================

/// A WGS84 position in degrees.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Coordinate {
    pub lat: f64,
    pub lng: f64,
}

impl Coordinate {
    /// Build a coordinate, rejecting anything outside the WGS84 range.
    pub fn new(lat: f64, lng: f64) -> Result<Self> {
        let coordinate = Self { lat, lng };
        coordinate.validate()?;
        Ok(coordinate)
    }

    pub fn validate(&self) -> Result<()> {
        let lat_ok = self.lat.is_finite() && (-90.0..=90.0).contains(&self.lat);
        let lng_ok = self.lng.is_finite() && (-180.0..=180.0).contains(&self.lng);

        if lat_ok && lng_ok {
            Ok(())
        } else {
            Err(TransitError::InvalidCoordinate {
                lat: self.lat,
                lng: self.lng,
            })
        }
    }

    /// `geo` uses x = longitude, y = latitude.
    pub fn to_point(self) -> geo::Point {
        geo::Point::new(self.lng, self.lat)
    }

    pub fn key(&self) -> StopKey {
        StopKey::from(*self)
    }
}

/// Canonical identity of a physical stop: its exact coordinate.
///
/// Two differently-named stops sharing a coordinate are indistinguishable.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StopKey {
    lat_bits: u64,
    lng_bits: u64,
}

impl From<Coordinate> for StopKey {
    fn from(c: Coordinate) -> Self {
        // -0.0 and 0.0 compare equal, so they must share a key
        fn canonical(v: f64) -> u64 {
            if v == 0.0 { 0.0f64.to_bits() } else { v.to_bits() }
        }

        Self {
            lat_bits: canonical(c.lat),
            lng_bits: canonical(c.lng),
        }
    }
}

// ============================================================================
// Catalogue entities
// ============================================================================

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Stop {
    pub name: Arc<str>,
    pub coordinate: Coordinate,
}

impl Stop {
    pub fn new(name: impl AsRef<str>, coordinate: Coordinate) -> Self {
        Self {
            name: name.as_ref().into(),
            coordinate,
        }
    }

    pub fn key(&self) -> StopKey {
        self.coordinate.key()
    }
}

/// A bus line: an ordered list of stops run at a published frequency.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Line {
    pub id: LineIdentifier,
    pub display_number: LineNumber,
    pub name: Arc<str>,
    /// Hex RGB, e.g. "#E53935"
    pub color: Arc<str>,
    pub frequency: Frequency,
    pub service_window: ServiceWindow,
    pub stops: Vec<Stop>,
}

impl Line {
    /// Check the structural invariants of a catalogue line.
    pub fn validate(&self) -> Result<()> {
        if self.stops.len() < 2 {
            return Err(TransitError::InvalidData(format!(
                "Line {} has {} stops, at least 2 are required",
                self.id,
                self.stops.len()
            )));
        }

        self.frequency
            .validate()
            .map_err(|reason| TransitError::InvalidData(format!("Line {}: {}", self.id, reason)))?;
        self.service_window
            .validate()
            .map_err(|reason| TransitError::InvalidData(format!("Line {}: {}", self.id, reason)))?;

        for stop in &self.stops {
            stop.coordinate.validate().map_err(|_| {
                TransitError::InvalidData(format!(
                    "Line {}: stop '{}' has an invalid coordinate ({}, {})",
                    self.id, stop.name, stop.coordinate.lat, stop.coordinate.lng
                ))
            })?;
        }

        Ok(())
    }

    pub fn summary(&self) -> LineSummary {
        LineSummary {
            id: self.id.clone(),
            display_number: self.display_number.clone(),
            name: self.name.clone(),
            color: self.color.clone(),
            frequency: self.frequency,
            service_window: self.service_window,
        }
    }
}

/// The parts of a [`Line`] needed for display and arrival estimation.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LineSummary {
    pub id: LineIdentifier,
    pub display_number: LineNumber,
    pub name: Arc<str>,
    pub color: Arc<str>,
    pub frequency: Frequency,
    pub service_window: ServiceWindow,
}

// ============================================================================
// Errors
// ============================================================================

#[derive(Debug, thiserror::Error)]
pub enum TransitError {
    #[error("Invalid coordinate: lat {lat}, lng {lng}")]
    InvalidCoordinate { lat: f64, lng: f64 },

    #[error("Invalid radius: {0} meters")]
    InvalidRadius(f64),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Line not found: {0}")]
    LineNotFound(LineIdentifier),

    #[error("Invalid data: {0}")]
    InvalidData(String),

    #[error("Serialization error: {0}")]
    SerializationError(String),
}

pub type Result<T> = std::result::Result<T, TransitError>;
