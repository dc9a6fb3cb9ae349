//! The rider profile: preferences, earned badges and points.

use serde::{Deserialize, Serialize};

use crate::error::{CoreError, Result};
use crate::ledger::badges::Badge;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Preferences {
    pub search_radius_meters: f64,
    pub max_walk_meters: f64,
    pub refresh_interval_secs: u64,
}

impl Default for Preferences {
    fn default() -> Self {
        Self {
            search_radius_meters: 500.0,
            max_walk_meters: 500.0,
            refresh_interval_secs: 30,
        }
    }
}

impl Preferences {
    pub fn validate(&self) -> Result<()> {
        for (name, value) in [
            ("search radius", self.search_radius_meters),
            ("max walk", self.max_walk_meters),
        ] {
            if !(value.is_finite() && value > 0.0) {
                return Err(CoreError::InvalidInput(format!(
                    "{name} must be a positive number of meters, got {value}"
                )));
            }
        }
        if self.refresh_interval_secs == 0 {
            return Err(CoreError::InvalidInput(
                "refresh interval must be at least one second".into(),
            ));
        }
        Ok(())
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Profile {
    pub preferences: Preferences,
    pub badges: Vec<Badge>,
    pub points: u64,
}
