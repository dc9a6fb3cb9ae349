//! Cumulative trip statistics.

use std::collections::BTreeMap;

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

/// CO2 a bus trip saves compared with driving the same distance.
pub const CO2_SAVED_KG_PER_KM: f64 = 0.08;

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct MonthlyBucket {
    pub trips: u32,
    pub distance_km: f64,
    pub time_minutes: f64,
    pub co2_saved_kg: f64,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TripStatistics {
    pub total_trips: u32,
    pub total_distance_km: f64,
    pub total_time_minutes: f64,
    pub co2_saved_kg: f64,
    /// Keyed by "YYYY-MM"
    pub monthly: BTreeMap<String, MonthlyBucket>,
    pub last_updated: Option<NaiveDateTime>,
}

impl TripStatistics {
    /// Add one completed trip at local time `now`.
    pub fn record(&mut self, distance_km: f64, duration_minutes: f64, now: NaiveDateTime) {
        let co2 = distance_km * CO2_SAVED_KG_PER_KM;

        self.total_trips += 1;
        self.total_distance_km += distance_km;
        self.total_time_minutes += duration_minutes;
        self.co2_saved_kg += co2;

        let bucket = self.monthly.entry(month_key(now)).or_default();
        bucket.trips += 1;
        bucket.distance_km += distance_km;
        bucket.time_minutes += duration_minutes;
        bucket.co2_saved_kg += co2;

        self.last_updated = Some(now);
    }

    pub fn month(&self, now: NaiveDateTime) -> Option<&MonthlyBucket> {
        self.monthly.get(&month_key(now))
    }
}

pub fn month_key(at: NaiveDateTime) -> String {
    at.format("%Y-%m").to_string()
}
