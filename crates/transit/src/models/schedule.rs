//! Published schedule of a line: how often it runs and during which hours.
//!
//! Lines are not tracked in real time, so the schedule is all there is to
//! reason about arrivals.

use chrono::{NaiveTime, Timelike};
use serde::{Deserialize, Serialize};

pub const MINUTES_PER_DAY: u16 = 24 * 60;

/// Published `[min, max]` minutes between consecutive vehicles.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Frequency {
    pub min_minutes: u16,
    pub max_minutes: u16,
}

impl Frequency {
    pub fn new(min_minutes: u16, max_minutes: u16) -> Self {
        Self {
            min_minutes,
            max_minutes,
        }
    }

    pub fn average(&self) -> f64 {
        (self.min_minutes as f64 + self.max_minutes as f64) / 2.0
    }

    pub fn spread(&self) -> f64 {
        self.max_minutes as f64 - self.min_minutes as f64
    }

    pub(crate) fn validate(&self) -> Result<(), String> {
        if self.min_minutes == 0 {
            return Err("frequency must be at least 1 minute".into());
        }
        if self.min_minutes > self.max_minutes {
            return Err(format!(
                "frequency min ({}) exceeds max ({})",
                self.min_minutes, self.max_minutes
            ));
        }
        Ok(())
    }
}

/// Daily operating hours as minutes since midnight.
///
/// Overnight service (end past midnight) is not modelled.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceWindow {
    pub start_minute_of_day: u16,
    pub end_minute_of_day: u16,
}

impl ServiceWindow {
    pub fn new(start_minute_of_day: u16, end_minute_of_day: u16) -> Self {
        Self {
            start_minute_of_day,
            end_minute_of_day,
        }
    }

    /// Build a window from wall-clock times, e.g. 06:00 to 22:00.
    pub fn between(start: NaiveTime, end: NaiveTime) -> Self {
        Self::new(minute_of_day(start), minute_of_day(end))
    }

    /// Both boundaries are inclusive.
    pub fn contains(&self, minute: u16) -> bool {
        self.start_minute_of_day <= minute && minute <= self.end_minute_of_day
    }

    pub(crate) fn validate(&self) -> Result<(), String> {
        if self.start_minute_of_day >= self.end_minute_of_day {
            return Err(format!(
                "service window start ({}) must be before end ({})",
                self.start_minute_of_day, self.end_minute_of_day
            ));
        }
        if self.end_minute_of_day > MINUTES_PER_DAY {
            return Err(format!(
                "service window end ({}) is past midnight",
                self.end_minute_of_day
            ));
        }
        Ok(())
    }
}

pub fn minute_of_day(time: NaiveTime) -> u16 {
    (time.hour() * 60 + time.minute()) as u16
}
