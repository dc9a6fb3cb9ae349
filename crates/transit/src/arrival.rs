//! Simulated arrival estimates.
//!
//! Vehicles are not tracked, so an estimate is drawn from the line's
//! published frequency: a rider turning up at a random moment lands at a
//! uniformly random phase of the headway. Estimates are random variables,
//! never exact predictions.

use chrono::{Local, NaiveDateTime};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use crate::models::{minute_of_day, Frequency, LineSummary, ServiceWindow};
use crate::proximity::NearbyStop;

// ============================================================================
// Clock
// ============================================================================

/// Source of local wall-clock time.
pub trait Clock: Send + Sync {
    fn now(&self) -> NaiveDateTime;

    fn minute_of_day(&self) -> u16 {
        minute_of_day(self.now().time())
    }
}

/// The device's local time.
#[derive(Clone, Copy, Debug, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> NaiveDateTime {
        Local::now().naive_local()
    }
}

/// A clock stuck at one instant.
#[derive(Clone, Copy, Debug)]
pub struct FixedClock(pub NaiveDateTime);

impl Clock for FixedClock {
    fn now(&self) -> NaiveDateTime {
        self.0
    }
}

impl<C: Clock + ?Sized> Clock for &C {
    fn now(&self) -> NaiveDateTime {
        (**self).now()
    }
}

// ============================================================================
// Arrival models
// ============================================================================

/// `start ≤ now ≤ end`, both boundaries inclusive.
pub fn is_in_service(window: ServiceWindow, now_minute_of_day: u16) -> bool {
    window.contains(now_minute_of_day)
}

fn jitter<R: Rng + ?Sized>(frequency: Frequency, rng: &mut R) -> f64 {
    let half = frequency.spread() / 2.0;
    if half > 0.0 {
        rng.random_range(-half..=half)
    } else {
        0.0
    }
}

/// Minutes until the next vehicle for a rider arriving at a random phase
/// of the headway: `round(avg/2 + U(-spread/2, spread/2))`, at least 1.
///
/// Always within `[1, max_minutes]`.
pub fn estimate_next_arrival<R: Rng + ?Sized>(frequency: Frequency, rng: &mut R) -> u32 {
    let minutes = frequency.average() / 2.0 + jitter(frequency, rng);
    minutes.round().max(1.0) as u32
}

/// Minutes a planner should budget for boarding: one full headway,
/// `round(avg + U(-spread/2, spread/2))`, at least 1.
///
/// Always within `[min_minutes, max_minutes]`, and exact when the
/// frequency is fixed.
pub fn estimate_boarding_wait<R: Rng + ?Sized>(frequency: Frequency, rng: &mut R) -> u32 {
    let minutes = frequency.average() + jitter(frequency, rng);
    minutes.round().max(1.0) as u32
}

/// Which arrival model to draw from.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WaitModel {
    /// [`estimate_next_arrival`]
    Phase,
    /// [`estimate_boarding_wait`]
    #[default]
    Headway,
}

impl WaitModel {
    pub fn sample<R: Rng + ?Sized>(self, frequency: Frequency, rng: &mut R) -> u32 {
        match self {
            WaitModel::Phase => estimate_next_arrival(frequency, rng),
            WaitModel::Headway => estimate_boarding_wait(frequency, rng),
        }
    }
}

// ============================================================================
// Estimator
// ============================================================================

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ArrivalEstimate {
    Due { minutes: u32 },
    OutOfService,
}

impl ArrivalEstimate {
    pub fn minutes(&self) -> Option<u32> {
        match self {
            ArrivalEstimate::Due { minutes } => Some(*minutes),
            ArrivalEstimate::OutOfService => None,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct LineArrival {
    pub line: LineSummary,
    pub estimate: ArrivalEstimate,
}

/// Draws arrival estimates from an injected random source and clock.
pub struct ArrivalEstimator<R, C> {
    rng: R,
    clock: C,
}

impl ArrivalEstimator<StdRng, SystemClock> {
    /// Entropy-seeded estimator on the local clock.
    pub fn system() -> Self {
        Self::new(StdRng::from_os_rng(), SystemClock)
    }
}

impl<C: Clock> ArrivalEstimator<StdRng, C> {
    /// Reproducible estimator, mainly for tests.
    pub fn seeded(seed: u64, clock: C) -> Self {
        Self::new(StdRng::seed_from_u64(seed), clock)
    }
}

impl<R: Rng, C: Clock> ArrivalEstimator<R, C> {
    pub fn new(rng: R, clock: C) -> Self {
        Self { rng, clock }
    }

    pub fn clock(&self) -> &C {
        &self.clock
    }

    pub fn is_line_in_service(&self, line: &LineSummary) -> bool {
        is_in_service(line.service_window, self.clock.minute_of_day())
    }

    /// Next-arrival estimate for display. Never a number for a line that is
    /// not running.
    pub fn estimate(&mut self, line: &LineSummary) -> ArrivalEstimate {
        self.estimate_with(line, WaitModel::Phase)
    }

    pub fn estimate_with(&mut self, line: &LineSummary, model: WaitModel) -> ArrivalEstimate {
        if !self.is_line_in_service(line) {
            return ArrivalEstimate::OutOfService;
        }

        ArrivalEstimate::Due {
            minutes: model.sample(line.frequency, &mut self.rng),
        }
    }

    /// Estimates for every line serving a stop.
    pub fn arrivals_at(&mut self, stop: &NearbyStop) -> Vec<LineArrival> {
        stop.lines
            .iter()
            .map(|line| LineArrival {
                line: line.clone(),
                estimate: self.estimate(line),
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identifiers::{LineIdentifier, LineNumber};
    use crate::models::{Coordinate, Stop};
    use chrono::NaiveDate;

    fn at(hour: u32, minute: u32) -> FixedClock {
        FixedClock(
            NaiveDate::from_ymd_opt(2024, 5, 6)
                .unwrap()
                .and_hms_opt(hour, minute, 0)
                .unwrap(),
        )
    }

    fn summary(frequency: Frequency) -> LineSummary {
        LineSummary {
            id: LineIdentifier::new("l7"),
            display_number: LineNumber::new("7"),
            name: "Stazione - Università".into(),
            color: "#8E24AA".into(),
            frequency,
            service_window: ServiceWindow::new(360, 1320),
        }
    }

    #[test]
    fn test_service_window_is_inclusive() {
        let window = ServiceWindow::new(360, 1320);
        assert!(is_in_service(window, 360));
        assert!(is_in_service(window, 1320));
        assert!(is_in_service(window, 720));
        assert!(!is_in_service(window, 359));
        assert!(!is_in_service(window, 1321));
    }

    #[test]
    fn test_next_arrival_bounds() {
        let mut rng = StdRng::seed_from_u64(7);
        let frequency = Frequency::new(10, 15);

        for _ in 0..1000 {
            let minutes = estimate_next_arrival(frequency, &mut rng);
            assert!((1..=15).contains(&minutes), "out of range: {minutes}");
        }
    }

    #[test]
    fn test_next_arrival_never_zero() {
        let mut rng = StdRng::seed_from_u64(1);
        for _ in 0..100 {
            assert_eq!(estimate_next_arrival(Frequency::new(1, 1), &mut rng), 1);
        }
    }

    #[test]
    fn test_fixed_frequency_is_deterministic() {
        let mut rng = StdRng::seed_from_u64(3);
        assert_eq!(estimate_next_arrival(Frequency::new(10, 10), &mut rng), 5);
        assert_eq!(estimate_boarding_wait(Frequency::new(10, 10), &mut rng), 10);
    }

    #[test]
    fn test_boarding_wait_bounds() {
        let mut rng = StdRng::seed_from_u64(11);
        for _ in 0..1000 {
            let minutes = estimate_boarding_wait(Frequency::new(8, 20), &mut rng);
            assert!((8..=20).contains(&minutes));
        }
    }

    #[test]
    fn test_out_of_service_has_no_minutes() {
        let line = summary(Frequency::new(10, 15));

        let mut night = ArrivalEstimator::seeded(5, at(23, 30));
        assert_eq!(night.estimate(&line), ArrivalEstimate::OutOfService);
        assert_eq!(night.estimate(&line).minutes(), None);

        let mut morning = ArrivalEstimator::seeded(5, at(6, 0));
        assert!(morning.estimate(&line).minutes().is_some());
    }

    #[test]
    fn test_arrivals_at_stop() {
        let stop = NearbyStop {
            stop: Stop::new("Duomo", Coordinate { lat: 45.0, lng: 9.0 }),
            distance_meters: 40.0,
            lines: vec![summary(Frequency::new(6, 6))],
        };

        let mut estimator = ArrivalEstimator::seeded(9, at(12, 0));
        let arrivals = estimator.arrivals_at(&stop);

        assert_eq!(arrivals.len(), 1);
        assert_eq!(arrivals[0].estimate, ArrivalEstimate::Due { minutes: 3 });
    }

    #[test]
    fn test_estimate_serializes_with_status() {
        let json = serde_json::to_value(ArrivalEstimate::Due { minutes: 4 }).unwrap();
        assert_eq!(json, serde_json::json!({ "status": "due", "minutes": 4 }));

        let json = serde_json::to_value(ArrivalEstimate::OutOfService).unwrap();
        assert_eq!(json, serde_json::json!({ "status": "out_of_service" }));
    }
}
