//! Walk → bus → walk route planning.
//!
//! The search pairs every stop near the origin with every stop near the
//! destination and keeps the lines serving both. There are no transfers:
//! a route rides exactly one line. The bus leg is measured as the straight
//! line between the two stops, not along the line's stop sequence.
//!
//! The search itself ([`RoutePlanner::route_legs`]) is deterministic. Only
//! the wait at the boarding stop is drawn from the arrival model, so the
//! ranking of close candidates may change between calls with a random
//! estimator.

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::arrival::{ArrivalEstimate, ArrivalEstimator, Clock, WaitModel};
use crate::catalog::StaticCatalog;
use crate::identifiers::LineNumber;
use crate::models::{Coordinate, LineSummary, Result, Stop, TransitError};
use crate::proximity::{find_nearby_stops, NearbyStop};
use crate::spatial::queries::haversine_distance;

/// Tunable constants of the planner.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlannerConfig {
    /// Walking radius around both endpoints
    pub max_walk_meters: f64,
    /// 80 m/min ≈ 4.8 km/h
    pub walking_speed_m_per_min: f64,
    /// 250 m/min ≈ 15 km/h
    pub bus_speed_m_per_min: f64,
    pub kcal_per_walking_minute: f64,
    pub max_results: usize,
    pub wait_model: WaitModel,
}

impl Default for PlannerConfig {
    fn default() -> Self {
        Self {
            max_walk_meters: 500.0,
            walking_speed_m_per_min: 80.0,
            bus_speed_m_per_min: 250.0,
            kcal_per_walking_minute: 4.0,
            max_results: 3,
            wait_model: WaitModel::Headway,
        }
    }
}

impl PlannerConfig {
    pub fn validate(&self) -> Result<()> {
        if !(self.max_walk_meters.is_finite() && self.max_walk_meters > 0.0) {
            return Err(TransitError::InvalidRadius(self.max_walk_meters));
        }
        for (name, speed) in [
            ("walking speed", self.walking_speed_m_per_min),
            ("bus speed", self.bus_speed_m_per_min),
        ] {
            if !(speed.is_finite() && speed > 0.0) {
                return Err(TransitError::InvalidInput(format!("{name} must be positive, got {speed}")));
            }
        }
        if !(self.kcal_per_walking_minute.is_finite() && self.kcal_per_walking_minute >= 0.0) {
            return Err(TransitError::InvalidInput(format!(
                "kcal per walking minute must not be negative, got {}",
                self.kcal_per_walking_minute
            )));
        }
        Ok(())
    }
}

// ============================================================================
// Itinerary types
// ============================================================================

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum WalkTarget {
    Stop(Stop),
    Destination(Coordinate),
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Step {
    Walk {
        distance_meters: f64,
        duration_minutes: f64,
        to: WalkTarget,
    },
    Wait {
        duration_minutes: u32,
        line_number: LineNumber,
    },
    Bus {
        line: LineSummary,
        distance_meters: f64,
        duration_minutes: f64,
        from: Stop,
        to: Stop,
    },
}

/// The deterministic part of a candidate: where to walk and what to ride.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct RouteLeg {
    pub from_stop: Stop,
    pub to_stop: Stop,
    pub line: LineSummary,
    pub walk_to_stop_meters: f64,
    pub walk_from_stop_meters: f64,
    pub bus_distance_meters: f64,
    pub walk_time_minutes: f64,
    pub bus_time_minutes: f64,
}

/// One scored walk → wait → bus → walk itinerary.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct RouteCandidate {
    pub from_stop: Stop,
    pub to_stop: Stop,
    pub line: LineSummary,
    pub walk_to_stop_meters: f64,
    pub walk_from_stop_meters: f64,
    pub bus_distance_meters: f64,
    pub total_distance_meters: f64,
    pub total_time_minutes: f64,
    pub wait_time_minutes: u32,
    pub calories_burned: u32,
    pub steps: Vec<Step>,
}

// ============================================================================
// Planner
// ============================================================================

#[derive(Clone, Debug, Default)]
pub struct RoutePlanner {
    config: PlannerConfig,
}

impl RoutePlanner {
    pub fn new(config: PlannerConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &PlannerConfig {
        &self.config
    }

    /// Every single-line way of getting from `origin` to `destination`,
    /// before any waiting is accounted for. Pairs of one physical stop are
    /// skipped, as in [`plan_route`](Self::plan_route).
    pub fn route_legs(
        &self,
        catalog: &StaticCatalog,
        origin: Coordinate,
        destination: Coordinate,
    ) -> Result<Vec<RouteLeg>> {
        destination.validate()?;

        let origin_stops = find_nearby_stops(catalog, origin, self.config.max_walk_meters)?;
        if origin_stops.is_empty() {
            return Ok(Vec::new());
        }
        let destination_stops = find_nearby_stops(catalog, destination, self.config.max_walk_meters)?;

        let mut legs = Vec::new();
        for boarding in &origin_stops {
            for alighting in &destination_stops {
                // Riding from a stop to itself is not a route
                if boarding.stop.key() == alighting.stop.key() {
                    continue;
                }

                for line in shared_lines(boarding, alighting) {
                    legs.push(self.leg(boarding, alighting, line));
                }
            }
        }

        tracing::debug!(
            origin_stops = origin_stops.len(),
            destination_stops = destination_stops.len(),
            legs = legs.len(),
            "route search"
        );

        Ok(legs)
    }

    fn leg(&self, boarding: &NearbyStop, alighting: &NearbyStop, line: &LineSummary) -> RouteLeg {
        let walk_to = boarding.distance_meters;
        let walk_from = alighting.distance_meters;
        let bus_distance = haversine_distance(boarding.stop.coordinate, alighting.stop.coordinate);

        RouteLeg {
            from_stop: boarding.stop.clone(),
            to_stop: alighting.stop.clone(),
            line: line.clone(),
            walk_to_stop_meters: walk_to,
            walk_from_stop_meters: walk_from,
            bus_distance_meters: bus_distance,
            walk_time_minutes: (walk_to + walk_from) / self.config.walking_speed_m_per_min,
            bus_time_minutes: bus_distance / self.config.bus_speed_m_per_min,
        }
    }

    /// Best routes from `origin` to `destination`, fastest first.
    ///
    /// Every origin-side stop is paired with every destination-side stop,
    /// except a pair that is one physical stop (same coordinate): riding
    /// from a stop to itself is never offered. Lines that are not running
    /// at the estimator's current time are left out. An empty result means
    /// no single line connects the two points.
    pub fn plan_route<R: Rng, C: Clock>(
        &self,
        catalog: &StaticCatalog,
        origin: Coordinate,
        destination: Coordinate,
        estimator: &mut ArrivalEstimator<R, C>,
    ) -> Result<Vec<RouteCandidate>> {
        let legs = self.route_legs(catalog, origin, destination)?;

        let mut candidates: Vec<_> = legs
            .into_iter()
            .filter_map(|leg| match estimator.estimate_with(&leg.line, self.config.wait_model) {
                ArrivalEstimate::Due { minutes } => Some(self.candidate(leg, destination, minutes)),
                ArrivalEstimate::OutOfService => {
                    tracing::debug!(line = %leg.line.id, "skipping line out of service");
                    None
                }
            })
            .collect();

        candidates.sort_by(|a, b| a.total_time_minutes.total_cmp(&b.total_time_minutes));
        candidates.truncate(self.config.max_results);

        Ok(candidates)
    }

    fn candidate(&self, leg: RouteLeg, destination: Coordinate, wait_minutes: u32) -> RouteCandidate {
        let speed = self.config.walking_speed_m_per_min;
        let total_time = leg.walk_time_minutes + leg.bus_time_minutes + wait_minutes as f64;
        let calories = (leg.walk_time_minutes * self.config.kcal_per_walking_minute).round() as u32;

        let steps = vec![
            Step::Walk {
                distance_meters: leg.walk_to_stop_meters,
                duration_minutes: leg.walk_to_stop_meters / speed,
                to: WalkTarget::Stop(leg.from_stop.clone()),
            },
            Step::Wait {
                duration_minutes: wait_minutes,
                line_number: leg.line.display_number.clone(),
            },
            Step::Bus {
                line: leg.line.clone(),
                distance_meters: leg.bus_distance_meters,
                duration_minutes: leg.bus_time_minutes,
                from: leg.from_stop.clone(),
                to: leg.to_stop.clone(),
            },
            Step::Walk {
                distance_meters: leg.walk_from_stop_meters,
                duration_minutes: leg.walk_from_stop_meters / speed,
                to: WalkTarget::Destination(destination),
            },
        ];

        RouteCandidate {
            total_distance_meters: leg.walk_to_stop_meters
                + leg.bus_distance_meters
                + leg.walk_from_stop_meters,
            total_time_minutes: total_time,
            wait_time_minutes: wait_minutes,
            calories_burned: calories,
            steps,
            from_stop: leg.from_stop,
            to_stop: leg.to_stop,
            line: leg.line,
            walk_to_stop_meters: leg.walk_to_stop_meters,
            walk_from_stop_meters: leg.walk_from_stop_meters,
            bus_distance_meters: leg.bus_distance_meters,
        }
    }
}

/// Lines serving both stops, matched by id.
fn shared_lines<'a>(a: &'a NearbyStop, b: &'a NearbyStop) -> impl Iterator<Item = &'a LineSummary> {
    a.lines.iter().filter(move |line| b.serves(line))
}
