//! Nearby-stop queries.
//!
//! Every line carries its own copy of each stop it serves, so a physical
//! stop shows up once per line in the catalogue. Queries collapse those
//! copies by exact coordinate ([`StopKey`]) and report each serving line
//! once. Two differently-named stops at the same coordinate are treated as
//! one physical stop.

use std::collections::{HashMap, HashSet};

use serde::Serialize;

use crate::catalog::StaticCatalog;
use crate::models::{Coordinate, LineSummary, Result, Stop, StopKey, TransitError};
use crate::spatial::index::StopNode;
use crate::spatial::queries::{haversine_distance, haversine_distance_to_segment};

/// A physical stop near a query point.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct NearbyStop {
    pub stop: Stop,
    pub distance_meters: f64,
    /// Every line serving the stop, ordered by display number ("2" before "10")
    pub lines: Vec<LineSummary>,
}

impl NearbyStop {
    pub fn serves(&self, line: &LineSummary) -> bool {
        self.lines.iter().any(|l| l.id == line.id)
    }
}

/// A line whose path passes near a query point.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct NearbyLine {
    pub line: LineSummary,
    pub distance_meters: f64,
}

/// Groups per-line stop nodes into physical stops.
#[derive(Default)]
struct StopCollector {
    stops: HashMap<StopKey, NearbyStop>,
}

impl StopCollector {
    fn add(&mut self, node: &StopNode, distance_meters: f64) {
        let stop = node.stop();
        let entry = self.stops.entry(stop.key()).or_insert_with(|| NearbyStop {
            stop: stop.clone(),
            distance_meters,
            lines: Vec::new(),
        });

        // Keep the lexically smallest name so the result does not depend on
        // R-tree iteration order
        if stop.name < entry.stop.name {
            entry.stop.name = stop.name.clone();
        }

        if !entry.lines.iter().any(|l| l.id == node.line.id) {
            entry.lines.push(node.line.summary());
        }
    }

    /// Nearest first, ties broken by stop name.
    fn into_sorted(self) -> Vec<NearbyStop> {
        let mut stops: Vec<_> = self.stops.into_values().collect();

        for stop in &mut stops {
            stop.lines.sort_by(|a, b| {
                a.display_number
                    .cmp(&b.display_number)
                    .then_with(|| a.id.cmp(&b.id))
            });
        }

        stops.sort_by(|a, b| {
            a.distance_meters
                .total_cmp(&b.distance_meters)
                .then_with(|| a.stop.name.cmp(&b.stop.name))
        });
        stops
    }
}

fn check_radius(radius_meters: f64) -> Result<()> {
    if radius_meters.is_finite() {
        Ok(())
    } else {
        Err(TransitError::InvalidRadius(radius_meters))
    }
}

/// Find every physical stop within `radius_meters` of `origin`.
///
/// A radius of zero matches only stops exactly at the origin; a negative
/// radius matches nothing.
pub fn find_nearby_stops(
    catalog: &StaticCatalog,
    origin: Coordinate,
    radius_meters: f64,
) -> Result<Vec<NearbyStop>> {
    origin.validate()?;
    check_radius(radius_meters)?;

    if radius_meters < 0.0 {
        return Ok(Vec::new());
    }

    let mut collector = StopCollector::default();

    // The coarse stage needs a non-degenerate circle even for radius 0
    for node in catalog.stop_candidates(origin, radius_meters.max(1.0)) {
        let distance = haversine_distance(origin, node.stop().coordinate);
        if distance <= radius_meters {
            collector.add(node, distance);
        }
    }

    let stops = collector.into_sorted();
    tracing::debug!(
        lat = origin.lat,
        lng = origin.lng,
        radius_meters,
        found = stops.len(),
        "nearby stop query"
    );

    Ok(stops)
}

/// The `n` closest physical stops to `origin`, regardless of distance.
///
/// Candidates are picked in lng/lat degree order, from the origin and from
/// its image across the antimeridian, which matches Haversine order except
/// for near-ties at high latitudes; the result itself is sorted by
/// Haversine distance.
pub fn nearest_stops(catalog: &StaticCatalog, origin: Coordinate, n: usize) -> Result<Vec<NearbyStop>> {
    origin.validate()?;

    if n == 0 {
        return Ok(Vec::new());
    }

    // The image on the side of the antimeridian closest to the origin
    let mirror = if origin.lng < 0.0 { origin.lng + 360.0 } else { origin.lng - 360.0 };

    let mut collector = StopCollector::default();
    for point in [[origin.lng, origin.lat], [mirror, origin.lat]] {
        for node in nearest_from(catalog, point, n) {
            collector.add(node, haversine_distance(origin, node.stop().coordinate));
        }
    }

    let mut stops = collector.into_sorted();
    stops.truncate(n);
    Ok(stops)
}

/// Nodes of the first `n` physical stops in degree order from `point`,
/// including every line at each of them.
fn nearest_from(catalog: &StaticCatalog, point: [f64; 2], n: usize) -> Vec<&StopNode> {
    let mut seen = HashSet::new();
    let mut nodes = Vec::new();
    let mut cutoff: Option<f64> = None;

    for node in catalog.stops_by_proximity(point) {
        let key = node.stop().key();

        if !seen.contains(&key) {
            if seen.len() == n {
                // Other lines at the last admitted stop share its exact
                // distance; anything farther is done
                match cutoff {
                    Some(d) if rstar::PointDistance::distance_2(node, &point) <= d => continue,
                    _ => break,
                }
            }
            if seen.len() + 1 == n {
                cutoff = Some(rstar::PointDistance::distance_2(node, &point));
            }
            seen.insert(key);
        }

        nodes.push(node);
    }

    nodes
}

/// Lines whose stop-to-stop path passes within `radius_meters` of `origin`,
/// nearest first.
pub fn lines_near(catalog: &StaticCatalog, origin: Coordinate, radius_meters: f64) -> Result<Vec<NearbyLine>> {
    origin.validate()?;
    check_radius(radius_meters)?;

    if radius_meters < 0.0 {
        return Ok(Vec::new());
    }

    let mut best: HashMap<_, NearbyLine> = HashMap::new();

    for node in catalog.segment_candidates(origin, radius_meters.max(1.0)) {
        let distance = haversine_distance_to_segment(origin, node.start, node.end);
        if distance > radius_meters {
            continue;
        }

        best.entry(node.line.id.clone())
            .and_modify(|nearby| nearby.distance_meters = nearby.distance_meters.min(distance))
            .or_insert_with(|| NearbyLine {
                line: node.line.summary(),
                distance_meters: distance,
            });
    }

    let mut lines: Vec<_> = best.into_values().collect();
    lines.sort_by(|a, b| {
        a.distance_meters
            .total_cmp(&b.distance_meters)
            .then_with(|| a.line.display_number.cmp(&b.line.display_number))
    });

    Ok(lines)
}
