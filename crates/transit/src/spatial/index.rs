//! R-tree nodes for spatial indexing.
//!
//! Wraps catalogue stops and stop-to-stop segments with their lng/lat
//! geometry.
//!
//! ## Two-Stage Filtering
//!
//! The spatial queries use a two-stage filtering approach:
//! 1. **R-tree filter**: Euclidean distance in degree space with a radius
//!    from [`search_radius_degrees`](super::queries::search_radius_degrees),
//!    which over-approximates the walking circle
//! 2. **Haversine filter**: exact geodesic distance on the survivors
//!
//! Callers only ever see Haversine distances.

use std::sync::Arc;

use rstar::{PointDistance, RTreeObject, AABB};

use crate::models::{Coordinate, Line, Stop};
use crate::spatial::queries::unwrap_longitude;

// ============================================================================
// Stop Spatial Node
// ============================================================================

/// One stop of one line. A physical stop served by several lines has one
/// node per line.
#[derive(Clone)]
pub struct StopNode {
    pub line: Arc<Line>,
    pub stop_index: usize,
    point: [f64; 2],
}

impl StopNode {
    pub fn new(line: Arc<Line>, stop_index: usize) -> Self {
        let coordinate = line.stops[stop_index].coordinate;
        Self {
            line,
            stop_index,
            point: [coordinate.lng, coordinate.lat],
        }
    }

    pub fn stop(&self) -> &Stop {
        &self.line.stops[self.stop_index]
    }
}

impl RTreeObject for StopNode {
    type Envelope = AABB<[f64; 2]>;

    fn envelope(&self) -> Self::Envelope {
        AABB::from_point(self.point)
    }
}

impl PointDistance for StopNode {
    fn distance_2(&self, point: &[f64; 2]) -> f64 {
        let dx = self.point[0] - point[0];
        let dy = self.point[1] - point[1];
        dx * dx + dy * dy
    }
}

// ============================================================================
// Line Segment Spatial Node
// ============================================================================

/// The straight hop between two consecutive stops of a line.
///
/// `start` and `end` are in one longitude frame: `end.lng` is within 180°
/// of `start.lng`, and may lie outside `[-180, 180]` for a hop across the
/// antimeridian.
#[derive(Clone)]
pub struct LineSegmentNode {
    pub line: Arc<Line>,
    pub start: Coordinate,
    pub end: Coordinate,
    aabb: AABB<[f64; 2]>,
}

impl LineSegmentNode {
    /// The hop drawn in `start`'s frame.
    pub fn new(line: Arc<Line>, start: Coordinate, end: Coordinate) -> Self {
        let end = Coordinate {
            lat: end.lat,
            lng: unwrap_longitude(end.lng, start.lng),
        };
        let aabb = AABB::from_corners([start.lng, start.lat], [end.lng, end.lat]);

        Self {
            line,
            start,
            end,
            aabb,
        }
    }

    /// Index nodes covering the hop. A hop across the antimeridian sticks
    /// out of `[-180, 180]` in either frame, so it is drawn in both.
    pub fn for_hop(line: Arc<Line>, start: Coordinate, end: Coordinate) -> Vec<Self> {
        let forward = Self::new(line.clone(), start, end);
        if forward.end.lng == end.lng {
            return vec![forward];
        }

        let shifted_start = Coordinate {
            lat: start.lat,
            lng: unwrap_longitude(start.lng, end.lng),
        };
        vec![forward, Self::new(line, shifted_start, end)]
    }
}

impl RTreeObject for LineSegmentNode {
    type Envelope = AABB<[f64; 2]>;

    fn envelope(&self) -> Self::Envelope {
        self.aabb
    }
}

impl PointDistance for LineSegmentNode {
    fn distance_2(&self, point: &[f64; 2]) -> f64 {
        // Squared Euclidean distance from point to segment
        let p = [point[0], point[1]];
        let a = [self.start.lng, self.start.lat];
        let b = [self.end.lng, self.end.lat];

        let ab = [b[0] - a[0], b[1] - a[1]];
        let ap = [p[0] - a[0], p[1] - a[1]];

        let ab_ab = ab[0] * ab[0] + ab[1] * ab[1];

        if ab_ab == 0.0 {
            // Consecutive stops at the same spot
            return ap[0] * ap[0] + ap[1] * ap[1];
        }

        let ab_ap = ab[0] * ap[0] + ab[1] * ap[1];
        let t = (ab_ap / ab_ab).clamp(0.0, 1.0);

        let closest = [a[0] + t * ab[0], a[1] + t * ab[1]];
        let dx = p[0] - closest[0];
        let dy = p[1] - closest[1];

        dx * dx + dy * dy
    }
}
