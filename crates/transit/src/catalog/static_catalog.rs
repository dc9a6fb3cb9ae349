//! In-memory line catalogue with spatial indices.
//!
//! Built once from static data and never mutated afterwards.

use std::collections::HashMap;
use std::sync::Arc;

use rstar::RTree;

use crate::identifiers::*;
use crate::models::{Coordinate, Line, Result, TransitError};
use crate::spatial::index::{LineSegmentNode, StopNode};
use crate::spatial::queries::search_radius_degrees;

/// Read-only catalogue of lines.
///
/// This type is cheap to clone since all data is stored in `Arc`s.
#[derive(Clone)]
pub struct StaticCatalog {
    // Core data, in load order
    lines: Vec<Arc<Line>>,

    // Lookup map
    line_map: HashMap<LineIdentifier, Arc<Line>>,

    // Spatial indices
    stop_tree: RTree<StopNode>,
    segment_tree: RTree<LineSegmentNode>,
}

impl StaticCatalog {
    /// Create a new empty catalogue
    pub fn new() -> Self {
        Self {
            lines: Vec::new(),
            line_map: HashMap::new(),
            stop_tree: RTree::new(),
            segment_tree: RTree::new(),
        }
    }

    /// Build a catalogue from lines, validating each one.
    pub fn from_lines(lines: Vec<Line>) -> Result<Self> {
        let mut line_map = HashMap::with_capacity(lines.len());
        let mut arcs = Vec::with_capacity(lines.len());

        for line in lines {
            line.validate()?;

            let line = Arc::new(line);
            if line_map.insert(line.id.clone(), line.clone()).is_some() {
                return Err(TransitError::InvalidData(format!(
                    "Duplicate line id: {}",
                    line.id
                )));
            }
            arcs.push(line);
        }

        // Build spatial indices
        let stop_tree = RTree::bulk_load(
            arcs.iter()
                .flat_map(|line| (0..line.stops.len()).map(move |i| StopNode::new(line.clone(), i)))
                .collect(),
        );

        let segment_tree = RTree::bulk_load(
            arcs.iter()
                .flat_map(|line| {
                    line.stops.windows(2).flat_map(move |pair| {
                        LineSegmentNode::for_hop(line.clone(), pair[0].coordinate, pair[1].coordinate)
                    })
                })
                .collect(),
        );

        tracing::debug!(
            lines = arcs.len(),
            stops = stop_tree.size(),
            "built transit catalogue"
        );

        Ok(Self {
            lines: arcs,
            line_map,
            stop_tree,
            segment_tree,
        })
    }

    pub fn lines(&self) -> &[Arc<Line>] {
        &self.lines
    }

    pub fn get_line(&self, id: &LineIdentifier) -> Option<&Arc<Line>> {
        self.line_map.get(id)
    }

    pub fn line(&self, id: &LineIdentifier) -> Result<&Arc<Line>> {
        self.get_line(id)
            .ok_or_else(|| TransitError::LineNotFound(id.clone()))
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// Stop nodes that may lie within `radius_m` of `origin`.
    ///
    /// This is the coarse R-tree stage; callers apply the Haversine filter.
    /// A node may be returned twice when the query wraps the antimeridian.
    pub(crate) fn stop_candidates(&self, origin: Coordinate, radius_m: f64) -> Vec<&StopNode> {
        let radius_deg = search_radius_degrees(origin, radius_m);

        query_points(origin, radius_deg)
            .into_iter()
            .flat_map(|point| {
                self.stop_tree
                    .locate_within_distance(point, radius_deg * radius_deg)
            })
            .collect()
    }

    /// Segment nodes that may lie within `radius_m` of `origin`.
    pub(crate) fn segment_candidates(&self, origin: Coordinate, radius_m: f64) -> Vec<&LineSegmentNode> {
        let radius_deg = search_radius_degrees(origin, radius_m);

        query_points(origin, radius_deg)
            .into_iter()
            .flat_map(|point| {
                self.segment_tree
                    .locate_within_distance(point, radius_deg * radius_deg)
            })
            .collect()
    }

    /// Stop nodes in increasing Euclidean degree distance from `point`
    /// (`[lng, lat]`, possibly a mirror image outside `[-180, 180]`).
    pub(crate) fn stops_by_proximity(&self, point: [f64; 2]) -> impl Iterator<Item = &StopNode> + '_ {
        self.stop_tree.nearest_neighbor_iter(&point)
    }
}

impl Default for StaticCatalog {
    fn default() -> Self {
        Self::new()
    }
}

/// The origin plus its mirror images when the search circle crosses the
/// antimeridian.
fn query_points(origin: Coordinate, radius_deg: f64) -> Vec<[f64; 2]> {
    let mut points = vec![[origin.lng, origin.lat]];

    if origin.lng + radius_deg > 180.0 {
        points.push([origin.lng - 360.0, origin.lat]);
    }
    if origin.lng - radius_deg < -180.0 {
        points.push([origin.lng + 360.0, origin.lat]);
    }

    points
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Frequency, ServiceWindow, Stop};

    fn line(id: &str, stops: Vec<(&str, f64, f64)>) -> Line {
        Line {
            id: LineIdentifier::new(id),
            display_number: LineNumber::new(id),
            name: format!("Line {id}").into(),
            color: "#43A047".into(),
            frequency: Frequency::new(10, 15),
            service_window: ServiceWindow::new(360, 1320),
            stops: stops
                .into_iter()
                .map(|(name, lat, lng)| Stop::new(name, Coordinate { lat, lng }))
                .collect(),
        }
    }

    #[test]
    fn test_empty_catalog() {
        let catalog = StaticCatalog::new();
        assert!(catalog.is_empty());
        assert!(catalog
            .stop_candidates(Coordinate { lat: 0.0, lng: 0.0 }, 1000.0)
            .is_empty());
    }

    #[test]
    fn test_catalog_lookups() {
        let catalog = StaticCatalog::from_lines(vec![
            line("1", vec![("A", 0.0, 0.0), ("B", 0.0, 0.01)]),
            line("2", vec![("C", 1.0, 1.0), ("D", 1.0, 1.01)]),
        ])
        .unwrap();

        assert_eq!(catalog.len(), 2);
        assert!(catalog.get_line(&LineIdentifier::new("2")).is_some());
        assert!(matches!(
            catalog.line(&LineIdentifier::new("9")),
            Err(TransitError::LineNotFound(_))
        ));
    }

    #[test]
    fn test_rejects_invalid_lines() {
        let duplicate = StaticCatalog::from_lines(vec![
            line("1", vec![("A", 0.0, 0.0), ("B", 0.0, 0.01)]),
            line("1", vec![("C", 1.0, 1.0), ("D", 1.0, 1.01)]),
        ]);
        assert!(matches!(duplicate, Err(TransitError::InvalidData(_))));

        let too_short = StaticCatalog::from_lines(vec![line("1", vec![("A", 0.0, 0.0)])]);
        assert!(too_short.is_err());
    }

    #[test]
    fn test_candidates_wrap_antimeridian() {
        let catalog = StaticCatalog::from_lines(vec![line(
            "dateline",
            vec![("East", 0.0, 179.9995), ("Far", 0.0, 170.0)],
        )])
        .unwrap();

        let origin = Coordinate { lat: 0.0, lng: -179.9995 };
        let found: Vec<_> = catalog
            .stop_candidates(origin, 500.0)
            .into_iter()
            .map(|node| node.stop().name.to_string())
            .collect();

        assert_eq!(found, vec!["East".to_string()]);
    }
}
