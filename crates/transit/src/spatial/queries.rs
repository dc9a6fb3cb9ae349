//! Distance calculations on the Earth's surface.
//!
//! Uses the Haversine formula with a spherical Earth of radius 6,371 km.
//! Every function documents the unit it returns.

use geo::{Closest, ClosestPoint, LineString};

use crate::models::Coordinate;

pub const EARTH_RADIUS_M: f64 = 6_371_000.0;
pub const EARTH_RADIUS_KM: f64 = 6_371.0;

/// Metres spanned by one degree of latitude on the sphere above.
pub const METERS_PER_DEGREE: f64 = EARTH_RADIUS_M * std::f64::consts::PI / 180.0;

fn central_angle(a: Coordinate, b: Coordinate) -> f64 {
    let lat1 = a.lat.to_radians();
    let lat2 = b.lat.to_radians();
    let delta_lat = (b.lat - a.lat).to_radians();
    let delta_lng = (b.lng - a.lng).to_radians();

    let h = (delta_lat / 2.0).sin().powi(2)
        + lat1.cos() * lat2.cos() * (delta_lng / 2.0).sin().powi(2);

    // Rounding can push h a hair above 1 for antipodal points
    2.0 * h.sqrt().min(1.0).asin()
}

/// Great-circle distance between two coordinates in meters.
pub fn haversine_distance(a: Coordinate, b: Coordinate) -> f64 {
    EARTH_RADIUS_M * central_angle(a, b)
}

/// Great-circle distance between two coordinates in kilometers.
pub fn haversine_distance_km(a: Coordinate, b: Coordinate) -> f64 {
    EARTH_RADIUS_KM * central_angle(a, b)
}

/// `lng` shifted by whole turns to lie within 180° of `reference`.
///
/// The result may fall outside `[-180, 180]`; Haversine does not mind.
pub fn unwrap_longitude(lng: f64, reference: f64) -> f64 {
    let mut lng = lng;
    while lng - reference > 180.0 {
        lng -= 360.0;
    }
    while lng - reference < -180.0 {
        lng += 360.0;
    }
    lng
}

/// Distance in meters from a point to the segment `start`-`end`.
///
/// The segment takes the short way round, so a hop across the antimeridian
/// stays a short hop. The closest point is found in lng/lat space and then
/// measured with Haversine, which is accurate enough for stop-to-stop
/// segments.
pub fn haversine_distance_to_segment(point: Coordinate, start: Coordinate, end: Coordinate) -> f64 {
    let end_lng = unwrap_longitude(end.lng, start.lng);
    let point = Coordinate {
        lat: point.lat,
        lng: unwrap_longitude(point.lng, (start.lng + end_lng) / 2.0),
    };
    let line_string = LineString::from(vec![(start.lng, start.lat), (end_lng, end.lat)]);

    match line_string.closest_point(&point.to_point()) {
        Closest::Intersection(p) | Closest::SinglePoint(p) => {
            haversine_distance(point, Coordinate { lat: p.y(), lng: p.x() })
        }
        Closest::Indeterminate => f64::INFINITY,
    }
}

/// Convert meters to degrees of latitude.
pub fn meters_to_degrees(meters: f64) -> f64 {
    meters / METERS_PER_DEGREE
}

/// Euclidean radius in lng/lat degrees that is guaranteed to contain every
/// point within `radius_m` meters of `origin`.
///
/// Longitude degrees shrink towards the poles, so the longitude span is
/// widened by the cosine of the most poleward latitude the circle reaches.
pub fn search_radius_degrees(origin: Coordinate, radius_m: f64) -> f64 {
    // asin(x) >= x, the margin covers the difference at walking distances
    const MARGIN: f64 = 1.1;

    let lat_span = meters_to_degrees(radius_m);
    let poleward = (origin.lat.abs() + lat_span).min(90.0);
    let cos = poleward.to_radians().cos();

    let lng_span = if cos < 1e-9 { 360.0 } else { (lat_span / cos).min(360.0) };

    lat_span.hypot(lng_span) * MARGIN
}
