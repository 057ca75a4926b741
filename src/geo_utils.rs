//! Geographic utilities: great-circle distance, polyline length and
//! projection of a position onto a route polyline.
//!
//! All functions are pure. Coordinates are WGS84 degrees.

use geo::Coord;
use serde::{Deserialize, Serialize};

use crate::GpsPoint;

/// Mean Earth radius in meters.
pub const EARTH_RADIUS_M: f64 = 6_371_000.0;

/// Two candidate projections closer than this (meters) count as a tie.
const PROJECTION_TIE_EPSILON_M: f64 = 1e-6;

/// Haversine distance between two points in meters.
pub fn haversine_distance(p1: &GpsPoint, p2: &GpsPoint) -> f64 {
    let lat1 = p1.latitude.to_radians();
    let lat2 = p2.latitude.to_radians();
    let dlat = (p2.latitude - p1.latitude).to_radians();
    let dlng = (p2.longitude - p1.longitude).to_radians();

    let a = (dlat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (dlng / 2.0).sin().powi(2);
    let c = 2.0 * a.sqrt().atan2((1.0 - a).sqrt());

    EARTH_RADIUS_M * c
}

/// Great-circle distance between two points in kilometers.
///
/// # Example
/// ```
/// use route_progress::GpsPoint;
/// use route_progress::geo_utils::great_circle_distance_km;
///
/// let london = GpsPoint::new(51.5074, -0.1278);
/// assert_eq!(great_circle_distance_km(&london, &london), 0.0);
/// ```
pub fn great_circle_distance_km(a: &GpsPoint, b: &GpsPoint) -> f64 {
    haversine_distance(a, b) / 1000.0
}

/// Total length of a polyline in meters.
pub fn polyline_length(points: &[GpsPoint]) -> f64 {
    points
        .windows(2)
        .map(|w| haversine_distance(&w[0], &w[1]))
        .sum()
}

/// Linear interpolation in lat/lng space. `fraction` 0 gives `from`, 1 gives `to`.
pub fn interpolate(from: &GpsPoint, to: &GpsPoint, fraction: f64) -> GpsPoint {
    if fraction <= 0.0 {
        return *from;
    }
    if fraction >= 1.0 {
        return *to;
    }
    GpsPoint::new(
        from.latitude + (to.latitude - from.latitude) * fraction,
        from.longitude + (to.longitude - from.longitude) * fraction,
    )
}

/// Result of projecting a position onto a polyline.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Projection {
    /// Closest point lying on the polyline
    pub point: GpsPoint,
    /// Index of the segment (start vertex) holding the closest point
    pub segment_index: usize,
    /// Distance from the position to the closest point, in meters
    pub distance_from_route_m: f64,
    /// Path length from the first vertex to the closest point, in kilometers
    pub distance_along_route_km: f64,
    /// `distance_along_route` divided by the total path length, in [0, 1]
    pub fraction_along_route: f64,
}

/// Project a position onto the nearest segment of a polyline.
///
/// The closest point may lie anywhere on a segment, not only on a vertex.
/// When two segments are equally close the earlier one along the path wins,
/// so progress never jumps ahead on routes that cross themselves.
///
/// Returns `None` if the polyline has fewer than 2 points.
///
/// # Example
/// ```
/// use route_progress::GpsPoint;
/// use route_progress::geo_utils::project_onto_polyline;
///
/// let path = vec![GpsPoint::new(0.0, 0.0), GpsPoint::new(0.0, 1.0)];
/// let projection = project_onto_polyline(&GpsPoint::new(0.0, 0.5), &path).unwrap();
/// assert!(projection.distance_from_route_m < 1e-6);
/// assert!((projection.fraction_along_route - 0.5).abs() < 1e-9);
/// ```
pub fn project_onto_polyline(point: &GpsPoint, path: &[GpsPoint]) -> Option<Projection> {
    if path.len() < 2 {
        return None;
    }

    let mut best: Option<Projection> = None;
    let mut cumulative_m = 0.0;

    for (i, segment) in path.windows(2).enumerate() {
        let a = &segment[0];
        let b = &segment[1];

        let projected = closest_point_on_segment(point, a, b);
        let distance_m = haversine_distance(point, &projected);
        let along_m = cumulative_m + haversine_distance(a, &projected);

        let is_better = match &best {
            Some(prev) => distance_m + PROJECTION_TIE_EPSILON_M < prev.distance_from_route_m,
            None => true,
        };

        if is_better {
            best = Some(Projection {
                point: projected,
                segment_index: i,
                distance_from_route_m: distance_m,
                distance_along_route_km: along_m / 1000.0,
                fraction_along_route: 0.0,
            });
        }

        cumulative_m += haversine_distance(a, b);
    }

    best.map(|mut projection| {
        projection.fraction_along_route = if cumulative_m > 0.0 {
            (projection.distance_along_route_km * 1000.0 / cumulative_m).clamp(0.0, 1.0)
        } else {
            0.0
        };
        projection
    })
}

/// Closest point to `p` on segment `a`-`b`.
///
/// Works in an equirectangular plane scaled by the cosine of the segment's
/// mid latitude, which is accurate for the short segments of a road polyline.
fn closest_point_on_segment(p: &GpsPoint, a: &GpsPoint, b: &GpsPoint) -> GpsPoint {
    let cos_lat = ((a.latitude + b.latitude) / 2.0).to_radians().cos();

    let origin = scaled(a, cos_lat);
    let direction = scaled(b, cos_lat) - origin;
    let offset = scaled(p, cos_lat) - origin;

    let length_sq = direction.x * direction.x + direction.y * direction.y;
    if length_sq < 1e-20 {
        // Degenerate segment
        return *a;
    }

    let t = (offset.x * direction.x + offset.y * direction.y) / length_sq;
    interpolate(a, b, t)
}

fn scaled(p: &GpsPoint, cos_lat: f64) -> Coord<f64> {
    Coord {
        x: p.longitude * cos_lat,
        y: p.latitude,
    }
}
