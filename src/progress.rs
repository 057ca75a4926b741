//! Progress engine: percent complete, remaining distance and off-route
//! detection for a position against a [`Route`].
//!
//! The authoritative method projects the position onto the route polyline.
//! A straight-line estimate exists only as a degraded mode for when no route
//! is available at all; every sample carries a [`ProgressSource`] tag so
//! callers can tell the two apart.

use serde::{Deserialize, Serialize};

use crate::config::TrackingConfig;
use crate::geo_utils::{great_circle_distance_km, project_onto_polyline};
use crate::route::Route;
use crate::GpsPoint;

/// Which method produced a [`ProgressSample`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProgressSource {
    /// Projection onto the route polyline
    RouteProjection,
    /// Great-circle distance to the destination; no route geometry involved
    StraightLineFallback,
}

/// Progress derived from a single position.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ProgressSample {
    /// Percent of the total distance traveled, clamped to [0, 100]
    pub progress_percent: f64,
    /// Meters traveled, within [0, total distance]
    pub distance_traveled_m: f64,
    /// Kilometers left; exactly 0 once under the near-arrival snap
    pub distance_remaining_km: f64,
    pub is_off_route: bool,
    /// Meters between the position and the route. Always 0 for the fallback.
    pub distance_from_route_m: f64,
    pub source: ProgressSource,
}

impl ProgressSample {
    /// Whether this sample counts as having reached the destination.
    pub fn is_arrival(&self, config: &TrackingConfig) -> bool {
        self.progress_percent >= config.arrival_percent
            || self.distance_remaining_km < config.arrival_distance_km
    }
}

/// Thresholds used by the route-projection method.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProgressThresholds {
    /// Default: 50.0 meters
    pub off_route_threshold_m: f64,
    /// Default: 0.1 km
    pub near_arrival_snap_km: f64,
}

impl Default for ProgressThresholds {
    fn default() -> Self {
        Self::from(&TrackingConfig::default())
    }
}

impl From<&TrackingConfig> for ProgressThresholds {
    fn from(config: &TrackingConfig) -> Self {
        Self {
            off_route_threshold_m: config.off_route_threshold_m,
            near_arrival_snap_km: config.near_arrival_snap_km,
        }
    }
}

/// Compute progress along a route with the default thresholds.
///
/// # Example
/// ```
/// use route_progress::{compute_progress, GpsPoint, Route};
///
/// let route = Route::from_path(
///     vec![GpsPoint::new(0.0, 0.0), GpsPoint::new(0.0, 1.0)],
///     111_320.0,
///     4_000.0,
/// ).unwrap();
///
/// let sample = compute_progress(&GpsPoint::new(0.0, 0.5), &route);
/// assert!((sample.progress_percent - 50.0).abs() < 0.1);
/// assert!(!sample.is_off_route);
/// ```
pub fn compute_progress(position: &GpsPoint, route: &Route) -> ProgressSample {
    compute_progress_with(position, route, &ProgressThresholds::default())
}

/// Compute progress along a route.
///
/// Deterministic: identical inputs always give identical output.
pub fn compute_progress_with(
    position: &GpsPoint,
    route: &Route,
    thresholds: &ProgressThresholds,
) -> ProgressSample {
    let total_m = route.total_distance_m();

    let Some(projection) = project_onto_polyline(position, route.path()) else {
        // Route guarantees 2+ points; keep a sane answer regardless
        return straight_line_progress(position, &route.end(), total_m);
    };

    let distance_from_route_m = projection.distance_from_route_m;
    let is_off_route = distance_from_route_m > thresholds.off_route_threshold_m;

    let distance_traveled_m = (projection.distance_along_route_km * 1000.0).clamp(0.0, total_m);

    let progress_percent = (distance_traveled_m / total_m * 100.0).clamp(0.0, 100.0);

    let raw_remaining_km = (total_m - distance_traveled_m) / 1000.0;
    let distance_remaining_km = if raw_remaining_km < thresholds.near_arrival_snap_km {
        0.0
    } else {
        raw_remaining_km
    }
    .max(0.0);

    ProgressSample {
        progress_percent,
        distance_traveled_m,
        distance_remaining_km,
        is_off_route,
        distance_from_route_m,
        source: ProgressSource::RouteProjection,
    }
}

/// Degraded estimate from the straight-line distance to the destination.
///
/// Only meaningful when no route geometry is available.
pub fn straight_line_progress(
    position: &GpsPoint,
    destination: &GpsPoint,
    total_distance_m: f64,
) -> ProgressSample {
    let remaining_km = great_circle_distance_km(position, destination).max(0.0);

    let (progress_percent, distance_traveled_m) = if total_distance_m > 0.0 {
        let traveled = total_distance_m - remaining_km * 1000.0;
        (
            (traveled / total_distance_m * 100.0).clamp(0.0, 100.0),
            traveled.clamp(0.0, total_distance_m),
        )
    } else {
        (0.0, 0.0)
    };

    ProgressSample {
        progress_percent,
        distance_traveled_m,
        distance_remaining_km: remaining_km,
        is_off_route: false,
        distance_from_route_m: 0.0,
        source: ProgressSource::StraightLineFallback,
    }
}
