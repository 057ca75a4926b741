//! Route model: the immutable result of a routing query.

use serde::Serialize;

use crate::error::{Result, TrackingError};
use crate::geo_utils::{haversine_distance, polyline_length};
use crate::polyline::{decode_polyline, encode_polyline};
use crate::GpsPoint;

/// A route between an origin and a destination.
///
/// The decoded path always holds at least 2 points and is never mutated.
/// A re-route replaces the whole value.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Route {
    path: Vec<GpsPoint>,
    /// Encoding returned by the provider, kept verbatim
    encoded: String,
    /// Total distance in meters
    total_distance_m: f64,
    /// Total duration in seconds
    total_duration_s: f64,
}

impl Route {
    /// Build a route from an already decoded path and its provider encoding.
    pub fn new(
        path: Vec<GpsPoint>,
        encoded: impl Into<String>,
        total_distance_m: f64,
        total_duration_s: f64,
    ) -> Result<Self> {
        if path.len() < 2 {
            return Err(TrackingError::InvalidRoute {
                message: format!("path has {} points, minimum 2 required", path.len()),
            });
        }
        if let Some(bad) = path.iter().find(|p| !p.is_valid()) {
            return Err(TrackingError::InvalidRoute {
                message: format!(
                    "invalid coordinate ({}, {})",
                    bad.latitude, bad.longitude
                ),
            });
        }
        if !total_distance_m.is_finite() || total_distance_m <= 0.0 {
            return Err(TrackingError::InvalidRoute {
                message: format!("total distance must be positive, got {}", total_distance_m),
            });
        }
        if !total_duration_s.is_finite() || total_duration_s < 0.0 {
            return Err(TrackingError::InvalidRoute {
                message: format!("total duration must be >= 0, got {}", total_duration_s),
            });
        }

        Ok(Self {
            path,
            encoded: encoded.into(),
            total_distance_m,
            total_duration_s,
        })
    }

    /// Build a route from the provider's encoded polyline.
    pub fn from_encoded(
        encoded: impl Into<String>,
        total_distance_m: f64,
        total_duration_s: f64,
    ) -> Result<Self> {
        let encoded = encoded.into();
        let path = decode_polyline(&encoded)?;
        Self::new(path, encoded, total_distance_m, total_duration_s)
    }

    /// Build a route from a path, encoding it locally.
    pub fn from_path(
        path: Vec<GpsPoint>,
        total_distance_m: f64,
        total_duration_s: f64,
    ) -> Result<Self> {
        let encoded = encode_polyline(&path)?;
        Self::new(path, encoded, total_distance_m, total_duration_s)
    }

    /// Two-point route along the great circle, with no duration estimate.
    pub fn straight_line(origin: GpsPoint, destination: GpsPoint) -> Result<Self> {
        let distance = haversine_distance(&origin, &destination);
        Self::from_path(vec![origin, destination], distance, 0.0)
    }

    pub fn path(&self) -> &[GpsPoint] {
        &self.path
    }

    pub fn encoded(&self) -> &str {
        &self.encoded
    }

    pub fn total_distance_m(&self) -> f64 {
        self.total_distance_m
    }

    pub fn total_duration_s(&self) -> f64 {
        self.total_duration_s
    }

    /// First path point (approximately the origin).
    pub fn start(&self) -> GpsPoint {
        self.path[0]
    }

    /// Last path point (approximately the destination).
    pub fn end(&self) -> GpsPoint {
        self.path[self.path.len() - 1]
    }

    /// Geometric length of the decoded path in meters.
    ///
    /// Usually differs slightly from `total_distance_m`, which is the
    /// provider's road distance.
    pub fn path_length_m(&self) -> f64 {
        polyline_length(&self.path)
    }
}
