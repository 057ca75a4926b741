//! # Route Progress
//!
//! Live progress tracking of a journey along a route.
//!
//! This library provides:
//! - Progress computation by projecting a position onto a route polyline
//! - Off-route detection with throttled re-routing
//! - A journey state machine driven by live, injected or simulated positions
//!
//! ## Features
//!
//! - **`http`** - Directions/geocoding client for a Google-style HTTP API
//! - **`synthetic`** - Scripted providers and position sources for tests and demos
//! - **`full`** - Enable all features
//!
//! ## Quick Start
//!
//! ```rust
//! use route_progress::{compute_progress, GpsPoint, Route};
//!
//! // A route as returned by a routing provider: encoded overview polyline,
//! // road distance in meters and duration in seconds
//! let route = Route::from_encoded("_p~iF~ps|U_ulLnnqC_mqNvxq`@", 1_000_000.0, 36_000.0).unwrap();
//!
//! let sample = compute_progress(&GpsPoint::new(40.7, -120.95), &route);
//! println!(
//!     "{:.1}% complete, {:.1} km to go, off route: {}",
//!     sample.progress_percent, sample.distance_remaining_km, sample.is_off_route
//! );
//! assert!(!sample.is_off_route);
//! ```

use serde::{Deserialize, Serialize};

// Unified error handling
pub mod error;
pub use error::{OptionExt, Result, TrackingError};

// Geographic utilities (distance, interpolation, projection)
pub mod geo_utils;

// Encoded polyline codec
pub mod polyline;
pub use polyline::{decode_polyline, encode_polyline};

// Route model
pub mod route;
pub use route::Route;

// Position failures
pub mod position;
pub use position::{PositionError, PositionErrorCode};

// Tunable thresholds and position options
pub mod config;
pub use config::{AccuracyMode, PositionOptions, TrackingConfig};

// Progress engine
pub mod progress;
pub use progress::{
    compute_progress, compute_progress_with, straight_line_progress, ProgressSample,
    ProgressSource, ProgressThresholds,
};

// Routing, geocoding and positioning interfaces
pub mod providers;
pub use providers::{Geocoder, PermissionState, PositionSource, RouteProvider};

// Re-route throttling
pub mod reroute;
pub use reroute::{RerouteOutcome, RerouteThrottle};

// Session tasks: position watch, simulated journey, place lookup
pub mod simulation;
pub use simulation::simulated_positions;

// Journey state machine
pub mod journey;
pub use journey::{
    JourneyState, JourneyTracker, JourneyUpdate, PositionKind, PositionUpdate, QuickSetTarget,
    TrackingMode,
};

// Algorithm toolbox - standalone access to the pure algorithms
// Use route_progress::algorithms::{...} without the tracker
pub mod algorithms;

// HTTP client for directions and reverse geocoding
#[cfg(feature = "http")]
pub mod http;

#[cfg(feature = "http")]
pub use http::DirectionsClient;

// Deterministic collaborators for tests and demos
#[cfg(any(test, feature = "synthetic"))]
pub mod synthetic;

// ============================================================================
// Core Types
// ============================================================================

/// A GPS coordinate with latitude and longitude.
///
/// # Example
/// ```
/// use route_progress::GpsPoint;
/// let point = GpsPoint::new(51.5074, -0.1278); // London
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GpsPoint {
    pub latitude: f64,
    pub longitude: f64,
}

impl GpsPoint {
    /// Create a new GPS point.
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }

    /// Check if the point has valid coordinates.
    pub fn is_valid(&self) -> bool {
        self.latitude.is_finite()
            && self.longitude.is_finite()
            && self.latitude >= -90.0
            && self.latitude <= 90.0
            && self.longitude >= -180.0
            && self.longitude <= 180.0
    }
}
