//! # Algorithm Toolbox
//!
//! Direct access to the pure algorithms behind the tracker. Use these to
//! compute progress or measure routes in your own systems without running a
//! [`JourneyTracker`](crate::JourneyTracker).
//!
//! ## Core Algorithms
//!
//! - **Progress**: route projection with off-route detection, plus the
//!   straight-line fallback
//! - **Simulation path**: evenly spaced positions from origin to destination
//!
//! ## Geographic Utilities
//!
//! - **Haversine Distance**: Great-circle distance between GPS points
//! - **Polyline Length**: Total distance along a path
//! - **Projection**: Nearest point on a polyline and distance along it
//! - **Polyline Codec**: Encoded polyline format, precision 5
//!
//! # Example
//!
//! ```rust
//! use route_progress::algorithms::{haversine_distance, project_onto_polyline, GpsPoint};
//!
//! // Compute distance between two points
//! let london = GpsPoint::new(51.5074, -0.1278);
//! let paris = GpsPoint::new(48.8566, 2.3522);
//! let distance = haversine_distance(&london, &paris);
//! println!("London to Paris: {:.0} km", distance / 1000.0);
//!
//! // Where along the London-Paris line is a point near Calais?
//! let calais = GpsPoint::new(50.95, 1.85);
//! let projection = project_onto_polyline(&calais, &[london, paris]).unwrap();
//! assert!(projection.fraction_along_route > 0.25 && projection.fraction_along_route < 0.5);
//! ```

// =============================================================================
// Core Types (re-exported from lib)
// =============================================================================

pub use crate::{GpsPoint, ProgressSample, ProgressSource, ProgressThresholds, Route};

// =============================================================================
// Geographic Utilities
// =============================================================================

pub use crate::geo_utils::{
    great_circle_distance_km, haversine_distance, interpolate, polyline_length,
    project_onto_polyline, Projection, EARTH_RADIUS_M,
};

pub use crate::polyline::{decode_polyline, encode_polyline, POLYLINE_PRECISION};

// =============================================================================
// Progress
// =============================================================================

pub use crate::progress::{compute_progress, compute_progress_with, straight_line_progress};

// =============================================================================
// Simulation
// =============================================================================

pub use crate::simulation::simulated_positions;
