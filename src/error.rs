//! Unified error handling for the route-progress library.
//!
//! Every fallible operation in the crate returns [`TrackingError`]. Transient
//! position failures during tracking are not errors at this level; they are
//! counted and reported through journey updates instead.

use std::fmt;

use crate::position::PositionError;

/// Unified error type for route-progress operations.
#[derive(Debug, Clone, PartialEq)]
pub enum TrackingError {
    /// No positioning capability exists on this device
    GeolocationUnsupported,
    /// The position permission check reported denial
    PermissionDenied,
    /// The one-shot position fix failed
    Position(PositionError),
    /// The routing provider found no route or failed
    RouteUnavailable { message: String },
    /// A route violates the route model invariants
    InvalidRoute { message: String },
    /// An encoded polyline could not be decoded or encoded
    PolylineDecode { message: String },
    /// The operation needs an active journey
    NotTracking,
    /// Simulation needs both origin and destination
    SimulationUnavailable,
    /// Configuration error
    ConfigError { message: String },
    /// HTTP/API error
    HttpError {
        message: String,
        status_code: Option<u16>,
    },
    /// Generic internal error
    Internal { message: String },
}

impl fmt::Display for TrackingError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TrackingError::GeolocationUnsupported => write!(f, "Geolocation not supported"),
            TrackingError::PermissionDenied => write!(
                f,
                "Location permission denied. Please enable location access and try again."
            ),
            TrackingError::Position(err) => write!(f, "{}", err.user_message()),
            TrackingError::RouteUnavailable { message } => {
                write!(f, "Route unavailable: {}", message)
            }
            TrackingError::InvalidRoute { message } => write!(f, "Invalid route: {}", message),
            TrackingError::PolylineDecode { message } => {
                write!(f, "Polyline error: {}", message)
            }
            TrackingError::NotTracking => write!(f, "No journey is being tracked"),
            TrackingError::SimulationUnavailable => {
                write!(f, "Simulation requires an origin and a destination")
            }
            TrackingError::ConfigError { message } => {
                write!(f, "Configuration error: {}", message)
            }
            TrackingError::HttpError {
                message,
                status_code,
            } => {
                if let Some(code) = status_code {
                    write!(f, "HTTP error ({}): {}", code, message)
                } else {
                    write!(f, "HTTP error: {}", message)
                }
            }
            TrackingError::Internal { message } => write!(f, "Internal error: {}", message),
        }
    }
}

impl std::error::Error for TrackingError {}

impl From<PositionError> for TrackingError {
    fn from(err: PositionError) -> Self {
        if err.is_permission_denied() {
            TrackingError::PermissionDenied
        } else {
            TrackingError::Position(err)
        }
    }
}

/// Result type alias for route-progress operations.
pub type Result<T> = std::result::Result<T, TrackingError>;

/// Extension trait for converting Option to TrackingError.
pub trait OptionExt<T> {
    /// Convert Option to Result with an unavailable-route error.
    fn ok_or_route_unavailable(self, message: &str) -> Result<T>;
}

impl<T> OptionExt<T> for Option<T> {
    fn ok_or_route_unavailable(self, message: &str) -> Result<T> {
        self.ok_or_else(|| TrackingError::RouteUnavailable {
            message: message.to_string(),
        })
    }
}
