//! Position failures reported by a [`PositionSource`](crate::providers::PositionSource).

use std::fmt;

use serde::{Deserialize, Serialize};

/// Failure code attached to a position fix or watch emission.
///
/// Numeric values follow the W3C geolocation codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PositionErrorCode {
    PermissionDenied,
    PositionUnavailable,
    Timeout,
    Unknown,
}

impl PositionErrorCode {
    /// Map a W3C geolocation error code (1, 2, 3) to a position error code.
    pub fn from_code(code: u16) -> Self {
        match code {
            1 => PositionErrorCode::PermissionDenied,
            2 => PositionErrorCode::PositionUnavailable,
            3 => PositionErrorCode::Timeout,
            _ => PositionErrorCode::Unknown,
        }
    }
}

/// A failed position fix.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PositionError {
    pub code: PositionErrorCode,
    /// Raw message from the position source, if it gave one
    pub message: Option<String>,
}

impl PositionError {
    pub fn new(code: PositionErrorCode) -> Self {
        Self {
            code,
            message: None,
        }
    }

    pub fn with_message(code: PositionErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: Some(message.into()),
        }
    }

    pub fn timeout() -> Self {
        Self::new(PositionErrorCode::Timeout)
    }

    pub fn is_permission_denied(&self) -> bool {
        self.code == PositionErrorCode::PermissionDenied
    }

    /// Human-readable message suitable for showing to the user.
    pub fn user_message(&self) -> String {
        match self.code {
            PositionErrorCode::PermissionDenied => {
                "Location permission denied. Please enable location access and try again."
                    .to_string()
            }
            PositionErrorCode::PositionUnavailable => {
                "Location unavailable. Please check your device settings and ensure location services are enabled."
                    .to_string()
            }
            PositionErrorCode::Timeout => "Location request timed out. Please try again.".to_string(),
            PositionErrorCode::Unknown => self
                .message
                .clone()
                .filter(|m| !m.is_empty())
                .unwrap_or_else(|| "Unknown location error".to_string()),
        }
    }
}

impl fmt::Display for PositionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.message {
            Some(message) => write!(f, "{:?}: {}", self.code, message),
            None => write!(f, "{:?}", self.code),
        }
    }
}

impl std::error::Error for PositionError {}
