//! Interfaces to the external collaborators: routing, geocoding and positioning.
//!
//! The tracker only depends on these traits. Methods return boxed futures and
//! streams so the traits stay object-safe and can be shared as `Arc<dyn _>`
//! with background tasks.

use futures::future::BoxFuture;
use futures::stream::BoxStream;
use serde::{Deserialize, Serialize};

use crate::config::PositionOptions;
use crate::error::Result;
use crate::position::PositionError;
use crate::route::Route;
use crate::GpsPoint;

/// Outcome of a position permission query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PermissionState {
    Granted,
    Denied,
    /// Not yet decided, or the platform cannot tell
    Unknown,
}

/// Fetches a route for an origin/destination pair.
pub trait RouteProvider: Send + Sync {
    /// Fails with [`TrackingError::RouteUnavailable`](crate::TrackingError::RouteUnavailable)
    /// when no route exists, or with any other error when the provider fails.
    fn fetch_route(&self, origin: GpsPoint, destination: GpsPoint) -> BoxFuture<'_, Result<Route>>;
}

/// Resolves coordinates to a short human-readable place name.
pub trait Geocoder: Send + Sync {
    /// `None` when nothing was found; lookups never fail the caller.
    fn reverse_geocode(&self, point: GpsPoint) -> BoxFuture<'_, Option<String>>;
}

/// Device positioning.
pub trait PositionSource: Send + Sync {
    /// Whether the device has any positioning capability.
    fn is_supported(&self) -> bool {
        true
    }

    /// Current permission state. Sources without a permission model report `Unknown`.
    fn check_permission(&self) -> BoxFuture<'_, PermissionState>;

    /// One-shot position fix.
    fn current_position(
        &self,
        options: &PositionOptions,
    ) -> BoxFuture<'_, std::result::Result<GpsPoint, PositionError>>;

    /// Continuous position watch. Errors are per-emission and do not end the
    /// stream; dropping the stream cancels the watch.
    fn watch_position(
        &self,
        options: &PositionOptions,
    ) -> BoxStream<'static, std::result::Result<GpsPoint, PositionError>>;
}

/// Shorten a formatted address to its first two comma-separated components.
///
/// "10 Downing St, London SW1A 2AA, UK" becomes "10 Downing St, London SW1A 2AA".
pub fn short_place_name(formatted_address: &str) -> Option<String> {
    let trimmed = formatted_address.trim();
    if trimmed.is_empty() {
        return None;
    }
    let short = trimmed.split(',').take(2).collect::<Vec<_>>().join(",");
    if short.is_empty() {
        Some(trimmed.to_string())
    } else {
        Some(short)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_short_place_name() {
        assert_eq!(
            short_place_name("10 Downing St, London SW1A 2AA, UK").as_deref(),
            Some("10 Downing St, London SW1A 2AA")
        );
        assert_eq!(short_place_name("Paris").as_deref(), Some("Paris"));
        assert_eq!(short_place_name("   "), None);
    }
}
