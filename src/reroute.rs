//! Re-route throttling.
//!
//! Off-route positions arrive every second or so while the agent is away from
//! the route. Each one would otherwise trigger a routing request, so fetches
//! are limited to one per window measured from the last successful refetch.

use std::time::Duration;

use serde::Serialize;
use tokio::time::Instant;

/// What a re-route request did.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum RerouteOutcome {
    /// A fresh route replaced the current one
    Rerouted,
    /// Skipped; a successful refetch happened less than one window ago
    Throttled { retry_in: Duration },
    /// The provider failed; the previous route stays in use
    Failed { message: String },
    /// No journey is active
    NotTracking,
}

/// Minimum time gap between successful re-route fetches.
#[derive(Debug, Clone)]
pub struct RerouteThrottle {
    window: Duration,
    last_success: Option<Instant>,
}

impl RerouteThrottle {
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            last_success: None,
        }
    }

    /// Whether a fetch may start now. `force` bypasses the window.
    pub fn permits(&self, force: bool) -> bool {
        force || self.retry_in().is_none()
    }

    /// Time left until the window reopens, or `None` if it is open.
    pub fn retry_in(&self) -> Option<Duration> {
        let last = self.last_success?;
        let elapsed = last.elapsed();
        if elapsed >= self.window {
            None
        } else {
            Some(self.window - elapsed)
        }
    }

    pub fn record_success(&mut self) {
        self.last_success = Some(Instant::now());
    }

    pub fn reset(&mut self) {
        self.last_success = None;
    }

    pub fn last_success(&self) -> Option<Instant> {
        self.last_success
    }
}
