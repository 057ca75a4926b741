//! Tracking configuration.
//!
//! All thresholds of the progress engine and journey state machine live in
//! [`TrackingConfig`]. Defaults match the values the tracker was tuned with;
//! partial JSON overrides are accepted through [`TrackingConfig::from_json`].

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Result, TrackingError};

/// Accuracy requested from the position source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AccuracyMode {
    High,
    Low,
}

/// Options passed to the position source for fixes and watches.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PositionOptions {
    /// Default: high
    pub accuracy: AccuracyMode,
    /// Maximum time to wait for a fix, in milliseconds.
    /// Default: 60000 (GPS acquisition can be slow)
    pub timeout_ms: u64,
    /// Maximum age of a cached fix the source may return, in milliseconds.
    /// Default: 30000
    pub maximum_age_ms: u64,
}

impl Default for PositionOptions {
    fn default() -> Self {
        Self {
            accuracy: AccuracyMode::High,
            timeout_ms: 60_000,
            maximum_age_ms: 30_000,
        }
    }
}

impl PositionOptions {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn maximum_age(&self) -> Duration {
        Duration::from_millis(self.maximum_age_ms)
    }
}

/// Configuration for progress computation, re-routing and simulation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackingConfig {
    pub position: PositionOptions,

    /// Distance from the route beyond which the agent is off-route (strictly greater).
    /// Default: 50.0 meters
    pub off_route_threshold_m: f64,

    /// Remaining distance below which it is reported as exactly zero.
    /// Default: 0.1 km
    pub near_arrival_snap_km: f64,

    /// Progress at or above which the destination counts as reached.
    /// Default: 99.5%
    pub arrival_percent: f64,

    /// Remaining distance below which the destination counts as reached.
    /// Default: 0.05 km
    pub arrival_distance_km: f64,

    /// Minimum gap between successful re-route fetches, unless forced.
    /// Default: 30 seconds
    pub reroute_throttle_secs: u64,

    /// Number of interpolation steps in a simulated journey.
    /// Default: 100
    pub simulation_steps: u32,

    /// Time between simulation steps in milliseconds.
    /// Default: 500
    pub simulation_interval_ms: u64,

    /// Log every Nth consecutive position failure.
    /// Default: 10
    pub error_log_frequency: u32,

    /// Show a position failure to the user once this many consecutive failures are exceeded.
    /// Default: 20
    pub error_display_threshold: u32,
}

impl Default for TrackingConfig {
    fn default() -> Self {
        Self {
            position: PositionOptions::default(),
            off_route_threshold_m: 50.0,
            near_arrival_snap_km: 0.1,
            arrival_percent: 99.5,
            arrival_distance_km: 0.05,
            reroute_throttle_secs: 30,
            simulation_steps: 100,
            simulation_interval_ms: 500,
            error_log_frequency: 10,
            error_display_threshold: 20,
        }
    }
}

impl TrackingConfig {
    /// Parse a (possibly partial) JSON config; missing fields take defaults.
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json).map_err(|e| TrackingError::ConfigError {
            message: format!("invalid config JSON: {}", e),
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Check that every threshold is usable.
    pub fn validate(&self) -> Result<()> {
        let fail = |message: &str| -> Result<()> {
            Err(TrackingError::ConfigError {
                message: message.to_string(),
            })
        };

        if !self.off_route_threshold_m.is_finite() || self.off_route_threshold_m < 0.0 {
            return fail("off_route_threshold_m must be a non-negative number");
        }
        if !self.near_arrival_snap_km.is_finite() || self.near_arrival_snap_km < 0.0 {
            return fail("near_arrival_snap_km must be a non-negative number");
        }
        if !(0.0..=100.0).contains(&self.arrival_percent) {
            return fail("arrival_percent must be within 0..=100");
        }
        if !self.arrival_distance_km.is_finite() || self.arrival_distance_km < 0.0 {
            return fail("arrival_distance_km must be a non-negative number");
        }
        if self.simulation_steps == 0 {
            return fail("simulation_steps must be at least 1");
        }
        if self.simulation_interval_ms == 0 {
            return fail("simulation_interval_ms must be at least 1");
        }
        if self.error_log_frequency == 0 {
            return fail("error_log_frequency must be at least 1");
        }
        Ok(())
    }

    pub fn reroute_throttle(&self) -> Duration {
        Duration::from_secs(self.reroute_throttle_secs)
    }

    pub fn simulation_interval(&self) -> Duration {
        Duration::from_millis(self.simulation_interval_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = TrackingConfig::default();
        assert_eq!(config.off_route_threshold_m, 50.0);
        assert_eq!(config.arrival_percent, 99.5);
        assert_eq!(config.arrival_distance_km, 0.05);
        assert_eq!(config.reroute_throttle(), Duration::from_secs(30));
        assert_eq!(config.simulation_steps, 100);
        assert_eq!(config.simulation_interval(), Duration::from_millis(500));
        assert_eq!(config.error_log_frequency, 10);
        assert_eq!(config.error_display_threshold, 20);
        assert_eq!(config.position.accuracy, AccuracyMode::High);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_json_override() {
        let config = TrackingConfig::from_json(
            r#"{"off_route_threshold_m": 75.0, "position": {"accuracy": "low"}}"#,
        )
        .unwrap();
        assert_eq!(config.off_route_threshold_m, 75.0);
        assert_eq!(config.position.accuracy, AccuracyMode::Low);
        assert_eq!(config.position.timeout_ms, 60_000);
        assert_eq!(config.simulation_steps, 100);
    }

    #[test]
    fn test_invalid_config_rejected() {
        assert!(matches!(
            TrackingConfig::from_json(r#"{"simulation_steps": 0}"#),
            Err(TrackingError::ConfigError { .. })
        ));
        assert!(matches!(
            TrackingConfig::from_json(r#"{"arrival_percent": 120.0}"#),
            Err(TrackingError::ConfigError { .. })
        ));
        assert!(TrackingConfig::from_json("not json").is_err());
    }
}
