//! Circuit breaker configuration.

use crate::core::types::duration_ms;

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Default number of consecutive failures before the circuit opens.
pub const DEFAULT_FAILURE_THRESHOLD: u32 = 5;

/// Default cool-down before a probe is admitted.
pub const DEFAULT_RESET_TIMEOUT: Duration = Duration::from_millis(60_000);

/// Configuration for a circuit breaker.
///
/// Durations serialize as milliseconds:
///
/// ```json
/// { "failure_threshold": 3, "reset_timeout_ms": 10000 }
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CircuitBreakerConfig {
    /// Consecutive failures before opening the circuit. Always at least 1.
    pub failure_threshold: u32,

    /// How long the circuit stays open after the last failure before a
    /// probe is allowed.
    #[serde(rename = "reset_timeout_ms", with = "duration_ms")]
    pub reset_timeout: Duration,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: DEFAULT_FAILURE_THRESHOLD,
            reset_timeout: DEFAULT_RESET_TIMEOUT,
        }
    }
}

impl CircuitBreakerConfig {
    /// Creates a new configuration with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the failure threshold.
    pub fn with_failure_threshold(mut self, threshold: u32) -> Self {
        self.failure_threshold = threshold.max(1);
        self
    }

    /// Sets the reset timeout.
    pub fn with_reset_timeout(mut self, timeout: Duration) -> Self {
        self.reset_timeout = timeout.max(Duration::from_millis(1));
        self
    }

    /// Creates a configuration for sources with tight daily quotas.
    ///
    /// Trips on the first failed call and waits an hour before probing,
    /// so an exhausted quota is not burned further.
    pub fn quota_limited() -> Self {
        Self {
            failure_threshold: 1,
            reset_timeout: Duration::from_secs(3600),
        }
    }

    /// Clamps deserialized values into their valid ranges.
    pub(crate) fn normalized(self) -> Self {
        Self::new()
            .with_failure_threshold(self.failure_threshold)
            .with_reset_timeout(self.reset_timeout)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = CircuitBreakerConfig::default();
        assert_eq!(config.failure_threshold, 5);
        assert_eq!(config.reset_timeout, Duration::from_millis(60_000));
    }

    #[test]
    fn test_config_builder() {
        let config = CircuitBreakerConfig::new()
            .with_failure_threshold(3)
            .with_reset_timeout(Duration::from_secs(10));

        assert_eq!(config.failure_threshold, 3);
        assert_eq!(config.reset_timeout, Duration::from_secs(10));
    }

    #[test]
    fn test_zero_threshold_is_clamped() {
        let config = CircuitBreakerConfig::new().with_failure_threshold(0);
        assert_eq!(config.failure_threshold, 1);
    }

    #[test]
    fn test_deserialize_partial_json() {
        let config: CircuitBreakerConfig =
            serde_json::from_str(r#"{ "reset_timeout_ms": 3000 }"#).unwrap();
        assert_eq!(config.failure_threshold, 5);
        assert_eq!(config.reset_timeout, Duration::from_millis(3000));

        let config: CircuitBreakerConfig =
            serde_json::from_str(r#"{ "failure_threshold": 0 }"#).unwrap();
        assert_eq!(config.normalized().failure_threshold, 1);
    }
}
