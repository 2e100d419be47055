//! Orchestrator configuration.

use crate::circuit_breaker::CircuitBreakerConfig;
use crate::core::types::duration_ms;
use crate::core::{IngestError, IngestResult};
use crate::fetch::RetryPolicy;

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Default pause between two sources of one run.
pub const DEFAULT_INTER_SOURCE_DELAY: Duration = Duration::from_millis(1000);

/// Run-wide defaults, loadable from JSON.
///
/// ```json
/// {
///   "inter_source_delay_ms": 2000,
///   "retry": { "max_attempts": 3, "initial_delay_ms": 1000 },
///   "breaker": { "failure_threshold": 5, "reset_timeout_ms": 60000 }
/// }
/// ```
///
/// Missing fields take their defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OrchestratorConfig {
    /// Pause after each source when another follows, unless the source was
    /// registered with its own delay.
    #[serde(rename = "inter_source_delay_ms", with = "duration_ms")]
    pub inter_source_delay: Duration,

    /// Retry policy for every request.
    pub retry: RetryPolicy,

    /// Breaker settings for sources without their own.
    pub breaker: CircuitBreakerConfig,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            inter_source_delay: DEFAULT_INTER_SOURCE_DELAY,
            retry: RetryPolicy::default(),
            breaker: CircuitBreakerConfig::default(),
        }
    }
}

impl OrchestratorConfig {
    /// Creates a configuration with defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Parses a configuration from JSON, clamping out-of-range values.
    pub fn from_json_str(json: &str) -> IngestResult<Self> {
        let mut config: Self = serde_json::from_str(json)
            .map_err(|e| IngestError::configuration(format!("invalid orchestrator config: {}", e)))?;
        let max_attempts = config.retry.max_attempts;
        let multiplier = config.retry.backoff_multiplier;
        config.retry = config
            .retry
            .with_max_attempts(max_attempts)
            .with_backoff_multiplier(multiplier);
        config.breaker = config.breaker.normalized();
        Ok(config)
    }

    /// Sets the inter-source delay.
    pub fn with_inter_source_delay(mut self, delay: Duration) -> Self {
        self.inter_source_delay = delay;
        self
    }

    /// Sets the retry policy.
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Sets the default breaker settings.
    pub fn with_breaker(mut self, breaker: CircuitBreakerConfig) -> Self {
        self.breaker = breaker;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_json_partial() {
        let config = OrchestratorConfig::from_json_str(
            r#"{ "inter_source_delay_ms": 2000, "breaker": { "failure_threshold": 3 } }"#,
        )
        .unwrap();

        assert_eq!(config.inter_source_delay, Duration::from_millis(2000));
        assert_eq!(config.breaker.failure_threshold, 3);
        assert_eq!(config.breaker.reset_timeout, Duration::from_millis(60_000));
        assert_eq!(config.retry, RetryPolicy::default());
    }

    #[test]
    fn test_from_json_clamps() {
        let config = OrchestratorConfig::from_json_str(
            r#"{ "retry": { "max_attempts": 0 }, "breaker": { "failure_threshold": 0 } }"#,
        )
        .unwrap();

        assert_eq!(config.retry.max_attempts, 1);
        assert_eq!(config.breaker.failure_threshold, 1);
    }

    #[test]
    fn test_from_json_clamps_backoff_multiplier() {
        let config =
            OrchestratorConfig::from_json_str(r#"{ "retry": { "backoff_multiplier": -2.0 } }"#)
                .unwrap();

        assert_eq!(config.retry.backoff_multiplier, 1.0);
        assert_eq!(config.retry.delay_after_attempt(2), config.retry.initial_delay);
    }

    #[test]
    fn test_from_json_invalid() {
        let result = OrchestratorConfig::from_json_str("{ nope");
        assert!(matches!(result, Err(IngestError::Configuration { .. })));
    }

    #[test]
    fn test_empty_object_is_default() {
        assert_eq!(
            OrchestratorConfig::from_json_str("{}").unwrap(),
            OrchestratorConfig::default()
        );
    }
}
