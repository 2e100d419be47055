//! Circuit breaker states, status snapshots and metrics.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// The current state of a circuit breaker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BreakerState {
    /// Circuit is closed; calls pass through normally.
    Closed,
    /// Circuit is open; calls are shed without touching the dependency.
    Open,
    /// Reset window elapsed; the next call is admitted as a probe.
    HalfOpen,
}

impl BreakerState {
    /// Returns `true` if the circuit is closed.
    pub fn is_closed(&self) -> bool {
        matches!(self, Self::Closed)
    }

    /// Returns `true` if the circuit is open.
    pub fn is_open(&self) -> bool {
        matches!(self, Self::Open)
    }

    /// Returns `true` if the circuit is half-open.
    pub fn is_half_open(&self) -> bool {
        matches!(self, Self::HalfOpen)
    }

    /// Returns the name of the state.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Closed => "CLOSED",
            Self::Open => "OPEN",
            Self::HalfOpen => "HALF_OPEN",
        }
    }
}

impl Default for BreakerState {
    fn default() -> Self {
        Self::Closed
    }
}

impl fmt::Display for BreakerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Read-only snapshot of a breaker, as exposed to health checks.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BreakerStatus {
    /// Dependency name.
    pub name: String,
    /// Current state.
    pub state: BreakerState,
    /// Consecutive failures since the last success or reset.
    pub failures: u32,
    /// Time of the most recent failure, cleared by `reset()`.
    pub last_failure: Option<DateTime<Utc>>,
}

/// Counters describing breaker behavior.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BreakerMetrics {
    /// Total number of calls seen, shed calls included.
    pub total_requests: u64,
    /// Number of successful calls.
    pub successful_requests: u64,
    /// Number of failed calls.
    pub failed_requests: u64,
    /// Number of calls shed by an open circuit.
    pub rejected_requests: u64,
    /// Number of times the circuit has opened.
    pub times_opened: u64,
    /// Number of times the circuit has closed after being open.
    pub times_closed: u64,
}

impl BreakerMetrics {
    /// Creates new empty metrics.
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn record_success(&mut self) {
        self.total_requests += 1;
        self.successful_requests += 1;
    }

    pub(crate) fn record_failure(&mut self) {
        self.total_requests += 1;
        self.failed_requests += 1;
    }

    pub(crate) fn record_rejected(&mut self) {
        self.total_requests += 1;
        self.rejected_requests += 1;
    }

    pub(crate) fn record_opened(&mut self) {
        self.times_opened += 1;
    }

    pub(crate) fn record_closed(&mut self) {
        self.times_closed += 1;
    }

    /// Returns the share of admitted calls that succeeded (1.0 when idle).
    pub fn success_rate(&self) -> f64 {
        let attempted = self.successful_requests + self.failed_requests;
        if attempted == 0 {
            return 1.0;
        }
        self.successful_requests as f64 / attempted as f64
    }

    /// Returns the share of all calls that were shed.
    pub fn rejection_rate(&self) -> f64 {
        if self.total_requests == 0 {
            return 0.0;
        }
        self.rejected_requests as f64 / self.total_requests as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_serializes_screaming_snake_case() {
        assert_eq!(serde_json::to_value(BreakerState::HalfOpen).unwrap(), "HALF_OPEN");
        assert_eq!(BreakerState::Open.to_string(), "OPEN");
        assert!(BreakerState::default().is_closed());
    }

    #[test]
    fn test_status_shape() {
        let status = BreakerStatus {
            name: "spacetrack".into(),
            state: BreakerState::Closed,
            failures: 0,
            last_failure: None,
        };
        let json = serde_json::to_value(&status).unwrap();
        assert_eq!(json["state"], "CLOSED");
        assert_eq!(json["failures"], 0);
        assert!(json["last_failure"].is_null());
    }

    #[test]
    fn test_metrics_rates() {
        let mut metrics = BreakerMetrics::new();
        assert_eq!(metrics.success_rate(), 1.0);
        assert_eq!(metrics.rejection_rate(), 0.0);

        metrics.record_success();
        metrics.record_failure();
        metrics.record_rejected();
        metrics.record_rejected();

        assert_eq!(metrics.total_requests, 4);
        assert_eq!(metrics.success_rate(), 0.5);
        assert_eq!(metrics.rejection_rate(), 0.5);
    }
}
