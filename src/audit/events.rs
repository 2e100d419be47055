//! Audit event types and emission functions.

use crate::circuit_breaker::BreakerStatus;
use crate::core::RefreshOutcome;
use crate::orchestrator::RunSummary;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Base trait for audit events.
pub trait AuditEvent: Serialize {
    /// Returns the event type name.
    fn event_type(&self) -> &'static str;

    /// Returns the timestamp of the event.
    fn timestamp(&self) -> DateTime<Utc>;
}

/// Audit event for a completed source refresh.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RefreshAuditEvent {
    /// Timestamp of the event.
    pub timestamp: DateTime<Utc>,

    /// Refresh outcome ID.
    pub outcome_id: String,

    /// Refreshed source.
    pub source_name: String,

    /// "success", "partial" or "failed".
    pub outcome: String,

    /// Records created or changed.
    pub items_updated: u64,

    /// Records produced by the source.
    pub items_checked: u64,

    /// HTTP calls made.
    pub api_calls_made: u32,

    /// Refresh duration in milliseconds.
    pub duration_ms: u64,

    /// First error, if any.
    pub error_message: Option<String>,
}

impl From<&RefreshOutcome> for RefreshAuditEvent {
    fn from(outcome: &RefreshOutcome) -> Self {
        Self {
            timestamp: outcome.recorded_at,
            outcome_id: outcome.id.clone(),
            source_name: outcome.source_name.clone(),
            outcome: outcome.outcome.to_string(),
            items_updated: outcome.items_updated,
            items_checked: outcome.items_checked,
            api_calls_made: outcome.api_calls_made,
            duration_ms: outcome.duration_ms,
            error_message: outcome.error_message.clone(),
        }
    }
}

impl AuditEvent for RefreshAuditEvent {
    fn event_type(&self) -> &'static str {
        "refresh_completed"
    }

    fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }
}

/// Audit event for a finished orchestrator run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunAuditEvent {
    /// Timestamp of the event.
    pub timestamp: DateTime<Utc>,

    /// Sum of `items_updated` across sources.
    pub total_updated: u64,

    /// Number of sources run.
    pub source_count: usize,

    /// Names of the sources whose refresh failed.
    pub failed_sources: Vec<String>,

    /// Run duration in milliseconds.
    pub duration_ms: u64,
}

impl From<&RunSummary> for RunAuditEvent {
    fn from(summary: &RunSummary) -> Self {
        Self {
            timestamp: Utc::now(),
            total_updated: summary.total_updated,
            source_count: summary.outcomes.len(),
            failed_sources: summary
                .failed_sources()
                .map(|name| name.to_string())
                .collect(),
            duration_ms: summary.duration_ms,
        }
    }
}

impl AuditEvent for RunAuditEvent {
    fn event_type(&self) -> &'static str {
        "run_completed"
    }

    fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }
}

/// Emits an audit event for a refresh starting.
pub fn emit_refresh_started(source_name: &str, request_count: usize) {
    tracing::info!(
        target: "ingestbridge::audit",
        event_type = "refresh_started",
        source_name = %source_name,
        request_count = request_count,
        "Refresh started"
    );
}

/// Emits an audit event for a completed refresh.
pub fn emit_refresh_completed(outcome: &RefreshOutcome) {
    tracing::info!(
        target: "ingestbridge::audit",
        event_type = "refresh_completed",
        outcome_id = %outcome.id,
        source_name = %outcome.source_name,
        outcome = %outcome.outcome,
        items_updated = outcome.items_updated,
        items_checked = outcome.items_checked,
        api_calls_made = outcome.api_calls_made,
        duration_ms = outcome.duration_ms,
        error_message = ?outcome.error_message,
        "Refresh completed"
    );
}

/// Emits the single summary event of an orchestrator run.
pub fn emit_run_summary(summary: &RunSummary) {
    let failed: Vec<&str> = summary.failed_sources().collect();

    tracing::info!(
        target: "ingestbridge::audit",
        event_type = "run_completed",
        total_updated = summary.total_updated,
        source_count = summary.outcomes.len(),
        failed_sources = ?failed,
        results = ?summary.results,
        duration_ms = summary.duration_ms,
        "Refresh run completed"
    );
}

/// Emits the status of one circuit breaker.
pub fn emit_breaker_status(status: &BreakerStatus) {
    tracing::info!(
        target: "ingestbridge::audit",
        event_type = "breaker_status",
        dependency = %status.name,
        state = %status.state,
        failures = status.failures,
        last_failure = ?status.last_failure,
        "Circuit breaker status"
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::OutcomeStatus;

    #[test]
    fn test_refresh_event_from_outcome() {
        let outcome = RefreshOutcome::new("celestrak", OutcomeStatus::Partial)
            .with_items(2, 5)
            .with_api_calls(4)
            .with_error("HTTP 503");
        let event = RefreshAuditEvent::from(&outcome);

        assert_eq!(event.event_type(), "refresh_completed");
        assert_eq!(event.outcome, "partial");
        assert_eq!(event.items_updated, 2);
        assert_eq!(event.api_calls_made, 4);
        assert_eq!(event.timestamp(), outcome.recorded_at);
    }

    #[test]
    fn test_run_event_lists_failed_sources() {
        let summary = RunSummary::from_outcomes(
            vec![
                RefreshOutcome::new("a", OutcomeStatus::Success).with_items(3, 3),
                RefreshOutcome::failed("b", "down"),
            ],
            std::time::Duration::from_millis(10),
        );
        let event = RunAuditEvent::from(&summary);

        assert_eq!(event.total_updated, 3);
        assert_eq!(event.source_count, 2);
        assert_eq!(event.failed_sources, vec!["b".to_string()]);
    }
}
