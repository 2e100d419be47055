//! Structured audit logging for refresh runs.
//!
//! Events are emitted through `tracing` under the `ingestbridge::audit`
//! target, so a subscriber can route them (JSON file, OpenTelemetry, ...)
//! separately from operational logs.

mod events;

pub use events::{
    emit_breaker_status, emit_refresh_completed, emit_refresh_started, emit_run_summary,
    AuditEvent, RefreshAuditEvent, RunAuditEvent,
};
