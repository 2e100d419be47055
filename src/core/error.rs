//! Error types for the ingestbridge library.
//!
//! This module provides structured, typed errors for all failure scenarios.
//! The library never panics; all errors are returned as `Result` values.

use std::time::Duration;
use thiserror::Error;

/// The main error type for fetch, breaker and refresh operations.
///
/// Every variant tied to a remote call carries the name of the dependency
/// it concerns, so logs and outcome records can attribute failures.
#[derive(Debug, Error)]
pub enum IngestError {
    /// The circuit breaker for this dependency is open; no call was made.
    #[error("circuit breaker open for dependency '{dependency}'")]
    CircuitOpen {
        /// Name of the dependency with an open circuit.
        dependency: String,
        /// Time left before a probe will be admitted, if known.
        retry_in: Option<Duration>,
    },

    /// The dependency answered HTTP 429.
    #[error("dependency '{dependency}' rate limited the request (HTTP 429)")]
    RateLimited {
        /// Name of the dependency.
        dependency: String,
    },

    /// The dependency answered with a 5xx status.
    #[error("dependency '{dependency}' returned server error HTTP {status}")]
    ServerError {
        /// Name of the dependency.
        dependency: String,
        /// HTTP status code.
        status: u16,
    },

    /// The dependency rejected the request (non-429 4xx, or any other
    /// non-success status that retrying cannot fix).
    #[error("dependency '{dependency}' rejected the request with HTTP {status}")]
    ClientError {
        /// Name of the dependency.
        dependency: String,
        /// HTTP status code.
        status: u16,
    },

    /// Failed to reach the dependency.
    #[error("connection to dependency '{dependency}' failed: {message}")]
    ConnectionFailed {
        /// Name of the dependency.
        dependency: String,
        /// Transport error message.
        message: String,
    },

    /// The transport gave up waiting for the dependency.
    #[error("request to dependency '{dependency}' timed out")]
    Timeout {
        /// Name of the dependency.
        dependency: String,
    },

    /// The payload could not be mapped to records.
    #[error("invalid payload from dependency '{dependency}': {details}")]
    InvalidPayload {
        /// Name of the dependency.
        dependency: String,
        /// What was wrong with it.
        details: String,
    },

    /// Persisting records or outcomes failed.
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    /// Configuration error.
    #[error("configuration error: {message}")]
    Configuration {
        /// Description of the configuration error.
        message: String,
    },

    /// An internal error occurred.
    #[error("internal error: {message}")]
    Internal {
        /// Description of the internal error.
        message: String,
    },
}

impl IngestError {
    /// Returns `true` for transient failures worth another attempt.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::RateLimited { .. }
                | Self::ServerError { .. }
                | Self::ConnectionFailed { .. }
                | Self::Timeout { .. }
        )
    }

    /// Returns `true` if the call was shed by an open circuit.
    pub fn is_circuit_open(&self) -> bool {
        matches!(self, Self::CircuitOpen { .. })
    }

    /// Returns the dependency name if this error is associated with one.
    pub fn dependency(&self) -> Option<&str> {
        match self {
            Self::CircuitOpen { dependency, .. }
            | Self::RateLimited { dependency }
            | Self::ServerError { dependency, .. }
            | Self::ClientError { dependency, .. }
            | Self::ConnectionFailed { dependency, .. }
            | Self::Timeout { dependency }
            | Self::InvalidPayload { dependency, .. } => Some(dependency),
            _ => None,
        }
    }

    /// Returns the HTTP status behind this error, if any.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::RateLimited { .. } => Some(429),
            Self::ServerError { status, .. } | Self::ClientError { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Classifies a non-success HTTP status for `dependency`.
    pub fn from_status(dependency: impl Into<String>, status: u16) -> Self {
        let dependency = dependency.into();
        match status {
            429 => Self::RateLimited { dependency },
            500..=599 => Self::ServerError { dependency, status },
            _ => Self::ClientError { dependency, status },
        }
    }

    /// Creates a `CircuitOpen` error.
    pub fn circuit_open(dependency: impl Into<String>, retry_in: Option<Duration>) -> Self {
        Self::CircuitOpen {
            dependency: dependency.into(),
            retry_in,
        }
    }

    /// Creates a `ConnectionFailed` error.
    pub fn connection_failed(dependency: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ConnectionFailed {
            dependency: dependency.into(),
            message: message.into(),
        }
    }

    /// Creates an `InvalidPayload` error.
    pub fn invalid_payload(dependency: impl Into<String>, details: impl Into<String>) -> Self {
        Self::InvalidPayload {
            dependency: dependency.into(),
            details: details.into(),
        }
    }

    /// Creates an `Internal` error.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Creates a `Configuration` error.
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }
}

/// Error type for persistent store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// An I/O error occurred.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A record could not be encoded or decoded.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The store refused the write.
    #[error("write failed: {reason}")]
    WriteFailed {
        /// Reason for the failure.
        reason: String,
    },
}

/// Error raised by a [`Transport`](crate::fetch::Transport) before any
/// HTTP status was received.
#[derive(Debug, Clone, Error)]
pub enum TransportError {
    /// The connection could not be established or broke mid-request.
    #[error("{0}")]
    Connect(String),

    /// The transport's own timeout elapsed.
    #[error("timed out")]
    Timeout,
}

impl TransportError {
    /// Attaches a dependency name, producing the crate-level error.
    pub fn into_ingest_error(self, dependency: &str) -> IngestError {
        match self {
            Self::Connect(message) => IngestError::connection_failed(dependency, message),
            Self::Timeout => IngestError::Timeout {
                dependency: dependency.to_string(),
            },
        }
    }
}

/// A specialized `Result` type for ingest operations.
pub type IngestResult<T> = Result<T, IngestError>;

/// A specialized `Result` type for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_classification() {
        assert!(matches!(
            IngestError::from_status("api", 429),
            IngestError::RateLimited { .. }
        ));
        assert!(matches!(
            IngestError::from_status("api", 503),
            IngestError::ServerError { status: 503, .. }
        ));
        assert!(matches!(
            IngestError::from_status("api", 404),
            IngestError::ClientError { status: 404, .. }
        ));
    }

    #[test]
    fn test_is_retryable() {
        assert!(IngestError::from_status("api", 429).is_retryable());
        assert!(IngestError::from_status("api", 500).is_retryable());
        assert!(IngestError::connection_failed("api", "reset").is_retryable());
        assert!(!IngestError::from_status("api", 401).is_retryable());
        assert!(!IngestError::circuit_open("api", None).is_retryable());
    }

    #[test]
    fn test_dependency_and_status() {
        let err = IngestError::from_status("celestrak", 502);
        assert_eq!(err.dependency(), Some("celestrak"));
        assert_eq!(err.status(), Some(502));

        let err = IngestError::internal("boom");
        assert_eq!(err.dependency(), None);
        assert_eq!(err.status(), None);
    }

    #[test]
    fn test_transport_error_conversion() {
        let err = TransportError::Timeout.into_ingest_error("sec-edgar");
        assert!(matches!(err, IngestError::Timeout { ref dependency } if dependency == "sec-edgar"));

        let err = TransportError::Connect("refused".into()).into_ingest_error("fcc");
        assert!(err.to_string().contains("refused"));
    }
}
