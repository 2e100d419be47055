//! Retry policy and the retrying fetch wrapper.

use crate::core::clock::ArcClock;
use crate::core::types::duration_ms;
use crate::core::{IngestError, IngestResult};
use crate::fetch::request::{FetchRequest, FetchResponse};
use crate::fetch::transport::ArcTransport;

use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

/// Configuration for retry behavior.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    /// Maximum number of attempts, the first one included.
    pub max_attempts: u32,

    /// Delay after the first failed attempt.
    #[serde(rename = "initial_delay_ms", with = "duration_ms")]
    pub initial_delay: Duration,

    /// Upper bound for any single delay.
    #[serde(rename = "max_delay_ms", with = "duration_ms")]
    pub max_delay: Duration,

    /// Multiplier applied per attempt.
    pub backoff_multiplier: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_delay: Duration::from_millis(1000),
            max_delay: Duration::from_secs(60),
            backoff_multiplier: 2.0,
        }
    }
}

impl RetryPolicy {
    /// Creates a new retry policy with defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Disables retries.
    pub fn no_retry() -> Self {
        Self {
            max_attempts: 1,
            ..Self::default()
        }
    }

    /// Sets the maximum number of attempts.
    pub fn with_max_attempts(mut self, attempts: u32) -> Self {
        self.max_attempts = attempts.max(1);
        self
    }

    /// Sets the initial delay.
    pub fn with_initial_delay(mut self, delay: Duration) -> Self {
        self.initial_delay = delay;
        self
    }

    /// Sets the maximum delay.
    pub fn with_max_delay(mut self, delay: Duration) -> Self {
        self.max_delay = delay;
        self
    }

    /// Sets the backoff multiplier.
    pub fn with_backoff_multiplier(mut self, multiplier: f64) -> Self {
        self.backoff_multiplier = multiplier.max(1.0);
        self
    }

    /// Returns the delay to wait after the failed attempt `attempt`
    /// (0-indexed) before the next one.
    ///
    /// With the defaults this is `2^attempt * 1000` ms.
    pub fn delay_after_attempt(&self, attempt: u32) -> Duration {
        let base = self.initial_delay.as_millis() as f64
            * self.backoff_multiplier.powi(attempt.min(i32::MAX as u32) as i32);
        let capped = base.min(self.max_delay.as_millis() as f64);
        Duration::from_millis(capped as u64)
    }

    /// Returns whether another attempt may follow `attempts_made` attempts.
    pub fn should_retry(&self, attempts_made: u32) -> bool {
        attempts_made < self.max_attempts
    }
}

/// One logical request with bounded retries and escalating delays.
///
/// Per attempt:
///
/// - 2xx: returned immediately.
/// - 429 or 5xx: wait, then try again; the classified status error is
///   returned once attempts run out.
/// - any other status: returned as [`IngestError::ClientError`] at once.
/// - transport failure: wait and try again, except on the last attempt,
///   where the failure propagates.
///
/// Independent of circuit breaking; normally passed as the call a
/// [`CircuitBreaker`](crate::circuit_breaker::CircuitBreaker) wraps.
#[derive(Debug, Clone)]
pub struct RetryingFetch {
    transport: ArcTransport,
    policy: RetryPolicy,
    clock: ArcClock,
}

impl RetryingFetch {
    /// Creates a new retrying fetch.
    pub fn new(transport: ArcTransport, policy: RetryPolicy, clock: ArcClock) -> Self {
        Self {
            transport,
            policy,
            clock,
        }
    }

    /// Returns the retry policy.
    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Fetches `request` from `dependency`, retrying transient failures.
    pub async fn fetch(
        &self,
        dependency: &str,
        request: &FetchRequest,
    ) -> IngestResult<FetchResponse> {
        let attempts = AtomicU32::new(0);
        self.fetch_counted(dependency, request, &attempts).await
    }

    /// Like [`fetch`](Self::fetch), incrementing `attempts` once per call
    /// actually sent.
    pub async fn fetch_counted(
        &self,
        dependency: &str,
        request: &FetchRequest,
        attempts: &AtomicU32,
    ) -> IngestResult<FetchResponse> {
        let max_attempts = self.policy.max_attempts.max(1);
        let mut attempt = 0;

        loop {
            attempts.fetch_add(1, Ordering::Relaxed);
            let is_last = attempt + 1 >= max_attempts;

            let error = match self.transport.send(request).await {
                Ok(response) if response.is_success() => {
                    if attempt > 0 {
                        tracing::debug!(
                            dependency = %dependency,
                            attempts = attempt + 1,
                            "Request succeeded after retry"
                        );
                    }
                    return Ok(response);
                }
                Ok(response) => {
                    let error = IngestError::from_status(dependency, response.status);
                    if !error.is_retryable() {
                        tracing::debug!(
                            dependency = %dependency,
                            status = response.status,
                            url = %request.url,
                            "Non-retryable status"
                        );
                        return Err(error);
                    }
                    error
                }
                Err(transport_error) => transport_error.into_ingest_error(dependency),
            };

            if is_last {
                tracing::warn!(
                    dependency = %dependency,
                    attempts = attempt + 1,
                    error = %error,
                    "Retries exhausted"
                );
                return Err(error);
            }

            let delay = self.policy.delay_after_attempt(attempt);
            tracing::debug!(
                dependency = %dependency,
                attempt = attempt + 1,
                max_attempts = max_attempts,
                delay_ms = delay.as_millis() as u64,
                error = %error,
                "Retrying request"
            );
            self.clock.sleep(delay).await;
            attempt += 1;
        }
    }
}
