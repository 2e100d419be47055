//! Circuit breaker implementation.

use crate::circuit_breaker::config::CircuitBreakerConfig;
use crate::circuit_breaker::state::{BreakerMetrics, BreakerState, BreakerStatus};
use crate::core::clock::{elapsed_since, ArcClock};
use crate::core::{IngestError, IngestResult};

use chrono::{DateTime, Utc};
use std::fmt;
use std::future::Future;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

/// A circuit breaker guarding calls to one named dependency.
///
/// The breaker counts the outcomes of whatever unit of work it wraps; it
/// never retries. Retrying belongs to the wrapped call, typically a
/// [`RetryingFetch`](crate::fetch::RetryingFetch), so the breaker only trips
/// on sustained outages.
///
/// # States
///
/// - **Closed**: calls pass through, consecutive failures are counted.
/// - **Open**: calls are shed until `reset_timeout` has passed since the
///   last failure.
/// - **Half-Open**: exactly one call is admitted as a probe. Success closes
///   the circuit, failure reopens it.
///
/// The Open to Half-Open transition is evaluated lazily against the
/// breaker's clock on every `execute()` and `status()`.
///
/// # Example
///
/// ```rust,ignore
/// use ingestbridge::circuit_breaker::{CircuitBreaker, CircuitBreakerConfig};
/// use ingestbridge::core::SystemClock;
///
/// let breaker = CircuitBreaker::new("launch-library", CircuitBreakerConfig::default(), SystemClock::shared());
/// let count = breaker.execute(|| fetch_count(), Some(0)).await?;
/// ```
pub struct CircuitBreaker {
    /// Dependency name.
    name: String,
    /// Configuration, fixed at construction.
    config: CircuitBreakerConfig,
    /// Time source for failure stamps and reset windows.
    clock: ArcClock,
    /// Mutable state; never held across an `.await`.
    inner: Mutex<BreakerInner>,
}

#[derive(Debug, Default)]
struct BreakerInner {
    state: BreakerState,
    failure_count: u32,
    last_failure: Option<DateTime<Utc>>,
    probe_in_flight: bool,
    metrics: BreakerMetrics,
}

/// Result of asking the breaker whether a call may proceed.
enum Admission {
    Call,
    Probe,
    Shed { retry_in: Option<Duration> },
}

/// Frees the half-open probe slot if the probe future is dropped before
/// its outcome is recorded.
struct ProbeGuard<'a> {
    breaker: &'a CircuitBreaker,
    armed: bool,
}

impl ProbeGuard<'_> {
    fn disarm(mut self) {
        self.armed = false;
    }
}

impl Drop for ProbeGuard<'_> {
    fn drop(&mut self) {
        if self.armed {
            self.breaker.lock().probe_in_flight = false;
            tracing::debug!(
                dependency = %self.breaker.name,
                "Probe cancelled before completion, slot released"
            );
        }
    }
}

impl CircuitBreaker {
    /// Creates a new circuit breaker.
    pub fn new(name: impl Into<String>, config: CircuitBreakerConfig, clock: ArcClock) -> Self {
        Self {
            name: name.into(),
            config: config.normalized(),
            clock,
            inner: Mutex::new(BreakerInner::default()),
        }
    }

    /// Creates a new circuit breaker with default configuration.
    pub fn with_defaults(name: impl Into<String>, clock: ArcClock) -> Self {
        Self::new(name, CircuitBreakerConfig::default(), clock)
    }

    /// Returns the dependency name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns a reference to the configuration.
    pub fn config(&self) -> &CircuitBreakerConfig {
        &self.config
    }

    /// Runs `f` through the breaker.
    ///
    /// When the circuit is open (or a half-open probe is already in flight)
    /// `f` is not invoked: `fallback` is returned if given, otherwise
    /// [`IngestError::CircuitOpen`]. When `f` fails, the failure is recorded
    /// and `fallback` is returned if given, otherwise the original error.
    ///
    /// `None` means "no fallback". `Some(0)` or `Some(Vec::new())` are real
    /// fallbacks and are returned as such.
    pub async fn execute<T, F, Fut>(&self, f: F, fallback: Option<T>) -> IngestResult<T>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = IngestResult<T>>,
    {
        let probe = match self.admit() {
            Admission::Shed { retry_in } => {
                tracing::debug!(
                    dependency = %self.name,
                    retry_in_ms = retry_in.map(|d| d.as_millis() as u64),
                    has_fallback = fallback.is_some(),
                    "Circuit open, call shed"
                );
                return match fallback {
                    Some(value) => Ok(value),
                    None => Err(IngestError::circuit_open(&self.name, retry_in)),
                };
            }
            Admission::Call => None,
            Admission::Probe => Some(ProbeGuard {
                breaker: self,
                armed: true,
            }),
        };

        let result = f().await;
        let was_probe = probe.is_some();

        match result {
            Ok(value) => {
                self.record_success(was_probe);
                if let Some(guard) = probe {
                    guard.disarm();
                }
                Ok(value)
            }
            Err(error) => {
                let failures = self.record_failure(was_probe);
                if let Some(guard) = probe {
                    guard.disarm();
                }
                match fallback {
                    Some(value) => {
                        tracing::warn!(
                            dependency = %self.name,
                            failures = failures,
                            threshold = self.config.failure_threshold,
                            error = %error,
                            "Call failed, returning fallback"
                        );
                        Ok(value)
                    }
                    None => Err(error),
                }
            }
        }
    }

    /// Returns a read-only snapshot of the breaker.
    ///
    /// An open circuit whose reset window has elapsed is reported (and
    /// moved to) half-open, even if no call has been attempted.
    pub fn status(&self) -> BreakerStatus {
        let now = self.clock.now();
        let mut inner = self.lock();
        self.refresh_state(&mut inner, now);
        BreakerStatus {
            name: self.name.clone(),
            state: inner.state,
            failures: inner.failure_count,
            last_failure: inner.last_failure,
        }
    }

    /// Returns the current state, applying the reset-window check.
    pub fn state(&self) -> BreakerState {
        self.status().state
    }

    /// Returns a copy of the current metrics.
    pub fn metrics(&self) -> BreakerMetrics {
        self.lock().metrics.clone()
    }

    /// Closes the circuit and clears failure history and metrics,
    /// regardless of timers.
    pub fn reset(&self) {
        let mut inner = self.lock();
        *inner = BreakerInner::default();
        tracing::info!(dependency = %self.name, "Circuit breaker reset");
    }

    /// Opens the circuit now, as if a failure had just been recorded.
    pub fn force_open(&self) {
        let now = self.clock.now();
        let mut inner = self.lock();
        if !inner.state.is_open() {
            inner.metrics.record_opened();
        }
        inner.state = BreakerState::Open;
        inner.last_failure = Some(now);
        tracing::warn!(dependency = %self.name, "Circuit breaker forced open");
    }

    fn lock(&self) -> MutexGuard<'_, BreakerInner> {
        self.inner
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Moves an open circuit to half-open once its reset window has passed.
    ///
    /// The probe slot is left alone: a probe admitted in an earlier window
    /// may still be running, and only its own outcome (or its guard) frees
    /// the slot.
    fn refresh_state(&self, inner: &mut BreakerInner, now: DateTime<Utc>) {
        if !inner.state.is_open() {
            return;
        }
        let eligible = match inner.last_failure {
            Some(at) => elapsed_since(now, at) >= self.config.reset_timeout,
            None => true,
        };
        if eligible {
            inner.state = BreakerState::HalfOpen;
            tracing::info!(
                dependency = %self.name,
                "Reset window elapsed, circuit half-open"
            );
        }
    }

    /// Decides whether a call may proceed and claims the probe slot if so.
    fn admit(&self) -> Admission {
        let now = self.clock.now();
        let mut inner = self.lock();
        self.refresh_state(&mut inner, now);

        match inner.state {
            BreakerState::Closed => Admission::Call,
            BreakerState::HalfOpen if !inner.probe_in_flight => {
                inner.probe_in_flight = true;
                tracing::debug!(dependency = %self.name, "Admitting half-open probe");
                Admission::Probe
            }
            BreakerState::HalfOpen => {
                inner.metrics.record_rejected();
                Admission::Shed { retry_in: None }
            }
            BreakerState::Open => {
                inner.metrics.record_rejected();
                let retry_in = inner.last_failure.map(|at| {
                    self.config
                        .reset_timeout
                        .saturating_sub(elapsed_since(now, at))
                });
                Admission::Shed { retry_in }
            }
        }
    }

    fn record_success(&self, was_probe: bool) {
        let mut inner = self.lock();
        inner.metrics.record_success();
        inner.failure_count = 0;
        if was_probe {
            inner.probe_in_flight = false;
        }
        if !inner.state.is_closed() {
            inner.state = BreakerState::Closed;
            inner.metrics.record_closed();
            tracing::info!(
                dependency = %self.name,
                probe = was_probe,
                "Call succeeded, circuit closed"
            );
        }
    }

    /// Records a failure and returns the new consecutive failure count.
    fn record_failure(&self, was_probe: bool) -> u32 {
        let now = self.clock.now();
        let mut inner = self.lock();
        inner.metrics.record_failure();
        inner.failure_count = inner.failure_count.saturating_add(1);
        inner.last_failure = Some(now);

        let reopen = was_probe || inner.state.is_half_open();
        if was_probe {
            inner.probe_in_flight = false;
        }

        if reopen {
            inner.state = BreakerState::Open;
            inner.metrics.record_opened();
            tracing::warn!(
                dependency = %self.name,
                failures = inner.failure_count,
                "Probe failed, circuit reopened"
            );
        } else if inner.state.is_closed() && inner.failure_count >= self.config.failure_threshold
        {
            inner.state = BreakerState::Open;
            inner.metrics.record_opened();
            tracing::warn!(
                dependency = %self.name,
                failures = inner.failure_count,
                threshold = self.config.failure_threshold,
                reset_timeout_ms = self.config.reset_timeout.as_millis() as u64,
                "Failure threshold reached, circuit opened"
            );
        }

        inner.failure_count
    }
}

impl fmt::Debug for CircuitBreaker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = self.lock();
        f.debug_struct("CircuitBreaker")
            .field("name", &self.name)
            .field("state", &inner.state)
            .field("failure_count", &inner.failure_count)
            .field("config", &self.config)
            .finish()
    }
}
