//! Circuit breakers for unreliable third-party dependencies.
//!
//! The circuit breaker pattern stops calling a failing dependency for a
//! cool-down period instead of hammering it, then probes it once to detect
//! recovery.
//!
//! ## States
//!
//! - **Closed**: Normal operation; calls pass through.
//! - **Open**: Dependency is failing; calls are shed immediately.
//! - **Half-Open**: A single probe call tests whether it has recovered.
//!
//! ## Usage
//!
//! ```rust
//! use ingestbridge::circuit_breaker::{BreakerRegistry, BreakerState, CircuitBreakerConfig};
//! use ingestbridge::core::SystemClock;
//! use std::time::Duration;
//!
//! let registry = BreakerRegistry::new(SystemClock::shared());
//! let config = CircuitBreakerConfig::default()
//!     .with_failure_threshold(3)
//!     .with_reset_timeout(Duration::from_secs(10));
//!
//! let breaker = registry.get_or_create("space-track", Some(config));
//! assert_eq!(breaker.state(), BreakerState::Closed);
//! ```

mod breaker;
mod config;
mod registry;
mod state;

pub use breaker::CircuitBreaker;
pub use config::{CircuitBreakerConfig, DEFAULT_FAILURE_THRESHOLD, DEFAULT_RESET_TIMEOUT};
pub use registry::BreakerRegistry;
pub use state::{BreakerMetrics, BreakerState, BreakerStatus};
