//! Process-wide lookup of circuit breakers by dependency name.

use crate::circuit_breaker::breaker::CircuitBreaker;
use crate::circuit_breaker::config::CircuitBreakerConfig;
use crate::circuit_breaker::state::BreakerStatus;
use crate::core::clock::ArcClock;

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, RwLock};

/// Registry of circuit breakers, one per dependency name.
///
/// Every call site that talks to the same dependency must share one breaker,
/// so breakers are only ever created through [`get_or_create`]. The registry
/// is append-only; entries live as long as the registry.
///
/// Construct one registry at startup and pass it around by `Arc`. Tests
/// build their own.
///
/// [`get_or_create`]: BreakerRegistry::get_or_create
pub struct BreakerRegistry {
    clock: ArcClock,
    entries: RwLock<Entries>,
}

#[derive(Default)]
struct Entries {
    by_name: HashMap<String, Arc<CircuitBreaker>>,
    order: Vec<Arc<CircuitBreaker>>,
}

impl BreakerRegistry {
    /// Creates an empty registry whose breakers read time from `clock`.
    pub fn new(clock: ArcClock) -> Self {
        Self {
            clock,
            entries: RwLock::new(Entries::default()),
        }
    }

    /// Returns the breaker registered under `name`, creating it on first use.
    ///
    /// The first registration wins: `config` is ignored when `name` already
    /// exists. `None` uses [`CircuitBreakerConfig::default`].
    pub fn get_or_create(
        &self,
        name: &str,
        config: Option<CircuitBreakerConfig>,
    ) -> Arc<CircuitBreaker> {
        if let Some(existing) = self.get(name) {
            if config.is_some() {
                tracing::trace!(dependency = %name, "Breaker already registered, config ignored");
            }
            return existing;
        }

        let mut entries = self
            .entries
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());

        // Another caller may have registered it between the read and the write.
        if let Some(existing) = entries.by_name.get(name) {
            return Arc::clone(existing);
        }

        let config = config.unwrap_or_default();
        tracing::debug!(
            dependency = %name,
            failure_threshold = config.failure_threshold,
            reset_timeout_ms = config.reset_timeout.as_millis() as u64,
            "Registering circuit breaker"
        );
        let breaker = Arc::new(CircuitBreaker::new(name, config, Arc::clone(&self.clock)));
        entries.by_name.insert(name.to_string(), Arc::clone(&breaker));
        entries.order.push(Arc::clone(&breaker));
        breaker
    }

    /// Returns the breaker registered under `name`, if any.
    pub fn get(&self, name: &str) -> Option<Arc<CircuitBreaker>> {
        self.entries
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .by_name
            .get(name)
            .cloned()
    }

    /// Returns the status of every registered breaker, in registration order.
    pub fn snapshot(&self) -> Vec<BreakerStatus> {
        self.breakers().iter().map(|b| b.status()).collect()
    }

    /// Returns the registered names, in registration order.
    pub fn names(&self) -> Vec<String> {
        self.breakers().iter().map(|b| b.name().to_string()).collect()
    }

    /// Resets every registered breaker.
    pub fn reset_all(&self) {
        for breaker in self.breakers() {
            breaker.reset();
        }
    }

    /// Returns the number of registered breakers.
    pub fn len(&self) -> usize {
        self.entries
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .order
            .len()
    }

    /// Returns `true` if nothing has been registered yet.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Clones the breaker list so status calls run without the registry lock.
    fn breakers(&self) -> Vec<Arc<CircuitBreaker>> {
        self.entries
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .order
            .clone()
    }
}

impl fmt::Debug for BreakerRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BreakerRegistry")
            .field("breakers", &self.names())
            .finish()
    }
}
