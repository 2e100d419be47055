//! Shared collaborators for assembling fetchers.

use crate::circuit_breaker::{BreakerRegistry, CircuitBreakerConfig};
use crate::core::clock::ArcClock;
use crate::fetch::{ArcTransport, RetryPolicy, RetryingFetch};
use crate::orchestrator::OrchestratorConfig;
use crate::sources::adapter::SourceAdapter;
use crate::sources::fetcher::ApiFetcher;
use crate::store::ArcStore;

use std::sync::Arc;

/// Everything an [`ApiFetcher`] shares with its siblings.
///
/// One context is normally built per process; every fetcher created from it
/// draws its breaker from the same [`BreakerRegistry`], so status
/// snapshots cover all dependencies.
#[derive(Debug, Clone)]
pub struct IngestContext {
    /// Breakers by dependency name.
    pub registry: Arc<BreakerRegistry>,

    /// Outbound HTTP.
    pub transport: ArcTransport,

    /// Record and outcome persistence.
    pub store: ArcStore,

    /// Time source for backoff, throttling and reset windows.
    pub clock: ArcClock,

    /// Retry policy applied to every request.
    pub retry: RetryPolicy,

    /// Breaker settings for adapters that do not bring their own.
    pub default_breaker: CircuitBreakerConfig,
}

impl IngestContext {
    /// Creates a context with a fresh registry and default policies.
    pub fn new(transport: ArcTransport, store: ArcStore, clock: ArcClock) -> Self {
        Self {
            registry: Arc::new(BreakerRegistry::new(Arc::clone(&clock))),
            transport,
            store,
            clock,
            retry: RetryPolicy::default(),
            default_breaker: CircuitBreakerConfig::default(),
        }
    }

    /// Applies the retry and breaker defaults of `config`.
    pub fn with_config(mut self, config: &OrchestratorConfig) -> Self {
        self.retry = config.retry.clone();
        self.default_breaker = config.breaker.clone();
        self
    }

    /// Shares an existing registry.
    pub fn with_registry(mut self, registry: Arc<BreakerRegistry>) -> Self {
        self.registry = registry;
        self
    }

    /// Sets the retry policy.
    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Sets the default breaker settings.
    pub fn with_default_breaker(mut self, config: CircuitBreakerConfig) -> Self {
        self.default_breaker = config;
        self
    }

    /// Builds a retrying fetch over this context's transport.
    pub fn retrying_fetch(&self) -> RetryingFetch {
        RetryingFetch::new(
            Arc::clone(&self.transport),
            self.retry.clone(),
            Arc::clone(&self.clock),
        )
    }

    /// Builds the fetcher for `adapter`, registering its breaker.
    pub fn fetcher<A: SourceAdapter>(&self, adapter: A) -> ApiFetcher<A> {
        ApiFetcher::new(adapter, self)
    }
}
