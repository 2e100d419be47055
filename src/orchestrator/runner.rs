//! The sequential refresh orchestrator.

use crate::audit;
use crate::circuit_breaker::BreakerRegistry;
use crate::core::clock::{elapsed_since, ArcClock};
use crate::core::{
    ArcFetcher, IngestError, IngestResult, RefreshOutcome, SourceFetcher, SystemClock,
};
use crate::orchestrator::config::{OrchestratorConfig, DEFAULT_INTER_SOURCE_DELAY};
use crate::sources::IngestContext;
use crate::store::ArcStore;

use futures::FutureExt;
use serde::{Deserialize, Serialize};
use std::any::Any;
use std::collections::HashMap;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

/// Result of one orchestrator run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunSummary {
    /// Sum of `items_updated` over every source.
    pub total_updated: u64,

    /// `items_updated` per source name. Every source run has an entry,
    /// failed ones with 0.
    pub results: HashMap<String, u64>,

    /// Per-source outcomes, in run order.
    pub outcomes: Vec<RefreshOutcome>,

    /// Wall time of the run in milliseconds.
    pub duration_ms: u64,
}

impl RunSummary {
    /// Aggregates a run's outcomes.
    pub fn from_outcomes(outcomes: Vec<RefreshOutcome>, duration: Duration) -> Self {
        let mut results = HashMap::with_capacity(outcomes.len());
        for outcome in &outcomes {
            *results.entry(outcome.source_name.clone()).or_insert(0) += outcome.items_updated;
        }

        Self {
            total_updated: outcomes.iter().map(|o| o.items_updated).sum(),
            results,
            outcomes,
            duration_ms: duration.as_millis() as u64,
        }
    }

    /// Returns the names of the sources whose refresh failed.
    pub fn failed_sources(&self) -> impl Iterator<Item = &str> {
        self.outcomes
            .iter()
            .filter(|o| o.is_failed())
            .map(|o| o.source_name.as_str())
    }

    /// Returns `true` if no source failed.
    pub fn is_healthy(&self) -> bool {
        self.failed_sources().next().is_none()
    }
}

struct Entry {
    fetcher: ArcFetcher,
    delay_after: Option<Duration>,
}

/// Builder for creating an `Orchestrator`.
pub struct OrchestratorBuilder {
    entries: Vec<Entry>,
    clock: Option<ArcClock>,
    registry: Option<Arc<BreakerRegistry>>,
    store: Option<ArcStore>,
    inter_source_delay: Duration,
}

impl OrchestratorBuilder {
    /// Creates a new builder.
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
            clock: None,
            registry: None,
            store: None,
            inter_source_delay: DEFAULT_INTER_SOURCE_DELAY,
        }
    }

    /// Appends a fetcher, followed by the default inter-source delay.
    pub fn add_fetcher<F: SourceFetcher + 'static>(self, fetcher: F) -> Self {
        self.add_arc_fetcher(Arc::new(fetcher))
    }

    /// Appends a fetcher wrapped in an Arc.
    pub fn add_arc_fetcher(mut self, fetcher: ArcFetcher) -> Self {
        self.entries.push(Entry {
            fetcher,
            delay_after: None,
        });
        self
    }

    /// Appends a fetcher followed by its own delay, used instead of the
    /// default when another fetcher follows.
    pub fn add_fetcher_then_wait<F: SourceFetcher + 'static>(
        mut self,
        fetcher: F,
        delay: Duration,
    ) -> Self {
        self.entries.push(Entry {
            fetcher: Arc::new(fetcher),
            delay_after: Some(delay),
        });
        self
    }

    /// Sets the default delay between two fetchers.
    ///
    /// Defaults to [`DEFAULT_INTER_SOURCE_DELAY`].
    pub fn with_inter_source_delay(mut self, delay: Duration) -> Self {
        self.inter_source_delay = delay;
        self
    }

    /// Applies run-wide settings from `config`.
    pub fn with_config(self, config: &OrchestratorConfig) -> Self {
        self.with_inter_source_delay(config.inter_source_delay)
    }

    /// Sets the clock used for delays and timing.
    pub fn with_clock(mut self, clock: ArcClock) -> Self {
        self.clock = Some(clock);
        self
    }

    /// Reports this registry's breaker states after each run.
    pub fn with_registry(mut self, registry: Arc<BreakerRegistry>) -> Self {
        self.registry = Some(registry);
        self
    }

    /// Persists outcomes the orchestrator itself produces (panicked fetchers).
    pub fn with_store(mut self, store: ArcStore) -> Self {
        self.store = Some(store);
        self
    }

    /// Takes clock, registry and store from `context`.
    pub fn with_context(self, context: &IngestContext) -> Self {
        self.with_clock(Arc::clone(&context.clock))
            .with_registry(Arc::clone(&context.registry))
            .with_store(Arc::clone(&context.store))
    }

    /// Builds the orchestrator.
    pub fn build(self) -> IngestResult<Orchestrator> {
        if self.entries.is_empty() {
            return Err(IngestError::configuration(
                "At least one source fetcher is required",
            ));
        }

        Ok(Orchestrator {
            entries: self.entries,
            clock: self.clock.unwrap_or_else(SystemClock::shared),
            registry: self.registry,
            store: self.store,
            inter_source_delay: self.inter_source_delay,
        })
    }
}

impl Default for OrchestratorBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Runs a fixed, ordered set of source fetchers.
///
/// Fetchers run strictly one after another in registration order, with a
/// pause between them to respect third-party rate limits. No fetcher can
/// abort the run: failures arrive as `failed` outcomes, and a panicking
/// fetcher is caught and recorded as failed with zero items.
///
/// # Examples
///
/// ```rust,ignore
/// let orchestrator = Orchestrator::builder()
///     .with_context(&context)
///     .add_fetcher_then_wait(context.fetcher(celestrak), Duration::from_secs(2))
///     .add_fetcher(context.fetcher(launch_library))
///     .build()?;
///
/// let summary = orchestrator.run().await;
/// println!("{} records updated", summary.total_updated);
/// ```
pub struct Orchestrator {
    entries: Vec<Entry>,
    clock: ArcClock,
    registry: Option<Arc<BreakerRegistry>>,
    store: Option<ArcStore>,
    inter_source_delay: Duration,
}

impl Orchestrator {
    /// Creates a new builder.
    pub fn builder() -> OrchestratorBuilder {
        OrchestratorBuilder::new()
    }

    /// Returns the fetcher names, in run order.
    pub fn source_names(&self) -> Vec<&str> {
        self.entries.iter().map(|e| e.fetcher.name()).collect()
    }

    /// Refreshes every source once and summarizes the run.
    pub async fn run(&self) -> RunSummary {
        let started = self.clock.now();
        tracing::info!(sources = self.entries.len(), "Starting refresh run");

        let mut outcomes = Vec::with_capacity(self.entries.len());
        for (index, entry) in self.entries.iter().enumerate() {
            outcomes.push(self.refresh_isolated(&entry.fetcher).await);

            if index + 1 < self.entries.len() {
                let delay = entry.delay_after.unwrap_or(self.inter_source_delay);
                if !delay.is_zero() {
                    tracing::debug!(
                        delay_ms = delay.as_millis() as u64,
                        next = %self.entries[index + 1].fetcher.name(),
                        "Waiting before next source"
                    );
                    self.clock.sleep(delay).await;
                }
            }
        }

        let summary = RunSummary::from_outcomes(outcomes, elapsed_since(self.clock.now(), started));
        let failed: Vec<&str> = summary.failed_sources().collect();
        tracing::info!(
            total_updated = summary.total_updated,
            sources = summary.outcomes.len(),
            failed = ?failed,
            duration_ms = summary.duration_ms,
            "Refresh run finished"
        );
        audit::emit_run_summary(&summary);

        if let Some(registry) = &self.registry {
            for status in registry.snapshot() {
                audit::emit_breaker_status(&status);
            }
        }

        summary
    }

    async fn refresh_isolated(&self, fetcher: &ArcFetcher) -> RefreshOutcome {
        match AssertUnwindSafe(fetcher.refresh()).catch_unwind().await {
            Ok(outcome) => outcome,
            Err(panic) => {
                let message = panic_message(panic.as_ref());
                tracing::error!(
                    source = %fetcher.name(),
                    panic = %message,
                    "Source fetcher panicked"
                );
                let outcome = RefreshOutcome::failed(
                    fetcher.name(),
                    format!("fetcher panicked: {}", message),
                )
                .with_recorded_at(self.clock.now());

                if let Some(store) = &self.store {
                    if let Err(e) = store.record_outcome(&outcome).await {
                        tracing::error!(
                            source = %fetcher.name(),
                            error = %e,
                            "Failed to record refresh outcome"
                        );
                    }
                }
                audit::emit_refresh_completed(&outcome);
                outcome
            }
        }
    }
}

impl std::fmt::Debug for Orchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Orchestrator")
            .field("sources", &self.source_names())
            .field("inter_source_delay", &self.inter_source_delay)
            .finish()
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{ManualClock, OutcomeStatus};
    use crate::fetch::{FetchRequest, FetchResponse, MockTransport};
    use crate::sources::JsonApiSource;
    use crate::store::{MemoryStore, RecordStore};
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::Mutex;

    #[derive(Debug)]
    struct FixedFetcher {
        name: String,
        items: u64,
        log: Arc<Mutex<Vec<String>>>,
    }

    #[async_trait]
    impl SourceFetcher for FixedFetcher {
        fn name(&self) -> &str {
            &self.name
        }

        async fn refresh(&self) -> RefreshOutcome {
            self.log.lock().unwrap().push(self.name.clone());
            RefreshOutcome::new(&self.name, OutcomeStatus::Success).with_items(self.items, self.items)
        }
    }

    #[derive(Debug)]
    struct PanickingFetcher;

    #[async_trait]
    impl SourceFetcher for PanickingFetcher {
        fn name(&self) -> &str {
            "broken"
        }

        async fn refresh(&self) -> RefreshOutcome {
            panic!("index out of bounds");
        }
    }

    fn fixed(name: &str, items: u64, log: &Arc<Mutex<Vec<String>>>) -> FixedFetcher {
        FixedFetcher {
            name: name.to_string(),
            items,
            log: Arc::clone(log),
        }
    }

    fn items_page(ids: &[&str]) -> FetchResponse {
        let items: Vec<_> = ids.iter().map(|id| json!({ "id": id })).collect();
        FetchResponse::json_body(200, &json!(items))
    }

    #[tokio::test]
    async fn test_failing_middle_source_reports_zero() {
        let transport = MockTransport::new()
            .with_sticky("https://a.test/items", items_page(&["1", "2"]))
            .with_sticky("https://b.test/items", FetchResponse::new(500, ""))
            .with_sticky("https://c.test/items", items_page(&["x", "y", "z"]));
        let clock = Arc::new(ManualClock::new());
        let context = IngestContext::new(
            Arc::new(transport),
            Arc::new(MemoryStore::new()),
            clock.clone(),
        );

        let source = |name: &str, url: &str| {
            context.fetcher(JsonApiSource::new(name, "items").with_request(FetchRequest::get(url)))
        };
        let orchestrator = Orchestrator::builder()
            .with_context(&context)
            .add_fetcher(source("alpha", "https://a.test/items"))
            .add_fetcher(source("beta", "https://b.test/items"))
            .add_fetcher(source("gamma", "https://c.test/items"))
            .build()
            .unwrap();

        let summary = orchestrator.run().await;

        assert_eq!(summary.results.len(), 3);
        assert_eq!(summary.results["alpha"], 2);
        assert_eq!(summary.results["beta"], 0);
        assert_eq!(summary.results["gamma"], 3);
        assert_eq!(summary.total_updated, 5);
        assert_eq!(summary.failed_sources().collect::<Vec<_>>(), vec!["beta"]);
        assert!(!summary.is_healthy());

        let stored = context.store.outcomes(Default::default()).await.unwrap();
        assert_eq!(stored.len(), 3);
    }

    #[tokio::test]
    async fn test_runs_in_order_with_delays_between() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let clock = Arc::new(ManualClock::new());
        let orchestrator = Orchestrator::builder()
            .with_clock(clock.clone())
            .with_inter_source_delay(Duration::from_millis(1000))
            .add_fetcher_then_wait(fixed("first", 1, &log), Duration::from_millis(2500))
            .add_fetcher(fixed("second", 2, &log))
            .add_fetcher(fixed("third", 3, &log))
            .build()
            .unwrap();

        let summary = orchestrator.run().await;

        assert_eq!(*log.lock().unwrap(), vec!["first", "second", "third"]);
        // No delay after the last source.
        assert_eq!(
            clock.sleeps(),
            vec![Duration::from_millis(2500), Duration::from_millis(1000)]
        );
        assert_eq!(summary.duration_ms, 3500);
        assert_eq!(summary.total_updated, 6);
        let order: Vec<_> = summary.outcomes.iter().map(|o| o.source_name.as_str()).collect();
        assert_eq!(order, vec!["first", "second", "third"]);
    }

    #[tokio::test]
    async fn test_default_delay_between_sources() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let clock = Arc::new(ManualClock::new());
        let orchestrator = Orchestrator::builder()
            .with_clock(clock.clone())
            .add_fetcher(fixed("first", 1, &log))
            .add_fetcher(fixed("second", 1, &log))
            .build()
            .unwrap();

        orchestrator.run().await;

        assert_eq!(clock.sleeps(), vec![DEFAULT_INTER_SOURCE_DELAY]);
    }

    #[tokio::test]
    async fn test_panicking_fetcher_is_isolated() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let store = Arc::new(MemoryStore::new());
        let orchestrator = Orchestrator::builder()
            .with_clock(Arc::new(ManualClock::new()))
            .with_store(store.clone())
            .add_fetcher(fixed("before", 4, &log))
            .add_fetcher(PanickingFetcher)
            .add_fetcher(fixed("after", 5, &log))
            .build()
            .unwrap();

        let summary = orchestrator.run().await;

        assert_eq!(summary.total_updated, 9);
        assert_eq!(summary.results["broken"], 0);
        let broken = &summary.outcomes[1];
        assert!(broken.is_failed());
        assert!(broken
            .error_message
            .as_deref()
            .unwrap()
            .contains("index out of bounds"));
        assert_eq!(*log.lock().unwrap(), vec!["before", "after"]);

        let persisted = store.latest_outcome("broken").await.unwrap().unwrap();
        assert_eq!(persisted.id, broken.id);
    }

    #[test]
    fn test_build_requires_fetchers() {
        let result = Orchestrator::builder().build();
        assert!(matches!(result, Err(IngestError::Configuration { .. })));
    }

    #[test]
    fn test_summary_serializes() {
        let summary = RunSummary::from_outcomes(
            vec![RefreshOutcome::new("a", OutcomeStatus::Success).with_items(2, 2)],
            Duration::from_millis(40),
        );
        let json = serde_json::to_value(&summary).unwrap();
        assert_eq!(json["total_updated"], 2);
        assert_eq!(json["results"]["a"], 2);
        assert_eq!(json["duration_ms"], 40);
    }
}
