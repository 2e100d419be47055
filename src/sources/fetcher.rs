//! The composed fetch, transform and store pipeline for one dependency.

use crate::audit;
use crate::circuit_breaker::CircuitBreaker;
use crate::core::clock::{elapsed_since, ArcClock};
use crate::core::{
    IngestError, OutcomeStatus, Record, RefreshOutcome, SourceFetcher, StoreError,
};
use crate::fetch::RetryingFetch;
use crate::sources::adapter::SourceAdapter;
use crate::sources::context::IngestContext;
use crate::store::ArcStore;

use async_trait::async_trait;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

/// Refreshes one dependency through its circuit breaker.
///
/// Each request of the adapter runs as
/// `breaker.execute(retrying_fetch)` without fallback. Successful
/// responses are transformed and upserted; a failed request is counted and
/// the refresh moves on. A circuit-open rejection ends the refresh early,
/// since every remaining request would be shed as well.
///
/// The refresh never fails: its result is a [`RefreshOutcome`], which is
/// also written to the store and emitted as an audit event.
#[derive(Debug)]
pub struct ApiFetcher<A> {
    adapter: A,
    breaker: Arc<CircuitBreaker>,
    fetch: RetryingFetch,
    store: ArcStore,
    clock: ArcClock,
}

/// Running counters of one refresh.
#[derive(Debug, Default)]
struct Tally {
    succeeded: usize,
    failed: usize,
    updated: u64,
    checked: u64,
    first_error: Option<String>,
}

impl Tally {
    fn record_failure(&mut self, error: &IngestError) {
        self.failed += 1;
        if self.first_error.is_none() {
            self.first_error = Some(error.to_string());
        }
    }
}

impl<A: SourceAdapter> ApiFetcher<A> {
    /// Creates a fetcher for `adapter`, registering its breaker in the
    /// context's registry.
    pub fn new(adapter: A, context: &IngestContext) -> Self {
        let config = adapter
            .breaker_config()
            .unwrap_or_else(|| context.default_breaker.clone());
        let breaker = context.registry.get_or_create(adapter.name(), Some(config));

        Self {
            adapter,
            breaker,
            fetch: context.retrying_fetch(),
            store: Arc::clone(&context.store),
            clock: Arc::clone(&context.clock),
        }
    }

    /// Returns the adapter.
    pub fn adapter(&self) -> &A {
        &self.adapter
    }

    /// Returns the breaker guarding this dependency.
    pub fn breaker(&self) -> &Arc<CircuitBreaker> {
        &self.breaker
    }

    async fn store_records(&self, records: Vec<Record>, tally: &mut Tally) -> Result<(), StoreError> {
        for record in records {
            tally.checked += 1;
            let record = record.with_fetched_at(self.clock.now());
            if self.store.upsert(record).await?.is_change() {
                tally.updated += 1;
            }
        }
        Ok(())
    }
}

#[async_trait]
impl<A: SourceAdapter> SourceFetcher for ApiFetcher<A> {
    fn name(&self) -> &str {
        self.adapter.name()
    }

    async fn refresh(&self) -> RefreshOutcome {
        let name = self.adapter.name();
        let requests = self.adapter.requests();
        let delay = self.adapter.request_delay();
        let started = self.clock.now();
        let calls = AtomicU32::new(0);
        let mut tally = Tally::default();

        audit::emit_refresh_started(name, requests.len());

        for (index, request) in requests.iter().enumerate() {
            if index > 0 && !delay.is_zero() {
                self.clock.sleep(delay).await;
            }

            let result = self
                .breaker
                .execute(|| self.fetch.fetch_counted(name, request, &calls), None)
                .await;

            let response = match result {
                Ok(response) => response,
                Err(error) if error.is_circuit_open() => {
                    let skipped = requests.len() - index;
                    tracing::debug!(
                        source = %name,
                        skipped = skipped,
                        "Circuit open, skipping remaining requests"
                    );
                    tally.record_failure(&error);
                    tally.failed += skipped - 1;
                    break;
                }
                Err(error) => {
                    tracing::warn!(
                        source = %name,
                        url = %request.url,
                        error = %error,
                        "Request failed"
                    );
                    tally.record_failure(&error);
                    continue;
                }
            };

            let records = match self.adapter.transform(&response) {
                Ok(records) => records,
                Err(error) => {
                    tracing::warn!(
                        source = %name,
                        url = %request.url,
                        error = %error,
                        "Payload rejected"
                    );
                    tally.record_failure(&error);
                    continue;
                }
            };

            match self.store_records(records, &mut tally).await {
                Ok(()) => tally.succeeded += 1,
                Err(error) => {
                    let error = IngestError::from(error);
                    tracing::error!(source = %name, error = %error, "Failed to store records");
                    tally.record_failure(&error);
                }
            }
        }

        let now = self.clock.now();
        let mut outcome = RefreshOutcome::new(
            name,
            OutcomeStatus::from_counts(tally.succeeded, tally.failed),
        )
        .with_items(tally.updated, tally.checked)
        .with_api_calls(calls.load(Ordering::Relaxed))
        .with_duration(elapsed_since(now, started))
        .with_recorded_at(now);
        if let Some(message) = tally.first_error {
            outcome = outcome.with_error(message);
        }

        tracing::info!(
            source = %name,
            outcome = %outcome.outcome,
            items_updated = outcome.items_updated,
            items_checked = outcome.items_checked,
            api_calls = outcome.api_calls_made,
            duration_ms = outcome.duration_ms,
            "Source refreshed"
        );

        if let Err(e) = self.store.record_outcome(&outcome).await {
            tracing::error!(source = %name, error = %e, "Failed to record refresh outcome");
        }
        audit::emit_refresh_completed(&outcome);

        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::circuit_breaker::{BreakerState, CircuitBreakerConfig};
    use crate::core::{Clock, ManualClock};
    use crate::fetch::{FetchRequest, FetchResponse, MockTransport, RetryPolicy};
    use crate::sources::JsonApiSource;
    use crate::store::{MemoryStore, RecordStore};
    use serde_json::json;
    use std::time::Duration;

    const PAGE_1: &str = "https://api.test/items?page=1";
    const PAGE_2: &str = "https://api.test/items?page=2";
    const PAGE_3: &str = "https://api.test/items?page=3";

    struct Harness {
        transport: Arc<MockTransport>,
        store: Arc<MemoryStore>,
        clock: Arc<ManualClock>,
        context: IngestContext,
    }

    fn harness(transport: MockTransport) -> Harness {
        let transport = Arc::new(transport);
        let store = Arc::new(MemoryStore::new());
        let clock = Arc::new(ManualClock::new());
        let context = IngestContext::new(transport.clone(), store.clone(), clock.clone());
        Harness {
            transport,
            store,
            clock,
            context,
        }
    }

    fn page(ids: &[&str]) -> FetchResponse {
        let items: Vec<_> = ids.iter().map(|id| json!({ "id": id })).collect();
        FetchResponse::json_body(200, &json!({ "results": items }))
    }

    fn source(urls: &[&str]) -> JsonApiSource {
        urls.iter().fold(
            JsonApiSource::new("items-api", "items").with_items_at("/results"),
            |source, url| source.with_request(FetchRequest::get(*url)),
        )
    }

    #[tokio::test]
    async fn test_all_requests_succeed() {
        let h = harness(
            MockTransport::new()
                .with_sticky(PAGE_1, page(&["a", "b"]))
                .with_sticky(PAGE_2, page(&["c"])),
        );
        let fetcher = h.context.fetcher(source(&[PAGE_1, PAGE_2]));

        let outcome = fetcher.refresh().await;

        assert_eq!(outcome.outcome, OutcomeStatus::Success);
        assert_eq!(outcome.items_updated, 3);
        assert_eq!(outcome.items_checked, 3);
        assert_eq!(outcome.api_calls_made, 2);
        assert!(outcome.error_message.is_none());
        assert_eq!(h.store.count("items").await.unwrap(), 3);

        let stored = h.store.latest_outcome("items-api").await.unwrap().unwrap();
        assert_eq!(stored.id, outcome.id);
    }

    #[tokio::test]
    async fn test_records_stamped_with_context_clock() {
        let h = harness(MockTransport::new().with_sticky(PAGE_1, page(&["a"])));
        h.clock.advance(Duration::from_secs(3_600));
        let fetcher = h.context.fetcher(source(&[PAGE_1]));

        fetcher.refresh().await;

        let stored = h.store.get("items", "a").await.unwrap().unwrap();
        assert_eq!(stored.fetched_at, h.clock.now());
    }

    #[tokio::test]
    async fn test_unchanged_records_not_counted_as_updated() {
        let h = harness(MockTransport::new().with_sticky(PAGE_1, page(&["a", "b"])));
        let fetcher = h.context.fetcher(source(&[PAGE_1]));

        assert_eq!(fetcher.refresh().await.items_updated, 2);
        let second = fetcher.refresh().await;
        assert_eq!(second.items_updated, 0);
        assert_eq!(second.items_checked, 2);
        assert_eq!(h.store.count("items").await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_partial_when_one_request_fails() {
        let h = harness(
            MockTransport::new()
                .with_sticky(PAGE_1, page(&["a"]))
                .with_sticky(PAGE_2, FetchResponse::new(500, "")),
        );
        let fetcher = h.context.fetcher(source(&[PAGE_1, PAGE_2]));

        let outcome = fetcher.refresh().await;

        assert_eq!(outcome.outcome, OutcomeStatus::Partial);
        assert_eq!(outcome.items_updated, 1);
        // one call for page 1, three attempts for page 2
        assert_eq!(outcome.api_calls_made, 4);
        assert!(outcome.error_message.unwrap().contains("500"));
        assert_eq!(fetcher.breaker().status().failures, 1);
    }

    #[tokio::test]
    async fn test_open_circuit_stops_remaining_requests() {
        let h = harness(MockTransport::new().with_sticky(PAGE_1, FetchResponse::new(503, "")));
        let context = h.context.clone().with_retry_policy(RetryPolicy::no_retry());
        let fetcher = context.fetcher(
            source(&[PAGE_1, PAGE_2, PAGE_3])
                .with_breaker_config(CircuitBreakerConfig::new().with_failure_threshold(1)),
        );

        let outcome = fetcher.refresh().await;

        assert_eq!(outcome.outcome, OutcomeStatus::Failed);
        assert_eq!(outcome.items_updated, 0);
        assert_eq!(outcome.api_calls_made, 1);
        assert_eq!(h.transport.requested_urls(), vec![PAGE_1.to_string()]);
        assert_eq!(fetcher.breaker().state(), BreakerState::Open);

        // A later run while still open makes no calls at all.
        let outcome = fetcher.refresh().await;
        assert_eq!(outcome.outcome, OutcomeStatus::Failed);
        assert_eq!(outcome.api_calls_made, 0);
        assert!(outcome.error_message.unwrap().contains("circuit breaker open"));
        assert_eq!(h.transport.call_count(), 1);
    }

    #[tokio::test]
    async fn test_request_delay_between_requests_only() {
        let h = harness(
            MockTransport::new()
                .with_sticky(PAGE_1, page(&["a"]))
                .with_sticky(PAGE_2, page(&["b"]))
                .with_sticky(PAGE_3, page(&["c"])),
        );
        let fetcher = h.context.fetcher(
            source(&[PAGE_1, PAGE_2, PAGE_3]).with_request_delay(Duration::from_millis(250)),
        );

        let outcome = fetcher.refresh().await;

        assert_eq!(outcome.outcome, OutcomeStatus::Success);
        assert_eq!(
            h.clock.sleeps(),
            vec![Duration::from_millis(250), Duration::from_millis(250)]
        );
        assert_eq!(outcome.duration_ms, 500);
    }

    #[tokio::test]
    async fn test_invalid_payload_counts_as_failed_request() {
        let h = harness(MockTransport::new().with_sticky(PAGE_1, FetchResponse::new(200, "oops")));
        let fetcher = h.context.fetcher(source(&[PAGE_1]));

        let outcome = fetcher.refresh().await;

        assert_eq!(outcome.outcome, OutcomeStatus::Failed);
        // The fetch itself succeeded, so the breaker saw a success.
        assert_eq!(fetcher.breaker().status().failures, 0);
    }

    #[tokio::test]
    async fn test_store_failure_yields_failed_outcome() {
        let h = harness(MockTransport::new().with_sticky(PAGE_1, page(&["a"])));
        h.store.set_fail_writes(true);
        let fetcher = h.context.fetcher(source(&[PAGE_1]));

        let outcome = fetcher.refresh().await;

        assert_eq!(outcome.outcome, OutcomeStatus::Failed);
        assert!(outcome.error_message.unwrap().contains("write failed"));
        assert_eq!(h.store.total_records(), 0);
    }

    #[tokio::test]
    async fn test_fetchers_share_registry_breakers() {
        let h = harness(MockTransport::new());
        let first = h.context.fetcher(source(&[PAGE_1]));
        let second = h.context.fetcher(source(&[PAGE_2]));

        assert!(Arc::ptr_eq(first.breaker(), second.breaker()));
        assert_eq!(h.context.registry.len(), 1);
    }
}
