//! Persistent store trait definition.

use crate::core::{OutcomeStatus, Record, RefreshOutcome, StoreResult, UpsertOutcome};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::fmt::Debug;
use std::sync::Arc;

/// Persistence for normalized records and refresh outcomes.
///
/// Records are written with create-or-update semantics on their natural key
/// `(collection, key)`; a store never holds two records under one key.
/// Refresh outcomes are append-only.
///
/// # Example Implementation
///
/// ```rust,ignore
/// use ingestbridge::core::{Record, RefreshOutcome, StoreResult, UpsertOutcome};
/// use ingestbridge::store::{OutcomeFilter, RecordStore};
/// use async_trait::async_trait;
///
/// #[derive(Debug)]
/// struct PostgresStore { /* pool */ }
///
/// #[async_trait]
/// impl RecordStore for PostgresStore {
///     async fn upsert(&self, record: Record) -> StoreResult<UpsertOutcome> {
///         // INSERT ... ON CONFLICT (collection, key) DO UPDATE ...
///         todo!()
///     }
///
///     async fn get(&self, collection: &str, key: &str) -> StoreResult<Option<Record>> {
///         todo!()
///     }
///
///     async fn list(&self, collection: &str) -> StoreResult<Vec<Record>> {
///         todo!()
///     }
///
///     async fn record_outcome(&self, outcome: &RefreshOutcome) -> StoreResult<()> {
///         todo!()
///     }
///
///     async fn outcomes(&self, filter: OutcomeFilter) -> StoreResult<Vec<RefreshOutcome>> {
///         todo!()
///     }
/// }
/// ```
#[async_trait]
pub trait RecordStore: Send + Sync + Debug {
    /// Creates or updates the record stored under its natural key.
    ///
    /// Returns [`UpsertOutcome::Unchanged`] without rewriting anything when
    /// the stored data is identical.
    async fn upsert(&self, record: Record) -> StoreResult<UpsertOutcome>;

    /// Returns the record stored under `(collection, key)`.
    async fn get(&self, collection: &str, key: &str) -> StoreResult<Option<Record>>;

    /// Returns every record of `collection`, ordered by key.
    async fn list(&self, collection: &str) -> StoreResult<Vec<Record>>;

    /// Appends a refresh outcome.
    async fn record_outcome(&self, outcome: &RefreshOutcome) -> StoreResult<()>;

    /// Returns refresh outcomes matching `filter`, newest first.
    async fn outcomes(&self, filter: OutcomeFilter) -> StoreResult<Vec<RefreshOutcome>>;

    /// Returns the number of records in `collection`.
    async fn count(&self, collection: &str) -> StoreResult<usize> {
        Ok(self.list(collection).await?.len())
    }

    /// Returns the most recent outcome recorded for `source_name`.
    async fn latest_outcome(&self, source_name: &str) -> StoreResult<Option<RefreshOutcome>> {
        let filter = OutcomeFilter::new()
            .with_source_name(source_name)
            .with_limit(1);
        Ok(self.outcomes(filter).await?.into_iter().next())
    }
}

/// An arc-wrapped store for shared ownership.
pub type ArcStore = Arc<dyn RecordStore>;

/// Criteria for listing refresh outcomes.
#[derive(Debug, Clone, Default)]
pub struct OutcomeFilter {
    /// Filter by source name.
    pub source_name: Option<String>,

    /// Filter by outcome classification.
    pub outcome: Option<OutcomeStatus>,

    /// Only outcomes recorded at or after this instant.
    pub recorded_after: Option<DateTime<Utc>>,

    /// Maximum number of outcomes to return.
    pub limit: Option<usize>,
}

impl OutcomeFilter {
    /// Creates a new empty filter.
    pub fn new() -> Self {
        Self::default()
    }

    /// Filters by source name.
    pub fn with_source_name(mut self, source_name: impl Into<String>) -> Self {
        self.source_name = Some(source_name.into());
        self
    }

    /// Filters by outcome classification.
    pub fn with_outcome(mut self, outcome: OutcomeStatus) -> Self {
        self.outcome = Some(outcome);
        self
    }

    /// Only returns outcomes recorded at or after `after`.
    pub fn with_recorded_after(mut self, after: DateTime<Utc>) -> Self {
        self.recorded_after = Some(after);
        self
    }

    /// Limits the number of results.
    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Returns `true` if `outcome` passes the filter.
    pub fn matches(&self, outcome: &RefreshOutcome) -> bool {
        if let Some(name) = &self.source_name {
            if &outcome.source_name != name {
                return false;
            }
        }
        if let Some(status) = self.outcome {
            if outcome.outcome != status {
                return false;
            }
        }
        if let Some(after) = self.recorded_after {
            if outcome.recorded_at < after {
                return false;
            }
        }
        true
    }

    /// Filters, sorts newest first and truncates `outcomes`.
    pub(crate) fn apply<'a>(
        &self,
        outcomes: impl Iterator<Item = &'a RefreshOutcome>,
    ) -> Vec<RefreshOutcome> {
        let mut selected: Vec<_> = outcomes.filter(|o| self.matches(o)).cloned().collect();
        selected.sort_by(|a, b| b.recorded_at.cmp(&a.recorded_at));
        if let Some(limit) = self.limit {
            selected.truncate(limit);
        }
        selected
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_filter_matches() {
        let outcome = RefreshOutcome::failed("fcc", "down");

        assert!(OutcomeFilter::new().matches(&outcome));
        assert!(OutcomeFilter::new().with_source_name("fcc").matches(&outcome));
        assert!(!OutcomeFilter::new().with_source_name("sec").matches(&outcome));
        assert!(OutcomeFilter::new()
            .with_outcome(OutcomeStatus::Failed)
            .matches(&outcome));
        assert!(!OutcomeFilter::new()
            .with_outcome(OutcomeStatus::Success)
            .matches(&outcome));
    }

    #[test]
    fn test_filter_apply_sorts_newest_first() {
        let base = Utc::now();
        let outcomes = vec![
            RefreshOutcome::new("a", OutcomeStatus::Success).with_recorded_at(base),
            RefreshOutcome::new("a", OutcomeStatus::Partial)
                .with_recorded_at(base + chrono::Duration::seconds(10)),
            RefreshOutcome::new("a", OutcomeStatus::Failed)
                .with_recorded_at(base + chrono::Duration::seconds(5)),
        ];

        let selected = OutcomeFilter::new().with_limit(2).apply(outcomes.iter());
        assert_eq!(selected.len(), 2);
        assert_eq!(selected[0].outcome, OutcomeStatus::Partial);
        assert_eq!(selected[1].outcome, OutcomeStatus::Failed);
    }
}
