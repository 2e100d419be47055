//! In-memory store.

use crate::core::{Record, RefreshOutcome, StoreError, StoreResult, UpsertOutcome};
use crate::store::traits::{OutcomeFilter, RecordStore};

use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::RwLock;

/// A store that keeps everything in process memory.
///
/// Useful for tests, demos and short-lived jobs. Writes can be made to fail
/// on demand to exercise error handling.
#[derive(Debug, Default)]
pub struct MemoryStore {
    records: RwLock<BTreeMap<(String, String), Record>>,
    outcomes: RwLock<Vec<RefreshOutcome>>,
    fail_writes: AtomicBool,
}

impl MemoryStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every subsequent write fail (or succeed again).
    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::Relaxed);
    }

    /// Returns the total number of records across collections.
    pub fn total_records(&self) -> usize {
        self.records
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .len()
    }

    fn check_writable(&self) -> StoreResult<()> {
        if self.fail_writes.load(Ordering::Relaxed) {
            return Err(StoreError::WriteFailed {
                reason: "memory store configured to reject writes".into(),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl RecordStore for MemoryStore {
    async fn upsert(&self, record: Record) -> StoreResult<UpsertOutcome> {
        self.check_writable()?;
        let mut records = self
            .records
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        let key = (record.collection.clone(), record.key.clone());

        let outcome = match records.get(&key) {
            None => UpsertOutcome::Created,
            Some(existing) if existing.data == record.data => return Ok(UpsertOutcome::Unchanged),
            Some(_) => UpsertOutcome::Updated,
        };
        records.insert(key, record);
        Ok(outcome)
    }

    async fn get(&self, collection: &str, key: &str) -> StoreResult<Option<Record>> {
        Ok(self
            .records
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .get(&(collection.to_string(), key.to_string()))
            .cloned())
    }

    async fn list(&self, collection: &str) -> StoreResult<Vec<Record>> {
        Ok(self
            .records
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .values()
            .filter(|r| r.collection == collection)
            .cloned()
            .collect())
    }

    async fn record_outcome(&self, outcome: &RefreshOutcome) -> StoreResult<()> {
        self.check_writable()?;
        self.outcomes
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(outcome.clone());
        Ok(())
    }

    async fn outcomes(&self, filter: OutcomeFilter) -> StoreResult<Vec<RefreshOutcome>> {
        let outcomes = self
            .outcomes
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        Ok(filter.apply(outcomes.iter()))
    }
}
