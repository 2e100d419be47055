//! Filesystem-backed store.

use crate::core::{Record, RefreshOutcome, StoreError, StoreResult, UpsertOutcome};
use crate::store::traits::{OutcomeFilter, RecordStore};

use async_trait::async_trait;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::RwLock;

/// A store that keeps one JSON document per record and per outcome.
///
/// Record file names are derived from a BLAKE3 digest of the natural key, so
/// arbitrary keys map to safe, fixed-length names and a key can only ever
/// occupy one file.
///
/// # Directory Structure
///
/// ```text
/// store/
/// ├── records/
/// │   └── {blake3(collection, key)}.json
/// └── outcomes/
///     └── {id}.json
/// ```
#[derive(Debug)]
pub struct FilesystemStore {
    base_path: PathBuf,
    records: RwLock<HashMap<String, Record>>,
    outcomes: RwLock<Vec<RefreshOutcome>>,
    // Serializes the compare-then-write sequence of upserts.
    write_lock: tokio::sync::Mutex<()>,
}

impl FilesystemStore {
    /// Opens (or creates) a store rooted at `base_path` and loads its index.
    pub fn open(base_path: impl Into<PathBuf>) -> StoreResult<Self> {
        let base_path = base_path.into();
        std::fs::create_dir_all(base_path.join("records"))?;
        std::fs::create_dir_all(base_path.join("outcomes"))?;

        let store = Self {
            base_path,
            records: RwLock::new(HashMap::new()),
            outcomes: RwLock::new(Vec::new()),
            write_lock: tokio::sync::Mutex::new(()),
        };
        store.load_index()?;
        Ok(store)
    }

    /// Returns the root directory.
    pub fn base_path(&self) -> &Path {
        &self.base_path
    }

    fn records_dir(&self) -> PathBuf {
        self.base_path.join("records")
    }

    fn outcomes_dir(&self) -> PathBuf {
        self.base_path.join("outcomes")
    }

    fn record_path(&self, file_key: &str) -> PathBuf {
        self.records_dir().join(format!("{}.json", file_key))
    }

    fn outcome_path(&self, id: &str) -> PathBuf {
        self.outcomes_dir().join(format!("{}.json", id))
    }

    fn load_index(&self) -> StoreResult<()> {
        let mut records = self
            .records
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        for record in read_json_dir::<Record>(&self.records_dir())? {
            records.insert(file_key(&record.collection, &record.key), record);
        }

        let mut outcomes = self
            .outcomes
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        outcomes.extend(read_json_dir::<RefreshOutcome>(&self.outcomes_dir())?);

        tracing::debug!(
            records = records.len(),
            outcomes = outcomes.len(),
            path = %self.base_path.display(),
            "Loaded store index"
        );
        Ok(())
    }
}

/// Digest of the natural key used as the record's file name.
///
/// The collection is length-prefixed so no pair of fields can collide.
fn file_key(collection: &str, key: &str) -> String {
    let mut hasher = blake3::Hasher::new();
    hasher.update(&(collection.len() as u64).to_le_bytes());
    hasher.update(collection.as_bytes());
    hasher.update(key.as_bytes());
    hasher.finalize().to_hex().to_string()
}

/// Reads every parseable `*.json` document in `dir`. Unreadable files are
/// skipped with a warning.
fn read_json_dir<T: serde::de::DeserializeOwned>(dir: &Path) -> StoreResult<Vec<T>> {
    let mut items = Vec::new();
    for entry in std::fs::read_dir(dir)?.filter_map(|e| e.ok()) {
        let path = entry.path();
        if path.extension().and_then(|s| s.to_str()) != Some("json") {
            continue;
        }
        let parsed = std::fs::read_to_string(&path)
            .map_err(StoreError::from)
            .and_then(|content| serde_json::from_str::<T>(&content).map_err(StoreError::from));
        match parsed {
            Ok(item) => items.push(item),
            Err(e) => tracing::warn!(path = %path.display(), error = %e, "Skipping unreadable store file"),
        }
    }
    Ok(items)
}

#[async_trait]
impl RecordStore for FilesystemStore {
    async fn upsert(&self, record: Record) -> StoreResult<UpsertOutcome> {
        let _guard = self.write_lock.lock().await;
        let file_key = file_key(&record.collection, &record.key);

        let outcome = {
            let records = self
                .records
                .read()
                .unwrap_or_else(|poisoned| poisoned.into_inner());
            match records.get(&file_key) {
                None => UpsertOutcome::Created,
                Some(existing) if existing.data == record.data => {
                    return Ok(UpsertOutcome::Unchanged)
                }
                Some(_) => UpsertOutcome::Updated,
            }
        };

        let content = serde_json::to_vec_pretty(&record)?;
        tokio::fs::write(self.record_path(&file_key), content).await?;

        self.records
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .insert(file_key, record);
        Ok(outcome)
    }

    async fn get(&self, collection: &str, key: &str) -> StoreResult<Option<Record>> {
        Ok(self
            .records
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .get(&file_key(collection, key))
            .cloned())
    }

    async fn list(&self, collection: &str) -> StoreResult<Vec<Record>> {
        let mut selected: Vec<Record> = self
            .records
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .values()
            .filter(|r| r.collection == collection)
            .cloned()
            .collect();
        selected.sort_by(|a, b| a.key.cmp(&b.key));
        Ok(selected)
    }

    async fn record_outcome(&self, outcome: &RefreshOutcome) -> StoreResult<()> {
        let _guard = self.write_lock.lock().await;
        let content = serde_json::to_vec_pretty(outcome)?;
        tokio::fs::write(self.outcome_path(&outcome.id), content).await?;

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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::OutcomeStatus;
    use serde_json::json;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_upsert_and_reopen() {
        let temp_dir = TempDir::new().unwrap();

        {
            let store = FilesystemStore::open(temp_dir.path()).unwrap();
            let record = Record::new("satellites", "25544", json!({ "name": "ISS" }), "celestrak");
            assert_eq!(store.upsert(record.clone()).await.unwrap(), UpsertOutcome::Created);
            assert_eq!(store.upsert(record).await.unwrap(), UpsertOutcome::Unchanged);

            let moved = Record::new(
                "satellites",
                "25544",
                json!({ "name": "ISS (ZARYA)" }),
                "celestrak",
            );
            assert_eq!(store.upsert(moved).await.unwrap(), UpsertOutcome::Updated);
            store
                .record_outcome(&RefreshOutcome::new("celestrak", OutcomeStatus::Success))
                .await
                .unwrap();
        }

        let reopened = FilesystemStore::open(temp_dir.path()).unwrap();
        let record = reopened.get("satellites", "25544").await.unwrap().unwrap();
        assert_eq!(record.data["name"], "ISS (ZARYA)");
        assert_eq!(reopened.count("satellites").await.unwrap(), 1);
        assert!(reopened.latest_outcome("celestrak").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_list_sorted_by_key() {
        let temp_dir = TempDir::new().unwrap();
        let store = FilesystemStore::open(temp_dir.path()).unwrap();
        for key in ["c", "a", "b"] {
            store
                .upsert(Record::new("letters", key, json!(key), "src"))
                .await
                .unwrap();
        }

        let keys: Vec<_> = store
            .list("letters")
            .await
            .unwrap()
            .into_iter()
            .map(|r| r.key)
            .collect();
        assert_eq!(keys, vec!["a", "b", "c"]);
    }

    #[tokio::test]
    async fn test_corrupt_file_skipped() {
        let temp_dir = TempDir::new().unwrap();
        let store = FilesystemStore::open(temp_dir.path()).unwrap();
        std::fs::write(store.records_dir().join("garbage.json"), "{ not json").unwrap();

        let reopened = FilesystemStore::open(temp_dir.path()).unwrap();
        assert_eq!(reopened.count("anything").await.unwrap(), 0);
    }

    #[test]
    fn test_file_key_separates_fields() {
        assert_ne!(file_key("ab", "c"), file_key("a", "bc"));
        assert_ne!(file_key("a\0", "b"), file_key("a", "\0b"));
        assert_eq!(file_key("a", "b").len(), 64);
    }
}
