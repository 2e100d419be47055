//! Core types used throughout the ingestbridge library.
//!
//! This module defines the normalized record written to the store and the
//! per-source refresh outcome record.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// A normalized record produced by a source adapter.
///
/// `(collection, key)` is the record's natural key; writing the same pair
/// twice updates the existing record instead of duplicating it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    /// Logical table/collection the record belongs to (e.g. "launches").
    pub collection: String,

    /// Natural key, unique within the collection.
    pub key: String,

    /// Normalized payload.
    pub data: serde_json::Value,

    /// Name of the source that produced the record.
    pub source_name: String,

    /// When the record was fetched.
    pub fetched_at: DateTime<Utc>,
}

impl Record {
    /// Creates a new record fetched now.
    pub fn new(
        collection: impl Into<String>,
        key: impl Into<String>,
        data: serde_json::Value,
        source_name: impl Into<String>,
    ) -> Self {
        Self {
            collection: collection.into(),
            key: key.into(),
            data,
            source_name: source_name.into(),
            fetched_at: Utc::now(),
        }
    }

    /// Sets the fetch timestamp.
    pub fn with_fetched_at(mut self, fetched_at: DateTime<Utc>) -> Self {
        self.fetched_at = fetched_at;
        self
    }
}

/// What an upsert did to the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UpsertOutcome {
    /// No record existed under the key; one was created.
    Created,
    /// A record existed and its data changed.
    Updated,
    /// A record existed with identical data.
    Unchanged,
}

impl UpsertOutcome {
    /// Returns `true` if the write changed stored data.
    pub fn is_change(&self) -> bool {
        !matches!(self, Self::Unchanged)
    }
}

/// Classification of a single source refresh.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutcomeStatus {
    /// Every request of the refresh succeeded.
    Success,
    /// Some requests succeeded, some failed.
    Partial,
    /// Nothing was fetched.
    Failed,
}

impl OutcomeStatus {
    /// Derives the status from request counts.
    pub fn from_counts(succeeded: usize, failed: usize) -> Self {
        match (succeeded, failed) {
            (_, 0) => Self::Success,
            (0, _) => Self::Failed,
            _ => Self::Partial,
        }
    }
}

impl fmt::Display for OutcomeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Success => write!(f, "success"),
            Self::Partial => write!(f, "partial"),
            Self::Failed => write!(f, "failed"),
        }
    }
}

/// The persisted record of one refresh of one source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RefreshOutcome {
    /// Unique identifier for this outcome.
    pub id: String,

    /// Name of the refreshed source.
    pub source_name: String,

    /// Overall classification.
    pub outcome: OutcomeStatus,

    /// Records created or changed.
    pub items_updated: u64,

    /// Records produced by the source, changed or not.
    pub items_checked: u64,

    /// HTTP calls made, retries included.
    pub api_calls_made: u32,

    /// Wall time of the refresh in milliseconds.
    pub duration_ms: u64,

    /// First error encountered, if any.
    pub error_message: Option<String>,

    /// When the outcome was recorded.
    pub recorded_at: DateTime<Utc>,
}

impl RefreshOutcome {
    /// Creates an outcome with zero counters.
    pub fn new(source_name: impl Into<String>, outcome: OutcomeStatus) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            source_name: source_name.into(),
            outcome,
            items_updated: 0,
            items_checked: 0,
            api_calls_made: 0,
            duration_ms: 0,
            error_message: None,
            recorded_at: Utc::now(),
        }
    }

    /// Creates a failed outcome carrying `error`.
    pub fn failed(source_name: impl Into<String>, error: impl fmt::Display) -> Self {
        Self::new(source_name, OutcomeStatus::Failed).with_error(error)
    }

    /// Sets the item counters.
    pub fn with_items(mut self, updated: u64, checked: u64) -> Self {
        self.items_updated = updated;
        self.items_checked = checked;
        self
    }

    /// Sets the API call counter.
    pub fn with_api_calls(mut self, calls: u32) -> Self {
        self.api_calls_made = calls;
        self
    }

    /// Sets the duration.
    pub fn with_duration(mut self, duration: Duration) -> Self {
        self.duration_ms = duration.as_millis() as u64;
        self
    }

    /// Sets the error message.
    pub fn with_error(mut self, error: impl fmt::Display) -> Self {
        self.error_message = Some(error.to_string());
        self
    }

    /// Sets the recording timestamp.
    pub fn with_recorded_at(mut self, recorded_at: DateTime<Utc>) -> Self {
        self.recorded_at = recorded_at;
        self
    }

    /// Returns `true` if the refresh failed outright.
    pub fn is_failed(&self) -> bool {
        self.outcome == OutcomeStatus::Failed
    }
}

/// Serializes a `Duration` as integer milliseconds.
pub(crate) mod duration_ms {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        (duration.as_millis() as u64).serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let millis = u64::deserialize(deserializer)?;
        Ok(Duration::from_millis(millis))
    }
}
