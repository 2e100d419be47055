//! Core types and traits for the ingestbridge library.
//!
//! This module provides the fundamental building blocks used throughout
//! the library:
//!
//! - [`types`] - Records, upsert results and refresh outcomes
//! - [`traits`] - The `SourceFetcher` trait
//! - [`error`] - Structured error types
//! - [`clock`] - Injectable time source

pub mod clock;
pub mod error;
pub mod traits;
pub mod types;

// Re-export commonly used types at the core level
pub use clock::{elapsed_since, ArcClock, Clock, ManualClock, SystemClock};
pub use error::{IngestError, IngestResult, StoreError, StoreResult, TransportError};
pub use traits::{ArcFetcher, SourceFetcher};
pub use types::{OutcomeStatus, Record, RefreshOutcome, UpsertOutcome};
