//! Core traits for the ingestbridge library.
//!
//! This module defines the `SourceFetcher` trait that the orchestrator
//! drives, one implementation per external dependency.

use crate::core::types::RefreshOutcome;

use async_trait::async_trait;
use std::fmt::Debug;
use std::sync::Arc;

/// A refreshable data source.
///
/// Implementations fetch from one external dependency, persist what they
/// fetched and report a [`RefreshOutcome`].
///
/// # Implementation Notes
///
/// - `refresh` is infallible by contract: network, breaker and store
///   failures must be converted into a failed or partial outcome.
/// - Implementations must be `Send + Sync`; the orchestrator holds them
///   behind `Arc`.
///
/// # Example Implementation
///
/// ```rust,ignore
/// use ingestbridge::core::{OutcomeStatus, RefreshOutcome, SourceFetcher};
/// use async_trait::async_trait;
///
/// #[derive(Debug)]
/// struct StaticSource;
///
/// #[async_trait]
/// impl SourceFetcher for StaticSource {
///     fn name(&self) -> &str {
///         "static"
///     }
///
///     async fn refresh(&self) -> RefreshOutcome {
///         RefreshOutcome::new("static", OutcomeStatus::Success)
///     }
/// }
/// ```
#[async_trait]
pub trait SourceFetcher: Send + Sync + Debug {
    /// Returns the name of the source.
    ///
    /// This is also the name of the circuit breaker guarding the source's
    /// dependency, and the key under which the orchestrator reports results.
    fn name(&self) -> &str;

    /// Runs one refresh and reports what happened.
    async fn refresh(&self) -> RefreshOutcome;
}

/// An arc-wrapped fetcher for shared ownership.
pub type ArcFetcher = Arc<dyn SourceFetcher>;
