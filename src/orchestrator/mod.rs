//! Sequential, failure-isolated refresh runs across many sources.
//!
//! The [`Orchestrator`] is the single entry point schedulers call: it runs
//! each registered [`SourceFetcher`](crate::core::SourceFetcher) in order,
//! pauses between them, and returns a [`RunSummary`] with per-source counts.

mod config;
mod runner;

pub use config::{OrchestratorConfig, DEFAULT_INTER_SOURCE_DELAY};
pub use runner::{Orchestrator, OrchestratorBuilder, RunSummary};
