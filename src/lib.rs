//! # Ingestbridge
//!
//! A resilience layer for ingesting data from many unreliable third-party
//! APIs: per-dependency circuit breakers, retrying fetches with exponential
//! backoff, and a rate-aware orchestrator that refreshes sources one by one.
//!
//! ## Overview
//!
//! Ingestbridge keeps a data pipeline serving when individual sources are
//! slow, rate-limited or down, allowing you to:
//!
//! - Guard each dependency with its own circuit breaker
//! - Absorb transient failures (429, 5xx, timeouts) with bounded retries
//! - Map raw payloads to normalized records and upsert them by natural key
//! - Run many sources sequentially with deliberate pauses between them
//! - Record one refresh outcome per source and run
//! - Generate structured audit logs of every run
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use ingestbridge::prelude::*;
//! use ingestbridge::fetch::ReqwestTransport;
//! use ingestbridge::store::FilesystemStore;
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let context = IngestContext::new(
//!         Arc::new(ReqwestTransport::new(Duration::from_secs(30))?),
//!         Arc::new(FilesystemStore::open("./data")?),
//!         SystemClock::shared(),
//!     );
//!
//!     let celestrak = JsonApiSource::new("celestrak", "satellites")
//!         .with_request(FetchRequest::get(
//!             "https://celestrak.org/NORAD/elements/gp.php?GROUP=stations&FORMAT=json",
//!         ))
//!         .with_key_field("NORAD_CAT_ID");
//!
//!     let orchestrator = Orchestrator::builder()
//!         .with_context(&context)
//!         .add_fetcher(context.fetcher(celestrak))
//!         .build()?;
//!
//!     let summary = orchestrator.run().await;
//!     println!("{} records updated", summary.total_updated);
//!     Ok(())
//! }
//! ```
//!
//! ## Features
//!
//! - `default` - Includes the reqwest transport
//! - `http` - [`fetch::ReqwestTransport`] backed by `reqwest`
//!
//! ## Architecture
//!
//! The library is organized into several layers:
//!
//! - **Core**: Fundamental types, traits, clock and error handling
//! - **Circuit Breaker**: Per-dependency state machines and their registry
//! - **Fetch**: Transports and the retrying fetch
//! - **Store**: Record and outcome persistence
//! - **Sources**: Adapters and the composed per-source fetcher
//! - **Orchestrator**: Sequential refresh runs
//! - **Audit**: Structured logging of refreshes and runs

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(unsafe_code)]

pub mod audit;
pub mod circuit_breaker;
pub mod core;
pub mod fetch;
pub mod orchestrator;
pub mod sources;
pub mod store;

// Re-export commonly used types at the crate root
pub use crate::core::{
    Clock, IngestError, IngestResult, ManualClock, OutcomeStatus, Record, RefreshOutcome,
    SourceFetcher, SystemClock,
};

pub use crate::circuit_breaker::{BreakerRegistry, BreakerStatus, CircuitBreaker, CircuitBreakerConfig};
pub use crate::fetch::{FetchRequest, FetchResponse, RetryPolicy, RetryingFetch};
pub use crate::orchestrator::{Orchestrator, OrchestratorConfig, RunSummary};
pub use crate::sources::{ApiFetcher, IngestContext, JsonApiSource, SourceAdapter};
pub use crate::store::{MemoryStore, RecordStore};

/// Prelude module for convenient imports.
///
/// ```rust
/// use ingestbridge::prelude::*;
/// ```
pub mod prelude {
    pub use crate::core::{
        Clock, IngestError, IngestResult, ManualClock, OutcomeStatus, Record, RefreshOutcome,
        SourceFetcher, SystemClock,
    };
    pub use crate::circuit_breaker::{
        BreakerRegistry, BreakerState, BreakerStatus, CircuitBreaker, CircuitBreakerConfig,
    };
    pub use crate::fetch::{FetchRequest, FetchResponse, RetryPolicy, RetryingFetch};
    pub use crate::orchestrator::{Orchestrator, OrchestratorConfig, RunSummary};
    pub use crate::sources::{ApiFetcher, IngestContext, JsonApiSource, SourceAdapter};
    pub use crate::store::{MemoryStore, RecordStore};
}
