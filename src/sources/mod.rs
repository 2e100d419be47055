//! Source fetchers: one per external dependency.
//!
//! A [`SourceAdapter`] describes a dependency (its requests, throttle and
//! payload mapping); an [`ApiFetcher`] wraps it with the dependency's
//! circuit breaker, retrying fetch and the record store, and implements
//! [`SourceFetcher`](crate::core::SourceFetcher).
//!
//! ```rust
//! use ingestbridge::core::{ManualClock, SourceFetcher};
//! use ingestbridge::fetch::{FetchRequest, FetchResponse, MockTransport};
//! use ingestbridge::sources::{IngestContext, JsonApiSource};
//! use ingestbridge::store::MemoryStore;
//! use serde_json::json;
//! use std::sync::Arc;
//!
//! # tokio_test_block_on(async {
//! let url = "https://celestrak.example/gp.php?GROUP=stations";
//! let transport = MockTransport::new().with_sticky(
//!     url,
//!     FetchResponse::json_body(200, &json!([{ "NORAD_CAT_ID": 25544 }])),
//! );
//! let context = IngestContext::new(
//!     Arc::new(transport),
//!     Arc::new(MemoryStore::new()),
//!     Arc::new(ManualClock::new()),
//! );
//!
//! let fetcher = context.fetcher(
//!     JsonApiSource::new("celestrak", "satellites")
//!         .with_request(FetchRequest::get(url))
//!         .with_key_field("NORAD_CAT_ID"),
//! );
//! let outcome = fetcher.refresh().await;
//! assert_eq!(outcome.items_updated, 1);
//! # });
//! # fn tokio_test_block_on<F: std::future::Future>(f: F) -> F::Output {
//! #     tokio::runtime::Builder::new_current_thread().enable_all().build().unwrap().block_on(f)
//! # }
//! ```

mod adapter;
mod context;
mod fetcher;
mod json_api;

pub use adapter::SourceAdapter;
pub use context::IngestContext;
pub use fetcher::ApiFetcher;
pub use json_api::JsonApiSource;
