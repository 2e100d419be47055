//! Per-dependency request and transform logic.

use crate::circuit_breaker::CircuitBreakerConfig;
use crate::core::{IngestResult, Record};
use crate::fetch::{FetchRequest, FetchResponse};

use std::fmt::Debug;
use std::time::Duration;

/// What a fetcher needs to know about one external dependency.
///
/// An adapter is pure: it lists the requests of a refresh and turns each
/// response into normalized records. Retries, circuit breaking, persistence
/// and reporting are handled by [`ApiFetcher`](crate::sources::ApiFetcher).
///
/// # Example
///
/// ```rust,ignore
/// use ingestbridge::core::{IngestResult, Record};
/// use ingestbridge::fetch::{FetchRequest, FetchResponse};
/// use ingestbridge::sources::SourceAdapter;
///
/// #[derive(Debug)]
/// struct LaunchLibrary;
///
/// impl SourceAdapter for LaunchLibrary {
///     fn name(&self) -> &str {
///         "launch-library"
///     }
///
///     fn requests(&self) -> Vec<FetchRequest> {
///         vec![FetchRequest::get("https://ll.example/2.2.0/launch/upcoming/")]
///     }
///
///     fn transform(&self, response: &FetchResponse) -> IngestResult<Vec<Record>> {
///         // parse response.json() into records
///         todo!()
///     }
/// }
/// ```
pub trait SourceAdapter: Send + Sync + Debug {
    /// Dependency name; also the name of its circuit breaker.
    fn name(&self) -> &str;

    /// Breaker settings for this dependency. `None` uses the context default.
    fn breaker_config(&self) -> Option<CircuitBreakerConfig> {
        None
    }

    /// Requests making up one refresh, in order.
    fn requests(&self) -> Vec<FetchRequest>;

    /// Pause between two consecutive requests of the same refresh.
    fn request_delay(&self) -> Duration {
        Duration::ZERO
    }

    /// Maps one successful response to normalized records.
    fn transform(&self, response: &FetchResponse) -> IngestResult<Vec<Record>>;
}
