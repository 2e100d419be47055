//! Outbound HTTP with bounded retries.
//!
//! [`RetryingFetch`] sends a [`FetchRequest`] over a [`Transport`] and
//! absorbs transient failures (429, 5xx, transport errors) with exponential
//! backoff. Non-retryable statuses fail at once.
//!
//! ## Transports
//!
//! - [`ReqwestTransport`] - `reqwest` client (requires the `http` feature)
//! - [`MockTransport`] - scripted responses for tests and demos

mod mock;
mod request;
mod retry;
mod transport;

pub use mock::MockTransport;
pub use request::{FetchRequest, FetchResponse, Method};
pub use retry::{RetryPolicy, RetryingFetch};
pub use transport::{ArcTransport, Transport};

#[cfg(feature = "http")]
pub use transport::ReqwestTransport;
