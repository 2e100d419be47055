//! Scripted transport for tests and offline demos.

use crate::core::TransportError;
use crate::fetch::request::{FetchRequest, FetchResponse};
use crate::fetch::transport::Transport;

use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

type Scripted = Result<FetchResponse, TransportError>;

/// A transport that replays scripted responses per URL.
///
/// Responses queued for a URL are consumed in order; once a URL's queue is
/// empty its sticky response (if any) is repeated, otherwise the transport
/// answers 404.
///
/// # Examples
///
/// ```rust
/// use ingestbridge::fetch::{FetchResponse, MockTransport};
///
/// let transport = MockTransport::new()
///     .with_response("https://api.test/a", FetchResponse::new(429, ""))
///     .with_response("https://api.test/a", FetchResponse::new(200, "[]"))
///     .with_sticky("https://api.test/b", FetchResponse::new(503, ""));
/// assert_eq!(transport.call_count(), 0);
/// ```
#[derive(Debug, Default)]
pub struct MockTransport {
    queued: Mutex<HashMap<String, VecDeque<Scripted>>>,
    sticky: Mutex<HashMap<String, Scripted>>,
    requests: Mutex<Vec<String>>,
    call_count: AtomicU64,
}

impl MockTransport {
    /// Creates a transport with nothing scripted.
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues a response for `url`.
    pub fn with_response(self, url: impl Into<String>, response: FetchResponse) -> Self {
        self.push(url, Ok(response));
        self
    }

    /// Queues a transport failure for `url`.
    pub fn with_error(self, url: impl Into<String>, error: TransportError) -> Self {
        self.push(url, Err(error));
        self
    }

    /// Sets the response repeated for `url` once its queue is drained.
    pub fn with_sticky(self, url: impl Into<String>, response: FetchResponse) -> Self {
        self.set_sticky(url, Ok(response));
        self
    }

    /// Sets the transport failure repeated for `url` once its queue is drained.
    pub fn with_sticky_error(self, url: impl Into<String>, error: TransportError) -> Self {
        self.set_sticky(url, Err(error));
        self
    }

    /// Queues a result for `url` (mutable version).
    pub fn push(&self, url: impl Into<String>, result: Result<FetchResponse, TransportError>) {
        self.queued
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .entry(url.into())
            .or_default()
            .push_back(result);
    }

    /// Replaces the sticky result for `url` (mutable version).
    pub fn set_sticky(&self, url: impl Into<String>, result: Result<FetchResponse, TransportError>) {
        self.sticky
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .insert(url.into(), result);
    }

    /// Returns the number of requests sent.
    pub fn call_count(&self) -> u64 {
        self.call_count.load(Ordering::Relaxed)
    }

    /// Returns the URLs requested, in order.
    pub fn requested_urls(&self) -> Vec<String> {
        self.requests
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn send(&self, request: &FetchRequest) -> Result<FetchResponse, TransportError> {
        self.call_count.fetch_add(1, Ordering::Relaxed);
        self.requests
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(request.url.clone());

        let queued = self
            .queued
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .get_mut(&request.url)
            .and_then(VecDeque::pop_front);
        if let Some(result) = queued {
            return result;
        }

        self.sticky
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .get(&request.url)
            .cloned()
            .unwrap_or_else(|| Ok(FetchResponse::new(404, "no scripted response")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_queue_then_sticky_then_404() {
        let transport = MockTransport::new()
            .with_response("https://a.test", FetchResponse::new(500, ""))
            .with_sticky("https://a.test", FetchResponse::new(200, "ok"));

        let request = FetchRequest::get("https://a.test");
        assert_eq!(transport.send(&request).await.unwrap().status, 500);
        assert_eq!(transport.send(&request).await.unwrap().status, 200);
        assert_eq!(transport.send(&request).await.unwrap().status, 200);

        let other = FetchRequest::get("https://b.test");
        assert_eq!(transport.send(&other).await.unwrap().status, 404);

        assert_eq!(transport.call_count(), 4);
        assert_eq!(transport.requested_urls()[3], "https://b.test");
    }

    #[tokio::test]
    async fn test_scripted_transport_error() {
        let transport = MockTransport::new().with_error("https://a.test", TransportError::Timeout);
        let result = transport.send(&FetchRequest::get("https://a.test")).await;
        assert!(matches!(result, Err(TransportError::Timeout)));
    }
}
