//! The network seam: a single HTTP round trip.

use crate::core::TransportError;
use crate::fetch::request::{FetchRequest, FetchResponse};

use async_trait::async_trait;
use std::fmt::Debug;
use std::sync::Arc;

/// Performs one HTTP round trip.
///
/// A transport reports every HTTP status as `Ok`; only failures that
/// produced no status at all (connection refused, reset, transport timeout)
/// are `Err`. Classifying statuses is [`RetryingFetch`](crate::fetch::RetryingFetch)'s job.
#[async_trait]
pub trait Transport: Send + Sync + Debug {
    /// Sends `request` and reads the whole response.
    async fn send(&self, request: &FetchRequest) -> Result<FetchResponse, TransportError>;
}

/// An arc-wrapped transport for shared ownership.
pub type ArcTransport = Arc<dyn Transport>;

#[cfg(feature = "http")]
pub use self::reqwest_transport::ReqwestTransport;

#[cfg(feature = "http")]
mod reqwest_transport {
    use super::*;
    use crate::core::IngestError;
    use crate::fetch::request::Method;
    use std::time::Duration;

    /// [`Transport`] backed by a shared `reqwest::Client`.
    #[derive(Debug, Clone)]
    pub struct ReqwestTransport {
        client: reqwest::Client,
    }

    impl ReqwestTransport {
        /// Creates a transport whose requests time out after `timeout`.
        pub fn new(timeout: Duration) -> Result<Self, IngestError> {
            let client = reqwest::Client::builder()
                .timeout(timeout)
                .user_agent(concat!("ingestbridge/", env!("CARGO_PKG_VERSION")))
                .build()
                .map_err(|e| {
                    IngestError::configuration(format!("Failed to create HTTP client: {}", e))
                })?;
            Ok(Self { client })
        }

        /// Wraps an existing client.
        pub fn from_client(client: reqwest::Client) -> Self {
            Self { client }
        }
    }

    #[async_trait]
    impl Transport for ReqwestTransport {
        async fn send(&self, request: &FetchRequest) -> Result<FetchResponse, TransportError> {
            let mut builder = match request.method {
                Method::Get => self.client.get(&request.url),
                Method::Post => self.client.post(&request.url),
            };
            for (name, value) in request.resolved_headers() {
                builder = builder.header(name, value);
            }
            if let Some(body) = &request.body {
                builder = builder.json(body);
            }

            let response = builder.send().await.map_err(map_reqwest_error)?;

            let status = response.status().as_u16();
            let headers = response
                .headers()
                .iter()
                .filter_map(|(name, value)| {
                    value
                        .to_str()
                        .ok()
                        .map(|v| (name.as_str().to_ascii_lowercase(), v.to_string()))
                })
                .collect();
            let body = response.bytes().await.map_err(map_reqwest_error)?;

            Ok(FetchResponse {
                status,
                headers,
                body: body.to_vec(),
            })
        }
    }

    fn map_reqwest_error(error: reqwest::Error) -> TransportError {
        if error.is_timeout() {
            TransportError::Timeout
        } else {
            TransportError::Connect(error.to_string())
        }
    }

    #[cfg(test)]
    mod tests {
        use super::*;
        use wiremock::matchers::{header, method, path};
        use wiremock::{Mock, MockServer, ResponseTemplate};

        #[tokio::test]
        async fn test_sends_api_key_and_reads_body() {
            let server = MockServer::start().await;
            Mock::given(method("GET"))
                .and(path("/v2/launches"))
                .and(header("x-api-key", "k-123"))
                .respond_with(
                    ResponseTemplate::new(200)
                        .set_body_json(serde_json::json!({ "results": [{ "id": "a" }] })),
                )
                .expect(1)
                .mount(&server)
                .await;

            let transport = ReqwestTransport::new(Duration::from_secs(5)).unwrap();
            let request = FetchRequest::get(format!("{}/v2/launches", server.uri()))
                .with_api_key("x-api-key", "k-123");

            let response = transport.send(&request).await.unwrap();
            assert_eq!(response.status, 200);
            let body: serde_json::Value = response.json().unwrap();
            assert_eq!(body["results"][0]["id"], "a");
        }

        #[tokio::test]
        async fn test_error_statuses_are_not_transport_errors() {
            let server = MockServer::start().await;
            Mock::given(method("GET"))
                .respond_with(ResponseTemplate::new(429).insert_header("Retry-After", "30"))
                .mount(&server)
                .await;

            let transport = ReqwestTransport::new(Duration::from_secs(5)).unwrap();
            let response = transport
                .send(&FetchRequest::get(server.uri()))
                .await
                .unwrap();
            assert_eq!(response.status, 429);
            assert_eq!(response.header("retry-after"), Some("30"));
        }

        #[tokio::test]
        async fn test_transport_timeout() {
            let server = MockServer::start().await;
            Mock::given(method("GET"))
                .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_millis(500)))
                .mount(&server)
                .await;

            let transport = ReqwestTransport::new(Duration::from_millis(50)).unwrap();
            let result = transport.send(&FetchRequest::get(server.uri())).await;
            assert!(matches!(result, Err(TransportError::Timeout)));
        }
    }
}
