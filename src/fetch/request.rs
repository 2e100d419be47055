//! Transport-independent HTTP request and response types.

use secrecy::{ExposeSecret, SecretString};
use serde::de::DeserializeOwned;
use std::collections::HashMap;
use std::fmt;

/// HTTP method of a [`FetchRequest`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Method {
    /// `GET`
    Get,
    /// `POST`
    Post,
}

impl Method {
    /// Returns the method as an uppercase string.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Post => "POST",
        }
    }
}

/// A single outbound API call.
///
/// API keys are held as [`SecretString`] and never appear in `Debug` output.
#[derive(Clone)]
pub struct FetchRequest {
    /// HTTP method.
    pub method: Method,
    /// Absolute URL.
    pub url: String,
    /// Plain headers.
    pub headers: Vec<(String, String)>,
    /// Header carrying an API key, if the dependency needs one.
    pub api_key: Option<(String, SecretString)>,
    /// JSON body for `POST` requests.
    pub body: Option<serde_json::Value>,
}

impl FetchRequest {
    /// Creates a `GET` request.
    pub fn get(url: impl Into<String>) -> Self {
        Self {
            method: Method::Get,
            url: url.into(),
            headers: Vec::new(),
            api_key: None,
            body: None,
        }
    }

    /// Creates a `POST` request with a JSON body.
    pub fn post_json(url: impl Into<String>, body: serde_json::Value) -> Self {
        Self {
            method: Method::Post,
            body: Some(body),
            ..Self::get(url)
        }
    }

    /// Adds a header.
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// Sends `key` in the header `header`.
    pub fn with_api_key(mut self, header: impl Into<String>, key: impl Into<String>) -> Self {
        self.api_key = Some((header.into(), SecretString::new(key.into().into())));
        self
    }

    /// Returns every header to send, the API key exposed.
    pub fn resolved_headers(&self) -> Vec<(&str, &str)> {
        let mut headers: Vec<(&str, &str)> = self
            .headers
            .iter()
            .map(|(name, value)| (name.as_str(), value.as_str()))
            .collect();
        if let Some((name, key)) = &self.api_key {
            headers.push((name.as_str(), key.expose_secret()));
        }
        headers
    }
}

impl fmt::Debug for FetchRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FetchRequest")
            .field("method", &self.method)
            .field("url", &self.url)
            .field("headers", &self.headers)
            .field(
                "api_key",
                &self.api_key.as_ref().map(|(name, _)| (name, "[REDACTED]")),
            )
            .field("has_body", &self.body.is_some())
            .finish()
    }
}

/// A response with its body fully read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchResponse {
    /// HTTP status code.
    pub status: u16,
    /// Response headers, names lowercased.
    pub headers: HashMap<String, String>,
    /// Raw body.
    pub body: Vec<u8>,
}

impl FetchResponse {
    /// Creates a response with no headers.
    pub fn new(status: u16, body: impl Into<Vec<u8>>) -> Self {
        Self {
            status,
            headers: HashMap::new(),
            body: body.into(),
        }
    }

    /// Creates a response whose body is `value` serialized as JSON.
    pub fn json_body(status: u16, value: &serde_json::Value) -> Self {
        Self::new(status, value.to_string()).with_header("content-type", "application/json")
    }

    /// Adds a header.
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers
            .insert(name.into().to_ascii_lowercase(), value.into());
        self
    }

    /// Returns `true` for 2xx statuses.
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Returns a header value by case-insensitive name.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .get(&name.to_ascii_lowercase())
            .map(String::as_str)
    }

    /// Decodes the body as JSON.
    pub fn json<T: DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        serde_json::from_slice(&self.body)
    }

    /// Returns the body as text, replacing invalid UTF-8.
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_api_key_is_redacted_in_debug() {
        let request = FetchRequest::get("https://api.example.test/v1/launches")
            .with_api_key("x-api-key", "super-secret");
        let debug = format!("{:?}", request);
        assert!(!debug.contains("super-secret"));
        assert!(debug.contains("[REDACTED]"));

        let headers = request.resolved_headers();
        assert_eq!(headers, vec![("x-api-key", "super-secret")]);
    }

    #[test]
    fn test_response_helpers() {
        let response = FetchResponse::json_body(200, &serde_json::json!({ "count": 3 }))
            .with_header("Retry-After", "60");
        assert!(response.is_success());
        assert_eq!(response.header("retry-after"), Some("60"));
        assert_eq!(response.header("content-type"), Some("application/json"));

        let value: serde_json::Value = response.json().unwrap();
        assert_eq!(value["count"], 3);
        assert!(!FetchResponse::new(429, "slow down").is_success());
    }

    #[test]
    fn test_post_json() {
        let request = FetchRequest::post_json("https://example.test", serde_json::json!({"q": 1}));
        assert_eq!(request.method, Method::Post);
        assert_eq!(request.method.as_str(), "POST");
        assert!(request.body.is_some());
    }
}
