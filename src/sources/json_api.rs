//! Configurable adapter for JSON list endpoints.

use crate::circuit_breaker::CircuitBreakerConfig;
use crate::core::{IngestError, IngestResult, Record};
use crate::fetch::{FetchRequest, FetchResponse};
use crate::sources::adapter::SourceAdapter;

use serde_json::Value;
use std::time::Duration;

/// An adapter for endpoints returning a JSON array of objects.
///
/// The array is located with a JSON pointer (`""` for the document root) and
/// each element is keyed by a field, itself a plain field name or a JSON
/// pointer into the element. Elements without a usable key are skipped.
///
/// # Examples
///
/// ```rust
/// use ingestbridge::fetch::{FetchRequest, FetchResponse};
/// use ingestbridge::sources::{JsonApiSource, SourceAdapter};
/// use serde_json::json;
///
/// let source = JsonApiSource::new("launch-library", "launches")
///     .with_request(FetchRequest::get("https://ll.example/launch/upcoming"))
///     .with_items_at("/results")
///     .with_key_field("id");
///
/// let response = FetchResponse::json_body(200, &json!({
///     "results": [{ "id": "a1", "name": "Falcon 9" }, { "id": "b2", "name": "Electron" }]
/// }));
/// let records = source.transform(&response).unwrap();
/// assert_eq!(records.len(), 2);
/// assert_eq!(records[0].key, "a1");
/// ```
#[derive(Debug, Clone)]
pub struct JsonApiSource {
    name: String,
    collection: String,
    requests: Vec<FetchRequest>,
    items_pointer: String,
    key_field: String,
    breaker_config: Option<CircuitBreakerConfig>,
    request_delay: Duration,
}

impl JsonApiSource {
    /// Creates a source named `name` writing into `collection`.
    ///
    /// Defaults: items at the document root, keyed by `"id"`.
    pub fn new(name: impl Into<String>, collection: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            collection: collection.into(),
            requests: Vec::new(),
            items_pointer: String::new(),
            key_field: "id".to_string(),
            breaker_config: None,
            request_delay: Duration::ZERO,
        }
    }

    /// Appends a request to each refresh.
    pub fn with_request(mut self, request: FetchRequest) -> Self {
        self.requests.push(request);
        self
    }

    /// Sets the JSON pointer to the item array.
    pub fn with_items_at(mut self, pointer: impl Into<String>) -> Self {
        self.items_pointer = pointer.into();
        self
    }

    /// Sets the field (or JSON pointer) holding each item's key.
    pub fn with_key_field(mut self, field: impl Into<String>) -> Self {
        self.key_field = field.into();
        self
    }

    /// Sets this dependency's breaker settings.
    pub fn with_breaker_config(mut self, config: CircuitBreakerConfig) -> Self {
        self.breaker_config = Some(config);
        self
    }

    /// Sets the pause between this source's requests.
    pub fn with_request_delay(mut self, delay: Duration) -> Self {
        self.request_delay = delay;
        self
    }

    /// Returns the target collection.
    pub fn collection(&self) -> &str {
        &self.collection
    }

    fn key_of(&self, item: &Value) -> Option<String> {
        let value = if self.key_field.starts_with('/') {
            item.pointer(&self.key_field)
        } else {
            item.get(&self.key_field)
        }?;

        match value {
            Value::String(s) if !s.is_empty() => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            _ => None,
        }
    }
}

impl SourceAdapter for JsonApiSource {
    fn name(&self) -> &str {
        &self.name
    }

    fn breaker_config(&self) -> Option<CircuitBreakerConfig> {
        self.breaker_config.clone()
    }

    fn requests(&self) -> Vec<FetchRequest> {
        self.requests.clone()
    }

    fn request_delay(&self) -> Duration {
        self.request_delay
    }

    fn transform(&self, response: &FetchResponse) -> IngestResult<Vec<Record>> {
        let document: Value = response
            .json()
            .map_err(|e| IngestError::invalid_payload(&self.name, e.to_string()))?;

        let items = document
            .pointer(&self.items_pointer)
            .and_then(Value::as_array)
            .ok_or_else(|| {
                IngestError::invalid_payload(
                    &self.name,
                    format!("no array at pointer '{}'", self.items_pointer),
                )
            })?;

        let mut records = Vec::with_capacity(items.len());
        for item in items {
            match self.key_of(item) {
                Some(key) => records.push(Record::new(
                    &self.collection,
                    key,
                    item.clone(),
                    &self.name,
                )),
                None => tracing::debug!(
                    source = %self.name,
                    key_field = %self.key_field,
                    "Skipping item without key"
                ),
            }
        }
        Ok(records)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_root_array_numeric_keys() {
        let source = JsonApiSource::new("celestrak", "satellites").with_key_field("NORAD_CAT_ID");
        let response = FetchResponse::json_body(
            200,
            &json!([
                { "NORAD_CAT_ID": 25544, "OBJECT_NAME": "ISS (ZARYA)" },
                { "NORAD_CAT_ID": 20580, "OBJECT_NAME": "HST" }
            ]),
        );

        let records = source.transform(&response).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].key, "25544");
        assert_eq!(records[0].collection, "satellites");
        assert_eq!(records[0].source_name, "celestrak");
        assert_eq!(records[1].data["OBJECT_NAME"], "HST");
    }

    #[test]
    fn test_nested_key_pointer_and_skipped_items() {
        let source = JsonApiSource::new("sec", "filings")
            .with_items_at("/data/filings")
            .with_key_field("/meta/accession");
        let response = FetchResponse::json_body(
            200,
            &json!({ "data": { "filings": [
                { "meta": { "accession": "0001" } },
                { "meta": {} },
                { "meta": { "accession": "" } }
            ] } }),
        );

        let records = source.transform(&response).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].key, "0001");
    }

    #[test]
    fn test_missing_array_is_invalid_payload() {
        let source = JsonApiSource::new("fcc", "filings").with_items_at("/results");
        let response = FetchResponse::json_body(200, &json!({ "error": "maintenance" }));

        let result = source.transform(&response);
        assert!(matches!(result, Err(IngestError::InvalidPayload { .. })));
    }

    #[test]
    fn test_non_json_is_invalid_payload() {
        let source = JsonApiSource::new("fcc", "filings");
        let result = source.transform(&FetchResponse::new(200, "<html>"));
        assert!(matches!(result, Err(IngestError::InvalidPayload { .. })));
    }
}
