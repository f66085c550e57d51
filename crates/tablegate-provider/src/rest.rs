// crates/tablegate-provider/src/rest.rs
// ============================================================================
// Module: REST Data Provider
// Description: Airtable-compatible REST client implementing DataProvider.
// Purpose: Execute validated commands as single bounded HTTPS requests.
// Dependencies: tablegate-core, reqwest, serde_json
// ============================================================================

//! ## Overview
//! The REST provider issues one request per operation against two base URLs:
//! the metadata API (`/bases`, `/bases/{id}/tables`) and the records API
//! (`/{collection}/{unit}`). Path segments are percent-encoded, redirects are
//! disabled, cleartext http is refused unless allowed, and response bodies are
//! capped. Non-success statuses become [`ProviderError::Status`] with a
//! sanitized excerpt of the upstream error. Batch responses are returned
//! verbatim; nothing is retried.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use reqwest::RequestBuilder;
use reqwest::Response;
use reqwest::StatusCode;
use reqwest::Url;
use reqwest::redirect::Policy;
use serde_json::Map;
use serde_json::Value;
use serde_json::json;
use tablegate_core::DataProvider;
use tablegate_core::ProviderError;
use tablegate_core::RecordQuery;
use tablegate_core::RecordUpdate;
use tablegate_core::TableRef;
use tablegate_core::bounded_excerpt;

// ============================================================================
// SECTION: Configuration
// ============================================================================

/// Configuration for the REST provider.
#[derive(Clone, PartialEq, Eq)]
pub struct RestProviderConfig {
    /// Records API base URL.
    pub api_base_url: String,
    /// Metadata API base URL.
    pub meta_base_url: String,
    /// Bearer credential sent upstream.
    pub api_key: String,
    /// Request timeout in milliseconds.
    pub timeout_ms: u64,
    /// Maximum response size allowed, in bytes.
    pub max_response_bytes: usize,
    /// Maximum characters of upstream error text kept in messages.
    pub max_error_excerpt_chars: usize,
    /// Allow cleartext HTTP (disabled by default).
    pub allow_http: bool,
    /// User agent string for outbound requests.
    pub user_agent: String,
}

impl Default for RestProviderConfig {
    fn default() -> Self {
        Self {
            api_base_url: "https://api.airtable.com/v0".to_string(),
            meta_base_url: "https://api.airtable.com/v0/meta".to_string(),
            api_key: String::new(),
            timeout_ms: 10_000,
            max_response_bytes: 8 * 1024 * 1024,
            max_error_excerpt_chars: 500,
            allow_http: false,
            user_agent: "tablegate/0.1".to_string(),
        }
    }
}

impl fmt::Debug for RestProviderConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RestProviderConfig")
            .field("api_base_url", &self.api_base_url)
            .field("meta_base_url", &self.meta_base_url)
            .field("api_key", &"<redacted>")
            .field("timeout_ms", &self.timeout_ms)
            .field("max_response_bytes", &self.max_response_bytes)
            .field("max_error_excerpt_chars", &self.max_error_excerpt_chars)
            .field("allow_http", &self.allow_http)
            .field("user_agent", &self.user_agent)
            .finish()
    }
}

// ============================================================================
// SECTION: Provider
// ============================================================================

/// REST adapter for the tabular-data service.
pub struct RestProvider {
    /// Provider configuration, including limits and credential.
    config: RestProviderConfig,
    /// Parsed records API base.
    api_base: Url,
    /// Parsed metadata API base.
    meta_base: Url,
    /// HTTP client used for outbound requests.
    client: Client,
}

impl RestProvider {
    /// Creates a new REST provider with the given configuration.
    ///
    /// # Errors
    ///
    /// Returns [`ProviderError::Transport`] when a base URL is unusable or the
    /// HTTP client cannot be created.
    pub fn new(config: RestProviderConfig) -> Result<Self, ProviderError> {
        let api_base = parse_base_url(&config.api_base_url, config.allow_http)?;
        let meta_base = parse_base_url(&config.meta_base_url, config.allow_http)?;
        let client = Client::builder()
            .timeout(Duration::from_millis(config.timeout_ms))
            .user_agent(config.user_agent.clone())
            .redirect(Policy::none())
            .build()
            .map_err(|_| ProviderError::Transport("http client build failed".to_string()))?;
        Ok(Self {
            config,
            api_base,
            meta_base,
            client,
        })
    }

    /// Builds a metadata API URL.
    fn meta_url(&self, segments: &[&str]) -> Result<Url, ProviderError> {
        join_segments(&self.meta_base, segments)
    }

    /// Builds a records API URL for a table plus optional trailing segments.
    fn table_url(&self, table: &TableRef, extra: &[&str]) -> Result<Url, ProviderError> {
        let mut segments = vec![table.collection_id.as_str(), table.unit_id.as_str()];
        segments.extend_from_slice(extra);
        join_segments(&self.api_base, &segments)
    }

    /// Sends an authenticated request and decodes the JSON response.
    async fn send(&self, request: RequestBuilder) -> Result<Value, ProviderError> {
        let response = request
            .bearer_auth(&self.config.api_key)
            .send()
            .await
            .map_err(|err| ProviderError::Transport(describe_send_error(&err)))?;
        let status = response.status();
        let body = read_response_limited(response, self.config.max_response_bytes).await?;
        if !status.is_success() {
            return Err(ProviderError::Status {
                status: status.as_u16(),
                message: error_excerpt(status, &body, self.config.max_error_excerpt_chars),
            });
        }
        serde_json::from_slice(&body)
            .map_err(|_| ProviderError::InvalidResponse("response body is not json".to_string()))
    }
}

#[async_trait]
impl DataProvider for RestProvider {
    async fn list_collections(&self) -> Result<Value, ProviderError> {
        let url = self.meta_url(&["bases"])?;
        self.send(self.client.get(url)).await
    }

    async fn list_schema_units(&self, collection_id: &str) -> Result<Value, ProviderError> {
        let url = self.meta_url(&["bases", collection_id, "tables"])?;
        self.send(self.client.get(url)).await
    }

    async fn describe_schema_unit(&self, table: &TableRef) -> Result<Value, ProviderError> {
        let url = self.meta_url(&["bases", &table.collection_id, "tables"])?;
        let listing = self.send(self.client.get(url)).await?;
        let tables = listing.get("tables").and_then(Value::as_array).ok_or_else(|| {
            ProviderError::InvalidResponse("schema listing lacks a tables array".to_string())
        })?;
        tables
            .iter()
            .find(|unit| {
                ["id", "name"]
                    .iter()
                    .any(|key| unit.get(key).and_then(Value::as_str) == Some(table.unit_id.as_str()))
            })
            .cloned()
            .ok_or_else(|| ProviderError::Status {
                status: StatusCode::NOT_FOUND.as_u16(),
                message: bounded_excerpt(
                    &format!(
                        "schema unit {} not found in collection {}",
                        table.unit_id, table.collection_id
                    ),
                    self.config.max_error_excerpt_chars,
                ),
            })
    }

    async fn list_records(
        &self,
        table: &TableRef,
        query: &RecordQuery,
    ) -> Result<Value, ProviderError> {
        let mut url = self.table_url(table, &[])?;
        apply_record_query(&mut url, query);
        self.send(self.client.get(url)).await
    }

    async fn get_record(&self, table: &TableRef, record_id: &str) -> Result<Value, ProviderError> {
        let url = self.table_url(table, &[record_id])?;
        self.send(self.client.get(url)).await
    }

    async fn create_record(
        &self,
        table: &TableRef,
        fields: &Map<String, Value>,
        typecast: bool,
    ) -> Result<Value, ProviderError> {
        let url = self.table_url(table, &[])?;
        let mut body = json!({ "fields": fields });
        if typecast {
            body["typecast"] = Value::Bool(true);
        }
        self.send(self.client.post(url).json(&body)).await
    }

    async fn update_records(
        &self,
        table: &TableRef,
        records: &[RecordUpdate],
        typecast: bool,
    ) -> Result<Value, ProviderError> {
        let url = self.table_url(table, &[])?;
        let entries: Vec<Value> = records
            .iter()
            .map(|record| json!({ "id": record.id, "fields": record.fields }))
            .collect();
        let mut body = json!({ "records": entries });
        if typecast {
            body["typecast"] = Value::Bool(true);
        }
        self.send(self.client.patch(url).json(&body)).await
    }

    async fn delete_records(
        &self,
        table: &TableRef,
        record_ids: &[String],
    ) -> Result<Value, ProviderError> {
        let mut url = self.table_url(table, &[])?;
        {
            let mut pairs = url.query_pairs_mut();
            for id in record_ids {
                pairs.append_pair("records[]", id);
            }
        }
        self.send(self.client.delete(url)).await
    }
}

// ============================================================================
// SECTION: URL Helpers
// ============================================================================

/// Parses and checks a configured base URL.
fn parse_base_url(value: &str, allow_http: bool) -> Result<Url, ProviderError> {
    let url = Url::parse(value.trim())
        .map_err(|_| ProviderError::Transport("invalid provider base url".to_string()))?;
    match url.scheme() {
        "https" => {}
        "http" if allow_http => {}
        "http" => {
            return Err(ProviderError::Transport(
                "cleartext http disallowed for provider base url".to_string(),
            ));
        }
        _ => {
            return Err(ProviderError::Transport("unsupported provider url scheme".to_string()));
        }
    }
    if url.cannot_be_a_base() || url.host_str().is_none() {
        return Err(ProviderError::Transport("provider base url must include a host".to_string()));
    }
    Ok(url)
}

/// Appends percent-encoded path segments to a base URL.
fn join_segments(base: &Url, segments: &[&str]) -> Result<Url, ProviderError> {
    let mut url = base.clone();
    url.set_query(None);
    url.path_segments_mut()
        .map_err(|()| ProviderError::Transport("provider base url cannot hold a path".to_string()))?
        .pop_if_empty()
        .extend(segments);
    Ok(url)
}

/// Encodes listing options as query parameters.
fn apply_record_query(url: &mut Url, query: &RecordQuery) {
    let mut pairs = url.query_pairs_mut();
    if let Some(max_records) = query.max_records {
        pairs.append_pair("maxRecords", &max_records.to_string());
    }
    if let Some(view) = &query.view {
        pairs.append_pair("view", view);
    }
    if let Some(filter) = &query.filter {
        pairs.append_pair("filterByFormula", filter);
    }
    for (index, sort) in query.sort.iter().enumerate() {
        pairs.append_pair(&format!("sort[{index}][field]"), &sort.field);
        pairs.append_pair(&format!("sort[{index}][direction]"), sort.direction.as_str());
    }
    if let Some(offset) = &query.offset {
        pairs.append_pair("offset", offset);
    }
    for field in &query.fields {
        pairs.append_pair("fields[]", field);
    }
}

// ============================================================================
// SECTION: Response Helpers
// ============================================================================

/// Summarizes a send failure without echoing URLs or headers.
fn describe_send_error(err: &reqwest::Error) -> String {
    if err.is_timeout() {
        "request timed out".to_string()
    } else if err.is_connect() {
        "connection failed".to_string()
    } else if err.is_redirect() {
        "redirect refused".to_string()
    } else {
        "request could not be sent".to_string()
    }
}

/// Reads a response body, failing once it exceeds `max_bytes`.
async fn read_response_limited(
    mut response: Response,
    max_bytes: usize,
) -> Result<Vec<u8>, ProviderError> {
    let max_bytes_u64 = u64::try_from(max_bytes).map_err(|_| {
        ProviderError::InvalidResponse("response size limit exceeds u64".to_string())
    })?;
    if let Some(expected) = response.content_length()
        && expected > max_bytes_u64
    {
        return Err(ProviderError::InvalidResponse("response exceeds size limit".to_string()));
    }
    let mut buf = Vec::new();
    while let Some(chunk) = response
        .chunk()
        .await
        .map_err(|_| ProviderError::Transport("failed to read response".to_string()))?
    {
        if buf.len().saturating_add(chunk.len()) > max_bytes {
            return Err(ProviderError::InvalidResponse("response exceeds size limit".to_string()));
        }
        buf.extend_from_slice(&chunk);
    }
    Ok(buf)
}

/// Extracts a bounded human-readable message from an error body.
///
/// Tries `error.message`, then `error.type`, then `error` as a string, then
/// the raw body.
fn error_excerpt(status: StatusCode, body: &[u8], max_chars: usize) -> String {
    let parsed: Option<Value> = serde_json::from_slice(body).ok();
    let error = parsed.as_ref().and_then(|value| value.get("error"));
    let structured = error.and_then(|error| {
        error
            .get("message")
            .and_then(Value::as_str)
            .or_else(|| error.get("type").and_then(Value::as_str))
            .or_else(|| error.as_str())
    });
    let text = match structured {
        Some(text) => text.to_string(),
        None => String::from_utf8_lossy(body).into_owned(),
    };
    let excerpt = bounded_excerpt(&text, max_chars);
    if excerpt.is_empty() {
        status.canonical_reason().unwrap_or("upstream error").to_string()
    } else {
        excerpt
    }
}

// ============================================================================
// SECTION: Tests
// ============================================================================

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, reason = "Test-only assertions use unwrap for clarity.")]

    use super::*;

    #[test]
    fn error_excerpt_prefers_structured_message() {
        let body = br#"{"error":{"type":"INVALID_REQUEST","message":"Unknown field name: Foo"}}"#;
        let text = error_excerpt(StatusCode::UNPROCESSABLE_ENTITY, body, 500);
        assert_eq!(text, "Unknown field name: Foo");
    }

    #[test]
    fn error_excerpt_falls_back_through_shapes() {
        let typed = br#"{"error":{"type":"NOT_FOUND"}}"#;
        assert_eq!(error_excerpt(StatusCode::NOT_FOUND, typed, 500), "NOT_FOUND");
        let plain = br#"{"error":"NOT_AUTHORIZED"}"#;
        assert_eq!(error_excerpt(StatusCode::FORBIDDEN, plain, 500), "NOT_AUTHORIZED");
        assert_eq!(error_excerpt(StatusCode::BAD_GATEWAY, b"upstream\ndown", 500), "upstream down");
        assert_eq!(error_excerpt(StatusCode::BAD_GATEWAY, b"", 500), "Bad Gateway");
    }

    #[test]
    fn join_segments_percent_encodes() {
        let base = Url::parse("https://api.example.com/v0/").unwrap();
        let url = join_segments(&base, &["app 1", "a/b", "rec?x"]).unwrap();
        assert_eq!(url.as_str(), "https://api.example.com/v0/app%201/a%2Fb/rec%3Fx");
    }

    #[test]
    fn base_url_scheme_rules() {
        assert!(parse_base_url("https://api.example.com/v0", false).is_ok());
        assert!(parse_base_url("http://127.0.0.1:1/v0", false).is_err());
        assert!(parse_base_url("http://127.0.0.1:1/v0", true).is_ok());
        assert!(parse_base_url("file:///etc/passwd", true).is_err());
    }
}
