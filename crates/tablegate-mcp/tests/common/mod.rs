// crates/tablegate-mcp/tests/common/mod.rs
// ============================================================================
// Module: MCP Test Helpers
// Description: Gateway harness, scripted provider, and JSON-RPC clients.
// Purpose: Drive both transports end to end over a loopback socket.
// Dependencies: tablegate-mcp, reqwest, tokio
// ============================================================================

//! ## Overview
//! [`spawn_gateway`] serves a [`GatewayServer`] on an ephemeral port backed by
//! [`ScriptedProvider`]. [`StreamableClient`] speaks the `/mcp` transport and
//! [`LegacyClient`] the `/sse` plus `/messages` pair, reading event frames
//! incrementally from the response body.

#![allow(dead_code, reason = "Shared test helpers may be unused in some cases.")]
#![allow(
    clippy::panic,
    clippy::unwrap_used,
    clippy::expect_used,
    reason = "Test fixtures favor direct unwraps for setup clarity."
)]

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::path::Path;
use std::sync::Arc;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;
use serde_json::Map;
use serde_json::Value;
use serde_json::json;
use tablegate_config::TablegateConfig;
use tablegate_core::DataProvider;
use tablegate_core::ProviderError;
use tablegate_core::RecordQuery;
use tablegate_core::RecordUpdate;
use tablegate_core::TableRef;
use tablegate_mcp::GatewayServer;
use tablegate_mcp::SessionStore;
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

// ============================================================================
// SECTION: Provider
// ============================================================================

/// Collections payload returned by [`ScriptedProvider`].
pub fn collections_payload() -> Value {
    json!({ "bases": [{ "id": "app1", "name": "Ops", "permissionLevel": "create" }] })
}

/// Partial batch-delete outcome returned by [`ScriptedProvider`].
pub fn partial_delete_payload() -> Value {
    json!({
        "records": [
            { "id": "rec1", "deleted": true },
            { "id": "rec2", "deleted": true },
            { "id": "rec3", "deleted": false, "error": "ROW_LOCKED" },
        ]
    })
}

/// Provider with fixed answers that counts calls by name.
#[derive(Default)]
pub struct ScriptedProvider {
    calls: Mutex<Vec<&'static str>>,
}

impl ScriptedProvider {
    /// Returns the operation names called so far.
    pub fn calls(&self) -> Vec<&'static str> {
        self.calls.lock().unwrap().clone()
    }

    fn record(&self, name: &'static str) {
        self.calls.lock().unwrap().push(name);
    }
}

#[async_trait]
impl DataProvider for ScriptedProvider {
    async fn list_collections(&self) -> Result<Value, ProviderError> {
        self.record("list_collections");
        Ok(collections_payload())
    }

    async fn list_schema_units(&self, _collection_id: &str) -> Result<Value, ProviderError> {
        self.record("list_schema_units");
        Ok(json!({ "tables": [] }))
    }

    async fn describe_schema_unit(&self, table: &TableRef) -> Result<Value, ProviderError> {
        self.record("describe_schema_unit");
        Err(ProviderError::Status {
            status: 404,
            message: format!("schema unit {} not found", table.unit_id),
        })
    }

    async fn list_records(
        &self,
        _table: &TableRef,
        _query: &RecordQuery,
    ) -> Result<Value, ProviderError> {
        self.record("list_records");
        Ok(json!({ "records": [] }))
    }

    async fn get_record(&self, _table: &TableRef, record_id: &str) -> Result<Value, ProviderError> {
        self.record("get_record");
        Ok(json!({ "id": record_id, "fields": {} }))
    }

    async fn create_record(
        &self,
        _table: &TableRef,
        fields: &Map<String, Value>,
        _typecast: bool,
    ) -> Result<Value, ProviderError> {
        self.record("create_record");
        Ok(json!({ "id": "recNew", "fields": fields }))
    }

    async fn update_records(
        &self,
        _table: &TableRef,
        records: &[RecordUpdate],
        _typecast: bool,
    ) -> Result<Value, ProviderError> {
        self.record("update_records");
        Ok(json!({ "records": records }))
    }

    async fn delete_records(
        &self,
        _table: &TableRef,
        _record_ids: &[String],
    ) -> Result<Value, ProviderError> {
        self.record("delete_records");
        Ok(partial_delete_payload())
    }
}

// ============================================================================
// SECTION: Gateway Harness
// ============================================================================

/// Token issued to `alice` (read-only).
pub const ALICE_TOKEN: &str = "alice-secret-token";
/// Token issued to `bob` (allow-listed).
pub const BOB_TOKEN: &str = "bob-secret-token";

/// Config with static tokens for alice and bob and writes for bob.
pub fn gateway_config(audit_path: Option<&Path>) -> TablegateConfig {
    let mut config = TablegateConfig::from_toml(&format!(
        r#"
[auth]
mode = "static_tokens"

[[auth.tokens]]
token = "{ALICE_TOKEN}"
id = "alice"
display_name = "Alice"

[[auth.tokens]]
token = "{BOB_TOKEN}"
id = "bob"
display_name = "Bob"

[access]
write_allowlist = ["bob"]
"#
    ))
    .unwrap();
    config.server.bind = "127.0.0.1:0".to_string();
    config.server.audit.enabled = audit_path.is_some();
    config.server.audit.path = audit_path.map(|path| path.display().to_string());
    config
}

/// Running gateway.
pub struct Gateway {
    /// Base URL, e.g. `http://127.0.0.1:4321`.
    pub base: String,
    /// Live session store.
    pub sessions: Arc<SessionStore>,
    /// Provider behind the pipeline.
    pub provider: Arc<ScriptedProvider>,
    shutdown: Option<oneshot::Sender<()>>,
    handle: JoinHandle<()>,
}

impl Gateway {
    /// Signals shutdown and waits for the server to drain.
    pub async fn stop(mut self) {
        if let Some(shutdown) = self.shutdown.take() {
            let _ = shutdown.send(());
        }
        tokio::time::timeout(Duration::from_secs(5), &mut self.handle)
            .await
            .expect("server drains")
            .unwrap();
    }

    /// Waits until the live session count equals `expected`.
    pub async fn wait_for_sessions(&self, expected: usize) {
        for _ in 0 .. 200 {
            if self.sessions.len() == expected {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("expected {expected} sessions, found {}", self.sessions.len());
    }
}

/// Serves a gateway for `config` on an ephemeral loopback port.
pub async fn spawn_gateway(config: &TablegateConfig) -> Gateway {
    let provider = Arc::new(ScriptedProvider::default());
    let server = GatewayServer::from_config(config, provider.clone()).unwrap();
    let sessions = server.sessions();
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let base = format!("http://{}", listener.local_addr().unwrap());
    let (tx, rx) = oneshot::channel::<()>();
    let handle = tokio::spawn(async move {
        server
            .serve_on(listener, async move {
                let _ = rx.await;
            })
            .await
            .unwrap();
    });
    Gateway {
        base,
        sessions,
        provider,
        shutdown: Some(tx),
        handle,
    }
}

/// Builds a JSON-RPC request body.
pub fn rpc(id: u64, method: &str, params: Value) -> Value {
    json!({ "jsonrpc": "2.0", "id": id, "method": method, "params": params })
}

/// Builds a `tools/call` request body.
pub fn tool_call(id: u64, name: &str, arguments: Value) -> Value {
    rpc(id, "tools/call", json!({ "name": name, "arguments": arguments }))
}

// ============================================================================
// SECTION: Streamable Client
// ============================================================================

/// Client for the `/mcp` transport.
pub struct StreamableClient {
    http: reqwest::Client,
    base: String,
    token: String,
    /// Session id assigned at initialize.
    pub session_id: String,
}

impl StreamableClient {
    /// Initializes a session with `token`.
    pub async fn connect(base: &str, token: &str) -> Self {
        let http = reqwest::Client::new();
        let response = http
            .post(format!("{base}/mcp"))
            .bearer_auth(token)
            .json(&rpc(0, "initialize", json!({ "protocolVersion": "2025-03-26" })))
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let session_id =
            response.headers().get("mcp-session-id").unwrap().to_str().unwrap().to_string();
        Self {
            http,
            base: base.to_string(),
            token: token.to_string(),
            session_id,
        }
    }

    /// Posts a message within the session.
    pub async fn post(&self, body: &Value) -> (StatusCode, Value) {
        let response = self
            .http
            .post(format!("{}/mcp", self.base))
            .bearer_auth(&self.token)
            .header("mcp-session-id", &self.session_id)
            .json(body)
            .send()
            .await
            .unwrap();
        let status = response.status();
        let text = response.text().await.unwrap();
        let value = if text.is_empty() { Value::Null } else { serde_json::from_str(&text).unwrap() };
        (status, value)
    }

    /// Calls a tool and returns the JSON-RPC result.
    pub async fn call(&self, name: &str, arguments: Value) -> Value {
        let (status, body) = self.post(&tool_call(1, name, arguments)).await;
        assert_eq!(status, StatusCode::OK);
        body["result"].clone()
    }

    /// Deletes the session.
    pub async fn delete(&self) -> StatusCode {
        self.http
            .delete(format!("{}/mcp", self.base))
            .bearer_auth(&self.token)
            .header("mcp-session-id", &self.session_id)
            .send()
            .await
            .unwrap()
            .status()
    }
}

// ============================================================================
// SECTION: Legacy Client
// ============================================================================

/// One parsed event-stream frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SseEvent {
    /// Event name (`message` when omitted).
    pub event: String,
    /// Joined data lines.
    pub data: String,
}

/// Incremental event-stream reader over a streaming response body.
pub struct SseReader {
    response: reqwest::Response,
    buffer: String,
}

impl SseReader {
    /// Wraps a streaming response.
    pub const fn new(response: reqwest::Response) -> Self {
        Self {
            response,
            buffer: String::new(),
        }
    }

    /// Returns the next event carrying data, skipping keep-alive comments.
    pub async fn next_event(&mut self) -> Option<SseEvent> {
        loop {
            if let Some(end) = self.buffer.find("\n\n") {
                let frame: String = self.buffer.drain(.. end + 2).collect();
                if let Some(event) = parse_frame(&frame) {
                    return Some(event);
                }
                continue;
            }
            let chunk = tokio::time::timeout(Duration::from_secs(5), self.response.chunk())
                .await
                .expect("event arrives in time")
                .ok()??;
            self.buffer.push_str(&String::from_utf8_lossy(&chunk).replace("\r\n", "\n"));
        }
    }
}

/// Parses one frame; frames without data lines yield `None`.
fn parse_frame(frame: &str) -> Option<SseEvent> {
    let mut event = "message".to_string();
    let mut data = Vec::new();
    for line in frame.lines() {
        if let Some(value) = line.strip_prefix("event:") {
            event = value.trim().to_string();
        } else if let Some(value) = line.strip_prefix("data:") {
            data.push(value.strip_prefix(' ').unwrap_or(value).to_string());
        }
    }
    if data.is_empty() {
        return None;
    }
    Some(SseEvent {
        event,
        data: data.join("\n"),
    })
}

/// Client for the `/sse` plus `/messages` transport.
pub struct LegacyClient {
    http: reqwest::Client,
    base: String,
    token: String,
    /// Event stream reader.
    pub stream: SseReader,
    /// Message endpoint path announced by the server.
    pub endpoint: String,
}

impl LegacyClient {
    /// Opens the event stream and reads the endpoint announcement.
    pub async fn connect(base: &str, token: &str) -> Self {
        let http = reqwest::Client::new();
        let response =
            http.get(format!("{base}/sse")).bearer_auth(token).send().await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let mut stream = SseReader::new(response);
        let first = stream.next_event().await.unwrap();
        assert_eq!(first.event, "endpoint");
        Self {
            http,
            base: base.to_string(),
            token: token.to_string(),
            stream,
            endpoint: first.data,
        }
    }

    /// Returns the session id embedded in the endpoint.
    pub fn session_id(&self) -> &str {
        self.endpoint.split("sessionId=").nth(1).unwrap()
    }

    /// Posts a message and returns the HTTP status.
    pub async fn post_with_token(&self, token: &str, body: &Value) -> StatusCode {
        self.http
            .post(format!("{}{}", self.base, self.endpoint))
            .bearer_auth(token)
            .json(body)
            .send()
            .await
            .unwrap()
            .status()
    }

    /// Posts a message and reads its reply from the stream.
    pub async fn request(&mut self, body: &Value) -> Value {
        let status = self.post_with_token(&self.token.clone(), body).await;
        assert_eq!(status, StatusCode::ACCEPTED);
        let event = self.stream.next_event().await.unwrap();
        assert_eq!(event.event, "message");
        serde_json::from_str(&event.data).unwrap()
    }

    /// Calls a tool and returns the JSON-RPC result.
    pub async fn call(&mut self, name: &str, arguments: Value) -> Value {
        self.request(&tool_call(1, name, arguments)).await["result"].clone()
    }
}
