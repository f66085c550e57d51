// crates/tablegate-mcp/src/jsonrpc.rs
// ============================================================================
// Module: JSON-RPC Handling
// Description: MCP method dispatch shared by both transports.
// Purpose: Turn one decoded JSON-RPC message into one reply or nothing.
// Dependencies: tablegate-core, serde, serde_json
// ============================================================================

//! ## Overview
//! Both transports decode bodies with [`parse_message`] and hand the request
//! to [`handle_request`] together with the session it belongs to. Only the
//! framing differs between transports; every tool call flows through the
//! session's FIFO lock and the shared [`Pipeline`].

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::time::Instant;

use serde::Deserialize;
use serde::Serialize;
use serde_json::Value;
use serde_json::json;
use tablegate_core::Command;
use tablegate_core::Envelope;
use tablegate_core::Pipeline;

use crate::audit::AuditEvent;
use crate::audit::AuditSink;
use crate::session::SessionAgent;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Body was not valid JSON.
pub const PARSE_ERROR: i64 = -32700;
/// Body was JSON but not a JSON-RPC 2.0 request.
pub const INVALID_REQUEST: i64 = -32600;
/// Unknown method.
pub const METHOD_NOT_FOUND: i64 = -32601;
/// Malformed method parameters.
pub const INVALID_PARAMS: i64 = -32602;
/// Server-side serialization failure.
pub const INTERNAL_ERROR: i64 = -32603;
/// Missing or rejected credentials.
pub const UNAUTHENTICATED: i64 = -32001;
/// Session missing, closed, or bound to another credential.
pub const SESSION_NOT_FOUND: i64 = -32004;

/// Protocol revisions this server speaks, newest first.
pub const SUPPORTED_PROTOCOL_VERSIONS: &[&str] = &["2025-03-26", "2024-11-05"];

// ============================================================================
// SECTION: Wire Types
// ============================================================================

/// Incoming JSON-RPC message. A missing `id` marks a notification.
#[derive(Debug, Clone, Deserialize)]
pub struct JsonRpcRequest {
    /// JSON-RPC protocol version.
    pub jsonrpc: String,
    /// Request identifier. A present `null` is still a request.
    #[serde(default, deserialize_with = "deserialize_present_id")]
    pub id: Option<Value>,
    /// Method name.
    pub method: String,
    /// Optional parameters payload.
    #[serde(default)]
    pub params: Option<Value>,
}

impl JsonRpcRequest {
    /// Returns true for messages that expect no reply.
    #[must_use]
    pub const fn is_notification(&self) -> bool {
        self.id.is_none()
    }
}

/// Maps any present `id`, including `null`, to `Some`.
fn deserialize_present_id<'de, D>(deserializer: D) -> Result<Option<Value>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    Value::deserialize(deserializer).map(Some)
}

/// JSON-RPC response envelope.
#[derive(Debug, Clone, Serialize)]
pub struct JsonRpcResponse {
    /// JSON-RPC protocol version.
    pub jsonrpc: &'static str,
    /// Request identifier.
    pub id: Value,
    /// Successful result payload.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    /// Error payload when the request fails.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<JsonRpcError>,
}

impl JsonRpcResponse {
    /// Builds a success response.
    #[must_use]
    pub const fn success(id: Value, result: Value) -> Self {
        Self {
            jsonrpc: "2.0",
            id,
            result: Some(result),
            error: None,
        }
    }

    /// Builds an error response.
    #[must_use]
    pub fn failure(id: Value, code: i64, message: impl Into<String>) -> Self {
        Self {
            jsonrpc: "2.0",
            id,
            result: None,
            error: Some(JsonRpcError {
                code,
                message: message.into(),
            }),
        }
    }

    /// Serializes the response, falling back to a fixed internal error.
    #[must_use]
    pub fn to_json_string(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| {
            "{\"jsonrpc\":\"2.0\",\"id\":null,\"error\":{\"code\":-32603,\"message\":\"\
             serialization failed\"}}"
                .to_string()
        })
    }
}

/// JSON-RPC error payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct JsonRpcError {
    /// Error code.
    pub code: i64,
    /// Human-readable error message.
    pub message: String,
}

/// Tool call parameters.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct ToolCallParams {
    /// Tool name.
    name: String,
    /// Raw JSON arguments.
    #[serde(default)]
    arguments: Value,
    /// Request metadata; accepted and ignored.
    #[serde(default, rename = "_meta")]
    _meta: Option<Value>,
}

/// Tool output content block.
#[derive(Debug, Serialize)]
struct TextContent {
    /// Content type tag.
    #[serde(rename = "type")]
    kind: &'static str,
    /// Envelope JSON text.
    text: String,
}

/// Tool call result payload.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ToolCallResult {
    /// Text rendering of the envelope.
    content: Vec<TextContent>,
    /// The envelope itself.
    structured_content: Envelope,
    /// True when the envelope reports failure.
    is_error: bool,
}

/// Result of handling one message.
#[derive(Debug)]
pub enum RpcOutcome {
    /// Send this response.
    Reply(JsonRpcResponse),
    /// Notification accepted; nothing to send.
    Accepted,
    /// The session closed while the message ran; the result was dropped.
    Discarded,
}

// ============================================================================
// SECTION: Decoding
// ============================================================================

/// Decodes a message body.
///
/// # Errors
///
/// Returns the error response to send when the body is not a JSON-RPC 2.0
/// request.
pub fn parse_message(bytes: &[u8]) -> Result<JsonRpcRequest, Box<JsonRpcResponse>> {
    let value: Value = serde_json::from_slice(bytes).map_err(|_| {
        Box::new(JsonRpcResponse::failure(Value::Null, PARSE_ERROR, "invalid json"))
    })?;
    let id = value.get("id").cloned().unwrap_or(Value::Null);
    let request: JsonRpcRequest = serde_json::from_value(value).map_err(|_| {
        Box::new(JsonRpcResponse::failure(id.clone(), INVALID_REQUEST, "invalid json-rpc request"))
    })?;
    if request.jsonrpc != "2.0" {
        return Err(Box::new(JsonRpcResponse::failure(
            id,
            INVALID_REQUEST,
            "invalid json-rpc version",
        )));
    }
    Ok(request)
}

// ============================================================================
// SECTION: Dispatch
// ============================================================================

/// Dispatches a decoded message for a session.
pub async fn handle_request(
    pipeline: &Pipeline,
    audit: &dyn AuditSink,
    session: &SessionAgent,
    request: JsonRpcRequest,
) -> RpcOutcome {
    session.touch();
    let Some(id) = request.id else {
        return RpcOutcome::Accepted;
    };
    match request.method.as_str() {
        "initialize" => RpcOutcome::Reply(JsonRpcResponse::success(
            id,
            initialize_result(request.params.as_ref()),
        )),
        "ping" => RpcOutcome::Reply(JsonRpcResponse::success(id, json!({}))),
        "tools/list" => {
            let tools: Vec<Value> = session
                .registry()
                .descriptors()
                .iter()
                .map(|descriptor| {
                    json!({
                        "name": descriptor.name.as_str(),
                        "description": descriptor.description,
                        "inputSchema": descriptor.input_schema,
                    })
                })
                .collect();
            RpcOutcome::Reply(JsonRpcResponse::success(id, json!({ "tools": tools })))
        }
        "tools/call" => call_tool(pipeline, audit, session, id, request.params).await,
        _ => RpcOutcome::Reply(JsonRpcResponse::failure(id, METHOD_NOT_FOUND, "method not found")),
    }
}

/// Runs `tools/call` through the session.
async fn call_tool(
    pipeline: &Pipeline,
    audit: &dyn AuditSink,
    session: &SessionAgent,
    id: Value,
    params: Option<Value>,
) -> RpcOutcome {
    let Ok(call) = serde_json::from_value::<ToolCallParams>(params.unwrap_or(Value::Null)) else {
        return RpcOutcome::Reply(JsonRpcResponse::failure(
            id,
            INVALID_PARAMS,
            "invalid tool params",
        ));
    };
    let started = Instant::now();
    let requested = call.name.clone();
    let Some(report) = session.run(pipeline, Command::new(call.name, call.arguments)).await else {
        return RpcOutcome::Discarded;
    };
    audit.record(&AuditEvent::tool_call(
        session.id(),
        session.identity(),
        session.transport(),
        &requested,
        &report,
        started.elapsed(),
    ));
    let envelope = report.envelope;
    let Ok(text) = serde_json::to_string(&envelope) else {
        return RpcOutcome::Reply(JsonRpcResponse::failure(
            id,
            INTERNAL_ERROR,
            "serialization failed",
        ));
    };
    let result = ToolCallResult {
        content: vec![TextContent {
            kind: "text",
            text,
        }],
        is_error: !envelope.is_ok(),
        structured_content: envelope,
    };
    match serde_json::to_value(result) {
        Ok(value) => RpcOutcome::Reply(JsonRpcResponse::success(id, value)),
        Err(_) => RpcOutcome::Reply(JsonRpcResponse::failure(
            id,
            INTERNAL_ERROR,
            "serialization failed",
        )),
    }
}

/// Builds the `initialize` result, echoing a supported protocol revision.
fn initialize_result(params: Option<&Value>) -> Value {
    let requested = params
        .and_then(|params| params.get("protocolVersion"))
        .and_then(Value::as_str)
        .filter(|version| SUPPORTED_PROTOCOL_VERSIONS.contains(version));
    let version = requested.unwrap_or(SUPPORTED_PROTOCOL_VERSIONS[0]);
    json!({
        "protocolVersion": version,
        "capabilities": { "tools": { "listChanged": false } },
        "serverInfo": { "name": "tablegate", "version": env!("CARGO_PKG_VERSION") },
    })
}

// ============================================================================
// SECTION: Tests
// ============================================================================
