// crates/tablegate-mcp/src/audit.rs
// ============================================================================
// Module: Gateway Audit Logging
// Description: Structured audit events for sessions and tool calls.
// Purpose: Emit redacted JSON-lines audit records to stderr or a file.
// Dependencies: tablegate-core, tablegate-config, serde
// ============================================================================

//! ## Overview
//! Every session lifecycle change, rejected credential, and tool call produces
//! one [`AuditEvent`]. Events never carry tokens or tool arguments; sessions
//! are correlated through a truncated token fingerprint instead.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fs::OpenOptions;
use std::io;
use std::io::Write;
use std::path::Path;
use std::sync::Arc;
use std::sync::Mutex;
use std::time::Duration;
use std::time::SystemTime;
use std::time::UNIX_EPOCH;

use serde::Serialize;
use tablegate_config::AuditConfig;
use tablegate_core::CommandReport;
use tablegate_core::Identity;
use tablegate_core::bounded_excerpt;

use crate::session::CloseReason;
use crate::session::TransportKind;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Characters kept from unregistered tool names.
const MAX_AUDIT_TOOL_CHARS: usize = 64;
/// Hex characters kept from token fingerprints.
const FINGERPRINT_PREFIX_CHARS: usize = 16;

// ============================================================================
// SECTION: Types
// ============================================================================

/// Audit event payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AuditEvent {
    /// Event identifier.
    pub event: &'static str,
    /// Event timestamp (milliseconds since epoch).
    pub timestamp_ms: u128,
    /// Session identifier when one exists.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
    /// Identity bound to the session.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub identity_id: Option<String>,
    /// Transport label.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transport: Option<&'static str>,
    /// Peer IP address when available.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub peer_ip: Option<String>,
    /// Tool name for tool calls.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool: Option<String>,
    /// `ok` or `error` for tool calls.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub outcome: Option<&'static str>,
    /// Normalized error kind label.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_kind: Option<&'static str>,
    /// Whether the provider was contacted.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub provider_called: Option<bool>,
    /// Tool call latency.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub elapsed_ms: Option<u128>,
    /// Close or denial reason.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    /// Leading characters of the token fingerprint.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token_fingerprint: Option<String>,
}

impl AuditEvent {
    /// Creates an empty event with the current timestamp.
    fn base(event: &'static str) -> Self {
        Self {
            event,
            timestamp_ms: now_millis(),
            session_id: None,
            identity_id: None,
            transport: None,
            peer_ip: None,
            tool: None,
            outcome: None,
            error_kind: None,
            provider_called: None,
            elapsed_ms: None,
            reason: None,
            token_fingerprint: None,
        }
    }

    /// Session bound to an identity.
    #[must_use]
    pub fn session_established(
        session_id: &str,
        identity: &Identity,
        transport: TransportKind,
        peer_ip: Option<String>,
        fingerprint: &str,
    ) -> Self {
        Self {
            session_id: Some(session_id.to_string()),
            identity_id: Some(identity.id().to_string()),
            transport: Some(transport.as_str()),
            peer_ip,
            token_fingerprint: Some(fingerprint_prefix(fingerprint)),
            ..Self::base("session_established")
        }
    }

    /// Session torn down.
    #[must_use]
    pub fn session_closed(
        session_id: &str,
        identity: &Identity,
        transport: TransportKind,
        reason: CloseReason,
    ) -> Self {
        Self {
            session_id: Some(session_id.to_string()),
            identity_id: Some(identity.id().to_string()),
            transport: Some(transport.as_str()),
            reason: Some(reason.as_str().to_string()),
            ..Self::base("session_closed")
        }
    }

    /// Credentials rejected before a session existed.
    #[must_use]
    pub fn auth_denied(transport: TransportKind, peer_ip: Option<String>, reason: &str) -> Self {
        Self {
            transport: Some(transport.as_str()),
            peer_ip,
            reason: Some(reason.to_string()),
            ..Self::base("auth_denied")
        }
    }

    /// Tool call completed.
    #[must_use]
    pub fn tool_call(
        session_id: &str,
        identity: &Identity,
        transport: TransportKind,
        requested: &str,
        report: &CommandReport,
        elapsed: Duration,
    ) -> Self {
        let tool = report.operation.map_or_else(
            || bounded_excerpt(requested, MAX_AUDIT_TOOL_CHARS),
            |operation| operation.as_str().to_string(),
        );
        Self {
            session_id: Some(session_id.to_string()),
            identity_id: Some(identity.id().to_string()),
            transport: Some(transport.as_str()),
            tool: Some(tool),
            outcome: Some(if report.envelope.is_ok() { "ok" } else { "error" }),
            error_kind: report.error_kind().map(|kind| kind.as_str()),
            provider_called: Some(report.provider_called),
            elapsed_ms: Some(elapsed.as_millis()),
            ..Self::base("tool_call")
        }
    }
}

// ============================================================================
// SECTION: Sinks
// ============================================================================

/// Audit sink for gateway events.
pub trait AuditSink: Send + Sync {
    /// Records an audit event.
    fn record(&self, event: &AuditEvent);
}

/// Audit sink that logs JSON lines to stderr.
pub struct StderrAuditSink;

impl AuditSink for StderrAuditSink {
    fn record(&self, event: &AuditEvent) {
        let _ = write_json_line(&mut io::stderr().lock(), event);
    }
}

/// Audit sink that appends JSON lines to a file.
pub struct FileAuditSink {
    /// File handle used for append-only logging.
    file: Mutex<std::fs::File>,
}

impl FileAuditSink {
    /// Opens the audit log file in append mode.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be opened.
    pub fn new(path: &Path) -> io::Result<Self> {
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        Ok(Self {
            file: Mutex::new(file),
        })
    }
}

impl AuditSink for FileAuditSink {
    fn record(&self, event: &AuditEvent) {
        if let Ok(mut file) = self.file.lock() {
            let _ = write_json_line(&mut *file, event);
        }
    }
}

/// No-op audit sink.
pub struct NoopAuditSink;

impl AuditSink for NoopAuditSink {
    fn record(&self, _event: &AuditEvent) {}
}

/// Writes one event as a JSON line and flushes the writer.
fn write_json_line<W: Write>(writer: &mut W, event: &AuditEvent) -> io::Result<()> {
    let payload = serde_json::to_string(event).map_err(io::Error::other)?;
    writeln!(writer, "{payload}")?;
    writer.flush()
}

/// Builds the sink selected by configuration.
///
/// # Errors
///
/// Returns an error when the configured file cannot be opened.
pub fn sink_from_config(config: &AuditConfig) -> io::Result<Arc<dyn AuditSink>> {
    if !config.enabled {
        return Ok(Arc::new(NoopAuditSink));
    }
    match config.path.as_deref() {
        Some(path) => Ok(Arc::new(FileAuditSink::new(Path::new(path))?)),
        None => Ok(Arc::new(StderrAuditSink)),
    }
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Returns the current time in milliseconds since epoch.
fn now_millis() -> u128 {
    SystemTime::now().duration_since(UNIX_EPOCH).map_or(0, |duration| duration.as_millis())
}

/// Truncates a fingerprint for logging.
fn fingerprint_prefix(fingerprint: &str) -> String {
    fingerprint.chars().take(FINGERPRINT_PREFIX_CHARS).collect()
}
