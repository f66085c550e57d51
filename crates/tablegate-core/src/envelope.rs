// crates/tablegate-core/src/envelope.rs
// ============================================================================
// Module: Result Envelope
// Description: Uniform success/failure wrapper for every command.
// Purpose: Normalize provider results and pipeline errors for transports.
// Dependencies: serde, serde_json, thiserror
// ============================================================================

//! ## Overview
//! Every command produces exactly one [`Envelope`]. Successful envelopes carry
//! the provider payload and no message; failed envelopes carry no payload and
//! a non-empty, bounded, human-readable message. Transports serialize the
//! envelope as-is, so identical commands yield identical envelopes regardless
//! of framing.

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde::Deserialize;
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

use crate::provider::ProviderError;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Maximum characters of an envelope error message.
pub const MAX_ERROR_MESSAGE_CHARS: usize = 1_024;

/// Marker appended to truncated excerpts.
const TRUNCATION_MARKER: char = '…';

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Error classes surfaced through envelopes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Arguments failed validation; the provider was not contacted.
    Validation,
    /// Operation is unknown or not registered for the session.
    NotFound,
    /// The provider request failed or returned a non-success status.
    Provider,
}

impl ErrorKind {
    /// Returns a stable label for the error kind.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Validation => "validation",
            Self::NotFound => "not_found",
            Self::Provider => "provider",
        }
    }

    /// Fallback message used when an error carries no text.
    const fn default_message(self) -> &'static str {
        match self {
            Self::Validation => "invalid arguments",
            Self::NotFound => "unknown tool",
            Self::Provider => "provider request failed",
        }
    }
}

/// Pipeline errors that terminate a single command.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GatewayError {
    /// Arguments are malformed or out of bounds.
    #[error("invalid arguments: {0}")]
    Validation(String),
    /// Operation is unknown or excluded from the session registry.
    #[error("unknown tool: {0}")]
    NotFound(String),
    /// Provider failure.
    #[error(transparent)]
    Provider(#[from] ProviderError),
}

impl GatewayError {
    /// Returns the envelope error kind.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::Validation(_) => ErrorKind::Validation,
            Self::NotFound(_) => ErrorKind::NotFound,
            Self::Provider(_) => ErrorKind::Provider,
        }
    }
}

// ============================================================================
// SECTION: Envelope
// ============================================================================

/// Uniform command result.
///
/// # Invariants
/// - `ok == true` implies `error_message == None` and `error_kind == None`.
/// - `ok == false` implies `payload == None` and a non-empty `error_message`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Envelope {
    /// Whether the command succeeded.
    ok: bool,
    /// Provider payload on success.
    payload: Option<Value>,
    /// Human-readable failure summary.
    error_message: Option<String>,
    /// Failure class.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    error_kind: Option<ErrorKind>,
}

impl Envelope {
    /// Wraps a successful payload.
    #[must_use]
    pub const fn from_success(payload: Value) -> Self {
        Self {
            ok: true,
            payload: Some(payload),
            error_message: None,
            error_kind: None,
        }
    }

    /// Wraps a pipeline failure.
    #[must_use]
    pub fn from_failure(error: &GatewayError) -> Self {
        let kind = error.kind();
        let mut message = bounded_excerpt(&error.to_string(), MAX_ERROR_MESSAGE_CHARS);
        if message.trim().is_empty() {
            message = kind.default_message().to_string();
        }
        Self {
            ok: false,
            payload: None,
            error_message: Some(message),
            error_kind: Some(kind),
        }
    }

    /// Returns true for successful envelopes.
    #[must_use]
    pub const fn is_ok(&self) -> bool {
        self.ok
    }

    /// Returns the success payload.
    #[must_use]
    pub const fn payload(&self) -> Option<&Value> {
        self.payload.as_ref()
    }

    /// Returns the failure message.
    #[must_use]
    pub fn error_message(&self) -> Option<&str> {
        self.error_message.as_deref()
    }

    /// Returns the failure class.
    #[must_use]
    pub const fn error_kind(&self) -> Option<ErrorKind> {
        self.error_kind
    }
}

impl From<Result<Value, GatewayError>> for Envelope {
    fn from(result: Result<Value, GatewayError>) -> Self {
        match result {
            Ok(payload) => Self::from_success(payload),
            Err(error) => Self::from_failure(&error),
        }
    }
}

// ============================================================================
// SECTION: Excerpts
// ============================================================================

/// Sanitizes and truncates text for inclusion in an error message.
///
/// Control characters become spaces, surrounding whitespace is trimmed, and
/// text longer than `max_chars` is cut on a char boundary and suffixed with an
/// ellipsis.
#[must_use]
pub fn bounded_excerpt(text: &str, max_chars: usize) -> String {
    let cleaned: String =
        text.chars().map(|ch| if ch.is_control() { ' ' } else { ch }).collect();
    let trimmed = cleaned.trim();
    if trimmed.chars().count() <= max_chars {
        return trimmed.to_string();
    }
    let mut excerpt: String = trimmed.chars().take(max_chars).collect();
    excerpt.push(TRUNCATION_MARKER);
    excerpt
}

// ============================================================================
// SECTION: Tests
// ============================================================================
