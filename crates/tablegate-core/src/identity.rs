// crates/tablegate-core/src/identity.rs
// ============================================================================
// Module: Caller Identity
// Description: Immutable identity bound to a gateway session.
// Purpose: Carry the authority-assigned caller id and display name.
// Dependencies: serde
// ============================================================================

//! ## Overview
//! An [`Identity`] is produced once per session by the identity authority and
//! never mutated afterwards. The gateway trusts it for the lifetime of the
//! session and performs no per-command re-verification.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fmt;

use serde::Deserialize;
use serde::Serialize;

// ============================================================================
// SECTION: Identity
// ============================================================================

/// Authenticated caller identity.
///
/// # Invariants
/// - Fields are private and fixed at construction.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Identity {
    /// Stable identifier assigned by the identity authority.
    id: String,
    /// Human-readable display name.
    display_name: String,
}

impl Identity {
    /// Creates a new identity.
    #[must_use]
    pub fn new(id: impl Into<String>, display_name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            display_name: display_name.into(),
        }
    }

    /// Returns the stable identifier.
    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Returns the display name.
    #[must_use]
    pub fn display_name(&self) -> &str {
        &self.display_name
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.display_name, self.id)
    }
}
