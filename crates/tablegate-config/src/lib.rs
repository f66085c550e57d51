// crates/tablegate-config/src/lib.rs
// ============================================================================
// Module: Tablegate Config Library
// Description: Canonical config model, validation, and example generation.
// Purpose: Single source of truth for tablegate.toml semantics.
// Dependencies: tablegate-core, serde, toml, url
// ============================================================================

//! ## Overview
//! `tablegate-config` defines the configuration model for the gateway:
//! server transports, identity authority, write allow-list, and provider
//! client settings. Validation is strict and fail-closed.
//!
//! Security posture: config inputs are untrusted and may contain bearer
//! tokens; `Debug` output redacts them.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod config;
pub mod example;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use config::*;
pub use example::config_toml_example;
