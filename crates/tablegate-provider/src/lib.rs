// crates/tablegate-provider/src/lib.rs
// ============================================================================
// Module: Tablegate Provider Library
// Description: REST adapter for the external tabular-data service.
// Purpose: Implement the core DataProvider trait over HTTPS.
// Dependencies: tablegate-core, reqwest, serde_json
// ============================================================================

//! ## Overview
//! [`RestProvider`] speaks the Airtable-compatible REST surface: a metadata
//! API for collections and schema units and a records API for reads and
//! batched writes. Each trait method maps to exactly one HTTP request.
//! Security posture: upstream responses are untrusted; bodies are size-capped
//! and error text is sanitized before it reaches callers.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod rest;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use rest::RestProvider;
pub use rest::RestProviderConfig;
