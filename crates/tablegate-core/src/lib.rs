// crates/tablegate-core/src/lib.rs
// ============================================================================
// Module: Tablegate Core Library
// Description: Public API surface for the Tablegate command pipeline.
// Purpose: Expose identity, access, validation, envelope, and provider types.
// Dependencies: crate::{identity, operation, access, validation, envelope, provider, pipeline}
// ============================================================================

//! ## Overview
//! Tablegate core is the transport-agnostic half of the gateway. It binds an
//! authenticated [`Identity`] to a permission-filtered [`OperationRegistry`],
//! validates raw tool arguments into typed commands, executes them against a
//! [`DataProvider`], and normalizes every outcome into an [`Envelope`].
//!
//! Nothing in this crate knows about HTTP, JSON-RPC, or sessions; the MCP
//! crate drives [`Pipeline`] from both wire transports.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod access;
pub mod envelope;
pub mod identity;
pub mod operation;
pub mod pipeline;
pub mod provider;
pub mod validation;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use access::AllowList;
pub use access::OperationRegistry;
pub use envelope::Envelope;
pub use envelope::ErrorKind;
pub use envelope::GatewayError;
pub use envelope::bounded_excerpt;
pub use identity::Identity;
pub use operation::Classification;
pub use operation::OperationDescriptor;
pub use operation::OperationName;
pub use pipeline::Command;
pub use pipeline::CommandReport;
pub use pipeline::Pipeline;
pub use provider::DataProvider;
pub use provider::ProviderError;
pub use provider::RecordQuery;
pub use provider::RecordUpdate;
pub use provider::SortDirection;
pub use provider::SortSpec;
pub use provider::TableRef;
pub use validation::ValidatedCommand;
pub use validation::validate_arguments;
