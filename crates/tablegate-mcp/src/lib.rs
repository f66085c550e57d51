// crates/tablegate-mcp/src/lib.rs
// ============================================================================
// Module: Tablegate MCP
// Description: MCP transports, sessions, and identity binding for Tablegate.
// Purpose: Serve the command pipeline over streamable HTTP and legacy SSE.
// Dependencies: tablegate-core, tablegate-config, axum, tokio
// ============================================================================

//! ## Overview
//! Tablegate MCP authenticates clients through an [`IdentityAuthority`],
//! binds each one to a [`SessionAgent`] holding a permission-filtered
//! registry, and routes JSON-RPC tool calls into the shared
//! [`tablegate_core::Pipeline`]. Both wire transports produce identical
//! envelopes for identical commands.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod audit;
pub mod auth;
pub mod jsonrpc;
pub mod server;
pub mod session;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use audit::AuditEvent;
pub use audit::AuditSink;
pub use audit::FileAuditSink;
pub use audit::NoopAuditSink;
pub use audit::StderrAuditSink;
pub use auth::AuthError;
pub use auth::IdentityAuthority;
pub use auth::StaticTokenAuthority;
pub use auth::UserinfoAuthority;
pub use server::GatewayServer;
pub use server::ServerError;
pub use server::ServerSettings;
pub use server::TransportError;
pub use session::CloseReason;
pub use session::SessionAgent;
pub use session::SessionStore;
pub use session::TransportKind;
