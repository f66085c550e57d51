// crates/tablegate-config/src/example.rs
// ============================================================================
// Module: Config Example
// Description: Canonical example configuration payload.
// Purpose: Deterministic starting point for operators and tests.
// Dependencies: std
// ============================================================================

//! ## Overview
//! The example enables both transports, grants writes to one identity, and
//! points the provider at the public Airtable endpoints. It passes
//! [`crate::TablegateConfig::validate`] unchanged.

/// Returns a canonical example `tablegate.toml` configuration.
#[must_use]
pub fn config_toml_example() -> String {
    String::from(
        r#"[server]
bind = "127.0.0.1:8787"
max_body_bytes = 1048576
idle_timeout_secs = 1800
sweep_interval_secs = 30

[server.transports]
streamable_http = true
legacy_sse = true

[server.audit]
enabled = true
# path = "tablegate-audit.jsonl"

[auth]
mode = "static_tokens"

[[auth.tokens]]
token = "replace-me-alice"
id = "alice"
display_name = "Alice"

[[auth.tokens]]
token = "replace-me-bob"
id = "bob"
display_name = "Bob"

# [auth]
# mode = "userinfo"
# [auth.userinfo]
# url = "https://api.github.com/user"
# id_field = "login"
# name_field = "name"
# timeout_ms = 5000

[access]
write_allowlist = ["bob"]

[provider]
api_base_url = "https://api.airtable.com/v0"
meta_base_url = "https://api.airtable.com/v0/meta"
api_key_env = "AIRTABLE_API_KEY"
timeout_ms = 10000
max_response_bytes = 8388608
max_error_excerpt_chars = 500
allow_http = false
user_agent = "tablegate/0.1"
"#,
    )
}
