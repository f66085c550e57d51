// crates/tablegate-config/src/config.rs
// ============================================================================
// Module: Tablegate Configuration
// Description: Configuration loading and validation for the gateway.
// Purpose: Provide strict, fail-closed config parsing with hard limits.
// Dependencies: tablegate-core, serde, toml, url
// ============================================================================

//! ## Overview
//! Configuration is loaded from a TOML file with strict size and path limits.
//! Unknown keys are rejected and every section is validated before use;
//! missing or invalid configuration fails closed.
//! Security posture: config inputs are untrusted and may carry secrets
//! (static bearer tokens). Error messages never echo token values.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeSet;
use std::env;
use std::fs;
use std::net::SocketAddr;
use std::path::Path;
use std::path::PathBuf;

use serde::Deserialize;
use tablegate_core::AllowList;
use tablegate_core::Identity;
use thiserror::Error;
use url::Url;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Default configuration filename when no path is specified.
const DEFAULT_CONFIG_NAME: &str = "tablegate.toml";
/// Environment variable used to override the config path.
pub const CONFIG_ENV_VAR: &str = "TABLEGATE_CONFIG";
/// Maximum configuration file size in bytes.
pub(crate) const MAX_CONFIG_FILE_SIZE: usize = 1024 * 1024;
/// Maximum length of a single path component.
pub(crate) const MAX_PATH_COMPONENT_LENGTH: usize = 255;
/// Maximum total path length.
pub(crate) const MAX_TOTAL_PATH_LENGTH: usize = 4096;
/// Maximum number of static bearer tokens.
pub(crate) const MAX_STATIC_TOKENS: usize = 256;
/// Maximum length of a static bearer token.
pub(crate) const MAX_TOKEN_LENGTH: usize = 512;
/// Maximum length of identity ids and display names.
pub(crate) const MAX_IDENTITY_LENGTH: usize = 256;
/// Maximum number of write allow-list entries.
pub(crate) const MAX_ALLOWLIST_ENTRIES: usize = 1024;
/// Maximum request body size accepted by the server.
pub(crate) const MAX_BODY_BYTES_LIMIT: usize = 16 * 1024 * 1024;
/// Maximum idle timeout (seven days).
pub(crate) const MAX_IDLE_TIMEOUT_SECS: u64 = 7 * 24 * 60 * 60;
/// Maximum reaper sweep interval.
pub(crate) const MAX_SWEEP_INTERVAL_SECS: u64 = 3600;
/// Minimum outbound request timeout.
pub(crate) const MIN_TIMEOUT_MS: u64 = 100;
/// Maximum outbound request timeout.
pub(crate) const MAX_TIMEOUT_MS: u64 = 120_000;
/// Maximum provider response size.
pub(crate) const MAX_RESPONSE_BYTES_LIMIT: usize = 64 * 1024 * 1024;
/// Minimum error excerpt length.
pub(crate) const MIN_ERROR_EXCERPT_CHARS: usize = 16;
/// Maximum error excerpt length.
pub(crate) const MAX_ERROR_EXCERPT_CHARS: usize = 4096;
/// Maximum length of user agents and JSON field names.
pub(crate) const MAX_SHORT_STRING_LENGTH: usize = 256;

// ============================================================================
// SECTION: Root Config
// ============================================================================

/// Gateway configuration.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TablegateConfig {
    /// Server transport configuration.
    #[serde(default)]
    pub server: ServerConfig,
    /// Identity authority configuration.
    #[serde(default)]
    pub auth: AuthConfig,
    /// Write access configuration.
    #[serde(default)]
    pub access: AccessConfig,
    /// Tabular-data provider configuration.
    #[serde(default)]
    pub provider: ProviderConfig,
}

impl TablegateConfig {
    /// Loads configuration from disk using the default resolution rules.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when loading or validation fails.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let resolved = resolve_path(path)?;
        validate_path(&resolved)?;
        let bytes = fs::read(&resolved)
            .map_err(|err| ConfigError::Io(format!("{}: {err}", resolved.display())))?;
        if bytes.len() > MAX_CONFIG_FILE_SIZE {
            return Err(ConfigError::Invalid("config file exceeds size limit".to_string()));
        }
        let content = std::str::from_utf8(&bytes)
            .map_err(|_| ConfigError::Invalid("config file must be utf-8".to_string()))?;
        let config = Self::from_toml(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Parses configuration text without validating it.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Parse`] when the TOML is malformed or carries
    /// unknown keys.
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        toml::from_str(content).map_err(|err| ConfigError::Parse(err.to_string()))
    }

    /// Validates the configuration for internal consistency.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when configuration is invalid.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.server.validate()?;
        self.auth.validate()?;
        self.access.validate()?;
        self.provider.validate()?;
        Ok(())
    }
}

// ============================================================================
// SECTION: Server
// ============================================================================

/// Server transport configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ServerConfig {
    /// Socket address to bind.
    #[serde(default = "default_bind")]
    pub bind: String,
    /// Maximum inbound request body size.
    #[serde(default = "default_max_body_bytes")]
    pub max_body_bytes: usize,
    /// Seconds of inactivity before a session is reclaimed.
    #[serde(default = "default_idle_timeout_secs")]
    pub idle_timeout_secs: u64,
    /// Seconds between idle sweeps.
    #[serde(default = "default_sweep_interval_secs")]
    pub sweep_interval_secs: u64,
    /// Enabled transports.
    #[serde(default)]
    pub transports: TransportsConfig,
    /// Audit log configuration.
    #[serde(default)]
    pub audit: AuditConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            max_body_bytes: default_max_body_bytes(),
            idle_timeout_secs: default_idle_timeout_secs(),
            sweep_interval_secs: default_sweep_interval_secs(),
            transports: TransportsConfig::default(),
            audit: AuditConfig::default(),
        }
    }
}

impl ServerConfig {
    /// Returns the parsed bind address.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] when the address does not parse.
    pub fn bind_addr(&self) -> Result<SocketAddr, ConfigError> {
        self.bind
            .trim()
            .parse()
            .map_err(|_| ConfigError::Invalid("server.bind must be a socket address".to_string()))
    }

    /// Validates server configuration.
    fn validate(&self) -> Result<(), ConfigError> {
        self.bind_addr()?;
        if self.max_body_bytes == 0 || self.max_body_bytes > MAX_BODY_BYTES_LIMIT {
            return Err(ConfigError::Invalid(format!(
                "server.max_body_bytes must be between 1 and {MAX_BODY_BYTES_LIMIT}"
            )));
        }
        if self.idle_timeout_secs == 0 || self.idle_timeout_secs > MAX_IDLE_TIMEOUT_SECS {
            return Err(ConfigError::Invalid(format!(
                "server.idle_timeout_secs must be between 1 and {MAX_IDLE_TIMEOUT_SECS}"
            )));
        }
        if self.sweep_interval_secs == 0 || self.sweep_interval_secs > MAX_SWEEP_INTERVAL_SECS {
            return Err(ConfigError::Invalid(format!(
                "server.sweep_interval_secs must be between 1 and {MAX_SWEEP_INTERVAL_SECS}"
            )));
        }
        self.transports.validate()?;
        self.audit.validate()
    }
}

/// Transport toggles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TransportsConfig {
    /// Serve the streamable HTTP transport on `/mcp`.
    #[serde(default = "default_true")]
    pub streamable_http: bool,
    /// Serve the legacy event-stream transport on `/sse` and `/messages`.
    #[serde(default = "default_true")]
    pub legacy_sse: bool,
}

impl Default for TransportsConfig {
    fn default() -> Self {
        Self {
            streamable_http: true,
            legacy_sse: true,
        }
    }
}

impl TransportsConfig {
    fn validate(self) -> Result<(), ConfigError> {
        if !self.streamable_http && !self.legacy_sse {
            return Err(ConfigError::Invalid(
                "server.transports must enable at least one transport".to_string(),
            ));
        }
        Ok(())
    }
}

/// Audit log configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AuditConfig {
    /// Emit audit events.
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Optional JSON-lines file; stderr when absent.
    #[serde(default)]
    pub path: Option<String>,
}

impl Default for AuditConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            path: None,
        }
    }
}

impl AuditConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        if let Some(path) = &self.path {
            validate_path_string("server.audit.path", path)?;
        }
        Ok(())
    }
}

// ============================================================================
// SECTION: Auth
// ============================================================================

/// Identity authority selection.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthMode {
    /// Bearer tokens listed in this file.
    #[default]
    StaticTokens,
    /// Bearer tokens resolved by an external userinfo endpoint.
    Userinfo,
}

/// Identity authority configuration.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AuthConfig {
    /// Authority mode.
    #[serde(default)]
    pub mode: AuthMode,
    /// Static tokens (required for `static_tokens`).
    #[serde(default)]
    pub tokens: Vec<StaticTokenConfig>,
    /// Userinfo endpoint (required for `userinfo`).
    #[serde(default)]
    pub userinfo: Option<UserinfoConfig>,
}

impl AuthConfig {
    /// Validates auth configuration.
    fn validate(&self) -> Result<(), ConfigError> {
        match self.mode {
            AuthMode::StaticTokens => {
                if self.userinfo.is_some() {
                    return Err(ConfigError::Invalid(
                        "auth.userinfo is only valid with auth.mode=userinfo".to_string(),
                    ));
                }
                if self.tokens.is_empty() {
                    return Err(ConfigError::Invalid(
                        "auth.mode=static_tokens requires at least one auth.tokens entry"
                            .to_string(),
                    ));
                }
                if self.tokens.len() > MAX_STATIC_TOKENS {
                    return Err(ConfigError::Invalid(format!(
                        "auth.tokens exceeds max of {MAX_STATIC_TOKENS}"
                    )));
                }
                let mut seen = BTreeSet::new();
                for (index, entry) in self.tokens.iter().enumerate() {
                    entry.validate(index)?;
                    if !seen.insert(entry.token.as_str()) {
                        return Err(ConfigError::Invalid(format!(
                            "auth.tokens[{index}].token duplicates an earlier entry"
                        )));
                    }
                }
                Ok(())
            }
            AuthMode::Userinfo => {
                if !self.tokens.is_empty() {
                    return Err(ConfigError::Invalid(
                        "auth.tokens is only valid with auth.mode=static_tokens".to_string(),
                    ));
                }
                let Some(userinfo) = &self.userinfo else {
                    return Err(ConfigError::Invalid(
                        "auth.mode=userinfo requires an auth.userinfo section".to_string(),
                    ));
                };
                userinfo.validate()
            }
        }
    }
}

/// One static bearer token and the identity it resolves to.
#[derive(Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StaticTokenConfig {
    /// Bearer token value.
    pub token: String,
    /// Stable identity id.
    pub id: String,
    /// Display name; defaults to the id.
    #[serde(default)]
    pub display_name: Option<String>,
}

impl std::fmt::Debug for StaticTokenConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StaticTokenConfig")
            .field("token", &"<redacted>")
            .field("id", &self.id)
            .field("display_name", &self.display_name)
            .finish()
    }
}

impl StaticTokenConfig {
    /// Returns the identity this token resolves to.
    #[must_use]
    pub fn identity(&self) -> Identity {
        let display_name = self
            .display_name
            .as_deref()
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .unwrap_or_else(|| self.id.trim());
        Identity::new(self.id.trim(), display_name)
    }

    fn validate(&self, index: usize) -> Result<(), ConfigError> {
        if self.token.trim().is_empty() {
            return Err(ConfigError::Invalid(format!("auth.tokens[{index}].token must be non-empty")));
        }
        if self.token.len() > MAX_TOKEN_LENGTH {
            return Err(ConfigError::Invalid(format!("auth.tokens[{index}].token too long")));
        }
        if self.token.chars().any(|ch| ch.is_whitespace() || ch.is_control()) {
            return Err(ConfigError::Invalid(format!(
                "auth.tokens[{index}].token must not contain whitespace"
            )));
        }
        validate_identity_string(&format!("auth.tokens[{index}].id"), &self.id)?;
        if let Some(name) = &self.display_name
            && name.len() > MAX_IDENTITY_LENGTH
        {
            return Err(ConfigError::Invalid(format!(
                "auth.tokens[{index}].display_name too long"
            )));
        }
        Ok(())
    }
}

/// External userinfo endpoint.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UserinfoConfig {
    /// Endpoint URL called with the caller's bearer token.
    pub url: String,
    /// JSON field holding the stable identity id.
    #[serde(default = "default_id_field")]
    pub id_field: String,
    /// JSON field holding the display name.
    #[serde(default = "default_name_field")]
    pub name_field: String,
    /// Request timeout in milliseconds.
    #[serde(default = "default_userinfo_timeout_ms")]
    pub timeout_ms: u64,
    /// Allow cleartext http endpoints.
    #[serde(default)]
    pub allow_http: bool,
}

impl UserinfoConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        validate_url("auth.userinfo.url", &self.url, self.allow_http)?;
        validate_short_string("auth.userinfo.id_field", &self.id_field)?;
        validate_short_string("auth.userinfo.name_field", &self.name_field)?;
        validate_timeout("auth.userinfo.timeout_ms", self.timeout_ms)
    }
}

// ============================================================================
// SECTION: Access
// ============================================================================

/// Write access configuration.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AccessConfig {
    /// Identity ids allowed to run write operations. Empty is valid.
    #[serde(default)]
    pub write_allowlist: Vec<String>,
}

impl AccessConfig {
    /// Builds the runtime allow-list.
    #[must_use]
    pub fn allow_list(&self) -> AllowList {
        AllowList::new(self.write_allowlist.iter().map(|id| id.trim().to_string()))
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.write_allowlist.len() > MAX_ALLOWLIST_ENTRIES {
            return Err(ConfigError::Invalid(format!(
                "access.write_allowlist exceeds max of {MAX_ALLOWLIST_ENTRIES}"
            )));
        }
        for (index, id) in self.write_allowlist.iter().enumerate() {
            validate_identity_string(&format!("access.write_allowlist[{index}]"), id)?;
        }
        Ok(())
    }
}

// ============================================================================
// SECTION: Provider
// ============================================================================

/// Tabular-data provider configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ProviderConfig {
    /// Records API base URL.
    #[serde(default = "default_api_base_url")]
    pub api_base_url: String,
    /// Metadata API base URL.
    #[serde(default = "default_meta_base_url")]
    pub meta_base_url: String,
    /// Environment variable holding the provider API key.
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,
    /// Request timeout in milliseconds.
    #[serde(default = "default_provider_timeout_ms")]
    pub timeout_ms: u64,
    /// Maximum response body size.
    #[serde(default = "default_max_response_bytes")]
    pub max_response_bytes: usize,
    /// Maximum characters of upstream error text surfaced to callers.
    #[serde(default = "default_max_error_excerpt_chars")]
    pub max_error_excerpt_chars: usize,
    /// Allow cleartext http base URLs.
    #[serde(default)]
    pub allow_http: bool,
    /// User agent sent upstream.
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            api_base_url: default_api_base_url(),
            meta_base_url: default_meta_base_url(),
            api_key_env: default_api_key_env(),
            timeout_ms: default_provider_timeout_ms(),
            max_response_bytes: default_max_response_bytes(),
            max_error_excerpt_chars: default_max_error_excerpt_chars(),
            allow_http: false,
            user_agent: default_user_agent(),
        }
    }
}

impl ProviderConfig {
    /// Reads the API key from the configured environment variable.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] when the variable is unset or empty.
    pub fn resolve_api_key(&self) -> Result<String, ConfigError> {
        match env::var(&self.api_key_env) {
            Ok(value) if !value.trim().is_empty() => Ok(value.trim().to_string()),
            _ => Err(ConfigError::Invalid(format!(
                "environment variable {} must hold the provider api key",
                self.api_key_env
            ))),
        }
    }

    fn validate(&self) -> Result<(), ConfigError> {
        validate_url("provider.api_base_url", &self.api_base_url, self.allow_http)?;
        validate_url("provider.meta_base_url", &self.meta_base_url, self.allow_http)?;
        let env_name = self.api_key_env.trim();
        if env_name.is_empty()
            || env_name.len() > MAX_SHORT_STRING_LENGTH
            || !env_name.chars().all(|ch| ch.is_ascii_alphanumeric() || ch == '_')
        {
            return Err(ConfigError::Invalid(
                "provider.api_key_env must be a non-empty variable name".to_string(),
            ));
        }
        validate_timeout("provider.timeout_ms", self.timeout_ms)?;
        if self.max_response_bytes == 0 || self.max_response_bytes > MAX_RESPONSE_BYTES_LIMIT {
            return Err(ConfigError::Invalid(format!(
                "provider.max_response_bytes must be between 1 and {MAX_RESPONSE_BYTES_LIMIT}"
            )));
        }
        if !(MIN_ERROR_EXCERPT_CHARS ..= MAX_ERROR_EXCERPT_CHARS)
            .contains(&self.max_error_excerpt_chars)
        {
            return Err(ConfigError::Invalid(format!(
                "provider.max_error_excerpt_chars must be between {MIN_ERROR_EXCERPT_CHARS} and \
                 {MAX_ERROR_EXCERPT_CHARS}"
            )));
        }
        validate_short_string("provider.user_agent", &self.user_agent)
    }
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Configuration loading or validation errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// I/O failure while reading configuration.
    #[error("config io error: {0}")]
    Io(String),
    /// TOML parsing error.
    #[error("config parse error: {0}")]
    Parse(String),
    /// Invalid configuration data.
    #[error("invalid config: {0}")]
    Invalid(String),
}

// ============================================================================
// SECTION: Defaults
// ============================================================================

fn default_bind() -> String {
    "127.0.0.1:8787".to_string()
}

const fn default_max_body_bytes() -> usize {
    1024 * 1024
}

const fn default_idle_timeout_secs() -> u64 {
    1800
}

const fn default_sweep_interval_secs() -> u64 {
    30
}

const fn default_true() -> bool {
    true
}

fn default_id_field() -> String {
    "login".to_string()
}

fn default_name_field() -> String {
    "name".to_string()
}

const fn default_userinfo_timeout_ms() -> u64 {
    5_000
}

fn default_api_base_url() -> String {
    "https://api.airtable.com/v0".to_string()
}

fn default_meta_base_url() -> String {
    "https://api.airtable.com/v0/meta".to_string()
}

fn default_api_key_env() -> String {
    "AIRTABLE_API_KEY".to_string()
}

const fn default_provider_timeout_ms() -> u64 {
    10_000
}

const fn default_max_response_bytes() -> usize {
    8 * 1024 * 1024
}

const fn default_max_error_excerpt_chars() -> usize {
    500
}

fn default_user_agent() -> String {
    concat!("tablegate/", env!("CARGO_PKG_VERSION")).to_string()
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Resolves the config path from the argument, environment, or default.
fn resolve_path(path: Option<&Path>) -> Result<PathBuf, ConfigError> {
    if let Some(path) = path {
        return Ok(path.to_path_buf());
    }
    if let Ok(env_path) = env::var(CONFIG_ENV_VAR) {
        if env_path.len() > MAX_TOTAL_PATH_LENGTH {
            return Err(ConfigError::Invalid("config path exceeds max length".to_string()));
        }
        return Ok(PathBuf::from(env_path));
    }
    Ok(PathBuf::from(DEFAULT_CONFIG_NAME))
}

/// Validates the resolved path against security limits.
fn validate_path(path: &Path) -> Result<(), ConfigError> {
    let text = path.to_string_lossy();
    if text.len() > MAX_TOTAL_PATH_LENGTH {
        return Err(ConfigError::Invalid("config path exceeds max length".to_string()));
    }
    for component in path.components() {
        let value = component.as_os_str().to_string_lossy();
        if value.len() > MAX_PATH_COMPONENT_LENGTH {
            return Err(ConfigError::Invalid("config path component too long".to_string()));
        }
    }
    Ok(())
}

/// Validates a path string against length constraints.
fn validate_path_string(field: &str, value: &str) -> Result<(), ConfigError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(ConfigError::Invalid(format!("{field} must be non-empty")));
    }
    if trimmed.len() > MAX_TOTAL_PATH_LENGTH {
        return Err(ConfigError::Invalid(format!("{field} exceeds max length")));
    }
    for component in Path::new(trimmed).components() {
        if component.as_os_str().len() > MAX_PATH_COMPONENT_LENGTH {
            return Err(ConfigError::Invalid(format!("{field} path component too long")));
        }
    }
    Ok(())
}

/// Validates identity ids.
fn validate_identity_string(field: &str, value: &str) -> Result<(), ConfigError> {
    if value.trim().is_empty() {
        return Err(ConfigError::Invalid(format!("{field} must be non-empty")));
    }
    if value.trim() != value {
        return Err(ConfigError::Invalid(format!(
            "{field} must not have leading or trailing whitespace"
        )));
    }
    if value.len() > MAX_IDENTITY_LENGTH {
        return Err(ConfigError::Invalid(format!("{field} too long")));
    }
    Ok(())
}

/// Validates short free-form strings.
fn validate_short_string(field: &str, value: &str) -> Result<(), ConfigError> {
    if value.trim().is_empty() {
        return Err(ConfigError::Invalid(format!("{field} must be non-empty")));
    }
    if value.len() > MAX_SHORT_STRING_LENGTH {
        return Err(ConfigError::Invalid(format!("{field} too long")));
    }
    Ok(())
}

/// Validates an outbound timeout.
fn validate_timeout(field: &str, value: u64) -> Result<(), ConfigError> {
    if !(MIN_TIMEOUT_MS ..= MAX_TIMEOUT_MS).contains(&value) {
        return Err(ConfigError::Invalid(format!(
            "{field} must be between {MIN_TIMEOUT_MS} and {MAX_TIMEOUT_MS}"
        )));
    }
    Ok(())
}

/// Validates an outbound URL; https only unless cleartext is allowed.
fn validate_url(field: &str, value: &str, allow_http: bool) -> Result<(), ConfigError> {
    let url = Url::parse(value.trim())
        .map_err(|_| ConfigError::Invalid(format!("{field} must be an absolute url")))?;
    match url.scheme() {
        "https" => {}
        "http" if allow_http => {}
        "http" => {
            return Err(ConfigError::Invalid(format!(
                "{field} must use https unless allow_http is set"
            )));
        }
        other => {
            return Err(ConfigError::Invalid(format!("{field} has unsupported scheme {other}")));
        }
    }
    if url.host_str().is_none() {
        return Err(ConfigError::Invalid(format!("{field} must include a host")));
    }
    if !url.username().is_empty() || url.password().is_some() {
        return Err(ConfigError::Invalid(format!("{field} must not embed credentials")));
    }
    Ok(())
}
