// crates/tablegate-mcp/src/auth.rs
// ============================================================================
// Module: Identity Authorities
// Description: Bearer token parsing and token-to-identity resolution.
// Purpose: Bind every session to an identity vouched for by an authority.
// Dependencies: tablegate-core, tablegate-config, reqwest, sha2, subtle
// ============================================================================

//! ## Overview
//! Sessions start from a bearer token. [`parse_bearer_token`] extracts it from
//! the `Authorization` header and an [`IdentityAuthority`] resolves it to an
//! [`Identity`]. Two authorities ship: [`StaticTokenAuthority`] for tokens
//! listed in configuration and [`UserinfoAuthority`] for an external OAuth
//! userinfo endpoint. All decisions are fail-closed. Tokens are never logged;
//! only their SHA-256 fingerprints leave this module.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use reqwest::StatusCode;
use reqwest::Url;
use reqwest::header::ACCEPT;
use reqwest::redirect::Policy;
use serde_json::Value;
use sha2::Digest;
use sha2::Sha256;
use subtle::ConstantTimeEq;
use tablegate_config::AuthConfig;
use tablegate_config::AuthMode;
use tablegate_config::UserinfoConfig;
use tablegate_core::Identity;
use thiserror::Error;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Maximum accepted `Authorization` header size.
const MAX_AUTH_HEADER_BYTES: usize = 8 * 1024;
/// Maximum userinfo response size.
const MAX_USERINFO_BYTES: usize = 64 * 1024;
/// Maximum length of a resolved identity id or display name.
const MAX_IDENTITY_FIELD_BYTES: usize = 256;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Authentication errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AuthError {
    /// Missing, malformed, or rejected credentials.
    #[error("unauthenticated: {0}")]
    Unauthenticated(String),
    /// The identity authority could not be reached or answered badly.
    #[error("identity authority unavailable: {0}")]
    Unavailable(String),
}

// ============================================================================
// SECTION: Token Helpers
// ============================================================================

/// Extracts the bearer token from an `Authorization` header value.
///
/// # Errors
///
/// Returns [`AuthError::Unauthenticated`] when the header is missing,
/// oversized, or not a bearer credential.
pub fn parse_bearer_token(auth_header: Option<&str>) -> Result<String, AuthError> {
    let header = auth_header
        .ok_or_else(|| AuthError::Unauthenticated("missing authorization".to_string()))?;
    if header.len() > MAX_AUTH_HEADER_BYTES {
        return Err(AuthError::Unauthenticated("authorization header too large".to_string()));
    }
    let mut parts = header.trim().splitn(2, ' ');
    let scheme = parts.next().unwrap_or_default();
    let token = parts.next().unwrap_or_default().trim();
    if !scheme.eq_ignore_ascii_case("bearer") || token.is_empty() {
        return Err(AuthError::Unauthenticated("invalid authorization header".to_string()));
    }
    Ok(token.to_string())
}

/// Returns the lowercase hex SHA-256 fingerprint of a token.
#[must_use]
pub fn token_fingerprint(token: &str) -> String {
    let digest = Sha256::digest(token.as_bytes());
    digest.iter().map(|byte| format!("{byte:02x}")).collect()
}

/// Compares two fingerprints in constant time.
#[must_use]
pub fn fingerprints_match(left: &str, right: &str) -> bool {
    bool::from(left.as_bytes().ct_eq(right.as_bytes()))
}

// ============================================================================
// SECTION: Authority Trait
// ============================================================================

/// Resolves bearer tokens to identities.
#[async_trait]
pub trait IdentityAuthority: Send + Sync {
    /// Resolves a token to the identity it was issued to.
    async fn resolve(&self, token: &str) -> Result<Identity, AuthError>;
}

/// Builds the authority selected by configuration.
///
/// # Errors
///
/// Returns [`AuthError::Unavailable`] when the userinfo client cannot be
/// created or its section is missing.
pub fn authority_from_config(
    config: &AuthConfig,
    user_agent: &str,
) -> Result<Box<dyn IdentityAuthority>, AuthError> {
    match config.mode {
        AuthMode::StaticTokens => Ok(Box::new(StaticTokenAuthority::new(
            config.tokens.iter().map(|entry| (entry.token.clone(), entry.identity())),
        ))),
        AuthMode::Userinfo => {
            let userinfo = config.userinfo.as_ref().ok_or_else(|| {
                AuthError::Unavailable("auth.userinfo section missing".to_string())
            })?;
            Ok(Box::new(UserinfoAuthority::new(userinfo, user_agent)?))
        }
    }
}

// ============================================================================
// SECTION: Static Tokens
// ============================================================================

/// Authority backed by a fixed token table.
pub struct StaticTokenAuthority {
    /// Token digests and the identities they resolve to.
    entries: Vec<([u8; 32], Identity)>,
}

impl StaticTokenAuthority {
    /// Builds an authority from `(token, identity)` pairs.
    #[must_use]
    pub fn new<I>(entries: I) -> Self
    where
        I: IntoIterator<Item = (String, Identity)>,
    {
        Self {
            entries: entries
                .into_iter()
                .map(|(token, identity)| (Sha256::digest(token.as_bytes()).into(), identity))
                .collect(),
        }
    }
}

#[async_trait]
impl IdentityAuthority for StaticTokenAuthority {
    async fn resolve(&self, token: &str) -> Result<Identity, AuthError> {
        let presented: [u8; 32] = Sha256::digest(token.as_bytes()).into();
        let mut found = None;
        for (digest, identity) in &self.entries {
            if bool::from(digest.ct_eq(&presented)) && found.is_none() {
                found = Some(identity);
            }
        }
        found
            .cloned()
            .ok_or_else(|| AuthError::Unauthenticated("invalid bearer token".to_string()))
    }
}

// ============================================================================
// SECTION: Userinfo
// ============================================================================

/// Authority that asks an OAuth userinfo endpoint who owns a token.
pub struct UserinfoAuthority {
    /// Endpoint URL.
    url: Url,
    /// Field holding the stable id.
    id_field: String,
    /// Field holding the display name.
    name_field: String,
    /// HTTP client used for lookups.
    client: Client,
}

impl UserinfoAuthority {
    /// Creates a userinfo authority.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::Unavailable`] when the URL is unusable or the
    /// client cannot be built.
    pub fn new(config: &UserinfoConfig, user_agent: &str) -> Result<Self, AuthError> {
        let url = Url::parse(config.url.trim())
            .map_err(|_| AuthError::Unavailable("invalid userinfo url".to_string()))?;
        let scheme_ok = url.scheme() == "https" || (config.allow_http && url.scheme() == "http");
        if !scheme_ok {
            return Err(AuthError::Unavailable("userinfo url scheme not allowed".to_string()));
        }
        let client = Client::builder()
            .timeout(Duration::from_millis(config.timeout_ms))
            .user_agent(user_agent.to_string())
            .redirect(Policy::none())
            .build()
            .map_err(|_| AuthError::Unavailable("http client build failed".to_string()))?;
        Ok(Self {
            url,
            id_field: config.id_field.clone(),
            name_field: config.name_field.clone(),
            client,
        })
    }
}

#[async_trait]
impl IdentityAuthority for UserinfoAuthority {
    async fn resolve(&self, token: &str) -> Result<Identity, AuthError> {
        let mut response = self
            .client
            .get(self.url.clone())
            .bearer_auth(token)
            .header(ACCEPT, "application/json")
            .send()
            .await
            .map_err(|_| AuthError::Unavailable("userinfo request failed".to_string()))?;
        let status = response.status();
        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            return Err(AuthError::Unauthenticated(
                "token rejected by identity authority".to_string(),
            ));
        }
        if !status.is_success() {
            return Err(AuthError::Unavailable(format!("userinfo returned {}", status.as_u16())));
        }
        let mut body = Vec::new();
        while let Some(chunk) = response
            .chunk()
            .await
            .map_err(|_| AuthError::Unavailable("userinfo read failed".to_string()))?
        {
            if body.len().saturating_add(chunk.len()) > MAX_USERINFO_BYTES {
                return Err(AuthError::Unavailable("userinfo response too large".to_string()));
            }
            body.extend_from_slice(&chunk);
        }
        let profile: Value = serde_json::from_slice(&body)
            .map_err(|_| AuthError::Unavailable("userinfo response is not json".to_string()))?;
        identity_from_profile(&profile, &self.id_field, &self.name_field)
    }
}

/// Reads the identity fields out of a userinfo profile.
fn identity_from_profile(
    profile: &Value,
    id_field: &str,
    name_field: &str,
) -> Result<Identity, AuthError> {
    let id = match profile.get(id_field) {
        Some(Value::String(text)) => text.trim().to_string(),
        Some(Value::Number(number)) => number.to_string(),
        _ => String::new(),
    };
    if id.is_empty() || id.len() > MAX_IDENTITY_FIELD_BYTES {
        return Err(AuthError::Unavailable(format!("userinfo lacks a usable {id_field}")));
    }
    let name = profile
        .get(name_field)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|name| !name.is_empty() && name.len() <= MAX_IDENTITY_FIELD_BYTES)
        .unwrap_or(&id)
        .to_string();
    Ok(Identity::new(id, name))
}

// ============================================================================
// SECTION: Tests
// ============================================================================
