//! Auth and access validation tests for tablegate-config.
// crates/tablegate-config/tests/auth_validation.rs
// =============================================================================
// Module: Auth and Access Validation Tests
// Description: Static token, userinfo, and allow-list constraints.
// Purpose: Ensure identity configuration fails closed and never leaks tokens.
// =============================================================================

use tablegate_config::AuthMode;
use tablegate_config::StaticTokenConfig;
use tablegate_config::UserinfoConfig;

mod common;

use common::TestResult;
use common::assert_invalid;

fn token(token: &str, id: &str) -> StaticTokenConfig {
    StaticTokenConfig {
        token: token.to_string(),
        id: id.to_string(),
        display_name: None,
    }
}

fn userinfo(url: &str) -> UserinfoConfig {
    UserinfoConfig {
        url: url.to_string(),
        id_field: "login".to_string(),
        name_field: "name".to_string(),
        timeout_ms: 5_000,
        allow_http: false,
    }
}

#[test]
fn duplicate_tokens_are_rejected() -> TestResult {
    let mut config = common::minimal_config()?;
    config.auth.tokens.push(token("tok-alice", "mallory"));
    assert_invalid(config.validate(), "duplicates an earlier entry")
}

#[test]
fn duplicate_token_error_does_not_echo_token() -> TestResult {
    let mut config = common::minimal_config()?;
    config.auth.tokens.push(token("tok-alice", "mallory"));
    let message = config.validate().err().map(|err| err.to_string()).unwrap_or_default();
    if message.contains("tok-alice") {
        return Err(format!("token leaked in {message}"));
    }
    Ok(())
}

#[test]
fn token_shape_is_enforced() -> TestResult {
    let mut config = common::minimal_config()?;
    config.auth.tokens = vec![token("", "alice")];
    assert_invalid(config.validate(), "auth.tokens[0].token must be non-empty")?;

    config.auth.tokens = vec![token("has space", "alice")];
    assert_invalid(config.validate(), "must not contain whitespace")?;

    config.auth.tokens = vec![token(&"t".repeat(513), "alice")];
    assert_invalid(config.validate(), "auth.tokens[0].token too long")?;

    config.auth.tokens = vec![token("tok", " ")];
    assert_invalid(config.validate(), "auth.tokens[0].id must be non-empty")?;

    config.auth.tokens = vec![token("tok", &"a".repeat(257))];
    assert_invalid(config.validate(), "auth.tokens[0].id too long")
}

#[test]
fn token_count_is_capped() -> TestResult {
    let mut config = common::minimal_config()?;
    config.auth.tokens = (0 .. 257).map(|index| token(&format!("tok-{index}"), "a")).collect();
    assert_invalid(config.validate(), "auth.tokens exceeds max")
}

#[test]
fn static_token_identity_defaults_display_name_to_id() -> TestResult {
    let entry = token("tok", "carol");
    let identity = entry.identity();
    if identity.id() != "carol" || identity.display_name() != "carol" {
        return Err(format!("unexpected identity {identity}"));
    }
    let named = StaticTokenConfig {
        display_name: Some("Carol".to_string()),
        ..entry
    };
    if named.identity().display_name() != "Carol" {
        return Err("display name not applied".to_string());
    }
    Ok(())
}

#[test]
fn debug_output_redacts_tokens() -> TestResult {
    let rendered = format!("{:?}", token("super-secret", "alice"));
    if rendered.contains("super-secret") {
        return Err(format!("token leaked in {rendered}"));
    }
    Ok(())
}

#[test]
fn userinfo_mode_requires_section() -> TestResult {
    let mut config = common::minimal_config()?;
    config.auth.mode = AuthMode::Userinfo;
    config.auth.tokens.clear();
    assert_invalid(config.validate(), "requires an auth.userinfo section")?;

    config.auth.userinfo = Some(userinfo("https://api.github.com/user"));
    config.validate().map_err(|err| err.to_string())
}

#[test]
fn userinfo_mode_rejects_static_tokens() -> TestResult {
    let mut config = common::minimal_config()?;
    config.auth.mode = AuthMode::Userinfo;
    config.auth.userinfo = Some(userinfo("https://api.github.com/user"));
    assert_invalid(config.validate(), "auth.tokens is only valid")
}

#[test]
fn static_mode_rejects_userinfo_block() -> TestResult {
    let mut config = common::minimal_config()?;
    config.auth.userinfo = Some(userinfo("https://api.github.com/user"));
    assert_invalid(config.validate(), "auth.userinfo is only valid")
}

#[test]
fn userinfo_url_rules() -> TestResult {
    let mut config = common::minimal_config()?;
    config.auth.mode = AuthMode::Userinfo;
    config.auth.tokens.clear();

    config.auth.userinfo = Some(userinfo("http://127.0.0.1:9000/user"));
    assert_invalid(config.validate(), "must use https")?;

    let mut allowed = userinfo("http://127.0.0.1:9000/user");
    allowed.allow_http = true;
    config.auth.userinfo = Some(allowed);
    config.validate().map_err(|err| err.to_string())?;

    config.auth.userinfo = Some(userinfo("not a url"));
    assert_invalid(config.validate(), "must be an absolute url")?;

    config.auth.userinfo = Some(userinfo("https://user:pw@example.com/user"));
    assert_invalid(config.validate(), "must not embed credentials")?;

    let mut slow = userinfo("https://api.github.com/user");
    slow.timeout_ms = 0;
    config.auth.userinfo = Some(slow);
    assert_invalid(config.validate(), "auth.userinfo.timeout_ms")
}

#[test]
fn allow_list_entries_are_checked() -> TestResult {
    let mut config = common::minimal_config()?;
    config.access.write_allowlist = vec!["bob".to_string(), String::new()];
    assert_invalid(config.validate(), "access.write_allowlist[1] must be non-empty")?;

    config.access.write_allowlist = (0 .. 1025).map(|index| format!("id-{index}")).collect();
    assert_invalid(config.validate(), "access.write_allowlist exceeds max")
}

#[test]
fn padded_identity_ids_are_rejected() -> TestResult {
    let mut config = common::minimal_config()?;
    config.access.write_allowlist = vec![" bob".to_string()];
    assert_invalid(
        config.validate(),
        "access.write_allowlist[0] must not have leading or trailing whitespace",
    )?;

    let mut config = common::minimal_config()?;
    config.auth.tokens = vec![token("tok-bob", "bob ")];
    assert_invalid(
        config.validate(),
        "auth.tokens[0].id must not have leading or trailing whitespace",
    )
}

#[test]
fn token_identities_match_allow_list_entries() -> TestResult {
    let mut config = common::minimal_config()?;
    config.auth.tokens.push(token("tok-bob", "bob"));
    config.access.write_allowlist = vec!["bob".to_string()];
    config.validate().map_err(|err| err.to_string())?;
    let allow_list = config.access.allow_list();
    let granted: Vec<bool> = config
        .auth
        .tokens
        .iter()
        .map(|entry| allow_list.permits_writes(&entry.identity()))
        .collect();
    if granted != vec![false, true] {
        return Err("only the allow-listed token should grant writes".to_string());
    }
    Ok(())
}

#[test]
fn allow_list_collapses_duplicate_entries() -> TestResult {
    let mut config = common::minimal_config()?;
    config.access.write_allowlist = vec!["bob".to_string(), "bob".to_string()];
    let allow_list = config.access.allow_list();
    if allow_list.len() != 1 {
        return Err(format!("expected one entry, got {}", allow_list.len()));
    }
    Ok(())
}
