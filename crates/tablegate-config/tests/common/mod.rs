// crates/tablegate-config/tests/common/mod.rs
// =============================================================================
// Module: Config Test Helpers
// Description: Shared helpers for config validation tests.
// Purpose: Reduce duplication across integration tests for tablegate-config.
// =============================================================================

#![allow(dead_code, reason = "Test helpers are selectively used across suites.")]

use tablegate_config::ConfigError;
use tablegate_config::TablegateConfig;

/// Result type used by config tests.
pub type TestResult = Result<(), String>;

/// Smallest TOML that passes validation.
pub const MINIMAL_TOML: &str = r#"
[[auth.tokens]]
token = "tok-alice"
id = "alice"
"#;

/// Parses a TOML string into a `TablegateConfig` for tests.
pub fn config_from_toml(toml_str: &str) -> Result<TablegateConfig, String> {
    TablegateConfig::from_toml(toml_str).map_err(|err| err.to_string())
}

/// Returns a minimal valid config with all defaults applied.
pub fn minimal_config() -> Result<TablegateConfig, String> {
    config_from_toml(MINIMAL_TOML)
}

/// Asserts a validation result failed with a message containing `needle`.
pub fn assert_invalid(result: Result<(), ConfigError>, needle: &str) -> TestResult {
    match result {
        Err(error) => {
            let message = error.to_string();
            if message.contains(needle) {
                Ok(())
            } else {
                Err(format!("error {message} did not contain {needle}"))
            }
        }
        Ok(()) => Err("expected invalid config".to_string()),
    }
}
