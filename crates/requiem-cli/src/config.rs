// crates/requiem-cli/src/config.rs
// ============================================================================
// Module: CLI Configuration
// Description: Reads the environment variables the core recognizes.
// Purpose: Turn spec §6's environment-variable table into a validated
//          RuntimeConfig before any collaborator is constructed.
// Dependencies: requiem_core::identifiers, thiserror
// ============================================================================

//! ## Overview
//! Every setting the CLI honors is read once, at startup, from the
//! environment. There is no config file and no command-line override for
//! these values; a misconfigured deployment should fail fast with a
//! user/input exit code rather than run with defaults that mask operator
//! error.

use requiem_core::identifiers::TenantId;
use thiserror::Error;

const TOOL_OUTPUT_MAX_BYTES_VAR: &str = "REQUIEM_TOOL_OUTPUT_MAX_BYTES";
const TRIGGER_DATA_MAX_BYTES_VAR: &str = "REQUIEM_TRIGGER_DATA_MAX_BYTES";
const TENANT_ID_VAR: &str = "REQUIEM_TENANT_ID";
const API_KEY_VAR: &str = "REQUIEM_API_KEY";
const ENTERPRISE_VAR: &str = "REQUIEM_ENTERPRISE";
const ASSERTIONS_VAR: &str = "REQUIEM_ASSERTIONS";

/// Default output cap (1 MiB), overridable by [`TOOL_OUTPUT_MAX_BYTES_VAR`].
pub const DEFAULT_TOOL_OUTPUT_MAX_BYTES: usize = 1024 * 1024;

/// Cost units a tenant may spend per window once `REQUIEM_ENTERPRISE=true`
/// raises the limit; not literally unbounded, since the accountant's
/// arithmetic stays exact at this ceiling.
pub const ENTERPRISE_MAX_COST_UNITS: u64 = u64::MAX;

/// Errors raised while reading the process environment.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A required variable was absent or empty.
    #[error("{name} must be set to a non-empty value")]
    MissingRequiredVar {
        /// The variable's name.
        name: &'static str,
    },
    /// A byte-count variable did not parse as a `usize`.
    #[error("{name}={value} is not a valid byte count")]
    InvalidByteCount {
        /// The variable's name.
        name: &'static str,
        /// The raw value that failed to parse.
        value: String,
    },
}

/// Validated settings read from the process environment at startup.
#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    /// Tool output size cap, in bytes.
    pub tool_output_max_bytes: usize,
    /// `tools/call` trigger-data size cap, in bytes.
    pub trigger_data_max_bytes: usize,
    /// Declared tenant for CLI-initiated invocations.
    pub tenant_id: TenantId,
    /// API key bound to `tenant_id`.
    pub api_key: String,
    /// Whether the enterprise budget ceiling applies.
    pub enterprise: bool,
    /// Whether runtime invariant assertions are enabled.
    pub assertions_enabled: bool,
}

impl RuntimeConfig {
    /// Reads and validates every recognized environment variable.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::MissingRequiredVar`] when `REQUIEM_TENANT_ID`
    /// or `REQUIEM_API_KEY` is absent or empty, or
    /// [`ConfigError::InvalidByteCount`] when a byte-count variable is
    /// present but fails to parse.
    pub fn from_env() -> Result<Self, ConfigError> {
        let tool_output_max_bytes = optional_byte_count(
            TOOL_OUTPUT_MAX_BYTES_VAR,
            DEFAULT_TOOL_OUTPUT_MAX_BYTES,
        )?;
        let trigger_data_max_bytes = optional_byte_count(
            TRIGGER_DATA_MAX_BYTES_VAR,
            requiem_rpc::DEFAULT_TRIGGER_DATA_MAX_BYTES,
        )?;
        let tenant_id = required_var(TENANT_ID_VAR)?;
        let api_key = required_var(API_KEY_VAR)?;
        let enterprise = is_true(ENTERPRISE_VAR);
        let assertions_enabled = is_true(ASSERTIONS_VAR);

        Ok(Self {
            tool_output_max_bytes,
            trigger_data_max_bytes,
            tenant_id: TenantId::new(tenant_id),
            api_key,
            enterprise,
            assertions_enabled,
        })
    }
}

fn required_var(name: &'static str) -> Result<String, ConfigError> {
    match std::env::var(name) {
        Ok(value) if !value.is_empty() => Ok(value),
        _ => Err(ConfigError::MissingRequiredVar { name }),
    }
}

fn optional_byte_count(name: &'static str, default: usize) -> Result<usize, ConfigError> {
    match std::env::var(name) {
        Ok(value) => value
            .parse::<usize>()
            .map_err(|_err| ConfigError::InvalidByteCount { name, value }),
        Err(_) => Ok(default),
    }
}

fn is_true(name: &str) -> bool {
    std::env::var(name).is_ok_and(|value| value.eq_ignore_ascii_case("true"))
}

#[cfg(test)]
mod tests {
    use super::ConfigError;
    use super::optional_byte_count;
    use super::required_var;

    #[test]
    fn missing_required_var_is_reported_by_name() {
        let err = required_var("REQUIEM_CLI_TEST_DOES_NOT_EXIST").expect_err("should be missing");
        assert!(matches!(err, ConfigError::MissingRequiredVar { name: "REQUIEM_CLI_TEST_DOES_NOT_EXIST" }));
    }

    #[test]
    fn missing_byte_count_var_falls_back_to_default() {
        let value = optional_byte_count("REQUIEM_CLI_TEST_DOES_NOT_EXIST", 42).expect("default");
        assert_eq!(value, 42);
    }
}
