// crates/requiem-core/src/tool.rs
// ============================================================================
// Module: Tool Definition
// Description: Registry entry describing a single callable tool version.
// Purpose: Carry schemas, capability requirements, and drift-guarded digest
//          for one (name, version) registration.
// Dependencies: serde_json, crate::hashing
// ============================================================================

//! ## Overview
//! A [`ToolDefinition`] is inserted once per `(name, version)` pair and
//! never removed; the registry in `requiem-registry` owns lifetime. This
//! module only defines the shape and the digest drift guard (spec §3: "a
//! registry refuses a tool whose digest is absent or shorter than 32
//! chars").

use std::collections::BTreeSet;

use serde::Deserialize;
use serde::Serialize;
use serde_json::Value;

use crate::hashing::hash_canonical;

/// Minimum accepted digest length, guarding against truncated or missing
/// digests slipping into the registry (spec §3 "drift guard").
pub const MIN_DIGEST_LEN: usize = 32;

/// Execution latency class, used for scheduling hints and reporting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LatencyClass {
    /// Expected to complete quickly (sub-second).
    Low,
    /// Expected to take on the order of seconds.
    Medium,
    /// Expected to take tens of seconds or more.
    High,
}

/// Estimated resource cost for a single invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolCost {
    /// Estimated cost units charged per invocation (§3 "cost units").
    pub cost_units: u64,
    /// Latency class used for scheduling hints.
    pub latency_class: LatencyClass,
}

/// Behavioral flags declared by a tool author.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolFlags {
    /// Whether identical input is guaranteed to produce identical output.
    pub deterministic: bool,
    /// Whether the tool performs a side effect outside the process.
    pub side_effect: bool,
    /// Whether repeated calls with the same input are safe to retry.
    pub idempotent: bool,
    /// Whether the tool requires a non-empty tenant scope.
    pub tenant_scoped: bool,
}

/// A semantic version triple (`MAJOR.MINOR.PATCH`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SemVer {
    /// Major version component.
    pub major: u64,
    /// Minor version component.
    pub minor: u64,
    /// Patch version component.
    pub patch: u64,
}

impl SemVer {
    /// Creates a new semantic version.
    #[must_use]
    pub const fn new(major: u64, minor: u64, patch: u64) -> Self {
        Self { major, minor, patch }
    }

    /// Parses a `MAJOR.MINOR.PATCH` string.
    #[must_use]
    pub fn parse(input: &str) -> Option<Self> {
        let mut parts = input.split('.');
        let major = parts.next()?.parse().ok()?;
        let minor = parts.next()?.parse().ok()?;
        let patch = parts.next()?.parse().ok()?;
        if parts.next().is_some() {
            return None;
        }
        Some(Self { major, minor, patch })
    }
}

impl std::fmt::Display for SemVer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)
    }
}

/// Registry entry describing one `(name, version)` tool.
///
/// # Invariants
/// - `digest` is at least [`MIN_DIGEST_LEN`] characters; see
///   [`ToolDefinition::digest_is_valid`].
/// - Inserted once per `(name, version)`; duplicates are rejected by the
///   registry, not by this type.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolDefinition {
    /// Tool name.
    pub name: String,
    /// Tool version.
    pub version: SemVer,
    /// Human-readable description.
    pub description: String,
    /// Structural validator for input shape.
    pub input_schema: Value,
    /// Structural validator for output shape.
    pub output_schema: Value,
    /// Behavioral flags.
    pub flags: ToolFlags,
    /// Capability strings required to invoke this tool.
    pub required_capabilities: BTreeSet<String>,
    /// Drift-guarded digest over canonical `{name, version, schemas}`.
    pub digest: String,
    /// Estimated cost and latency class.
    pub cost: ToolCost,
}

impl ToolDefinition {
    /// Computes the canonical digest over `{name, version, schemas}` for a
    /// definition under construction.
    ///
    /// # Errors
    ///
    /// Returns a [`crate::hashing::HashError`] when the name, version, or
    /// schemas cannot be canonicalized (e.g. a non-finite number embedded
    /// in a schema).
    pub fn compute_digest(
        name: &str,
        version: SemVer,
        input_schema: &Value,
        output_schema: &Value,
    ) -> Result<String, crate::hashing::HashError> {
        let subject = serde_json::json!({
            "name": name,
            "version": version.to_string(),
            "input_schema": input_schema,
            "output_schema": output_schema,
        });
        hash_canonical(&subject)
    }

    /// Returns true when [`Self::digest`] meets the minimum length guard.
    #[must_use]
    pub fn digest_is_valid(&self) -> bool {
        self.digest.len() >= MIN_DIGEST_LEN
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::SemVer;
    use super::ToolDefinition;

    #[test]
    fn semver_parses_and_displays() {
        let version = SemVer::parse("1.2.3").expect("parse");
        assert_eq!(version, SemVer::new(1, 2, 3));
        assert_eq!(version.to_string(), "1.2.3");
    }

    #[test]
    fn semver_rejects_malformed_input() {
        assert!(SemVer::parse("1.2").is_none());
        assert!(SemVer::parse("1.2.3.4").is_none());
        assert!(SemVer::parse("a.b.c").is_none());
    }

    #[test]
    fn digest_is_deterministic_over_schemas() {
        let schema_in = json!({"type": "object"});
        let schema_out = json!({"type": "object"});
        let first =
            ToolDefinition::compute_digest("echo", SemVer::new(1, 0, 0), &schema_in, &schema_out)
                .expect("digest");
        let second =
            ToolDefinition::compute_digest("echo", SemVer::new(1, 0, 0), &schema_in, &schema_out)
                .expect("digest");
        assert_eq!(first, second);
        assert!(first.len() >= super::MIN_DIGEST_LEN);
    }

    #[test]
    fn digest_validity_guard_rejects_short_digests() {
        let schema = json!({"type": "object"});
        let digest =
            ToolDefinition::compute_digest("echo", SemVer::new(1, 0, 0), &schema, &schema)
                .expect("digest");
        let mut def = sample_definition(digest.clone());
        assert!(def.digest_is_valid());
        def.digest = digest[..10].to_string();
        assert!(!def.digest_is_valid());
    }

    fn sample_definition(digest: String) -> ToolDefinition {
        ToolDefinition {
            name: "echo".to_string(),
            version: SemVer::new(1, 0, 0),
            description: "Echoes input".to_string(),
            input_schema: json!({"type": "object"}),
            output_schema: json!({"type": "object"}),
            flags: super::ToolFlags {
                deterministic: true,
                side_effect: false,
                idempotent: true,
                tenant_scoped: true,
            },
            required_capabilities: Default::default(),
            digest,
            cost: super::ToolCost { cost_units: 0, latency_class: super::LatencyClass::Low },
        }
    }
}
