// crates/requiem-core/src/error.rs
// ============================================================================
// Module: Error Envelope
// Description: Tagged error kinds, severity, retryability, and redaction.
// Purpose: Give every failure a stable, sanitized, cross-boundary shape.
// Dependencies: serde, std::collections::BTreeMap
// ============================================================================

//! ## Overview
//! Every error that crosses a handler, gate, or transport boundary is
//! wrapped in an [`ErrorEnvelope`]. Kinds are stable identifiers (never
//! reused for a different meaning); metadata is sanitized before
//! serialization so secrets never leave the process in a log line or an
//! RPC response.
//!
//! Security posture: metadata is assumed to carry caller-controlled keys
//! and values; redaction runs unconditionally, not opt-in.

use std::collections::BTreeMap;
use std::fmt;

use serde::Deserialize;
use serde::Serialize;
use serde_json::Value;

/// Stable error kind identifiers.
///
/// # Invariants
/// - Variants are serialized as `SCREAMING_SNAKE_CASE` and never renamed;
///   callers match on these strings across process and language boundaries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorKind {
    /// Referenced file does not exist.
    FileNotFound,
    /// Caller lacks permission for the requested resource.
    PermissionDenied,
    /// An operation exceeded its deadline.
    Timeout,
    /// Input failed validation.
    ValidationFailed,
    /// Input or output did not match a declared schema.
    SchemaMismatch,
    /// A required backend engine is unavailable.
    EngineUnavailable,
    /// Content-addressed storage failed an integrity check.
    CasIntegrityFailed,
    /// Tenant is not permitted to access the resource.
    TenantAccessDenied,
    /// Caller is not authenticated.
    Unauthorized,
    /// Caller is authenticated but not authorized.
    Forbidden,
    /// An active, non-expired membership is required.
    MembershipRequired,
    /// Replay did not reproduce a stored fingerprint.
    ReplayMismatch,
    /// A tool marked deterministic produced a different output on replay.
    DeterminismViolation,
    /// Two digests that should match did not.
    HashMismatch,
    /// A structural invariant of the runtime was violated.
    InvariantViolation,
    /// The tenant's budget for the window has been exhausted.
    BudgetExceeded,
    /// Tool output exceeded the configured size limit.
    ToolOutputTooLarge,
    /// Trigger payload exceeded the configured size limit.
    TriggerDataTooLarge,
    /// A skill with the same name and version is already registered.
    SkillAlreadyRegistered,
    /// A skill step failed during execution.
    SkillStepFailed,
    /// No provider is configured for a requested capability.
    ProviderNotConfigured,
    /// An unclassified internal error.
    InternalError,
}

/// Severity of an [`ErrorEnvelope`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    /// Diagnostic detail, not user-facing.
    Debug,
    /// Informational; no action required.
    Info,
    /// Caller should be aware; not necessarily a failure.
    Warning,
    /// An operation failed.
    Error,
    /// An operation failed in a way that threatens correctness guarantees.
    Critical,
}

/// Fully-qualified error information threaded across boundaries.
///
/// # Invariants
/// - `meta` is sanitized (see [`sanitize_metadata`]) before this value is
///   ever serialized.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorEnvelope {
    /// Stable error kind.
    pub code: ErrorKind,
    /// Human-readable message; never contains secrets or stack traces.
    pub message: String,
    /// Severity classification.
    pub severity: Severity,
    /// Whether retrying the operation unchanged might succeed.
    pub retryable: bool,
    /// Pipeline phase in which the error occurred, if known.
    pub phase: Option<String>,
    /// Underlying cause, one level of chaining.
    pub cause: Option<Box<ErrorEnvelope>>,
    /// Sanitized structured metadata.
    pub meta: Option<BTreeMap<String, Value>>,
    /// Unix epoch milliseconds when the envelope was constructed.
    pub timestamp: i64,
}

impl ErrorEnvelope {
    /// Creates a new envelope, sanitizing `meta` immediately.
    #[must_use]
    pub fn new(
        code: ErrorKind,
        message: impl Into<String>,
        severity: Severity,
        retryable: bool,
        timestamp: i64,
    ) -> Self {
        Self {
            code,
            message: message.into(),
            severity,
            retryable,
            phase: None,
            cause: None,
            meta: None,
            timestamp,
        }
    }

    /// Attaches a pipeline phase label.
    #[must_use]
    pub fn with_phase(mut self, phase: impl Into<String>) -> Self {
        self.phase = Some(phase.into());
        self
    }

    /// Attaches a causing envelope.
    #[must_use]
    pub fn with_cause(mut self, cause: ErrorEnvelope) -> Self {
        self.cause = Some(Box::new(cause));
        self
    }

    /// Attaches sanitized metadata.
    #[must_use]
    pub fn with_meta(mut self, meta: BTreeMap<String, Value>) -> Self {
        self.meta = Some(sanitize_metadata(meta));
        self
    }

    /// Returns the HTTP status code conventionally associated with this
    /// error's kind, per spec §4.2.
    #[must_use]
    pub const fn http_status(&self) -> u16 {
        match self.code {
            ErrorKind::Unauthorized => 401,
            ErrorKind::Forbidden
            | ErrorKind::TenantAccessDenied
            | ErrorKind::MembershipRequired => 403,
            ErrorKind::FileNotFound => 404,
            ErrorKind::ValidationFailed | ErrorKind::SchemaMismatch => 400,
            ErrorKind::SkillAlreadyRegistered => 409,
            ErrorKind::BudgetExceeded => 429,
            ErrorKind::Timeout => 504,
            _ => 500,
        }
    }
}

impl fmt::Display for ErrorEnvelope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}: {}", self.code, self.message)
    }
}

impl std::error::Error for ErrorEnvelope {}

/// Substring markers that mark a metadata key as sensitive.
const SENSITIVE_KEY_MARKERS: &[&str] =
    &["password", "token", "secret", "key", "auth", "credential", "api_key"];

/// Redacts any metadata value whose key contains a sensitive marker.
///
/// Matching is case-insensitive and substring-based: a key like
/// `"x-auth-token"` is redacted because it contains both `auth` and
/// `token`.
#[must_use]
pub fn sanitize_metadata(meta: BTreeMap<String, Value>) -> BTreeMap<String, Value> {
    meta.into_iter()
        .map(|(key, value)| {
            let lowered = key.to_ascii_lowercase();
            if SENSITIVE_KEY_MARKERS.iter().any(|marker| lowered.contains(marker)) {
                (key, Value::String("[REDACTED]".to_string()))
            } else {
                (key, value)
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::BTreeMap;
    use super::ErrorEnvelope;
    use super::ErrorKind;
    use super::Severity;
    use super::sanitize_metadata;

    #[test]
    fn redacts_sensitive_keys_case_insensitively() {
        let mut meta = BTreeMap::new();
        meta.insert("API_KEY".to_string(), json!("sk-live-1234"));
        meta.insert("user_id".to_string(), json!("u1"));
        let sanitized = sanitize_metadata(meta);
        assert_eq!(sanitized["API_KEY"], json!("[REDACTED]"));
        assert_eq!(sanitized["user_id"], json!("u1"));
    }

    #[test]
    fn http_status_mapping_matches_spec_table() {
        let unauthorized =
            ErrorEnvelope::new(ErrorKind::Unauthorized, "no auth", Severity::Error, false, 0);
        assert_eq!(unauthorized.http_status(), 401);
        let budget =
            ErrorEnvelope::new(ErrorKind::BudgetExceeded, "over budget", Severity::Error, false, 0);
        assert_eq!(budget.http_status(), 429);
        let timeout = ErrorEnvelope::new(ErrorKind::Timeout, "too slow", Severity::Error, true, 0);
        assert_eq!(timeout.http_status(), 504);
        let internal =
            ErrorEnvelope::new(ErrorKind::InternalError, "oops", Severity::Critical, false, 0);
        assert_eq!(internal.http_status(), 500);
    }

    #[test]
    fn cause_chain_round_trips_through_builder() {
        let cause = ErrorEnvelope::new(ErrorKind::Timeout, "upstream timed out", Severity::Error, true, 1);
        let wrapped = ErrorEnvelope::new(
            ErrorKind::InternalError,
            "handler failed",
            Severity::Critical,
            false,
            2,
        )
        .with_cause(cause)
        .with_phase("handler_execution");
        assert_eq!(wrapped.phase.as_deref(), Some("handler_execution"));
        assert_eq!(wrapped.cause.expect("cause").code, ErrorKind::Timeout);
    }
}
