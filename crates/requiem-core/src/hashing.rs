// crates/requiem-core/src/hashing.rs
// ============================================================================
// Module: Content-Addressed Digest
// Description: Canonical-JSON BLAKE3 fingerprints for replay-stable hashing.
// Purpose: Give every persisted structure a stable, cross-platform digest.
// Dependencies: blake3, serde, serde_jcs, serde_json
// ============================================================================

//! ## Overview
//! Every fingerprint in Requiem is BLAKE3 over a canonical JSON form: keys
//! sorted lexicographically at every nesting level, no insignificant
//! whitespace, finite numbers only. `serde_jcs` provides the canonicalization
//! (RFC 8785-style key ordering); this module only adds the hashing and the
//! finite-number guard the spec requires (NaN/Infinity must be rejected, not
//! silently coerced).
//!
//! Security posture: inputs to [`hash_canonical`] are treated as untrusted
//! and are validated before hashing; a malformed or non-finite value is a
//! hard error, never a best-effort digest.

use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

/// Errors returned while computing a canonical digest.
#[derive(Debug, Error)]
pub enum HashError {
    /// The value failed to serialize to JSON.
    #[error("failed to serialize value: {0}")]
    Serialize(String),
    /// The value contained a non-finite number (`NaN` or `Infinity`).
    #[error("value contains a non-finite number at or below the root")]
    NonFiniteNumber,
    /// Canonicalization failed.
    #[error("failed to canonicalize value: {0}")]
    Canonicalize(String),
}

/// Computes the 64-character lowercase hex BLAKE3 digest of raw bytes.
#[must_use]
pub fn hash_bytes(bytes: &[u8]) -> String {
    blake3::hash(bytes).to_hex().to_string()
}

/// Returns the first 16 characters of a hex digest.
///
/// # Panics
///
/// Panics if `digest` is shorter than 16 characters; every digest produced
/// by [`hash_bytes`] is exactly 64 characters, so this only fires on
/// malformed input from outside this module.
#[must_use]
pub fn hash_short(digest: &str) -> &str {
    &digest[..16.min(digest.len())]
}

/// Serializes `value` to its canonical JSON byte form.
///
/// # Errors
///
/// Returns [`HashError::Serialize`] when `value` cannot be represented as
/// JSON, and [`HashError::NonFiniteNumber`] when any number in the tree is
/// `NaN` or infinite.
pub fn canonical_bytes<T: Serialize>(value: &T) -> Result<Vec<u8>, HashError> {
    let as_value =
        serde_json::to_value(value).map_err(|err| HashError::Serialize(err.to_string()))?;
    reject_non_finite(&as_value)?;
    serde_jcs::to_vec(&as_value).map_err(|err| HashError::Canonicalize(err.to_string()))
}

/// Computes the BLAKE3 digest of the canonical JSON form of `value`.
///
/// # Errors
///
/// Propagates [`canonical_bytes`] errors.
pub fn hash_canonical<T: Serialize>(value: &T) -> Result<String, HashError> {
    Ok(hash_bytes(&canonical_bytes(value)?))
}

/// Walks a parsed JSON value and rejects any non-finite float.
fn reject_non_finite(value: &Value) -> Result<(), HashError> {
    match value {
        Value::Number(number) => {
            if let Some(as_f64) = number.as_f64()
                && !as_f64.is_finite()
            {
                return Err(HashError::NonFiniteNumber);
            }
            Ok(())
        }
        Value::Array(items) => items.iter().try_for_each(reject_non_finite),
        Value::Object(fields) => fields.values().try_for_each(reject_non_finite),
        Value::Null | Value::Bool(_) | Value::String(_) => Ok(()),
    }
}

/// Sentinel digest used when no policy file is present on disk.
#[must_use]
pub fn no_policy_sentinel() -> String {
    hash_bytes(b"__NO_POLICY_FILE__")
}
