// crates/requiem-core/src/envelope.rs
// ============================================================================
// Module: Replay Envelope
// Description: The persisted, self-digesting record of a single invocation.
// Purpose: Give every tool call a content-addressed, independently
//          verifiable fingerprint for later replay.
// Dependencies: crate::hashing, crate::identifiers, serde
// ============================================================================

//! ## Overview
//! A [`ReplayEnvelope`] is built after every successful tool call (spec
//! §4.5 step 11). Its `hash` field is the digest of every other field,
//! computed with [`ReplayEnvelope::compute_hash`] and checked by
//! [`ReplayEnvelope::verify_self_hash`]; the wire form sorts keys
//! lexicographically per spec §6, which `canonical_bytes` already does.

use serde::Deserialize;
use serde::Serialize;

use crate::hashing::HashError;
use crate::hashing::canonical_bytes;
use crate::hashing::hash_bytes;
use crate::identifiers::RequestId;
use crate::identifiers::RunId;
use crate::identifiers::TenantId;

/// Fields of a [`ReplayEnvelope`] excluding its own self-digest, used as the
/// hashing subject so the envelope can digest "itself without `hash`".
#[derive(Debug, Clone, Serialize, Deserialize)]
struct EnvelopeBody {
    run_id: RunId,
    tenant_id: TenantId,
    tool_name: String,
    tool_version: String,
    input_fingerprint: String,
    output_digest: String,
    policy_snapshot_hash: String,
    from_cache: bool,
    deterministic: bool,
    duration_ms: u64,
    created_at: String,
    request_id: RequestId,
}

/// The persisted, self-digesting record of one tool invocation.
///
/// # Invariants
/// - `hash` equals `BLAKE3(canonical(self without hash))`.
/// - Re-executing the tool named by `tool_name@tool_version` against
///   `input_fingerprint` under the same `policy_snapshot_hash` must
///   reproduce `output_digest` whenever `deterministic` is `true`; a
///   mismatch is a replay divergence (spec §3 `ReplayEnvelope` invariant).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReplayEnvelope {
    /// Run identifier.
    pub run_id: RunId,
    /// Tenant identifier.
    pub tenant_id: TenantId,
    /// Invoked tool name.
    pub tool_name: String,
    /// Invoked tool version, formatted `MAJOR.MINOR.PATCH`.
    pub tool_version: String,
    /// `BLAKE3(canonical(input))`.
    pub input_fingerprint: String,
    /// `BLAKE3(canonical(output))`.
    pub output_digest: String,
    /// `BLAKE3(active policy bytes)`, or the no-policy sentinel.
    pub policy_snapshot_hash: String,
    /// Whether the result was served from cache.
    pub from_cache: bool,
    /// Copied from the tool definition's `deterministic` flag.
    pub deterministic: bool,
    /// Wall-clock duration of the invocation, in milliseconds.
    pub duration_ms: u64,
    /// RFC 3339 creation timestamp.
    pub created_at: String,
    /// Request identifier stamped by the invocation gate.
    pub request_id: RequestId,
    /// Self-digest over every other field.
    pub hash: String,
}

impl ReplayEnvelope {
    /// Builds an envelope, computing its self-digest.
    ///
    /// # Errors
    ///
    /// Returns a [`HashError`] if any field fails canonicalization (only
    /// possible for non-finite numbers, which none of these fields are).
    #[allow(clippy::too_many_arguments, reason = "mirrors the flat wire shape in spec §6")]
    pub fn build(
        run_id: RunId,
        tenant_id: TenantId,
        tool_name: String,
        tool_version: String,
        input_fingerprint: String,
        output_digest: String,
        policy_snapshot_hash: String,
        from_cache: bool,
        deterministic: bool,
        duration_ms: u64,
        created_at: String,
        request_id: RequestId,
    ) -> Result<Self, HashError> {
        let body = EnvelopeBody {
            run_id: run_id.clone(),
            tenant_id: tenant_id.clone(),
            tool_name: tool_name.clone(),
            tool_version: tool_version.clone(),
            input_fingerprint: input_fingerprint.clone(),
            output_digest: output_digest.clone(),
            policy_snapshot_hash: policy_snapshot_hash.clone(),
            from_cache,
            deterministic,
            duration_ms,
            created_at: created_at.clone(),
            request_id: request_id.clone(),
        };
        let hash = hash_bytes(&canonical_bytes(&body)?);
        Ok(Self {
            run_id,
            tenant_id,
            tool_name,
            tool_version,
            input_fingerprint,
            output_digest,
            policy_snapshot_hash,
            from_cache,
            deterministic,
            duration_ms,
            created_at,
            request_id,
            hash,
        })
    }

    /// Recomputes the self-digest and compares it to [`Self::hash`].
    ///
    /// # Errors
    ///
    /// Returns a [`HashError`] if recomputation fails to canonicalize.
    pub fn verify_self_hash(&self) -> Result<bool, HashError> {
        let body = EnvelopeBody {
            run_id: self.run_id.clone(),
            tenant_id: self.tenant_id.clone(),
            tool_name: self.tool_name.clone(),
            tool_version: self.tool_version.clone(),
            input_fingerprint: self.input_fingerprint.clone(),
            output_digest: self.output_digest.clone(),
            policy_snapshot_hash: self.policy_snapshot_hash.clone(),
            from_cache: self.from_cache,
            deterministic: self.deterministic,
            duration_ms: self.duration_ms,
            created_at: self.created_at.clone(),
            request_id: self.request_id.clone(),
        };
        Ok(hash_bytes(&canonical_bytes(&body)?) == self.hash)
    }
}

#[cfg(test)]
mod tests {
    use super::ReplayEnvelope;
    use crate::identifiers::RequestId;
    use crate::identifiers::RunId;
    use crate::identifiers::TenantId;

    fn sample() -> ReplayEnvelope {
        ReplayEnvelope::build(
            RunId::new("run-1"),
            TenantId::new("t1"),
            "echo".to_string(),
            "1.0.0".to_string(),
            "fp".to_string(),
            "digest".to_string(),
            "policy".to_string(),
            false,
            true,
            5,
            "2026-01-01T00:00:00Z".to_string(),
            RequestId::new("req-1"),
        )
        .expect("build envelope")
    }

    #[test]
    fn self_hash_verifies() {
        let envelope = sample();
        assert!(envelope.verify_self_hash().expect("verify"));
    }

    #[test]
    fn tampering_breaks_self_hash() {
        let mut envelope = sample();
        envelope.output_digest = "tampered".to_string();
        assert!(!envelope.verify_self_hash().expect("verify"));
    }
}
