// crates/requiem-core/src/divergence.rs
// ============================================================================
// Module: Divergence Event
// Description: The record shape raised whenever a replay does not match.
// Purpose: Give the divergence sentinel in requiem-ledger a fixed, unsuppressible
//          event shape to log and persist.
// Dependencies: serde, crate::identifiers
// ============================================================================

//! ## Overview
//! A [`DivergenceEvent`] is never an `Option` the sentinel can skip over;
//! every detected mismatch produces one (spec §4.10: "the sentinel has no
//! configuration flag that disables it"). This module defines the event
//! shape only — the always-on logging behavior lives in
//! `requiem-ledger::sentinel`.

use serde::Deserialize;
use serde::Serialize;

use crate::envelope::ReplayEnvelope;
use crate::error::Severity;
use crate::identifiers::RunId;

/// What kind of mismatch was detected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DivergenceType {
    /// The recomputed input fingerprint did not match the recorded one.
    FingerprintMismatch,
    /// A replayed, recomputed output digest did not match the recorded one.
    ReplayMismatch,
    /// The active policy snapshot hash changed between original and replay.
    PolicyDrift,
    /// A tool declared deterministic produced output that drifted from the
    /// recorded run without a corresponding input or policy change.
    OutputDrift,
}

impl DivergenceType {
    /// Returns the spec's snake_case wire name for this variant.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::FingerprintMismatch => "fingerprint_mismatch",
            Self::ReplayMismatch => "replay_mismatch",
            Self::PolicyDrift => "policy_drift",
            Self::OutputDrift => "output_drift",
        }
    }
}

/// One detected replay divergence.
///
/// # Invariants
/// - `acknowledged` starts `false` and is only ever flipped by an explicit
///   operator action outside this crate; nothing in the gate or runner
///   paths may set it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DivergenceEvent {
    /// Event identifier, typically a digest of its own contents.
    pub id: String,
    /// Run the divergence was detected against.
    pub run_id: RunId,
    /// Unix epoch milliseconds the divergence was detected.
    pub detected_at: i64,
    /// Kind of mismatch.
    pub divergence_type: DivergenceType,
    /// Fingerprint that was expected.
    pub expected_fingerprint: String,
    /// Fingerprint that was actually observed.
    pub actual_fingerprint: String,
    /// Skill step index the divergence occurred at, if inside a skill run.
    pub step_number: Option<usize>,
    /// Severity assigned to this divergence.
    pub severity: Severity,
    /// Whether an operator has acknowledged this event; always starts
    /// `false`.
    pub acknowledged: bool,
}

impl DivergenceEvent {
    /// Builds a new, unacknowledged divergence event.
    #[must_use]
    #[allow(clippy::too_many_arguments, reason = "mirrors the flat wire shape in spec §3")]
    pub const fn new(
        id: String,
        run_id: RunId,
        detected_at: i64,
        divergence_type: DivergenceType,
        expected_fingerprint: String,
        actual_fingerprint: String,
        step_number: Option<usize>,
        severity: Severity,
    ) -> Self {
        Self {
            id,
            run_id,
            detected_at,
            divergence_type,
            expected_fingerprint,
            actual_fingerprint,
            step_number,
            severity,
            acknowledged: false,
        }
    }
}

/// Compares a replay's recomputed fingerprints against `stored`, returning
/// the first divergence found, checked in priority order: input fingerprint,
/// then policy snapshot hash, then output digest. Returns `None` for a
/// non-deterministic tool or when every recomputed value matches.
///
/// Priority order matters: Scenario S4 (a stored envelope replayed after the
/// policy file changed) must report `policy_drift`, not `replay_mismatch`,
/// even though the output digest may also differ as a consequence.
#[must_use]
#[allow(clippy::too_many_arguments, reason = "mirrors the flat wire shape in spec §3")]
pub fn detect_replay_divergence(
    stored: &ReplayEnvelope,
    event_id: String,
    now: i64,
    step_number: Option<usize>,
    recomputed_input_fingerprint: &str,
    recomputed_policy_snapshot_hash: &str,
    recomputed_output_digest: &str,
) -> Option<DivergenceEvent> {
    if !stored.deterministic {
        return None;
    }
    if stored.input_fingerprint != recomputed_input_fingerprint {
        return Some(DivergenceEvent::new(
            event_id,
            stored.run_id.clone(),
            now,
            DivergenceType::FingerprintMismatch,
            stored.input_fingerprint.clone(),
            recomputed_input_fingerprint.to_string(),
            step_number,
            Severity::Critical,
        ));
    }
    if stored.policy_snapshot_hash != recomputed_policy_snapshot_hash {
        return Some(DivergenceEvent::new(
            event_id,
            stored.run_id.clone(),
            now,
            DivergenceType::PolicyDrift,
            stored.policy_snapshot_hash.clone(),
            recomputed_policy_snapshot_hash.to_string(),
            step_number,
            Severity::Critical,
        ));
    }
    if stored.output_digest != recomputed_output_digest {
        return Some(DivergenceEvent::new(
            event_id,
            stored.run_id.clone(),
            now,
            DivergenceType::ReplayMismatch,
            stored.output_digest.clone(),
            recomputed_output_digest.to_string(),
            step_number,
            Severity::Critical,
        ));
    }
    None
}

#[cfg(test)]
mod tests {
    use super::DivergenceEvent;
    use super::DivergenceType;
    use super::detect_replay_divergence;
    use crate::envelope::ReplayEnvelope;
    use crate::error::Severity;
    use crate::identifiers::RequestId;
    use crate::identifiers::RunId;
    use crate::identifiers::TenantId;

    #[test]
    fn new_events_start_unacknowledged() {
        let event = DivergenceEvent::new(
            "evt-1".to_string(),
            RunId::new("run-1"),
            0,
            DivergenceType::ReplayMismatch,
            "expected".to_string(),
            "actual".to_string(),
            None,
            Severity::Critical,
        );
        assert!(!event.acknowledged);
    }

    fn stored_envelope() -> ReplayEnvelope {
        ReplayEnvelope::build(
            RunId::new("run-1"),
            TenantId::new("t1"),
            "echo".to_string(),
            "1.0.0".to_string(),
            "input-fp".to_string(),
            "output-digest".to_string(),
            "policy-hash".to_string(),
            false,
            true,
            10,
            "1970-01-01T00:00:00Z".to_string(),
            RequestId::new("req-1"),
        )
        .expect("build envelope")
    }

    #[test]
    fn matching_replay_diverges_on_nothing() {
        let stored = stored_envelope();
        let event = detect_replay_divergence(
            &stored,
            "evt-1".to_string(),
            0,
            None,
            "input-fp",
            "policy-hash",
            "output-digest",
        );
        assert!(event.is_none());
    }

    #[test]
    fn policy_drift_takes_priority_over_output_drift() {
        let stored = stored_envelope();
        let event = detect_replay_divergence(
            &stored,
            "evt-1".to_string(),
            0,
            Some(2),
            "input-fp",
            "new-policy-hash",
            "a-different-output-digest",
        )
        .expect("divergence expected");
        assert_eq!(event.divergence_type, DivergenceType::PolicyDrift);
        assert_eq!(event.severity, Severity::Critical);
        assert!(!event.acknowledged);
    }

    #[test]
    fn fingerprint_mismatch_takes_priority_over_policy_and_output() {
        let stored = stored_envelope();
        let event = detect_replay_divergence(
            &stored,
            "evt-1".to_string(),
            0,
            None,
            "a-different-input-fp",
            "new-policy-hash",
            "a-different-output-digest",
        )
        .expect("divergence expected");
        assert_eq!(event.divergence_type, DivergenceType::FingerprintMismatch);
    }

    #[test]
    fn output_only_mismatch_reports_replay_mismatch() {
        let stored = stored_envelope();
        let event = detect_replay_divergence(
            &stored,
            "evt-1".to_string(),
            0,
            None,
            "input-fp",
            "policy-hash",
            "a-different-output-digest",
        )
        .expect("divergence expected");
        assert_eq!(event.divergence_type, DivergenceType::ReplayMismatch);
    }

    #[test]
    fn non_deterministic_tools_never_diverge() {
        let mut stored = stored_envelope();
        stored.deterministic = false;
        let event = detect_replay_divergence(
            &stored,
            "evt-1".to_string(),
            0,
            None,
            "anything",
            "anything",
            "anything",
        );
        assert!(event.is_none());
    }
}
