// crates/requiem-ledger/src/cas.rs
// ============================================================================
// Module: Content-Addressed Envelope Store
// Description: In-memory store for replay envelopes, plus the replay check
//              that feeds the Divergence Sentinel.
// Purpose: Back spec §3's `ReplayEnvelope` invariant: re-executing a
//          deterministic tool against the same input and policy snapshot
//          must reproduce its stored output digest.
// Dependencies: parking_lot, requiem_core::envelope, crate::sentinel
// ============================================================================

//! ## Overview
//! [`InMemoryCas`] holds the most recent [`ReplayEnvelope`] recorded per
//! run. [`check_replay`] is the seam that closes spec §3's invariant: given
//! a freshly recomputed output digest for a run already in the store, it
//! either confirms the match silently or hands a [`DivergenceEvent`] to the
//! sentinel. A run with no stored envelope, or one whose tool was not
//! marked deterministic, is never treated as a replay mismatch.

use std::collections::BTreeMap;

use parking_lot::Mutex;
use requiem_core::divergence::detect_replay_divergence;
use requiem_core::envelope::ReplayEnvelope;
use requiem_core::identifiers::RunId;
use requiem_core::time::Clock;
use requiem_registry::gate::ReplayStore;

use crate::sentinel::DivergenceSentinel;

/// Content-addressed storage seam for replay envelopes.
pub trait ContentAddressedStore: Send + Sync {
    /// Stores `envelope`, replacing any prior envelope for the same run.
    fn put(&self, envelope: ReplayEnvelope);
    /// Returns the stored envelope for `run_id`, if any.
    fn get(&self, run_id: &RunId) -> Option<ReplayEnvelope>;
}

/// In-memory [`ContentAddressedStore`]; the durable backing store behind
/// this shape is an external collaborator.
#[derive(Default)]
pub struct InMemoryCas {
    envelopes: Mutex<BTreeMap<RunId, ReplayEnvelope>>,
}

impl InMemoryCas {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl ContentAddressedStore for InMemoryCas {
    fn put(&self, envelope: ReplayEnvelope) {
        self.envelopes.lock().insert(envelope.run_id.clone(), envelope);
    }

    fn get(&self, run_id: &RunId) -> Option<ReplayEnvelope> {
        self.envelopes.lock().get(run_id).cloned()
    }
}

impl ReplayStore for InMemoryCas {
    fn put(&self, envelope: ReplayEnvelope) {
        ContentAddressedStore::put(self, envelope);
    }

    fn get(&self, run_id: &RunId) -> Option<ReplayEnvelope> {
        ContentAddressedStore::get(self, run_id)
    }
}

/// Compares `recomputed_output_digest` against the envelope stored for
/// `run_id`, firing the sentinel on a mismatch. Only the output digest is
/// re-derived by this narrower check; callers that also recompute the input
/// fingerprint and policy snapshot hash (a full replay) should call
/// [`requiem_core::divergence::detect_replay_divergence`] directly so a
/// policy-snapshot change reports `policy_drift` rather than
/// `replay_mismatch`.
///
/// Returns `true` when no divergence was detected (no stored envelope, a
/// non-deterministic tool, or a matching digest); `false` when the sentinel
/// fired.
pub fn check_replay(
    cas: &dyn ContentAddressedStore,
    sentinel: &DivergenceSentinel,
    clock: &dyn Clock,
    run_id: &RunId,
    step: u32,
    recomputed_output_digest: &str,
) -> bool {
    let Some(stored) = cas.get(run_id) else {
        return true;
    };
    let now = clock.now_millis();
    let event = detect_replay_divergence(
        &stored,
        format!("div-{run_id}-{step}"),
        now,
        Some(step as usize),
        &stored.input_fingerprint,
        &stored.policy_snapshot_hash,
        recomputed_output_digest,
    );
    let Some(event) = event else {
        return true;
    };
    sentinel.record(event);
    false
}

#[cfg(test)]
mod tests {
    use requiem_core::envelope::ReplayEnvelope;
    use requiem_core::identifiers::RequestId;
    use requiem_core::identifiers::RunId;
    use requiem_core::identifiers::TenantId;
    use requiem_core::time::FrozenClock;

    use super::ContentAddressedStore;
    use super::InMemoryCas;
    use super::check_replay;
    use crate::sentinel::DivergenceSentinel;

    fn envelope(run_id: &str, output_digest: &str, deterministic: bool) -> ReplayEnvelope {
        ReplayEnvelope::build(
            RunId::new(run_id),
            TenantId::new("t1"),
            "echo".to_string(),
            "1.0.0".to_string(),
            "input-fp".to_string(),
            output_digest.to_string(),
            "policy-hash".to_string(),
            false,
            deterministic,
            10,
            "1970-01-01T00:00:00Z".to_string(),
            RequestId::new("req-1"),
        )
        .expect("build envelope")
    }

    #[test]
    fn absent_envelope_is_never_a_divergence() {
        let cas = InMemoryCas::new();
        let sentinel = DivergenceSentinel::with_noop_observer();
        let clock = FrozenClock::new(0);
        let run_id = RunId::new("r1");
        assert!(check_replay(&cas, &sentinel, &clock, &run_id, 0, "anything"));
        assert!(!sentinel.has(&run_id));
    }

    #[test]
    fn matching_digest_does_not_diverge() {
        let cas = InMemoryCas::new();
        cas.put(envelope("r1", "digest-a", true));
        let sentinel = DivergenceSentinel::with_noop_observer();
        let clock = FrozenClock::new(0);
        let run_id = RunId::new("r1");
        assert!(check_replay(&cas, &sentinel, &clock, &run_id, 0, "digest-a"));
        assert!(!sentinel.has(&run_id));
    }

    #[test]
    fn mismatched_digest_on_a_deterministic_tool_fires_the_sentinel() {
        let cas = InMemoryCas::new();
        cas.put(envelope("r1", "digest-a", true));
        let sentinel = DivergenceSentinel::with_noop_observer();
        let clock = FrozenClock::new(0);
        let run_id = RunId::new("r1");
        assert!(!check_replay(&cas, &sentinel, &clock, &run_id, 3, "digest-b"));
        assert!(sentinel.has(&run_id));
        assert_eq!(sentinel.status(&run_id).events[0].step_number, Some(3));
    }

    #[test]
    fn non_deterministic_tools_never_diverge() {
        let cas = InMemoryCas::new();
        cas.put(envelope("r1", "digest-a", false));
        let sentinel = DivergenceSentinel::with_noop_observer();
        let clock = FrozenClock::new(0);
        let run_id = RunId::new("r1");
        assert!(check_replay(&cas, &sentinel, &clock, &run_id, 0, "digest-b"));
        assert!(!sentinel.has(&run_id));
    }
}
