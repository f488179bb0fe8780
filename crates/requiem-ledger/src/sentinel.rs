// crates/requiem-ledger/src/sentinel.rs
// ============================================================================
// Module: Divergence Sentinel
// Description: Records replay-divergence events; cannot be silenced.
// Purpose: Implement spec §4.10's three operations exactly, including the
//          unconditional console warning on every recorded event.
// Dependencies: parking_lot, requiem_core::error
// ============================================================================

//! ## Overview
//! [`DivergenceSentinel::record`] is the only way an event enters the
//! sentinel, and it always does two things no caller can opt out of: it
//! forwards the event to a [`SentinelObserver`] (structured, for whatever
//! the host wires up) and it writes an unconditional line to stderr with the
//! first 16 characters of the expected and actual digests and the step
//! number. There is no flag anywhere in this module that disables either
//! side effect, and no method that acknowledges or clears a recorded event
//! from within this crate — acknowledgment is operator tooling's job, not
//! the core's.

use std::collections::BTreeMap;

use parking_lot::Mutex;
use requiem_core::divergence::DivergenceEvent;
use requiem_core::error::Severity;
use requiem_core::hashing::hash_short;
use requiem_core::identifiers::RunId;
use requiem_registry::gate::DivergenceRecorder;

/// Current divergence status of one run.
#[derive(Debug, Clone)]
pub struct DivergenceStatus {
    /// Whether any event has been recorded for this run.
    pub is_divergent: bool,
    /// Highest severity recorded for this run, if any.
    pub severity: Option<Severity>,
    /// Every event recorded for this run, in recording order.
    pub events: Vec<DivergenceEvent>,
}

/// Structured sink a host wires the sentinel to. Does not gate the
/// unconditional stderr warning; that always fires regardless of what (if
/// anything) is plugged in here.
pub trait SentinelObserver: Send + Sync {
    /// Called once per recorded event, after the stderr warning has been
    /// written.
    fn record_divergence(&self, event: &DivergenceEvent);
}

/// An observer that does nothing; the default when a host has no
/// structured sink of its own.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopSentinelObserver;

impl SentinelObserver for NoopSentinelObserver {
    fn record_divergence(&self, _event: &DivergenceEvent) {}
}

/// Tracks replay-divergence events per run. Cannot be configured to drop an
/// event or suppress its stderr warning.
pub struct DivergenceSentinel {
    runs: Mutex<BTreeMap<RunId, Vec<DivergenceEvent>>>,
    observer: Box<dyn SentinelObserver>,
}

impl DivergenceSentinel {
    /// Builds a sentinel reporting to `observer` in addition to its
    /// unconditional stderr warning.
    #[must_use]
    pub fn new(observer: Box<dyn SentinelObserver>) -> Self {
        Self { runs: Mutex::new(BTreeMap::new()), observer }
    }

    /// Builds a sentinel with no structured observer; the stderr warning
    /// still fires on every recorded event.
    #[must_use]
    pub fn with_noop_observer() -> Self {
        Self::new(Box::new(NoopSentinelObserver))
    }

    /// Records a divergence event: writes the unconditional stderr warning,
    /// appends the event to the run's history, and forwards it to the
    /// configured observer. There is no way to call this and have it do
    /// nothing.
    pub fn record(&self, event: DivergenceEvent) {
        let step = event.step_number.map_or_else(|| "-".to_string(), |step| step.to_string());
        #[allow(
            clippy::print_stderr,
            reason = "spec §4.10 requires an unconditional warning that cannot be silenced"
        )]
        {
            eprintln!(
                "[requiem] replay divergence run={} type={} step={} expected={} actual={}",
                event.run_id,
                event.divergence_type.as_str(),
                step,
                hash_short(&event.expected_fingerprint),
                hash_short(&event.actual_fingerprint),
            );
        }
        self.runs.lock().entry(event.run_id.clone()).or_default().push(event.clone());
        self.observer.record_divergence(&event);
    }

    /// Returns whether any event has been recorded for `run_id`.
    #[must_use]
    pub fn has(&self, run_id: &RunId) -> bool {
        self.runs.lock().get(run_id).is_some_and(|events| !events.is_empty())
    }

    /// Returns the current divergence status of `run_id`.
    #[must_use]
    pub fn status(&self, run_id: &RunId) -> DivergenceStatus {
        let runs = self.runs.lock();
        let Some(events) = runs.get(run_id) else {
            return DivergenceStatus { is_divergent: false, severity: None, events: Vec::new() };
        };
        let severity = events.iter().map(|event| event.severity).max();
        DivergenceStatus { is_divergent: !events.is_empty(), severity, events: events.clone() }
    }
}

impl DivergenceRecorder for DivergenceSentinel {
    fn record(&self, event: DivergenceEvent) {
        Self::record(self, event);
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::Mutex as StdMutex;

    use requiem_core::divergence::DivergenceType;
    use requiem_core::error::Severity;
    use requiem_core::identifiers::RunId;

    use super::DivergenceEvent;
    use super::DivergenceSentinel;
    use super::SentinelObserver;

    #[derive(Default)]
    struct RecordingObserver {
        seen: StdMutex<Vec<RunId>>,
    }

    impl SentinelObserver for RecordingObserver {
        fn record_divergence(&self, event: &DivergenceEvent) {
            self.seen.lock().expect("lock").push(event.run_id.clone());
        }
    }

    fn event(run_id: &str, step: u32, severity: Severity) -> DivergenceEvent {
        DivergenceEvent::new(
            format!("evt-{run_id}-{step}"),
            RunId::new(run_id),
            0,
            DivergenceType::ReplayMismatch,
            "a".repeat(64),
            "b".repeat(64),
            Some(step as usize),
            severity,
        )
    }

    #[test]
    fn unrecorded_run_is_not_divergent() {
        let sentinel = DivergenceSentinel::with_noop_observer();
        let run_id = RunId::new("r1");
        assert!(!sentinel.has(&run_id));
        let status = sentinel.status(&run_id);
        assert!(!status.is_divergent);
        assert!(status.events.is_empty());
    }

    #[test]
    fn recording_marks_the_run_divergent_and_forwards_to_observer() {
        let observer = Arc::new(RecordingObserver::default());
        let sentinel = DivergenceSentinel::new(Box::new(
            ForwardingObserver { inner: observer.clone() },
        ));
        let run_id = RunId::new("r1");
        sentinel.record(event("r1", 2, Severity::Error));

        assert!(sentinel.has(&run_id));
        let status = sentinel.status(&run_id);
        assert!(status.is_divergent);
        assert_eq!(status.severity, Some(Severity::Error));
        assert_eq!(status.events.len(), 1);
        assert_eq!(observer.seen.lock().expect("lock").len(), 1);
    }

    #[test]
    fn status_severity_is_the_highest_recorded() {
        let sentinel = DivergenceSentinel::with_noop_observer();
        sentinel.record(event("r1", 1, Severity::Warning));
        sentinel.record(event("r1", 2, Severity::Critical));
        let status = sentinel.status(&RunId::new("r1"));
        assert_eq!(status.severity, Some(Severity::Critical));
        assert_eq!(status.events.len(), 2);
    }

    #[test]
    fn runs_are_tracked_independently() {
        let sentinel = DivergenceSentinel::with_noop_observer();
        sentinel.record(event("r1", 1, Severity::Error));
        assert!(sentinel.has(&RunId::new("r1")));
        assert!(!sentinel.has(&RunId::new("r2")));
    }

    struct ForwardingObserver {
        inner: Arc<RecordingObserver>,
    }

    impl SentinelObserver for ForwardingObserver {
        fn record_divergence(&self, event: &DivergenceEvent) {
            self.inner.record_divergence(event);
        }
    }
}
