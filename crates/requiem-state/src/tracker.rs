// crates/requiem-state/src/tracker.rs
// ============================================================================
// Module: Run Lifecycle Tracker
// Description: Enforces the 8-step monotonic pipeline plus the DIVERGENT
//              sink on top of requiem_core::lifecycle::Stage.
// Purpose: Give every run a single source of truth for "what stage am I
//          at" and a complete, append-only transition history.
// Dependencies: requiem_core::lifecycle
// ============================================================================

//! ## Overview
//! Unlike [`crate::execution`] and [`crate::junction`], the pipeline stages
//! are not table-driven: only the single next stage in
//! [`requiem_core::lifecycle::Stage::PIPELINE`] is legal, and
//! [`requiem_core::lifecycle::Stage::Divergent`] is reachable from any
//! non-terminal stage (spec §4.4: "attempts to skip or regress raise
//! `INVARIANT_VIOLATION`"). This mirrors [`crate::kernel::GenericStateMachine`]
//! closely enough to reuse its error type without reusing its table
//! representation, since "exactly one declared successor, plus one sink
//! reachable from anywhere" isn't expressible as a fixed edge set without
//! duplicating the sink edge into every row.

use requiem_core::lifecycle::Stage;
use requiem_core::lifecycle::Transition;

use crate::kernel::KernelError;

/// Tracks a single run's progress through the 8-step pipeline.
///
/// # Invariants
/// - `history` is append-only; `current` always equals `history.last().to`
///   or [`Stage::Init`] when history is empty.
#[derive(Debug, Clone)]
pub struct RunLifecycleTracker {
    current: Stage,
    history: Vec<Transition>,
}

impl Default for RunLifecycleTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl RunLifecycleTracker {
    /// Creates a tracker at [`Stage::Init`] with empty history.
    #[must_use]
    pub const fn new() -> Self {
        Self { current: Stage::Init, history: Vec::new() }
    }

    /// Returns the current stage.
    #[must_use]
    pub const fn current(&self) -> Stage {
        self.current
    }

    /// Returns the full, ordered transition history.
    #[must_use]
    pub fn history(&self) -> &[Transition] {
        &self.history
    }

    /// Attempts to move to `to`, recording the transition on success.
    ///
    /// # Errors
    ///
    /// Returns [`KernelError::InvariantViolation`] when `to` is neither the
    /// single declared pipeline successor of the current stage nor
    /// [`Stage::Divergent`] reached from a non-terminal stage.
    pub fn advance(&mut self, to: Stage, now_millis: i64) -> Result<(), KernelError<Stage>> {
        let legal = if matches!(to, Stage::Divergent) {
            !self.current.is_terminal()
        } else {
            self.current.next() == Some(to)
        };
        if !legal {
            return Err(KernelError::InvariantViolation { from: self.current, to });
        }
        self.history.push(Transition { from: self.current, to, timestamp: now_millis });
        self.current = to;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use requiem_core::lifecycle::Stage;

    use super::RunLifecycleTracker;

    #[test]
    fn advances_through_the_declared_pipeline_order() {
        let mut tracker = RunLifecycleTracker::new();
        tracker.advance(Stage::PolicyChecked, 1).expect("step 1");
        tracker.advance(Stage::Arbitrated, 2).expect("step 2");
        assert_eq!(tracker.current(), Stage::Arbitrated);
        assert_eq!(tracker.history().len(), 2);
    }

    #[test]
    fn skipping_a_stage_is_an_invariant_violation() {
        let mut tracker = RunLifecycleTracker::new();
        assert!(tracker.advance(Stage::Arbitrated, 1).is_err());
    }

    #[test]
    fn divergent_is_reachable_from_any_non_terminal_stage() {
        let mut tracker = RunLifecycleTracker::new();
        tracker.advance(Stage::PolicyChecked, 1).expect("step 1");
        tracker.advance(Stage::Divergent, 2).expect("divergence");
        assert!(tracker.current().is_terminal());
    }

    #[test]
    fn divergent_is_not_reachable_once_complete() {
        let mut tracker = RunLifecycleTracker::new();
        for stage in Stage::PIPELINE.into_iter().skip(1) {
            tracker.advance(stage, 0).expect("advance");
        }
        assert_eq!(tracker.current(), Stage::Complete);
        assert!(tracker.advance(Stage::Divergent, 0).is_err());
    }
}
