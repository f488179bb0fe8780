// crates/requiem-core/src/lifecycle.rs
// ============================================================================
// Module: Run Lifecycle Shape
// Description: The 8-state monotonic pipeline plus the DIVERGENT sink.
// Purpose: Define the stage enum and transition record shared by the state
//          machine kernel and every consumer that reports run status.
// Dependencies: serde
// ============================================================================

//! ## Overview
//! This module defines the *shape* of the run lifecycle (spec §3
//! `RunLifecycle`): eight strictly ordered stages plus a `Divergent`
//! terminal sink reachable from any non-terminal stage. The transition
//! *validation* (which moves are legal) lives in `requiem-state::kernel`,
//! which this crate does not depend on — the generic kernel depends on
//! this crate instead, not the other way around, so `requiem-core` stays a
//! leaf with no sibling dependencies.

use serde::Deserialize;
use serde::Serialize;

/// The eight ordered pipeline stages, plus the `Divergent` terminal sink.
///
/// # Invariants
/// - Non-divergent variants are totally ordered by their declaration order;
///   [`Stage::ordinal`] reflects that order.
/// - `Divergent` is reachable from any non-terminal stage but has no
///   successor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    /// Run created, nothing evaluated yet.
    Init,
    /// Active policy snapshot captured and checked.
    PolicyChecked,
    /// Handler/arbitrator selected and invoked.
    Arbitrated,
    /// Tool or skill execution completed.
    Executed,
    /// Replay manifest assembled.
    ManifestBuilt,
    /// Manifest signing recorded (status only; core does not sign).
    Signed,
    /// Ledger entry and economic event committed.
    LedgerCommitted,
    /// Terminal success state.
    Complete,
    /// Terminal divergence sink, reachable from any non-terminal stage.
    Divergent,
}

impl Stage {
    /// The ordered, non-terminal-divergent pipeline, for iteration.
    pub const PIPELINE: [Self; 8] = [
        Self::Init,
        Self::PolicyChecked,
        Self::Arbitrated,
        Self::Executed,
        Self::ManifestBuilt,
        Self::Signed,
        Self::LedgerCommitted,
        Self::Complete,
    ];

    /// Returns this stage's position in [`Self::PIPELINE`], or `None` for
    /// [`Stage::Divergent`].
    #[must_use]
    pub fn ordinal(self) -> Option<usize> {
        Self::PIPELINE.iter().position(|stage| *stage == self)
    }

    /// Returns true when this stage has no legal successor.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Complete | Self::Divergent)
    }

    /// Returns the single legal non-divergent successor, if any.
    #[must_use]
    pub fn next(self) -> Option<Self> {
        let ordinal = self.ordinal()?;
        Self::PIPELINE.get(ordinal + 1).copied()
    }
}

/// A single recorded transition in a run's history.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Transition {
    /// Stage transitioned from.
    pub from: Stage,
    /// Stage transitioned to.
    pub to: Stage,
    /// Unix epoch milliseconds the transition was recorded at.
    pub timestamp: i64,
}
