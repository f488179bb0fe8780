// crates/requiem-state/src/kernel.rs
// ============================================================================
// Module: State Machine Kernel
// Description: Generic validated transition engine shared by every
//              concrete state machine in this crate.
// Purpose: Enforce a caller-supplied transition table and keep a complete
//          transition history; refuse any move not explicitly declared.
// Dependencies: std::collections::{BTreeMap, BTreeSet}, thiserror
// ============================================================================

//! ## Overview
//! [`GenericStateMachine`] owns no domain knowledge; [`crate::execution`] and
//! [`crate::junction`] each supply their own transition table built from the
//! edges declared in their respective state diagrams. A move not present in
//! the table is always an [`KernelError::InvariantViolation`] — the kernel
//! never guesses at an implicit edge.

use std::collections::BTreeMap;
use std::collections::BTreeSet;
use std::fmt;

use thiserror::Error;

/// A single recorded transition for a generic state type `S`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transition<S> {
    /// State transitioned from.
    pub from: S,
    /// State transitioned to.
    pub to: S,
    /// Unix epoch milliseconds the transition was recorded at.
    pub timestamp: i64,
}

/// Errors raised by [`GenericStateMachine::transition_to`].
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum KernelError<S: fmt::Debug> {
    /// The requested move is not present in the transition table for the
    /// current state — an attempt to skip, regress, or invent an edge.
    #[error("illegal transition from {from:?} to {to:?}")]
    InvariantViolation {
        /// Current state at the time of the attempted move.
        from: S,
        /// State the caller attempted to move to.
        to: S,
    },
}

/// A generic, table-driven state machine with full transition history.
///
/// # Invariants
/// - A state with no entry (or an empty entry) in the transition table is
///   terminal: [`Self::is_terminal`] returns `true`.
/// - `history` records every accepted transition in order; no entry is ever
///   removed or reordered.
#[derive(Debug, Clone)]
pub struct GenericStateMachine<S> {
    transitions: BTreeMap<S, BTreeSet<S>>,
    current: S,
    history: Vec<Transition<S>>,
}

impl<S: Copy + Eq + Ord + fmt::Debug> GenericStateMachine<S> {
    /// Builds a new machine starting at `initial`, validated against
    /// `transitions`.
    #[must_use]
    pub fn new(transitions: BTreeMap<S, BTreeSet<S>>, initial: S) -> Self {
        Self { transitions, current: initial, history: Vec::new() }
    }

    /// Returns the current state.
    #[must_use]
    pub const fn current(&self) -> S {
        self.current
    }

    /// Returns the full, ordered transition history.
    #[must_use]
    pub fn history(&self) -> &[Transition<S>] {
        &self.history
    }

    /// Returns true when the current state has no declared outgoing edges.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        self.transitions.get(&self.current).is_none_or(BTreeSet::is_empty)
    }

    /// Attempts to move to `to`, recording the transition on success.
    ///
    /// # Errors
    ///
    /// Returns [`KernelError::InvariantViolation`] when `to` is not a
    /// declared successor of the current state.
    pub fn transition_to(&mut self, to: S, now_millis: i64) -> Result<(), KernelError<S>> {
        let allowed = self.transitions.get(&self.current).is_some_and(|set| set.contains(&to));
        if !allowed {
            return Err(KernelError::InvariantViolation { from: self.current, to });
        }
        self.history.push(Transition { from: self.current, to, timestamp: now_millis });
        self.current = to;
        Ok(())
    }
}
