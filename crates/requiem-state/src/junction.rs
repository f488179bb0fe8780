// crates/requiem-state/src/junction.rs
// ============================================================================
// Module: Junction State Machine
// Description: Concrete instantiation of the kernel for decision junctions.
// Purpose: Encode the Junction state diagram from spec §4.4 as a
//          transition table for GenericStateMachine.
// Dependencies: crate::kernel, serde
// ============================================================================

//! ## Overview
//! `detected → {validating, expired}`; `validating → {awaiting_decision,
//! blocked, expired}`; `awaiting_decision → {executing, expired, blocked}`;
//! `executing → {resolved, failed}`. `resolved`/`expired` are terminal;
//! `blocked` and `failed` declare no outgoing edge in the diagram, so they
//! are terminal here as well.

use std::collections::BTreeMap;
use std::collections::BTreeSet;

use serde::Deserialize;
use serde::Serialize;

use crate::kernel::GenericStateMachine;

/// States of a decision junction awaiting arbitration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JunctionState {
    /// A junction point has been detected.
    Detected,
    /// Under structural validation.
    Validating,
    /// Waiting on a decision from the evaluator.
    AwaitingDecision,
    /// Blocked pending an external condition.
    Blocked,
    /// Selected action is executing.
    Executing,
    /// Resolved successfully; terminal.
    Resolved,
    /// Expired before resolution; terminal.
    Expired,
    /// Execution failed.
    Failed,
}

/// Builds the transition table for [`JunctionState`].
#[must_use]
pub fn transition_table() -> BTreeMap<JunctionState, BTreeSet<JunctionState>> {
    use JunctionState::{
        AwaitingDecision, Blocked, Detected, Executing, Expired, Failed, Resolved, Validating,
    };
    BTreeMap::from([
        (Detected, BTreeSet::from([Validating, Expired])),
        (Validating, BTreeSet::from([AwaitingDecision, Blocked, Expired])),
        (AwaitingDecision, BTreeSet::from([Executing, Expired, Blocked])),
        (Executing, BTreeSet::from([Resolved, Failed])),
        (Resolved, BTreeSet::new()),
        (Expired, BTreeSet::new()),
        (Blocked, BTreeSet::new()),
        (Failed, BTreeSet::new()),
    ])
}

/// Constructs a junction state machine starting at [`JunctionState::Detected`].
#[must_use]
pub fn new_junction_machine() -> GenericStateMachine<JunctionState> {
    GenericStateMachine::new(transition_table(), JunctionState::Detected)
}
