// crates/requiem-state/src/execution.rs
// ============================================================================
// Module: Execution State Machine
// Description: Concrete instantiation of the kernel for tool/skill runs.
// Purpose: Encode the Execution state diagram from spec §4.4 as a
//          transition table for GenericStateMachine.
// Dependencies: crate::kernel, serde
// ============================================================================

//! ## Overview
//! `pending → {queued, cancelled}`; `queued → {running, cancelled}`;
//! `running → {succeeded, failed, timeout, paused, cancelled}`;
//! `failed`/`timeout → queued` (retry). `succeeded`/`cancelled` are
//! terminal. `paused` declares no outgoing edge here: the state diagram
//! names it as a reachable state from `running` but specifies no resume
//! edge, so a transition out of `paused` is an invariant violation until a
//! future revision of the diagram adds one.

use std::collections::BTreeMap;
use std::collections::BTreeSet;

use serde::Deserialize;
use serde::Serialize;

use crate::kernel::GenericStateMachine;

/// States of a single tool or skill execution run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionState {
    /// Accepted, not yet queued for work.
    Pending,
    /// Queued for execution.
    Queued,
    /// Actively executing.
    Running,
    /// Completed successfully; terminal.
    Succeeded,
    /// Failed; may retry back to `Queued`.
    Failed,
    /// Timed out; may retry back to `Queued`.
    Timeout,
    /// Paused mid-execution.
    Paused,
    /// Cancelled; terminal.
    Cancelled,
}

/// Builds the transition table for [`ExecutionState`].
#[must_use]
pub fn transition_table() -> BTreeMap<ExecutionState, BTreeSet<ExecutionState>> {
    use ExecutionState::{Cancelled, Failed, Paused, Pending, Queued, Running, Succeeded, Timeout};
    BTreeMap::from([
        (Pending, BTreeSet::from([Queued, Cancelled])),
        (Queued, BTreeSet::from([Running, Cancelled])),
        (Running, BTreeSet::from([Succeeded, Failed, Timeout, Paused, Cancelled])),
        (Failed, BTreeSet::from([Queued])),
        (Timeout, BTreeSet::from([Queued])),
        (Succeeded, BTreeSet::new()),
        (Cancelled, BTreeSet::new()),
        (Paused, BTreeSet::new()),
    ])
}

/// Constructs an execution state machine starting at [`ExecutionState::Pending`].
#[must_use]
pub fn new_execution_machine() -> GenericStateMachine<ExecutionState> {
    GenericStateMachine::new(transition_table(), ExecutionState::Pending)
}
