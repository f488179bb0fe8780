// crates/requiem-decision/src/output.rs
// ============================================================================
// Module: Decision Output
// Description: The result shape a decision evaluation returns.
// Purpose: Pair a ranking with an auditable trace, serialized the same way
//          every time for a given input (spec §4.8's determinism contract).
// Dependencies: serde, crate::request::Algorithm
// ============================================================================

use std::collections::BTreeMap;

use serde::Deserialize;
use serde::Serialize;

use crate::request::Algorithm;

/// Everything a decision evaluation returns.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecisionOutput {
    /// The first entry of `ranking`.
    pub recommended_action: String,
    /// Every action, best first, ties broken by input order.
    pub ranking: Vec<String>,
    /// Audit trail for this evaluation.
    pub trace: DecisionTrace,
}

/// Audit detail attached to a [`DecisionOutput`].
///
/// `scores` is a `BTreeMap` rather than a `Vec` so its serialized key order
/// is independent of action order, matching spec §4.8's byte-identical
/// replay requirement regardless of how a caller iterates the map.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecisionTrace {
    /// The algorithm that produced this trace.
    pub algorithm: Algorithm,
    /// Caller-supplied timestamp the evaluation ran at (Unix epoch ms).
    pub computed_at: i64,
    /// Action name -> raw score.
    pub scores: BTreeMap<String, f64>,
    /// Caller-supplied wall-clock duration of the evaluation, in ms.
    pub processing_time_ms: u64,
}
