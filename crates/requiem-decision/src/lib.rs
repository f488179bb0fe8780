// crates/requiem-decision/src/lib.rs
// ============================================================================
// Crate: requiem-decision
// Description: Pure, deterministic multi-criteria decision evaluator.
// Purpose: Own spec §4.8's nine ranking algorithms over an outcome matrix.
// Dependencies: serde, serde_json
// ============================================================================

//! ## Overview
//! This crate has no clock, no I/O, and no dependency on the rest of the
//! workspace: [`evaluate`] is a pure function of a [`DecisionRequest`] plus
//! two caller-supplied timestamps (so a host with its own
//! `requiem-core::time::Clock` stamps the trace without this crate needing
//! to know that type exists). Ten successive calls with the same arguments
//! produce byte-identical `serde_json` output — see `tests/determinism.rs`.

#![cfg_attr(
    test,
    allow(
        clippy::unwrap_used,
        clippy::expect_used,
        clippy::panic,
        reason = "test assertions favor directness over propagation"
    )
)]

pub mod algorithms;
pub mod output;
pub mod request;

pub use output::DecisionOutput;
pub use output::DecisionTrace;
pub use request::Algorithm;
pub use request::DecisionError;
pub use request::DecisionRequest;

use std::collections::BTreeMap;

/// Validates `request`, scores it under its selected algorithm, and returns
/// the ranked result.
///
/// `computed_at` and `processing_time_ms` are stamped into the trace
/// verbatim; this crate never reads a clock itself, so replay-equality
/// checks only depend on values the caller already controls.
///
/// # Errors
///
/// Returns the first [`DecisionError`] [`DecisionRequest::validate`] finds.
pub fn evaluate(
    request: &DecisionRequest,
    computed_at: i64,
    processing_time_ms: u64,
) -> Result<DecisionOutput, DecisionError> {
    let weights = request.validate()?;
    let scored = algorithms::score(request, &weights);
    let ranking_indices = algorithms::rank_indices(&scored);

    let ranking: Vec<String> =
        ranking_indices.iter().map(|&index| request.actions[index].clone()).collect();
    let recommended_action = ranking.first().cloned().unwrap_or_default();

    let scores: BTreeMap<String, f64> = request
        .actions
        .iter()
        .cloned()
        .zip(scored.scores.iter().copied())
        .collect();

    Ok(DecisionOutput {
        recommended_action,
        ranking,
        trace: DecisionTrace { algorithm: request.algorithm, computed_at, scores, processing_time_ms },
    })
}
