// crates/requiem-core/src/lib.rs
// ============================================================================
// Crate: requiem-core
// Description: Leaf data model shared by every other workspace crate.
// Purpose: Identifiers, hashing, clocks, error envelopes, invocation
//          context, tool/skill shapes, the run lifecycle, replay
//          envelopes, ledger/economic records, budget state, and
//          divergence events.
// Dependencies: none within the workspace; see Cargo.toml for third-party
//               crates.
// ============================================================================

//! Foundational types for the Requiem runtime.
//!
//! This crate is a leaf: it depends on no sibling crate in the workspace.
//! Every other crate depends on it for identifiers, error handling, hashing,
//! and the data shapes that flow through the tool execution pipeline.

#![cfg_attr(
    test,
    allow(
        clippy::unwrap_used,
        clippy::expect_used,
        clippy::panic,
        reason = "test assertions favor directness over propagation"
    )
)]

pub mod budget;
pub mod context;
pub mod divergence;
pub mod envelope;
pub mod error;
pub mod hashing;
pub mod identifiers;
pub mod lifecycle;
pub mod skill;
pub mod time;
pub mod tool;
