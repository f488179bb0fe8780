// crates/requiem-skills/src/lib.rs
// ============================================================================
// Crate: requiem-skills
// Description: Skill registry and the precondition/steps/postcondition
//              runner that executes a skill through the invocation gate.
// Purpose: Own spec §4.7's skill execution pipeline.
// Dependencies: requiem-core, requiem-registry, async-trait, parking_lot
// ============================================================================

//! Skill registration and execution (spec §4.7).

#![cfg_attr(
    test,
    allow(
        clippy::unwrap_used,
        clippy::expect_used,
        clippy::panic,
        reason = "test assertions favor directness over propagation"
    )
)]

pub mod registry;
pub mod runner;
pub mod template;

#[cfg(test)]
mod test_support;
