// crates/requiem-registry/src/lib.rs
// ============================================================================
// Crate: requiem-registry
// Description: Tool registry, budget accountant, output size limiter, and
//              the invocation gate that ties them together.
// Purpose: Own spec §4.5's mandatory `call(name, input, ctx)` entry point.
// Dependencies: requiem-core, jsonschema, parking_lot, async-trait
// ============================================================================

//! Tool registration, budget accounting, output limiting, and the
//! invocation gate (spec §4.5-§4.6).

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
pub mod gate;
pub mod limiter;
pub mod registry;
