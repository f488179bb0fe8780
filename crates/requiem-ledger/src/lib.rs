// crates/requiem-ledger/src/lib.rs
// ============================================================================
// Crate: requiem-ledger
// Description: Policy snapshot capture, append-only ledger, content-
//              addressed replay store, and the Divergence Sentinel.
// Purpose: Own spec §4.9 and §4.10 end to end, providing the concrete
//          `LedgerSink` and `PolicySnapshotSource` the invocation gate only
//          has trait seams for.
// Dependencies: parking_lot, requiem-core, requiem-registry
// ============================================================================

//! ## Overview
//! The real persistent store behind `Decisions`, `Junctions`, `Ledger`, and
//! `CAS` is out of scope for this codebase; everything in this crate is an
//! in-process implementation of those shapes, not a durable one. [`store`]
//! provides the ledger and economic-event sink, [`policy`] captures the
//! active policy digest, [`cas`] holds replay envelopes and runs the
//! replay-equality check, and [`sentinel`] is the un-silenceable divergence
//! tracker the replay check feeds.

#![cfg_attr(
    test,
    allow(
        clippy::unwrap_used,
        clippy::expect_used,
        clippy::panic,
        reason = "test assertions favor directness over propagation"
    )
)]

pub mod cas;
pub mod policy;
pub mod sentinel;
pub mod store;

pub use cas::ContentAddressedStore;
pub use cas::InMemoryCas;
pub use cas::check_replay;
pub use policy::FilePolicySnapshotSource;
pub use requiem_core::divergence::DivergenceEvent;
pub use requiem_core::divergence::DivergenceType;
pub use sentinel::DivergenceSentinel;
pub use sentinel::DivergenceStatus;
pub use sentinel::NoopSentinelObserver;
pub use sentinel::SentinelObserver;
pub use store::InMemoryLedger;
