// crates/requiem-rpc/src/lib.rs
// ============================================================================
// Crate: requiem-rpc
// Description: Stdio JSON-RPC 2.0 server exposing the tool registry.
// Purpose: Own spec §4.11 end to end.
// Dependencies: requiem-core, requiem-registry, serde, serde_json, tokio
// ============================================================================

//! Stdio JSON-RPC 2.0 framing over the invocation gate (spec §4.11).

#![cfg_attr(
    test,
    allow(
        clippy::unwrap_used,
        clippy::expect_used,
        clippy::panic,
        reason = "test assertions favor directness over propagation"
    )
)]

pub mod protocol;
pub mod server;

pub use protocol::JsonRpcError;
pub use protocol::JsonRpcRequest;
pub use protocol::JsonRpcResponse;
pub use protocol::error_code_for;
pub use server::DEFAULT_TRIGGER_DATA_MAX_BYTES;
pub use server::RequestContextFactory;
pub use server::RpcServer;
