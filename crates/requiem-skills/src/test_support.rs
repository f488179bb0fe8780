// crates/requiem-skills/src/test_support.rs
// ============================================================================
// Module: Test Support
// Description: Shared `InvocationContext` builder for this crate's tests.
// Purpose: Avoid re-deriving the same root context in every test module.
// Dependencies: requiem_core::context, requiem_core::identifiers
// ============================================================================

#![allow(dead_code, reason = "helpers are used selectively across test modules")]

use requiem_core::context::DerivedFrom;
use requiem_core::context::Environment;
use requiem_core::context::InvocationContext;
use requiem_core::context::Role;
use requiem_core::identifiers::RequestId;
use requiem_core::identifiers::TenantId;
use requiem_core::identifiers::TraceId;
use requiem_core::identifiers::UserId;

/// Builds a root context at depth zero, role `member`, tenant `t1`.
pub fn ctx() -> InvocationContext {
    InvocationContext::root(
        TenantId::new("t1"),
        UserId::new("u1"),
        Role::Member,
        RequestId::new("r1"),
        TraceId::new("tr1"),
        0,
        DerivedFrom::Jwt,
        Environment::Production,
    )
}
