// crates/requiem-core/src/context.rs
// ============================================================================
// Module: Invocation Context
// Description: The immutable, per-call packet threaded through the pipeline.
// Purpose: Carry tenant/role/trace identity and recursion depth into every
//          handler without mutation after creation.
// Dependencies: crate::identifiers
// ============================================================================

//! ## Overview
//! [`InvocationContext`] is built once per inbound request (or per skill
//! step, via [`InvocationContext::child`]) and handed by value into every
//! downstream call. It is never mutated after construction; advancing
//! recursion depth produces a new context rather than mutating the current
//! one, matching the spec's invariant that "the same context is passed into
//! every child step, with `depth` incremented."

use serde::Deserialize;
use serde::Serialize;

use crate::identifiers::CorrelationId;
use crate::identifiers::RequestId;
use crate::identifiers::TenantId;
use crate::identifiers::TraceId;
use crate::identifiers::UserId;

/// Maximum recursion depth a tool call chain may reach before the
/// invocation gate refuses further nesting (spec §4.5 step 2).
pub const MAX_DEPTH: u32 = 10;

/// Caller role, ordered `viewer < member < admin < owner`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// Read-only access.
    Viewer,
    /// Standard member; may invoke side-effecting tools.
    Member,
    /// Administrative access within a tenant.
    Admin,
    /// Full ownership of a tenant.
    Owner,
}

impl Role {
    /// Returns true when `self` satisfies a requirement of `required`.
    #[must_use]
    pub const fn satisfies(self, required: Self) -> bool {
        (self as u8) >= (required as u8)
    }
}

/// Source the context's identity was derived from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DerivedFrom {
    /// Derived from a verified JWT bearer token.
    Jwt,
    /// Derived from a server-side session.
    Session,
    /// Derived from a raw API key.
    ApiKey,
    /// Derived from a service account credential.
    ServiceAccount,
}

/// Deployment environment the context was created in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Environment {
    /// Local or staging development.
    Development,
    /// Production traffic.
    Production,
}

/// The immutable, per-call packet threaded through the pipeline.
///
/// # Invariants
/// - Never mutated after creation.
/// - `depth` is bounded by [`MAX_DEPTH`]; the invocation gate enforces this,
///   this type only carries the value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvocationContext {
    /// Tenant identifier; non-empty for any tenant-scoped call.
    pub tenant_id: TenantId,
    /// User identifier within the tenant.
    pub user_id: UserId,
    /// Caller role.
    pub role: Role,
    /// Request identifier.
    pub request_id: RequestId,
    /// Trace identifier.
    pub trace_id: TraceId,
    /// Optional caller-supplied correlation identifier.
    pub correlation_id: Option<CorrelationId>,
    /// Recursion depth; zero at the root of a call chain.
    pub depth: u32,
    /// Unix epoch milliseconds this context was derived at.
    pub derived_at: i64,
    /// Source of the caller's identity.
    pub derived_from: DerivedFrom,
    /// Deployment environment.
    pub environment: Environment,
}

impl InvocationContext {
    /// Creates a root context at depth zero.
    #[must_use]
    pub fn root(
        tenant_id: TenantId,
        user_id: UserId,
        role: Role,
        request_id: RequestId,
        trace_id: TraceId,
        derived_at: i64,
        derived_from: DerivedFrom,
        environment: Environment,
    ) -> Self {
        Self {
            tenant_id,
            user_id,
            role,
            request_id,
            trace_id,
            correlation_id: None,
            depth: 0,
            derived_at,
            derived_from,
            environment,
        }
    }

    /// Returns a copy of this context with `depth` incremented by one.
    ///
    /// This is the only way depth advances; the context itself never
    /// mutates in place.
    #[must_use]
    pub fn child(&self) -> Self {
        Self { depth: self.depth + 1, ..self.clone() }
    }

    /// Returns a copy of this context carrying the given correlation id.
    #[must_use]
    pub fn with_correlation_id(&self, correlation_id: CorrelationId) -> Self {
        Self { correlation_id: Some(correlation_id), ..self.clone() }
    }
}

#[cfg(test)]
mod tests {
    use super::DerivedFrom;
    use super::Environment;
    use super::InvocationContext;
    use super::Role;
    use crate::identifiers::RequestId;
    use crate::identifiers::TenantId;
    use crate::identifiers::TraceId;
    use crate::identifiers::UserId;

    fn ctx() -> InvocationContext {
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

    #[test]
    fn child_increments_depth_without_mutating_parent() {
        let parent = ctx();
        let child = parent.child();
        assert_eq!(parent.depth, 0);
        assert_eq!(child.depth, 1);
        assert_eq!(child.tenant_id, parent.tenant_id);
    }

    #[test]
    fn role_ordering_matches_spec_hierarchy() {
        assert!(Role::Owner.satisfies(Role::Admin));
        assert!(Role::Admin.satisfies(Role::Member));
        assert!(!Role::Viewer.satisfies(Role::Member));
        assert!(Role::Member.satisfies(Role::Member));
    }

    #[test]
    fn repeated_children_accumulate_depth() {
        let mut current = ctx();
        for expected in 1..=3 {
            current = current.child();
            assert_eq!(current.depth, expected);
        }
    }
}
