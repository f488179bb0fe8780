// crates/requiem-cli/src/context.rs
// ============================================================================
// Module: CLI Request Context Factory
// Description: Builds a fresh root InvocationContext for every inbound line.
// Purpose: Satisfy requiem_rpc::RequestContextFactory from a membership
//          resolved once at startup, since that trait has no room to fail
//          per request.
// Dependencies: requiem_core, requiem_rpc
// ============================================================================

//! ## Overview
//! [`requiem_tenant::resolve_from_cli`] can fail (bad key, wrong tenant,
//! inactive membership), but [`requiem_rpc::RequestContextFactory::build`]
//! cannot return an error — by the time the stdio loop is running, identity
//! has already been settled. [`CliRequestContextFactory`] is built from an
//! already-resolved membership's tenant, user, and role, and mints a fresh
//! request/trace id from a monotonic counter on every call so concurrent
//! requests never share one.

use std::sync::Arc;
use std::sync::atomic::AtomicU64;
use std::sync::atomic::Ordering;

use requiem_core::context::DerivedFrom;
use requiem_core::context::Environment;
use requiem_core::context::InvocationContext;
use requiem_core::context::Role;
use requiem_core::identifiers::RequestId;
use requiem_core::identifiers::TenantId;
use requiem_core::identifiers::TraceId;
use requiem_core::identifiers::UserId;
use requiem_core::time::Clock;
use requiem_rpc::RequestContextFactory;

/// Mints a fresh root [`InvocationContext`] per request from a membership
/// resolved once, at startup.
pub struct CliRequestContextFactory {
    tenant_id: TenantId,
    user_id: UserId,
    role: Role,
    environment: Environment,
    clock: Arc<dyn Clock>,
    request_counter: AtomicU64,
}

impl CliRequestContextFactory {
    /// Builds a factory from an already-resolved membership.
    #[must_use]
    pub fn new(
        tenant_id: TenantId,
        user_id: UserId,
        role: Role,
        environment: Environment,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self { tenant_id, user_id, role, environment, clock, request_counter: AtomicU64::new(0) }
    }
}

impl RequestContextFactory for CliRequestContextFactory {
    fn build(&self) -> InvocationContext {
        let sequence = self.request_counter.fetch_add(1, Ordering::SeqCst);
        InvocationContext::root(
            self.tenant_id.clone(),
            self.user_id.clone(),
            self.role,
            RequestId::new(format!("cli-{sequence}")),
            TraceId::new(format!("cli-trace-{sequence}")),
            self.clock.now_millis(),
            DerivedFrom::ApiKey,
            self.environment,
        )
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use requiem_core::context::Environment;
    use requiem_core::context::Role;
    use requiem_core::identifiers::TenantId;
    use requiem_core::identifiers::UserId;
    use requiem_core::time::FrozenClock;
    use requiem_rpc::RequestContextFactory;

    use super::CliRequestContextFactory;

    #[test]
    fn successive_builds_get_distinct_request_ids() {
        let factory = CliRequestContextFactory::new(
            TenantId::new("t1"),
            UserId::new("u1"),
            Role::Member,
            Environment::Production,
            Arc::new(FrozenClock::new(0)),
        );
        let first = factory.build();
        let second = factory.build();
        assert_ne!(first.request_id, second.request_id);
        assert_eq!(first.tenant_id, second.tenant_id);
    }
}
