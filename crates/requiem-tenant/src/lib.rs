// crates/requiem-tenant/src/lib.rs
// ============================================================================
// Crate: requiem-tenant
// Description: Tenant/identity resolution and role-hierarchy enforcement.
// Purpose: Turn an authorization header or CLI credential into a verified
//          InvocationContext, never trusting request-body fields for tenant
//          identification.
// Dependencies: requiem-core, thiserror
// ============================================================================

//! Tenant resolution: `fromRequest` and `fromCli`.
//!
//! Both entry points delegate credential verification to a
//! [`CredentialVerifier`] supplied by the host (the auth/token verifier is an
//! external collaborator per the runtime's scope); this crate only enforces
//! the shape of the result: an active, non-expired membership becomes an
//! [`requiem_core::context::InvocationContext`], everything else becomes a
//! [`TenantError`].
//!
//! Failures never interpolate a raw user id into their `Display` message;
//! only tenant id and role appear, so downstream logs stay safe to print
//! without an extra redaction pass.

#![cfg_attr(
    test,
    allow(
        clippy::unwrap_used,
        clippy::expect_used,
        clippy::panic,
        reason = "test assertions favor directness over propagation"
    )
)]

use requiem_core::context::DerivedFrom;
use requiem_core::context::Environment;
use requiem_core::context::InvocationContext;
use requiem_core::context::Role;
use requiem_core::error::ErrorEnvelope;
use requiem_core::error::ErrorKind;
use requiem_core::error::Severity;
use requiem_core::identifiers::RequestId;
use requiem_core::identifiers::TenantId;
use requiem_core::identifiers::TraceId;
use requiem_core::identifiers::UserId;
use thiserror::Error;

/// Errors raised while resolving or authorizing a tenant context.
///
/// # Invariants
/// - No variant's `Display` output includes a raw user id.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TenantError {
    /// No usable credential was found in the request.
    #[error("no authorization credential present")]
    Unauthenticated,
    /// The credential was present but failed verification.
    #[error("credential verification failed: {0}")]
    Unauthorized(String),
    /// The membership exists but is inactive or has expired.
    #[error("membership required for tenant {tenant_id}")]
    MembershipRequired {
        /// Tenant the caller attempted to act as.
        tenant_id: TenantId,
    },
    /// The caller's role does not satisfy the action's requirement.
    #[error("role {actual:?} does not satisfy required role {required:?}")]
    Forbidden {
        /// Role the caller actually holds.
        actual: Role,
        /// Role required for the action.
        required: Role,
    },
    /// A CLI-supplied API key does not belong to the declared tenant.
    #[error("api key does not belong to declared tenant {tenant_id}")]
    TenantMismatch {
        /// Tenant the caller declared.
        tenant_id: TenantId,
    },
}

/// A verified membership: who the caller is, within which tenant, and
/// whether that standing is currently valid.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MembershipRecord {
    /// Tenant this membership belongs to.
    pub tenant_id: TenantId,
    /// User within the tenant.
    pub user_id: UserId,
    /// Role granted by this membership.
    pub role: Role,
    /// Unix epoch milliseconds this membership expires at, if bounded.
    pub expires_at: Option<i64>,
    /// Whether the membership has been administratively deactivated.
    pub active: bool,
}

impl MembershipRecord {
    /// Returns true when the membership is active and unexpired as of
    /// `now_millis`.
    #[must_use]
    pub fn is_valid(&self, now_millis: i64) -> bool {
        if !self.active {
            return false;
        }
        match self.expires_at {
            Some(expiry) => expiry > now_millis,
            None => true,
        }
    }
}

/// Verifies raw credentials into memberships. The auth/token verifier
/// itself lives outside this crate; implementations adapt it to this seam.
pub trait CredentialVerifier: Send + Sync {
    /// Verifies a bearer JWT, returning the membership it encodes.
    ///
    /// # Errors
    ///
    /// Returns [`TenantError::Unauthorized`] when the token is malformed or
    /// fails signature/claims verification.
    fn verify_bearer(&self, jwt: &str) -> Result<MembershipRecord, TenantError>;

    /// Verifies a raw API key with no declared tenant, returning whichever
    /// membership the key resolves to.
    ///
    /// # Errors
    ///
    /// Returns [`TenantError::Unauthorized`] when the key is unknown.
    fn verify_api_key(&self, api_key: &str) -> Result<MembershipRecord, TenantError>;

    /// Verifies a raw API key against a caller-declared tenant, used by the
    /// CLI entry point. Fails closed if the key belongs to a different
    /// tenant.
    ///
    /// # Errors
    ///
    /// Returns [`TenantError::Unauthorized`] when the key is unknown, or
    /// [`TenantError::TenantMismatch`] when it belongs to another tenant.
    fn verify_api_key_for_tenant(
        &self,
        tenant_id: &TenantId,
        api_key: &str,
    ) -> Result<MembershipRecord, TenantError> {
        let membership = self.verify_api_key(api_key)?;
        if &membership.tenant_id != tenant_id {
            return Err(TenantError::TenantMismatch { tenant_id: tenant_id.clone() });
        }
        Ok(membership)
    }
}

/// Parsed form of an `Authorization` header value.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Credential<'a> {
    Bearer(&'a str),
    ApiKey(&'a str),
}

fn parse_authorization_header(header: &str) -> Option<Credential<'_>> {
    let trimmed = header.trim();
    if trimmed.is_empty() {
        return None;
    }
    trimmed
        .strip_prefix("Bearer ")
        .map(|jwt| Credential::Bearer(jwt.trim()))
        .or(Some(Credential::ApiKey(trimmed)))
}

fn membership_to_context(
    membership: MembershipRecord,
    request_id: RequestId,
    trace_id: TraceId,
    derived_from: DerivedFrom,
    environment: Environment,
    now_millis: i64,
) -> Result<InvocationContext, TenantError> {
    if !membership.is_valid(now_millis) {
        return Err(TenantError::MembershipRequired { tenant_id: membership.tenant_id });
    }
    Ok(InvocationContext::root(
        membership.tenant_id,
        membership.user_id,
        membership.role,
        request_id,
        trace_id,
        now_millis,
        derived_from,
        environment,
    ))
}

/// Resolves an inbound request's `Authorization` header into a verified
/// [`InvocationContext`]. Never inspects the request body for tenant
/// identification.
///
/// # Errors
///
/// Returns [`TenantError::Unauthenticated`] when the header is absent or
/// empty, propagates [`CredentialVerifier`] failures, and returns
/// [`TenantError::MembershipRequired`] when the resolved membership is
/// inactive or expired.
pub fn resolve_from_request(
    authorization_header: Option<&str>,
    verifier: &dyn CredentialVerifier,
    request_id: RequestId,
    trace_id: TraceId,
    environment: Environment,
    now_millis: i64,
) -> Result<InvocationContext, TenantError> {
    let header = authorization_header.ok_or(TenantError::Unauthenticated)?;
    let credential = parse_authorization_header(header).ok_or(TenantError::Unauthenticated)?;
    let (membership, derived_from) = match credential {
        Credential::Bearer(jwt) => (verifier.verify_bearer(jwt)?, DerivedFrom::Jwt),
        Credential::ApiKey(key) => (verifier.verify_api_key(key)?, DerivedFrom::ApiKey),
    };
    membership_to_context(membership, request_id, trace_id, derived_from, environment, now_millis)
}

/// Resolves a CLI-initiated invocation from a declared tenant id and API
/// key, binding the key to that tenant.
///
/// # Errors
///
/// Propagates [`CredentialVerifier::verify_api_key_for_tenant`] failures and
/// returns [`TenantError::MembershipRequired`] when the resolved membership
/// is inactive or expired.
pub fn resolve_from_cli(
    tenant_id: &TenantId,
    api_key: &str,
    verifier: &dyn CredentialVerifier,
    request_id: RequestId,
    trace_id: TraceId,
    environment: Environment,
    now_millis: i64,
) -> Result<InvocationContext, TenantError> {
    let membership = verifier.verify_api_key_for_tenant(tenant_id, api_key)?;
    membership_to_context(
        membership,
        request_id,
        trace_id,
        DerivedFrom::ApiKey,
        environment,
        now_millis,
    )
}

impl TenantError {
    /// Converts this error into a tagged, severity-classified envelope for
    /// cross-boundary reporting. Never embeds a raw user id.
    #[must_use]
    pub fn into_envelope(self, now_millis: i64) -> ErrorEnvelope {
        let (kind, message) = match &self {
            Self::Unauthenticated => {
                (ErrorKind::Unauthorized, "no authorization credential present".to_string())
            }
            Self::Unauthorized(reason) => (ErrorKind::Unauthorized, reason.clone()),
            Self::MembershipRequired { tenant_id } => {
                (ErrorKind::MembershipRequired, format!("membership required for {tenant_id}"))
            }
            Self::Forbidden { actual, required } => (
                ErrorKind::Forbidden,
                format!("role {actual:?} does not satisfy required role {required:?}"),
            ),
            Self::TenantMismatch { tenant_id } => (
                ErrorKind::TenantAccessDenied,
                format!("api key does not belong to declared tenant {tenant_id}"),
            ),
        };
        ErrorEnvelope::new(kind, message, Severity::Error, false, now_millis)
    }
}

/// Enforces that `ctx`'s role satisfies `required`, per the fixed
/// `viewer < member < admin < owner` hierarchy.
///
/// # Errors
///
/// Returns [`TenantError::Forbidden`] when the role check fails.
pub fn require_role(ctx: &InvocationContext, required: Role) -> Result<(), TenantError> {
    if ctx.role.satisfies(required) {
        Ok(())
    } else {
        Err(TenantError::Forbidden { actual: ctx.role, required })
    }
}

#[cfg(test)]
mod tests {
    use requiem_core::identifiers::RequestId;
    use requiem_core::identifiers::TraceId;

    use super::CredentialVerifier;
    use super::Environment;
    use super::MembershipRecord;
    use super::Role;
    use super::TenantError;
    use super::TenantId;
    use super::UserId;
    use super::require_role;
    use super::resolve_from_cli;
    use super::resolve_from_request;

    struct FixedVerifier {
        membership: MembershipRecord,
        known_key: &'static str,
    }

    impl CredentialVerifier for FixedVerifier {
        fn verify_bearer(&self, jwt: &str) -> Result<MembershipRecord, TenantError> {
            if jwt == self.known_key {
                Ok(self.membership.clone())
            } else {
                Err(TenantError::Unauthorized("bad jwt".to_string()))
            }
        }

        fn verify_api_key(&self, api_key: &str) -> Result<MembershipRecord, TenantError> {
            if api_key == self.known_key {
                Ok(self.membership.clone())
            } else {
                Err(TenantError::Unauthorized("bad api key".to_string()))
            }
        }
    }

    fn verifier(role: Role, expires_at: Option<i64>, active: bool) -> FixedVerifier {
        FixedVerifier {
            membership: MembershipRecord {
                tenant_id: TenantId::new("t1"),
                user_id: UserId::new("u1"),
                role,
                expires_at,
                active,
            },
            known_key: "secret-key",
        }
    }

    #[test]
    fn resolves_bearer_token_into_context() {
        let verifier = verifier(Role::Member, None, true);
        let ctx = resolve_from_request(
            Some("Bearer secret-key"),
            &verifier,
            RequestId::new("r1"),
            TraceId::new("tr1"),
            Environment::Production,
            0,
        )
        .expect("resolve");
        assert_eq!(ctx.tenant_id, TenantId::new("t1"));
        assert_eq!(ctx.role, Role::Member);
    }

    #[test]
    fn missing_header_is_unauthenticated() {
        let verifier = verifier(Role::Member, None, true);
        let err = resolve_from_request(
            None,
            &verifier,
            RequestId::new("r1"),
            TraceId::new("tr1"),
            Environment::Production,
            0,
        )
        .expect_err("should fail");
        assert_eq!(err, TenantError::Unauthenticated);
    }

    #[test]
    fn expired_membership_requires_membership() {
        let verifier = verifier(Role::Member, Some(100), true);
        let err = resolve_from_request(
            Some("secret-key"),
            &verifier,
            RequestId::new("r1"),
            TraceId::new("tr1"),
            Environment::Production,
            500,
        )
        .expect_err("should fail");
        assert_eq!(err, TenantError::MembershipRequired { tenant_id: TenantId::new("t1") });
    }

    #[test]
    fn inactive_membership_requires_membership() {
        let verifier = verifier(Role::Member, None, false);
        let err = resolve_from_request(
            Some("secret-key"),
            &verifier,
            RequestId::new("r1"),
            TraceId::new("tr1"),
            Environment::Production,
            0,
        )
        .expect_err("should fail");
        assert_eq!(err, TenantError::MembershipRequired { tenant_id: TenantId::new("t1") });
    }

    #[test]
    fn cli_path_rejects_mismatched_tenant() {
        let verifier = verifier(Role::Admin, None, true);
        let err = resolve_from_cli(
            &TenantId::new("other-tenant"),
            "secret-key",
            &verifier,
            RequestId::new("r1"),
            TraceId::new("tr1"),
            Environment::Development,
            0,
        )
        .expect_err("should fail");
        assert_eq!(err, TenantError::TenantMismatch { tenant_id: TenantId::new("other-tenant") });
    }

    #[test]
    fn cli_path_resolves_matching_tenant() {
        let verifier = verifier(Role::Owner, None, true);
        let ctx = resolve_from_cli(
            &TenantId::new("t1"),
            "secret-key",
            &verifier,
            RequestId::new("r1"),
            TraceId::new("tr1"),
            Environment::Development,
            0,
        )
        .expect("resolve");
        assert_eq!(ctx.role, Role::Owner);
    }

    #[test]
    fn role_hierarchy_is_enforced() {
        let verifier = verifier(Role::Viewer, None, true);
        let ctx = resolve_from_request(
            Some("secret-key"),
            &verifier,
            RequestId::new("r1"),
            TraceId::new("tr1"),
            Environment::Production,
            0,
        )
        .expect("resolve");
        assert_eq!(require_role(&ctx, Role::Member), Err(TenantError::Forbidden {
            actual: Role::Viewer,
            required: Role::Member,
        }));
        assert!(require_role(&ctx, Role::Viewer).is_ok());
    }
}
