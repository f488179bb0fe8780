// crates/requiem-cli/src/auth.rs
// ============================================================================
// Module: CLI Credential Verifier
// Description: Resolves REQUIEM_API_KEY against a declared tenant.
// Purpose: Give requiem_tenant::resolve_from_cli a concrete CredentialVerifier
//          for the stdio entry point; the real auth/token backend this would
//          normally delegate to is an external collaborator out of scope.
// Dependencies: requiem_core::context, requiem_tenant
// ============================================================================

//! ## Overview
//! [`EnvApiKeyVerifier`] knows exactly one thing: whether a supplied key
//! equals the key `requiem-cli` was started with, for the tenant it was
//! started with. It has no notion of a tenant-less API key or a bearer
//! token, since the CLI never receives either; both of those trait methods
//! return [`TenantError::Unauthorized`] to document that they are
//! unreachable from this entry point, not silently accepted.

use requiem_core::context::Role;
use requiem_tenant::CredentialVerifier;
use requiem_tenant::MembershipRecord;
use requiem_tenant::TenantError;
use requiem_core::identifiers::TenantId;
use requiem_core::identifiers::UserId;

/// Verifies a single, process-wide API key against a single declared tenant.
pub struct EnvApiKeyVerifier {
    tenant_id: TenantId,
    api_key: String,
}

impl EnvApiKeyVerifier {
    /// Builds a verifier bound to the tenant and key the process was
    /// started with.
    #[must_use]
    pub fn new(tenant_id: TenantId, api_key: String) -> Self {
        Self { tenant_id, api_key }
    }
}

impl CredentialVerifier for EnvApiKeyVerifier {
    fn verify_bearer(&self, _jwt: &str) -> Result<MembershipRecord, TenantError> {
        Err(TenantError::Unauthorized(
            "the CLI credential path accepts REQUIEM_API_KEY only, not a bearer token".to_string(),
        ))
    }

    fn verify_api_key(&self, _api_key: &str) -> Result<MembershipRecord, TenantError> {
        Err(TenantError::Unauthorized(
            "a tenant-less API key cannot be resolved by the CLI credential path".to_string(),
        ))
    }

    fn verify_api_key_for_tenant(
        &self,
        tenant_id: &TenantId,
        api_key: &str,
    ) -> Result<MembershipRecord, TenantError> {
        if api_key.is_empty() || api_key != self.api_key {
            return Err(TenantError::Unauthorized("api key does not match REQUIEM_API_KEY".to_string()));
        }
        if tenant_id != &self.tenant_id {
            return Err(TenantError::TenantMismatch { tenant_id: tenant_id.clone() });
        }
        Ok(MembershipRecord {
            tenant_id: tenant_id.clone(),
            user_id: UserId::new("cli"),
            role: Role::Member,
            expires_at: None,
            active: true,
        })
    }
}
