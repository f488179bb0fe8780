// crates/requiem-registry/src/registry.rs
// ============================================================================
// Module: Tool Registry
// Description: Register / resolve tool definitions and their handlers.
// Purpose: Own the (name, version) -> definition/handler mapping the
//          invocation gate looks up on every call.
// Dependencies: async_trait, parking_lot, requiem_core::tool
// ============================================================================

//! ## Overview
//! Definitions and handlers are stored in separate `RwLock<BTreeMap<...>>`
//! maps, following the split-lock shape of a concurrent registry (register
//! once, read many); a `(name, version)` pair is never overwritten once
//! inserted — spec §4.5 step-1/register requires `INTERNAL_ERROR` on a
//! duplicate, not silent replacement.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::RwLock;
use requiem_core::context::InvocationContext;
use requiem_core::error::ErrorEnvelope;
use requiem_core::tool::SemVer;
use requiem_core::tool::ToolDefinition;
use serde_json::Value;
use thiserror::Error;

/// Errors raised while registering or resolving a tool.
#[derive(Debug, Error, Clone)]
pub enum RegistryError {
    /// `(name, version)` is already registered.
    #[error("tool {name}@{version} is already registered")]
    AlreadyRegistered {
        /// Tool name.
        name: String,
        /// Tool version.
        version: SemVer,
    },
    /// The definition's digest is missing or shorter than the minimum.
    #[error("tool {name}@{version} has a missing or undersized digest")]
    InvalidDigest {
        /// Tool name.
        name: String,
        /// Tool version.
        version: SemVer,
    },
    /// No entry matches the requested name (and version, if given).
    #[error("tool {name} not found")]
    NotFound {
        /// Requested tool name.
        name: String,
        /// Requested version, if a specific one was asked for.
        version: Option<SemVer>,
    },
}

/// Executes a registered tool's behavior. The model/LLM arbitrator and any
/// side-effecting backend are external collaborators behind this seam.
#[async_trait]
pub trait ToolHandler: Send + Sync {
    /// Invokes the tool with validated input and the calling context.
    ///
    /// # Errors
    ///
    /// Returns an [`ErrorEnvelope`] for any handler-level failure; the gate
    /// wraps unexpected panics from `async_trait` implementors is out of
    /// scope — handlers are expected to return errors, not panic.
    async fn call(&self, input: Value, ctx: &InvocationContext) -> Result<Value, ErrorEnvelope>;
}

/// Registered `(name, version)` -> definition/handler store.
#[derive(Default)]
pub struct ToolRegistry {
    definitions: RwLock<BTreeMap<String, BTreeMap<SemVer, Arc<ToolDefinition>>>>,
    handlers: RwLock<BTreeMap<String, BTreeMap<SemVer, Arc<dyn ToolHandler>>>>,
}

impl ToolRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a tool definition and its handler.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::AlreadyRegistered`] if `(name, version)` is
    /// already present, or [`RegistryError::InvalidDigest`] if the
    /// definition's digest fails [`ToolDefinition::digest_is_valid`].
    pub fn register(
        &self,
        definition: ToolDefinition,
        handler: Arc<dyn ToolHandler>,
    ) -> Result<(), RegistryError> {
        if !definition.digest_is_valid() {
            return Err(RegistryError::InvalidDigest {
                name: definition.name.clone(),
                version: definition.version,
            });
        }
        let mut definitions = self.definitions.write();
        let versions = definitions.entry(definition.name.clone()).or_default();
        if versions.contains_key(&definition.version) {
            return Err(RegistryError::AlreadyRegistered {
                name: definition.name.clone(),
                version: definition.version,
            });
        }
        let name = definition.name.clone();
        let version = definition.version;
        versions.insert(version, Arc::new(definition));
        drop(definitions);
        self.handlers.write().entry(name).or_default().insert(version, handler);
        Ok(())
    }

    /// Resolves a tool definition by name, optionally pinned to a version.
    /// With no version, returns the highest semver registered under that
    /// name.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::NotFound`] when no matching entry exists.
    pub fn resolve(
        &self,
        name: &str,
        version: Option<SemVer>,
    ) -> Result<Arc<ToolDefinition>, RegistryError> {
        let definitions = self.definitions.read();
        let versions =
            definitions.get(name).ok_or_else(|| RegistryError::NotFound {
                name: name.to_string(),
                version,
            })?;
        let found = match version {
            Some(exact) => versions.get(&exact).cloned(),
            None => versions.values().next_back().cloned(),
        };
        found.ok_or(RegistryError::NotFound { name: name.to_string(), version })
    }

    /// Returns the highest registered version of every distinct tool name,
    /// sorted by name. Used by the RPC server's `tools/list` method; never
    /// used by the invocation gate itself.
    #[must_use]
    pub fn all_definitions(&self) -> Vec<Arc<ToolDefinition>> {
        self.definitions
            .read()
            .values()
            .filter_map(|versions| versions.values().next_back().cloned())
            .collect()
    }

    /// Resolves the handler paired with a resolved definition.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::NotFound`] when no matching entry exists.
    pub fn resolve_handler(
        &self,
        name: &str,
        version: SemVer,
    ) -> Result<Arc<dyn ToolHandler>, RegistryError> {
        self.handlers
            .read()
            .get(name)
            .and_then(|versions| versions.get(&version))
            .cloned()
            .ok_or(RegistryError::NotFound { name: name.to_string(), version: Some(version) })
    }
}

#[cfg(test)]
mod tests {
    use requiem_core::context::DerivedFrom;
    use requiem_core::context::Environment;
    use requiem_core::context::InvocationContext;
    use requiem_core::context::Role;
    use requiem_core::identifiers::RequestId;
    use requiem_core::identifiers::TenantId;
    use requiem_core::identifiers::TraceId;
    use requiem_core::identifiers::UserId;
    use requiem_core::tool::LatencyClass;
    use requiem_core::tool::SemVer;
    use requiem_core::tool::ToolCost;
    use requiem_core::tool::ToolDefinition;
    use requiem_core::tool::ToolFlags;
    use serde_json::Value;
    use serde_json::json;

    use super::RegistryError;
    use super::ToolHandler;
    use super::ToolRegistry;
    use async_trait::async_trait;
    use requiem_core::error::ErrorEnvelope;
    use std::sync::Arc;

    struct EchoHandler;

    #[async_trait]
    impl ToolHandler for EchoHandler {
        async fn call(&self, input: Value, _ctx: &InvocationContext) -> Result<Value, ErrorEnvelope> {
            Ok(input)
        }
    }

    fn definition(version: SemVer, digest: String) -> ToolDefinition {
        ToolDefinition {
            name: "echo".to_string(),
            version,
            description: "Echoes input".to_string(),
            input_schema: json!({"type": "object"}),
            output_schema: json!({"type": "object"}),
            flags: ToolFlags { deterministic: true, side_effect: false, idempotent: true, tenant_scoped: true },
            required_capabilities: Default::default(),
            digest,
            cost: ToolCost { cost_units: 1, latency_class: LatencyClass::Low },
        }
    }

    fn valid_digest() -> String {
        "a".repeat(40)
    }

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
    fn registers_and_resolves_exact_version() {
        let registry = ToolRegistry::new();
        registry
            .register(definition(SemVer::new(1, 0, 0), valid_digest()), Arc::new(EchoHandler))
            .expect("register");
        let resolved = registry.resolve("echo", Some(SemVer::new(1, 0, 0))).expect("resolve");
        assert_eq!(resolved.version, SemVer::new(1, 0, 0));
    }

    #[test]
    fn resolve_without_version_returns_highest_semver() {
        let registry = ToolRegistry::new();
        registry
            .register(definition(SemVer::new(1, 0, 0), valid_digest()), Arc::new(EchoHandler))
            .expect("register v1");
        registry
            .register(definition(SemVer::new(2, 0, 0), valid_digest()), Arc::new(EchoHandler))
            .expect("register v2");
        let resolved = registry.resolve("echo", None).expect("resolve");
        assert_eq!(resolved.version, SemVer::new(2, 0, 0));
    }

    #[test]
    fn duplicate_registration_is_rejected() {
        let registry = ToolRegistry::new();
        registry
            .register(definition(SemVer::new(1, 0, 0), valid_digest()), Arc::new(EchoHandler))
            .expect("register");
        let err = registry
            .register(definition(SemVer::new(1, 0, 0), valid_digest()), Arc::new(EchoHandler))
            .expect_err("should reject duplicate");
        assert!(matches!(err, RegistryError::AlreadyRegistered { .. }));
    }

    #[test]
    fn undersized_digest_is_rejected() {
        let registry = ToolRegistry::new();
        let err = registry
            .register(definition(SemVer::new(1, 0, 0), "short".to_string()), Arc::new(EchoHandler))
            .expect_err("should reject short digest");
        assert!(matches!(err, RegistryError::InvalidDigest { .. }));
    }

    #[tokio::test]
    async fn resolved_handler_executes() {
        let registry = ToolRegistry::new();
        registry
            .register(definition(SemVer::new(1, 0, 0), valid_digest()), Arc::new(EchoHandler))
            .expect("register");
        let handler = registry.resolve_handler("echo", SemVer::new(1, 0, 0)).expect("handler");
        let output = handler.call(json!({"x": 1}), &ctx()).await.expect("call");
        assert_eq!(output, json!({"x": 1}));
    }

    #[test]
    fn all_definitions_returns_one_entry_per_name_at_its_highest_version() {
        let registry = ToolRegistry::new();
        registry
            .register(definition(SemVer::new(1, 0, 0), valid_digest()), Arc::new(EchoHandler))
            .expect("register v1");
        registry
            .register(definition(SemVer::new(2, 0, 0), valid_digest()), Arc::new(EchoHandler))
            .expect("register v2");
        let mut other = definition(SemVer::new(1, 0, 0), valid_digest());
        other.name = "sum".to_string();
        registry.register(other, Arc::new(EchoHandler)).expect("register sum");

        let mut names_and_versions: Vec<(String, SemVer)> =
            registry.all_definitions().iter().map(|def| (def.name.clone(), def.version)).collect();
        names_and_versions.sort();
        assert_eq!(
            names_and_versions,
            vec![("echo".to_string(), SemVer::new(2, 0, 0)), ("sum".to_string(), SemVer::new(1, 0, 0))]
        );
    }
}
