// crates/requiem-skills/src/registry.rs
// ============================================================================
// Module: Skill Registry
// Description: Register / resolve skill definitions and their lifecycle hooks.
// Purpose: Own the (name, version) -> definition/hooks mapping the skill
//          runner looks up before executing a skill.
// Dependencies: parking_lot, requiem_core::skill
// ============================================================================

//! ## Overview
//! Mirrors [`requiem_registry::registry::ToolRegistry`]'s split-lock shape:
//! definitions and hooks live in separate `RwLock<BTreeMap<...>>` maps, and a
//! `(name, version)` pair is never silently overwritten.

use std::collections::BTreeMap;
use std::sync::Arc;

use parking_lot::RwLock;
use requiem_core::error::ErrorEnvelope;
use requiem_core::error::ErrorKind;
use requiem_core::error::Severity;
use requiem_core::skill::NoopSkillHooks;
use requiem_core::skill::SkillDefinition;
use requiem_core::skill::SkillHooks;
use requiem_core::tool::SemVer;
use thiserror::Error;

/// Errors raised while registering or resolving a skill.
#[derive(Debug, Error, Clone)]
pub enum SkillRegistryError {
    /// `(name, version)` is already registered.
    #[error("skill {name}@{version} is already registered")]
    AlreadyRegistered {
        /// Skill name.
        name: String,
        /// Skill version.
        version: SemVer,
    },
    /// No entry matches the requested name (and version, if given).
    #[error("skill {name} not found")]
    NotFound {
        /// Requested skill name.
        name: String,
        /// Requested version, if a specific one was asked for.
        version: Option<SemVer>,
    },
}

impl SkillRegistryError {
    /// Converts this error into an [`ErrorEnvelope`].
    #[must_use]
    pub fn into_envelope(self, now_millis: i64) -> ErrorEnvelope {
        let message = self.to_string();
        match self {
            Self::AlreadyRegistered { .. } => ErrorEnvelope::new(
                ErrorKind::SkillAlreadyRegistered,
                message,
                Severity::Error,
                false,
                now_millis,
            ),
            Self::NotFound { .. } => {
                ErrorEnvelope::new(ErrorKind::InternalError, message, Severity::Warning, false, now_millis)
            }
        }
    }
}

/// Registered `(name, version)` -> definition/hooks store.
#[derive(Default)]
pub struct SkillRegistry {
    definitions: RwLock<BTreeMap<String, BTreeMap<SemVer, Arc<SkillDefinition>>>>,
    hooks: RwLock<BTreeMap<String, BTreeMap<SemVer, Arc<dyn SkillHooks>>>>,
}

impl SkillRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a skill definition, with optional lifecycle hooks. A skill
    /// registered without hooks falls back to [`NoopSkillHooks`].
    ///
    /// # Errors
    ///
    /// Returns [`SkillRegistryError::AlreadyRegistered`] if `(name, version)`
    /// is already present.
    pub fn register(
        &self,
        definition: SkillDefinition,
        hooks: Option<Arc<dyn SkillHooks>>,
    ) -> Result<(), SkillRegistryError> {
        let mut definitions = self.definitions.write();
        let versions = definitions.entry(definition.name.clone()).or_default();
        if versions.contains_key(&definition.version) {
            return Err(SkillRegistryError::AlreadyRegistered {
                name: definition.name.clone(),
                version: definition.version,
            });
        }
        let name = definition.name.clone();
        let version = definition.version;
        versions.insert(version, Arc::new(definition));
        drop(definitions);
        let hooks = hooks.unwrap_or_else(|| Arc::new(NoopSkillHooks));
        self.hooks.write().entry(name).or_default().insert(version, hooks);
        Ok(())
    }

    /// Resolves a skill definition by name, optionally pinned to a version.
    /// With no version, returns the highest semver registered under that
    /// name.
    ///
    /// # Errors
    ///
    /// Returns [`SkillRegistryError::NotFound`] when no matching entry exists.
    pub fn resolve(
        &self,
        name: &str,
        version: Option<SemVer>,
    ) -> Result<Arc<SkillDefinition>, SkillRegistryError> {
        let definitions = self.definitions.read();
        let versions = definitions
            .get(name)
            .ok_or_else(|| SkillRegistryError::NotFound { name: name.to_string(), version })?;
        let found = match version {
            Some(exact) => versions.get(&exact).cloned(),
            None => versions.values().next_back().cloned(),
        };
        found.ok_or(SkillRegistryError::NotFound { name: name.to_string(), version })
    }

    /// Resolves the hooks paired with a resolved definition.
    ///
    /// # Errors
    ///
    /// Returns [`SkillRegistryError::NotFound`] when no matching entry exists.
    pub fn resolve_hooks(
        &self,
        name: &str,
        version: SemVer,
    ) -> Result<Arc<dyn SkillHooks>, SkillRegistryError> {
        self.hooks
            .read()
            .get(name)
            .and_then(|versions| versions.get(&version))
            .cloned()
            .ok_or(SkillRegistryError::NotFound { name: name.to_string(), version: Some(version) })
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;

    use requiem_core::tool::SemVer;

    use super::SkillDefinition;
    use super::SkillRegistry;
    use super::SkillRegistryError;

    fn definition(version: SemVer) -> SkillDefinition {
        SkillDefinition {
            name: "onboard".to_string(),
            version,
            description: "Onboards a tenant".to_string(),
            required_tools: BTreeSet::new(),
            steps: Vec::new(),
        }
    }

    #[test]
    fn registers_and_resolves_exact_version() {
        let registry = SkillRegistry::new();
        registry.register(definition(SemVer::new(1, 0, 0)), None).expect("register");
        let resolved = registry.resolve("onboard", Some(SemVer::new(1, 0, 0))).expect("resolve");
        assert_eq!(resolved.version, SemVer::new(1, 0, 0));
    }

    #[test]
    fn resolve_without_version_returns_highest_semver() {
        let registry = SkillRegistry::new();
        registry.register(definition(SemVer::new(1, 0, 0)), None).expect("register v1");
        registry.register(definition(SemVer::new(2, 0, 0)), None).expect("register v2");
        let resolved = registry.resolve("onboard", None).expect("resolve");
        assert_eq!(resolved.version, SemVer::new(2, 0, 0));
    }

    #[test]
    fn duplicate_registration_is_rejected() {
        let registry = SkillRegistry::new();
        registry.register(definition(SemVer::new(1, 0, 0)), None).expect("register");
        let err = registry
            .register(definition(SemVer::new(1, 0, 0)), None)
            .expect_err("should reject duplicate");
        assert!(matches!(err, SkillRegistryError::AlreadyRegistered { .. }));
    }

    #[test]
    fn missing_hooks_default_to_noop() {
        let registry = SkillRegistry::new();
        registry.register(definition(SemVer::new(1, 0, 0)), None).expect("register");
        let hooks = registry.resolve_hooks("onboard", SemVer::new(1, 0, 0)).expect("hooks");
        assert!(hooks.precondition(&crate::test_support::ctx()));
    }
}
