// crates/requiem-core/src/skill.rs
// ============================================================================
// Module: Skill Definition
// Description: Versioned workflow shape executed by the skill runner.
// Purpose: Describe ordered steps, required tools, and lifecycle hooks for a
//          registered skill.
// Dependencies: serde_json, crate::tool::SemVer
// ============================================================================

//! ## Overview
//! A [`SkillDefinition`] names an ordered sequence of [`SkillStep`]s plus
//! optional precondition/postcondition/rollback hooks. The hooks are
//! behavior, not data, so they are modeled as a trait object
//! ([`SkillHooks`]) rather than a closure field, matching the sealed
//! sum-type guidance in spec §9 ("avoid open polymorphism") while still
//! allowing hosts to supply real logic.

use std::collections::BTreeSet;

use serde::Deserialize;
use serde::Serialize;
use serde_json::Value;

use crate::context::InvocationContext;
use crate::tool::SemVer;

/// One step of a skill's ordered workflow.
///
/// # Invariants
/// - Variants are a closed set (sealed sum type); adding a new step kind is
///   a breaking change to every skill runner.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SkillStep {
    /// Invoke a registered tool through the invocation gate.
    Tool {
        /// Name of the tool to invoke.
        tool_name: String,
        /// Input template; may contain `{{path}}` placeholders.
        input: Value,
        /// Bag key to store the tool's output under; defaults to
        /// `tool_name` when absent.
        output_key: Option<String>,
    },
    /// Call the `generateText` collaborator.
    Llm {
        /// Prompt template; may contain `{{path}}` placeholders.
        prompt: String,
        /// Optional model override.
        model: Option<String>,
    },
    /// Evaluate a predicate against the accumulated bag.
    Assert {
        /// Name of a predicate registered with the runner.
        predicate: String,
        /// Human-readable description surfaced on failure.
        description: String,
    },
}

/// Lifecycle hooks for a skill: precondition, postcondition, and rollback.
///
/// All methods default to a permissive no-op so skills that don't need a
/// hook can omit it entirely.
pub trait SkillHooks: Send + Sync {
    /// Evaluated before the first step; `false` aborts the run.
    fn precondition(&self, _ctx: &InvocationContext) -> bool {
        true
    }

    /// Evaluated after the last step; `false` triggers rollback.
    fn postcondition(&self, _ctx: &InvocationContext, _result: &Value) -> bool {
        true
    }

    /// Invoked in reverse order over completed `Tool` steps when a later
    /// step fails. Failures here are logged and swallowed by the runner.
    fn rollback(&self, _ctx: &InvocationContext, _completed: &[CompletedStep]) {}
}

/// A completed step, recorded for rollback.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompletedStep {
    /// Index of the step within the skill's ordered list.
    pub index: usize,
    /// Tool name invoked for this step.
    pub tool_name: String,
    /// Resolved input that was sent to the tool.
    pub input: Value,
    /// Output the tool returned.
    pub output: Value,
}

/// A no-op hook set used when a skill declares none.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopSkillHooks;

impl SkillHooks for NoopSkillHooks {}

/// Versioned workflow definition.
///
/// # Invariants
/// - `steps` is non-empty for any skill that performs work; an empty step
///   list is legal but trivially succeeds.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SkillDefinition {
    /// Skill name.
    pub name: String,
    /// Skill version.
    pub version: SemVer,
    /// Human-readable description.
    pub description: String,
    /// Tool names this skill expects to be registered (surfaced, not yet
    /// enforced at registration time per spec §3).
    pub required_tools: BTreeSet<String>,
    /// Ordered workflow steps.
    pub steps: Vec<SkillStep>,
}
