// crates/requiem-skills/src/runner.rs
// ============================================================================
// Module: Skill Runner
// Description: Executes a skill's precondition -> ordered steps ->
//              postcondition pipeline, with rollback on failure.
// Dependencies: requiem_core::skill, requiem_registry::gate, crate::template
// ============================================================================

//! ## Overview
//! [`SkillRunner::run`] walks a [`SkillDefinition`]'s steps in order, growing
//! a "bag" of named outputs (`initial`, then one entry per `Tool`/`Llm`
//! step) that later steps resolve `{{path}}` templates against. A failing
//! step unwinds by invoking the skill's rollback hook, in reverse order,
//! over every `Tool` step that committed before the failure — but only if
//! at least one did; a precondition or first-step failure never triggers
//! rollback, since nothing has committed yet.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::RwLock;
use requiem_core::context::InvocationContext;
use requiem_core::error::ErrorEnvelope;
use requiem_core::error::ErrorKind;
use requiem_core::error::Severity;
use requiem_core::skill::CompletedStep;
use requiem_core::skill::SkillDefinition;
use requiem_core::skill::SkillHooks;
use requiem_core::skill::SkillStep;
use requiem_core::time::Clock;
use requiem_registry::gate::InvocationGate;
use serde_json::Value;
use serde_json::json;

use crate::template;

/// Generates text on behalf of an `Llm` step. The model/provider backing
/// this seam lives outside this crate.
#[async_trait]
pub trait TextGenerator: Send + Sync {
    /// Generates a response for `prompt`, optionally against `model`.
    ///
    /// # Errors
    ///
    /// Returns [`ErrorKind::ProviderNotConfigured`] when no provider is
    /// wired up; the runner substitutes a deterministic stub and continues.
    /// Any other error propagates and fails the skill run.
    async fn generate_text(&self, prompt: &str, model: Option<&str>) -> Result<Value, ErrorEnvelope>;
}

/// A [`TextGenerator`] that always reports `PROVIDER_NOT_CONFIGURED`, for
/// deployments that haven't wired an LLM backend.
#[derive(Debug, Default, Clone, Copy)]
pub struct UnconfiguredTextGenerator;

#[async_trait]
impl TextGenerator for UnconfiguredTextGenerator {
    async fn generate_text(&self, _prompt: &str, _model: Option<&str>) -> Result<Value, ErrorEnvelope> {
        Err(ErrorEnvelope::new(
            ErrorKind::ProviderNotConfigured,
            "no text-generation provider is configured",
            Severity::Warning,
            true,
            0,
        ))
    }
}

/// Evaluates a named predicate for an `Assert` step.
pub trait Predicate: Send + Sync {
    /// Returns whether the predicate holds against the accumulated bag and
    /// the most recent step's output.
    fn evaluate(&self, bag: &BTreeMap<String, Value>, last_output: &Value) -> bool;
}

/// One step's recorded outcome in a [`SkillRunResult`].
#[derive(Debug, Clone)]
pub struct StepOutcome {
    /// The step's output, or `null` on failure.
    pub output: Value,
    /// Wall-clock duration of the step, in milliseconds.
    pub latency_ms: u64,
    /// Whether the step succeeded.
    pub is_success: bool,
    /// The failure, if `is_success` is false.
    pub error: Option<ErrorEnvelope>,
}

/// The full result of a [`SkillRunner::run`] call.
#[derive(Debug, Clone)]
pub struct SkillRunResult {
    /// Per-step outcomes, in execution order.
    pub steps: Vec<StepOutcome>,
    /// The final step's output, present only when the run succeeded.
    pub final_output: Option<Value>,
    /// Total wall-clock duration of the run, in milliseconds.
    pub total_latency_ms: u64,
    /// Whether the run, as a whole, succeeded.
    pub is_success: bool,
}

/// Executes skills: precondition, ordered steps, postcondition, with
/// rollback-on-failure over committed `Tool` steps.
pub struct SkillRunner {
    gate: Arc<InvocationGate>,
    generator: Arc<dyn TextGenerator>,
    clock: Arc<dyn Clock>,
    predicates: RwLock<BTreeMap<String, Arc<dyn Predicate>>>,
}

impl SkillRunner {
    /// Builds a runner wired to its collaborators.
    #[must_use]
    pub fn new(gate: Arc<InvocationGate>, generator: Arc<dyn TextGenerator>, clock: Arc<dyn Clock>) -> Self {
        Self { gate, generator, clock, predicates: RwLock::new(BTreeMap::new()) }
    }

    /// Registers a named predicate for use by `Assert` steps. Re-registering
    /// a name replaces the prior predicate.
    pub fn register_predicate(&self, name: impl Into<String>, predicate: Arc<dyn Predicate>) {
        self.predicates.write().insert(name.into(), predicate);
    }

    /// Runs `definition` against `initial` input under `ctx`.
    ///
    /// A missing or unknown predicate name evaluates to `false` (fail
    /// closed), matching the same "ambiguity refuses rather than guesses"
    /// posture the invocation gate applies to schema validation.
    pub async fn run(
        &self,
        definition: &SkillDefinition,
        hooks: &dyn SkillHooks,
        initial: Value,
        ctx: &InvocationContext,
    ) -> SkillRunResult {
        let run_started = self.clock.now_millis();

        if !hooks.precondition(ctx) {
            return self.finalize(Vec::new(), None, run_started, false);
        }

        let mut bag: BTreeMap<String, Value> = BTreeMap::new();
        bag.insert("initial".to_string(), initial.clone());
        let mut completed_tool_steps: Vec<CompletedStep> = Vec::new();
        let mut outcomes: Vec<StepOutcome> = Vec::new();
        let mut last_output = initial;

        for (index, step) in definition.steps.iter().enumerate() {
            let step_started = self.clock.now_millis();
            match step {
                SkillStep::Tool { tool_name, input, output_key } => {
                    let resolved_input = template::resolve_templates(input, &bag);
                    let child_ctx = ctx.child();
                    match self.gate.call(tool_name, None, resolved_input.clone(), &child_ctx).await {
                        Ok(outcome) => {
                            let latency = self.latency_since(step_started);
                            let key = output_key.clone().unwrap_or_else(|| tool_name.clone());
                            bag.insert(key, outcome.result.clone());
                            last_output = outcome.result.clone();
                            completed_tool_steps.push(CompletedStep {
                                index,
                                tool_name: tool_name.clone(),
                                input: resolved_input,
                                output: outcome.result.clone(),
                            });
                            outcomes.push(StepOutcome {
                                output: outcome.result,
                                latency_ms: latency,
                                is_success: true,
                                error: None,
                            });
                        }
                        Err(envelope) => {
                            let latency = self.latency_since(step_started);
                            outcomes.push(StepOutcome {
                                output: Value::Null,
                                latency_ms: latency,
                                is_success: false,
                                error: Some(envelope),
                            });
                            self.rollback_if_needed(hooks, ctx, &completed_tool_steps);
                            return self.finalize(outcomes, None, run_started, false);
                        }
                    }
                }
                SkillStep::Llm { prompt, model } => {
                    let resolved_prompt = template::resolve_string(prompt, &bag);
                    match self.generator.generate_text(&resolved_prompt, model.as_deref()).await {
                        Ok(text) => {
                            let latency = self.latency_since(step_started);
                            bag.insert(format!("llm_{index}"), text.clone());
                            last_output = text.clone();
                            outcomes.push(StepOutcome {
                                output: text,
                                latency_ms: latency,
                                is_success: true,
                                error: None,
                            });
                        }
                        Err(envelope) if envelope.code == ErrorKind::ProviderNotConfigured => {
                            let latency = self.latency_since(step_started);
                            let stub = json!({
                                "type": "stub",
                                "message": envelope.message,
                                "prompt": resolved_prompt,
                            });
                            bag.insert(format!("llm_{index}"), stub.clone());
                            last_output = stub.clone();
                            outcomes.push(StepOutcome {
                                output: stub,
                                latency_ms: latency,
                                is_success: true,
                                error: None,
                            });
                        }
                        Err(envelope) => {
                            let latency = self.latency_since(step_started);
                            outcomes.push(StepOutcome {
                                output: Value::Null,
                                latency_ms: latency,
                                is_success: false,
                                error: Some(envelope),
                            });
                            self.rollback_if_needed(hooks, ctx, &completed_tool_steps);
                            return self.finalize(outcomes, None, run_started, false);
                        }
                    }
                }
                SkillStep::Assert { predicate, description } => {
                    let passed = self.evaluate_predicate(predicate, &bag, &last_output);
                    let latency = self.latency_since(step_started);
                    if passed {
                        outcomes.push(StepOutcome {
                            output: json!(true),
                            latency_ms: latency,
                            is_success: true,
                            error: None,
                        });
                    } else {
                        let envelope = ErrorEnvelope::new(
                            ErrorKind::SkillStepFailed,
                            description.clone(),
                            Severity::Error,
                            false,
                            self.clock.now_millis(),
                        )
                        .with_phase("skill_assert");
                        outcomes.push(StepOutcome {
                            output: json!(false),
                            latency_ms: latency,
                            is_success: false,
                            error: Some(envelope),
                        });
                        self.rollback_if_needed(hooks, ctx, &completed_tool_steps);
                        return self.finalize(outcomes, None, run_started, false);
                    }
                }
            }
        }

        let final_output = last_output;
        if hooks.postcondition(ctx, &final_output) {
            self.finalize(outcomes, Some(final_output), run_started, true)
        } else {
            self.rollback_if_needed(hooks, ctx, &completed_tool_steps);
            self.finalize(outcomes, None, run_started, false)
        }
    }

    /// Invokes rollback exactly once, in reverse order over committed
    /// `Tool` steps, but only if at least one step committed.
    fn rollback_if_needed(
        &self,
        hooks: &dyn SkillHooks,
        ctx: &InvocationContext,
        completed_tool_steps: &[CompletedStep],
    ) {
        if completed_tool_steps.is_empty() {
            return;
        }
        let mut reversed = completed_tool_steps.to_vec();
        reversed.reverse();
        hooks.rollback(ctx, &reversed);
    }

    /// Looks up and evaluates a named predicate; an unknown name fails
    /// closed.
    fn evaluate_predicate(&self, name: &str, bag: &BTreeMap<String, Value>, last_output: &Value) -> bool {
        self.predicates.read().get(name).is_some_and(|predicate| predicate.evaluate(bag, last_output))
    }

    /// Milliseconds elapsed since `started_at`, per the injected clock.
    fn latency_since(&self, started_at: i64) -> u64 {
        u64::try_from(self.clock.elapsed_since(started_at).max(0)).unwrap_or(u64::MAX)
    }

    /// Builds the final result, stamping total latency from the run's start.
    fn finalize(
        &self,
        steps: Vec<StepOutcome>,
        final_output: Option<Value>,
        run_started: i64,
        is_success: bool,
    ) -> SkillRunResult {
        SkillRunResult {
            steps,
            final_output,
            total_latency_ms: self.latency_since(run_started),
            is_success,
        }
    }
}
