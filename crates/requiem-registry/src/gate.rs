// crates/requiem-registry/src/gate.rs
// ============================================================================
// Module: Invocation Gate
// Description: The mandatory, normatively-ordered entry point for every
//              tenant-scoped or side-effecting tool call.
// Purpose: Enforce lookup, recursion, tenant/role, budget, schema, size, and
//          persistence checks in the exact order spec §4.5 prescribes.
// Dependencies: jsonschema, requiem_core, crate::{budget, limiter, registry}
// ============================================================================

//! ## Overview
//! [`InvocationGate::call`] is the only legal entry point for a registered
//! tool. Each step below is numbered to match spec §4.5's ordered list;
//! reordering or skipping one would break a guarantee the rest of the
//! runtime depends on (budget atomicity, replay equality, the recursion
//! bound). The persistent ledger store and the policy-file lookup are
//! external collaborators reached through [`LedgerSink`] and
//! [`PolicySnapshotSource`].

use std::sync::Arc;

use jsonschema::Draft;
use requiem_core::context::InvocationContext;
use requiem_core::context::MAX_DEPTH;
use requiem_core::context::Role;
use requiem_core::divergence::DivergenceEvent;
use requiem_core::divergence::detect_replay_divergence;
use requiem_core::envelope::ReplayEnvelope;
use requiem_core::error::ErrorEnvelope;
use requiem_core::error::ErrorKind;
use requiem_core::error::Severity;
use requiem_core::hashing::hash_canonical;
use requiem_core::identifiers::RunId;
use requiem_core::ledger::EconomicEvent;
use requiem_core::ledger::EconomicEventType;
use requiem_core::ledger::LedgerEntry;
use requiem_core::ledger::LedgerEventType;
use requiem_core::ledger::cost_units_for_latency;
use requiem_core::time::Clock;
use requiem_core::tool::SemVer;
use requiem_core::tool::ToolDefinition;
use serde_json::Value;
use serde_json::json;

use crate::budget::BudgetAccountant;
use crate::budget::BudgetError;
use crate::limiter;
use crate::limiter::LimiterError;
use crate::registry::RegistryError;
use crate::registry::ToolRegistry;

/// Records ledger entries and economic events on behalf of the gate. The
/// durable store backing this seam lives outside this crate.
pub trait LedgerSink: Send + Sync {
    /// Appends one audit line.
    fn write_entry(&self, entry: LedgerEntry);
    /// Records one per-invocation cost event.
    fn record_economic_event(&self, event: EconomicEvent);
}

/// Supplies the current policy snapshot hash (spec §4.9). The on-disk
/// lookup this wraps lives outside this crate.
pub trait PolicySnapshotSource: Send + Sync {
    /// Returns the current policy snapshot hash.
    fn policy_snapshot_hash(&self) -> String;
}

/// Content-addressed storage seam for persisted replay envelopes (spec
/// §4.9's CAS half of C1). The concrete store backing this lives in
/// requiem-ledger.
pub trait ReplayStore: Send + Sync {
    /// Stores `envelope`, replacing any prior envelope for the same run.
    fn put(&self, envelope: ReplayEnvelope);
    /// Returns the stored envelope for `run_id`, if any.
    fn get(&self, run_id: &RunId) -> Option<ReplayEnvelope>;
}

/// Records detected replay divergences (spec §4.10's Divergence Sentinel,
/// C14). The concrete sentinel backing this lives in requiem-ledger.
pub trait DivergenceRecorder: Send + Sync {
    /// Records one divergence event. Cannot be called and have no effect;
    /// the concrete sentinel always logs and tracks it.
    fn record(&self, event: DivergenceEvent);
}

/// Outcome of a successful [`InvocationGate::call`].
#[derive(Debug, Clone)]
pub struct CallOutcome {
    /// The handler's result, truncated if it exceeded the size limit.
    pub result: Value,
    /// `output_digest`: `BLAKE3(canonical(result))`, also the envelope's
    /// self-hash.
    pub hash: String,
    /// Wall-clock duration of the handler call, in milliseconds.
    pub duration_ms: u64,
    /// Always `false`; this runtime has no caching layer.
    pub from_cache: bool,
    /// Copied from the resolved tool definition's `deterministic` flag.
    pub deterministic: bool,
}

/// A successful run of steps 6 through 9.
struct PipelineSuccess {
    /// The (possibly truncated) handler output.
    result: Value,
    /// Milliseconds the handler call itself took.
    duration_ms: u64,
}

/// A failure from steps 6 through 9, carrying enough state for step 10 to
/// reconcile the budget correctly.
struct PipelineFailure {
    /// The error to return to the caller.
    envelope: ErrorEnvelope,
    /// Whether the handler actually ran (and therefore incurred latency).
    handler_ran: bool,
    /// Milliseconds elapsed in the handler call, zero if it never ran.
    duration_ms: u64,
}

/// The mandatory entry point for every tenant-scoped or side-effecting tool
/// call (spec §4.5).
pub struct InvocationGate {
    /// Source of `(name, version) -> definition/handler` lookups.
    registry: Arc<ToolRegistry>,
    /// Per-tenant windowed cost accountant.
    budget: Arc<BudgetAccountant>,
    /// Append-only ledger and economic-event sink.
    ledger: Arc<dyn LedgerSink>,
    /// Current policy snapshot hash provider.
    policy: Arc<dyn PolicySnapshotSource>,
    /// Content-addressed store every built envelope is persisted into.
    cas: Arc<dyn ReplayStore>,
    /// Divergence sentinel every detected replay mismatch is reported to.
    sentinel: Arc<dyn DivergenceRecorder>,
    /// Time source; injected so replay and timeouts stay deterministic.
    clock: Arc<dyn Clock>,
    /// Output size cap in bytes, overridable via `REQUIEM_TOOL_OUTPUT_MAX_BYTES`.
    max_output_bytes: usize,
}

impl InvocationGate {
    /// Builds a gate wired to its collaborators.
    #[must_use]
    #[allow(clippy::too_many_arguments, reason = "one constructor wiring every collaborator the gate needs")]
    pub fn new(
        registry: Arc<ToolRegistry>,
        budget: Arc<BudgetAccountant>,
        ledger: Arc<dyn LedgerSink>,
        policy: Arc<dyn PolicySnapshotSource>,
        cas: Arc<dyn ReplayStore>,
        sentinel: Arc<dyn DivergenceRecorder>,
        clock: Arc<dyn Clock>,
        max_output_bytes: usize,
    ) -> Self {
        Self { registry, budget, ledger, policy, cas, sentinel, clock, max_output_bytes }
    }

    /// Executes the eleven-step invocation pipeline.
    ///
    /// # Errors
    ///
    /// Returns an [`ErrorEnvelope`] for any step's failure mode; the error
    /// kind identifies which step failed (spec §4.5's numbered list).
    pub async fn call(
        &self,
        name: &str,
        version: Option<SemVer>,
        input: Value,
        ctx: &InvocationContext,
    ) -> Result<CallOutcome, ErrorEnvelope> {
        let now = self.clock.now_millis();

        // 1. Tool lookup.
        let definition = self
            .registry
            .resolve(name, version)
            .map_err(|err| registry_error_envelope(&err, "tool_lookup", Severity::Warning, now))?;

        // 2. Recursion bound.
        if ctx.depth > MAX_DEPTH {
            return Err(ErrorEnvelope::new(
                ErrorKind::InvariantViolation,
                format!("recursion depth {} exceeds the bound of {MAX_DEPTH}", ctx.depth),
                Severity::Critical,
                false,
                now,
            )
            .with_phase("recursion_bound"));
        }

        // 3. Tenant scope.
        if definition.flags.tenant_scoped && ctx.tenant_id.is_empty() {
            return Err(ErrorEnvelope::new(
                ErrorKind::Unauthorized,
                "tool is tenant-scoped but the calling context carries no tenant",
                Severity::Error,
                false,
                now,
            )
            .with_phase("tenant_scope"));
        }

        // 4. RBAC.
        if definition.flags.side_effect && !ctx.role.satisfies(Role::Member) {
            return Err(ErrorEnvelope::new(
                ErrorKind::Forbidden,
                "side-effecting tools require at least member role",
                Severity::Error,
                false,
                now,
            )
            .with_phase("rbac"));
        }

        // 5. Budget reservation.
        let reservation = if definition.flags.tenant_scoped && definition.cost.cost_units > 0 {
            let reservation = self
                .budget
                .reserve(&ctx.tenant_id, definition.cost.cost_units, now)
                .map_err(|err| budget_error_envelope(err, now))?;
            Some(reservation)
        } else {
            None
        };

        // input_fingerprint is computed before input moves into the pipeline.
        let input_fingerprint = hash_canonical(&input).map_err(|err| {
            ErrorEnvelope::new(
                ErrorKind::InternalError,
                format!("failed to fingerprint input: {err}"),
                Severity::Critical,
                false,
                now,
            )
            .with_phase("persist_envelope")
        })?;

        // 6-9. Input validation, handler execution, output size, output validation.
        let pipeline = self.run_pipeline(&definition, input, ctx).await;

        // 10. Budget reconciliation.
        let actual_cost = match &pipeline {
            Ok(success) => cost_units_for_latency(success.duration_ms),
            Err(failure) if failure.handler_ran => cost_units_for_latency(failure.duration_ms),
            Err(_) => 0,
        };
        if let Some(reservation) = &reservation {
            self.budget.reconcile(reservation, actual_cost);
        }

        let success = pipeline.map_err(|failure| failure.envelope)?;

        // 11. Persist envelope, ledger entry, economic event.
        self.persist(&definition, ctx, &input_fingerprint, success)
    }

    /// Runs steps 6 through 9 against an already-reserved budget.
    async fn run_pipeline(
        &self,
        definition: &ToolDefinition,
        input: Value,
        ctx: &InvocationContext,
    ) -> Result<PipelineSuccess, PipelineFailure> {
        // 6. Input validation.
        if let Err(message) = validate_against_schema(&definition.input_schema, &input) {
            return Err(PipelineFailure {
                envelope: ErrorEnvelope::new(
                    ErrorKind::ValidationFailed,
                    format!("input failed schema validation: {message}"),
                    Severity::Error,
                    false,
                    self.clock.now_millis(),
                )
                .with_phase("input_validation"),
                handler_ran: false,
                duration_ms: 0,
            });
        }

        // 7. Handler execution.
        let handler =
            self.registry.resolve_handler(&definition.name, definition.version).map_err(|err| {
                PipelineFailure {
                    envelope: registry_error_envelope(
                        &err,
                        "handler_resolution",
                        Severity::Critical,
                        self.clock.now_millis(),
                    ),
                    handler_ran: false,
                    duration_ms: 0,
                }
            })?;

        let started_at = self.clock.now_millis();
        let handler_result = handler.call(input, ctx).await;
        let duration_ms =
            u64::try_from(self.clock.elapsed_since(started_at).max(0)).unwrap_or(u64::MAX);

        let raw_output = handler_result
            .map_err(|envelope| PipelineFailure { envelope, handler_ran: true, duration_ms })?;

        // 8. Output size check.
        let limited = match limiter::limit_output(raw_output, self.max_output_bytes) {
            Ok((value, _outcome)) => value,
            Err(LimiterError::NotTruncatable { actual, limit }) => {
                return Err(PipelineFailure {
                    envelope: ErrorEnvelope::new(
                        ErrorKind::ToolOutputTooLarge,
                        format!(
                            "output of {actual} bytes exceeds the {limit} byte limit and cannot be truncated"
                        ),
                        Severity::Error,
                        false,
                        self.clock.now_millis(),
                    )
                    .with_phase("output_size_check"),
                    handler_ran: true,
                    duration_ms,
                });
            }
        };

        // 9. Output validation.
        if let Err(message) = validate_against_schema(&definition.output_schema, &limited) {
            return Err(PipelineFailure {
                envelope: ErrorEnvelope::new(
                    ErrorKind::InternalError,
                    format!(
                        "tool {} produced output violating its declared schema: {message}",
                        definition.name
                    ),
                    Severity::Critical,
                    false,
                    self.clock.now_millis(),
                )
                .with_phase("output_validation"),
                handler_ran: true,
                duration_ms,
            });
        }

        Ok(PipelineSuccess { result: limited, duration_ms })
    }

    /// Step 11: builds the replay envelope, appends the ledger entry and
    /// economic event, and returns the call's final outcome.
    fn persist(
        &self,
        definition: &ToolDefinition,
        ctx: &InvocationContext,
        input_fingerprint: &str,
        success: PipelineSuccess,
    ) -> Result<CallOutcome, ErrorEnvelope> {
        let now = self.clock.now_millis();
        let output_digest = hash_canonical(&success.result).map_err(|err| {
            ErrorEnvelope::new(
                ErrorKind::InternalError,
                format!("failed to digest tool output: {err}"),
                Severity::Critical,
                false,
                now,
            )
            .with_phase("persist_envelope")
        })?;
        let policy_snapshot_hash = self.policy.policy_snapshot_hash();
        let run_id = RunId::new(format!("{}-{}", ctx.request_id.as_str(), definition.name));

        let envelope = ReplayEnvelope::build(
            run_id.clone(),
            ctx.tenant_id.clone(),
            definition.name.clone(),
            definition.version.to_string(),
            input_fingerprint.to_string(),
            output_digest,
            policy_snapshot_hash,
            false,
            definition.flags.deterministic,
            success.duration_ms,
            self.clock.now_iso(),
            ctx.request_id.clone(),
        )
        .map_err(|err| {
            ErrorEnvelope::new(
                ErrorKind::InternalError,
                format!("failed to build replay envelope: {err}"),
                Severity::Critical,
                false,
                now,
            )
            .with_phase("persist_envelope")
        })?;

        self.cas.put(envelope.clone());

        self.ledger.write_entry(LedgerEntry {
            id: envelope.hash.clone(),
            tenant_id: ctx.tenant_id.clone(),
            timestamp: now,
            event_type: LedgerEventType::ToolInvoked,
            description: format!("tool {}@{} invoked", definition.name, definition.version),
            metadata: json!({
                "request_id": ctx.request_id.as_str(),
                "tool_name": definition.name,
                "tool_version": definition.version.to_string(),
            }),
        });

        let cost_units = cost_units_for_latency(success.duration_ms);
        self.ledger.record_economic_event(EconomicEvent {
            tenant_id: ctx.tenant_id.clone(),
            run_id,
            event_type: EconomicEventType::ToolCost,
            resource_units: definition.cost.cost_units,
            cost_units,
            created_at: now,
        });

        Ok(CallOutcome {
            result: success.result,
            hash: envelope.hash,
            duration_ms: success.duration_ms,
            from_cache: false,
            deterministic: definition.flags.deterministic,
        })
    }

    /// Re-executes `definition` against `input` under `ctx` and compares the
    /// recomputed input fingerprint, active policy snapshot hash, and output
    /// digest against the envelope stored for `run_id`. A replay never
    /// reserves or reconciles budget; it is an operator/audit action, not a
    /// billable invocation.
    ///
    /// # Errors
    ///
    /// Returns [`ErrorKind::ReplayMismatch`] (critical, never retried) when
    /// no envelope is stored for `run_id`, or when any recomputed value
    /// diverges from it — in which case the divergence is also reported to
    /// the sentinel before this returns.
    pub async fn replay(
        &self,
        run_id: &RunId,
        definition: &ToolDefinition,
        input: Value,
        ctx: &InvocationContext,
        step_number: Option<usize>,
    ) -> Result<CallOutcome, ErrorEnvelope> {
        let now = self.clock.now_millis();
        let stored = self.cas.get(run_id).ok_or_else(|| {
            ErrorEnvelope::new(
                ErrorKind::ReplayMismatch,
                format!("no stored envelope for run {run_id}"),
                Severity::Critical,
                false,
                now,
            )
            .with_phase("replay")
        })?;

        let input_fingerprint = hash_canonical(&input).map_err(|err| {
            ErrorEnvelope::new(
                ErrorKind::InternalError,
                format!("failed to fingerprint replay input: {err}"),
                Severity::Critical,
                false,
                now,
            )
            .with_phase("replay")
        })?;

        let pipeline =
            self.run_pipeline(definition, input, ctx).await.map_err(|failure| failure.envelope)?;

        let output_digest = hash_canonical(&pipeline.result).map_err(|err| {
            ErrorEnvelope::new(
                ErrorKind::InternalError,
                format!("failed to digest replay output: {err}"),
                Severity::Critical,
                false,
                now,
            )
            .with_phase("replay")
        })?;
        let policy_snapshot_hash = self.policy.policy_snapshot_hash();
        let detected_at = self.clock.now_millis();

        if let Some(event) = detect_replay_divergence(
            &stored,
            format!("div-{run_id}-{detected_at}"),
            detected_at,
            step_number,
            &input_fingerprint,
            &policy_snapshot_hash,
            &output_digest,
        ) {
            let message =
                format!("replay of run {run_id} diverged: {}", event.divergence_type.as_str());
            self.sentinel.record(event);
            return Err(ErrorEnvelope::new(
                ErrorKind::ReplayMismatch,
                message,
                Severity::Critical,
                false,
                detected_at,
            )
            .with_phase("replay"));
        }

        Ok(CallOutcome {
            result: pipeline.result,
            hash: stored.hash.clone(),
            duration_ms: pipeline.duration_ms,
            from_cache: false,
            deterministic: stored.deterministic,
        })
    }
}

/// Validates `value` against `schema` under JSON Schema 2020-12.
fn validate_against_schema(schema: &Value, value: &Value) -> Result<(), String> {
    let compiled =
        jsonschema::options().with_draft(Draft::Draft202012).build(schema).map_err(|err| err.to_string())?;
    let messages: Vec<String> = compiled.iter_errors(value).map(|err| err.to_string()).collect();
    if messages.is_empty() { Ok(()) } else { Err(messages.join("; ")) }
}

/// Wraps a [`RegistryError`] in an [`ErrorEnvelope`] tagged `INTERNAL_ERROR`
/// per spec §4.5 step 1.
fn registry_error_envelope(
    err: &RegistryError,
    phase: &'static str,
    severity: Severity,
    now: i64,
) -> ErrorEnvelope {
    ErrorEnvelope::new(ErrorKind::InternalError, err.to_string(), severity, false, now)
        .with_phase(phase)
}

/// Wraps a [`BudgetError`] in an [`ErrorEnvelope`] tagged `BUDGET_EXCEEDED`.
fn budget_error_envelope(err: BudgetError, now: i64) -> ErrorEnvelope {
    ErrorEnvelope::new(ErrorKind::BudgetExceeded, err.to_string(), Severity::Error, false, now)
        .with_phase("budget_reservation")
}
