// crates/requiem-core/src/ledger.rs
// ============================================================================
// Module: Ledger & Economic Events
// Description: Append-only audit record shapes and per-call cost accounting.
// Purpose: Define the data that requiem-ledger stores and that the
//          invocation gate appends on every call.
// Dependencies: serde, crate::identifiers
// ============================================================================

//! ## Overview
//! Two record kinds live here: [`LedgerEntry`], a generic append-only audit
//! line, and [`EconomicEvent`], the per-invocation cost record the
//! invocation gate writes at gate step 11 (spec §4.5). Cost accrual follows
//! spec §4.7: `cost_units = max(1, ceil(latency_ms / 100))`.

use serde::Deserialize;
use serde::Serialize;
use serde_json::Value;

use crate::identifiers::RunId;
use crate::identifiers::TenantId;

/// Kind of event recorded in the ledger or as an economic event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LedgerEventType {
    /// A tool call completed (success or failure).
    ToolInvoked,
    /// A skill run completed (success, rollback, or failure).
    SkillRun,
    /// A decision was evaluated.
    DecisionEvaluated,
    /// A replay divergence was detected.
    DivergenceDetected,
    /// A budget reservation was denied.
    BudgetDenied,
}

/// One append-only audit line.
///
/// # Invariants
/// - Never mutated or deleted once appended; the store enforces
///   append-only semantics, this type only carries the shape.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LedgerEntry {
    /// Entry identifier, typically a `BLAKE3` digest of its own contents.
    pub id: String,
    /// Owning tenant.
    pub tenant_id: TenantId,
    /// Unix epoch milliseconds the entry was recorded.
    pub timestamp: i64,
    /// Kind of event this entry records.
    pub event_type: LedgerEventType,
    /// Human-readable summary.
    pub description: String,
    /// Structured metadata payload; sensitive keys are redacted by callers
    /// before this is constructed (see [`crate::error::sanitize_metadata`]).
    pub metadata: Value,
}

/// Resource cost accrued by one tool invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EconomicEventType {
    /// Cost charged for a completed tool call.
    ToolCost,
    /// Cost charged for a completed skill run (sum of its steps).
    SkillCost,
}

/// Per-invocation cost record appended at the end of the gate pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EconomicEvent {
    /// Owning tenant.
    pub tenant_id: TenantId,
    /// Run the cost is attributed to.
    pub run_id: RunId,
    /// Kind of cost event.
    pub event_type: EconomicEventType,
    /// Resource units consumed (tool-declared [`crate::tool::ToolCost`]).
    pub resource_units: u64,
    /// Billed cost units, derived from latency per [`cost_units_for_latency`].
    pub cost_units: u64,
    /// Unix epoch milliseconds the event was recorded.
    pub created_at: i64,
}

/// Computes billed cost units from latency: `max(1, ceil(latency_ms / 100))`.
#[must_use]
pub const fn cost_units_for_latency(latency_ms: u64) -> u64 {
    let billed = latency_ms.div_ceil(100);
    if billed == 0 { 1 } else { billed }
}

#[cfg(test)]
mod tests {
    use super::cost_units_for_latency;

    #[test]
    fn zero_latency_bills_minimum_one_unit() {
        assert_eq!(cost_units_for_latency(0), 1);
    }

    #[test]
    fn latency_rounds_up_to_next_hundred() {
        assert_eq!(cost_units_for_latency(1), 1);
        assert_eq!(cost_units_for_latency(100), 1);
        assert_eq!(cost_units_for_latency(101), 2);
        assert_eq!(cost_units_for_latency(250), 3);
    }
}
