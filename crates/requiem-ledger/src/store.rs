// crates/requiem-ledger/src/store.rs
// ============================================================================
// Module: In-Memory Ledger Store
// Description: Append-only LedgerSink backing the invocation gate's audit
//              trail and per-invocation economic events.
// Purpose: Satisfy the append-only ledger contract spec §4.9 describes,
//          in-process and without a durable backing store (the persistent
//          repository behind it is named as an external collaborator).
// Dependencies: parking_lot, requiem_core, requiem_registry::gate
// ============================================================================

//! ## Overview
//! [`InMemoryLedger`] is the concrete [`LedgerSink`] the invocation gate
//! writes through. Rows are never rewritten or removed once appended;
//! [`InMemoryLedger::record`] is the convenience entry point spec §4.9's
//! ledger-write step describes, minting a fresh id and stamping the current
//! time before appending. A monotonic counter keeps ids distinct even under
//! a frozen clock, where `now_millis()` repeats across calls.

use std::sync::atomic::AtomicU64;
use std::sync::atomic::Ordering;

use parking_lot::Mutex;
use requiem_core::hashing::hash_bytes;
use requiem_core::identifiers::RunId;
use requiem_core::identifiers::TenantId;
use requiem_core::ledger::EconomicEvent;
use requiem_core::ledger::EconomicEventType;
use requiem_core::ledger::LedgerEntry;
use requiem_core::ledger::LedgerEventType;
use requiem_core::ledger::cost_units_for_latency;
use requiem_core::time::Clock;
use requiem_registry::gate::LedgerSink;
use serde_json::Value;

/// Append-only, in-process [`LedgerSink`] implementation.
///
/// # Invariants
/// - Rows are only ever pushed, never removed or rewritten.
pub struct InMemoryLedger {
    entries: Mutex<Vec<LedgerEntry>>,
    economic_events: Mutex<Vec<EconomicEvent>>,
    fresh_id_counter: AtomicU64,
}

impl Default for InMemoryLedger {
    fn default() -> Self {
        Self {
            entries: Mutex::new(Vec::new()),
            economic_events: Mutex::new(Vec::new()),
            fresh_id_counter: AtomicU64::new(0),
        }
    }
}

impl InMemoryLedger {
    /// Creates an empty ledger.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds and appends a fresh entry, stamping `timestamp` from `clock`
    /// and minting an id from a monotonic counter plus the entry's own
    /// content, so repeated calls under a frozen clock still get distinct
    /// ids.
    pub fn record(
        &self,
        clock: &dyn Clock,
        tenant_id: TenantId,
        event_type: LedgerEventType,
        description: impl Into<String>,
        metadata: Value,
    ) -> LedgerEntry {
        let description = description.into();
        let timestamp = clock.now_millis();
        let sequence = self.fresh_id_counter.fetch_add(1, Ordering::SeqCst);
        let id = hash_bytes(
            format!("{}:{timestamp}:{sequence}:{description}", tenant_id.as_str()).as_bytes(),
        );
        let entry = LedgerEntry { id, tenant_id, timestamp, event_type, description, metadata };
        self.write_entry(entry.clone());
        entry
    }

    /// Records a cost event for one invocation; `cost_units` follows spec
    /// §4.9's `max(1, ceil(latencyMs/100))` rule.
    pub fn record_execution_cost(
        &self,
        clock: &dyn Clock,
        tenant_id: TenantId,
        run_id: RunId,
        event_type: EconomicEventType,
        resource_units: u64,
        latency_ms: u64,
    ) -> EconomicEvent {
        let event = EconomicEvent {
            tenant_id,
            run_id,
            event_type,
            resource_units,
            cost_units: cost_units_for_latency(latency_ms),
            created_at: clock.now_millis(),
        };
        self.record_economic_event(event.clone());
        event
    }

    /// Returns every entry recorded for `tenant_id`, in append order.
    #[must_use]
    pub fn entries_for_tenant(&self, tenant_id: &TenantId) -> Vec<LedgerEntry> {
        self.entries.lock().iter().filter(|entry| &entry.tenant_id == tenant_id).cloned().collect()
    }

    /// Returns every economic event recorded for `tenant_id`, in append
    /// order.
    #[must_use]
    pub fn economic_events_for_tenant(&self, tenant_id: &TenantId) -> Vec<EconomicEvent> {
        self.economic_events
            .lock()
            .iter()
            .filter(|event| &event.tenant_id == tenant_id)
            .cloned()
            .collect()
    }

    /// Total number of entries recorded across all tenants.
    #[must_use]
    pub fn entry_count(&self) -> usize {
        self.entries.lock().len()
    }
}

impl LedgerSink for InMemoryLedger {
    fn write_entry(&self, entry: LedgerEntry) {
        self.entries.lock().push(entry);
    }

    fn record_economic_event(&self, event: EconomicEvent) {
        self.economic_events.lock().push(event);
    }
}

#[cfg(test)]
mod tests {
    use requiem_core::ledger::EconomicEventType;
    use requiem_core::ledger::LedgerEventType;
    use requiem_core::time::FrozenClock;
    use serde_json::json;

    use super::InMemoryLedger;
    use requiem_core::identifiers::RunId;
    use requiem_core::identifiers::TenantId;

    #[test]
    fn record_appends_and_is_queryable_by_tenant() {
        let ledger = InMemoryLedger::new();
        let clock = FrozenClock::new(1_000);
        let tenant = TenantId::new("t1");
        ledger.record(
            &clock,
            tenant.clone(),
            LedgerEventType::ToolInvoked,
            "tool ran",
            json!({"ok": true}),
        );
        let entries = ledger.entries_for_tenant(&tenant);
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].timestamp, 1_000);
        assert_eq!(ledger.entry_count(), 1);
    }

    #[test]
    fn repeated_records_under_a_frozen_clock_get_distinct_ids() {
        let ledger = InMemoryLedger::new();
        let clock = FrozenClock::new(1_000);
        let tenant = TenantId::new("t1");
        let first = ledger.record(
            &clock,
            tenant.clone(),
            LedgerEventType::ToolInvoked,
            "same description",
            json!(null),
        );
        let second = ledger.record(
            &clock,
            tenant,
            LedgerEventType::ToolInvoked,
            "same description",
            json!(null),
        );
        assert_ne!(first.id, second.id);
    }

    #[test]
    fn execution_cost_follows_the_latency_billing_rule() {
        let ledger = InMemoryLedger::new();
        let clock = FrozenClock::new(0);
        let tenant = TenantId::new("t1");
        let event = ledger.record_execution_cost(
            &clock,
            tenant.clone(),
            RunId::new("r1"),
            EconomicEventType::ToolCost,
            1,
            250,
        );
        assert_eq!(event.cost_units, 3);
        assert_eq!(ledger.economic_events_for_tenant(&tenant).len(), 1);
    }

    #[test]
    fn tenants_do_not_see_each_others_entries() {
        let ledger = InMemoryLedger::new();
        let clock = FrozenClock::new(0);
        ledger.record(&clock, TenantId::new("t1"), LedgerEventType::ToolInvoked, "a", json!(null));
        ledger.record(&clock, TenantId::new("t2"), LedgerEventType::ToolInvoked, "b", json!(null));
        assert_eq!(ledger.entries_for_tenant(&TenantId::new("t1")).len(), 1);
        assert_eq!(ledger.entries_for_tenant(&TenantId::new("t2")).len(), 1);
        assert_eq!(ledger.entry_count(), 2);
    }
}
