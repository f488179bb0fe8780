// crates/requiem-registry/src/budget.rs
// ============================================================================
// Module: Budget Accountant
// Description: Per-tenant windowed cost budget with atomic reserve/reconcile.
// Purpose: Enforce gate steps 5 and 10 (spec §4.5): pre-debit an estimate
//          before the handler runs, then reconcile to actual cost after.
// Dependencies: parking_lot, requiem_core::budget
// ============================================================================

//! ## Overview
//! Each tenant gets its own [`parking_lot::Mutex`] guarding a
//! [`BudgetState`]; fairness is serial within a tenant and unordered across
//! tenants (spec §4.5 "budget mutex discipline"). Readers of
//! [`BudgetAccountant::state`] take the same mutex, so a concurrent reader
//! never observes a torn `(used, limit)` pair.

use std::collections::BTreeMap;

use parking_lot::Mutex;
use parking_lot::RwLock;
use requiem_core::budget::BudgetLimit;
use requiem_core::budget::BudgetState;
use requiem_core::identifiers::TenantId;

/// A reservation handle returned by a successful [`BudgetAccountant::reserve`].
/// Dropping it without calling [`BudgetAccountant::reconcile`] leaves the
/// estimate debited; callers must always reconcile, including on handler
/// failure (reconciling to the original estimate is a no-op adjustment).
#[derive(Debug, Clone)]
pub struct Reservation {
    /// Tenant the reservation was made against.
    pub tenant_id: TenantId,
    /// Cost units pre-debited as an estimate.
    pub estimate: u64,
}

/// Errors raised while reserving budget.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum BudgetError {
    /// Reserving `estimate` more would exceed the tenant's window limit.
    #[error("budget exceeded: used {used} + estimate {estimate} > limit {limit}")]
    Exceeded {
        /// Cost units already used in the current window.
        used: u64,
        /// Cost units this reservation would add.
        estimate: u64,
        /// The tenant's window limit.
        limit: u64,
    },
}

/// Per-tenant windowed budget accountant.
pub struct BudgetAccountant {
    limits: BTreeMap<String, BudgetLimit>,
    default_limit: BudgetLimit,
    states: RwLock<BTreeMap<String, Mutex<BudgetState>>>,
}

impl BudgetAccountant {
    /// Creates an accountant with a default limit applied to tenants with no
    /// explicit override.
    #[must_use]
    pub fn new(default_limit: BudgetLimit) -> Self {
        Self { limits: BTreeMap::new(), default_limit, states: RwLock::new(BTreeMap::new()) }
    }

    /// Overrides the limit for a specific tenant tier.
    pub fn set_tenant_limit(&mut self, tenant_id: &TenantId, limit: BudgetLimit) {
        self.limits.insert(tenant_id.as_str().to_string(), limit);
    }

    fn limit_for(&self, tenant_id: &TenantId) -> BudgetLimit {
        self.limits.get(tenant_id.as_str()).copied().unwrap_or(self.default_limit)
    }

    /// Runs `f` against `tenant_id`'s budget state, taking only a shared
    /// read lock on the tenant map when the tenant already has an entry —
    /// the common case, which lets concurrent tenants proceed without
    /// contending on each other. The exclusive write lock is taken only to
    /// insert a brand-new tenant's mutex, and is released before `f` runs.
    fn with_state<T>(
        &self,
        tenant_id: &TenantId,
        now_millis: i64,
        f: impl FnOnce(&mut BudgetState) -> T,
    ) -> T {
        if let Some(entry) = self.states.read().get(tenant_id.as_str()) {
            let mut state = entry.lock();
            if state.window_has_elapsed(now_millis) {
                state.roll_window(now_millis);
            }
            return f(&mut state);
        }
        let limit = self.limit_for(tenant_id);
        let mut guard = self.states.write();
        let entry = guard
            .entry(tenant_id.as_str().to_string())
            .or_insert_with(|| Mutex::new(BudgetState::new(limit, now_millis)));
        let mut state = entry.lock();
        if state.window_has_elapsed(now_millis) {
            state.roll_window(now_millis);
        }
        f(&mut state)
    }

    /// Returns a snapshot of `(used, limit)` for `tenant_id`, taking the
    /// same per-tenant mutex a concurrent reservation would.
    #[must_use]
    pub fn state(&self, tenant_id: &TenantId, now_millis: i64) -> BudgetState {
        self.with_state(tenant_id, now_millis, |state| *state)
    }

    /// Reserves `estimate` cost units for `tenant_id`, rolling the window if
    /// it has elapsed.
    ///
    /// # Errors
    ///
    /// Returns [`BudgetError::Exceeded`] when the reservation would push
    /// `used` above the tenant's limit.
    pub fn reserve(
        &self,
        tenant_id: &TenantId,
        estimate: u64,
        now_millis: i64,
    ) -> Result<Reservation, BudgetError> {
        self.with_state(tenant_id, now_millis, |state| {
            if state.would_exceed(estimate) {
                return Err(BudgetError::Exceeded {
                    used: state.used_cost_units,
                    estimate,
                    limit: state.limit.max_cost_units,
                });
            }
            state.used_cost_units += estimate;
            Ok(Reservation { tenant_id: tenant_id.clone(), estimate })
        })
    }

    /// Reconciles a prior reservation to the actual cost incurred,
    /// clamping any negative adjustment to zero.
    pub fn reconcile(&self, reservation: &Reservation, actual_cost: u64) {
        let guard = self.states.read();
        let Some(entry) = guard.get(reservation.tenant_id.as_str()) else { return };
        let mut state = entry.lock();
        let delta = i128::from(actual_cost) - i128::from(reservation.estimate);
        let adjusted = i128::from(state.used_cost_units) + delta;
        state.used_cost_units = u64::try_from(adjusted.max(0)).unwrap_or(0);
    }
}
