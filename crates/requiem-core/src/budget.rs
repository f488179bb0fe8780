// crates/requiem-core/src/budget.rs
// ============================================================================
// Module: Budget Shape
// Description: Per-tenant cost window and limit data carried by the
//              budget accountant.
// Purpose: Give requiem-registry::budget a plain data shape to reserve
//          against and reconcile, independent of the mutex discipline that
//          guards concurrent access.
// Dependencies: serde
// ============================================================================

//! ## Overview
//! [`BudgetLimit`] and [`BudgetState`] are pure data; the reservation and
//! reconciliation *logic* (atomic check-then-reserve under a per-tenant
//! mutex, rollback on failed invocation) lives in `requiem-registry::budget`
//! per spec §4.6. This module only carries the window shape and the
//! window-rollover rule, since both the accountant and its tests need to
//! agree on what "exceeded" means without depending on the concurrency
//! machinery.

use serde::Deserialize;
use serde::Serialize;

/// A tenant's budget ceiling for one rolling window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BudgetLimit {
    /// Maximum cost units chargeable within one window.
    pub max_cost_units: u64,
    /// Window length in seconds.
    pub window_seconds: u64,
}

/// Mutable budget consumption tracked for one tenant.
///
/// # Invariants
/// - `used_cost_units` never exceeds `limit.max_cost_units` after a
///   successful reservation; the accountant enforces this atomically, this
///   type only carries the counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BudgetState {
    /// Cost units consumed so far in the current window.
    pub used_cost_units: u64,
    /// Unix epoch milliseconds the current window started.
    pub window_start: i64,
    /// The limit this state is tracked against.
    pub limit: BudgetLimit,
}

impl BudgetState {
    /// Creates a fresh, empty budget state starting at `now_millis`.
    #[must_use]
    pub const fn new(limit: BudgetLimit, now_millis: i64) -> Self {
        Self { used_cost_units: 0, window_start: now_millis, limit }
    }

    /// Returns true when `now_millis` has moved past the end of the current
    /// window, i.e. a rollover is due.
    #[must_use]
    pub fn window_has_elapsed(&self, now_millis: i64) -> bool {
        let window_millis = i64::try_from(self.limit.window_seconds.saturating_mul(1000))
            .unwrap_or(i64::MAX);
        now_millis.saturating_sub(self.window_start) >= window_millis
    }

    /// Resets consumption to zero and restarts the window at `now_millis`.
    pub fn roll_window(&mut self, now_millis: i64) {
        self.used_cost_units = 0;
        self.window_start = now_millis;
    }

    /// Returns true when reserving `units` more would exceed the limit.
    #[must_use]
    pub fn would_exceed(&self, units: u64) -> bool {
        self.used_cost_units.saturating_add(units) > self.limit.max_cost_units
    }
}

#[cfg(test)]
mod tests {
    use super::BudgetLimit;
    use super::BudgetState;

    fn limit() -> BudgetLimit {
        BudgetLimit { max_cost_units: 100, window_seconds: 60 }
    }

    #[test]
    fn fresh_state_does_not_exceed_within_limit() {
        let state = BudgetState::new(limit(), 0);
        assert!(!state.would_exceed(100));
        assert!(state.would_exceed(101));
    }

    #[test]
    fn window_rollover_is_detected_after_elapsed_seconds() {
        let state = BudgetState::new(limit(), 0);
        assert!(!state.window_has_elapsed(59_000));
        assert!(state.window_has_elapsed(60_000));
    }

    #[test]
    fn rolling_resets_usage_and_window_start() {
        let mut state = BudgetState::new(limit(), 0);
        state.used_cost_units = 50;
        state.roll_window(60_000);
        assert_eq!(state.used_cost_units, 0);
        assert_eq!(state.window_start, 60_000);
    }
}
