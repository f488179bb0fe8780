// crates/requiem-core/src/time.rs
// ============================================================================
// Module: Requiem Clock
// Description: Abstract time sources for deterministic replay.
// Purpose: Let core code read time only through an injected Clock, so seeded
//          and frozen clocks make replay (and timeouts) deterministic.
// Dependencies: std::time, time (formatting)
// ============================================================================

//! ## Overview
//! Core code never calls `SystemTime::now()` or `Instant::now()` directly;
//! it is handed a `Clock` at construction and reads time only through it.
//! Four variants are provided: [`SystemClock`] (real wall time),
//! [`SeededClock`] (advances by a fixed step each call), [`FrozenClock`]
//! (never advances), and [`OffsetClock`] (wraps another clock with a fixed
//! delta). This mirrors `decision-gate-core/src/core/time.rs`'s posture that
//! the core never reads wall-clock time directly, generalized here into an
//! injectable trait since Requiem's replay envelopes need `now()` at several
//! call sites (budget windows, timeouts, ledger timestamps) rather than only
//! caller-supplied trigger timestamps.

use std::sync::atomic::AtomicI64;
use std::sync::atomic::Ordering;

use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;

/// A source of time for deterministic replay.
///
/// # Invariants
/// - `now_millis` is monotonically non-decreasing for a given clock
///   instance (seeded and frozen clocks enforce this trivially).
pub trait Clock: Send + Sync {
    /// Returns the current time in Unix epoch milliseconds.
    fn now_millis(&self) -> i64;

    /// Returns the current time as an RFC 3339 string.
    fn now_iso(&self) -> String {
        millis_to_iso(self.now_millis())
    }

    /// Returns milliseconds elapsed since `since`.
    fn elapsed_since(&self, since: i64) -> i64 {
        self.now_millis() - since
    }
}

/// Converts Unix epoch milliseconds to an RFC 3339 string.
///
/// Falls back to a zeroed epoch timestamp if the value is out of the
/// representable range; this only happens for pathological millisecond
/// values far outside any real or seeded clock's operating range.
fn millis_to_iso(millis: i64) -> String {
    let seconds = millis.div_euclid(1000);
    let sub_millis = millis.rem_euclid(1000);
    let nanos = sub_millis * 1_000_000;
    OffsetDateTime::from_unix_timestamp(seconds)
        .ok()
        .and_then(|dt| dt.replace_nanosecond(nanos.try_into().unwrap_or(0)).ok())
        .and_then(|dt| dt.format(&Rfc3339).ok())
        .unwrap_or_else(|| "1970-01-01T00:00:00Z".to_string())
}

/// Real wall-clock time via `SystemTime`.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_millis(&self) -> i64 {
        let now = std::time::SystemTime::now();
        match now.duration_since(std::time::UNIX_EPOCH) {
            Ok(duration) => i64::try_from(duration.as_millis()).unwrap_or(i64::MAX),
            Err(_) => 0,
        }
    }
}

/// A clock that never advances, always returning the same instant.
///
/// # Invariants
/// - `now_millis()` returns the same value for the lifetime of the clock.
#[derive(Debug, Clone, Copy)]
pub struct FrozenClock {
    frozen_at: i64,
}

impl FrozenClock {
    /// Creates a clock frozen at the given millisecond instant.
    #[must_use]
    pub const fn new(frozen_at: i64) -> Self {
        Self { frozen_at }
    }
}

impl Clock for FrozenClock {
    fn now_millis(&self) -> i64 {
        self.frozen_at
    }
}

/// A clock that advances by a fixed step on every call.
///
/// # Invariants
/// - Each call to `now_millis` returns a value strictly greater than (or
///   equal to, when `step_millis` is zero) the previous call's value.
#[derive(Debug)]
pub struct SeededClock {
    current: AtomicI64,
    step_millis: i64,
}

impl SeededClock {
    /// Creates a seeded clock starting at `start_millis`, advancing by
    /// `step_millis` (default 1 ms when constructed via [`Self::default_step`]).
    #[must_use]
    pub const fn new(start_millis: i64, step_millis: i64) -> Self {
        Self { current: AtomicI64::new(start_millis), step_millis }
    }

    /// Creates a seeded clock with the default 1 ms step.
    #[must_use]
    pub const fn default_step(start_millis: i64) -> Self {
        Self::new(start_millis, 1)
    }
}

impl Clock for SeededClock {
    fn now_millis(&self) -> i64 {
        let previous = self.current.fetch_add(self.step_millis, Ordering::SeqCst);
        previous
    }
}

/// A clock that wraps another clock, applying a fixed offset.
pub struct OffsetClock<'a> {
    inner: &'a dyn Clock,
    offset_millis: i64,
}

impl<'a> OffsetClock<'a> {
    /// Wraps `inner`, adding `offset_millis` to every reading.
    #[must_use]
    pub const fn new(inner: &'a dyn Clock, offset_millis: i64) -> Self {
        Self { inner, offset_millis }
    }
}

impl Clock for OffsetClock<'_> {
    fn now_millis(&self) -> i64 {
        self.inner.now_millis() + self.offset_millis
    }
}

#[cfg(test)]
mod tests {
    use super::Clock;
    use super::FrozenClock;
    use super::OffsetClock;
    use super::SeededClock;

    #[test]
    fn frozen_clock_never_advances() {
        let clock = FrozenClock::new(1_000);
        assert_eq!(clock.now_millis(), 1_000);
        assert_eq!(clock.now_millis(), 1_000);
    }

    #[test]
    fn seeded_clock_advances_by_fixed_step() {
        let clock = SeededClock::default_step(0);
        assert_eq!(clock.now_millis(), 0);
        assert_eq!(clock.now_millis(), 1);
        assert_eq!(clock.now_millis(), 2);
    }

    #[test]
    fn offset_clock_adds_delta() {
        let base = FrozenClock::new(1_000);
        let offset = OffsetClock::new(&base, 500);
        assert_eq!(offset.now_millis(), 1_500);
    }

    #[test]
    fn iso_format_is_rfc3339() {
        let clock = FrozenClock::new(1_700_000_000_000);
        let iso = clock.now_iso();
        assert!(iso.contains('T'));
        assert!(iso.ends_with('Z') || iso.contains('+'));
    }
}
