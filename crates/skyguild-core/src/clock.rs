//! Wall-clock access for the session.
//!
//! Every instant the core records (timer anchors, save timestamps) is an
//! epoch-millisecond `i64` obtained through the [`Clock`] trait, so tests
//! and offline simulations can substitute a [`ManualClock`].
//!
//! Clocks may go backwards (system time adjustments, a save copied from
//! another machine). [`elapsed_ms`] saturates at zero in that case, so a
//! backwards jump never manufactures progress.

use std::sync::atomic::{AtomicI64, Ordering};

use chrono::Utc;

/// A source of wall-clock time.
pub trait Clock: Send + Sync {
    /// Current time in epoch milliseconds.
    fn now_ms(&self) -> i64;
}

/// The real system clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_ms(&self) -> i64 {
        Utc::now().timestamp_millis()
    }
}

/// A clock that only moves when told to.
///
/// Interior mutability lets a test hold a shared reference while the code
/// under test reads it.
#[derive(Debug, Default)]
pub struct ManualClock {
    now: AtomicI64,
}

impl ManualClock {
    /// Create a clock frozen at `start_ms`.
    pub const fn new(start_ms: i64) -> Self {
        Self {
            now: AtomicI64::new(start_ms),
        }
    }

    /// Jump to an absolute instant (may move backwards).
    pub fn set(&self, now_ms: i64) {
        self.now.store(now_ms, Ordering::Release);
    }

    /// Move forward by `delta_ms`, saturating at `i64::MAX`.
    pub fn advance(&self, delta_ms: u64) {
        let delta = i64::try_from(delta_ms).unwrap_or(i64::MAX);
        // The closure always returns `Some`, so the update cannot fail.
        let _ = self
            .now
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |now| {
                Some(now.saturating_add(delta))
            });
    }
}

impl Clock for ManualClock {
    fn now_ms(&self) -> i64 {
        self.now.load(Ordering::Acquire)
    }
}

/// Milliseconds from `from` to `to`, or 0 if `to` is not after `from`.
pub const fn elapsed_ms(from: i64, to: i64) -> u64 {
    let diff = to.saturating_sub(from);
    if diff <= 0 { 0 } else { diff.unsigned_abs() }
}
