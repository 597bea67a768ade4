//! # Clock Sources
//!
//! Deadlines in PAWN are compared against a [`Clock`] at the moment an
//! operation is submitted. There are no timers: an overdue loan stays
//! `Active` until somebody submits a seizure.
//!
//! Timestamps are unix seconds (`i64`), the unit ledgers expose to
//! programs.

use std::sync::atomic::{AtomicI64, Ordering};

use chrono::Utc;

/// Source of the current timestamp.
pub trait Clock: Send + Sync {
    /// Current time in unix seconds.
    fn now(&self) -> i64;
}

/// Wall-clock time from the host.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> i64 {
        Utc::now().timestamp()
    }
}

/// A clock that only moves when told to. Never goes backwards.
#[derive(Debug, Default)]
pub struct ManualClock {
    now: AtomicI64,
}

impl ManualClock {
    /// Creates a clock reading `start`.
    pub fn new(start: i64) -> Self {
        Self {
            now: AtomicI64::new(start),
        }
    }

    /// Moves the clock forward by `secs`. Returns the new reading.
    pub fn advance(&self, secs: u64) -> i64 {
        let delta = i64::try_from(secs).unwrap_or(i64::MAX);
        let previous = self
            .now
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |t| {
                Some(t.saturating_add(delta))
            })
            .unwrap_or_else(|t| t);
        previous.saturating_add(delta)
    }

    /// Sets the clock to `timestamp` if that is not in the past.
    /// Returns the reading after the call.
    pub fn set(&self, timestamp: i64) -> i64 {
        self.now.fetch_max(timestamp, Ordering::SeqCst).max(timestamp)
    }
}

impl Clock for ManualClock {
    fn now(&self) -> i64 {
        self.now.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn manual_clock_advances() {
        let clock = ManualClock::new(1_000);
        assert_eq!(clock.now(), 1_000);
        assert_eq!(clock.advance(86_400), 87_400);
        assert_eq!(clock.now(), 87_400);
    }

    #[test]
    fn manual_clock_never_goes_backwards() {
        let clock = ManualClock::new(1_000);
        assert_eq!(clock.set(500), 1_000);
        assert_eq!(clock.now(), 1_000);
        assert_eq!(clock.set(2_000), 2_000);
        assert_eq!(clock.now(), 2_000);
    }

    #[test]
    fn manual_clock_saturates() {
        let clock = ManualClock::new(i64::MAX - 1);
        assert_eq!(clock.advance(10), i64::MAX);
    }

    #[test]
    fn system_clock_is_after_2024() {
        assert!(SystemClock.now() > 1_700_000_000);
    }
}
