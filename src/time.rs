//! Monotonic time sources for arrival stamping and recovery timing.
//!
//! The jitter buffer never reads wall-clock time: everything is microseconds
//! on a local monotonic clock. [`ManualClock`] exists so tests and offline
//! simulations can drive the continuity window and the recovery timeout
//! deterministically.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

/// A monotonic microsecond clock.
pub trait TimeSource: Send + Sync {
    /// Microseconds elapsed since some fixed origin.
    fn now_micros(&self) -> u64;
}

/// Wall-time backed clock, anchored at its creation instant.
pub struct MonotonicClock {
    start: Instant,
}

impl MonotonicClock {
    pub fn new() -> Self {
        Self {
            start: Instant::now(),
        }
    }
}

impl Default for MonotonicClock {
    fn default() -> Self {
        Self::new()
    }
}

impl TimeSource for MonotonicClock {
    fn now_micros(&self) -> u64 {
        self.start.elapsed().as_micros() as u64
    }
}

/// A clock that only moves when told to.
pub struct ManualClock {
    micros: AtomicU64,
}

impl ManualClock {
    pub fn new() -> Self {
        Self {
            micros: AtomicU64::new(0),
        }
    }

    pub fn advance_micros(&self, delta: u64) {
        self.micros.fetch_add(delta, Ordering::Release);
    }

    pub fn advance_millis(&self, delta: u64) {
        self.advance_micros(delta * 1000);
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new()
    }
}

impl TimeSource for ManualClock {
    fn now_micros(&self) -> u64 {
        self.micros.load(Ordering::Acquire)
    }
}
