#![forbid(unsafe_code)]

//! Time sources for cooperative scheduling.
//!
//! Debounce windows and other deferred work read time through the [`Clock`]
//! trait. Production code uses [`SystemClock`]; tests drive a [`LabClock`]
//! by hand so that every timing-dependent outcome is reproducible.
//!
//! # Example
//!
//! ```
//! use gridstore_core::clock::{Clock, LabClock};
//! use web_time::Duration;
//!
//! let clock = LabClock::new();
//! let start = clock.now();
//! clock.advance(Duration::from_millis(200));
//! assert_eq!(clock.now() - start, Duration::from_millis(200));
//! ```

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use web_time::{Duration, Instant};

/// Source of monotonic time.
pub trait Clock {
    /// Current instant.
    fn now(&self) -> Instant;
}

/// Wall-clock time via `web_time::Instant::now()`.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

/// A manually-advanceable clock for deterministic tests.
///
/// Clones share the same time: advancing one advances all.
#[derive(Clone)]
pub struct LabClock {
    epoch: Instant,
    offset_us: Arc<AtomicU64>,
}

impl LabClock {
    /// Create a new lab clock starting at `Instant::now()`.
    #[must_use]
    pub fn new() -> Self {
        Self {
            epoch: Instant::now(),
            offset_us: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Advance the lab clock by `delta`.
    pub fn advance(&self, delta: Duration) {
        let us = delta.as_micros().min(u64::MAX as u128) as u64;
        self.offset_us.fetch_add(us, Ordering::Release);
    }

    /// Advance by a whole number of milliseconds.
    pub fn advance_ms(&self, ms: u64) {
        self.advance(Duration::from_millis(ms));
    }

    /// Time elapsed since the clock was created.
    #[must_use]
    pub fn elapsed(&self) -> Duration {
        Duration::from_micros(self.offset_us.load(Ordering::Acquire))
    }
}

impl Clock for LabClock {
    fn now(&self) -> Instant {
        self.epoch + self.elapsed()
    }
}

impl Default for LabClock {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for LabClock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LabClock")
            .field("elapsed", &self.elapsed())
            .finish()
    }
}
