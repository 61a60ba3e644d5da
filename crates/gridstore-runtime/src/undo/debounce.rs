#![forbid(unsafe_code)]

//! Cancellable deferred task with last-write-wins rearming.
//!
//! A [`Debouncer`] does not own a timer thread. It records a deadline; the
//! owner checks it from its cooperative tick (`Store::poll`) and fires the
//! deferred work once the deadline has passed.

use web_time::{Duration, Instant};

/// State of the deferred task.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DebounceState {
    Idle,
    Pending { deadline: Instant },
}

/// A deadline that restarts on every trigger.
#[derive(Debug, Clone)]
pub struct Debouncer {
    window: Duration,
    state: DebounceState,
}

impl Debouncer {
    #[must_use]
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            state: DebounceState::Idle,
        }
    }

    #[must_use]
    pub fn window(&self) -> Duration {
        self.window
    }

    #[must_use]
    pub fn state(&self) -> DebounceState {
        self.state
    }

    #[must_use]
    pub fn is_pending(&self) -> bool {
        matches!(self.state, DebounceState::Pending { .. })
    }

    /// Arm (or re-arm) the task to fire one window after `now`.
    pub fn schedule(&mut self, now: Instant) {
        self.state = DebounceState::Pending {
            deadline: now + self.window,
        };
    }

    /// Drop any pending fire.
    pub fn cancel(&mut self) -> bool {
        let was_pending = self.is_pending();
        self.state = DebounceState::Idle;
        was_pending
    }

    /// Whether the deadline has passed.
    #[must_use]
    pub fn is_due(&self, now: Instant) -> bool {
        match self.state {
            DebounceState::Pending { deadline } => now >= deadline,
            DebounceState::Idle => false,
        }
    }

    /// Consume the pending fire if it is due.
    pub fn take_due(&mut self, now: Instant) -> bool {
        if self.is_due(now) {
            self.state = DebounceState::Idle;
            true
        } else {
            false
        }
    }

    /// Consume the pending fire regardless of the deadline.
    pub fn take_pending(&mut self) -> bool {
        self.cancel()
    }
}
