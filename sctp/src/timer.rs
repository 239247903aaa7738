//! One-shot association timers (delayed SACK, autoclose).
//!
//! A timer only tracks its deadline; whoever drives the association polls
//! [`Timer::expired`] and runs the expiry action.

use std::time::{Duration, Instant};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Timer {
    timeout: Duration,
    deadline: Option<Instant>,
}

impl Timer {
    pub fn new(timeout: Duration) -> Self {
        Self {
            timeout,
            deadline: None,
        }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn set_timeout(&mut self, timeout: Duration) {
        self.timeout = timeout;
    }

    pub fn is_pending(&self) -> bool {
        self.deadline.is_some()
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Sets the deadline to `now + timeout`, re-arming if already pending.
    /// Returns true if the timer was idle before.
    pub fn arm(&mut self, now: Instant) -> bool {
        let was_idle = self.deadline.is_none();
        self.deadline = Some(now + self.timeout);
        was_idle
    }

    /// Returns true if a pending deadline was cancelled.
    pub fn disarm(&mut self) -> bool {
        self.deadline.take().is_some()
    }

    /// True once the deadline has passed. Does not disarm.
    pub fn expired(&self, now: Instant) -> bool {
        self.deadline.is_some_and(|deadline| now >= deadline)
    }
}
