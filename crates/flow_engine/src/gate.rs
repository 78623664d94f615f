//! Per-node frame counter with blocking waits.

use std::sync::{Condvar, Mutex};
use std::time::{Duration, Instant};

use contracts::FrameId;

use crate::lock;

/// Monotonic frame counter that callers can block on
#[derive(Debug, Default)]
pub struct FrameGate {
    counter: Mutex<FrameId>,
    advanced: Condvar,
}

impl FrameGate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn current(&self) -> FrameId {
        *lock(&self.counter)
    }

    /// Block while the counter is below `frame`; returns the counter seen on wake-up
    pub fn wait_for(&self, frame: FrameId) -> FrameId {
        let guard = lock(&self.counter);
        let guard = self
            .advanced
            .wait_while(guard, |counter| *counter < frame)
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        *guard
    }

    /// Like `wait_for`, but wakes every `interval` and reports the time waited so far
    pub fn wait_for_logged(
        &self,
        frame: FrameId,
        interval: Duration,
        mut on_wait: impl FnMut(Duration, FrameId),
    ) -> FrameId {
        let start = Instant::now();
        let mut guard = lock(&self.counter);
        while *guard < frame {
            let (next, timeout) = self
                .advanced
                .wait_timeout(guard, interval)
                .unwrap_or_else(std::sync::PoisonError::into_inner);
            guard = next;
            if timeout.timed_out() && *guard < frame {
                on_wait(start.elapsed(), *guard);
            }
        }
        *guard
    }

    /// Move the counter past `frame` (never backwards) and wake all waiters
    pub fn advance_past(&self, frame: FrameId) {
        let mut counter = lock(&self.counter);
        *counter = (*counter).max(frame.saturating_add(1));
        drop(counter);
        self.advanced.notify_all();
    }

    /// Move the counter to at least `frame` and wake all waiters
    pub fn ensure(&self, frame: FrameId) {
        let mut counter = lock(&self.counter);
        *counter = (*counter).max(frame);
        drop(counter);
        self.advanced.notify_all();
    }

    /// Overwrite the counter and wake all waiters
    pub fn set(&self, frame: FrameId) {
        *lock(&self.counter) = frame;
        self.advanced.notify_all();
    }
}
