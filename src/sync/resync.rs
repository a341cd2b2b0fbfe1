//! Full-state resynchronization requests
//!
//! A resync sends `update 1` right away and then every retry period until the
//! device answers with `/<ns>/state/updated`. Starting a resync while one is
//! outstanding replaces it, so there is never more than one retry schedule.

use std::time::{Duration, Instant};

use super::timer::IntervalTimer;

#[derive(Debug)]
pub struct ResyncCoordinator {
    retry: IntervalTimer,
    attempts: u32,
}

impl ResyncCoordinator {
    pub fn new(retry_interval: Duration) -> Self {
        Self {
            retry: IntervalTimer::new(retry_interval),
            attempts: 0,
        }
    }

    /// Begin (or restart) a resync; the caller sends the first request now
    pub fn start(&mut self, now: Instant) {
        self.retry.start(now);
        self.attempts = 1;
    }

    /// True when a retry request is due
    pub fn poll(&mut self, now: Instant) -> bool {
        if self.retry.fire(now) {
            self.attempts += 1;
            true
        } else {
            false
        }
    }

    /// Device reported the full state as sent; returns whether a resync was pending
    pub fn acknowledge(&mut self) -> bool {
        let was_active = self.retry.is_running();
        self.retry.cancel();
        was_active
    }

    /// Replace the retry period; any outstanding resync is dropped
    pub fn set_interval(&mut self, retry_interval: Duration) {
        self.retry = IntervalTimer::new(retry_interval);
    }

    pub fn cancel(&mut self) {
        self.retry.cancel();
    }

    pub fn is_active(&self) -> bool {
        self.retry.is_running()
    }

    /// Requests sent for the current (or last) resync
    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.retry.deadline()
    }
}
