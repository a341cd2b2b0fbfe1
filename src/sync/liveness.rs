//! Heartbeat-driven device liveness
//!
//! `Unknown → Online → Offline → Online → …`. Each heartbeat sets Online and
//! pushes the timeout back; expiry sets Offline once. Once Offline, the timeout
//! is only re-armed by the next heartbeat, so a silent device produces exactly
//! one Offline transition. A transport reopen re-arms it for an Online device,
//! which then has one timeout to prove it is still there.

use std::time::{Duration, Instant};

use super::timer::DebounceTimer;

/// Connectivity of the remote device
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LivenessState {
    #[default]
    Unknown,
    Online,
    Offline,
}

impl LivenessState {
    /// Value written to the heartbeat variable
    pub fn as_value(&self) -> i32 {
        match self {
            LivenessState::Unknown => crate::state::SENTINEL_UNKNOWN,
            LivenessState::Online => 1,
            LivenessState::Offline => 0,
        }
    }
}

impl std::fmt::Display for LivenessState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LivenessState::Unknown => write!(f, "unknown"),
            LivenessState::Online => write!(f, "online"),
            LivenessState::Offline => write!(f, "offline"),
        }
    }
}

#[derive(Debug)]
pub struct LivenessMonitor {
    state: LivenessState,
    timeout: DebounceTimer,
}

impl LivenessMonitor {
    pub fn new(timeout: Duration) -> Self {
        Self {
            state: LivenessState::Unknown,
            timeout: DebounceTimer::new(timeout),
        }
    }

    pub fn state(&self) -> LivenessState {
        self.state
    }

    /// Record a heartbeat; returns the new state on a transition
    pub fn on_heartbeat(&mut self, now: Instant) -> Option<LivenessState> {
        self.timeout.restart(now);
        self.transition(LivenessState::Online)
    }

    /// Check the timeout; returns `Offline` the one time it expires
    pub fn poll(&mut self, now: Instant) -> Option<LivenessState> {
        if self.timeout.fire(now) {
            self.transition(LivenessState::Offline)
        } else {
            None
        }
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.timeout.deadline()
    }

    /// Replace the timeout length; any running timeout is dropped
    pub fn set_timeout(&mut self, timeout: Duration) {
        self.timeout = DebounceTimer::new(timeout);
    }

    /// Disarm the timeout without changing state
    pub fn cancel(&mut self) {
        self.timeout.cancel();
    }

    /// Re-arm the timeout from `now` after the transport reopens
    ///
    /// Only an Online device is watched again; Unknown and Offline wait for a
    /// heartbeat as before.
    pub fn resume(&mut self, now: Instant) {
        if self.state == LivenessState::Online {
            self.timeout.restart(now);
        }
    }

    fn transition(&mut self, next: LivenessState) -> Option<LivenessState> {
        if self.state == next {
            return None;
        }
        self.state = next;
        Some(next)
    }
}
