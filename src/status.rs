//! Instance status reported to the host
//!
//! Listeners are plain callbacks registered by the host. A report equal to the
//! current status is dropped, so the host only hears about transitions.

use parking_lot::RwLock;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// Connection health of the bridge instance
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum InstanceStatus {
    /// No transport (before init or after close)
    #[default]
    Disconnected,
    Ok,
    Warning(String),
    Error(String),
}

impl std::fmt::Display for InstanceStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            InstanceStatus::Disconnected => write!(f, "disconnected"),
            InstanceStatus::Ok => write!(f, "ok"),
            InstanceStatus::Warning(msg) => write!(f, "warning: {}", msg),
            InstanceStatus::Error(msg) => write!(f, "error: {}", msg),
        }
    }
}

/// Type alias for status callbacks
pub type StatusListener = Arc<dyn Fn(&InstanceStatus) + Send + Sync>;

/// Current status plus the listeners to notify on change
#[derive(Default)]
pub struct StatusReporter {
    current: RwLock<InstanceStatus>,
    listeners: RwLock<Vec<StatusListener>>,
}

impl StatusReporter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn current(&self) -> InstanceStatus {
        self.current.read().clone()
    }

    /// Register a listener; it immediately receives the current status
    pub fn subscribe(&self, listener: StatusListener) {
        let current = self.current();
        listener(&current);
        self.listeners.write().push(listener);
    }

    /// Record a status; returns false if it was unchanged
    pub fn report(&self, status: InstanceStatus) -> bool {
        {
            let mut current = self.current.write();
            if *current == status {
                return false;
            }
            *current = status.clone();
        }

        match &status {
            InstanceStatus::Ok => info!("Status: ok"),
            InstanceStatus::Disconnected => debug!("Status: disconnected"),
            InstanceStatus::Warning(msg) => warn!("Status: {}", msg),
            InstanceStatus::Error(msg) => error!("Status: {}", msg),
        }

        // Clone out so a listener can subscribe without deadlocking
        let listeners: Vec<StatusListener> = self.listeners.read().clone();
        for listener in listeners {
            listener(&status);
        }
        true
    }
}
