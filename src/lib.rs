//! Green-GO GW - OSC/UDP bridge between a Green-GO intercom device and a host
//!
//! The device pushes its state as OSC messages under `/<ns>/state/...`; the
//! bridge mirrors it into named integer variables, batches the flood of
//! updates, watches the heartbeat and re-requests the full state when it is
//! lost. Outbound, host actions become `/<ns>/cmd/...` messages.

pub mod actions;
pub mod bridge;
pub mod config;
pub mod error;
pub mod osc;
pub mod state;
pub mod status;
pub mod sync;

pub use bridge::{BridgeHandle, UpdateListener};
pub use config::BridgeConfig;
pub use error::{BridgeError, BridgeResult};
pub use status::{InstanceStatus, StatusListener};
