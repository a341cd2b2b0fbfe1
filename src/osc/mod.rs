//! OSC plumbing for the Green-GO device protocol
//!
//! Only the subset of OSC the device speaks is handled: messages (bundles are
//! flattened) whose arguments are 32-bit integers. Addresses live under a
//! single namespace segment, `/ggo` by default:
//!
//! - `/<ns>/cmd/<name>` outbound commands
//! - `/<ns>/state/<path...>` inbound state reports
//! - `/<ns>/state/heartbeat` liveness signal
//! - `/<ns>/state/updated` end of a full state push

pub mod encoder;
pub mod parser;
pub mod transport;

pub use encoder::{encode_message, CommandArgs};
pub use parser::{is_high_frequency, parse_state_address, ParseError, StateUpdate};
pub use transport::{decode_packet, OscTransport};

/// Command that asks the device to push its full state
pub const RESYNC_COMMAND: &str = "update";

/// Argument sent with [`RESYNC_COMMAND`]
pub const RESYNC_ARGUMENT: i32 = 1;

/// Address builder for one OSC namespace
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Namespace {
    name: String,
    state_prefix: String,
    heartbeat: String,
    updated: String,
}

impl Namespace {
    /// Create a namespace from its bare segment (e.g. `"ggo"`)
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        let name = name.trim_matches('/').to_string();
        Self {
            state_prefix: format!("/{}/state/", name),
            heartbeat: format!("/{}/state/heartbeat", name),
            updated: format!("/{}/state/updated", name),
            name,
        }
    }

    /// Bare namespace segment
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Prefix shared by every inbound state address, trailing slash included
    pub fn state_prefix(&self) -> &str {
        &self.state_prefix
    }

    pub fn heartbeat_address(&self) -> &str {
        &self.heartbeat
    }

    pub fn updated_address(&self) -> &str {
        &self.updated
    }

    /// Address of an outbound command
    pub fn command_address(&self, command: &str) -> String {
        format!("/{}/cmd/{}", self.name, command.trim_start_matches('/'))
    }
}

impl Default for Namespace {
    fn default() -> Self {
        Self::new(crate::config::DEFAULT_NAMESPACE)
    }
}
