//! Command enum for the bridge actor
//!
//! Same split as everywhere else in the gateway: fire-and-forget commands for
//! outbound traffic, oneshot responders for init, queries and close.

use std::ops::RangeInclusive;
use std::sync::Arc;
use tokio::sync::oneshot;

use crate::config::BridgeConfig;
use crate::error::BridgeResult;
use crate::osc::CommandArgs;
use crate::state::{Variable, VariableDefinition, VariableUpdate};
use crate::sync::LivenessState;

/// Callback invoked once per flush with the variables that changed
pub type UpdateListener = Arc<dyn Fn(&[VariableUpdate]) + Send + Sync>;

pub enum BridgeCommand {
    // -------------------------------------------------------------------------
    // Fire and forget
    // -------------------------------------------------------------------------
    /// Send `/<ns>/cmd/<name>` with integer arguments
    SendCommand { name: String, args: CommandArgs },

    /// Ask the device for a full state push (retried until acknowledged)
    RequestStateUpdate,

    /// Read `variable`, advance through `table`, send `[next, trailing...]`
    Cycle {
        command: String,
        variable: String,
        table: Vec<i32>,
        trailing: Vec<i32>,
    },

    /// Read `variable`, add `step` clamped to `range`, send `[next, trailing...]`
    Step {
        command: String,
        variable: String,
        step: i32,
        range: RangeInclusive<i32>,
        trailing: Vec<i32>,
    },

    /// Replace the variable catalog (channel count changed)
    DefineVariables(Vec<VariableDefinition>),

    /// Register a change listener
    Subscribe(UpdateListener),

    // -------------------------------------------------------------------------
    // Request-response
    // -------------------------------------------------------------------------
    /// (Re)open the transport with a new configuration
    Init {
        config: Box<BridgeConfig>,
        response: oneshot::Sender<BridgeResult<()>>,
    },

    Get {
        key: String,
        response: oneshot::Sender<Option<i32>>,
    },

    Snapshot {
        response: oneshot::Sender<Vec<(String, Variable)>>,
    },

    Liveness {
        response: oneshot::Sender<LivenessState>,
    },

    /// Close the transport and cancel every timer; the actor keeps running
    Close { response: oneshot::Sender<()> },

    /// Stop the actor
    Shutdown,
}

// Manual Debug implementation because UpdateListener doesn't implement Debug
impl std::fmt::Debug for BridgeCommand {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BridgeCommand::SendCommand { name, args } => f
                .debug_struct("SendCommand")
                .field("name", name)
                .field("args", args)
                .finish(),
            BridgeCommand::RequestStateUpdate => write!(f, "RequestStateUpdate"),
            BridgeCommand::Cycle {
                command, variable, ..
            } => f
                .debug_struct("Cycle")
                .field("command", command)
                .field("variable", variable)
                .finish_non_exhaustive(),
            BridgeCommand::Step {
                command,
                variable,
                step,
                ..
            } => f
                .debug_struct("Step")
                .field("command", command)
                .field("variable", variable)
                .field("step", step)
                .finish_non_exhaustive(),
            BridgeCommand::DefineVariables(defs) => f
                .debug_tuple("DefineVariables")
                .field(&defs.len())
                .finish(),
            BridgeCommand::Subscribe(_) => f.debug_struct("Subscribe").finish_non_exhaustive(),
            BridgeCommand::Init { config, .. } => f
                .debug_struct("Init")
                .field("host", &config.host)
                .field("port", &config.port)
                .finish_non_exhaustive(),
            BridgeCommand::Get { key, .. } => {
                f.debug_struct("Get").field("key", key).finish_non_exhaustive()
            }
            BridgeCommand::Snapshot { .. } => write!(f, "Snapshot"),
            BridgeCommand::Liveness { .. } => write!(f, "Liveness"),
            BridgeCommand::Close { .. } => write!(f, "Close"),
            BridgeCommand::Shutdown => write!(f, "Shutdown"),
        }
    }
}
