//! BridgeHandle - public API for the bridge actor
//!
//! Fire-and-forget methods for outbound commands, async methods with oneshot
//! channels for init, queries and close.

use std::ops::RangeInclusive;
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};
use tracing::warn;

use super::commands::{BridgeCommand, UpdateListener};
use crate::config::{BridgeConfig, TimingConfig};
use crate::error::{BridgeError, BridgeResult};
use crate::osc::CommandArgs;
use crate::state::{Variable, VariableDefinition};
use crate::status::{InstanceStatus, StatusListener, StatusReporter};
use crate::sync::LivenessState;

/// Handle for interacting with the bridge actor
///
/// Cheap to clone; all clones talk to the same actor.
#[derive(Clone)]
pub struct BridgeHandle {
    cmd_tx: mpsc::UnboundedSender<BridgeCommand>,
    status: Arc<StatusReporter>,
}

impl BridgeHandle {
    pub(super) fn new(
        cmd_tx: mpsc::UnboundedSender<BridgeCommand>,
        status: Arc<StatusReporter>,
    ) -> Self {
        Self { cmd_tx, status }
    }

    /// Spawn a bridge actor with the given variable catalog
    ///
    /// Convenience wrapper around `BridgeActor::spawn`.
    pub fn spawn(
        definitions: impl IntoIterator<Item = VariableDefinition>,
        timing: &TimingConfig,
    ) -> Self {
        super::actor::BridgeActor::spawn(definitions, timing)
    }

    /// Open the transport for `config`, replacing any open one
    ///
    /// Starts a full state request when some variables are still unknown.
    /// Fails with [`BridgeError::Config`] when host or port is missing and with
    /// [`BridgeError::Bind`] when the local port is taken; the status is
    /// updated either way.
    pub async fn init(&self, config: BridgeConfig) -> BridgeResult<()> {
        let (response_tx, response_rx) = oneshot::channel();
        self.cmd_tx
            .send(BridgeCommand::Init {
                config: Box::new(config),
                response: response_tx,
            })
            .map_err(|_| BridgeError::ActorGone)?;

        response_rx.await.map_err(|_| BridgeError::ActorGone)?
    }

    // =========================================================================
    // Fire-and-forget
    // =========================================================================

    /// Send `/<ns>/cmd/<name>` with one or more integer arguments
    pub fn send_command(&self, name: impl Into<String>, args: impl Into<CommandArgs>) {
        self.post(BridgeCommand::SendCommand {
            name: name.into(),
            args: args.into(),
        });
    }

    /// Ask the device to push its full state
    pub fn request_state_update(&self) {
        self.post(BridgeCommand::RequestStateUpdate);
    }

    /// Send the entry following `variable`'s current value in `table`
    ///
    /// Sends `[next, trailing...]`, e.g. `cycle_command("channel/talk",
    /// "state_talk_ch3", &TALK_CYCLE, [3])`.
    pub fn cycle_command(
        &self,
        command: impl Into<String>,
        variable: impl Into<String>,
        table: &[i32],
        trailing: impl Into<CommandArgs>,
    ) {
        self.post(BridgeCommand::Cycle {
            command: command.into(),
            variable: variable.into(),
            table: table.to_vec(),
            trailing: trailing.into().into_vec(),
        });
    }

    /// Send `variable`'s current value plus `step`, clamped to `range`
    pub fn step_command(
        &self,
        command: impl Into<String>,
        variable: impl Into<String>,
        step: i32,
        range: RangeInclusive<i32>,
        trailing: impl Into<CommandArgs>,
    ) {
        self.post(BridgeCommand::Step {
            command: command.into(),
            variable: variable.into(),
            step,
            range,
            trailing: trailing.into().into_vec(),
        });
    }

    /// Replace the variable catalog, keeping values of surviving keys
    pub fn define_variables(&self, definitions: Vec<VariableDefinition>) {
        self.post(BridgeCommand::DefineVariables(definitions));
    }

    /// Register a listener called once per flush with the changed variables
    pub fn subscribe(&self, listener: UpdateListener) {
        self.post(BridgeCommand::Subscribe(listener));
    }

    /// Register a status listener; it receives the current status right away
    pub fn subscribe_status(&self, listener: StatusListener) {
        self.status.subscribe(listener);
    }

    pub fn status(&self) -> InstanceStatus {
        self.status.current()
    }

    /// Stop the actor; the transport is closed on the way out
    pub fn shutdown(&self) {
        let _ = self.cmd_tx.send(BridgeCommand::Shutdown);
    }

    // =========================================================================
    // Queries
    // =========================================================================

    /// Current value of a variable (None if undefined or the actor is gone)
    pub async fn get(&self, key: impl Into<String>) -> Option<i32> {
        let (response_tx, response_rx) = oneshot::channel();
        let cmd = BridgeCommand::Get {
            key: key.into(),
            response: response_tx,
        };

        if self.cmd_tx.send(cmd).is_err() {
            return None;
        }

        response_rx.await.ok().flatten()
    }

    pub async fn snapshot(&self) -> Vec<(String, Variable)> {
        let (response_tx, response_rx) = oneshot::channel();
        if self
            .cmd_tx
            .send(BridgeCommand::Snapshot {
                response: response_tx,
            })
            .is_err()
        {
            return Vec::new();
        }

        response_rx.await.unwrap_or_default()
    }

    pub async fn liveness(&self) -> LivenessState {
        let (response_tx, response_rx) = oneshot::channel();
        if self
            .cmd_tx
            .send(BridgeCommand::Liveness {
                response: response_tx,
            })
            .is_err()
        {
            return LivenessState::Unknown;
        }

        response_rx.await.unwrap_or_default()
    }

    /// Close the transport and cancel all timers; safe to call repeatedly
    pub async fn close(&self) {
        let (response_tx, response_rx) = oneshot::channel();
        if self
            .cmd_tx
            .send(BridgeCommand::Close {
                response: response_tx,
            })
            .is_ok()
        {
            let _ = response_rx.await;
        }
    }

    fn post(&self, cmd: BridgeCommand) {
        if self.cmd_tx.send(cmd).is_err() {
            warn!("{}", BridgeError::ActorGone);
        }
    }
}
