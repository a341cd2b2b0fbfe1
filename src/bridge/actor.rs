//! BridgeActor - the single task that owns the socket and all protocol state
//!
//! ```text
//! ┌──────────────────────────────── BridgeActor ───────────────────────────────┐
//! │  select! {                                                                 │
//! │    command_rx.recv()      → host calls (init, send, cycle, queries, close)  │
//! │    transport.recv()       → engine.handle_message                          │
//! │    sleep_until(deadline)  → engine.poll (flushes, heartbeat, resync)       │
//! │  }                                                                         │
//! │  engine events → socket send / update listeners / status                   │
//! └────────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Every state mutation and every read for a cycling command happens on this
//! task, so no lock guards the variable store.

use rosc::OscMessage;
use std::io;
use std::ops::RangeInclusive;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::mpsc;
use tracing::{debug, error, info, trace, warn};

use super::commands::{BridgeCommand, UpdateListener};
use super::handle::BridgeHandle;
use crate::actions::{cycle_next, step_clamped};
use crate::config::{BridgeConfig, TimingConfig};
use crate::error::{BridgeError, BridgeResult};
use crate::osc::{CommandArgs, Namespace, OscTransport};
use crate::state::{VariableDefinition, VariableUpdate};
use crate::status::{InstanceStatus, StatusReporter};
use crate::sync::{EngineEvent, LivenessState, SyncEngine};

pub struct BridgeActor {
    engine: SyncEngine,
    transport: Option<OscTransport>,
    listeners: Vec<UpdateListener>,
    status: Arc<StatusReporter>,
    command_rx: mpsc::UnboundedReceiver<BridgeCommand>,
}

impl BridgeActor {
    /// Spawn the actor on the current runtime and return its handle
    ///
    /// The transport stays closed until [`BridgeHandle::init`].
    pub fn spawn(
        definitions: impl IntoIterator<Item = VariableDefinition>,
        timing: &TimingConfig,
    ) -> BridgeHandle {
        let (cmd_tx, command_rx) = mpsc::unbounded_channel();
        let status = Arc::new(StatusReporter::new());

        let actor = BridgeActor {
            engine: SyncEngine::new(definitions, timing, Namespace::default()),
            transport: None,
            listeners: Vec::new(),
            status: Arc::clone(&status),
            command_rx,
        };

        tokio::spawn(actor.run());

        info!("Bridge actor spawned");

        BridgeHandle::new(cmd_tx, status)
    }

    async fn run(mut self) {
        debug!(
            "Bridge actor run loop started ({} variables)",
            self.engine.store().len()
        );

        loop {
            let deadline = self.engine.next_deadline();

            tokio::select! {
                cmd = self.command_rx.recv() => {
                    match cmd {
                        Some(BridgeCommand::Shutdown) | None => break,
                        Some(cmd) => {
                            trace!(?cmd, "Processing command");
                            self.handle_command(cmd).await;
                        }
                    }
                }
                received = recv_from(&mut self.transport) => {
                    match received {
                        Ok(messages) => self.handle_messages(messages),
                        Err(e) => error!("OSC receive failed: {}", e),
                    }
                }
                _ = sleep_until(deadline) => {
                    let events = self.engine.poll(Instant::now());
                    self.dispatch(events);
                }
            }
        }

        self.close_transport();
        self.status.report(InstanceStatus::Disconnected);
        info!("Bridge actor stopped");
    }

    async fn handle_command(&mut self, cmd: BridgeCommand) {
        match cmd {
            BridgeCommand::SendCommand { name, args } => {
                let message = self.engine.command(&name, &args);
                debug!("Sending {} {}", message.addr, args);
                self.send(&message);
            }
            BridgeCommand::RequestStateUpdate => {
                if self.transport.is_none() {
                    warn!(
                        "Cannot request state update: {}",
                        BridgeError::TransportUnavailable
                    );
                    return;
                }
                let events = self.engine.request_state_update(Instant::now());
                self.dispatch(events);
            }
            BridgeCommand::Cycle {
                command,
                variable,
                table,
                trailing,
            } => self.handle_cycle(&command, &variable, &table, trailing),
            BridgeCommand::Step {
                command,
                variable,
                step,
                range,
                trailing,
            } => self.handle_step(&command, &variable, step, &range, trailing),
            BridgeCommand::DefineVariables(definitions) => {
                self.engine.define_variables(definitions);
                info!("Variable catalog updated ({} variables)", self.engine.store().len());
            }
            BridgeCommand::Subscribe(listener) => {
                self.listeners.push(listener);
            }
            BridgeCommand::Init { config, response } => {
                let result = self.handle_init(*config).await;
                let _ = response.send(result);
            }
            BridgeCommand::Get { key, response } => {
                self.flush_due();
                let _ = response.send(self.engine.store().get(&key));
            }
            BridgeCommand::Snapshot { response } => {
                self.flush_due();
                let _ = response.send(self.engine.store().snapshot());
            }
            BridgeCommand::Liveness { response } => {
                let _ = response.send(self.engine.liveness());
            }
            BridgeCommand::Close { response } => {
                self.close_transport();
                self.status.report(InstanceStatus::Disconnected);
                let _ = response.send(());
            }
            BridgeCommand::Shutdown => {}
        }
    }

    /// Open (or reopen) the transport for `config`
    async fn handle_init(&mut self, config: BridgeConfig) -> BridgeResult<()> {
        self.close_transport();
        self.engine
            .reconfigure(&config.timing, Namespace::new(config.namespace.as_str()));

        let (Some(remote), Some(local)) = (config.remote_addr(), config.local_addr()) else {
            self.status.report(InstanceStatus::Warning(
                "Target IP and port are not configured".to_string(),
            ));
            return Err(BridgeError::Config(
                "target host and port are required".to_string(),
            ));
        };

        let transport = match OscTransport::open(local, remote).await {
            Ok(transport) => transport,
            Err(e) => {
                self.status.report(InstanceStatus::Error(e.to_string()));
                return Err(e);
            }
        };

        info!(
            "Connected to {} at {} (listening on {}, namespace /{})",
            config.device_type.label(),
            remote,
            transport.local_addr().unwrap_or(local),
            self.engine.namespace().name()
        );
        self.transport = Some(transport);
        self.engine.transport_opened(Instant::now());
        match self.engine.liveness() {
            LivenessState::Offline => self
                .status
                .report(InstanceStatus::Warning("Heartbeat lost".to_string())),
            _ => self.status.report(InstanceStatus::Ok),
        };

        if self.engine.needs_resync() {
            info!("Some variables are not initialized yet, requesting full state");
            let events = self.engine.request_state_update(Instant::now());
            self.dispatch(events);
        }

        Ok(())
    }

    fn handle_cycle(&mut self, command: &str, variable: &str, table: &[i32], trailing: Vec<i32>) {
        self.flush_due();

        let Some(current) = self.engine.store().get(variable) else {
            warn!("{}", BridgeError::UnknownVariable(variable.to_string()));
            return;
        };
        let Some(next) = cycle_next(current, table) else {
            warn!("Empty cycle table for command {}", command);
            return;
        };

        trace!("Cycling {} from {} to {}", variable, current, next);
        self.send_with_trailing(command, next, trailing);
    }

    fn handle_step(
        &mut self,
        command: &str,
        variable: &str,
        step: i32,
        range: &RangeInclusive<i32>,
        trailing: Vec<i32>,
    ) {
        self.flush_due();

        let Some(current) = self.engine.store().get(variable) else {
            warn!("{}", BridgeError::UnknownVariable(variable.to_string()));
            return;
        };
        let Some(next) = step_clamped(current, step, range) else {
            warn!("Value of {} is not known yet, ignoring step", variable);
            return;
        };

        trace!("Stepping {} from {} to {}", variable, current, next);
        self.send_with_trailing(command, next, trailing);
    }

    fn send_with_trailing(&mut self, command: &str, value: i32, trailing: Vec<i32>) {
        let mut args = Vec::with_capacity(trailing.len() + 1);
        args.push(value);
        args.extend(trailing);

        let args = CommandArgs::from(args);
        let message = self.engine.command(command, &args);
        debug!("Sending {} {}", message.addr, args);
        self.send(&message);
    }

    fn handle_messages(&mut self, messages: Vec<OscMessage>) {
        let now = Instant::now();
        for message in &messages {
            let events = self.engine.handle_message(message, now);
            self.dispatch(events);
        }
    }

    /// Apply flushes whose deadline already passed, so reads see the latest values
    fn flush_due(&mut self) {
        let events = self.engine.poll(Instant::now());
        self.dispatch(events);
    }

    fn dispatch(&mut self, events: Vec<EngineEvent>) {
        for event in events {
            match event {
                EngineEvent::Send(message) => self.send(&message),
                EngineEvent::VariablesChanged(changes) => self.notify(&changes),
                EngineEvent::LivenessChanged(LivenessState::Online) => {
                    self.status.report(InstanceStatus::Ok);
                }
                EngineEvent::LivenessChanged(LivenessState::Offline) => {
                    self.status
                        .report(InstanceStatus::Warning("Heartbeat lost".to_string()));
                }
                EngineEvent::LivenessChanged(LivenessState::Unknown) => {}
            }
        }
    }

    fn send(&self, message: &OscMessage) {
        match &self.transport {
            Some(transport) => {
                if let Err(e) = transport.send(message) {
                    warn!("{}", e);
                }
            }
            None => warn!(
                "Dropping {}: {}",
                message.addr,
                BridgeError::TransportUnavailable
            ),
        }
    }

    fn notify(&self, changes: &[VariableUpdate]) {
        trace!("Notifying {} listeners of {} changes", self.listeners.len(), changes.len());
        for listener in &self.listeners {
            listener(changes);
        }
    }

    /// Drop the socket and every timer; variable values are kept
    fn close_transport(&mut self) {
        self.engine.cancel_timers();
        if let Some(transport) = self.transport.take() {
            transport.close();
            info!("Connection closed");
        }
    }
}

/// Next batch of messages, or never when the transport is closed
async fn recv_from(transport: &mut Option<OscTransport>) -> io::Result<Vec<OscMessage>> {
    match transport {
        Some(transport) => transport.recv().await,
        None => std::future::pending().await,
    }
}

/// Sleep until the engine's next deadline, or forever when nothing is armed
async fn sleep_until(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => {
            tokio::time::sleep_until(tokio::time::Instant::from_std(deadline)).await
        }
        None => std::future::pending().await,
    }
}
