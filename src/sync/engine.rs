//! Sync engine - protocol state machine without I/O
//!
//! Owns the variable store and the batcher, liveness and resync timers. The
//! bridge actor feeds it decoded messages and the current time, sleeps until
//! [`SyncEngine::next_deadline`], and executes the returned [`EngineEvent`]s
//! (socket sends, host notifications).
//!
//! ```text
//!  OSC message ─► parse ─► batcher ──(flush)──► store.bulk_apply ─► VariablesChanged
//!  heartbeat ───► liveness ──(timeout)──► heartbeat=0 + resync ─► Send(update 1)
//!  updated ─────► resync.acknowledge
//! ```

use rosc::OscMessage;
use std::time::Instant;
use tracing::{debug, info, trace, warn};

use super::batcher::UpdateBatcher;
use super::liveness::{LivenessMonitor, LivenessState};
use super::resync::ResyncCoordinator;
use super::timer::earliest;
use crate::config::TimingConfig;
use crate::osc::encoder::command_message;
use crate::osc::{
    is_high_frequency, parse_state_address, CommandArgs, Namespace, RESYNC_ARGUMENT,
    RESYNC_COMMAND,
};
use crate::state::{VariableDefinition, VariableStore, VariableUpdate, HEARTBEAT_KEY};

/// Side effect requested by the engine
#[derive(Debug, Clone, PartialEq)]
pub enum EngineEvent {
    /// Transmit a message to the device
    Send(OscMessage),
    /// Variables changed in one flush; notify the host once
    VariablesChanged(Vec<VariableUpdate>),
    /// Device connectivity changed
    LivenessChanged(LivenessState),
}

pub struct SyncEngine {
    namespace: Namespace,
    store: VariableStore,
    batcher: UpdateBatcher,
    liveness: LivenessMonitor,
    resync: ResyncCoordinator,
}

impl SyncEngine {
    pub fn new(
        definitions: impl IntoIterator<Item = VariableDefinition>,
        timing: &TimingConfig,
        namespace: Namespace,
    ) -> Self {
        Self {
            namespace,
            store: VariableStore::new(definitions),
            batcher: UpdateBatcher::new(timing.debounce(), timing.throttle()),
            liveness: LivenessMonitor::new(timing.heartbeat_timeout()),
            resync: ResyncCoordinator::new(timing.resync_interval()),
        }
    }

    /// Apply new timings and namespace
    ///
    /// Pending updates and running timers are dropped; variable values and the
    /// liveness state are kept.
    pub fn reconfigure(&mut self, timing: &TimingConfig, namespace: Namespace) {
        self.batcher = UpdateBatcher::new(timing.debounce(), timing.throttle());
        self.liveness.set_timeout(timing.heartbeat_timeout());
        self.resync.set_interval(timing.resync_interval());
        self.namespace = namespace;
    }

    pub fn namespace(&self) -> &Namespace {
        &self.namespace
    }

    pub fn store(&self) -> &VariableStore {
        &self.store
    }

    pub fn define_variables(&mut self, definitions: impl IntoIterator<Item = VariableDefinition>) {
        self.store.redefine(definitions);
    }

    pub fn liveness(&self) -> LivenessState {
        self.liveness.state()
    }

    pub fn is_resync_active(&self) -> bool {
        self.resync.is_active()
    }

    /// Whether any variable still holds a not-yet-reported sentinel
    pub fn needs_resync(&self) -> bool {
        self.store.has_sentinels()
    }

    /// Build an outbound command message in this engine's namespace
    pub fn command(&self, name: &str, args: &CommandArgs) -> OscMessage {
        command_message(&self.namespace, name, args)
    }

    /// Process one inbound message
    pub fn handle_message(&mut self, msg: &OscMessage, now: Instant) -> Vec<EngineEvent> {
        let mut events = Vec::new();
        let addr = msg.addr.as_str();

        if addr == self.namespace.heartbeat_address() {
            trace!("Heartbeat received");
            if let Some(state) = self.liveness.on_heartbeat(now) {
                info!("Device is {}", state);
                events.push(EngineEvent::LivenessChanged(state));
            }
            self.write_heartbeat(LivenessState::Online, &mut events);
            return events;
        }

        if addr == self.namespace.updated_address() {
            if self.resync.acknowledge() {
                info!(
                    "Device finished sending its state (after {} requests)",
                    self.resync.attempts()
                );
            } else {
                debug!("Unsolicited state push completed");
            }
            return events;
        }

        if !addr.starts_with(self.namespace.state_prefix()) {
            trace!("Ignoring message outside the state namespace: {}", addr);
            return events;
        }

        match parse_state_address(&self.namespace, addr, &msg.args) {
            Ok(update) if self.store.has(&update.key) => {
                let path = &addr[self.namespace.state_prefix().len()..];
                self.batcher
                    .collect(update.key, update.value, is_high_frequency(path), now);
            }
            Ok(update) => {
                warn!(
                    "Received message using unsupported path ({}). Generated variable \"{}\" not found",
                    addr, update.key
                );
            }
            Err(e) => {
                warn!("Dropped malformed state message: {}", e);
            }
        }

        events
    }

    /// Fire every timer that is due
    pub fn poll(&mut self, now: Instant) -> Vec<EngineEvent> {
        let mut events = Vec::new();

        for batch in self.batcher.poll(now) {
            let changed = self.store.bulk_apply(batch.updates);
            if !changed.is_empty() {
                debug!("Updated values of {} variables", changed.len());
                events.push(EngineEvent::VariablesChanged(changed));
            }
        }

        if let Some(state) = self.liveness.poll(now) {
            warn!("Heartbeat lost");
            events.push(EngineEvent::LivenessChanged(state));
            self.write_heartbeat(state, &mut events);
            self.start_resync(now, &mut events);
        }

        if self.resync.poll(now) {
            debug!(
                "No state push received, requesting new update (attempt {})",
                self.resync.attempts()
            );
            events.push(EngineEvent::Send(self.resync_message()));
        }

        events
    }

    /// Ask the device for its full state and keep asking until it acknowledges
    pub fn request_state_update(&mut self, now: Instant) -> Vec<EngineEvent> {
        let mut events = Vec::new();
        self.start_resync(now, &mut events);
        events
    }

    /// Earliest instant at which [`poll`](Self::poll) has work to do
    pub fn next_deadline(&self) -> Option<Instant> {
        earliest([
            self.batcher.next_deadline(),
            self.liveness.deadline(),
            self.resync.deadline(),
        ])
    }

    /// Disarm every timer and drop pending updates (transport teardown)
    pub fn cancel_timers(&mut self) {
        self.batcher.cancel();
        self.liveness.cancel();
        self.resync.cancel();
    }

    /// Restart heartbeat supervision after the transport (re)opens
    pub fn transport_opened(&mut self, now: Instant) {
        self.liveness.resume(now);
    }

    fn start_resync(&mut self, now: Instant, events: &mut Vec<EngineEvent>) {
        if self.resync.is_active() {
            debug!("Restarting outstanding state update request");
        }
        self.resync.start(now);
        debug!("Requested state update");
        events.push(EngineEvent::Send(self.resync_message()));
    }

    fn resync_message(&self) -> OscMessage {
        command_message(&self.namespace, RESYNC_COMMAND, &RESYNC_ARGUMENT.into())
    }

    fn write_heartbeat(&mut self, state: LivenessState, events: &mut Vec<EngineEvent>) {
        if !self.store.has(HEARTBEAT_KEY) {
            return;
        }
        if let Some(change) = self.store.set(HEARTBEAT_KEY, state.as_value()) {
            events.push(EngineEvent::VariablesChanged(vec![change]));
        }
    }
}
