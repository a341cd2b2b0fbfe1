//! Bridge - the actor that connects one Green-GO device to the host
//!
//! The host only ever talks to a [`BridgeHandle`]; the actor owns the UDP
//! transport and the sync engine.

mod actor;
mod commands;
mod handle;

pub use actor::BridgeActor;
pub use commands::{BridgeCommand, UpdateListener};
pub use handle::BridgeHandle;

#[cfg(test)]
mod tests;
