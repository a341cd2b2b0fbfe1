//! Error taxonomy for the OSC bridge
//!
//! Network and parsing faults are logged and dropped inside the bridge actor.
//! Only `init` failures (`Bind`, `Config`) and `ActorGone` ever cross the public
//! boundary as an `Err`; everything else is logged or surfaced through status.

use std::net::SocketAddr;
use thiserror::Error;

/// Errors produced by the bridge and its components
#[derive(Debug, Error)]
pub enum BridgeError {
    /// Local UDP port could not be bound
    #[error("failed to bind local OSC port {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },

    /// Send or request attempted while the transport is closed
    #[error("OSC transport is not open")]
    TransportUnavailable,

    /// Packet could not be decoded or its arguments do not fit the address shape
    #[error("malformed OSC message: {0}")]
    MalformedMessage(String),

    /// Inbound message mapped to a variable that is not in the store
    #[error("variable '{0}' is not defined")]
    UnknownVariable(String),

    /// Outbound message could not be encoded
    #[error("failed to encode OSC message for {addr}: {reason}")]
    Encode { addr: String, reason: String },

    /// Configuration rejected before the transport was opened
    #[error("invalid configuration: {0}")]
    Config(String),

    /// The bridge actor has stopped and no longer accepts commands
    #[error("bridge actor is no longer running")]
    ActorGone,
}

pub type BridgeResult<T> = std::result::Result<T, BridgeError>;
