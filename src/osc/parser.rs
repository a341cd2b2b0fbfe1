//! Inbound address parsing
//!
//! Turns `/ggo/state/channel/talk [2, 3]` into `state_talk_ch3 = 2`. The device
//! never puts the channel index in the path: a literal `channel` segment marks
//! the message as channel-scoped and the index travels as the second argument.
//! Parsing is pure and never touches the variable store.

use rosc::OscType;
use thiserror::Error;

use super::Namespace;

/// Path segment marking a channel-scoped state message
const CHANNEL_SEGMENT: &str = "channel";

/// Argument positions used by the device
const VALUE_ARG: usize = 0;
const CHANNEL_ARG: usize = 1;

/// Reasons an inbound state message cannot be turned into an update
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    #[error("address '{0}' is outside the state namespace")]
    OutsideNamespace(String),

    #[error("address '{0}' contains an empty path segment")]
    EmptySegment(String),

    #[error("address '{addr}' is missing argument {index}")]
    MissingArgument { addr: String, index: usize },

    #[error("address '{addr}' argument {index} is not an integer")]
    NotAnInteger { addr: String, index: usize },
}

/// A single state variable update derived from one OSC message
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StateUpdate {
    /// Canonical variable key (e.g. `state_talk_ch3`)
    pub key: String,
    /// New value, taken from the first argument
    pub value: i32,
}

/// Derive the canonical variable key and value from a state message
pub fn parse_state_address(
    namespace: &Namespace,
    addr: &str,
    args: &[OscType],
) -> Result<StateUpdate, ParseError> {
    let rest = addr
        .strip_prefix('/')
        .and_then(|path| path.strip_prefix(namespace.name()))
        .and_then(|path| path.strip_prefix('/'))
        .filter(|path| path.starts_with("state/"))
        .ok_or_else(|| ParseError::OutsideNamespace(addr.to_string()))?;

    let mut segments = Vec::new();
    let mut channel_scoped = false;
    for segment in rest.split('/') {
        if segment.is_empty() {
            return Err(ParseError::EmptySegment(addr.to_string()));
        }
        if segment == CHANNEL_SEGMENT {
            channel_scoped = true;
        } else {
            segments.push(segment);
        }
    }

    let value = int_arg(addr, args, VALUE_ARG)?;
    let mut key = segments.join("_");
    if channel_scoped {
        let channel = int_arg(addr, args, CHANNEL_ARG)?;
        key.push_str(&format!("_ch{}", channel));
    }

    Ok(StateUpdate { key, value })
}

/// Level and gain reports arrive in floods while a fader moves
///
/// `path` is the part below the state prefix (`channel/level`) or a variable
/// key (`state_level_ch1`); the namespace never takes part.
pub fn is_high_frequency(path: &str) -> bool {
    path.contains("level") || path.contains("gain")
}

/// Read an argument as an integer, accepting the numeric encodings OSC senders use
fn int_arg(addr: &str, args: &[OscType], index: usize) -> Result<i32, ParseError> {
    let arg = args.get(index).ok_or_else(|| ParseError::MissingArgument {
        addr: addr.to_string(),
        index,
    })?;

    let not_int = || ParseError::NotAnInteger {
        addr: addr.to_string(),
        index,
    };

    match arg {
        OscType::Int(v) => Ok(*v),
        OscType::Long(v) => i32::try_from(*v).map_err(|_| not_int()),
        OscType::Float(v) if v.is_finite() => Ok(v.round() as i32),
        OscType::Double(v) if v.is_finite() => Ok(v.round() as i32),
        OscType::Bool(v) => Ok(i32::from(*v)),
        _ => Err(not_int()),
    }
}
