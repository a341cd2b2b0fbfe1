//! Outbound command encoding
//!
//! Commands are `/<ns>/cmd/<name>` messages whose arguments are all tagged as
//! 32-bit integers.

use rosc::{OscMessage, OscPacket, OscType};

use super::Namespace;
use crate::error::{BridgeError, BridgeResult};

/// Integer arguments for a command, normalized from a single value or a list
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CommandArgs(Vec<i32>);

impl CommandArgs {
    pub fn as_slice(&self) -> &[i32] {
        &self.0
    }

    pub fn into_vec(self) -> Vec<i32> {
        self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<i32> for CommandArgs {
    fn from(value: i32) -> Self {
        Self(vec![value])
    }
}

impl From<Vec<i32>> for CommandArgs {
    fn from(values: Vec<i32>) -> Self {
        Self(values)
    }
}

impl From<&[i32]> for CommandArgs {
    fn from(values: &[i32]) -> Self {
        Self(values.to_vec())
    }
}

impl<const N: usize> From<[i32; N]> for CommandArgs {
    fn from(values: [i32; N]) -> Self {
        Self(values.to_vec())
    }
}

impl std::fmt::Display for CommandArgs {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let joined: Vec<String> = self.0.iter().map(|v| v.to_string()).collect();
        write!(f, "{}", joined.join(", "))
    }
}

/// Build the OSC message for a command
pub fn command_message(namespace: &Namespace, command: &str, args: &CommandArgs) -> OscMessage {
    OscMessage {
        addr: namespace.command_address(command),
        args: args.as_slice().iter().map(|v| OscType::Int(*v)).collect(),
    }
}

/// Encode a message into a UDP payload
pub fn encode_message(message: &OscMessage) -> BridgeResult<Vec<u8>> {
    rosc::encoder::encode(&OscPacket::Message(message.clone())).map_err(|e| BridgeError::Encode {
        addr: message.addr.clone(),
        reason: e.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_value_is_normalized_to_list() {
        let args: CommandArgs = 1.into();
        assert_eq!(args.as_slice(), &[1]);

        let args: CommandArgs = vec![3, 7].into();
        assert_eq!(args.as_slice(), &[3, 7]);

        let args: CommandArgs = [0, 2, 5].into();
        assert_eq!(args.to_string(), "0, 2, 5");
    }

    #[test]
    fn test_command_message_uses_int_tags() {
        let msg = command_message(&Namespace::default(), "channel/talk", &vec![2, 3].into());

        assert_eq!(msg.addr, "/ggo/cmd/channel/talk");
        assert_eq!(msg.args, vec![OscType::Int(2), OscType::Int(3)]);
    }

    #[test]
    fn test_encoded_payload_decodes_to_same_message() {
        let msg = command_message(&Namespace::default(), "update", &1.into());
        let bytes = encode_message(&msg).unwrap();

        // OSC payloads are 4-byte aligned
        assert_eq!(bytes.len() % 4, 0);

        let (_, packet) = rosc::decoder::decode_udp(&bytes).unwrap();
        match packet {
            OscPacket::Message(decoded) => assert_eq!(decoded, msg),
            OscPacket::Bundle(_) => panic!("expected a message"),
        }
    }
}
