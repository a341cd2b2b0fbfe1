//! UDP transport for OSC packets
//!
//! One dual-purpose tokio socket: bound to the local port for inbound state,
//! used with `send_to` for outbound commands. Sends never wait; a datagram
//! the kernel cannot take right now is dropped and logged.

use rosc::{OscMessage, OscPacket};
use std::io;
use std::net::SocketAddr;
use tokio::net::UdpSocket;
use tracing::{debug, trace, warn};

use super::encoder::encode_message;
use crate::error::{BridgeError, BridgeResult};

/// Receive buffer size, large enough for any state push the device sends
const RECV_BUFFER_SIZE: usize = 8192;

/// Open UDP endpoint talking to one remote device
pub struct OscTransport {
    socket: UdpSocket,
    remote: SocketAddr,
    buf: Vec<u8>,
}

impl OscTransport {
    /// Bind the local endpoint
    ///
    /// Fails with [`BridgeError::Bind`] when the local port is unavailable.
    pub async fn open(local: SocketAddr, remote: SocketAddr) -> BridgeResult<Self> {
        let socket = UdpSocket::bind(local)
            .await
            .map_err(|source| BridgeError::Bind { addr: local, source })?;

        debug!(
            "OSC transport bound to {} (remote {})",
            socket.local_addr().unwrap_or(local),
            remote
        );

        Ok(Self {
            socket,
            remote,
            buf: vec![0; RECV_BUFFER_SIZE],
        })
    }

    /// Address actually bound (useful when the configured port was 0)
    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.socket.local_addr()
    }

    pub fn remote_addr(&self) -> SocketAddr {
        self.remote
    }

    /// Encode and transmit a message to the remote device without waiting
    pub fn send(&self, message: &OscMessage) -> BridgeResult<()> {
        let payload = encode_message(message)?;

        match self.socket.try_send_to(&payload, self.remote) {
            Ok(_) => {
                trace!("OSC → {} {:?}", message.addr, message.args);
                Ok(())
            }
            Err(e) if e.kind() == io::ErrorKind::WouldBlock => {
                warn!("OSC send buffer full, dropped {}", message.addr);
                Ok(())
            }
            Err(e) => {
                warn!("OSC send to {} failed: {}", self.remote, e);
                Ok(())
            }
        }
    }

    /// Wait for the next datagram and decode it
    ///
    /// Malformed packets are logged and yield an empty list. Cancel safe.
    pub async fn recv(&mut self) -> io::Result<Vec<OscMessage>> {
        let (len, from) = self.socket.recv_from(&mut self.buf).await?;

        match decode_packet(&self.buf[..len]) {
            Ok(messages) => {
                trace!("OSC ← {} ({} bytes, {} messages)", from, len, messages.len());
                Ok(messages)
            }
            Err(e) => {
                warn!("Dropped packet from {}: {}", from, e);
                Ok(Vec::new())
            }
        }
    }

    /// Release the socket
    pub fn close(self) {
        debug!("OSC transport closed (remote {})", self.remote);
    }
}

/// Decode one UDP payload into its messages, flattening bundles
pub fn decode_packet(payload: &[u8]) -> BridgeResult<Vec<OscMessage>> {
    let (_, packet) = rosc::decoder::decode_udp(payload)
        .map_err(|e| BridgeError::MalformedMessage(e.to_string()))?;

    let mut messages = Vec::new();
    flatten(packet, &mut messages);
    Ok(messages)
}

fn flatten(packet: OscPacket, out: &mut Vec<OscMessage>) {
    match packet {
        OscPacket::Message(msg) => out.push(msg),
        OscPacket::Bundle(bundle) => {
            for p in bundle.content {
                flatten(p, out);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rosc::{OscBundle, OscTime, OscType};
    use std::time::Duration;

    fn loopback() -> SocketAddr {
        "127.0.0.1:0".parse().unwrap()
    }

    #[test]
    fn test_decode_flattens_bundles() {
        let bundle = OscPacket::Bundle(OscBundle {
            timetag: OscTime::from((0, 1)),
            content: vec![
                OscPacket::Message(OscMessage {
                    addr: "/ggo/state/heartbeat".into(),
                    args: vec![],
                }),
                OscPacket::Message(OscMessage {
                    addr: "/ggo/state/level/main".into(),
                    args: vec![OscType::Int(-3)],
                }),
            ],
        });
        let bytes = rosc::encoder::encode(&bundle).unwrap();

        let messages = decode_packet(&bytes).unwrap();
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[1].addr, "/ggo/state/level/main");
    }

    #[test]
    fn test_decode_rejects_garbage() {
        assert!(matches!(
            decode_packet(&[0xde, 0xad, 0xbe]),
            Err(BridgeError::MalformedMessage(_))
        ));
    }

    #[tokio::test]
    async fn test_bind_conflict_is_reported() {
        let first = OscTransport::open(loopback(), loopback()).await.unwrap();
        let taken = first.local_addr().unwrap();

        let second = OscTransport::open(taken, loopback()).await;
        assert!(matches!(second, Err(BridgeError::Bind { .. })));
    }

    #[tokio::test]
    async fn test_send_and_receive_over_loopback() {
        let mut receiver = OscTransport::open(loopback(), loopback()).await.unwrap();
        let receiver_addr = receiver.local_addr().unwrap();
        let sender = OscTransport::open(loopback(), receiver_addr).await.unwrap();

        let msg = OscMessage {
            addr: "/ggo/cmd/update".into(),
            args: vec![OscType::Int(1)],
        };
        sender.send(&msg).unwrap();

        let received = tokio::time::timeout(Duration::from_secs(2), receiver.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(received, vec![msg]);

        sender.close();
        receiver.close();
    }
}
