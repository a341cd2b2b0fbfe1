//! Tests for the bridge actor over loopback UDP

use super::*;
use crate::actions::TALK_CYCLE;
use crate::config::{BridgeConfig, TimingConfig};
use crate::error::BridgeError;
use crate::osc::{decode_packet, encode_message};
use crate::state::{standard_definitions, VariableUpdate, HEARTBEAT_KEY};
use crate::status::InstanceStatus;
use crate::sync::LivenessState;
use rosc::{OscMessage, OscType};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::UdpSocket;
use tokio::sync::mpsc;
use tokio::time::timeout;

fn fast_timing() -> TimingConfig {
    TimingConfig {
        debounce_ms: 3,
        throttle_ms: 50,
        heartbeat_timeout_ms: 200,
        resync_interval_ms: 300,
    }
}

/// Grab a port that is free right now
fn free_port() -> u16 {
    let socket = std::net::UdpSocket::bind("127.0.0.1:0").unwrap();
    socket.local_addr().unwrap().port()
}

/// Simulated Green-GO device plus a config pointing the bridge at it
struct Device {
    socket: UdpSocket,
    bridge_addr: SocketAddr,
    config: BridgeConfig,
}

impl Device {
    async fn start() -> Self {
        let socket = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let device_port = socket.local_addr().unwrap().port();
        let bridge_port = free_port();

        let config = BridgeConfig {
            host: Some("127.0.0.1".to_string()),
            port: Some(device_port),
            local_port: Some(bridge_port),
            channels: 2,
            timing: fast_timing(),
            ..BridgeConfig::default()
        };

        Self {
            socket,
            bridge_addr: SocketAddr::from(([127, 0, 0, 1], bridge_port)),
            config,
        }
    }

    async fn push(&self, addr: &str, args: &[i32]) {
        let message = OscMessage {
            addr: addr.to_string(),
            args: args.iter().map(|v| OscType::Int(*v)).collect(),
        };
        let payload = encode_message(&message).unwrap();
        self.socket.send_to(&payload, self.bridge_addr).await.unwrap();
    }

    async fn recv(&self, wait: Duration) -> Option<OscMessage> {
        let mut buf = [0u8; 1024];
        let (len, _) = timeout(wait, self.socket.recv_from(&mut buf))
            .await
            .ok()?
            .ok()?;
        decode_packet(&buf[..len]).ok()?.into_iter().next()
    }

    async fn expect(&self, addr: &str, args: &[i32]) {
        let message = self
            .recv(Duration::from_secs(2))
            .await
            .unwrap_or_else(|| panic!("device did not receive {}", addr));
        assert_eq!(message.addr, addr);
        let expected: Vec<OscType> = args.iter().map(|v| OscType::Int(*v)).collect();
        assert_eq!(message.args, expected);
    }
}

fn update_channel(bridge: &BridgeHandle) -> mpsc::UnboundedReceiver<Vec<VariableUpdate>> {
    let (tx, rx) = mpsc::unbounded_channel();
    bridge.subscribe(Arc::new(move |changes: &[VariableUpdate]| {
        let _ = tx.send(changes.to_vec());
    }));
    rx
}

async fn next_update(rx: &mut mpsc::UnboundedReceiver<Vec<VariableUpdate>>) -> Vec<VariableUpdate> {
    timeout(Duration::from_secs(2), rx.recv())
        .await
        .expect("no variable update")
        .expect("update channel closed")
}

async fn wait_for_status(bridge: &BridgeHandle, expected: &InstanceStatus) {
    for _ in 0..100 {
        if bridge.status() == *expected {
            return;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    panic!("status stayed {:?}, expected {:?}", bridge.status(), expected);
}

#[tokio::test]
async fn test_init_requests_state_when_variables_are_unknown() {
    let device = Device::start().await;
    let bridge = BridgeHandle::spawn(standard_definitions(2), &fast_timing());

    bridge.init(device.config.clone()).await.unwrap();
    assert_eq!(bridge.status(), InstanceStatus::Ok);

    device.expect("/ggo/cmd/update", &[1]).await;

    bridge.close().await;
    bridge.shutdown();
}

#[tokio::test]
async fn test_state_push_updates_variables_once_per_flush() {
    let device = Device::start().await;
    let bridge = BridgeHandle::spawn(standard_definitions(2), &fast_timing());
    let mut updates = update_channel(&bridge);

    bridge.init(device.config.clone()).await.unwrap();
    device.expect("/ggo/cmd/update", &[1]).await;

    device.push("/ggo/state/channel/talk", &[2, 2]).await;
    device.push("/ggo/state/channel/cue", &[1, 2]).await;

    let mut changed = next_update(&mut updates).await;
    // Both packets normally land in the same debounce window
    if changed.len() == 1 {
        changed.extend(next_update(&mut updates).await);
    }
    changed.sort_by(|a, b| a.key.cmp(&b.key));
    assert_eq!(
        changed,
        vec![
            VariableUpdate::new("state_cue_ch2", 1),
            VariableUpdate::new("state_talk_ch2", 2),
        ]
    );

    assert_eq!(bridge.get("state_talk_ch2").await, Some(2));
    assert_eq!(bridge.get("state_talk_ch1").await, Some(-1));
    assert_eq!(bridge.get("state_nonexistent").await, None);

    bridge.shutdown();
}

#[tokio::test]
async fn test_cycle_and_step_read_latest_value() {
    let device = Device::start().await;
    let bridge = BridgeHandle::spawn(standard_definitions(2), &fast_timing());
    let mut updates = update_channel(&bridge);

    bridge.init(device.config.clone()).await.unwrap();
    device.expect("/ggo/cmd/update", &[1]).await;
    device.push("/ggo/state/updated", &[]).await;

    device.push("/ggo/state/channel/talk", &[2, 1]).await;
    device.push("/ggo/state/level/main", &[10]).await;
    next_update(&mut updates).await;
    next_update(&mut updates).await;

    bridge.cycle_command("channel/talk", "state_talk_ch1", &TALK_CYCLE, [1]);
    device.expect("/ggo/cmd/channel/talk", &[3, 1]).await;

    bridge.step_command("level/main", "state_level_main", 5, -63..=12, Vec::<i32>::new());
    device.expect("/ggo/cmd/level/main", &[12]).await;

    bridge.shutdown();
}

#[tokio::test]
async fn test_heartbeat_loss_sets_warning_and_resyncs() {
    let device = Device::start().await;
    let bridge = BridgeHandle::spawn(standard_definitions(1), &fast_timing());

    bridge.init(device.config.clone()).await.unwrap();
    device.expect("/ggo/cmd/update", &[1]).await;
    device.push("/ggo/state/updated", &[]).await;

    device.push("/ggo/state/heartbeat", &[]).await;
    for _ in 0..50 {
        if bridge.liveness().await == LivenessState::Online {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert_eq!(bridge.liveness().await, LivenessState::Online);
    assert_eq!(bridge.get(HEARTBEAT_KEY).await, Some(1));

    // Silence past the heartbeat timeout
    wait_for_status(&bridge, &InstanceStatus::Warning("Heartbeat lost".to_string())).await;
    assert_eq!(bridge.liveness().await, LivenessState::Offline);
    assert_eq!(bridge.get(HEARTBEAT_KEY).await, Some(0));
    device.expect("/ggo/cmd/update", &[1]).await;

    // Device comes back
    device.push("/ggo/state/heartbeat", &[]).await;
    wait_for_status(&bridge, &InstanceStatus::Ok).await;

    bridge.shutdown();
}

#[tokio::test]
async fn test_reinit_still_detects_silent_device() {
    let device = Device::start().await;
    let bridge = BridgeHandle::spawn(standard_definitions(1), &fast_timing());

    bridge.init(device.config.clone()).await.unwrap();
    device.expect("/ggo/cmd/update", &[1]).await;
    device.push("/ggo/state/updated", &[]).await;
    device.push("/ggo/state/heartbeat", &[]).await;
    for _ in 0..50 {
        if bridge.liveness().await == LivenessState::Online {
            break;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    assert_eq!(bridge.liveness().await, LivenessState::Online);

    // Config reload with the same target, then the device goes quiet
    bridge.init(device.config.clone()).await.unwrap();
    device.expect("/ggo/cmd/update", &[1]).await;
    device.push("/ggo/state/updated", &[]).await;

    wait_for_status(&bridge, &InstanceStatus::Warning("Heartbeat lost".to_string())).await;
    assert_eq!(bridge.liveness().await, LivenessState::Offline);
    assert_eq!(bridge.get(HEARTBEAT_KEY).await, Some(0));
    device.expect("/ggo/cmd/update", &[1]).await;

    bridge.shutdown();
}

#[tokio::test]
async fn test_acknowledgement_stops_retries() {
    let device = Device::start().await;
    let bridge = BridgeHandle::spawn(standard_definitions(1), &fast_timing());

    bridge.init(device.config.clone()).await.unwrap();
    device.expect("/ggo/cmd/update", &[1]).await;
    // Unanswered: retried after the resync interval
    device.expect("/ggo/cmd/update", &[1]).await;

    device.push("/ggo/state/updated", &[]).await;
    assert!(device.recv(Duration::from_millis(700)).await.is_none());

    bridge.shutdown();
}

#[tokio::test]
async fn test_init_without_target_reports_warning() {
    let bridge = BridgeHandle::spawn(standard_definitions(1), &fast_timing());
    let config = BridgeConfig::default();

    let result = bridge.init(config).await;
    assert!(matches!(result, Err(BridgeError::Config(_))));
    assert!(matches!(bridge.status(), InstanceStatus::Warning(_)));

    bridge.shutdown();
}

#[tokio::test]
async fn test_init_reports_bind_failure() {
    let blocker = UdpSocket::bind("0.0.0.0:0").await.unwrap();
    let taken = blocker.local_addr().unwrap().port();

    let mut device = Device::start().await;
    device.config.local_port = Some(taken);

    let bridge = BridgeHandle::spawn(standard_definitions(1), &fast_timing());
    let result = bridge.init(device.config.clone()).await;

    assert!(matches!(result, Err(BridgeError::Bind { .. })));
    assert!(matches!(bridge.status(), InstanceStatus::Error(_)));

    bridge.shutdown();
}

#[tokio::test]
async fn test_close_is_idempotent_and_stops_traffic() {
    let device = Device::start().await;
    let bridge = BridgeHandle::spawn(standard_definitions(1), &fast_timing());

    bridge.init(device.config.clone()).await.unwrap();
    device.expect("/ggo/cmd/update", &[1]).await;

    bridge.close().await;
    bridge.close().await;
    assert_eq!(bridge.status(), InstanceStatus::Disconnected);

    // Neither the pending resync retry nor new commands reach the device
    bridge.send_command("channel/talk", [2, 1]);
    assert!(device.recv(Duration::from_millis(500)).await.is_none());

    // Reinit after close binds again
    bridge.init(device.config.clone()).await.unwrap();
    device.expect("/ggo/cmd/update", &[1]).await;

    bridge.shutdown();
}

#[tokio::test]
async fn test_handle_after_shutdown() {
    let bridge = BridgeHandle::spawn(standard_definitions(1), &fast_timing());
    bridge.shutdown();

    // Give the actor a moment to stop
    tokio::time::sleep(Duration::from_millis(50)).await;

    assert!(matches!(
        bridge.init(BridgeConfig::default()).await,
        Err(BridgeError::ActorGone)
    ));
    assert_eq!(bridge.get("state_talk_ch1").await, None);
    assert!(bridge.snapshot().await.is_empty());
}

#[tokio::test]
async fn test_state_request_before_init_is_a_no_op() {
    let bridge = BridgeHandle::spawn(standard_definitions(1), &fast_timing());

    bridge.request_state_update();
    bridge.send_command("update", 1);

    // Still answering queries, nothing armed
    assert_eq!(bridge.get("state_talk_ch1").await, Some(-1));
    assert_eq!(bridge.status(), InstanceStatus::Disconnected);

    bridge.shutdown();
}
