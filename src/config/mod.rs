//! Configuration management for Green-GO GW
//!
//! Handles loading, parsing, validation and hot-reloading of the YAML
//! configuration file that points the bridge at a Green-GO device.

pub mod watcher;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4};
use std::time::Duration;
use tokio::fs;
use tracing::info;

pub use watcher::ConfigWatcher;

/// Highest channel count a Green-GO device exposes
pub const MAX_CHANNELS: u8 = 32;

/// Default OSC namespace used by the Green-GO "osc-remote" script
pub const DEFAULT_NAMESPACE: &str = "ggo";

/// Root configuration structure
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct BridgeConfig {
    /// Target device IPv4 address
    #[serde(skip_serializing_if = "Option::is_none")]
    pub host: Option<String>,
    /// Target device port
    #[serde(skip_serializing_if = "Option::is_none")]
    pub port: Option<u16>,
    /// Local port to listen on (defaults to `port`)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub local_port: Option<u16>,
    #[serde(default = "default_channels")]
    pub channels: u8,
    #[serde(default)]
    pub device_type: DeviceType,
    #[serde(default = "default_namespace")]
    pub namespace: String,
    #[serde(default)]
    pub timing: TimingConfig,
}

/// Green-GO device families selectable in the host UI
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase", try_from = "RawDeviceType")]
pub enum DeviceType {
    #[default]
    Bpx,
    Mcx,
    Wpx,
    Rdx,
    Si4wr,
}

/// Device type as written in a config file: dropdown id or name
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum RawDeviceType {
    Id(u8),
    Name(String),
}

impl TryFrom<RawDeviceType> for DeviceType {
    type Error = String;

    fn try_from(raw: RawDeviceType) -> std::result::Result<Self, Self::Error> {
        match raw {
            RawDeviceType::Id(id) => match id {
                1 => Ok(DeviceType::Bpx),
                2 => Ok(DeviceType::Mcx),
                3 => Ok(DeviceType::Wpx),
                4 => Ok(DeviceType::Rdx),
                5 | 6 => Ok(DeviceType::Si4wr),
                other => Err(format!("unknown device type id {} (must be 1-6)", other)),
            },
            RawDeviceType::Name(name) => DeviceType::upgrade_legacy(&name)
                .ok_or_else(|| format!("unknown device type '{}'", name)),
        }
    }
}

impl DeviceType {
    /// Resolve a device type name, migrating retired values
    ///
    /// `SIWR` and `INTX` are no longer offered and map to `SI4WR`.
    pub fn upgrade_legacy(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "bpx" => Some(DeviceType::Bpx),
            "mcx" | "mcxd" | "mcx(d)" => Some(DeviceType::Mcx),
            "wpx" => Some(DeviceType::Wpx),
            "rdx" => Some(DeviceType::Rdx),
            "si4wr" | "si2wr" => Some(DeviceType::Si4wr),
            legacy @ ("siwr" | "intx") => {
                info!(
                    "Found and updated unsupported device type in the configuration ({} -> SI4WR)",
                    legacy.to_ascii_uppercase()
                );
                Some(DeviceType::Si4wr)
            }
            _ => None,
        }
    }

    /// Human readable label, as shown in the host dropdown
    pub fn label(&self) -> &'static str {
        match self {
            DeviceType::Bpx => "BPX",
            DeviceType::Mcx => "MCX(D)",
            DeviceType::Wpx => "WPX",
            DeviceType::Rdx => "RDX",
            DeviceType::Si4wr => "Si2WR/Si4WR",
        }
    }
}

/// Flush, heartbeat and retry timings
#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq)]
pub struct TimingConfig {
    /// Quiet period before normal state updates are flushed
    #[serde(default = "default_debounce_ms")]
    pub debounce_ms: u64,
    /// Fixed cadence for level/gain telemetry flushes
    #[serde(default = "default_throttle_ms")]
    pub throttle_ms: u64,
    /// Silence after the last heartbeat before the device is considered offline
    #[serde(default = "default_heartbeat_timeout_ms")]
    pub heartbeat_timeout_ms: u64,
    /// Period between repeated state update requests
    #[serde(default = "default_resync_interval_ms")]
    pub resync_interval_ms: u64,
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            debounce_ms: default_debounce_ms(),
            throttle_ms: default_throttle_ms(),
            heartbeat_timeout_ms: default_heartbeat_timeout_ms(),
            resync_interval_ms: default_resync_interval_ms(),
        }
    }
}

impl TimingConfig {
    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }

    pub fn throttle(&self) -> Duration {
        Duration::from_millis(self.throttle_ms)
    }

    pub fn heartbeat_timeout(&self) -> Duration {
        Duration::from_millis(self.heartbeat_timeout_ms)
    }

    pub fn resync_interval(&self) -> Duration {
        Duration::from_millis(self.resync_interval_ms)
    }
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            host: None,
            port: None,
            local_port: None,
            channels: default_channels(),
            device_type: DeviceType::default(),
            namespace: default_namespace(),
            timing: TimingConfig::default(),
        }
    }
}

impl BridgeConfig {
    /// Load configuration from file with validation
    pub async fn load(path: &str) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read config file: {}", path))?;

        Self::from_yaml(&contents).with_context(|| format!("Invalid config file: {}", path))
    }

    /// Parse and validate configuration from a YAML string
    pub fn from_yaml(contents: &str) -> Result<Self> {
        let config: BridgeConfig =
            serde_yaml::from_str(contents).context("Failed to parse YAML config")?;

        config.validate()?;

        Ok(config)
    }

    /// Save configuration to file
    pub async fn save(&self, path: &str) -> Result<()> {
        let yaml = serde_yaml::to_string(self).context("Failed to serialize config to YAML")?;

        fs::write(path, yaml)
            .await
            .with_context(|| format!("Failed to write config file: {}", path))?;

        Ok(())
    }

    /// Validate configuration for correctness and consistency
    ///
    /// Host and port may be absent (the bridge then reports a warning status
    /// instead of opening the transport), but when present they must be valid.
    pub fn validate(&self) -> Result<()> {
        if let Some(host) = &self.host {
            host.parse::<Ipv4Addr>()
                .with_context(|| format!("Target IP '{}' is not a valid IPv4 address", host))?;
        }
        if self.port == Some(0) {
            anyhow::bail!("Target port must be between 1 and 65535");
        }
        if self.local_port == Some(0) {
            anyhow::bail!("Local port must be between 1 and 65535");
        }
        if self.channels == 0 || self.channels > MAX_CHANNELS {
            anyhow::bail!(
                "Channel count {} is invalid (must be 1-{})",
                self.channels,
                MAX_CHANNELS
            );
        }
        if self.namespace.is_empty() || self.namespace.contains('/') {
            anyhow::bail!(
                "OSC namespace '{}' must be a single non-empty path segment",
                self.namespace
            );
        }
        let timing = &self.timing;
        if timing.debounce_ms == 0
            || timing.throttle_ms == 0
            || timing.heartbeat_timeout_ms == 0
            || timing.resync_interval_ms == 0
        {
            anyhow::bail!("Timing values must be greater than zero");
        }

        Ok(())
    }

    /// Remote device endpoint, if host and port are configured
    pub fn remote_addr(&self) -> Option<SocketAddr> {
        let ip = self.host.as_deref()?.parse::<Ipv4Addr>().ok()?;
        let port = self.port?;
        Some(SocketAddr::V4(SocketAddrV4::new(ip, port)))
    }

    /// Local endpoint the transport binds to
    pub fn local_addr(&self) -> Option<SocketAddr> {
        let port = self.local_port.or(self.port)?;
        Some(SocketAddr::V4(SocketAddrV4::new(Ipv4Addr::UNSPECIFIED, port)))
    }
}

// Default value functions
fn default_channels() -> u8 { MAX_CHANNELS }
fn default_namespace() -> String { DEFAULT_NAMESPACE.to_string() }
fn default_debounce_ms() -> u64 { 3 }
fn default_throttle_ms() -> u64 { 350 }
fn default_heartbeat_timeout_ms() -> u64 { 5000 }
fn default_resync_interval_ms() -> u64 { 30_000 }
