//! Configuration file watcher for hot-reload support
//!
//! Editors usually emit several events per save (truncate, write, rename), so
//! events only feed a single reload task that waits for a quiet period before
//! re-reading the file. A reload whose content equals the last accepted one is
//! dropped: re-running `init` would rebind the socket and resync for nothing.

use anyhow::{Context, Result};
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use std::ffi::OsString;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use super::BridgeConfig;

/// Quiet period after the last file event before the file is re-read
const SETTLE_DELAY: Duration = Duration::from_millis(100);

/// A changed configuration together with the one it replaces
#[derive(Debug, Clone)]
pub struct ConfigReload {
    pub config: BridgeConfig,
    previous: BridgeConfig,
}

impl ConfigReload {
    /// Channel count changed, so the variable catalog must be redefined
    pub fn channels_changed(&self) -> bool {
        self.config.channels != self.previous.channels
    }

    /// Target, local port or namespace changed
    pub fn endpoint_changed(&self) -> bool {
        self.config.remote_addr() != self.previous.remote_addr()
            || self.config.local_addr() != self.previous.local_addr()
            || self.config.namespace != self.previous.namespace
    }
}

/// Watches the config file and yields validated, actually-changed configs
pub struct ConfigWatcher {
    _watcher: RecommendedWatcher,
    rx: mpsc::Receiver<ConfigReload>,
}

impl ConfigWatcher {
    /// Load `config_path` and start watching it
    pub async fn new(config_path: String) -> Result<(Self, Arc<BridgeConfig>)> {
        let initial_config = BridgeConfig::load(&config_path)
            .await
            .context("Failed to load initial config")?;
        let initial_config = Arc::new(initial_config);

        let path = PathBuf::from(&config_path);
        let file_name = path
            .file_name()
            .map(|name| name.to_os_string())
            .with_context(|| format!("Config path has no file name: {}", config_path))?;
        // Watch the directory: saving via rename replaces the file's inode
        let directory = match path.parent() {
            Some(dir) if !dir.as_os_str().is_empty() => dir.to_path_buf(),
            _ => PathBuf::from("."),
        };

        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let (tx, rx) = mpsc::channel(10);

        // notify callbacks run on their own OS thread; only forward a wake-up
        let mut watcher = notify::recommended_watcher(move |res: Result<Event, notify::Error>| {
            match res {
                Ok(event) if touches_config(&event, &file_name) => {
                    debug!("Config file event: {:?}", event.kind);
                    let _ = event_tx.send(());
                }
                Ok(_) => {}
                Err(e) => error!("Watch error: {}", e),
            }
        })?;

        watcher
            .watch(&directory, RecursiveMode::NonRecursive)
            .with_context(|| format!("Failed to watch config directory: {}", directory.display()))?;

        tokio::spawn(reload_loop(
            config_path.clone(),
            (*initial_config).clone(),
            event_rx,
            tx,
        ));

        info!("Config file watcher started for: {}", config_path);

        Ok((
            Self {
                _watcher: watcher,
                rx,
            },
            initial_config,
        ))
    }

    /// Wait for the next changed config
    /// Returns None if the watcher has been closed
    pub async fn next_config(&mut self) -> Option<ConfigReload> {
        self.rx.recv().await
    }
}

fn touches_config(event: &Event, file_name: &OsString) -> bool {
    matches!(event.kind, EventKind::Modify(_) | EventKind::Create(_))
        && event
            .paths
            .iter()
            .any(|p| p.file_name() == Some(file_name.as_os_str()))
}

/// Coalesce bursts of file events into one re-read each
async fn reload_loop(
    config_path: String,
    mut current: BridgeConfig,
    mut events: mpsc::UnboundedReceiver<()>,
    tx: mpsc::Sender<ConfigReload>,
) {
    while events.recv().await.is_some() {
        // Wait until the file has been quiet for the settle delay
        loop {
            match tokio::time::timeout(SETTLE_DELAY, events.recv()).await {
                Ok(Some(())) => continue,
                Ok(None) => return,
                Err(_) => break,
            }
        }

        let config = match BridgeConfig::load(&config_path).await {
            Ok(config) => config,
            Err(e) => {
                warn!("Failed to reload config (keeping old config): {:#}", e);
                continue;
            }
        };

        if config == current {
            debug!("Config file rewritten without changes");
            continue;
        }

        info!("Configuration reloaded successfully");
        let reload = ConfigReload {
            config: config.clone(),
            previous: std::mem::replace(&mut current, config),
        };
        if tx.send(reload).await.is_err() {
            return;
        }
    }
}
