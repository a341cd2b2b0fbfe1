//! Green-GO GW - standalone runner for the OSC bridge
//!
//! Mirrors a Green-GO device's state into variables and logs every change.

use anyhow::{Context, Result};
use clap::Parser;
use std::sync::Arc;
use tracing::{debug, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use greengo_gw::config::{watcher::ConfigWatcher, MAX_CHANNELS};
use greengo_gw::state::{standard_definitions, VariableDefinition, VariableUpdate};
use greengo_gw::{BridgeConfig, BridgeHandle};

/// Green-GO GW - bridge a Green-GO intercom device over OSC/UDP
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to configuration file
    #[arg(short, long, default_value = "config.yaml")]
    config: String,

    /// Log level (error, warn, info, debug, trace)
    #[arg(short, long, env = "LOG_LEVEL", default_value = "info")]
    log_level: String,

    /// List the variables generated for the configured channel count
    #[arg(long)]
    list_variables: bool,

    /// Print each batch of variable changes as a JSON line on stdout
    #[arg(long)]
    json: bool,

    /// Send one command (name followed by integer values) and exit
    #[arg(long, num_args = 1.., value_names = ["NAME", "VALUES"], allow_negative_numbers = true)]
    send: Option<Vec<String>>,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    let args = Args::parse();

    init_logging(&args.log_level)?;

    info!("Starting Green-GO GW...");
    info!("Configuration file: {}", args.config);

    if args.list_variables {
        list_variables(&args.config).await;
        return Ok(());
    }

    if let Some(send) = &args.send {
        return send_once(&args.config, send).await;
    }

    // Load configuration with hot-reload watcher
    let (config_watcher, initial_config) = ConfigWatcher::new(args.config.clone()).await?;
    info!("Configuration loaded successfully with hot-reload enabled");

    run_app(
        (*initial_config).clone(),
        config_watcher,
        args.json,
        shutdown_signal(),
    )
    .await?;

    info!("Green-GO GW shutdown complete");
    Ok(())
}

async fn run_app(
    config: BridgeConfig,
    mut config_watcher: ConfigWatcher,
    json: bool,
    shutdown: impl std::future::Future<Output = ()>,
) -> Result<()> {
    let bridge = BridgeHandle::spawn(standard_definitions(config.channels), &config.timing);

    bridge.subscribe(Arc::new(move |changes: &[VariableUpdate]| {
        if json {
            match serde_json::to_string(changes) {
                Ok(line) => println!("{}", line),
                Err(e) => warn!("Failed to serialize variable changes: {}", e),
            }
            return;
        }
        for change in changes {
            debug!("{} = {}", change.key, change.value);
        }
        info!("Updated values of {} variables", changes.len());
    }));

    if let Err(e) = bridge.init(config).await {
        warn!("Bridge not connected (waiting for a config change): {}", e);
    }

    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            // Handle config reload
            Some(reload) = config_watcher.next_config() => {
                if reload.endpoint_changed() {
                    info!("Device endpoint changed, reconnecting...");
                } else {
                    info!("Configuration file changed, reapplying...");
                }

                if reload.channels_changed() {
                    bridge.define_variables(standard_definitions(reload.config.channels));
                }

                match bridge.init(reload.config).await {
                    Ok(()) => info!("Configuration applied"),
                    Err(e) => warn!("Failed to apply new configuration: {}", e),
                }
            }

            // Handle shutdown signal
            _ = &mut shutdown => {
                info!("Shutdown signal received, stopping event loop");
                break;
            }
        }
    }

    info!("Shutting down...");
    bridge.close().await;
    bridge.shutdown();

    Ok(())
}

/// Print the variable catalog for the configured channel count
async fn list_variables(config_path: &str) {
    use colored::*;

    let channels = match BridgeConfig::load(config_path).await {
        Ok(config) => config.channels,
        Err(e) => {
            warn!("{:#}; listing variables for {} channels", e, MAX_CHANNELS);
            MAX_CHANNELS
        }
    };

    let definitions = standard_definitions(channels);

    println!("\n{}", "=== Green-GO Variables ===".bold().cyan());
    println!(
        "  Channels: {}   Variables: {}\n",
        channels.to_string().green(),
        definitions.len().to_string().green()
    );
    for def in &definitions {
        println!(
            "  {:<28} {:<24} {}",
            def.key.yellow(),
            def.name,
            def.initial.to_string().dimmed()
        );
    }
}

/// Send a single command to the configured device
async fn send_once(config_path: &str, send: &[String]) -> Result<()> {
    let (name, values) = send
        .split_first()
        .context("--send needs a command name")?;
    let values = values
        .iter()
        .map(|v| {
            v.parse::<i32>()
                .with_context(|| format!("Command value '{}' is not an integer", v))
        })
        .collect::<Result<Vec<i32>>>()?;

    let config = BridgeConfig::load(config_path).await?;

    // No variables: nothing to resync for a one-shot send
    let bridge = BridgeHandle::spawn(Vec::<VariableDefinition>::new(), &config.timing);
    bridge.init(config).await?;
    bridge.send_command(name.as_str(), values);
    bridge.close().await;
    bridge.shutdown();

    info!("Sent {}", name);
    Ok(())
}

fn init_logging(level: &str) -> Result<()> {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level));

    tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_thread_ids(false)
                .with_thread_names(false),
        )
        .init();

    Ok(())
}

async fn shutdown_signal() {
    tokio::signal::ctrl_c()
        .await
        .expect("Failed to install CTRL+C signal handler");
    info!("Shutdown signal received");
}
