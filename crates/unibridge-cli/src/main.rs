//! Command-line entry point for the Unibridge MQTT bridge.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use unibridge_core::config::env_vars;
use unibridge_core::BridgeConfig;
use unibridge_devices::fabric::InMemoryFabric;
use unibridge_devices::transport::MqttTransport;
use unibridge_devices::Bridge;

/// Unibridge - expose device-network nodes as dynamic fabric endpoints.
#[derive(Parser, Debug)]
#[command(name = "unibridge")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Action to perform. Defaults to `run`.
    #[command(subcommand)]
    command: Option<Command>,

    /// Configuration file. Falls back to `config.toml` in the working directory.
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Verbose output.
    #[arg(short, long, global = true)]
    verbose: bool,
}

/// Available commands.
#[derive(Subcommand, Debug)]
enum Command {
    /// Connect to the broker and run the bridge until interrupted.
    Run,
    /// Load and validate the configuration, then print it.
    CheckConfig,
    /// List the compiled-in storage backends.
    Backends,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(args.verbose);

    match args.command.unwrap_or(Command::Run) {
        Command::Run => run_bridge(args.config).await,
        Command::CheckConfig => check_config(args.config),
        Command::Backends => {
            for backend in unibridge_storage::available_backends() {
                println!("{}", backend);
            }
            Ok(())
        }
    }
}

fn init_logging(verbose: bool) {
    // JSON output for container environments
    let json_logging = std::env::var(env_vars::LOG_JSON)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(false);

    let default_directive = if verbose { "unibridge=debug" } else { "unibridge=info" };
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_directive));

    if json_logging {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(env_filter)
            .with_target(true)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .with_target(false)
            .with_thread_ids(false)
            .compact()
            .init();
    }
}

fn load_config(path: Option<PathBuf>) -> Result<BridgeConfig> {
    BridgeConfig::load(path.as_deref()).context("Failed to load configuration")
}

fn check_config(path: Option<PathBuf>) -> Result<()> {
    let mut config = load_config(path)?;
    if config.mqtt.password.is_some() {
        config.mqtt.password = Some("********".to_string());
    }
    let rendered = toml::to_string_pretty(&config).context("Failed to render configuration")?;
    println!("{}", rendered);
    Ok(())
}

async fn run_bridge(path: Option<PathBuf>) -> Result<()> {
    let config = load_config(path)?;

    let storage = unibridge_storage::create_from_settings(&config.storage)
        .context("Failed to open storage backend")?;
    let (transport, incoming) = MqttTransport::connect(&config.mqtt);
    let transport = Arc::new(transport);
    let fabric = Arc::new(InMemoryFabric::new());

    let bridge = Bridge::new(config, transport.clone(), fabric, storage)
        .context("Failed to initialize bridge")?;
    bridge.start().context("Failed to subscribe discovery topics")?;

    tokio::select! {
        _ = bridge.run(incoming) => {
            tracing::warn!("Transport closed");
        }
        result = tokio::signal::ctrl_c() => {
            result.context("Failed to listen for shutdown signal")?;
            tracing::info!("Shutdown requested");
        }
    }

    let stats = bridge.stats();
    tracing::info!(
        reports_applied = stats.reports_applied,
        reports_malformed = stats.reports_malformed,
        endpoints_exposed = stats.endpoints_exposed,
        "Bridge stopped"
    );
    transport.shutdown();
    Ok(())
}
