//! Devmon CLI
//!
//! Command-line interface for the device state polling and notification service.

use std::path::PathBuf;

use clap::Parser;
use devmon::{load_config, Config, DevmonBuilder};
use tracing::Level;

#[derive(Parser)]
#[command(name = "devmon")]
#[command(about = "Device state polling and change notification service")]
#[command(version)]
struct Args {
    /// Path to configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Dashboard port (overrides config file)
    #[arg(long)]
    dashboard_port: Option<u16>,

    /// Log level
    #[arg(short, long, default_value = "info")]
    log_level: Level,

    /// Print a sample configuration as JSON and exit
    #[arg(long)]
    print_example_config: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    if args.print_example_config {
        println!("{}", serde_json::to_string_pretty(&Config::example())?);
        return Ok(());
    }

    tracing_subscriber::fmt()
        .with_max_level(args.log_level)
        .init();

    tracing::debug!(
        "Parsed command line arguments: config={:?}, dashboard_port={:?}, log_level={:?}",
        args.config,
        args.dashboard_port,
        args.log_level
    );

    let mut config = if let Some(config_path) = &args.config {
        tracing::debug!("Loading configuration from {:?}", config_path);
        load_config(config_path)?
    } else {
        tracing::debug!("Using default configuration");
        Config::default()
    };

    config.resolve_secrets()?;

    if let Some(dashboard_port) = args.dashboard_port {
        config.dashboard.port = dashboard_port;
    }

    tracing::info!("Starting devmon service");
    tracing::debug!(
        "Devices: {} ({} enabled), Groups: {}",
        config.devices.len(),
        config.enabled_devices().count(),
        config.groups.len()
    );

    DevmonBuilder::new(config).build().await?.start().await?;

    Ok(())
}
