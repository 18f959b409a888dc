//! Tollgate facilitator node: entry point.
//!
//! Starts the facilitator with configuration from a TOML file or defaults.

use clap::Parser;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use tollgate_node::{TollgateConfig, TollgateNode};

/// Tollgate facilitator node
#[derive(Parser, Debug)]
#[command(name = "tollgate-node", version, about = "Tollgate payment facilitator")]
struct Args {
    /// Path to the configuration file (TOML).
    #[arg(short, long, default_value = "tollgate.toml", env = "TOLLGATE_CONFIG")]
    config: PathBuf,

    /// Override the API port.
    #[arg(long)]
    api_port: Option<u16>,

    /// Override the workflow engine base URL.
    #[arg(long, env = "TOLLGATE_ENGINE_URL")]
    engine_url: Option<String>,

    /// Override the log level (trace, debug, info, warn, error).
    #[arg(long)]
    log_level: Option<String>,

    /// Generate a default config file and exit.
    #[arg(long)]
    init: bool,
}

fn init_tracing(level: &str, format: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    if format == "json" {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(true)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(true)
            .init();
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // Handle --init flag
    if args.init {
        init_tracing(args.log_level.as_deref().unwrap_or("info"), "text");
        let config = TollgateConfig::default();
        config.save(&args.config)?;
        tracing::info!(path = %args.config.display(), "wrote default config");
        return Ok(());
    }

    // Load configuration
    let mut config = TollgateConfig::load(&args.config)?;

    // Apply CLI overrides
    if let Some(api_port) = args.api_port {
        config.api.port = api_port;
    }
    if let Some(engine_url) = args.engine_url {
        config.engine.url = engine_url;
    }
    if let Some(level) = args.log_level {
        config.logging.level = level;
    }

    init_tracing(&config.logging.level, &config.logging.format);
    tracing::info!("Tollgate facilitator v{}", env!("CARGO_PKG_VERSION"));

    let mut node = TollgateNode::new(config)?;
    node.start();

    // Set up graceful shutdown on SIGINT
    let shutdown = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to listen for ctrl-c");
        tracing::info!("received shutdown signal");
    };

    tokio::select! {
        result = node.run() => {
            if let Err(e) = result {
                tracing::error!(error = %e, "API server error");
            }
        }
        _ = shutdown => {
            tracing::info!("initiating graceful shutdown");
        }
    }

    node.shutdown().await?;
    tracing::info!("Tollgate node exited cleanly");
    Ok(())
}
