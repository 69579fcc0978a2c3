//! LeetSync relay - holds the OAuth client secret for the CLI.
//!
//! Usage:
//!   lcsync-relay               - Serve on the configured address
//!   lcsync-relay --init        - Write a default config file and exit

mod config;
mod error;
mod script;
mod server;

use anyhow::Result;
use clap::Parser;
use config::{default_config_path, RelayConfig, CLIENT_SECRET_ENV};
use std::path::PathBuf;
use tracing::{info, warn};

/// LeetSync relay - OAuth token exchange and sync script runner
#[derive(Parser)]
#[command(name = "lcsync-relay")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Config file (default: ~/.config/leetsync/lcsync-relay.toml)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Listen address, overrides the config file
    #[arg(short, long)]
    bind: Option<String>,

    /// Write a default config file and exit
    #[arg(long)]
    init: bool,

    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let log_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(format!("leetsync_relay={}", log_level).parse()?)
                .add_directive(format!("tower_http={}", log_level).parse()?),
        )
        .with_target(false)
        .init();

    let config_path = cli.config.unwrap_or_else(default_config_path);

    if cli.init {
        RelayConfig::default().save(&config_path)?;
        info!("[relay] Wrote {}", config_path.display());
        return Ok(());
    }

    let mut config =
        RelayConfig::load(&config_path)?.with_env_secret(std::env::var(CLIENT_SECRET_ENV).ok());
    if let Some(bind) = cli.bind {
        config.bind = bind;
    }
    if config.client_secret.is_empty() {
        warn!(
            "[relay] No client secret configured, set {} or client_secret in {}",
            CLIENT_SECRET_ENV,
            config_path.display()
        );
    }

    server::serve(config).await
}
