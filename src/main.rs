//! LeetSync CLI - copy accepted LeetCode solutions into GitHub
//!
//! Usage:
//!   lcsync link       - Link a GitHub account (opens the browser)
//!   lcsync push       - Push one solution
//!   lcsync push-all   - Push every accepted solution
//!   lcsync sync       - Let the relay run the sync script
//!   lcsync status     - Show the linked account
//!   lcsync unlink     - Forget the linked account

mod cli;

use anyhow::Result;
use clap::Parser;
use cli::Cli;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let log_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(format!("leetsync={}", log_level).parse()?)
                .add_directive(format!("leetsync_core={}", log_level).parse()?),
        )
        .with_target(false)
        .init();

    cli::commands::run(cli).await
}
