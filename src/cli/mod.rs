//! CLI definitions for LeetSync.

pub mod commands;

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// LeetSync - keep your accepted LeetCode solutions in your own GitHub repository
#[derive(Parser)]
#[command(name = "lcsync")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Config file (default: ~/.config/leetsync/leetsync.toml)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Link a GitHub account and create the solutions repository if needed
    Link,

    /// Forget the linked account
    Unlink,

    /// Show the linked account
    Status {
        /// Also check the stored token against GitHub
        #[arg(long)]
        verify: bool,
    },

    /// Push one solution (reads the code from --file or stdin)
    Push {
        /// Frontend problem number, e.g. 42
        #[arg(long)]
        problem_id: String,

        /// Problem slug, e.g. trapping-rain-water
        #[arg(long)]
        title_slug: String,

        /// Language name as LeetCode reports it, e.g. python3
        #[arg(long)]
        lang: String,

        /// Source file (default: stdin)
        #[arg(short, long)]
        file: Option<PathBuf>,
    },

    /// Fetch every accepted solution from LeetCode and push it
    PushAll {
        /// LEETCODE_SESSION cookie
        #[arg(long, env = "LEETCODE_SESSION", hide_env_values = true)]
        session: String,
    },

    /// Ask the relay to run the full sync script
    Sync {
        /// LEETCODE_SESSION cookie
        #[arg(long, env = "LEETCODE_SESSION", hide_env_values = true)]
        session: String,
    },
}
