//! Command implementations for the LeetSync CLI.
//!
//! Every command builds the same service (GitHub client, token store,
//! browser-based authorizer, relay client) from the config file, then calls
//! one facade operation.

use super::{Cli, Commands};
use anyhow::{bail, Context, Result};
use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};
use leetsync_core::config::{default_config_path, StoreBackend};
use leetsync_core::leetcode::LeetCodeClient;
use leetsync_core::{
    AuthorizationFlow, Config, FileTokenStore, FlowSettings, GitHubClient, KeyringTokenStore,
    LeetSync, LinkStatus, LoopbackRedirect, RelayClient, SubmissionRecord, TokenStore,
};
use std::future::Future;
use std::io::Read;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::debug;

type Authorizer = AuthorizationFlow<LoopbackRedirect, RelayClient>;
type Service<S> = LeetSync<GitHubClient, S, Authorizer>;

/// Load the config and dispatch on the configured token store.
pub async fn run(cli: Cli) -> Result<()> {
    let config_path = cli.config.clone().unwrap_or_else(default_config_path);
    let config = Config::load_or_init(&config_path)?;
    debug!("[cli] Using config {}", config_path.display());

    match config.store.backend {
        StoreBackend::File => {
            let store = Arc::new(FileTokenStore::new(config.account_path()));
            execute(cli.command, &config, store).await
        }
        StoreBackend::Keyring => {
            let store = Arc::new(KeyringTokenStore::new());
            execute(cli.command, &config, store).await
        }
    }
}

async fn execute<S: TokenStore + 'static>(
    command: Commands,
    config: &Config,
    store: Arc<S>,
) -> Result<()> {
    let relay = RelayClient::new(&config.relay.base_url);
    let redirect = LoopbackRedirect::new(config.oauth.callback_port, &config.installation_id);

    let cancel = redirect.cancel_token();

    let authorizer = AuthorizationFlow::new(
        FlowSettings {
            authorize_url: config.github.authorize_url.clone(),
            client_id: config.github.client_id.clone(),
            scope: config.github.scope.clone(),
        },
        redirect,
        relay.clone(),
    );
    let provider = GitHubClient::new(&config.github.api_base)
        .with_context(|| format!("Invalid GitHub API base: {}", config.github.api_base))?;

    let service = LeetSync::new(
        config,
        Arc::new(provider),
        store,
        Arc::new(authorizer),
        relay,
    );

    match command {
        Commands::Link => interruptible(cancel, cmd_link(&service)).await,
        Commands::Unlink => cmd_unlink(&service).await,
        Commands::Status { verify } => cmd_status(&service, verify).await,
        Commands::Push {
            problem_id,
            title_slug,
            lang,
            file,
        } => {
            let code = read_code(file.as_deref())?;
            let record = SubmissionRecord::new(problem_id, title_slug, lang, code);
            interruptible(cancel, cmd_push(&service, &record)).await
        }
        Commands::PushAll { session } => {
            interruptible(cancel, cmd_push_all(&service, config, &session)).await
        }
        Commands::Sync { session } => interruptible(cancel, cmd_sync(&service, &session)).await,
    }
}

/// Run a command that may open the browser authorization. Ctrl-C cancels the
/// pending redirect and abandons the command.
async fn interruptible(
    cancel: CancellationToken,
    work: impl Future<Output = Result<()>>,
) -> Result<()> {
    tokio::spawn({
        let cancel = cancel.clone();
        async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                cancel.cancel();
            }
        }
    });

    tokio::select! {
        result = work => result,
        _ = cancel.cancelled() => bail!("Cancelled by user"),
    }
}

fn spinner(message: &str) -> Result<ProgressBar> {
    let pb = ProgressBar::new_spinner();
    pb.set_style(ProgressStyle::with_template("  {spinner:.cyan} {msg}")?);
    pb.set_message(message.to_string());
    pb.enable_steady_tick(Duration::from_millis(100));
    Ok(pb)
}

/// Solution source from a file, or stdin when no file is given.
fn read_code(file: Option<&Path>) -> Result<String> {
    let code = match file {
        Some(path) => std::fs::read_to_string(path)
            .with_context(|| format!("Cannot read solution file: {}", path.display()))?,
        None => {
            let mut buf = String::new();
            std::io::stdin()
                .read_to_string(&mut buf)
                .context("Cannot read solution from stdin")?;
            buf
        }
    };

    if code.trim().is_empty() {
        bail!("Solution code is empty");
    }
    Ok(code)
}

// ============ LINK COMMAND ============

async fn cmd_link<S: TokenStore>(service: &Service<S>) -> Result<()> {
    println!("{}", "🔗 LeetSync - Link GitHub".bold().cyan());
    println!();

    let pb = spinner("Waiting for GitHub authorization (Ctrl-C to cancel)...")?;
    let result = service.ensure_linked().await;
    pb.finish_and_clear();

    let account = result?;
    println!(
        "{} Linked as {}",
        "✓".green(),
        account.username.green().bold()
    );
    println!("  Repository: {}", account.repository.cyan());
    println!();
    println!(
        "You can now run {} to push your solutions.",
        "lcsync push-all".cyan()
    );
    Ok(())
}

// ============ UNLINK COMMAND ============

async fn cmd_unlink<S: TokenStore>(service: &Service<S>) -> Result<()> {
    service.unlink().await?;
    println!("{} Account unlinked", "✓".green());
    Ok(())
}

// ============ STATUS COMMAND ============

async fn cmd_status<S: TokenStore>(service: &Service<S>, verify: bool) -> Result<()> {
    println!("{}", "📊 LeetSync Status".bold().cyan());
    println!();

    match service.get_status()? {
        LinkStatus::NotLinked => {
            println!("  GitHub: {}", "not linked".yellow());
            println!();
            println!("Run {} to link an account.", "lcsync link".cyan());
        }
        LinkStatus::Linked {
            username,
            repository,
        } => {
            println!("  GitHub:     {}", username.green());
            println!("  Repository: {}", repository.cyan());

            if verify {
                let pb = spinner("Checking token...")?;
                let valid = service.verify().await;
                pb.finish_and_clear();
                if valid? {
                    println!("  Token:      {}", "valid".green());
                } else {
                    println!(
                        "  Token:      {} (run {} then {})",
                        "rejected by GitHub".red(),
                        "lcsync unlink".cyan(),
                        "lcsync link".cyan()
                    );
                }
            }
        }
    }
    Ok(())
}

// ============ PUSH COMMAND ============

async fn cmd_push<S: TokenStore>(service: &Service<S>, record: &SubmissionRecord) -> Result<()> {
    let pb = spinner(&format!("Pushing {}...", record.target_path()))?;
    let result = service.push_submission(record).await;
    pb.finish_and_clear();

    let outcome = result?;
    let action = if outcome.created { "Created" } else { "Updated" };
    println!("{} {} {}", "✓".green(), action, outcome.path.cyan());
    if outcome.retried {
        println!(
            "  {}",
            "Repository was missing and has been recreated".dimmed()
        );
    }
    Ok(())
}

// ============ PUSH-ALL COMMAND ============

async fn cmd_push_all<S: TokenStore>(
    service: &Service<S>,
    config: &Config,
    session: &str,
) -> Result<()> {
    println!("{}", "🔄 LeetSync - Push all accepted solutions".bold().cyan());
    println!();

    let leetcode = LeetCodeClient::new(&config.leetcode, session);
    let pb = spinner("Fetching submissions and pushing...")?;
    let result = service.push_all(&leetcode).await;
    pb.finish_and_clear();

    let report = result?;
    for outcome in &report.pushed {
        let action = if outcome.created { "+" } else { "~" };
        println!("  {} {}", action.green(), outcome.path);
    }
    for (path, failure) in &report.failed {
        println!("  {} {}: {}", "✗".red(), path, failure);
    }

    println!();
    println!(
        "{} pushed, {} failed",
        report.pushed.len().to_string().green(),
        report.failed.len().to_string().red()
    );

    if !report.is_clean() {
        bail!("{} solution(s) could not be pushed", report.failed.len());
    }
    Ok(())
}

// ============ SYNC COMMAND ============

async fn cmd_sync<S: TokenStore>(service: &Service<S>, session: &str) -> Result<()> {
    println!("{}", "🔄 LeetSync - Relay sync".bold().cyan());
    println!();

    let pb = spinner("Running sync script on the relay...")?;
    let result = service.run_remote_sync(session).await;
    pb.finish_and_clear();

    let outcome = result?;
    println!("{} {}", "✓".green(), outcome.message);
    if !outcome.output.trim().is_empty() {
        println!();
        println!("{}", outcome.output.trim_end().dimmed());
    }
    Ok(())
}
