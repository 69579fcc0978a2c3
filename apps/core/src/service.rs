//! Service facade - the operations a front end calls.
//!
//! `ensure_linked`, `push_submission`, `get_status`, `unlink`, plus the two
//! bulk paths: `run_remote_sync` (relay script) and `push_all` (direct).
//! Operations that read-modify-write the account hold the per-installation
//! lock for their whole duration.

use crate::config::Config;
use crate::error::{Error, SyncFailure};
use crate::leetcode::LeetCodeClient;
use crate::link::{LinkStatus, Linker};
use crate::lock::KeyedLock;
use crate::oauth::Authorizer;
use crate::provider::ProviderApi;
use crate::relay::{RelayClient, ScriptOutcome, ScriptRequest};
use crate::store::{LinkedAccount, TokenStore};
use crate::submission::SubmissionRecord;
use crate::sync::{SyncOutcome, Syncer};
use std::sync::Arc;
use tracing::{info, warn};

/// Result of a bulk push. Failures don't stop the remaining submissions.
#[derive(Debug, Default)]
pub struct PushReport {
    pub pushed: Vec<SyncOutcome>,
    pub failed: Vec<(String, SyncFailure)>,
}

impl PushReport {
    pub fn is_clean(&self) -> bool {
        self.failed.is_empty()
    }
}

pub struct LeetSync<P: ProviderApi, S: TokenStore, A: Authorizer> {
    linker: Linker<P, S, A>,
    syncer: Syncer<P>,
    relay: RelayClient,
    locks: KeyedLock,
    account_key: String,
}

impl<P: ProviderApi, S: TokenStore, A: Authorizer> LeetSync<P, S, A> {
    pub fn new(
        config: &Config,
        provider: Arc<P>,
        store: Arc<S>,
        authorizer: Arc<A>,
        relay: RelayClient,
    ) -> Self {
        Self {
            linker: Linker::new(
                provider.clone(),
                store,
                authorizer,
                config.github.repo_prefix.clone(),
            ),
            syncer: Syncer::new(provider, config.github.branch.clone()),
            relay,
            locks: KeyedLock::new(),
            account_key: config.installation_id.clone(),
        }
    }

    /// Linked account, linking interactively if needed.
    pub async fn ensure_linked(&self) -> Result<LinkedAccount, Error> {
        let _guard = self.locks.acquire(&self.account_key).await;
        Ok(self.linker.ensure_linked().await?)
    }

    /// Push one solution. Links first if no account is stored.
    pub async fn push_submission(
        &self,
        submission: &SubmissionRecord,
    ) -> Result<SyncOutcome, Error> {
        let _guard = self.locks.acquire(&self.account_key).await;
        let account = self.linker.ensure_linked().await?;
        Ok(self.syncer.push_submission(&account, submission).await?)
    }

    /// What the store says. No network, no lock.
    pub fn get_status(&self) -> Result<LinkStatus, Error> {
        self.linker.status()
    }

    /// Whether GitHub still accepts the stored token.
    pub async fn verify(&self) -> Result<bool, Error> {
        self.linker.verify().await
    }

    pub async fn unlink(&self) -> Result<(), Error> {
        let _guard = self.locks.acquire(&self.account_key).await;
        self.linker.unlink()
    }

    /// Hand the sync to the relay's external script.
    pub async fn run_remote_sync(&self, leetcode_session: &str) -> Result<ScriptOutcome, Error> {
        let _guard = self.locks.acquire(&self.account_key).await;
        let account = self.linker.ensure_linked().await?;
        let request = ScriptRequest {
            leetcode_session: leetcode_session.to_string(),
            github_token: account.access_token,
            github_repo: account.repository,
        };
        Ok(self.relay.run_script(&request).await?)
    }

    /// Fetch every accepted solution from LeetCode and push each one.
    pub async fn push_all(&self, leetcode: &LeetCodeClient) -> Result<PushReport, Error> {
        let _guard = self.locks.acquire(&self.account_key).await;
        let account = self.linker.ensure_linked().await?;
        let records = leetcode.collect_records().await?;
        info!("[sync] Pushing {} solution(s) to {}", records.len(), account.repository);

        let mut report = PushReport::default();
        for record in &records {
            match self.syncer.push_submission(&account, record).await {
                Ok(outcome) => report.pushed.push(outcome),
                Err(failure) => {
                    warn!("[sync] {}: {}", record.target_path(), failure);
                    report.failed.push((record.target_path(), failure));
                }
            }
        }
        Ok(report)
    }
}
