//! Sync Orchestrator - pushes one solution into the linked repository.
//!
//! Flow: path -> encode -> probe for sha -> write -> (404 on write only)
//! create repository once -> write once more. Nothing loops.

use crate::error::{ProviderError, SyncFailure};
use crate::provider::{ProviderApi, RemoteFile, RepositoryId, Visibility};
use crate::store::LinkedAccount;
use crate::submission::SubmissionRecord;
use std::fmt;
use std::sync::Arc;
use tracing::{info, warn};

/// Step of `push_submission` that failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncStage {
    ResolveRepository,
    ProbeFile,
    WriteFile,
    CreateRepository,
    RetryWrite,
}

impl fmt::Display for SyncStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::ResolveRepository => "repository lookup",
            Self::ProbeFile => "file probe",
            Self::WriteFile => "write",
            Self::CreateRepository => "repository creation",
            Self::RetryWrite => "retry write",
        };
        f.write_str(name)
    }
}

/// A successful push.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncOutcome {
    pub path: String,
    /// Blob sha of the written file
    pub sha: String,
    /// The file did not exist before
    pub created: bool,
    /// The repository had to be created and the write retried
    pub retried: bool,
}

/// Pushes submissions with a provider client.
pub struct Syncer<P: ProviderApi> {
    provider: Arc<P>,
    branch: String,
}

impl<P: ProviderApi> Syncer<P> {
    pub fn new(provider: Arc<P>, branch: impl Into<String>) -> Self {
        Self {
            provider,
            branch: branch.into(),
        }
    }

    /// Create or update the submission's file in the account's repository.
    pub async fn push_submission(
        &self,
        account: &LinkedAccount,
        submission: &SubmissionRecord,
    ) -> Result<SyncOutcome, SyncFailure> {
        let repo: RepositoryId = account.repository.parse().map_err(|raw| SyncFailure {
            stage: SyncStage::ResolveRepository,
            status: None,
            body: format!("invalid repository identifier '{}'", raw),
        })?;
        let token = account.access_token.as_str();
        let path = submission.target_path();

        let existing = self
            .provider
            .get_file(token, &repo, &path)
            .await
            .map_err(|e| SyncFailure::from_provider(SyncStage::ProbeFile, &e))?;

        let file = RemoteFile {
            path: path.clone(),
            content: submission.encoded_content(),
            sha: existing.map(|meta| meta.sha),
            branch: self.branch.clone(),
        };
        let created = file.sha.is_none();
        let message = format!("Add {}", path);

        let first = self.provider.put_file(token, &repo, &file, &message).await;
        let (outcome, retried) = match first {
            Ok(outcome) => (outcome, false),
            Err(ProviderError::Write { status: 404, body }) => {
                warn!(
                    "[sync] Write to {} returned 404 ({}), creating repository and retrying once",
                    repo, body
                );
                self.provider
                    .create_repository(token, &repo.name, Visibility::Public)
                    .await
                    .map_err(|e| SyncFailure::from_provider(SyncStage::CreateRepository, &e))?;

                let outcome = self
                    .provider
                    .put_file(token, &repo, &file, &message)
                    .await
                    .map_err(|e| SyncFailure::from_provider(SyncStage::RetryWrite, &e))?;
                (outcome, true)
            }
            Err(e) => return Err(SyncFailure::from_provider(SyncStage::WriteFile, &e)),
        };

        info!(
            "[sync] {} {} in {}",
            if created { "Created" } else { "Updated" },
            path,
            repo
        );

        Ok(SyncOutcome {
            path: outcome.path,
            sha: outcome.sha,
            created,
            retried,
        })
    }
}
