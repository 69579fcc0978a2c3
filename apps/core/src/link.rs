//! Link Orchestrator - turns "not linked" into a persisted `LinkedAccount`.
//!
//! `ensure_linked`:
//! 1. Stored account with a token -> return it, no network
//! 2. Authorize (redirect + relay exchange)
//! 3. Resolve the username
//! 4. Repository name is `{prefix}{username}`
//! 5. Create the repository (public) only if it is missing
//! 6. Persist everything in one write

use crate::error::{Error, LinkError, LinkStage, ProviderError};
use crate::oauth::Authorizer;
use crate::provider::{ProviderApi, RepositoryId, Visibility};
use crate::store::{LinkedAccount, TokenStore};
use std::sync::Arc;
use tracing::info;

/// What the store says about the link, without touching the network.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkStatus {
    NotLinked,
    Linked { username: String, repository: String },
}

pub struct Linker<P: ProviderApi, S: TokenStore, A: Authorizer> {
    provider: Arc<P>,
    store: Arc<S>,
    authorizer: Arc<A>,
    repo_prefix: String,
}

impl<P: ProviderApi, S: TokenStore, A: Authorizer> Linker<P, S, A> {
    pub fn new(
        provider: Arc<P>,
        store: Arc<S>,
        authorizer: Arc<A>,
        repo_prefix: impl Into<String>,
    ) -> Self {
        Self {
            provider,
            store,
            authorizer,
            repo_prefix: repo_prefix.into(),
        }
    }

    /// Return the linked account, linking first if needed.
    pub async fn ensure_linked(&self) -> Result<LinkedAccount, LinkError> {
        let stored = self
            .store
            .load()
            .map_err(|e| LinkError::new(LinkStage::LoadAccount, e))?;
        if let Some(account) = stored.filter(LinkedAccount::is_complete) {
            info!("[link] Already linked as {}", account.username);
            return Ok(account);
        }

        info!("[link] Starting GitHub authorization");
        let token = self
            .authorizer
            .authorize()
            .await
            .map_err(|e| LinkError::new(LinkStage::Authorize, e))?;

        let username = self
            .provider
            .current_user(&token)
            .await
            .map_err(|e| LinkError::new(LinkStage::ResolveUser, e))?;

        let repo = RepositoryId::for_user(&self.repo_prefix, &username);

        let exists = self
            .provider
            .repository_exists(&token, &repo)
            .await
            .map_err(|e| LinkError::new(LinkStage::CheckRepository, e))?;

        if exists {
            info!("[link] Repository {} already exists", repo);
        } else {
            info!("[link] Creating repository {}", repo);
            self.provider
                .create_repository(&token, &repo.name, Visibility::Public)
                .await
                .map_err(|e| LinkError::new(LinkStage::CreateRepository, e))?;
        }

        let account = LinkedAccount::new(token, username, repo.to_string());
        self.store
            .save(&account)
            .map_err(|e| LinkError::new(LinkStage::Persist, e))?;
        self.authorizer.mark_linked();

        info!("[link] Linked {} -> {}", account.username, account.repository);
        Ok(account)
    }

    /// Linked account, if any. No network.
    pub fn status(&self) -> Result<LinkStatus, Error> {
        Ok(match self.store.load()? {
            Some(account) if account.is_complete() => LinkStatus::Linked {
                username: account.username,
                repository: account.repository,
            },
            _ => LinkStatus::NotLinked,
        })
    }

    /// Check the stored token against GitHub. `false` if it was rejected.
    pub async fn verify(&self) -> Result<bool, Error> {
        let Some(account) = self.store.load()?.filter(LinkedAccount::is_complete) else {
            return Ok(false);
        };
        match self.provider.current_user(&account.access_token).await {
            Ok(_) => Ok(true),
            Err(ProviderError::Auth) => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    /// Forget the linked account.
    pub fn unlink(&self) -> Result<(), Error> {
        self.store.clear()?;
        info!("[link] Unlinked");
        Ok(())
    }
}
