//! Error types for LeetSync.
//!
//! One enum per component. Every failure that reaches a caller names the
//! stage that failed and carries the underlying status or message.

use crate::sync::SyncStage;
use std::fmt;
use thiserror::Error;

/// Errors from the GitHub REST client.
#[derive(Debug, Error)]
pub enum ProviderError {
    /// The token was rejected (401).
    #[error("GitHub rejected the access token (invalid or expired)")]
    Auth,

    /// A status the operation has no meaning for.
    #[error("GitHub API returned unexpected status {status}: {body}")]
    UnexpectedStatus { status: u16, body: String },

    /// `POST /user/repos` failed; `message` is GitHub's own error message.
    #[error("Failed to create repository: {message}")]
    RepoCreation { message: String },

    /// `PUT /repos/{owner}/{repo}/contents/{path}` failed.
    #[error("Failed to write file ({status}): {body}")]
    Write { status: u16, body: String },

    #[error("Malformed GitHub response: {0}")]
    MalformedResponse(String),

    #[error("Invalid GitHub API URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    #[error("Cannot connect to GitHub API: {0}")]
    Http(#[from] reqwest::Error),
}

impl ProviderError {
    /// HTTP status carried by the error, if any.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Auth => Some(401),
            Self::UnexpectedStatus { status, .. } | Self::Write { status, .. } => Some(*status),
            Self::Http(e) => e.status().map(|s| s.as_u16()),
            Self::RepoCreation { .. } | Self::MalformedResponse(_) | Self::InvalidUrl(_) => None,
        }
    }

    /// Response body or message carried by the error.
    pub fn body(&self) -> String {
        match self {
            Self::UnexpectedStatus { body, .. } | Self::Write { body, .. } => body.clone(),
            Self::RepoCreation { message } => message.clone(),
            other => other.to_string(),
        }
    }
}

/// Errors from the interactive authorization handshake.
#[derive(Debug, Error)]
pub enum AuthFlowError {
    /// The user cancelled, denied access, or no redirect arrived.
    #[error("Authorization denied: {0}")]
    AuthorizationDenied(String),

    /// The redirect URL had no `code` query parameter.
    #[error("Redirect URL is missing the authorization code")]
    MissingCode,

    /// The relay could not turn the code into a token.
    #[error("Token exchange failed ({status}): {detail}")]
    TokenExchange { status: u16, detail: String },

    #[error("Invalid authorization URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    #[error("Redirect listener error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Cannot reach token relay: {0}")]
    Http(#[from] reqwest::Error),
}

/// Errors from the token store backends.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Token store I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Token store contains invalid data: {0}")]
    Serde(#[from] serde_json::Error),

    #[error("Keyring error: {0}")]
    Keyring(#[from] keyring::Error),
}

/// Errors from the relay's `/run_script` endpoint.
#[derive(Debug, Error)]
pub enum RelayError {
    /// The relay answered `{error, details}`.
    #[error("Relay script failed ({status}): {error} - {details}")]
    Script {
        status: u16,
        error: String,
        details: String,
    },

    #[error("Relay returned unexpected status {status}: {body}")]
    UnexpectedStatus { status: u16, body: String },

    #[error("Cannot reach relay: {0}")]
    Http(#[from] reqwest::Error),
}

/// Errors from the LeetCode GraphQL client.
#[derive(Debug, Error)]
pub enum LeetCodeError {
    #[error("LeetCode returned status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Unexpected LeetCode response format: {0}")]
    Format(String),

    #[error("Cannot reach LeetCode: {0}")]
    Http(#[from] reqwest::Error),
}

/// Step of `ensure_linked` that failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkStage {
    LoadAccount,
    Authorize,
    ResolveUser,
    CheckRepository,
    CreateRepository,
    Persist,
}

impl fmt::Display for LinkStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::LoadAccount => "reading stored account",
            Self::Authorize => "authorization",
            Self::ResolveUser => "user lookup",
            Self::CheckRepository => "repository check",
            Self::CreateRepository => "repository creation",
            Self::Persist => "persisting account",
        };
        f.write_str(name)
    }
}

/// Underlying cause of a [`LinkError`].
#[derive(Debug, Error)]
pub enum LinkCause {
    #[error(transparent)]
    Authorization(#[from] AuthFlowError),

    #[error(transparent)]
    Provider(#[from] ProviderError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// `ensure_linked` failed; nothing was persisted.
#[derive(Debug, Error)]
#[error("Linking failed during {stage}: {cause}")]
pub struct LinkError {
    pub stage: LinkStage,
    #[source]
    pub cause: LinkCause,
}

impl LinkError {
    pub fn new(stage: LinkStage, cause: impl Into<LinkCause>) -> Self {
        Self {
            stage,
            cause: cause.into(),
        }
    }
}

/// Terminal result of a failed `push_submission`.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("Sync failed during {stage} (status {}): {body}", display_status(.status))]
pub struct SyncFailure {
    pub stage: SyncStage,
    pub status: Option<u16>,
    pub body: String,
}

fn display_status(status: &Option<u16>) -> String {
    status.map_or_else(|| "n/a".to_string(), |s| s.to_string())
}

impl SyncFailure {
    pub fn from_provider(stage: SyncStage, err: &ProviderError) -> Self {
        Self {
            stage,
            status: err.status(),
            body: err.body(),
        }
    }
}

/// Facade-level error returned by [`crate::LeetSync`].
#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Link(#[from] LinkError),

    #[error(transparent)]
    Sync(#[from] SyncFailure),

    #[error("Cannot access linked account: {0}")]
    Store(#[from] StoreError),

    #[error(transparent)]
    Relay(#[from] RelayError),

    #[error(transparent)]
    LeetCode(#[from] LeetCodeError),

    #[error(transparent)]
    Provider(#[from] ProviderError),

    #[error("Invalid repository identifier '{0}' (expected owner/repo)")]
    InvalidRepository(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sync_failure_display_names_stage() {
        let failure = SyncFailure {
            stage: SyncStage::RetryWrite,
            status: Some(404),
            body: "Not Found".to_string(),
        };
        let msg = failure.to_string();
        assert!(msg.contains("retry write"), "{}", msg);
        assert!(msg.contains("404"));
        assert!(msg.contains("Not Found"));
    }

    #[test]
    fn test_link_error_display_names_stage() {
        let err = LinkError::new(LinkStage::Authorize, AuthFlowError::MissingCode);
        assert_eq!(
            err.to_string(),
            "Linking failed during authorization: Redirect URL is missing the authorization code"
        );
    }

    #[test]
    fn test_provider_error_status() {
        assert_eq!(ProviderError::Auth.status(), Some(401));
        let write = ProviderError::Write {
            status: 422,
            body: "sha mismatch".to_string(),
        };
        assert_eq!(write.status(), Some(422));
        assert_eq!(write.body(), "sha mismatch");
        let create = ProviderError::RepoCreation {
            message: "name already exists".to_string(),
        };
        assert_eq!(create.status(), None);
        assert_eq!(create.body(), "name already exists");
    }
}
