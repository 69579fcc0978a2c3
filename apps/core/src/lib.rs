//! LeetSync Core Library
//!
//! Core library for LeetSync - copies accepted LeetCode solutions into a
//! GitHub repository owned by the user.
//! Provides the following capabilities:
//! - Link a GitHub account via an OAuth redirect flow (code exchanged through a relay)
//! - Make sure the `LEETCODESYNC-{username}` repository exists
//! - Create or update one file per solution through the contents API
//! - Fetch accepted submissions from LeetCode for a full sync
//!
//! Pipeline: Authorize -> Link (persist account) -> Push (probe, write, retry once)

pub mod config;
pub mod error;
pub mod leetcode;
pub mod link;
pub mod lock;
pub mod oauth;
pub mod provider;
pub mod relay;
pub mod service;
pub mod store;
pub mod submission;
pub mod sync;
pub mod utils;

// Re-export main types
pub use config::Config;
pub use error::{
    AuthFlowError, Error, LeetCodeError, LinkCause, LinkError, LinkStage, ProviderError,
    RelayError, StoreError, SyncFailure,
};
pub use link::{LinkStatus, Linker};
pub use lock::KeyedLock;
pub use oauth::{
    AuthState, AuthorizationCode, AuthorizationFlow, Authorizer, FlowSettings, LoopbackRedirect,
    RedirectReceiver, TokenExchanger,
};
pub use provider::{
    FileMeta, GitHubClient, ProviderApi, PutOutcome, RemoteFile, RepositoryId, Visibility,
};
pub use relay::{RelayClient, ScriptOutcome, ScriptRequest};
pub use service::{LeetSync, PushReport};
pub use store::{FileTokenStore, KeyringTokenStore, LinkedAccount, MemoryTokenStore, TokenStore};
pub use submission::SubmissionRecord;
pub use sync::{SyncOutcome, SyncStage, Syncer};
