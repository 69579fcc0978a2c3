//! Token Store - persistent storage for the linked GitHub account.
//!
//! The account is always written as a single record so a half-written link
//! (token saved, repository missing) can never be read back as "linked".
//! Backends:
//! - `FileTokenStore`: JSON file, written to a temp file then renamed
//! - `KeyringTokenStore`: one secret in the system keychain
//! - `MemoryTokenStore`: in-process, for tests and embedding

use crate::error::StoreError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use tracing::debug;

const KEYRING_SERVICE: &str = "leetsync";
const KEYRING_USER: &str = "linked_account";

/// The linked GitHub account. Owned by the store; everyone else gets a copy.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkedAccount {
    #[serde(rename = "github_token")]
    pub access_token: String,
    #[serde(rename = "github_username")]
    pub username: String,
    /// `owner/repo`
    #[serde(rename = "github_repo")]
    pub repository: String,
}

impl LinkedAccount {
    pub fn new(access_token: String, username: String, repository: String) -> Self {
        Self {
            access_token,
            username,
            repository,
        }
    }

    /// Usable for sync: has a token and a repository.
    pub fn is_complete(&self) -> bool {
        !self.access_token.trim().is_empty() && !self.repository.trim().is_empty()
    }
}

// Keep the token out of logs.
impl fmt::Debug for LinkedAccount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LinkedAccount")
            .field("access_token", &"<redacted>")
            .field("username", &self.username)
            .field("repository", &self.repository)
            .finish()
    }
}

/// Key-value capability the orchestrators depend on.
pub trait TokenStore: Send + Sync {
    /// Stored account, if any.
    fn load(&self) -> Result<Option<LinkedAccount>, StoreError>;

    /// Replace the stored account in one write.
    fn save(&self, account: &LinkedAccount) -> Result<(), StoreError>;

    /// Remove the stored account. Clearing an empty store is not an error.
    fn clear(&self) -> Result<(), StoreError>;
}

/// JSON file backend.
pub struct FileTokenStore {
    path: PathBuf,
}

impl FileTokenStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_else(|| "account.json".into());
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}

/// Write `contents` to a fresh file that only the owner can read.
fn write_private(path: &Path, contents: &[u8]) -> io::Result<()> {
    // A stale temp file keeps its old mode; start over
    match std::fs::remove_file(path) {
        Err(e) if e.kind() != io::ErrorKind::NotFound => return Err(e),
        _ => {}
    }

    let mut options = std::fs::OpenOptions::new();
    options.write(true).create_new(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(0o600);
    }

    let mut file = options.open(path)?;
    file.write_all(contents)?;
    file.sync_all()
}

impl TokenStore for FileTokenStore {
    fn load(&self) -> Result<Option<LinkedAccount>, StoreError> {
        if !self.path.exists() {
            return Ok(None);
        }
        let json = std::fs::read_to_string(&self.path)?;
        let account: LinkedAccount = serde_json::from_str(&json)?;
        Ok(Some(account))
    }

    fn save(&self, account: &LinkedAccount) -> Result<(), StoreError> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let json = serde_json::to_string_pretty(account)?;
        let tmp = self.temp_path();
        write_private(&tmp, json.as_bytes())?;
        std::fs::rename(&tmp, &self.path)?;
        debug!("[store] Account written to {}", self.path.display());
        Ok(())
    }

    fn clear(&self) -> Result<(), StoreError> {
        match std::fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

/// System keychain backend.
pub struct KeyringTokenStore {
    service: String,
    user: String,
}

impl Default for KeyringTokenStore {
    fn default() -> Self {
        Self::new()
    }
}

impl KeyringTokenStore {
    pub fn new() -> Self {
        Self::with_names(KEYRING_SERVICE, KEYRING_USER)
    }

    pub fn with_names(service: &str, user: &str) -> Self {
        Self {
            service: service.to_string(),
            user: user.to_string(),
        }
    }

    fn entry(&self) -> Result<keyring::Entry, StoreError> {
        Ok(keyring::Entry::new(&self.service, &self.user)?)
    }
}

impl TokenStore for KeyringTokenStore {
    fn load(&self) -> Result<Option<LinkedAccount>, StoreError> {
        match self.entry()?.get_password() {
            Ok(json) => Ok(Some(serde_json::from_str(&json)?)),
            Err(keyring::Error::NoEntry) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn save(&self, account: &LinkedAccount) -> Result<(), StoreError> {
        let json = serde_json::to_string(account)?;
        self.entry()?.set_password(&json)?;
        Ok(())
    }

    fn clear(&self) -> Result<(), StoreError> {
        match self.entry()?.delete_credential() {
            Ok(()) | Err(keyring::Error::NoEntry) => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

/// In-process backend.
#[derive(Default)]
pub struct MemoryTokenStore {
    account: Mutex<Option<LinkedAccount>>,
    saves: AtomicUsize,
}

impl MemoryTokenStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_account(account: LinkedAccount) -> Self {
        Self {
            account: Mutex::new(Some(account)),
            saves: AtomicUsize::new(0),
        }
    }

    /// Number of successful `save` calls.
    pub fn save_count(&self) -> usize {
        self.saves.load(Ordering::SeqCst)
    }

    fn slot(&self) -> std::sync::MutexGuard<'_, Option<LinkedAccount>> {
        self.account.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl TokenStore for MemoryTokenStore {
    fn load(&self) -> Result<Option<LinkedAccount>, StoreError> {
        Ok(self.slot().clone())
    }

    fn save(&self, account: &LinkedAccount) -> Result<(), StoreError> {
        *self.slot() = Some(account.clone());
        self.saves.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn clear(&self) -> Result<(), StoreError> {
        *self.slot() = None;
        Ok(())
    }
}
