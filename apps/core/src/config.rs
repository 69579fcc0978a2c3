//! Config module - Manages LeetSync configuration (leetsync.toml).
//!
//! Configuration file contains:
//! - GitHub API and OAuth settings
//! - Relay location
//! - Token store backend
//! - LeetCode fetch settings
//! - The per-installation id used for the redirect target

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use uuid::Uuid;

/// Public OAuth client id of the LeetSync GitHub app.
/// The client secret lives only in the relay.
pub const DEFAULT_CLIENT_ID: &str = "Ov23liP2hf7xnHd7YAZF";

/// GitHub settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GitHubConfig {
    /// REST API base (tests point this at a mock server)
    #[serde(default = "default_api_base")]
    pub api_base: String,
    /// OAuth authorize page
    #[serde(default = "default_authorize_url")]
    pub authorize_url: String,
    /// OAuth client id
    #[serde(default = "default_client_id")]
    pub client_id: String,
    /// Requested scope
    #[serde(default = "default_scope")]
    pub scope: String,
    /// Branch solutions are committed to
    #[serde(default = "default_branch")]
    pub branch: String,
    /// Repository name prefix, joined with the username
    #[serde(default = "default_repo_prefix")]
    pub repo_prefix: String,
}

fn default_api_base() -> String {
    "https://api.github.com".to_string()
}

fn default_authorize_url() -> String {
    "https://github.com/login/oauth/authorize".to_string()
}

fn default_client_id() -> String {
    DEFAULT_CLIENT_ID.to_string()
}

fn default_scope() -> String {
    "repo".to_string()
}

fn default_branch() -> String {
    "main".to_string()
}

fn default_repo_prefix() -> String {
    "LEETCODESYNC-".to_string()
}

impl Default for GitHubConfig {
    fn default() -> Self {
        Self {
            api_base: default_api_base(),
            authorize_url: default_authorize_url(),
            client_id: default_client_id(),
            scope: default_scope(),
            branch: default_branch(),
            repo_prefix: default_repo_prefix(),
        }
    }
}

/// Relay location.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RelayConfig {
    #[serde(default = "default_relay_url")]
    pub base_url: String,
}

fn default_relay_url() -> String {
    "http://localhost:3000".to_string()
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            base_url: default_relay_url(),
        }
    }
}

/// Loopback redirect settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OAuthConfig {
    /// Local port the redirect listener binds to
    #[serde(default = "default_callback_port")]
    pub callback_port: u16,
}

fn default_callback_port() -> u16 {
    17863
}

impl Default for OAuthConfig {
    fn default() -> Self {
        Self {
            callback_port: default_callback_port(),
        }
    }
}

/// Where the linked account is kept.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    /// JSON file in the config directory (default)
    #[default]
    File,
    /// System keychain
    Keyring,
}

/// Token store configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct StoreConfig {
    #[serde(default)]
    pub backend: StoreBackend,
    /// Account file path for the file backend (default: config dir)
    #[serde(default)]
    pub path: Option<PathBuf>,
}

/// LeetCode fetch settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LeetCodeConfig {
    #[serde(default = "default_graphql_url")]
    pub graphql_url: String,
    /// Submissions requested per page
    #[serde(default = "default_page_size")]
    pub page_size: u32,
    /// Attempts when submission details are not ready yet
    #[serde(default = "default_detail_retries")]
    pub detail_retries: u32,
    /// Delay between those attempts
    #[serde(default = "default_detail_retry_delay_secs")]
    pub detail_retry_delay_secs: u64,
    /// Attempts per request on 429, 5xx and connection errors
    #[serde(default = "default_request_attempts")]
    pub request_attempts: u32,
    /// First backoff; doubles after every failed attempt
    #[serde(default = "default_request_backoff_ms")]
    pub request_backoff_ms: u64,
}

fn default_graphql_url() -> String {
    "https://leetcode.com/graphql/".to_string()
}

fn default_page_size() -> u32 {
    20
}

fn default_detail_retries() -> u32 {
    5
}

fn default_detail_retry_delay_secs() -> u64 {
    60
}

fn default_request_attempts() -> u32 {
    5
}

fn default_request_backoff_ms() -> u64 {
    1000
}

impl Default for LeetCodeConfig {
    fn default() -> Self {
        Self {
            graphql_url: default_graphql_url(),
            page_size: default_page_size(),
            detail_retries: default_detail_retries(),
            detail_retry_delay_secs: default_detail_retry_delay_secs(),
            request_attempts: default_request_attempts(),
            request_backoff_ms: default_request_backoff_ms(),
        }
    }
}

/// Main LeetSync configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Config version (for future migrations)
    #[serde(default = "default_version")]
    pub version: u32,

    /// Unique id of this installation, part of the redirect target
    #[serde(default = "new_installation_id")]
    pub installation_id: String,

    #[serde(default)]
    pub github: GitHubConfig,

    #[serde(default)]
    pub relay: RelayConfig,

    #[serde(default)]
    pub oauth: OAuthConfig,

    #[serde(default)]
    pub store: StoreConfig,

    #[serde(default)]
    pub leetcode: LeetCodeConfig,
}

fn default_version() -> u32 {
    1
}

fn new_installation_id() -> String {
    Uuid::new_v4().to_string()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            version: default_version(),
            installation_id: new_installation_id(),
            github: GitHubConfig::default(),
            relay: RelayConfig::default(),
            oauth: OAuthConfig::default(),
            store: StoreConfig::default(),
            leetcode: LeetCodeConfig::default(),
        }
    }
}

/// Get default config directory (~/.config/leetsync/).
pub fn default_config_dir() -> PathBuf {
    dirs::config_dir()
        .map(|d| d.join("leetsync"))
        .unwrap_or_else(|| PathBuf::from("."))
}

/// Get default config file path.
pub fn default_config_path() -> PathBuf {
    default_config_dir().join("leetsync.toml")
}

/// Get default account file path (file store backend).
pub fn default_account_path() -> PathBuf {
    default_config_dir().join("account.json")
}

impl Config {
    /// Create new config with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Load config from file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Cannot read config file: {}", path.display()))?;

        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Cannot parse config file: {}", path.display()))?;

        Ok(config)
    }

    /// Load config from `path`, creating it with defaults on first run so the
    /// installation id stays stable across invocations.
    pub fn load_or_init(path: &Path) -> Result<Self> {
        if path.exists() {
            Self::load(path)
        } else {
            let config = Self::default();
            config.save(path)?;
            Ok(config)
        }
    }

    /// Save config to file.
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content =
            toml::to_string_pretty(self).with_context(|| "Cannot serialize config to TOML")?;

        std::fs::write(path, content)
            .with_context(|| format!("Cannot write config file: {}", path.display()))?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600))?;
        }

        Ok(())
    }

    /// Account file used by the file backend.
    pub fn account_path(&self) -> PathBuf {
        self.store
            .path
            .clone()
            .unwrap_or_else(default_account_path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.version, 1);
        assert_eq!(config.github.branch, "main");
        assert_eq!(config.github.scope, "repo");
        assert_eq!(config.store.backend, StoreBackend::File);
        assert!(Uuid::parse_str(&config.installation_id).is_ok());
    }

    #[test]
    fn test_save_and_load() -> Result<()> {
        let temp_dir = TempDir::new()?;
        let config_path = temp_dir.path().join("test.toml");

        let mut config = Config::new();
        config.relay.base_url = "http://relay.local:8080".to_string();
        config.store.backend = StoreBackend::Keyring;
        config.save(&config_path)?;

        let loaded = Config::load(&config_path)?;
        assert_eq!(loaded.relay.base_url, "http://relay.local:8080");
        assert_eq!(loaded.store.backend, StoreBackend::Keyring);
        assert_eq!(loaded.installation_id, config.installation_id);

        Ok(())
    }

    #[test]
    fn test_load_or_init_keeps_installation_id() -> Result<()> {
        let temp_dir = TempDir::new()?;
        let config_path = temp_dir.path().join("nested").join("leetsync.toml");

        let first = Config::load_or_init(&config_path)?;
        let second = Config::load_or_init(&config_path)?;
        assert_eq!(first.installation_id, second.installation_id);

        Ok(())
    }

    #[test]
    fn test_partial_file_uses_defaults() -> Result<()> {
        let temp_dir = TempDir::new()?;
        let config_path = temp_dir.path().join("partial.toml");
        std::fs::write(
            &config_path,
            "installation_id = \"abc\"\n[github]\nbranch = \"solutions\"\n",
        )?;

        let loaded = Config::load(&config_path)?;
        assert_eq!(loaded.installation_id, "abc");
        assert_eq!(loaded.github.branch, "solutions");
        assert_eq!(loaded.github.api_base, "https://api.github.com");
        assert_eq!(loaded.leetcode.page_size, 20);

        Ok(())
    }

    #[test]
    #[cfg(unix)]
    fn test_save_permissions() -> Result<()> {
        use std::os::unix::fs::PermissionsExt;
        let temp_dir = TempDir::new()?;
        let config_path = temp_dir.path().join("test_perms.toml");

        Config::new().save(&config_path)?;

        let mode = std::fs::metadata(&config_path)?.permissions().mode();
        assert_eq!(mode & 0o777, 0o600, "Config file should have 0600 permissions");

        Ok(())
    }
}
