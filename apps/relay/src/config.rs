//! Relay configuration (lcsync-relay.toml).
//!
//! Holds the OAuth client secret, so the file is saved with 0600 permissions
//! and the secret can come from `GITHUB_CLIENT_SECRET` instead.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub const CLIENT_SECRET_ENV: &str = "GITHUB_CLIENT_SECRET";

/// External program run by `POST /run_script`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScriptConfig {
    #[serde(default = "default_program")]
    pub program: String,
    #[serde(default = "default_args")]
    pub args: Vec<String>,
}

fn default_program() -> String {
    "python".to_string()
}

fn default_args() -> Vec<String> {
    vec!["scripts/sync_solution_script.py".to_string()]
}

impl Default for ScriptConfig {
    fn default() -> Self {
        Self {
            program: default_program(),
            args: default_args(),
        }
    }
}

#[derive(Clone, Serialize, Deserialize)]
pub struct RelayConfig {
    /// Listen address
    #[serde(default = "default_bind")]
    pub bind: String,
    /// OAuth app client id
    #[serde(default = "default_client_id")]
    pub client_id: String,
    /// OAuth app client secret
    #[serde(default)]
    pub client_secret: String,
    /// GitHub code-for-token endpoint
    #[serde(default = "default_token_url")]
    pub token_url: String,
    #[serde(default)]
    pub script: ScriptConfig,
}

fn default_bind() -> String {
    "0.0.0.0:3000".to_string()
}

fn default_client_id() -> String {
    "Ov23liP2hf7xnHd7YAZF".to_string()
}

fn default_token_url() -> String {
    "https://github.com/login/oauth/access_token".to_string()
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            client_id: default_client_id(),
            client_secret: String::new(),
            token_url: default_token_url(),
            script: ScriptConfig::default(),
        }
    }
}

impl std::fmt::Debug for RelayConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RelayConfig")
            .field("bind", &self.bind)
            .field("client_id", &self.client_id)
            .field("client_secret", &"<redacted>")
            .field("token_url", &self.token_url)
            .field("script", &self.script)
            .finish()
    }
}

/// Get default config file path (~/.config/leetsync/lcsync-relay.toml).
pub fn default_config_path() -> PathBuf {
    dirs::config_dir()
        .map(|d| d.join("leetsync"))
        .unwrap_or_else(|| PathBuf::from("."))
        .join("lcsync-relay.toml")
}

impl RelayConfig {
    /// Load config from file. A missing file yields the defaults.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Cannot read config file: {}", path.display()))?;

        let config: RelayConfig = toml::from_str(&content)
            .with_context(|| format!("Cannot parse config file: {}", path.display()))?;

        Ok(config)
    }

    /// Apply the environment override for the client secret.
    pub fn with_env_secret(mut self, secret: Option<String>) -> Self {
        if let Some(secret) = secret.filter(|s| !s.is_empty()) {
            self.client_secret = secret;
        }
        self
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
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_missing_file_uses_defaults() {
        let dir = TempDir::new().unwrap();
        let config = RelayConfig::load(&dir.path().join("none.toml")).unwrap();

        assert_eq!(config.bind, "0.0.0.0:3000");
        assert_eq!(config.token_url, "https://github.com/login/oauth/access_token");
        assert_eq!(config.script.program, "python");
    }

    #[test]
    fn test_partial_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("relay.toml");
        std::fs::write(
            &path,
            "bind = \"127.0.0.1:4000\"\n[script]\nprogram = \"sh\"\nargs = [\"sync.sh\"]\n",
        )
        .unwrap();

        let config = RelayConfig::load(&path).unwrap();
        assert_eq!(config.bind, "127.0.0.1:4000");
        assert_eq!(config.script.args, vec!["sync.sh".to_string()]);
        assert_eq!(config.client_id, "Ov23liP2hf7xnHd7YAZF");
    }

    #[test]
    fn test_env_secret_overrides_file() {
        let mut config = RelayConfig::default();
        config.client_secret = "from-file".to_string();

        let config = config.with_env_secret(Some("from-env".to_string()));
        assert_eq!(config.client_secret, "from-env");

        let config = config.with_env_secret(Some(String::new()));
        assert_eq!(config.client_secret, "from-env");
    }

    #[test]
    fn test_debug_hides_secret() {
        let config = RelayConfig::default().with_env_secret(Some("s3cret".to_string()));
        assert!(!format!("{:?}", config).contains("s3cret"));
    }

    #[cfg(unix)]
    #[test]
    fn test_save_is_private() {
        use std::os::unix::fs::PermissionsExt;

        let dir = TempDir::new().unwrap();
        let path = dir.path().join("relay.toml");
        RelayConfig::default().save(&path).unwrap();

        let mode = std::fs::metadata(&path).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
        assert_eq!(RelayConfig::load(&path).unwrap().bind, "0.0.0.0:3000");
    }
}
