//! Runs the external sync script.

use crate::config::ScriptConfig;
use crate::error::RelayError;
use serde::Deserialize;
use std::fmt;
use std::process::Stdio;
use tokio::process::Command;
use tracing::{debug, info};

/// `POST /run_script` body.
#[derive(Clone, Deserialize)]
pub struct ScriptRequest {
    pub leetcode_session: String,
    pub github_token: String,
    pub github_repo: String,
}

impl fmt::Debug for ScriptRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScriptRequest")
            .field("leetcode_session", &"<redacted>")
            .field("github_token", &"<redacted>")
            .field("github_repo", &self.github_repo)
            .finish()
    }
}

/// Run the script with the request values in the child's environment only.
/// Returns stdout on a zero exit status.
pub async fn run_script(script: &ScriptConfig, request: &ScriptRequest) -> Result<String, RelayError> {
    info!(
        "[relay] Running {} for {}",
        script.program, request.github_repo
    );

    let mut cmd = Command::new(&script.program);
    cmd.args(&script.args)
        .env("LEETCODE_SESSION", &request.leetcode_session)
        .env("GITHUB_TOKEN", &request.github_token)
        .env("GITHUB_REPO", &request.github_repo)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    let output = cmd.output().await?;
    let stdout = String::from_utf8_lossy(&output.stdout).to_string();

    if !output.status.success() {
        return Err(RelayError::ScriptFailed {
            code: output.status.code(),
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
        });
    }

    debug!("[relay] Script output: {} bytes", stdout.len());
    Ok(stdout)
}
