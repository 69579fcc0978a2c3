//! Relay Client - calls the trusted relay that holds the OAuth client secret.
//!
//! Endpoints:
//! - `POST /get-github-token` `{code}` -> GitHub's token JSON
//! - `POST /run_script` `{leetcode_session, github_token, github_repo}` -> `{message, output}`

use crate::error::{AuthFlowError, RelayError};
use crate::oauth::{AuthorizationCode, TokenExchanger};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::{debug, info};

/// Token JSON as forwarded by the relay.
#[derive(Debug, Deserialize)]
pub struct AccessTokenResponse {
    pub access_token: Option<String>,
    pub token_type: Option<String>,
    pub scope: Option<String>,
    /// e.g. `bad_verification_code` for a used or expired code
    pub error: Option<String>,
    pub error_description: Option<String>,
}

/// Inputs of the external sync script.
#[derive(Clone, Serialize, Deserialize)]
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

/// `/run_script` success body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScriptOutcome {
    pub message: String,
    #[serde(default)]
    pub output: String,
}

/// `/run_script` failure body.
#[derive(Debug, Deserialize)]
struct ScriptFailureBody {
    error: String,
    #[serde(default)]
    details: String,
}

/// HTTP client for the relay.
#[derive(Clone)]
pub struct RelayClient {
    client: reqwest::Client,
    base_url: String,
}

impl RelayClient {
    pub fn new(base_url: &str) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    fn url(&self, endpoint: &str) -> String {
        format!("{}/{}", self.base_url, endpoint)
    }

    /// Exchange an authorization code for an access token.
    pub async fn exchange_code(&self, code: &AuthorizationCode) -> Result<String, AuthFlowError> {
        let response = self
            .client
            .post(self.url("get-github-token"))
            .header("Accept", "application/json")
            .json(&serde_json::json!({ "code": code.as_str() }))
            .send()
            .await?;

        let status = response.status().as_u16();
        let body = response.text().await.unwrap_or_default();
        if !(200..300).contains(&status) {
            return Err(AuthFlowError::TokenExchange {
                status,
                detail: body,
            });
        }

        let token: AccessTokenResponse =
            serde_json::from_str(&body).map_err(|e| AuthFlowError::TokenExchange {
                status,
                detail: format!("cannot parse token response: {}", e),
            })?;

        match token.access_token {
            Some(access_token) if !access_token.is_empty() => {
                debug!(
                    "[relay] Token exchanged (type {}, scope {})",
                    token.token_type.as_deref().unwrap_or("bearer"),
                    token.scope.as_deref().unwrap_or("")
                );
                Ok(access_token)
            }
            _ => {
                let error = token.error.unwrap_or_else(|| "no access_token".to_string());
                let detail = match token.error_description {
                    Some(desc) => format!("{} - {}", error, desc),
                    None => error,
                };
                Err(AuthFlowError::TokenExchange { status, detail })
            }
        }
    }

    /// Run the relay's sync script for the linked account.
    pub async fn run_script(&self, request: &ScriptRequest) -> Result<ScriptOutcome, RelayError> {
        info!("[relay] Running sync script for {}", request.github_repo);
        let response = self
            .client
            .post(self.url("run_script"))
            .header("Accept", "application/json")
            .json(request)
            .send()
            .await?;

        let status = response.status().as_u16();
        let body = response.text().await.unwrap_or_default();

        if (200..300).contains(&status) {
            if let Ok(outcome) = serde_json::from_str::<ScriptOutcome>(&body) {
                return Ok(outcome);
            }
        }
        // The relay reports script failures as `{error, details}`, sometimes with 200
        if let Ok(failure) = serde_json::from_str::<ScriptFailureBody>(&body) {
            return Err(RelayError::Script {
                status,
                error: failure.error,
                details: failure.details,
            });
        }
        Err(RelayError::UnexpectedStatus { status, body })
    }
}

#[async_trait]
impl TokenExchanger for RelayClient {
    async fn exchange(&self, code: AuthorizationCode) -> Result<String, AuthFlowError> {
        self.exchange_code(&code).await
    }
}
