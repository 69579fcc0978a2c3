//! Relay error types and their HTTP responses.
//!
//! Clients only ever see the two fixed bodies below. The detailed cause is
//! logged on the relay side.

use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use thiserror::Error;
use tracing::error;

#[derive(Debug, Error)]
pub enum RelayError {
    #[error("Invalid token request body: {0}")]
    TokenBody(JsonRejection),

    #[error("Token endpoint returned {status}: {body}")]
    TokenStatus { status: u16, body: String },

    #[error("Token request failed: {0}")]
    TokenRequest(#[from] reqwest::Error),

    #[error("Cannot start script: {0}")]
    ScriptSpawn(#[from] std::io::Error),

    #[error("Invalid script request body: {0}")]
    ScriptBody(JsonRejection),

    /// Script ran and exited unsuccessfully
    #[error("Script exited with {code:?}")]
    ScriptFailed { code: Option<i32>, stderr: String },
}

impl IntoResponse for RelayError {
    fn into_response(self) -> Response {
        error!("[relay] {}", self);

        let body = match &self {
            RelayError::TokenBody(_)
            | RelayError::TokenStatus { .. }
            | RelayError::TokenRequest(_) => {
                json!({ "error": "Failed to fetch GitHub token" })
            }
            RelayError::ScriptBody(rejection) => json!({
                "error": "Failed to run script",
                "details": rejection.body_text(),
            }),
            RelayError::ScriptSpawn(e) => json!({
                "error": "Failed to run script",
                "details": e.to_string(),
            }),
            RelayError::ScriptFailed { stderr, .. } => json!({
                "error": "Failed to run script",
                "details": stderr,
            }),
        };

        (StatusCode::INTERNAL_SERVER_ERROR, Json(body)).into_response()
    }
}
