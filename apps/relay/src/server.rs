//! Relay HTTP server.
//!
//! Routes:
//! - `POST /get-github-token` `{code}` -> GitHub's token JSON, verbatim
//! - `POST /run_script` `{leetcode_session, github_token, github_repo}` -> `{message, output}`

use crate::config::RelayConfig;
use crate::error::RelayError;
use crate::script::{run_script, ScriptRequest};
use anyhow::{Context, Result};
use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::{header, Method};
use axum::routing::post;
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::{json, Value};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;

#[derive(Clone)]
pub struct AppState {
    config: Arc<RelayConfig>,
    http: reqwest::Client,
}

impl AppState {
    pub fn new(config: RelayConfig) -> Self {
        Self {
            config: Arc::new(config),
            http: reqwest::Client::new(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct TokenRequest {
    code: String,
}

pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, header::ACCEPT, header::ORIGIN]);

    Router::new()
        .route("/get-github-token", post(get_github_token))
        .route("/run_script", post(run_script_handler))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

async fn get_github_token(
    State(state): State<AppState>,
    payload: Result<Json<TokenRequest>, JsonRejection>,
) -> Result<Json<Value>, RelayError> {
    let Json(request) = payload.map_err(RelayError::TokenBody)?;
    info!("[relay] Exchanging authorization code");

    let response = state
        .http
        .post(&state.config.token_url)
        .header(reqwest::header::ACCEPT, "application/json")
        .json(&json!({
            "client_id": state.config.client_id,
            "client_secret": state.config.client_secret,
            "code": request.code,
        }))
        .send()
        .await?;

    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(RelayError::TokenStatus {
            status: status.as_u16(),
            body,
        });
    }

    // GitHub reports bad codes as 200 with an `error` field; pass it through
    let data: Value = response.json().await?;
    Ok(Json(data))
}

async fn run_script_handler(
    State(state): State<AppState>,
    payload: Result<Json<ScriptRequest>, JsonRejection>,
) -> Result<Json<Value>, RelayError> {
    let Json(request) = payload.map_err(RelayError::ScriptBody)?;
    let output = run_script(&state.config.script, &request).await?;
    Ok(Json(json!({
        "message": "Script executed successfully",
        "output": output,
    })))
}

/// Bind and serve until the process is stopped.
pub async fn serve(config: RelayConfig) -> Result<()> {
    let addr: SocketAddr = config
        .bind
        .parse()
        .with_context(|| format!("Invalid bind address: {}", config.bind))?;

    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("Cannot bind {}", addr))?;
    info!("[relay] Listening on http://{}", addr);

    axum::serve(listener, router(AppState::new(config)))
        .await
        .context("Relay server error")?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ScriptConfig;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use http_body_util::BodyExt;
    use tower::ServiceExt;
    use wiremock::matchers::{body_json, header as header_matcher, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn config_for(token_url: String) -> RelayConfig {
        RelayConfig {
            client_id: "client-1".to_string(),
            client_secret: "secret-1".to_string(),
            token_url,
            ..RelayConfig::default()
        }
    }

    fn post_json(uri: &str, body: Value) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    async fn body_of(response: axum::response::Response) -> Value {
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_token_exchange_forwards_json_verbatim() {
        let github = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/login/oauth/access_token"))
            .and(header_matcher("accept", "application/json"))
            .and(body_json(json!({
                "client_id": "client-1",
                "client_secret": "secret-1",
                "code": "abc",
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "access_token": "gho_123",
                "token_type": "bearer",
                "scope": "repo",
            })))
            .expect(1)
            .mount(&github)
            .await;

        let app = router(AppState::new(config_for(format!(
            "{}/login/oauth/access_token",
            github.uri()
        ))));
        let response = app
            .oneshot(post_json("/get-github-token", json!({ "code": "abc" })))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            body_of(response).await,
            json!({ "access_token": "gho_123", "token_type": "bearer", "scope": "repo" })
        );
    }

    #[tokio::test]
    async fn test_bad_code_passes_through() {
        let github = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "error": "bad_verification_code",
                "error_description": "The code passed is incorrect or expired.",
            })))
            .mount(&github)
            .await;

        let app = router(AppState::new(config_for(github.uri())));
        let response = app
            .oneshot(post_json("/get-github-token", json!({ "code": "used" })))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_of(response).await["error"], "bad_verification_code");
    }

    #[tokio::test]
    async fn test_token_upstream_failure_is_500() {
        let github = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(502).set_body_string("bad gateway"))
            .mount(&github)
            .await;

        let app = router(AppState::new(config_for(github.uri())));
        let response = app
            .oneshot(post_json("/get-github-token", json!({ "code": "abc" })))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(
            body_of(response).await,
            json!({ "error": "Failed to fetch GitHub token" })
        );
    }

    #[tokio::test]
    async fn test_token_unreachable_is_500() {
        let app = router(AppState::new(config_for("http://127.0.0.1:9/token".to_string())));
        let response = app
            .oneshot(post_json("/get-github-token", json!({ "code": "abc" })))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(
            body_of(response).await,
            json!({ "error": "Failed to fetch GitHub token" })
        );
    }

    #[tokio::test]
    async fn test_token_malformed_body_is_500() {
        let github = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&github)
            .await;

        let app = router(AppState::new(config_for(github.uri())));
        let request = Request::builder()
            .method("POST")
            .uri("/get-github-token")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from("{\"code\":"))
            .unwrap();
        let response = app.oneshot(request).await.unwrap();

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(
            body_of(response).await,
            json!({ "error": "Failed to fetch GitHub token" })
        );
    }

    #[tokio::test]
    async fn test_token_missing_code_is_500() {
        let app = router(AppState::new(RelayConfig::default()));
        let response = app
            .oneshot(post_json("/get-github-token", json!({})))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(
            body_of(response).await,
            json!({ "error": "Failed to fetch GitHub token" })
        );
    }

    #[tokio::test]
    async fn test_script_body_without_content_type_is_500() {
        let app = router(AppState::new(RelayConfig::default()));
        let request = Request::builder()
            .method("POST")
            .uri("/run_script")
            .body(Body::from("leetcode_session=sess"))
            .unwrap();
        let response = app.oneshot(request).await.unwrap();

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let body = body_of(response).await;
        assert_eq!(body["error"], "Failed to run script");
        assert!(!body["details"].as_str().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_script_missing_fields_is_500() {
        let app = router(AppState::new(RelayConfig::default()));
        let response = app
            .oneshot(post_json("/run_script", json!({ "github_repo": "alice/r" })))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let body = body_of(response).await;
        assert_eq!(body["error"], "Failed to run script");
        assert!(body["details"].as_str().unwrap().contains("leetcode_session"));
    }

    #[tokio::test]
    async fn test_cors_preflight_allowed() {
        let app = router(AppState::new(RelayConfig::default()));
        let request = Request::builder()
            .method("OPTIONS")
            .uri("/run_script")
            .header(header::ORIGIN, "chrome-extension://abcdef")
            .header(header::ACCESS_CONTROL_REQUEST_METHOD, "POST")
            .body(Body::empty())
            .unwrap();

        let response = app.oneshot(request).await.unwrap();
        assert_eq!(
            response
                .headers()
                .get(header::ACCESS_CONTROL_ALLOW_ORIGIN)
                .unwrap(),
            "*"
        );
    }

    #[cfg(unix)]
    mod script_routes {
        use super::*;

        fn app_running(script: &str) -> Router {
            let config = RelayConfig {
                script: ScriptConfig {
                    program: "sh".to_string(),
                    args: vec!["-c".to_string(), script.to_string()],
                },
                ..RelayConfig::default()
            };
            router(AppState::new(config))
        }

        fn script_body() -> Value {
            json!({
                "leetcode_session": "sess",
                "github_token": "gho_x",
                "github_repo": "alice/LEETCODESYNC-alice",
            })
        }

        #[tokio::test]
        async fn test_run_script_success() {
            let response = app_running("echo synced $GITHUB_REPO")
                .oneshot(post_json("/run_script", script_body()))
                .await
                .unwrap();

            assert_eq!(response.status(), StatusCode::OK);
            assert_eq!(
                body_of(response).await,
                json!({
                    "message": "Script executed successfully",
                    "output": "synced alice/LEETCODESYNC-alice\n",
                })
            );
        }

        #[tokio::test]
        async fn test_run_script_failure() {
            let response = app_running("echo 'invalid session' >&2; exit 1")
                .oneshot(post_json("/run_script", script_body()))
                .await
                .unwrap();

            assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
            assert_eq!(
                body_of(response).await,
                json!({
                    "error": "Failed to run script",
                    "details": "invalid session\n",
                })
            );
        }
    }
}
