//! GitHub OAuth redirect flow.
//!
//! The flow never talks to GitHub's token endpoint itself: the code is handed
//! to the relay, which holds the client secret.
//!
//! States:
//! `Idle -> AwaitingRedirect -> CodeReceived -> TokenExchanged -> Linked`,
//! with `Failed { reason }` reachable from every non-terminal state.
//!
//! Flow:
//! 1. Build the authorize URL (client id, scope, per-installation redirect, state nonce)
//! 2. Open it in the browser and wait for the loopback redirect
//! 3. Pull `code` out of the redirect URL
//! 4. Exchange the code through the relay

use crate::error::AuthFlowError;
use crate::utils::open_browser;
use async_trait::async_trait;
use std::fmt;
use std::io;
use std::sync::Mutex;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use url::Url;
use uuid::Uuid;

const CALLBACK_PAGE: &str = "<!doctype html><html><body>\
<h3>LeetSync</h3><p>Authorization received. You can close this tab.</p>\
</body></html>";

/// Per-connection deadline for the browser to send its request line and headers.
const CONNECTION_READ_TIMEOUT: Duration = Duration::from_secs(10);

/// Short-lived code from the redirect. Never persisted.
#[derive(Clone, PartialEq, Eq)]
pub struct AuthorizationCode(String);

impl AuthorizationCode {
    pub fn new(code: impl Into<String>) -> Self {
        Self(code.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for AuthorizationCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("AuthorizationCode(<redacted>)")
    }
}

/// Where the handshake currently is.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthState {
    Idle,
    AwaitingRedirect,
    CodeReceived,
    TokenExchanged,
    Linked,
    Failed { reason: String },
}

/// Something that can produce an access token, interactively or not.
#[async_trait]
pub trait Authorizer: Send + Sync {
    /// Run the handshake and return the access token.
    async fn authorize(&self) -> Result<String, AuthFlowError>;

    /// The caller persisted the token.
    fn mark_linked(&self) {}
}

/// Interactive step: show the authorize URL, wait for the redirect.
#[async_trait]
pub trait RedirectReceiver: Send + Sync {
    /// Redirect target registered in the authorize URL.
    fn redirect_uri(&self) -> String;

    /// Full redirect URL once the browser comes back.
    async fn receive(&self, authorize_url: &Url) -> Result<Url, AuthFlowError>;
}

/// Turns a code into a token (the relay).
#[async_trait]
pub trait TokenExchanger: Send + Sync {
    async fn exchange(&self, code: AuthorizationCode) -> Result<String, AuthFlowError>;
}

/// Settings baked into the authorize URL.
#[derive(Debug, Clone)]
pub struct FlowSettings {
    pub authorize_url: String,
    pub client_id: String,
    pub scope: String,
}

/// The redirect-based handshake.
pub struct AuthorizationFlow<R: RedirectReceiver, X: TokenExchanger> {
    settings: FlowSettings,
    receiver: R,
    exchanger: X,
    state: Mutex<AuthState>,
}

impl<R: RedirectReceiver, X: TokenExchanger> AuthorizationFlow<R, X> {
    pub fn new(settings: FlowSettings, receiver: R, exchanger: X) -> Self {
        Self {
            settings,
            receiver,
            exchanger,
            state: Mutex::new(AuthState::Idle),
        }
    }

    /// Current state of the last (or running) attempt.
    pub fn state(&self) -> AuthState {
        self.state.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    fn transition(&self, next: AuthState) {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        debug!("[oauth] {:?} -> {:?}", *state, next);
        *state = next;
    }

    fn fail(&self, err: AuthFlowError) -> AuthFlowError {
        self.transition(AuthState::Failed {
            reason: err.to_string(),
        });
        err
    }

    /// Authorize URL for this attempt.
    pub fn authorize_url(&self, nonce: &str) -> Result<Url, AuthFlowError> {
        let mut url = Url::parse(&self.settings.authorize_url)?;
        url.query_pairs_mut()
            .append_pair("client_id", &self.settings.client_id)
            .append_pair("scope", &self.settings.scope)
            .append_pair("redirect_uri", &self.receiver.redirect_uri())
            .append_pair("state", nonce);
        Ok(url)
    }

    async fn run(&self) -> Result<String, AuthFlowError> {
        let nonce = Uuid::new_v4().to_string();
        let url = self.authorize_url(&nonce)?;

        self.transition(AuthState::AwaitingRedirect);
        let redirect = self.receiver.receive(&url).await?;

        let code = parse_redirect(&redirect, &nonce)?;
        self.transition(AuthState::CodeReceived);

        let token = self.exchanger.exchange(code).await?;
        self.transition(AuthState::TokenExchanged);
        Ok(token)
    }
}

#[async_trait]
impl<R: RedirectReceiver, X: TokenExchanger> Authorizer for AuthorizationFlow<R, X> {
    async fn authorize(&self) -> Result<String, AuthFlowError> {
        self.transition(AuthState::Idle);
        self.run().await.map_err(|e| self.fail(e))
    }

    fn mark_linked(&self) {
        self.transition(AuthState::Linked);
    }
}

/// Extract the authorization code from a redirect URL.
pub fn parse_redirect(
    redirect: &Url,
    expected_state: &str,
) -> Result<AuthorizationCode, AuthFlowError> {
    let mut code = None;
    let mut state = None;
    let mut error = None;
    let mut error_description = None;

    for (key, value) in redirect.query_pairs() {
        match key.as_ref() {
            "code" => code = Some(value.into_owned()),
            "state" => state = Some(value.into_owned()),
            "error" => error = Some(value.into_owned()),
            "error_description" => error_description = Some(value.into_owned()),
            _ => {}
        }
    }

    if let Some(error) = error {
        let reason = match error_description {
            Some(desc) => format!("{} - {}", error, desc),
            None => error,
        };
        return Err(AuthFlowError::AuthorizationDenied(reason));
    }

    if state.as_deref() != Some(expected_state) {
        return Err(AuthFlowError::AuthorizationDenied(
            "state parameter does not match this attempt".to_string(),
        ));
    }

    match code {
        Some(code) if !code.is_empty() => Ok(AuthorizationCode::new(code)),
        _ => Err(AuthFlowError::MissingCode),
    }
}

/// Receives the redirect on `http://127.0.0.1:{port}/callback/{installation_id}`.
pub struct LoopbackRedirect {
    port: u16,
    callback_path: String,
    open_browser: bool,
    cancel: CancellationToken,
}

impl LoopbackRedirect {
    pub fn new(port: u16, installation_id: &str) -> Self {
        Self {
            port,
            callback_path: format!("/callback/{}", installation_id),
            open_browser: true,
            cancel: CancellationToken::new(),
        }
    }

    /// Don't launch a browser (headless use, tests).
    pub fn without_browser(mut self) -> Self {
        self.open_browser = false;
        self
    }

    /// Cancelling this token abandons the wait with `AuthorizationDenied`.
    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }
}

/// Read one request. Returns the request target if it is the callback.
async fn handle_connection(
    stream: TcpStream,
    callback_path: &str,
) -> Result<Option<String>, AuthFlowError> {
    let mut reader = BufReader::new(stream);
    let mut request_line = String::new();
    reader.read_line(&mut request_line).await?;

    // Drain headers
    loop {
        let mut line = String::new();
        let n = reader.read_line(&mut line).await?;
        if n == 0 || line == "\r\n" || line == "\n" {
            break;
        }
    }

    let target = request_line
        .split_whitespace()
        .nth(1)
        .unwrap_or_default()
        .to_string();
    let is_callback = target
        .split('?')
        .next()
        .is_some_and(|p| p == callback_path);

    let mut stream = reader.into_inner();
    let response = if is_callback {
        format!(
            "HTTP/1.1 200 OK\r\nContent-Type: text/html; charset=utf-8\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
            CALLBACK_PAGE.len(),
            CALLBACK_PAGE
        )
    } else {
        "HTTP/1.1 404 Not Found\r\nContent-Length: 0\r\nConnection: close\r\n\r\n".to_string()
    };
    stream.write_all(response.as_bytes()).await?;
    stream.flush().await?;

    Ok(is_callback.then_some(target))
}

/// `handle_connection` with a read deadline, so a silent socket gives up.
async fn handle_with_deadline(
    stream: TcpStream,
    callback_path: String,
) -> Result<Option<String>, AuthFlowError> {
    match tokio::time::timeout(CONNECTION_READ_TIMEOUT, handle_connection(stream, &callback_path))
        .await
    {
        Ok(result) => result,
        Err(_) => Err(AuthFlowError::Io(io::Error::new(
            io::ErrorKind::TimedOut,
            "no request received on callback connection",
        ))),
    }
}

#[async_trait]
impl RedirectReceiver for LoopbackRedirect {
    fn redirect_uri(&self) -> String {
        format!("http://127.0.0.1:{}{}", self.port, self.callback_path)
    }

    async fn receive(&self, authorize_url: &Url) -> Result<Url, AuthFlowError> {
        let listener = TcpListener::bind(("127.0.0.1", self.port)).await?;
        info!("[oauth] Waiting for GitHub redirect on {}", self.redirect_uri());

        if self.open_browser && !open_browser(authorize_url.as_str()) {
            warn!("[oauth] Could not open a browser, open this URL manually: {}", authorize_url);
        }

        // Connections are served concurrently; dropping the set aborts the rest
        let mut connections = JoinSet::new();
        loop {
            tokio::select! {
                _ = self.cancel.cancelled() => {
                    return Err(AuthFlowError::AuthorizationDenied(
                        "authorization cancelled by user".to_string(),
                    ));
                }
                accepted = listener.accept() => {
                    let (stream, peer) = accepted?;
                    debug!("[oauth] Connection from {}", peer);
                    connections.spawn(handle_with_deadline(stream, self.callback_path.clone()));
                }
                Some(joined) = connections.join_next() => match joined {
                    Ok(Ok(Some(target))) => {
                        let url =
                            Url::parse(&format!("http://127.0.0.1:{}{}", self.port, target))?;
                        return Ok(url);
                    }
                    Ok(Ok(None)) => {}
                    Ok(Err(e)) => {
                        warn!("[oauth] Ignoring bad request on callback listener: {}", e);
                    }
                    Err(e) => {
                        warn!("[oauth] Callback connection task failed: {}", e);
                    }
                },
            }
        }
    }
}
