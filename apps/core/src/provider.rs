//! Provider Client - GitHub REST API wrapper.
//!
//! Stateless: every call takes the bearer token explicitly.
//! Only the endpoints the link and sync workflows need are covered:
//! `GET /user`, `GET /repos/{owner}/{repo}`, `POST /user/repos`,
//! `GET`/`PUT /repos/{owner}/{repo}/contents/{path}`.

use crate::error::ProviderError;
use async_trait::async_trait;
use reqwest::{RequestBuilder, Response, StatusCode};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use tracing::debug;
use url::Url;

const USER_AGENT: &str = "LeetSync";
const API_VERSION: &str = "2022-11-28";

/// `owner/repo` pair.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RepositoryId {
    pub owner: String,
    pub name: String,
}

impl RepositoryId {
    pub fn new(owner: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            owner: owner.into(),
            name: name.into(),
        }
    }

    /// The sync repository of `username`: `{prefix}{username}`, owned by that user.
    pub fn for_user(prefix: &str, username: &str) -> Self {
        Self::new(username, format!("{}{}", prefix, username))
    }
}

impl fmt::Display for RepositoryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.owner, self.name)
    }
}

impl FromStr for RepositoryId {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.split_once('/') {
            Some((owner, name))
                if !owner.is_empty() && !name.is_empty() && !name.contains('/') =>
            {
                Ok(Self::new(owner, name))
            }
            _ => Err(s.to_string()),
        }
    }
}

/// Repository visibility on creation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Visibility {
    Public,
    Private,
}

/// Metadata of an existing file.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct FileMeta {
    pub sha: String,
}

/// A file write. `sha` must be present to update, absent to create.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteFile {
    pub path: String,
    /// Base64 encoded content
    pub content: String,
    pub sha: Option<String>,
    pub branch: String,
}

/// Result of a successful write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PutOutcome {
    pub path: String,
    /// Blob sha of the written content
    pub sha: String,
}

/// Body of `PUT /repos/{owner}/{repo}/contents/{path}`.
#[derive(Debug, Serialize)]
struct PutFileRequest<'a> {
    message: &'a str,
    content: &'a str,
    branch: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    sha: Option<&'a str>,
}

#[derive(Debug, Serialize)]
struct CreateRepoRequest<'a> {
    name: &'a str,
    description: &'a str,
    private: bool,
    auto_init: bool,
}

#[derive(Debug, Deserialize)]
struct PutFileResponse {
    content: PutFileContent,
}

#[derive(Debug, Deserialize)]
struct PutFileContent {
    path: String,
    sha: String,
}

#[derive(Debug, Deserialize)]
struct GitHubMessage {
    message: Option<String>,
}

/// Hosting provider operations used by the orchestrators.
#[async_trait]
pub trait ProviderApi: Send + Sync {
    /// Login of the token's owner.
    async fn current_user(&self, token: &str) -> Result<String, ProviderError>;

    /// `false` on 404, `true` on success.
    async fn repository_exists(
        &self,
        token: &str,
        repo: &RepositoryId,
    ) -> Result<bool, ProviderError>;

    /// Create a repository owned by the token's user.
    async fn create_repository(
        &self,
        token: &str,
        name: &str,
        visibility: Visibility,
    ) -> Result<(), ProviderError>;

    /// `None` on 404.
    async fn get_file(
        &self,
        token: &str,
        repo: &RepositoryId,
        path: &str,
    ) -> Result<Option<FileMeta>, ProviderError>;

    /// Create (no sha) or update (sha) a file.
    async fn put_file(
        &self,
        token: &str,
        repo: &RepositoryId,
        file: &RemoteFile,
        message: &str,
    ) -> Result<PutOutcome, ProviderError>;
}

/// GitHub implementation over reqwest.
#[derive(Clone)]
pub struct GitHubClient {
    client: reqwest::Client,
    base: Url,
}

impl GitHubClient {
    /// Client for `api_base` (normally `https://api.github.com`).
    pub fn new(api_base: &str) -> Result<Self, ProviderError> {
        Ok(Self {
            client: reqwest::Client::new(),
            base: Url::parse(api_base)?,
        })
    }

    fn endpoint(&self, segments: &[&str]) -> Result<Url, ProviderError> {
        let mut url = self.base.clone();
        url.path_segments_mut()
            .map_err(|_| {
                ProviderError::MalformedResponse(format!(
                    "API base '{}' cannot carry a path",
                    self.base
                ))
            })?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    fn authed(&self, builder: RequestBuilder, token: &str) -> RequestBuilder {
        builder
            .header("Accept", "application/vnd.github+json")
            .header("Authorization", format!("Bearer {}", token))
            .header("User-Agent", USER_AGENT)
            .header("X-GitHub-Api-Version", API_VERSION)
    }

    fn contents_url(&self, repo: &RepositoryId, path: &str) -> Result<Url, ProviderError> {
        let mut segments = vec!["repos", repo.owner.as_str(), repo.name.as_str(), "contents"];
        segments.extend(path.split('/').filter(|s| !s.is_empty()));
        self.endpoint(&segments)
    }
}

async fn unexpected(response: Response) -> ProviderError {
    let status = response.status().as_u16();
    let body = response.text().await.unwrap_or_default();
    ProviderError::UnexpectedStatus { status, body }
}

#[async_trait]
impl ProviderApi for GitHubClient {
    async fn current_user(&self, token: &str) -> Result<String, ProviderError> {
        let url = self.endpoint(&["user"])?;
        let response = self.authed(self.client.get(url), token).send().await?;

        match response.status() {
            StatusCode::UNAUTHORIZED => Err(ProviderError::Auth),
            s if s.is_success() => {
                let user: serde_json::Value = response.json().await?;
                user.get("login")
                    .and_then(|l| l.as_str())
                    .map(|s| s.to_string())
                    .ok_or_else(|| {
                        ProviderError::MalformedResponse("user response has no login".to_string())
                    })
            }
            _ => Err(unexpected(response).await),
        }
    }

    async fn repository_exists(
        &self,
        token: &str,
        repo: &RepositoryId,
    ) -> Result<bool, ProviderError> {
        let url = self.endpoint(&["repos", &repo.owner, &repo.name])?;
        let response = self.authed(self.client.get(url), token).send().await?;

        match response.status() {
            StatusCode::NOT_FOUND => Ok(false),
            s if s.is_success() => Ok(true),
            _ => Err(unexpected(response).await),
        }
    }

    async fn create_repository(
        &self,
        token: &str,
        name: &str,
        visibility: Visibility,
    ) -> Result<(), ProviderError> {
        let url = self.endpoint(&["user", "repos"])?;
        let request = CreateRepoRequest {
            name,
            description: "Accepted LeetCode solutions, synced by LeetSync",
            private: visibility == Visibility::Private,
            auto_init: false,
        };

        let response = self
            .authed(self.client.post(url), token)
            .json(&request)
            .send()
            .await?;

        if response.status().is_success() {
            debug!("[github] Created repository {}", name);
            return Ok(());
        }

        let body = response.text().await.unwrap_or_default();
        let message = serde_json::from_str::<GitHubMessage>(&body)
            .ok()
            .and_then(|m| m.message)
            .unwrap_or(body);
        Err(ProviderError::RepoCreation { message })
    }

    async fn get_file(
        &self,
        token: &str,
        repo: &RepositoryId,
        path: &str,
    ) -> Result<Option<FileMeta>, ProviderError> {
        let url = self.contents_url(repo, path)?;
        let response = self.authed(self.client.get(url), token).send().await?;

        match response.status() {
            StatusCode::NOT_FOUND => Ok(None),
            s if s.is_success() => Ok(Some(response.json().await?)),
            _ => Err(unexpected(response).await),
        }
    }

    async fn put_file(
        &self,
        token: &str,
        repo: &RepositoryId,
        file: &RemoteFile,
        message: &str,
    ) -> Result<PutOutcome, ProviderError> {
        let url = self.contents_url(repo, &file.path)?;
        let request = PutFileRequest {
            message,
            content: &file.content,
            branch: &file.branch,
            sha: file.sha.as_deref(),
        };

        let response = self
            .authed(self.client.put(url), token)
            .json(&request)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(ProviderError::Write { status, body });
        }

        let written: PutFileResponse = response.json().await?;
        Ok(PutOutcome {
            path: written.content.path,
            sha: written.content.sha,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{body_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const TOKEN: &str = "gho_test";

    #[test]
    fn test_repository_for_user() {
        let repo = RepositoryId::for_user("LEETCODESYNC-", "alice");
        assert_eq!(repo.owner, "alice");
        assert_eq!(repo.name, "LEETCODESYNC-alice");
        assert_eq!(repo.to_string(), "alice/LEETCODESYNC-alice");
    }

    async fn client_for(server: &MockServer) -> GitHubClient {
        GitHubClient::new(&server.uri()).expect("mock server uri")
    }

    #[test]
    fn test_repository_id_parse() {
        let id: RepositoryId = "alice/LEETCODESYNC-alice".parse().unwrap();
        assert_eq!(id.owner, "alice");
        assert_eq!(id.name, "LEETCODESYNC-alice");
        assert_eq!(id.to_string(), "alice/LEETCODESYNC-alice");

        assert!("alice".parse::<RepositoryId>().is_err());
        assert!("/repo".parse::<RepositoryId>().is_err());
        assert!("alice/".parse::<RepositoryId>().is_err());
        assert!("a/b/c".parse::<RepositoryId>().is_err());
    }

    #[tokio::test]
    async fn test_current_user_sends_bearer() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/user"))
            .and(header("Authorization", "Bearer gho_test"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"login": "alice"})))
            .expect(1)
            .mount(&server)
            .await;

        let client = client_for(&server).await;
        assert_eq!(client.current_user(TOKEN).await.unwrap(), "alice");
    }

    #[tokio::test]
    async fn test_current_user_unauthorized() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/user"))
            .respond_with(
                ResponseTemplate::new(401).set_body_json(json!({"message": "Bad credentials"})),
            )
            .mount(&server)
            .await;

        let client = client_for(&server).await;
        let err = client.current_user(TOKEN).await.unwrap_err();
        assert!(matches!(err, ProviderError::Auth));
    }

    #[tokio::test]
    async fn test_repository_exists_maps_statuses() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/repos/alice/present"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": 1})))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/repos/alice/absent"))
            .respond_with(ResponseTemplate::new(404).set_body_json(json!({"message": "Not Found"})))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/repos/alice/broken"))
            .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
            .mount(&server)
            .await;

        let client = client_for(&server).await;
        assert!(client
            .repository_exists(TOKEN, &RepositoryId::new("alice", "present"))
            .await
            .unwrap());
        assert!(!client
            .repository_exists(TOKEN, &RepositoryId::new("alice", "absent"))
            .await
            .unwrap());

        match client
            .repository_exists(TOKEN, &RepositoryId::new("alice", "broken"))
            .await
        {
            Err(ProviderError::UnexpectedStatus { status, body }) => {
                assert_eq!(status, 500);
                assert_eq!(body, "boom");
            }
            other => panic!("expected UnexpectedStatus, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_create_repository_public() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/user/repos"))
            .and(body_json(json!({
                "name": "LEETCODESYNC-alice",
                "description": "Accepted LeetCode solutions, synced by LeetSync",
                "private": false,
                "auto_init": false
            })))
            .respond_with(ResponseTemplate::new(201).set_body_json(json!({"id": 7})))
            .expect(1)
            .mount(&server)
            .await;

        let client = client_for(&server).await;
        client
            .create_repository(TOKEN, "LEETCODESYNC-alice", Visibility::Public)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_create_repository_carries_message() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/user/repos"))
            .respond_with(ResponseTemplate::new(422).set_body_json(json!({
                "message": "Repository creation failed."
            })))
            .mount(&server)
            .await;

        let client = client_for(&server).await;
        let err = client
            .create_repository(TOKEN, "LEETCODESYNC-alice", Visibility::Public)
            .await
            .unwrap_err();
        match err {
            ProviderError::RepoCreation { message } => {
                assert_eq!(message, "Repository creation failed.")
            }
            other => panic!("expected RepoCreation, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_get_file_found_and_missing() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/repos/alice/r/contents/1.two-sum.rust.txt"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "sha": "abc123",
                "path": "1.two-sum.rust.txt"
            })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/repos/alice/r/contents/2.add-two-numbers.rust.txt"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let client = client_for(&server).await;
        let repo = RepositoryId::new("alice", "r");
        let found = client.get_file(TOKEN, &repo, "1.two-sum.rust.txt").await.unwrap();
        assert_eq!(found, Some(FileMeta { sha: "abc123".to_string() }));
        let missing = client
            .get_file(TOKEN, &repo, "2.add-two-numbers.rust.txt")
            .await
            .unwrap();
        assert_eq!(missing, None);
    }

    #[tokio::test]
    async fn test_put_file_omits_sha_on_create() {
        let server = MockServer::start().await;
        Mock::given(method("PUT"))
            .and(path("/repos/alice/r/contents/1.two-sum.rust.txt"))
            .and(body_json(json!({
                "message": "Add 1.two-sum.rust.txt",
                "content": "Zm4gbWFpbigpIHt9",
                "branch": "main"
            })))
            .respond_with(ResponseTemplate::new(201).set_body_json(json!({
                "content": {"path": "1.two-sum.rust.txt", "sha": "new-sha"}
            })))
            .expect(1)
            .mount(&server)
            .await;

        let client = client_for(&server).await;
        let file = RemoteFile {
            path: "1.two-sum.rust.txt".to_string(),
            content: "Zm4gbWFpbigpIHt9".to_string(),
            sha: None,
            branch: "main".to_string(),
        };
        let outcome = client
            .put_file(TOKEN, &RepositoryId::new("alice", "r"), &file, "Add 1.two-sum.rust.txt")
            .await
            .unwrap();
        assert_eq!(outcome.sha, "new-sha");
        assert_eq!(outcome.path, "1.two-sum.rust.txt");
    }

    #[tokio::test]
    async fn test_put_file_write_error() {
        let server = MockServer::start().await;
        Mock::given(method("PUT"))
            .respond_with(ResponseTemplate::new(404).set_body_string("Not Found"))
            .mount(&server)
            .await;

        let client = client_for(&server).await;
        let file = RemoteFile {
            path: "x.txt".to_string(),
            content: String::new(),
            sha: Some("old".to_string()),
            branch: "main".to_string(),
        };
        let err = client
            .put_file(TOKEN, &RepositoryId::new("alice", "r"), &file, "Add x.txt")
            .await
            .unwrap_err();
        match err {
            ProviderError::Write { status, body } => {
                assert_eq!(status, 404);
                assert_eq!(body, "Not Found");
            }
            other => panic!("expected Write, got {:?}", other),
        }
    }
}
