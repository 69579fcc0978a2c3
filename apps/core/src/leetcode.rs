//! LeetCode Client - reads accepted submissions through the GraphQL API.
//!
//! Authenticated with the user's `LEETCODE_SESSION` cookie.
//! Only the newest accepted submission per problem is kept.

use crate::config::LeetCodeConfig;
use crate::error::LeetCodeError;
use crate::submission::SubmissionRecord;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};
use std::collections::HashSet;
use std::fmt;
use std::time::Duration;
use tracing::{debug, info, warn};

const BROWSER_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
(KHTML, like Gecko) Chrome/91.0.4472.124 Safari/537.36";

/// Ceiling for the doubling backoff between GraphQL attempts.
const MAX_REQUEST_BACKOFF: Duration = Duration::from_secs(60);

const QUERY_SUBMISSION_LIST: &str = r#"
query mySubmissions($offset: Int!, $limit: Int!) {
  submissionList(offset: $offset, limit: $limit) {
    submissions {
      id
      statusDisplay
      titleSlug
    }
    hasNext
  }
}
"#;

const QUERY_SUBMISSION_DETAILS: &str = r#"
query submissionDetails($submissionId: Int!) {
  submissionDetails(submissionId: $submissionId) {
    code
    statusCode
    lang {
      name
    }
    question {
      questionId
      titleSlug
    }
  }
}
"#;

const QUERY_QUESTION: &str = r#"
query questionTitle($titleSlug: String!) {
  question(titleSlug: $titleSlug) {
    questionId
    questionFrontendId
    title
    titleSlug
  }
}
"#;

#[derive(Debug, Deserialize)]
struct GraphQlResponse<T> {
    data: Option<T>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SubmissionListData {
    submission_list: SubmissionList,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SubmissionList {
    submissions: Vec<SubmissionEntry>,
    has_next: bool,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SubmissionEntry {
    id: Value,
    status_display: String,
    title_slug: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SubmissionDetailsData {
    submission_details: Option<SubmissionDetails>,
}

/// Code and language of one submission.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmissionDetails {
    pub code: String,
    pub lang: Language,
    pub question: QuestionRef,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Language {
    pub name: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuestionRef {
    pub title_slug: String,
}

#[derive(Debug, Deserialize)]
struct QuestionData {
    question: Option<Question>,
}

/// Problem metadata.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Question {
    pub question_id: String,
    pub question_frontend_id: String,
    pub title: String,
    pub title_slug: String,
}

/// An accepted submission from the list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AcceptedSubmission {
    pub id: i64,
    pub title_slug: String,
}

/// GraphQL client bound to one session cookie.
pub struct LeetCodeClient {
    client: reqwest::Client,
    graphql_url: String,
    session: String,
    page_size: u32,
    detail_retries: u32,
    retry_delay: Duration,
    request_attempts: u32,
    request_backoff: Duration,
}

impl fmt::Debug for LeetCodeClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LeetCodeClient")
            .field("graphql_url", &self.graphql_url)
            .field("session", &"<redacted>")
            .finish()
    }
}

/// Throttling, gateway errors and dropped connections are worth another try.
fn is_transient(err: &LeetCodeError) -> bool {
    match err {
        LeetCodeError::Status { status, .. } => matches!(status, 429 | 500 | 502 | 503 | 504),
        LeetCodeError::Http(e) => e.is_connect() || e.is_timeout(),
        LeetCodeError::Format(_) => false,
    }
}

impl LeetCodeClient {
    pub fn new(config: &LeetCodeConfig, session: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            graphql_url: config.graphql_url.clone(),
            session: session.into(),
            page_size: config.page_size.max(1),
            detail_retries: config.detail_retries.max(1),
            retry_delay: Duration::from_secs(config.detail_retry_delay_secs),
            request_attempts: config.request_attempts.max(1),
            request_backoff: Duration::from_millis(config.request_backoff_ms),
        }
    }

    /// Override the wait between detail attempts.
    pub fn with_retry_delay(mut self, delay: Duration) -> Self {
        self.retry_delay = delay;
        self
    }

    /// Override the first backoff after a throttled or failed request.
    pub fn with_request_backoff(mut self, backoff: Duration) -> Self {
        self.request_backoff = backoff;
        self
    }

    async fn send(&self, body: &Value) -> Result<String, LeetCodeError> {
        let response = self
            .client
            .post(&self.graphql_url)
            .header("Cookie", format!("LEETCODE_SESSION={}", self.session))
            .header("User-Agent", BROWSER_USER_AGENT)
            .header("Referer", "https://leetcode.com")
            .json(body)
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        if !status.is_success() {
            return Err(LeetCodeError::Status {
                status: status.as_u16(),
                body,
            });
        }
        Ok(body)
    }

    /// POST one GraphQL operation, backing off on throttling and server errors.
    async fn query<T: DeserializeOwned>(
        &self,
        operation: &str,
        query: &str,
        variables: Value,
    ) -> Result<Option<T>, LeetCodeError> {
        let request = json!({
            "operationName": operation,
            "query": query,
            "variables": variables,
        });

        let mut delay = self.request_backoff;
        let mut attempt = 1;
        let body = loop {
            match self.send(&request).await {
                Ok(body) => break body,
                Err(e) if attempt < self.request_attempts && is_transient(&e) => {
                    warn!(
                        "[leetcode] {} attempt {}/{} failed: {}, retrying in {:?}",
                        operation, attempt, self.request_attempts, e, delay
                    );
                    tokio::time::sleep(delay).await;
                    delay = delay.saturating_mul(2).min(MAX_REQUEST_BACKOFF);
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        };

        let parsed: GraphQlResponse<T> = serde_json::from_str(&body)
            .map_err(|e| LeetCodeError::Format(format!("{}: {}", e, body)))?;
        Ok(parsed.data)
    }

    /// Newest accepted submission per problem, across all pages.
    pub async fn accepted_submissions(&self) -> Result<Vec<AcceptedSubmission>, LeetCodeError> {
        let mut offset = 0u32;
        let mut seen = HashSet::new();
        let mut accepted = Vec::new();

        loop {
            let data: SubmissionListData = self
                .query(
                    "mySubmissions",
                    QUERY_SUBMISSION_LIST,
                    json!({ "offset": offset, "limit": self.page_size }),
                )
                .await?
                .ok_or_else(|| LeetCodeError::Format("submissionList has no data".to_string()))?;

            for entry in data.submission_list.submissions {
                if entry.status_display != "Accepted" || seen.contains(&entry.title_slug) {
                    continue;
                }
                let id = parse_id(&entry.id)?;
                seen.insert(entry.title_slug.clone());
                accepted.push(AcceptedSubmission {
                    id,
                    title_slug: entry.title_slug,
                });
            }

            if !data.submission_list.has_next {
                break;
            }
            offset += self.page_size;
        }

        info!("[leetcode] {} accepted problem(s) found", accepted.len());
        Ok(accepted)
    }

    /// Code for one submission. `None` if LeetCode never produced the details.
    pub async fn submission_details(
        &self,
        id: i64,
    ) -> Result<Option<SubmissionDetails>, LeetCodeError> {
        for attempt in 1..=self.detail_retries {
            let data: Option<SubmissionDetailsData> = self
                .query(
                    "submissionDetails",
                    QUERY_SUBMISSION_DETAILS,
                    json!({ "submissionId": id }),
                )
                .await?;

            if let Some(details) = data.and_then(|d| d.submission_details) {
                return Ok(Some(details));
            }

            debug!(
                "[leetcode] Details for {} not ready (attempt {}/{})",
                id, attempt, self.detail_retries
            );
            if attempt < self.detail_retries {
                tokio::time::sleep(self.retry_delay).await;
            }
        }
        Ok(None)
    }

    /// Problem metadata by slug.
    pub async fn question(&self, title_slug: &str) -> Result<Option<Question>, LeetCodeError> {
        let data: Option<QuestionData> = self
            .query(
                "questionTitle",
                QUERY_QUESTION,
                json!({ "titleSlug": title_slug }),
            )
            .await?;
        Ok(data.and_then(|d| d.question))
    }

    /// Every accepted solution as a record ready to push.
    /// Problems whose details or metadata cannot be fetched are skipped.
    pub async fn collect_records(&self) -> Result<Vec<SubmissionRecord>, LeetCodeError> {
        let mut records = Vec::new();

        for submission in self.accepted_submissions().await? {
            let details = match self.submission_details(submission.id).await {
                Ok(Some(details)) => details,
                Ok(None) => {
                    warn!("[leetcode] No details for submission {}, skipping", submission.id);
                    continue;
                }
                Err(e) => {
                    warn!("[leetcode] Submission {}: {}, skipping", submission.id, e);
                    continue;
                }
            };

            let question = match self.question(&details.question.title_slug).await {
                Ok(Some(q)) => q,
                Ok(None) => {
                    warn!(
                        "[leetcode] No question data for {}, skipping",
                        details.question.title_slug
                    );
                    continue;
                }
                Err(e) => {
                    warn!("[leetcode] Question {}: {}, skipping", details.question.title_slug, e);
                    continue;
                }
            };

            records.push(SubmissionRecord::new(
                question.question_frontend_id,
                question.title_slug,
                details.lang.name,
                details.code,
            ));
        }

        Ok(records)
    }
}

fn parse_id(id: &Value) -> Result<i64, LeetCodeError> {
    match id {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.parse().ok(),
        _ => None,
    }
    .ok_or_else(|| LeetCodeError::Format(format!("invalid submission id {}", id)))
}
