use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{json, Value};

use crate::types::{GithubComment, GithubIssue, GithubLabel, GithubMilestone, GithubUser, NewIssue};
use crate::GithubApiError;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
const PAGE_SIZE: usize = 100;
const ERROR_BODY_LIMIT: usize = 800;

/// Result of a create call against a resource with a uniqueness constraint
/// on the destination. "Already exists" is success for the mapper.
#[derive(Debug, Clone, PartialEq)]
pub enum Created<T> {
    New(T),
    AlreadyExists,
}

/// Patch payload for issue updates; only present fields are sent.
#[derive(Debug, Clone, Default, Serialize)]
pub struct IssuePatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub body: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub state_reason: Option<String>,
}

#[derive(Clone)]
pub struct GithubClient {
    http: reqwest::Client,
    api_base: String,
    repo: String,
}

impl GithubClient {
    /// `repo` is the full `owner/name` pair the client is scoped to.
    pub fn new(
        api_base: impl Into<String>,
        token: &str,
        user_agent: &str,
        repo: impl Into<String>,
    ) -> Result<Self, GithubApiError> {
        let mut headers = reqwest::header::HeaderMap::new();
        headers.insert(
            reqwest::header::USER_AGENT,
            reqwest::header::HeaderValue::from_str(user_agent)
                .map_err(|_| GithubApiError::Config("invalid user agent header".to_string()))?,
        );
        headers.insert(
            reqwest::header::ACCEPT,
            reqwest::header::HeaderValue::from_static("application/vnd.github+json"),
        );
        headers.insert(
            "x-github-api-version",
            reqwest::header::HeaderValue::from_static("2022-11-28"),
        );
        let auth_header = format!("Bearer {}", token.trim());
        headers.insert(
            reqwest::header::AUTHORIZATION,
            reqwest::header::HeaderValue::from_str(&auth_header)
                .map_err(|_| GithubApiError::Config("invalid authorization header".to_string()))?,
        );

        let http = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|error| GithubApiError::Config(error.to_string()))?;
        Ok(Self {
            http,
            api_base: api_base.into().trim_end_matches('/').to_string(),
            repo: repo.into(),
        })
    }

    fn repo_url(&self, tail: &str) -> String {
        format!("{}/repos/{}/{}", self.api_base, self.repo, tail)
    }

    pub async fn authenticated_user(&self) -> Result<GithubUser, GithubApiError> {
        self.request_json("resolve user", self.http.get(format!("{}/user", self.api_base)))
            .await
    }

    pub async fn get_issue(&self, number: i64) -> Result<GithubIssue, GithubApiError> {
        self.request_json("get issue", self.http.get(self.repo_url(&format!("issues/{number}"))))
            .await
    }

    pub async fn create_issue(&self, issue: &NewIssue) -> Result<GithubIssue, GithubApiError> {
        self.request_json(
            "create issue",
            self.http.post(self.repo_url("issues")).json(issue),
        )
        .await
    }

    pub async fn update_issue(
        &self,
        number: i64,
        patch: &IssuePatch,
    ) -> Result<GithubIssue, GithubApiError> {
        self.request_json(
            "update issue",
            self.http
                .patch(self.repo_url(&format!("issues/{number}")))
                .json(patch),
        )
        .await
    }

    /// Set or clear (`None`) the issue's milestone.
    pub async fn set_issue_milestone(
        &self,
        number: i64,
        milestone_number: Option<i64>,
    ) -> Result<GithubIssue, GithubApiError> {
        let payload = json!({
            "milestone": milestone_number.map_or(Value::Null, Value::from)
        });
        self.request_json(
            "set issue milestone",
            self.http
                .patch(self.repo_url(&format!("issues/{number}")))
                .json(&payload),
        )
        .await
    }

    pub async fn list_comments(&self, number: i64) -> Result<Vec<GithubComment>, GithubApiError> {
        let mut page = 1_u32;
        let mut rows = Vec::new();
        loop {
            let chunk: Vec<GithubComment> = self
                .request_json(
                    "list comments",
                    self.http
                        .get(self.repo_url(&format!("issues/{number}/comments")))
                        .query(&[
                            ("sort", "created"),
                            ("direction", "asc"),
                            ("per_page", &PAGE_SIZE.to_string()),
                            ("page", &page.to_string()),
                        ]),
                )
                .await?;
            let chunk_len = chunk.len();
            rows.extend(chunk);
            if chunk_len < PAGE_SIZE {
                break;
            }
            page = page.saturating_add(1);
        }
        Ok(rows)
    }

    pub async fn create_comment(
        &self,
        number: i64,
        body: &str,
    ) -> Result<GithubComment, GithubApiError> {
        self.request_json(
            "create comment",
            self.http
                .post(self.repo_url(&format!("issues/{number}/comments")))
                .json(&json!({ "body": body })),
        )
        .await
    }

    pub async fn add_labels(&self, number: i64, names: &[String]) -> Result<(), GithubApiError> {
        if names.is_empty() {
            return Ok(());
        }
        self.request_success(
            "add labels",
            self.http
                .post(self.repo_url(&format!("issues/{number}/labels")))
                .json(&json!({ "labels": names })),
        )
        .await
    }

    /// Remove a label from an issue. Returns `Ok(false)` when the label was
    /// not on the issue (404), which callers treat as already removed.
    pub async fn remove_label(&self, number: i64, name: &str) -> Result<bool, GithubApiError> {
        let operation = "remove label";
        let url = self.segment_url(&format!("issues/{number}/labels"), name, operation)?;
        let response = self
            .http
            .delete(url)
            .send()
            .await
            .map_err(|source| GithubApiError::Transport { operation, source })?;
        let status = response.status();
        if status.is_success() {
            return Ok(true);
        }
        if status.as_u16() == 404 {
            return Ok(false);
        }
        let body = response.text().await.unwrap_or_default();
        Err(GithubApiError::Status {
            operation,
            status: status.as_u16(),
            body: truncate(&body),
        })
    }

    /// Create a repo label; HTTP 422 from the destination means it already
    /// exists and is reported as success.
    pub async fn create_label(
        &self,
        name: &str,
        color: &str,
    ) -> Result<Created<GithubLabel>, GithubApiError> {
        self.request_created(
            "create label",
            self.http
                .post(self.repo_url("labels"))
                .json(&json!({ "name": name, "color": color })),
        )
        .await
    }

    pub async fn list_milestones(&self) -> Result<Vec<GithubMilestone>, GithubApiError> {
        self.request_json(
            "list milestones",
            self.http
                .get(self.repo_url("milestones"))
                .query(&[("state", "all"), ("per_page", &PAGE_SIZE.to_string())]),
        )
        .await
    }

    pub async fn create_milestone(
        &self,
        title: &str,
        description: &str,
        state: &str,
        due_on: Option<&str>,
    ) -> Result<Created<GithubMilestone>, GithubApiError> {
        let mut payload = json!({
            "title": title,
            "description": description,
            "state": state,
        });
        if let Some(due_on) = due_on {
            payload["due_on"] = Value::from(due_on);
        }
        self.request_created(
            "create milestone",
            self.http.post(self.repo_url("milestones")).json(&payload),
        )
        .await
    }

    pub async fn add_assignees(
        &self,
        number: i64,
        logins: &[String],
    ) -> Result<(), GithubApiError> {
        if logins.is_empty() {
            return Ok(());
        }
        self.request_success(
            "add assignees",
            self.http
                .post(self.repo_url(&format!("issues/{number}/assignees")))
                .json(&json!({ "assignees": logins })),
        )
        .await
    }

    pub async fn remove_assignees(
        &self,
        number: i64,
        logins: &[String],
    ) -> Result<(), GithubApiError> {
        if logins.is_empty() {
            return Ok(());
        }
        self.request_success(
            "remove assignees",
            self.http
                .delete(self.repo_url(&format!("issues/{number}/assignees")))
                .json(&json!({ "assignees": logins })),
        )
        .await
    }

    /// Invite a user as a repo collaborator. 204 means already invited.
    pub async fn invite_collaborator(&self, username: &str) -> Result<(), GithubApiError> {
        let operation = "invite collaborator";
        let url = self.segment_url("collaborators", username, operation)?;
        self.request_success(operation, self.http.put(url)).await
    }

    /// Build a URL whose final segment needs percent-encoding (label names
    /// with spaces, user-provided handles).
    fn segment_url(
        &self,
        tail: &str,
        segment: &str,
        operation: &'static str,
    ) -> Result<reqwest::Url, GithubApiError> {
        let mut url = reqwest::Url::parse(&self.repo_url(tail)).map_err(|error| {
            GithubApiError::Config(format!("invalid {operation} url: {error}"))
        })?;
        url.path_segments_mut()
            .map_err(|()| GithubApiError::Config(format!("invalid {operation} base url")))?
            .push(segment);
        Ok(url)
    }

    async fn request_json<T>(
        &self,
        operation: &'static str,
        request: reqwest::RequestBuilder,
    ) -> Result<T, GithubApiError>
    where
        T: DeserializeOwned,
    {
        let response = request
            .send()
            .await
            .map_err(|source| GithubApiError::Transport { operation, source })?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(GithubApiError::Status {
                operation,
                status: status.as_u16(),
                body: truncate(&body),
            });
        }
        response
            .json::<T>()
            .await
            .map_err(|source| GithubApiError::Decode { operation, source })
    }

    async fn request_success(
        &self,
        operation: &'static str,
        request: reqwest::RequestBuilder,
    ) -> Result<(), GithubApiError> {
        let response = request
            .send()
            .await
            .map_err(|source| GithubApiError::Transport { operation, source })?;
        let status = response.status();
        if status.is_success() {
            return Ok(());
        }
        let body = response.text().await.unwrap_or_default();
        Err(GithubApiError::Status {
            operation,
            status: status.as_u16(),
            body: truncate(&body),
        })
    }

    async fn request_created<T>(
        &self,
        operation: &'static str,
        request: reqwest::RequestBuilder,
    ) -> Result<Created<T>, GithubApiError>
    where
        T: DeserializeOwned,
    {
        let response = request
            .send()
            .await
            .map_err(|source| GithubApiError::Transport { operation, source })?;
        let status = response.status();
        if status.as_u16() == 422 {
            return Ok(Created::AlreadyExists);
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(GithubApiError::Status {
                operation,
                status: status.as_u16(),
                body: truncate(&body),
            });
        }
        let created = response
            .json::<T>()
            .await
            .map_err(|source| GithubApiError::Decode { operation, source })?;
        Ok(Created::New(created))
    }
}

fn truncate(body: &str) -> String {
    if body.len() <= ERROR_BODY_LIMIT {
        return body.to_string();
    }
    let mut cut = ERROR_BODY_LIMIT;
    while !body.is_char_boundary(cut) {
        cut -= 1;
    }
    format!("{}…", &body[..cut])
}
