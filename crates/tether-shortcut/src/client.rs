use std::time::Duration;

use serde::de::DeserializeOwned;
use serde_json::json;

use crate::types::{
    AttachmentRequest, NewStory, ShortcutComment, ShortcutEpic, ShortcutIteration, ShortcutLabel,
    ShortcutMember, ShortcutStory, StoryPatch,
};
use crate::ShortcutApiError;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
const ERROR_BODY_LIMIT: usize = 800;

/// Result of a create call where the destination enforces uniqueness.
#[derive(Debug, Clone, PartialEq)]
pub enum Created<T> {
    New(T),
    AlreadyExists,
}

#[derive(Clone)]
pub struct ShortcutClient {
    http: reqwest::Client,
    api_base: String,
}

impl ShortcutClient {
    pub fn new(api_base: impl Into<String>, token: &str) -> Result<Self, ShortcutApiError> {
        let mut headers = reqwest::header::HeaderMap::new();
        headers.insert(
            reqwest::header::CONTENT_TYPE,
            reqwest::header::HeaderValue::from_static("application/json"),
        );
        headers.insert(
            "shortcut-token",
            reqwest::header::HeaderValue::from_str(token.trim())
                .map_err(|_| ShortcutApiError::Config("invalid api token header".to_string()))?,
        );
        let http = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|error| ShortcutApiError::Config(error.to_string()))?;
        Ok(Self {
            http,
            api_base: api_base.into().trim_end_matches('/').to_string(),
        })
    }

    fn url(&self, tail: &str) -> String {
        format!("{}/{}", self.api_base, tail)
    }

    pub async fn get_story(&self, story_id: i64) -> Result<ShortcutStory, ShortcutApiError> {
        self.request_json("get story", self.http.get(self.url(&format!("stories/{story_id}"))))
            .await
    }

    pub async fn create_story(&self, story: &NewStory) -> Result<ShortcutStory, ShortcutApiError> {
        self.request_json("create story", self.http.post(self.url("stories")).json(story))
            .await
    }

    pub async fn update_story(
        &self,
        story_id: i64,
        patch: &StoryPatch,
    ) -> Result<ShortcutStory, ShortcutApiError> {
        self.request_json(
            "update story",
            self.http
                .put(self.url(&format!("stories/{story_id}")))
                .json(patch),
        )
        .await
    }

    pub async fn list_labels(&self) -> Result<Vec<ShortcutLabel>, ShortcutApiError> {
        self.request_json("list labels", self.http.get(self.url("labels")))
            .await
    }

    /// Create a workspace label; a duplicate-name rejection from the
    /// destination is reported as success.
    pub async fn create_label(
        &self,
        name: &str,
        color: &str,
    ) -> Result<Created<ShortcutLabel>, ShortcutApiError> {
        let operation = "create label";
        let response = self
            .http
            .post(self.url("labels"))
            .json(&json!({ "name": name, "color": format!("#{}", color.trim_start_matches('#')) }))
            .send()
            .await
            .map_err(|source| ShortcutApiError::Transport { operation, source })?;
        let status = response.status().as_u16();
        if status == 422 || status == 409 {
            return Ok(Created::AlreadyExists);
        }
        if !response.status().is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ShortcutApiError::Status {
                operation,
                status,
                body: truncate(&body),
            });
        }
        let label = response
            .json::<ShortcutLabel>()
            .await
            .map_err(|source| ShortcutApiError::Decode { operation, source })?;
        Ok(Created::New(label))
    }

    pub async fn get_comment(
        &self,
        story_id: i64,
        comment_id: i64,
    ) -> Result<ShortcutComment, ShortcutApiError> {
        self.request_json(
            "get comment",
            self.http
                .get(self.url(&format!("stories/{story_id}/comments/{comment_id}"))),
        )
        .await
    }

    pub async fn create_comment(
        &self,
        story_id: i64,
        text: &str,
        external_id: Option<&str>,
    ) -> Result<ShortcutComment, ShortcutApiError> {
        let mut payload = json!({ "text": text });
        if let Some(external_id) = external_id {
            payload["external_id"] = json!(external_id);
        }
        self.request_json(
            "create comment",
            self.http
                .post(self.url(&format!("stories/{story_id}/comments")))
                .json(&payload),
        )
        .await
    }

    pub async fn update_comment(
        &self,
        story_id: i64,
        comment_id: i64,
        text: &str,
    ) -> Result<ShortcutComment, ShortcutApiError> {
        self.request_json(
            "update comment",
            self.http
                .put(self.url(&format!("stories/{story_id}/comments/{comment_id}")))
                .json(&json!({ "text": text })),
        )
        .await
    }

    pub async fn get_member(&self, member_id: &str) -> Result<ShortcutMember, ShortcutApiError> {
        self.request_json(
            "get member",
            self.http.get(self.url(&format!("members/{member_id}"))),
        )
        .await
    }

    /// Profile of the member owning the API token.
    pub async fn current_member(&self) -> Result<ShortcutMember, ShortcutApiError> {
        self.request_json("resolve member", self.http.get(self.url("member")))
            .await
    }

    pub async fn get_epic(&self, epic_id: i64) -> Result<ShortcutEpic, ShortcutApiError> {
        self.request_json("get epic", self.http.get(self.url(&format!("epics/{epic_id}"))))
            .await
    }

    pub async fn create_epic(
        &self,
        name: &str,
        description: &str,
        team_id: &str,
        target_date: Option<&str>,
    ) -> Result<ShortcutEpic, ShortcutApiError> {
        let mut payload = json!({
            "name": name,
            "description": description,
            "group_ids": [team_id],
        });
        if let Some(target_date) = target_date {
            payload["deadline"] = json!(target_date);
        }
        self.request_json("create epic", self.http.post(self.url("epics")).json(&payload))
            .await
    }

    pub async fn get_iteration(
        &self,
        iteration_id: i64,
    ) -> Result<ShortcutIteration, ShortcutApiError> {
        self.request_json(
            "get iteration",
            self.http.get(self.url(&format!("iterations/{iteration_id}"))),
        )
        .await
    }

    pub async fn create_iteration(
        &self,
        name: &str,
        description: &str,
        team_id: &str,
        start_date: &str,
        end_date: Option<&str>,
    ) -> Result<ShortcutIteration, ShortcutApiError> {
        let mut payload = json!({
            "name": name,
            "description": description,
            "group_ids": [team_id],
            "start_date": start_date,
        });
        if let Some(end_date) = end_date {
            payload["end_date"] = json!(end_date);
        }
        self.request_json(
            "create iteration",
            self.http.post(self.url("iterations")).json(&payload),
        )
        .await
    }

    pub async fn create_attachment(
        &self,
        attachment: &AttachmentRequest,
    ) -> Result<(), ShortcutApiError> {
        let operation = "create attachment";
        let response = self
            .http
            .post(self.url("attachments"))
            .json(attachment)
            .send()
            .await
            .map_err(|source| ShortcutApiError::Transport { operation, source })?;
        if response.status().is_success() {
            return Ok(());
        }
        let status = response.status().as_u16();
        let body = response.text().await.unwrap_or_default();
        Err(ShortcutApiError::Status {
            operation,
            status,
            body: truncate(&body),
        })
    }

    async fn request_json<T>(
        &self,
        operation: &'static str,
        request: reqwest::RequestBuilder,
    ) -> Result<T, ShortcutApiError>
    where
        T: DeserializeOwned,
    {
        let response = request
            .send()
            .await
            .map_err(|source| ShortcutApiError::Transport { operation, source })?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ShortcutApiError::Status {
                operation,
                status: status.as_u16(),
                body: truncate(&body),
            });
        }
        response
            .json::<T>()
            .await
            .map_err(|source| ShortcutApiError::Decode { operation, source })
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
