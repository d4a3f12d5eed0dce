//! Typed GitHub webhook payloads.
//!
//! The raw body is decoded once at entry into [`GithubWebhookBody`] plus a
//! closed [`GithubEvent`] discriminant derived from the `x-github-event`
//! header and the payload's `action`; the handler matches exhaustively.

use serde::Deserialize;
use tether_github::{GithubComment, GithubIssue, GithubLabel, GithubMilestone, GithubUser};

#[derive(Debug, Clone, Deserialize)]
pub struct GithubRepository {
    pub id: i64,
    pub full_name: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GithubWebhookBody {
    #[serde(default)]
    pub action: Option<String>,
    #[serde(default)]
    pub issue: Option<GithubIssue>,
    #[serde(default)]
    pub comment: Option<GithubComment>,
    #[serde(default)]
    pub label: Option<GithubLabel>,
    #[serde(default)]
    pub milestone: Option<GithubMilestone>,
    #[serde(default)]
    pub repository: Option<GithubRepository>,
    #[serde(default)]
    pub sender: Option<GithubUser>,
    #[serde(default)]
    pub assignee: Option<GithubUser>,
}

/// Event kinds the GitHub-side handler dispatches on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GithubEvent {
    CommentCreated,
    CommentEdited,
    IssueOpened,
    IssueEdited,
    IssueClosed,
    IssueReopened,
    IssueLabeled,
    IssueUnlabeled,
    IssueAssigned,
    IssueUnassigned,
    IssueMilestoned,
    IssueDemilestoned,
    Unsupported { event: String, action: String },
}

impl GithubEvent {
    pub fn classify(event_name: &str, action: &str) -> Self {
        match (event_name, action) {
            ("issue_comment", "created") => Self::CommentCreated,
            ("issue_comment", "edited") => Self::CommentEdited,
            ("issues", "opened") => Self::IssueOpened,
            ("issues", "edited") => Self::IssueEdited,
            ("issues", "closed") => Self::IssueClosed,
            ("issues", "reopened") => Self::IssueReopened,
            ("issues", "labeled") => Self::IssueLabeled,
            ("issues", "unlabeled") => Self::IssueUnlabeled,
            ("issues", "assigned") => Self::IssueAssigned,
            ("issues", "unassigned") => Self::IssueUnassigned,
            ("issues", "milestoned") => Self::IssueMilestoned,
            ("issues", "demilestoned") => Self::IssueDemilestoned,
            (event, action) => Self::Unsupported {
                event: event.to_string(),
                action: action.to_string(),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_pairs_classify() {
        assert_eq!(
            GithubEvent::classify("issues", "opened"),
            GithubEvent::IssueOpened
        );
        assert_eq!(
            GithubEvent::classify("issue_comment", "edited"),
            GithubEvent::CommentEdited
        );
    }

    #[test]
    fn unknown_pairs_fall_through() {
        let event = GithubEvent::classify("push", "created");
        assert!(matches!(event, GithubEvent::Unsupported { .. }));
    }

    #[test]
    fn webhook_body_decodes_with_missing_sections() {
        let body: GithubWebhookBody =
            serde_json::from_str(r#"{"action":"opened"}"#).expect("decode");
        assert_eq!(body.action.as_deref(), Some("opened"));
        assert!(body.issue.is_none());
        assert!(body.repository.is_none());
    }
}
