//! Wire types for the Shortcut API.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct ShortcutTeam {
    pub id: String,
    /// Short key used in story display names, e.g. `TEAM` in `TEAM-7`.
    pub key: String,
    #[serde(default)]
    pub name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct ShortcutLabel {
    pub id: i64,
    pub name: String,
    #[serde(default)]
    pub color: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct ShortcutMember {
    pub id: String,
    pub mention_name: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct ShortcutComment {
    pub id: i64,
    pub text: String,
    pub author_id: String,
    /// Set by the engine on comments it mirrors in; its presence marks the
    /// comment as an echo of the engine's own write.
    #[serde(default)]
    pub external_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct ShortcutEpic {
    pub id: i64,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub target_date: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct ShortcutIteration {
    pub id: i64,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub start_date: Option<String>,
    #[serde(default)]
    pub end_date: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct ShortcutStory {
    pub id: i64,
    /// Team-scoped display number; combines with the team key into the
    /// story's short name.
    pub number: i64,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    pub workflow_state_id: i64,
    #[serde(default)]
    pub epic_id: Option<i64>,
    #[serde(default)]
    pub iteration_id: Option<i64>,
    #[serde(default)]
    pub labels: Vec<ShortcutLabel>,
    #[serde(default)]
    pub owner_ids: Vec<String>,
    #[serde(default)]
    pub estimate: Option<i64>,
    #[serde(default)]
    pub priority: Option<u8>,
    #[serde(default)]
    pub group_id: Option<String>,
    #[serde(default)]
    pub team: Option<ShortcutTeam>,
    #[serde(default)]
    pub app_url: Option<String>,
}

impl ShortcutStory {
    /// `KEY-number` short name, when the owning team is known.
    pub fn short_name(&self) -> Option<String> {
        self.team
            .as_ref()
            .map(|team| format!("{}-{}", team.key, self.number))
    }
}

/// Payload for story creation.
#[derive(Debug, Clone, Default, Serialize)]
pub struct NewStory {
    pub name: String,
    pub description: String,
    pub group_id: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub label_ids: Vec<i64>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub owner_ids: Vec<String>,
}

/// Patch payload for story updates; only present fields are sent, and
/// `Some(None)` sends an explicit null to clear a field.
#[derive(Debug, Clone, Default, Serialize)]
pub struct StoryPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub workflow_state_id: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub label_ids: Option<Vec<i64>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub owner_ids: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub epic_id: Option<Option<i64>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub iteration_id: Option<Option<i64>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub priority: Option<Option<u8>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub estimate: Option<Option<i64>>,
}

/// Link attachment pointing a story back at its GitHub issue.
#[derive(Debug, Clone, Serialize)]
pub struct AttachmentRequest {
    pub story_id: i64,
    pub name: String,
    pub description: String,
    pub url: String,
}
