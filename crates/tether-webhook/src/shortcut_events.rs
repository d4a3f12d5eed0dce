//! Typed Shortcut webhook payloads.
//!
//! Shortcut delivers one envelope per change with a `model`/`action` pair
//! and a map of changed-field → {old, new}. The envelope is decoded once
//! into [`ShortcutWebhookBody`] plus a closed [`ShortcutEvent`]
//! discriminant; the handler iterates only the keys present in `changes`.

use std::collections::BTreeMap;

use serde::Deserialize;
use serde_json::Value;

#[derive(Debug, Clone, Deserialize)]
pub struct FieldChange {
    #[serde(default)]
    pub old: Option<Value>,
    #[serde(default, rename = "new")]
    pub new_value: Option<Value>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ShortcutReference {
    pub id: Value,
    pub entity_type: String,
}

impl ShortcutReference {
    pub fn id_as_str(&self) -> Option<&str> {
        self.id.as_str()
    }

    pub fn id_as_i64(&self) -> Option<i64> {
        self.id.as_i64()
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ShortcutWebhookBody {
    #[serde(default)]
    pub action: Option<String>,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub primary_id: Option<i64>,
    #[serde(default)]
    pub member_id: Option<String>,
    #[serde(default)]
    pub changes: Option<BTreeMap<String, FieldChange>>,
    #[serde(default)]
    pub references: Vec<ShortcutReference>,
}

impl ShortcutWebhookBody {
    /// The team/group the event belongs to, from the reference list.
    pub fn team_reference(&self) -> Option<&str> {
        self.references
            .iter()
            .find(|reference| {
                reference.entity_type == "team" || reference.entity_type == "group"
            })
            .and_then(ShortcutReference::id_as_str)
    }

    /// The story the event concerns: the primary id for story models, a
    /// story reference otherwise.
    pub fn story_id(&self) -> Option<i64> {
        if self.model.as_deref() == Some("story") {
            return self.primary_id;
        }
        self.references
            .iter()
            .find(|reference| reference.entity_type == "story")
            .and_then(ShortcutReference::id_as_i64)
    }
}

/// Event kinds the Shortcut-side handler dispatches on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ShortcutEvent {
    StoryCreated,
    StoryUpdated,
    CommentCreated,
    Unsupported { action: String, model: String },
}

impl ShortcutEvent {
    pub fn classify(action: &str, model: &str) -> Self {
        match (action, model) {
            ("create", "story") => Self::StoryCreated,
            ("update", "story") => Self::StoryUpdated,
            ("create", "comment") => Self::CommentCreated,
            (action, model) => Self::Unsupported {
                action: action.to_string(),
                model: model.to_string(),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn story_id_prefers_primary_for_story_models() {
        let body: ShortcutWebhookBody = serde_json::from_value(json!({
            "action": "update",
            "model": "story",
            "primary_id": 7,
            "references": [
                { "id": "team-uuid", "entity_type": "team" },
                { "id": 99, "entity_type": "story" }
            ]
        }))
        .expect("decode");
        assert_eq!(body.story_id(), Some(7));
        assert_eq!(body.team_reference(), Some("team-uuid"));
    }

    #[test]
    fn comment_events_find_the_story_reference() {
        let body: ShortcutWebhookBody = serde_json::from_value(json!({
            "action": "create",
            "model": "comment",
            "primary_id": 6021,
            "references": [{ "id": 7, "entity_type": "story" }]
        }))
        .expect("decode");
        assert_eq!(body.story_id(), Some(7));
    }

    #[test]
    fn changes_keep_old_and_new_sides() {
        let body: ShortcutWebhookBody = serde_json::from_value(json!({
            "action": "update",
            "model": "story",
            "primary_id": 7,
            "changes": {
                "estimate": { "old": 2, "new": 5 },
                "name": { "new": "Renamed" }
            }
        }))
        .expect("decode");
        let changes = body.changes.expect("changes");
        assert_eq!(changes["estimate"].old, Some(json!(2)));
        assert_eq!(changes["estimate"].new_value, Some(json!(5)));
        assert_eq!(changes["name"].old, None);
    }

    #[test]
    fn unknown_action_model_pairs_fall_through() {
        assert!(matches!(
            ShortcutEvent::classify("delete", "story"),
            ShortcutEvent::Unsupported { .. }
        ));
        assert_eq!(
            ShortcutEvent::classify("create", "story"),
            ShortcutEvent::StoryCreated
        );
    }
}
