//! Persisted link tables backing the sync engine.
//!
//! The store owns only the cross-platform identity mappings (sync links,
//! milestone links, user links) plus the read-only per-pairing sync
//! configuration. Unique keys on the link tables are the engine's sole
//! coordination mechanism under concurrent duplicate webhook deliveries.

use thiserror::Error;

mod sqlite;

pub use sqlite::SyncStore;

/// Result type for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Errors returned by the store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// An insert hit an existing row for the same unique key. Handlers
    /// treat this as "already linked", never as data loss.
    #[error("already linked: {0}")]
    AlreadyLinked(String),
    #[error(transparent)]
    Sqlite(#[from] rusqlite::Error),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// One synchronized issue/story pair. Insert-only; unique per
/// `(github_repo_id, github_issue_number)`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncLink {
    pub github_repo_id: i64,
    pub github_issue_number: i64,
    pub github_issue_id: i64,
    pub shortcut_story_id: i64,
    pub shortcut_story_number: i64,
    pub shortcut_team_id: String,
}

/// A GitHub milestone mapped to a Shortcut epic or iteration. Insert-only;
/// unique per `(github_milestone_number, github_repo_id)`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MilestoneLink {
    pub github_milestone_number: i64,
    pub github_repo_id: i64,
    pub shortcut_resource_id: i64,
    pub shortcut_team_id: String,
}

/// A user identity mapped across both platforms, with cached display
/// handles. Handles may go stale; that is accepted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserLink {
    pub github_user_id: i64,
    pub shortcut_user_id: String,
    pub github_username: String,
    pub shortcut_username: String,
}

/// Per (repo, user) pairing established by the connection flow. Read-only
/// to the engine. API keys are stored encrypted (base64 ciphertext+nonce).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncConfig {
    pub github_repo_id: i64,
    pub github_user_id: i64,
    pub shortcut_user_id: String,
    pub shortcut_team_id: String,
    pub repo_name: String,
    pub webhook_secret: String,
    pub shortcut_api_key: String,
    pub shortcut_api_key_nonce: String,
    pub github_api_key: String,
    pub github_api_key_nonce: String,
    pub public_label_id: i64,
    pub started_state_id: i64,
    pub done_state_id: i64,
    pub archived_state_id: i64,
}
