//! Shortcut REST client used by the sync engine.
//!
//! Same shape as the GitHub client: one instance per event, scoped to one
//! resolved token, single-shot calls. Mutations are all-`Option` patch
//! structs so each event writes exactly the fields it changed.

mod client;
mod types;

#[cfg(test)]
mod tests;

pub use client::{Created, ShortcutClient};
pub use types::{
    AttachmentRequest, NewStory, ShortcutComment, ShortcutEpic, ShortcutIteration, ShortcutLabel,
    ShortcutMember, ShortcutStory, ShortcutTeam, StoryPatch,
};

use thiserror::Error;

/// Errors raised by [`ShortcutClient`] calls.
#[derive(Debug, Error)]
pub enum ShortcutApiError {
    #[error("shortcut {operation} failed with status {status}: {body}")]
    Status {
        operation: &'static str,
        status: u16,
        body: String,
    },
    #[error("shortcut {operation} request failed: {source}")]
    Transport {
        operation: &'static str,
        #[source]
        source: reqwest::Error,
    },
    #[error("failed to decode shortcut {operation} response: {source}")]
    Decode {
        operation: &'static str,
        #[source]
        source: reqwest::Error,
    },
    #[error("invalid shortcut client configuration: {0}")]
    Config(String),
}

impl ShortcutApiError {
    /// Whether the failure is the destination saying "not found".
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::Status { status: 404, .. })
    }
}

impl From<ShortcutApiError> for tether_core::SyncError {
    fn from(error: ShortcutApiError) -> Self {
        tether_core::SyncError::Api {
            message: error.to_string(),
            status: 500,
        }
    }
}
