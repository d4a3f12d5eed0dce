//! Error taxonomy for webhook event processing.

use thiserror::Error;

/// Result type for handler-level operations.
pub type SyncResult<T> = Result<T, SyncError>;

/// Errors that abort an inbound webhook event.
///
/// Skip conditions are not errors; they terminate an event as
/// [`crate::SyncOutcome::Skipped`] with a 200 response.
#[derive(Debug, Error)]
pub enum SyncError {
    /// Signature or origin-IP verification failed before any mutation.
    #[error("{0}")]
    Authentication(String),
    /// A sync configuration or referenced platform object is missing.
    #[error("{0}")]
    NotFound(String),
    /// A downstream platform call on the primary path failed.
    #[error("{message}")]
    Api { message: String, status: u16 },
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl SyncError {
    /// HTTP status code the dispatcher responds with.
    pub fn status(&self) -> u16 {
        match self {
            Self::Authentication(_) => 403,
            Self::NotFound(_) => 404,
            Self::Api { status, .. } => *status,
            Self::Other(_) => 500,
        }
    }

    pub fn api(message: impl Into<String>, status: u16) -> Self {
        Self::Api {
            message: message.into(),
            status,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_codes_follow_taxonomy() {
        assert_eq!(SyncError::Authentication("bad sig".into()).status(), 403);
        assert_eq!(SyncError::NotFound("no sync".into()).status(), 404);
        assert_eq!(SyncError::api("upstream", 500).status(), 500);
        assert_eq!(SyncError::api("forbidden", 403).status(), 403);
        assert_eq!(
            SyncError::from(anyhow::anyhow!("unexpected")).status(),
            500
        );
    }

    #[test]
    fn messages_render_without_decoration() {
        let error = SyncError::api("Failed to create story for #42 (repo: 7).", 500);
        assert_eq!(
            error.to_string(),
            "Failed to create story for #42 (repo: 7)."
        );
    }
}
