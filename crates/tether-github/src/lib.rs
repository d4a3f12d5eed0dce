//! GitHub REST client used by the sync engine.
//!
//! One client instance is scoped to a single repository and a single
//! resolved credential, both decided at the top of the event that creates
//! it. No retries: webhook redelivery is the retry mechanism, so every call
//! is single-shot and idempotent at the caller.

mod client;
mod types;

#[cfg(test)]
mod tests;

pub use client::{Created, GithubClient, IssuePatch};
pub use types::{
    GithubComment, GithubIssue, GithubLabel, GithubMilestone, GithubUser, NewIssue,
};

use thiserror::Error;

/// Errors raised by [`GithubClient`] calls.
#[derive(Debug, Error)]
pub enum GithubApiError {
    #[error("github {operation} failed with status {status}: {body}")]
    Status {
        operation: &'static str,
        status: u16,
        body: String,
    },
    #[error("github {operation} request failed: {source}")]
    Transport {
        operation: &'static str,
        #[source]
        source: reqwest::Error,
    },
    #[error("failed to decode github {operation} response: {source}")]
    Decode {
        operation: &'static str,
        #[source]
        source: reqwest::Error,
    },
    #[error("invalid github client configuration: {0}")]
    Config(String),
}

impl From<GithubApiError> for tether_core::SyncError {
    fn from(error: GithubApiError) -> Self {
        tether_core::SyncError::Api {
            message: error.to_string(),
            status: 500,
        }
    }
}
