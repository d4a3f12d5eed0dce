//! Cross-platform user identity resolution.
//!
//! The user-link table is populated lazily: the first event that carries an
//! actionable member id fetches both profiles and persists the pair. Cached
//! handles are never invalidated; staleness is accepted.

use regex::Regex;
use tether_core::Platform;
use tether_github::GithubClient;
use tether_shortcut::ShortcutClient;
use tether_store::{SyncStore, UserLink};

const MENTION_PATTERN: &str = r"@([A-Za-z0-9][A-Za-z0-9-]*)";

/// Map each mention handle to its counterpart on the destination platform.
/// Unresolved mentions pass through unchanged, never dropped.
pub fn map_usernames(store: &SyncStore, mentions: &[String], origin: Platform) -> Vec<String> {
    mentions
        .iter()
        .map(|mention| {
            match store.find_user_link_by_handle(mention) {
                Ok(Some(link)) => match origin.destination() {
                    Platform::Github => link.github_username,
                    Platform::Shortcut => link.shortcut_username,
                },
                Ok(None) => mention.clone(),
                Err(error) => {
                    tracing::warn!(%error, %mention, "user link lookup failed");
                    mention.clone()
                }
            }
        })
        .collect()
}

/// Rewrite `@handle` mentions in `body` for the destination platform.
pub fn replace_mentions(store: &SyncStore, body: &str, origin: Platform) -> String {
    let pattern = match Regex::new(MENTION_PATTERN) {
        Ok(pattern) => pattern,
        Err(error) => {
            tracing::warn!(%error, "mention pattern failed, passing body through");
            return body.to_string();
        }
    };
    pattern
        .replace_all(body, |captures: &regex::Captures<'_>| {
            let handle = &captures[1];
            let mapped = map_usernames(store, &[handle.to_string()], origin);
            format!("@{}", mapped[0])
        })
        .into_owned()
}

/// Ensure a user link exists for the given id pair, fetching both profiles
/// on first encounter. The sole write path for user links.
pub async fn upsert_user(
    store: &SyncStore,
    github: &GithubClient,
    shortcut: &ShortcutClient,
    github_user_id: i64,
    shortcut_user_id: &str,
) -> anyhow::Result<()> {
    if store.find_user_link(github_user_id, shortcut_user_id)?.is_some() {
        return Ok(());
    }

    let github_user = github.authenticated_user().await?;
    let shortcut_member = shortcut.current_member().await?;
    store.upsert_user_link(&UserLink {
        github_user_id,
        shortcut_user_id: shortcut_user_id.to_string(),
        github_username: github_user.login,
        shortcut_username: shortcut_member.mention_name,
    })?;
    tracing::debug!(github_user_id, shortcut_user_id, "linked user pair");
    Ok(())
}
