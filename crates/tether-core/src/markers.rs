//! Echo-detection markers and title/body fingerprints.
//!
//! Every outbound write the engine makes is stamped with one of these
//! markers so an inbound event caused by that write can be recognized and
//! skipped instead of bouncing back.

use regex::Regex;

pub const COMMENT_MARKER_PREFIX: &str = "<!-- tether-comment:";
pub const COMMENT_MARKER_SUFFIX: &str = " -->";

const STORY_KEY_PATTERN: &str = r"^\[\w{1,5}-\d{1,6}\]\s";

/// Footer appended to every description or milestone the engine creates.
pub fn sync_footer() -> &'static str {
    "Synced by Tether"
}

/// Whether `text` carries one of the engine's own write markers.
pub fn looks_like_own_write(text: &str) -> bool {
    text.contains(sync_footer()) || text.contains(COMMENT_MARKER_PREFIX)
}

/// Whether an issue title already starts with a `[KEY-n] ` story key.
pub fn title_carries_story_key(title: &str) -> bool {
    Regex::new(STORY_KEY_PATTERN)
        .map(|pattern| pattern.is_match(title))
        .unwrap_or(false)
}

/// Drop a leading `[KEY-n] ` prefix from a title, if present.
pub fn strip_story_key_prefix(title: &str) -> String {
    match Regex::new(STORY_KEY_PATTERN) {
        Ok(pattern) => pattern.replace(title, "").into_owned(),
        Err(_) => title.to_string(),
    }
}

/// Drop the trailing `<sub>...</sub>` back-reference block the engine
/// appends to mirrored issue bodies.
pub fn strip_back_reference(body: &str) -> String {
    match body.rfind("<sub>") {
        Some(index) => body[..index].trim_end().to_string(),
        None => body.to_string(),
    }
}

/// Footer for comments mirrored onto GitHub: visible attribution plus a
/// hidden marker carrying the origin comment id, so a later edit of the
/// origin comment can locate this one.
pub fn github_comment_footer(author_name: &str, comment_id: &str) -> String {
    format!(
        "\n\n<sub>{author_name} on Shortcut</sub>\n{COMMENT_MARKER_PREFIX}{comment_id}{COMMENT_MARKER_SUFFIX}"
    )
}

/// Extract the origin comment id from a mirrored comment's marker.
pub fn extract_comment_marker(body: &str) -> Option<String> {
    let start = body.find(COMMENT_MARKER_PREFIX)? + COMMENT_MARKER_PREFIX.len();
    let rest = &body[start..];
    let end = rest.find(COMMENT_MARKER_SUFFIX)?;
    let id = rest[..end].trim();
    if id.is_empty() {
        None
    } else {
        Some(id.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn title_key_detection() {
        assert!(title_carries_story_key("[TEAM-7] Fix crash"));
        assert!(title_carries_story_key("[AB-123456] x"));
        assert!(!title_carries_story_key("Fix crash"));
        assert!(!title_carries_story_key("[TOOLONGKEY-1] x"));
        assert!(!title_carries_story_key("[TEAM-7]no space"));
    }

    #[test]
    fn strip_story_key_prefix_leaves_plain_titles_alone() {
        assert_eq!(strip_story_key_prefix("[TEAM-7] Fix crash"), "Fix crash");
        assert_eq!(strip_story_key_prefix("Fix crash"), "Fix crash");
    }

    #[test]
    fn back_reference_is_removed_from_body_tail() {
        let body = "Real description\n\n<sub>Synced by Tether | [TEAM-7](https://x)</sub>";
        assert_eq!(strip_back_reference(body), "Real description");
        assert_eq!(strip_back_reference("no footer here"), "no footer here");
    }

    #[test]
    fn comment_footer_round_trips_the_id() {
        let footer = github_comment_footer("Jo Doe", "6021");
        let body = format!("hello{footer}");
        assert_eq!(extract_comment_marker(&body).as_deref(), Some("6021"));
        assert!(looks_like_own_write(&body));
    }

    #[test]
    fn plain_comments_carry_no_marker() {
        assert_eq!(extract_comment_marker("just a comment"), None);
        assert!(!looks_like_own_write("just a comment"));
    }

    #[test]
    fn footer_marks_milestone_descriptions() {
        let description = format!("Q3 goals\n\n> {}", sync_footer());
        assert!(looks_like_own_write(&description));
    }
}
