//! Body normalization applied before cross-posting.
//!
//! Total by contract: whatever the input looks like, the transformer
//! returns usable text. An internal pattern failure logs and falls back to
//! the unmodified input.

use regex::Regex;
use tether_core::Platform;
use tether_store::SyncStore;

use crate::identity::replace_mentions;

const IMG_TAG_PATTERN: &str = r#"<img[^>]*src=['" ]?https?://([^'">\s]+)['" ]?[^>]*/?>"#;
const INLINE_COMMENT_PATTERN: &str = r"(?s)<!--.*?-->";

/// Beyond this many tilde runs the strikethrough pass leaves the text
/// alone; pathological inputs are passed through rather than rewritten.
const MAX_TILDE_RUNS: usize = 10;

#[derive(Debug, Clone, Copy, Default)]
pub struct TransformOptions {
    /// Strip origin-side inline comment syntax (`<!-- ... -->`). Set for
    /// Shortcut-bound content whose sender is not a cross-linked user.
    pub strip_inline_comments: bool,
}

/// Normalize a body for cross-posting from `origin` to the other platform.
pub fn prepare_markdown_content(
    store: &SyncStore,
    body: &str,
    origin: Platform,
    options: TransformOptions,
) -> String {
    let mut text = replace_img_tags(body);
    text = replace_strikethrough_tags(&text);
    text = replace_mentions(store, &text, origin);
    if options.strip_inline_comments {
        text = strip_inline_comments(&text);
    }
    text
}

/// Rewrite bare `<img src=...>` tags into markdown image syntax.
pub fn replace_img_tags(text: &str) -> String {
    match Regex::new(IMG_TAG_PATTERN) {
        Ok(pattern) => pattern.replace_all(text, "![image](https://$1)").into_owned(),
        Err(error) => {
            tracing::warn!(%error, "image tag pattern failed, passing body through");
            text.to_string()
        }
    }
}

/// Normalize single-tilde strikethrough to the double-tilde form both
/// platforms render. Escaped tildes and existing `~~` pairs are untouched.
pub fn replace_strikethrough_tags(text: &str) -> String {
    let runs = text
        .split(|ch| ch != '~')
        .filter(|run| !run.is_empty())
        .count();
    if runs > MAX_TILDE_RUNS {
        return text.to_string();
    }

    let chars: Vec<char> = text.chars().collect();
    let mut out = String::with_capacity(text.len());
    for (index, &ch) in chars.iter().enumerate() {
        if ch != '~' {
            out.push(ch);
            continue;
        }
        let escaped = index > 0 && chars[index - 1] == '\\';
        let in_run = (index > 0 && chars[index - 1] == '~')
            || chars.get(index + 1).copied() == Some('~');
        if escaped || in_run {
            out.push('~');
        } else {
            out.push_str("~~");
        }
    }
    out
}

/// Drop `<!-- ... -->` blocks.
pub fn strip_inline_comments(text: &str) -> String {
    match Regex::new(INLINE_COMMENT_PATTERN) {
        Ok(pattern) => pattern.replace_all(text, "").into_owned(),
        Err(error) => {
            tracing::warn!(%error, "inline comment pattern failed, passing body through");
            text.to_string()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tether_store::{SyncStore, UserLink};

    fn empty_store() -> (tempfile::TempDir, SyncStore) {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = SyncStore::open(dir.path().join("tether.db")).expect("store");
        (dir, store)
    }

    #[test]
    fn img_tags_become_markdown_images() {
        let rewritten = replace_img_tags(r#"before <img alt="x" src="https://cdn.test/shot.png"> after"#);
        assert_eq!(rewritten, "before ![image](https://cdn.test/shot.png) after");
    }

    #[test]
    fn single_tildes_are_doubled_but_pairs_and_escapes_survive() {
        assert_eq!(replace_strikethrough_tags("a ~gone~ b"), "a ~~gone~~ b");
        assert_eq!(replace_strikethrough_tags("a ~~gone~~ b"), "a ~~gone~~ b");
        assert_eq!(replace_strikethrough_tags(r"a \~literal b"), r"a \~literal b");
    }

    #[test]
    fn pathological_tilde_input_is_passed_through() {
        let hostile = "~a~b~c~d~e~f~g~h~i~j~k~";
        assert_eq!(replace_strikethrough_tags(hostile), hostile);
    }

    #[test]
    fn inline_comments_are_stripped_only_when_asked() {
        let (_dir, store) = empty_store();
        let body = "visible <!-- hidden\nstuff --> tail";
        let stripped = prepare_markdown_content(
            &store,
            body,
            Platform::Github,
            TransformOptions {
                strip_inline_comments: true,
            },
        );
        assert_eq!(stripped, "visible  tail");

        let kept = prepare_markdown_content(&store, body, Platform::Github, TransformOptions::default());
        assert_eq!(kept, body);
    }

    #[test]
    fn mentions_are_rewritten_to_the_destination_handle() {
        let (_dir, store) = empty_store();
        store
            .upsert_user_link(&UserLink {
                github_user_id: 500,
                shortcut_user_id: "member-uuid".to_string(),
                github_username: "octocat".to_string(),
                shortcut_username: "octo".to_string(),
            })
            .expect("upsert");

        let rewritten = prepare_markdown_content(
            &store,
            "ping @octocat and @stranger",
            Platform::Github,
            TransformOptions::default(),
        );
        assert_eq!(rewritten, "ping @octo and @stranger");
    }
}
