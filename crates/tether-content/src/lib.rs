//! Cross-posted content normalization and user identity resolution.

mod identity;
mod transform;

pub use identity::{map_usernames, replace_mentions, upsert_user};
pub use transform::{prepare_markdown_content, TransformOptions};
