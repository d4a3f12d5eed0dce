//! Shared primitives for the Tether sync engine.
//!
//! Defines the error taxonomy surfaced over HTTP, the terminal outcome of a
//! webhook event, credential decryption with environment overrides, and the
//! echo-detection markers both handlers rely on.

pub mod credentials;
pub mod errors;
pub mod labels;
pub mod markers;
pub mod outcome;
pub mod platform;

pub use credentials::{decrypt_api_key, encrypt_api_key, CredentialOverrides};
pub use errors::{SyncError, SyncResult};
pub use labels::{
    estimate_label_name, is_priority_label, priority_label_for, priority_value_for, PriorityLabel,
    ESTIMATE_LABEL_COLOR, PRIORITY_LABELS,
};
pub use markers::{
    extract_comment_marker, github_comment_footer, looks_like_own_write, strip_back_reference,
    strip_story_key_prefix, sync_footer, title_carries_story_key, COMMENT_MARKER_PREFIX,
    COMMENT_MARKER_SUFFIX,
};
pub use outcome::{skip_reason, SyncOutcome};
pub use platform::Platform;
