//! The webhook reconciliation engine.
//!
//! Two symmetric handlers, one per originating platform, consume
//! at-least-once, unordered webhook deliveries, decide applicability,
//! resolve cross-platform identity, and apply the minimal idempotent
//! mutations to the other platform. The axum dispatcher routes an inbound
//! request to the right handler by its `User-Agent` and converts the
//! outcome into the `{success, message}` response envelope.

mod engine;
mod github_events;
mod github_handler;
mod mapper;
mod server;
mod shortcut_events;
mod shortcut_handler;
mod signature;

#[cfg(test)]
mod tests;

pub use engine::{EngineConfig, SyncEngine};
pub use github_events::{GithubEvent, GithubRepository, GithubWebhookBody};
pub use server::{router, WebhookResponse};
pub use shortcut_events::{FieldChange, ShortcutEvent, ShortcutReference, ShortcutWebhookBody};
pub use signature::{sign_payload, verify_signature};
