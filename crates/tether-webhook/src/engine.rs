//! Engine state shared by both handlers.

use anyhow::Context as _;
use tether_core::{CredentialOverrides, SyncError, SyncOutcome, SyncResult};
use tether_github::GithubClient;
use tether_shortcut::ShortcutClient;
use tether_store::{SyncConfig, SyncStore};

use crate::{github_handler, shortcut_handler};

/// Shortcut's webhook egress addresses; deliveries from anywhere else are
/// rejected before any processing.
pub const SHORTCUT_IP_ORIGINS: [&str; 6] = [
    "35.231.147.226",
    "35.231.147.227",
    "35.231.147.228",
    "35.231.147.229",
    "35.231.147.230",
    "35.231.147.231",
];

const GITHUB_API_BASE: &str = "https://api.github.com";
const SHORTCUT_API_BASE: &str = "https://api.app.shortcut.com/api/v3";

/// Engine configuration captured once at startup.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub github_api_base: String,
    pub shortcut_api_base: String,
    pub credentials: CredentialOverrides,
    pub shortcut_allowed_ips: Vec<String>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            github_api_base: GITHUB_API_BASE.to_string(),
            shortcut_api_base: SHORTCUT_API_BASE.to_string(),
            credentials: CredentialOverrides::default(),
            shortcut_allowed_ips: SHORTCUT_IP_ORIGINS
                .iter()
                .map(ToString::to_string)
                .collect(),
        }
    }
}

/// One engine instance serves all inbound webhooks. Requests share nothing
/// in-process; the store's unique keys are the only coordination point.
pub struct SyncEngine {
    pub(crate) store: SyncStore,
    pub(crate) config: EngineConfig,
}

impl SyncEngine {
    pub fn new(store: SyncStore, config: EngineConfig) -> Self {
        Self { store, config }
    }

    pub fn store(&self) -> &SyncStore {
        &self.store
    }

    /// Process one GitHub webhook delivery.
    pub async fn handle_github_event(
        &self,
        raw_body: &[u8],
        signature: &str,
        event_name: &str,
    ) -> SyncResult<SyncOutcome> {
        github_handler::handle(self, raw_body, signature, event_name).await
    }

    /// Process one Shortcut webhook delivery.
    pub async fn handle_shortcut_event(
        &self,
        raw_body: &[u8],
        origin_ip: Option<&str>,
    ) -> SyncResult<SyncOutcome> {
        shortcut_handler::handle(self, raw_body, origin_ip).await
    }

    /// Resolve per-event credentials and build both platform clients.
    /// Anonymous mode swaps the per-user Shortcut key for the admin key.
    pub(crate) fn build_clients(
        &self,
        config: &SyncConfig,
        anonymous: bool,
    ) -> SyncResult<(GithubClient, ShortcutClient)> {
        let overrides = &self.config.credentials;

        let shortcut_token = if anonymous {
            overrides
                .shortcut_admin_key
                .clone()
                .ok_or_else(|| {
                    SyncError::NotFound(format!(
                        "Sync not found (repo: {}).",
                        config.github_repo_id
                    ))
                })?
        } else {
            overrides
                .resolve(
                    overrides.shortcut_api_key.as_deref(),
                    &config.shortcut_api_key,
                    &config.shortcut_api_key_nonce,
                )
                .context("could not resolve shortcut api key")?
        };

        let github_token = overrides
            .resolve(
                overrides.github_api_key.as_deref(),
                &config.github_api_key,
                &config.github_api_key_nonce,
            )
            .context("could not resolve github api key")?;

        let user_agent = format!("{}, tether-sync", config.repo_name);
        let github = GithubClient::new(
            &self.config.github_api_base,
            &github_token,
            &user_agent,
            &config.repo_name,
        )
        .map_err(SyncError::from)?;
        let shortcut = ShortcutClient::new(&self.config.shortcut_api_base, &shortcut_token)
            .map_err(SyncError::from)?;
        Ok((github, shortcut))
    }
}
