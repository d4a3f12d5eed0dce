//! Tether webhook server binary.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::net::TcpListener;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

use tether_core::CredentialOverrides;
use tether_store::SyncStore;
use tether_webhook::{router, EngineConfig, SyncEngine};

#[derive(Debug, Parser)]
#[command(name = "tether-server", about = "GitHub ⇄ Shortcut issue-sync bridge")]
struct Args {
    /// Address the webhook listener binds to.
    #[arg(long, default_value = "0.0.0.0:3000", env = "TETHER_BIND")]
    bind: String,

    /// Path to the SQLite link store.
    #[arg(long, default_value = "tether.db", env = "TETHER_DB")]
    db: PathBuf,

    /// Override for the GitHub API base URL.
    #[arg(long, env = "TETHER_GITHUB_API_BASE")]
    github_api_base: Option<String>,

    /// Override for the Shortcut API base URL.
    #[arg(long, env = "TETHER_SHORTCUT_API_BASE")]
    shortcut_api_base: Option<String>,
}

fn init_tracing() {
    let env_filter = EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .from_env_lossy();

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .compact()
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();
    let args = Args::parse();

    let store = SyncStore::open(&args.db)
        .with_context(|| format!("failed to open link store at {}", args.db.display()))?;

    let mut config = EngineConfig {
        credentials: CredentialOverrides::from_env(),
        ..EngineConfig::default()
    };
    if let Some(base) = args.github_api_base {
        config.github_api_base = base;
    }
    if let Some(base) = args.shortcut_api_base {
        config.shortcut_api_base = base;
    }

    let engine = Arc::new(SyncEngine::new(store, config));
    let listener = TcpListener::bind(&args.bind)
        .await
        .with_context(|| format!("failed to bind {}", args.bind))?;
    tracing::info!(bind = %args.bind, "tether webhook listener started");

    axum::serve(listener, router(engine))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("webhook server exited")?;
    Ok(())
}

async fn shutdown_signal() {
    if let Err(error) = tokio::signal::ctrl_c().await {
        tracing::warn!(%error, "failed to install shutdown handler");
    }
}
