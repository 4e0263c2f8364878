use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};

use notion_showcase::api::{self, AppState};
use notion_showcase::config;
use notion_showcase::notion::NotionSource;

#[derive(Debug, Parser)]
#[command(author, version, about)]
struct Args {
    /// Path to YAML config file
    #[arg(long, default_value = "config.yaml")]
    config: PathBuf,

    /// Override `server.bind`
    #[arg(long)]
    bind: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_target(false)
        .compact()
        .init();

    let args = Args::parse();
    let cfg = config::load(Some(&args.config))
        .with_context(|| format!("failed to load {}", args.config.display()))?;

    if cfg.notion.token.is_none() || cfg.notion.database_id.is_none() {
        warn!("notion credentials are not configured; content requests will fail");
    }

    let source = NotionSource::from_config(&cfg).context("failed to build HTTP client")?;
    let state = AppState::new(Arc::new(source), &cfg);
    let bind = args.bind.unwrap_or_else(|| cfg.server.bind.clone());

    info!(
        attempts = cfg.fetch.attempts,
        backoff_ms = cfg.fetch.backoff_ms,
        timeout_ms = cfg.fetch.timeout_ms,
        cache_ttl_seconds = cfg.server.cache_ttl_seconds,
        "starting notion showcase"
    );
    api::serve(state, &bind).await
}
