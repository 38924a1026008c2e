//! shelfmark HTTP server.
//!
//! Reads the same config file as the CLI; `PORT` and `SHELFMARK_STORAGE`
//! override it. Storage credentials are checked before the socket is bound.

use anyhow::{Context, Result};
use tracing_subscriber::EnvFilter;

use shelfmark_core::{AppConfig, open_store};
use shelfmark_lookup::LookupPipeline;
use shelfmark_server::{AppState, router};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let mut config = AppConfig::load().context("failed to load config")?;
    config.apply_env_overrides()?;

    let store = open_store(&config.storage).context("storage is not configured")?;
    let pipeline = LookupPipeline::from_config(&config).context("failed to build HTTP clients")?;
    tracing::info!(
        storage = store.backend(),
        catalog = pipeline.catalog_name(),
        static_dir = %config.server.static_dir,
        "shelfmark server initialized"
    );

    let app = router(AppState::new(pipeline, store), &config.server.static_dir);

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    tracing::info!("shelfmark server listening on {addr}");

    axum::serve(listener, app).await.context("server error")?;
    Ok(())
}
