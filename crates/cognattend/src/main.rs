use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::sync::RwLock;
use tracing_subscriber::EnvFilter;

use cognatten_store::{DbBackend, PhotoStore, Store};

mod config;
mod engine;
mod error;
mod handlers;
mod server;

use config::Config;
use server::AppState;

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    tracing::info!("cognattend starting");
    let config = Config::from_env();

    DbBackend::from_env()
        .and_then(|backend| backend.ensure_available().map(|()| backend))
        .context("database backend selection")?;

    if let Some(parent) = config.db_path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("creating data directory {}", parent.display()))?;
    }
    let store = Store::open(&config.db_path)
        .await
        .with_context(|| format!("opening database {}", config.db_path.display()))?;
    let photos = PhotoStore::open(&config.photo_dir)
        .with_context(|| format!("opening photo directory {}", config.photo_dir.display()))?;

    let engine = engine::spawn_engine(
        &config.camera_device,
        &config.detector_model_path(),
        &config.encoder_model_path(),
        config.warmup_frames,
    )
    .context("starting recognition engine")?;

    let state = AppState {
        store,
        photos,
        engine,
        gallery: Arc::new(RwLock::new(Vec::new())),
        match_tolerance: config.match_tolerance,
        frames_per_scan: config.frames_per_scan,
    };
    state
        .rebuild_gallery()
        .await
        .context("initial gallery load")?;

    let listener = tokio::net::TcpListener::bind(&config.bind_addr)
        .await
        .with_context(|| format!("binding {}", config.bind_addr))?;
    tracing::info!(addr = %config.bind_addr, "cognattend ready");

    axum::serve(listener, server::router(state))
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            tracing::info!("cognattend shutting down");
        })
        .await?;

    Ok(())
}
