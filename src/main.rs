//! QuakeWatch Server
//!
//! Run with: cargo run --bin quakewatch
//!
//! Loads configuration (see `quakewatch-cli config`), starts the refresh
//! scheduler and serves the API until Ctrl+C or SIGTERM.
//!
//! Pass a config file path as the only argument to skip the default search.

use anyhow::Context;
use quakewatch::api::{serve, ApiConfig, AppState};
use quakewatch::config::{Config, LoggingConfig};
use quakewatch::dashboard::{RefreshScheduler, SurfaceBoard};
use quakewatch::map::MarkerLayer;
use quakewatch::preferences::FileStore;
use quakewatch::sources::{SyntheticSource, UsgsFeed};
use quakewatch::websocket::{ConnectionHub, HubConfig};
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = match std::env::args().nth(1).map(PathBuf::from) {
        Some(path) => Config::load_with_env(&path)
            .with_context(|| format!("loading config from {:?}", path))?,
        None => Config::load_default(),
    };

    init_tracing(&config.logging);

    tracing::info!("Starting QuakeWatch v{}", env!("CARGO_PKG_VERSION"));
    tracing::info!(
        feed = %config.feed.url,
        min_magnitude = config.feed.min_magnitude,
        refresh_secs = config.dashboard.refresh_secs,
        panels = config.dashboard.panels.len(),
        "Configuration loaded"
    );

    let hub = Arc::new(ConnectionHub::new(HubConfig::default()));
    let board = Arc::new(SurfaceBoard::with_hub(Arc::clone(&hub)));
    let map = Arc::new(MarkerLayer::with_hub(Arc::clone(&hub)));

    let usgs = UsgsFeed::new(config.feed.usgs())
        .context("building USGS client")?
        .with_map(Arc::clone(&map));

    let scheduler = Arc::new(
        RefreshScheduler::new(board.clone(), config.dashboard.scheduler())
            .with_panels(config.dashboard.panels.clone())
            .with_source(Arc::new(usgs))
            .with_source(Arc::new(SyntheticSource::mars()))
            .with_source(Arc::new(SyntheticSource::moon()))
            .with_hub(Arc::clone(&hub)),
    );

    let preferences_path = config.preferences.resolved_path();
    let preferences = FileStore::open(&preferences_path)
        .with_context(|| format!("opening preferences at {:?}", preferences_path))?;
    tracing::info!("Preferences file: {:?}", preferences.path());

    let scheduler_handle = Arc::clone(&scheduler).start();

    let api_config = ApiConfig::from(&config.api);
    let state = AppState::new(
        board,
        map,
        Arc::clone(&scheduler),
        Arc::new(preferences),
        hub,
        api_config.clone(),
    );

    let served = serve(state, &api_config).await;

    tracing::info!("Stopping refresh scheduler...");
    scheduler.stop().await;
    scheduler_handle.abort();

    served.context("API server failed")?;
    tracing::info!("QuakeWatch stopped");
    Ok(())
}

fn init_tracing(logging: &LoggingConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(logging.filter_directive()));

    let registry = tracing_subscriber::registry().with(filter);
    if logging.is_json() {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}
