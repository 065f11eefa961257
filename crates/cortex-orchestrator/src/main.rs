use std::net::SocketAddr;
use std::sync::Arc;

use tokio::sync::watch;
use tracing::{info, warn};

mod app;
mod engine;
mod error_response;
mod http;
mod metrics;
mod persona;
mod rate_limit;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "cortex_orchestrator=info,tower_http=debug".into()),
        )
        .init();

    // Explicit path > CORTEX_CONFIG env > ~/.cortex/cortex.toml.
    let config_path = std::env::var("CORTEX_CONFIG").ok();
    let config = cortex_core::config::CortexConfig::load(config_path.as_deref()).unwrap_or_else(|e| {
        warn!("config load failed ({e}), using defaults");
        cortex_core::config::CortexConfig::default()
    });

    let bind = config.gateway.bind.clone();
    let port = config.gateway.port;
    let async_memory = config.features.async_memory;
    let archive_enabled = config.features.archive_enabled;

    let state = Arc::new(app::AppState::new(config)?);
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    // C3's workers run as independent background tasks with their own life
    // cycle, tied to process startup/shutdown per spec §5.
    if async_memory {
        let scoring = cortex_surprise::ScoringWorker::new(
            state.capture.clone(),
            state.memory.clone(),
            state.gateway.clone(),
            state.config.surprise.clone(),
        );
        let rx = shutdown_rx.clone();
        tokio::spawn(async move { scoring.run(rx).await });
    } else {
        info!("async memory pipeline disabled via feature flag, skipping scoring worker");
    }

    if archive_enabled {
        let archival = cortex_surprise::ArchivalWorker::new(state.memory.clone(), state.config.archival.clone());
        let rx = shutdown_rx.clone();
        tokio::spawn(async move { archival.run(rx).await });
    } else {
        info!("archival disabled via feature flag, skipping archival worker");
    }

    let router = app::build_router(state.clone());
    let addr: SocketAddr = format!("{bind}:{port}").parse()?;
    info!("cortex orchestrator listening on {addr}");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(
        listener,
        router.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal(shutdown_tx))
    .await?;

    if let Err(e) = state.memory.save_indices() {
        warn!(error = %e, "failed to persist ANN indices on shutdown");
    }

    Ok(())
}

/// Waits for Ctrl+C, then broadcasts shutdown to every background worker so
/// they can drain up to their grace period before the process exits.
async fn shutdown_signal(tx: watch::Sender<bool>) {
    let _ = tokio::signal::ctrl_c().await;
    info!("shutdown signal received");
    let _ = tx.send(true);
}
