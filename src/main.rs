//! Audio Cache - diagnostic server for the local audio artifact cache
//!
//! Wires the fetch coordinator from environment configuration and exposes
//! it over a small HTTP API.

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use tokio::signal;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use audio_cache::api::{create_router, AppState};
use audio_cache::{CacheMode, Config, FetchCoordinator};

/// Main entry point for the audio cache server.
///
/// # Startup Sequence
/// 1. Initialize tracing subscriber for logging
/// 2. Load configuration from environment variables
/// 3. Build the fetch coordinator and prepare its storage
/// 4. Start periodic maintenance when configured
/// 5. Create Axum router with all endpoints
/// 6. Start HTTP server on configured port
/// 7. Dispose the coordinator on SIGINT/SIGTERM
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Defaults to "info" level, can be overridden with RUST_LOG env var
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "audio_cache=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting audio cache server");

    let config = Config::from_env();
    info!(
        "Configuration loaded: backend={:?}, cache_dir={}, max_size_bytes={}, max_age={}s, port={}",
        config.backend,
        config.cache_dir.display(),
        config.max_size_bytes,
        config.max_age_secs,
        config.server_port
    );

    let coordinator = Arc::new(
        FetchCoordinator::from_config(&config).context("failed to build fetch coordinator")?,
    );
    match coordinator.initialize().await {
        CacheMode::Cached => info!("Cache storage ready"),
        CacheMode::Degraded => warn!("Cache storage unavailable, running in pass-through mode"),
    }

    if let Some(interval) = config.maintenance_interval() {
        coordinator.start_maintenance(interval);
        info!("Periodic maintenance started every {}s", interval.as_secs());
    }

    let app = create_router(AppState::new(coordinator.clone()));

    let addr = SocketAddr::from(([0, 0, 0, 0], config.server_port));
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {}", addr))?;
    info!("Server listening on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(coordinator))
        .await
        .context("server error")?;

    info!("Server shutdown complete");
    Ok(())
}

/// Waits for shutdown signal (Ctrl+C or SIGTERM), then disposes the
/// coordinator so maintenance stops before the runtime goes away.
async fn shutdown_signal(coordinator: Arc<FetchCoordinator>) {
    let ctrl_c = async {
        if let Err(err) = signal::ctrl_c().await {
            warn!(error = %err, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(err) => {
                warn!(error = %err, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, initiating shutdown...");
        }
        _ = terminate => {
            info!("Received SIGTERM, initiating shutdown...");
        }
    }

    coordinator.dispose();
}
