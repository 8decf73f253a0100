//! # Tillpoint Gateway
//!
//! HTTP server that offline POS tills replay their queued sales against.
//!
//! ## Architecture
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Gateway Server                                  │
//! │                                                                         │
//! │  POS till ───► HTTP (8080) ───► Services ───► SQLite                   │
//! │                                     │                                   │
//! │                                     ▼                                   │
//! │                                   Redis                                 │
//! │                              (stock cache)                              │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use std::net::SocketAddr;
use std::sync::Arc;

use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use tillpoint_db::{Database, DbConfig};
use tillpoint_gateway::{build_router, AppState, AvailabilityCache, GatewayConfig};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,sqlx=warn")),
        )
        .with_target(true)
        .with_thread_ids(true)
        .init();

    info!("Starting Tillpoint gateway...");

    // Load configuration
    let config = GatewayConfig::load()?;
    info!(
        port = config.http_port,
        database = %config.database_path,
        redis = config.redis_url.is_some(),
        "Configuration loaded"
    );

    // Open database (runs migrations)
    let db = Database::new(DbConfig::new(&config.database_path)).await?;
    info!("Database ready");

    // Connect to Redis (optional, falls back to the in-process cache)
    let cache = match &config.redis_url {
        Some(redis_url) => match redis::Client::open(redis_url.as_str()) {
            Ok(client) => match AvailabilityCache::redis(client).await {
                Ok(cache) => {
                    info!("Connected to Redis");
                    cache
                }
                Err(e) => {
                    warn!(error = %e, "Failed to connect to Redis, using in-process cache");
                    AvailabilityCache::memory()
                }
            },
            Err(e) => {
                warn!(error = %e, "Invalid REDIS_URL, using in-process cache");
                AvailabilityCache::memory()
            }
        },
        None => AvailabilityCache::memory(),
    };

    // Create shared state
    let addr: SocketAddr = format!("0.0.0.0:{}", config.http_port).parse()?;
    let state = Arc::new(AppState::new(db.clone(), cache, config));
    let app = build_router(state);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(%addr, "Gateway listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    db.close().await;
    info!("Server shutdown complete");
    Ok(())
}

/// Graceful shutdown signal handler.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received, starting graceful shutdown...");
}
