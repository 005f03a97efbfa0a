use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use sqlx::postgres::PgPoolOptions;
use tracing::{error, info, warn};

use streamgate_api::{create_router, AppState};
use streamgate_core::cache::{CacheStore, MemoryCacheStore};
use streamgate_core::config::{CacheBackend, CacheConfig};
use streamgate_core::repository::PgCacheStore;
use streamgate_core::{logging, Config};

#[tokio::main]
async fn main() -> Result<()> {
    let config = Config::discover().map_err(|e| anyhow::anyhow!("Failed to load config: {e}"))?;

    logging::init_logging(&config.logging)?;

    if let Err(errors) = config.validate() {
        for e in &errors {
            error!("Config validation error: {e}");
        }
        return Err(anyhow::anyhow!(
            "Configuration validation failed with {} error(s)",
            errors.len()
        ));
    }

    info!("Streamgate starting...");
    info!("Upstream: {}", config.upstream.base_url);
    if config.upstream.api_key.is_empty() {
        warn!("No upstream API key configured, requests go upstream unauthenticated");
    }

    let cache_store = init_cache_store(&config.cache).await?;
    let state = AppState::from_config(&config, cache_store)?;
    let app = create_router(state, &config.proxy.public_path);

    let address = config.http_address();
    let listener = tokio::net::TcpListener::bind(&address)
        .await
        .map_err(|e| anyhow::anyhow!("Failed to bind {address}: {e}"))?;
    info!("HTTP server listening on {}", address);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("HTTP server shut down gracefully");
    Ok(())
}

async fn init_cache_store(config: &CacheConfig) -> Result<Arc<dyn CacheStore>> {
    match config.backend {
        CacheBackend::Memory => {
            warn!("Using in-memory metadata cache, suitable for single-replica deployments only");
            Ok(Arc::new(MemoryCacheStore::new()))
        }
        CacheBackend::Postgres => {
            info!("Connecting to cache database");
            let pool = PgPoolOptions::new()
                .max_connections(config.max_connections)
                .acquire_timeout(Duration::from_secs(10))
                .connect(&config.database_url)
                .await
                .map_err(|e| anyhow::anyhow!("Database connection failed: {e}"))?;

            sqlx::migrate!("../migrations")
                .run(&pool)
                .await
                .map_err(|e| anyhow::anyhow!("Migration failed: {e}"))?;
            info!("Cache database ready");

            Ok(Arc::new(PgCacheStore::new(pool)))
        }
    }
}

/// Wait for a shutdown signal (SIGTERM or SIGINT/Ctrl+C)
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {}", e);
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => { info!("Received Ctrl+C"); }
        () = terminate => { info!("Received SIGTERM"); }
    }
}
