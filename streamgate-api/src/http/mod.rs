//! HTTP surface of the edge proxy

pub mod error;
pub mod health;
pub mod hls;
pub mod metadata;
pub mod token;

use std::sync::Arc;

use axum::Router;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use streamgate_core::cache::{CacheStore, TtlCache};
use streamgate_core::http_client::build_http_client;
use streamgate_core::service::{MetadataService, TokenService};
use streamgate_core::Config;
use streamgate_proxy::{ManifestRewriter, SegmentRelay, Upstream};

pub use error::{AppError, AppResult};

/// Shared per-process state handed to every handler
#[derive(Clone)]
pub struct AppState {
    pub rewriter: Arc<ManifestRewriter>,
    pub relay: Arc<SegmentRelay>,
    pub token_service: Arc<TokenService>,
    pub metadata_service: Arc<MetadataService>,
}

impl AppState {
    /// Wire every component from one configuration value.
    pub fn from_config(config: &Config, cache_store: Arc<dyn CacheStore>) -> streamgate_core::Result<Self> {
        let client = build_http_client(
            config.upstream.connect_timeout(),
            config.upstream.request_timeout(),
        )?;
        let upstream = Upstream::new(client.clone(), config.upstream.clone());

        Ok(Self {
            rewriter: Arc::new(ManifestRewriter::new(
                upstream.clone(),
                config.proxy.public_path.clone(),
            )),
            relay: Arc::new(SegmentRelay::new(upstream)),
            token_service: Arc::new(TokenService::new(&config.token)),
            metadata_service: Arc::new(MetadataService::new(
                client,
                TtlCache::new(cache_store),
                config.metadata.clone(),
            )),
        })
    }
}

/// Create the HTTP router with all routes
pub fn create_router(state: AppState, public_path: &str) -> Router {
    Router::new()
        .merge(health::create_health_router())
        .merge(hls::create_hls_router(public_path))
        .merge(token::create_token_router())
        .merge(metadata::create_metadata_router())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
