//! Cache-fronted metadata lookup endpoint

use axum::{
    extract::{Query, State},
    routing::get,
    Json, Router,
};
use serde::Deserialize;
use serde_json::Value;

use crate::http::{AppResult, AppState};

#[derive(Debug, Deserialize)]
pub struct MetadataQuery {
    /// Provider-specific identifier, e.g. a video id
    pub key: Option<String>,
}

pub fn create_metadata_router() -> Router<AppState> {
    Router::new().route("/api/metadata", get(lookup))
}

/// GET /api/metadata?key=.. - oEmbed metadata, cached per key
async fn lookup(
    State(state): State<AppState>,
    Query(query): Query<MetadataQuery>,
) -> AppResult<Json<Value>> {
    let key = query.key.unwrap_or_default();
    let payload = state.metadata_service.lookup(&key).await?;
    Ok(Json(payload))
}
