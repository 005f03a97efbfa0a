//! Playlist rewrite and segment relay endpoint
//!
//! One route serves both roles, selected by `k`:
//! - `?k=playlist&itemId=..` returns the rewritten manifest
//! - `?k=segment&itemId=..&path=..` streams the segment
//!
//! Rewritten playlists point their segments back at this same route.

use axum::{
    body::Body,
    extract::{Query, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Router,
};
use serde::Deserialize;

use crate::http::{AppError, AppResult, AppState};
use streamgate_core::Error;
use streamgate_proxy::{RangeRequest, HLS_CONTENT_TYPE};

#[derive(Debug, Default, Deserialize)]
pub struct HlsQuery {
    pub k: Option<String>,
    #[serde(rename = "itemId")]
    pub item_id: Option<String>,
    pub path: Option<String>,
}

/// Requested role, `playlist` when `k` is absent
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Kind {
    Playlist,
    Segment,
}

impl HlsQuery {
    fn kind(&self) -> Result<Kind, Error> {
        match self.k.as_deref().map(str::trim) {
            None | Some("" | "playlist") => Ok(Kind::Playlist),
            Some("segment") => Ok(Kind::Segment),
            Some(other) => Err(Error::InvalidParameter(format!("unknown k: {other}"))),
        }
    }
}

pub fn create_hls_router(public_path: &str) -> Router<AppState> {
    Router::new().route(public_path, get(hls))
}

/// GET `{public_path}` - Rewrite a playlist or relay a segment
async fn hls(
    State(state): State<AppState>,
    Query(query): Query<HlsQuery>,
    headers: HeaderMap,
) -> AppResult<Response> {
    let item_id = streamgate_core::error::require("itemId", query.item_id.as_deref())?;

    match query.kind()? {
        Kind::Playlist => playlist(&state, item_id).await,
        Kind::Segment => {
            segment(&state, item_id, query.path.as_deref(), &range_request(&headers)).await
        }
    }
}

fn range_request(headers: &HeaderMap) -> RangeRequest {
    let value = |name| headers.get(name).and_then(|v| v.to_str().ok());
    RangeRequest::new(value(header::RANGE), value(header::IF_RANGE))
}

async fn playlist(state: &AppState, item_id: &str) -> AppResult<Response> {
    let manifest = state.rewriter.rewrite_playlist(item_id).await?;

    Ok((
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, HLS_CONTENT_TYPE),
            (header::CACHE_CONTROL, "no-cache"),
        ],
        manifest,
    )
        .into_response())
}

async fn segment(
    state: &AppState,
    item_id: &str,
    path: Option<&str>,
    range: &RangeRequest,
) -> AppResult<Response> {
    let path = streamgate_core::error::require("path", path)?;
    let segment = state.relay.relay_segment(item_id, path, range).await?;

    let status = if segment.partial {
        StatusCode::PARTIAL_CONTENT
    } else {
        StatusCode::OK
    };
    let mut builder = Response::builder()
        .status(status)
        .header(header::CONTENT_TYPE, segment.content_type);
    if let Some(length) = segment.content_length {
        builder = builder.header(header::CONTENT_LENGTH, length);
    }
    if let Some(content_range) = segment.content_range {
        builder = builder.header(header::CONTENT_RANGE, content_range);
    }
    if let Some(accept_ranges) = segment.accept_ranges {
        builder = builder.header(header::ACCEPT_RANGES, accept_ranges);
    }

    builder
        .body(Body::from_stream(segment.body))
        .map_err(|e| AppError::internal_server_error(format!("Failed to build response: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn query(k: Option<&str>) -> HlsQuery {
        HlsQuery {
            k: k.map(str::to_string),
            ..HlsQuery::default()
        }
    }

    #[test]
    fn test_range_request_from_headers() {
        let mut headers = HeaderMap::new();
        assert_eq!(range_request(&headers), RangeRequest::default());

        headers.insert(header::RANGE, "bytes=0-3".parse().unwrap());
        headers.insert(header::IF_RANGE, "\"v1\"".parse().unwrap());
        let range = range_request(&headers);
        assert_eq!(range.range.as_deref(), Some("bytes=0-3"));
        assert_eq!(range.if_range.as_deref(), Some("\"v1\""));
    }

    #[test]
    fn test_kind_defaults_to_playlist() {
        assert_eq!(query(None).kind().unwrap(), Kind::Playlist);
        assert_eq!(query(Some("")).kind().unwrap(), Kind::Playlist);
        assert_eq!(query(Some("playlist")).kind().unwrap(), Kind::Playlist);
        assert_eq!(query(Some("segment")).kind().unwrap(), Kind::Segment);
        assert!(matches!(query(Some("key")).kind(), Err(Error::InvalidParameter(_))));
    }
}
