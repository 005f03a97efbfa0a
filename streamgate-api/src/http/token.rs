//! Access token issuing endpoint

use axum::{
    extract::{Query, State},
    routing::get,
    Json, Router,
};
use serde::{Deserialize, Serialize};

use crate::http::{AppResult, AppState};
use streamgate_core::Error;

#[derive(Debug, Deserialize)]
pub struct TokenQuery {
    #[serde(rename = "itemId")]
    pub item_id: Option<String>,
    /// Seconds; kept as text so a bad value maps to our own 400 body
    pub ttl: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct TokenResponse {
    pub token: String,
    pub expires_at: i64,
}

pub fn create_token_router() -> Router<AppState> {
    Router::new().route("/api/token", get(issue_token))
}

/// GET /api/token?itemId=..&ttl=.. - Mint a short-lived access token
async fn issue_token(
    State(state): State<AppState>,
    Query(query): Query<TokenQuery>,
) -> AppResult<Json<TokenResponse>> {
    let item_id = streamgate_core::error::require("itemId", query.item_id.as_deref())?;
    let ttl = parse_ttl(query.ttl.as_deref())?;

    let issued = state.token_service.issue_token(item_id, ttl)?;
    Ok(Json(TokenResponse {
        token: issued.token,
        expires_at: issued.expires_at,
    }))
}

fn parse_ttl(raw: Option<&str>) -> Result<Option<u64>, Error> {
    match raw.map(str::trim) {
        None | Some("") => Ok(None),
        Some(value) => value
            .parse::<u64>()
            .ok()
            .filter(|ttl| *ttl > 0)
            .map(Some)
            .ok_or_else(|| Error::InvalidParameter(format!("ttl must be a positive integer: {value}"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_ttl() {
        assert_eq!(parse_ttl(None).unwrap(), None);
        assert_eq!(parse_ttl(Some(" ")).unwrap(), None);
        assert_eq!(parse_ttl(Some("90")).unwrap(), Some(90));
        for bad in ["0", "-5", "1.5", "soon"] {
            assert!(matches!(parse_ttl(Some(bad)), Err(Error::InvalidParameter(_))), "{bad}");
        }
    }
}
