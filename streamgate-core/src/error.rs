use thiserror::Error;

/// Errors shared by every streamgate component.
///
/// The type is `Clone` because a single upstream failure may be handed to
/// several callers waiting on the same single-flight key.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    #[error("Missing parameter: {0}")]
    MissingParameter(String),

    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    #[error("Upstream unavailable: {0}")]
    UpstreamUnavailable(String),

    #[error("Malformed token: {0}")]
    TokenMalformed(String),

    #[error("Token expired")]
    TokenExpired,

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Shorthand used by every entry point that requires a non-empty value.
    pub fn missing(name: &str) -> Self {
        Self::MissingParameter(name.to_string())
    }
}

impl From<reqwest::Error> for Error {
    fn from(err: reqwest::Error) -> Self {
        // Strip the URL, it carries the upstream credential.
        let err = err.without_url();
        if err.is_timeout() {
            Self::UpstreamUnavailable(format!("upstream timed out: {err}"))
        } else {
            Self::UpstreamUnavailable(err.to_string())
        }
    }
}

impl From<sqlx::Error> for Error {
    fn from(err: sqlx::Error) -> Self {
        Self::Storage(err.to_string())
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Self::Internal(format!("serialization failed: {err}"))
    }
}

pub type Result<T> = std::result::Result<T, Error>;

/// Require a non-empty (after trimming) parameter.
pub fn require<'a>(name: &str, value: Option<&'a str>) -> Result<&'a str> {
    match value.map(str::trim) {
        Some(v) if !v.is_empty() => Ok(v),
        _ => Err(Error::missing(name)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_require_rejects_absent_and_blank() {
        assert_eq!(require("itemId", None), Err(Error::missing("itemId")));
        assert_eq!(require("itemId", Some("")), Err(Error::missing("itemId")));
        assert_eq!(require("itemId", Some("   ")), Err(Error::missing("itemId")));
        assert_eq!(require("itemId", Some(" 42 ")), Ok("42"));
    }
}
