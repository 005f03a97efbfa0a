//! Short-lived access tokens
//!
//! A token is stateless: `base64url(claims) "." base64url(HMAC-SHA256(secret, claims_part))`.
//! Nothing is stored server-side, so tokens cannot be revoked before they
//! expire. Validity is `now < expires_at`.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use chrono::Utc;
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use tracing::{debug, warn};

use crate::config::TokenConfig;
use crate::{Error, Result};

type HmacSha256 = Hmac<Sha256>;

/// Length of the key generated when no secret is configured
const GENERATED_SECRET_LEN: usize = 48;

/// Payload carried inside a token
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessClaims {
    pub item_id: String,
    /// Unix seconds
    pub expires_at: i64,
}

/// Result of [`TokenService::issue_token`]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IssuedToken {
    pub token: String,
    pub expires_at: i64,
}

#[derive(Clone)]
pub struct TokenService {
    secret: Vec<u8>,
    default_ttl_secs: u64,
}

impl std::fmt::Debug for TokenService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenService")
            .field("default_ttl_secs", &self.default_ttl_secs)
            .finish_non_exhaustive()
    }
}

impl TokenService {
    #[must_use]
    pub fn new(config: &TokenConfig) -> Self {
        let secret = if config.secret.is_empty() {
            warn!(
                "No token secret configured, using a random per-process key. \
                 Tokens will not survive a restart or verify on other replicas."
            );
            nanoid::nanoid!(GENERATED_SECRET_LEN).into_bytes()
        } else {
            config.secret.as_bytes().to_vec()
        };

        Self {
            secret,
            default_ttl_secs: config.default_ttl_seconds,
        }
    }

    #[must_use]
    pub const fn default_ttl_secs(&self) -> u64 {
        self.default_ttl_secs
    }

    /// Mint a token for `item_id` valid for `ttl_seconds` (or the configured
    /// default) from now.
    pub fn issue_token(&self, item_id: &str, ttl_seconds: Option<u64>) -> Result<IssuedToken> {
        self.issue_token_at(item_id, ttl_seconds, Utc::now().timestamp())
    }

    fn issue_token_at(&self, item_id: &str, ttl_seconds: Option<u64>, now: i64) -> Result<IssuedToken> {
        let item_id = crate::error::require("itemId", Some(item_id))?;
        let ttl = ttl_seconds.unwrap_or(self.default_ttl_secs);
        if ttl == 0 {
            return Err(Error::InvalidParameter("ttl must be a positive integer".to_string()));
        }
        let expires_at = i64::try_from(ttl)
            .ok()
            .and_then(|ttl| now.checked_add(ttl))
            .ok_or_else(|| Error::InvalidParameter(format!("ttl out of range: {ttl}")))?;

        let claims = AccessClaims {
            item_id: item_id.to_string(),
            expires_at,
        };
        let payload = URL_SAFE_NO_PAD.encode(serde_json::to_vec(&claims)?);
        let signature = URL_SAFE_NO_PAD.encode(self.sign(payload.as_bytes())?);

        debug!(item_id, expires_at, "Access token issued");

        Ok(IssuedToken {
            token: format!("{payload}.{signature}"),
            expires_at,
        })
    }

    /// Decode and authenticate a token.
    ///
    /// Any structural, encoding or signature problem is [`Error::TokenMalformed`];
    /// an authentic token past its expiry is [`Error::TokenExpired`].
    pub fn verify_token(&self, token: &str) -> Result<AccessClaims> {
        self.verify_token_at(token, Utc::now().timestamp())
    }

    fn verify_token_at(&self, token: &str, now: i64) -> Result<AccessClaims> {
        let (payload, signature) = token
            .split_once('.')
            .ok_or_else(|| Error::TokenMalformed("missing signature".to_string()))?;

        let signature = URL_SAFE_NO_PAD
            .decode(signature)
            .map_err(|e| Error::TokenMalformed(format!("bad signature encoding: {e}")))?;

        let mut mac = self.mac()?;
        mac.update(payload.as_bytes());
        mac.verify_slice(&signature)
            .map_err(|_| Error::TokenMalformed("signature mismatch".to_string()))?;

        let raw = URL_SAFE_NO_PAD
            .decode(payload)
            .map_err(|e| Error::TokenMalformed(format!("bad payload encoding: {e}")))?;
        let claims: AccessClaims = serde_json::from_slice(&raw)
            .map_err(|e| Error::TokenMalformed(format!("bad payload: {e}")))?;

        if now >= claims.expires_at {
            return Err(Error::TokenExpired);
        }
        Ok(claims)
    }

    fn mac(&self) -> Result<HmacSha256> {
        HmacSha256::new_from_slice(&self.secret)
            .map_err(|e| Error::Internal(format!("Failed to create HMAC: {e}")))
    }

    fn sign(&self, payload: &[u8]) -> Result<Vec<u8>> {
        let mut mac = self.mac()?;
        mac.update(payload);
        Ok(mac.finalize().into_bytes().to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn service() -> TokenService {
        TokenService::new(&TokenConfig {
            secret: "test-secret-for-access-tokens".to_string(),
            default_ttl_seconds: 600,
        })
    }

    #[test]
    fn test_issue_then_verify_round_trip() {
        let service = service();
        let before = Utc::now().timestamp();
        let issued = service.issue_token("42", Some(120)).unwrap();

        let claims = service.verify_token(&issued.token).unwrap();
        assert_eq!(claims.item_id, "42");
        assert_eq!(claims.expires_at, issued.expires_at);
        let remaining = claims.expires_at - before;
        assert!((119..=121).contains(&remaining), "remaining = {remaining}");
    }

    #[test]
    fn test_default_ttl_applies() {
        let issued = service().issue_token_at("42", None, 1_000).unwrap();
        assert_eq!(issued.expires_at, 1_600);
    }

    #[test]
    fn test_rejects_missing_item_and_zero_ttl() {
        let service = service();
        assert_eq!(service.issue_token("", Some(10)).unwrap_err(), Error::missing("itemId"));
        assert!(matches!(
            service.issue_token("42", Some(0)),
            Err(Error::InvalidParameter(_))
        ));
        assert!(matches!(
            service.issue_token("42", Some(u64::MAX)),
            Err(Error::InvalidParameter(_))
        ));
    }

    #[test]
    fn test_expired_token_is_never_valid() {
        let service = service();
        let issued = service.issue_token_at("42", Some(30), 1_000).unwrap();

        assert!(service.verify_token_at(&issued.token, 1_029).is_ok());
        assert_eq!(
            service.verify_token_at(&issued.token, 1_030).unwrap_err(),
            Error::TokenExpired
        );
        assert_eq!(
            service.verify_token_at(&issued.token, 5_000).unwrap_err(),
            Error::TokenExpired
        );
    }

    #[test]
    fn test_tampered_expiry_is_malformed() {
        let service = service();
        let issued = service.issue_token_at("42", Some(30), 1_000).unwrap();
        let (_, signature) = issued.token.split_once('.').unwrap();

        let forged_claims = AccessClaims {
            item_id: "42".to_string(),
            expires_at: i64::MAX,
        };
        let forged_payload = URL_SAFE_NO_PAD.encode(serde_json::to_vec(&forged_claims).unwrap());
        let forged = format!("{forged_payload}.{signature}");

        assert!(matches!(
            service.verify_token_at(&forged, 1_000),
            Err(Error::TokenMalformed(_))
        ));
    }

    #[test]
    fn test_token_from_other_secret_is_malformed() {
        let other = TokenService::new(&TokenConfig {
            secret: "another-secret".to_string(),
            default_ttl_seconds: 600,
        });
        let issued = other.issue_token("42", None).unwrap();

        assert!(matches!(
            service().verify_token(&issued.token),
            Err(Error::TokenMalformed(_))
        ));
    }

    #[test]
    fn test_garbage_is_malformed() {
        let service = service();
        for token in ["", "no-dot", "!!!.???", "e30.AAAA"] {
            assert!(
                matches!(service.verify_token(token), Err(Error::TokenMalformed(_))),
                "{token:?} should be malformed"
            );
        }
    }

    #[test]
    fn test_generated_secret_still_verifies() {
        let service = TokenService::new(&TokenConfig {
            secret: String::new(),
            default_ttl_seconds: 60,
        });
        let issued = service.issue_token("42", None).unwrap();
        assert_eq!(service.verify_token(&issued.token).unwrap().item_id, "42");
    }
}
