//! Upstream media server addressing

use percent_encoding::{utf8_percent_encode, AsciiSet, CONTROLS};
use reqwest::Client;
use url::Url;

use streamgate_core::config::UpstreamConfig;
use streamgate_core::{Error, Result};

/// Characters escaped when an id is placed in a single path segment
const PATH_SEGMENT: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'#')
    .add(b'%')
    .add(b'/')
    .add(b'<')
    .add(b'>')
    .add(b'?')
    .add(b'\\')
    .add(b'`')
    .add(b'{')
    .add(b'}');

/// The configured media server plus the client used to reach it.
#[derive(Clone)]
pub struct Upstream {
    client: Client,
    config: UpstreamConfig,
}

impl std::fmt::Debug for Upstream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Upstream")
            .field("base_url", &self.config.base_url)
            .finish_non_exhaustive()
    }
}

impl Upstream {
    #[must_use]
    pub const fn new(client: Client, config: UpstreamConfig) -> Self {
        Self { client, config }
    }

    #[must_use]
    pub const fn client(&self) -> &Client {
        &self.client
    }

    #[must_use]
    pub fn segment_extensions(&self) -> &[String] {
        &self.config.segment_extensions
    }

    /// Master playlist URL for `item_id`, credential attached.
    pub fn playlist_url(&self, item_id: &str) -> Result<Url> {
        let path = self
            .config
            .playlist_path
            .replace("{item_id}", &encode_segment(item_id));
        let url = self.join(&path)?;
        Ok(self.with_credential(url))
    }

    /// Segment URL for `item_id` and a segment path taken from a playlist.
    ///
    /// Leading slashes are stripped so the path always resolves below the
    /// configured template. The credential is added only when the path does
    /// not already carry one.
    pub fn segment_url(&self, item_id: &str, segment_path: &str) -> Result<Url> {
        let relative = segment_path.trim_start_matches(['/', '\\']);
        if relative.is_empty() {
            return Err(Error::missing("path"));
        }
        if escapes_root(relative) {
            return Err(Error::InvalidParameter(format!(
                "segment path escapes the upstream root: {segment_path}"
            )));
        }

        let path = self
            .config
            .segment_path
            .replace("{item_id}", &encode_segment(item_id))
            .replace("{path}", relative);
        let url = self.join(&path)?;
        Ok(self.with_credential(url))
    }

    /// Render `url` for logs with the credential value masked.
    #[must_use]
    pub fn redact(&self, url: &Url) -> String {
        let mut redacted = url.clone();
        let pairs: Vec<(String, String)> = url
            .query_pairs()
            .map(|(k, v)| {
                if k == self.config.credential_param.as_str() {
                    (k.into_owned(), "***".to_string())
                } else {
                    (k.into_owned(), v.into_owned())
                }
            })
            .collect();
        if !pairs.is_empty() {
            redacted.query_pairs_mut().clear().extend_pairs(pairs);
        }
        redacted.to_string()
    }

    fn join(&self, path: &str) -> Result<Url> {
        let raw = format!("{}{}", self.config.base_url.trim_end_matches('/'), path);
        Url::parse(&raw).map_err(|e| Error::InvalidParameter(format!("cannot build upstream URL: {e}")))
    }

    fn with_credential(&self, mut url: Url) -> Url {
        let param = self.config.credential_param.as_str();
        if self.config.api_key.is_empty() || url.query_pairs().any(|(k, _)| k == param) {
            return url;
        }
        url.query_pairs_mut().append_pair(param, &self.config.api_key);
        url
    }
}

fn encode_segment(value: &str) -> String {
    utf8_percent_encode(value, PATH_SEGMENT).to_string()
}

/// Whether any path segment (before the query) is `..`, raw or percent-encoded.
fn escapes_root(path: &str) -> bool {
    let path_part = path.split(['?', '#']).next().unwrap_or_default();
    let decoded = percent_encoding::percent_decode_str(path_part).decode_utf8_lossy();
    decoded.split(['/', '\\']).any(|segment| segment == "..")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use streamgate_core::http_client::build_http_client;

    fn upstream() -> Upstream {
        let config = UpstreamConfig {
            base_url: "http://media.local:8096/".to_string(),
            api_key: "secret-key".to_string(),
            ..UpstreamConfig::default()
        };
        let client = build_http_client(Duration::from_secs(1), Duration::from_secs(1)).unwrap();
        Upstream::new(client, config)
    }

    #[test]
    fn test_playlist_url_substitutes_item_and_credential() {
        let url = upstream().playlist_url("42").unwrap();
        assert_eq!(
            url.as_str(),
            "http://media.local:8096/Videos/42/master.m3u8?api_key=secret-key"
        );
    }

    #[test]
    fn test_item_id_cannot_add_path_segments() {
        let url = upstream().playlist_url("a/b?c").unwrap();
        assert_eq!(url.path(), "/Videos/a%2Fb%3Fc/master.m3u8");
    }

    #[test]
    fn test_segment_url_strips_leading_slash() {
        let url = upstream().segment_url("42", "/hls1/main/0.ts").unwrap();
        assert_eq!(url.path(), "/Videos/42/hls1/main/0.ts");
        assert_eq!(url.query(), Some("api_key=secret-key"));
    }

    #[test]
    fn test_segment_url_keeps_existing_credential() {
        let url = upstream()
            .segment_url("42", "hls1/main/0.ts?DeviceId=x&api_key=from-playlist")
            .unwrap();
        let keys: Vec<_> = url
            .query_pairs()
            .filter(|(k, _)| k == "api_key")
            .map(|(_, v)| v.into_owned())
            .collect();
        assert_eq!(keys, vec!["from-playlist".to_string()]);
    }

    #[test]
    fn test_segment_url_rejects_traversal() {
        let upstream = upstream();
        for path in ["../../System/Info", "hls/%2e%2e/%2E%2E/x.ts", "a\\..\\b.ts"] {
            assert!(
                matches!(upstream.segment_url("42", path), Err(Error::InvalidParameter(_))),
                "{path} should be rejected"
            );
        }
        assert_eq!(upstream.segment_url("42", "///").unwrap_err(), Error::missing("path"));
    }

    #[test]
    fn test_redact_masks_credential() {
        let upstream = upstream();
        let url = upstream.segment_url("42", "0.ts?DeviceId=x").unwrap();
        let redacted = upstream.redact(&url);
        assert!(!redacted.contains("secret-key"));
        assert!(redacted.contains("api_key=***") || redacted.contains("api_key=%2A%2A%2A"));
        assert!(redacted.contains("DeviceId=x"));
    }
}
