//! Cache-fronted oEmbed metadata lookups

use std::time::Duration;

use reqwest::Client;
use serde_json::Value;
use tracing::debug;

use crate::cache::TtlCache;
use crate::config::MetadataConfig;
use crate::{Error, Result};

#[derive(Clone)]
pub struct MetadataService {
    client: Client,
    cache: TtlCache,
    config: MetadataConfig,
}

impl std::fmt::Debug for MetadataService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MetadataService")
            .field("provider", &self.config.provider)
            .field("oembed_endpoint", &self.config.oembed_endpoint)
            .finish_non_exhaustive()
    }
}

impl MetadataService {
    #[must_use]
    pub const fn new(client: Client, cache: TtlCache, config: MetadataConfig) -> Self {
        Self {
            client,
            cache,
            config,
        }
    }

    /// Metadata for the video identified by `key`, served from cache while
    /// younger than the configured TTL.
    pub async fn lookup(&self, key: &str) -> Result<Value> {
        let key = crate::error::require("key", Some(key))?;
        let ttl = Duration::from_secs(self.config.cache_ttl_seconds);

        self.cache
            .get_or_fetch(&self.config.provider, key, ttl, || self.fetch_oembed(key))
            .await
    }

    async fn fetch_oembed(&self, key: &str) -> Result<Value> {
        let encoded: String = url::form_urlencoded::byte_serialize(key.as_bytes()).collect();
        let watch_url = self.config.watch_url.replace("{key}", &encoded);

        debug!(provider = %self.config.provider, key, "Fetching oEmbed metadata");

        let response = self
            .client
            .get(&self.config.oembed_endpoint)
            .query(&[("url", watch_url.as_str()), ("format", "json")])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::UpstreamUnavailable(format!(
                "oEmbed lookup for {key} returned {status}"
            )));
        }

        response
            .json::<Value>()
            .await
            .map_err(|e| Error::UpstreamUnavailable(format!("invalid oEmbed body: {}", e.without_url())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::MemoryCacheStore;
    use crate::http_client::build_http_client;
    use serde_json::json;
    use std::sync::Arc;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn service(server: &MockServer) -> MetadataService {
        let client = build_http_client(Duration::from_secs(2), Duration::from_secs(5)).unwrap();
        let config = MetadataConfig {
            oembed_endpoint: format!("{}/oembed", server.uri()),
            ..MetadataConfig::default()
        };
        MetadataService::new(client, TtlCache::new(Arc::new(MemoryCacheStore::new())), config)
    }

    #[tokio::test]
    async fn test_lookup_hits_upstream_once_within_ttl() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/oembed"))
            .and(query_param("url", "https://www.youtube.com/watch?v=dQw4w9WgXcQ"))
            .and(query_param("format", "json"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "title": "Never Gonna Give You Up",
                "author_name": "Rick Astley",
            })))
            .expect(1)
            .mount(&server)
            .await;

        let service = service(&server);
        let first = service.lookup("dQw4w9WgXcQ").await.unwrap();
        let second = service.lookup("dQw4w9WgXcQ").await.unwrap();

        assert_eq!(first["title"], "Never Gonna Give You Up");
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn test_upstream_error_is_unavailable() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/oembed"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let result = service(&server).lookup("missing").await;
        assert!(matches!(result, Err(Error::UpstreamUnavailable(_))));
    }

    #[tokio::test]
    async fn test_empty_key_never_calls_upstream() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
            .expect(0)
            .mount(&server)
            .await;

        let result = service(&server).lookup("  ").await;
        assert_eq!(result.unwrap_err(), Error::missing("key"));
    }
}
