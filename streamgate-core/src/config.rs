use config::{Config as ConfigBuilder, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Application configuration
///
/// Built once at startup and handed to each component by value or reference.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub upstream: UpstreamConfig,
    pub proxy: ProxyConfig,
    pub token: TokenConfig,
    pub metadata: MetadataConfig,
    pub cache: CacheConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub http_port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            http_port: 8080,
        }
    }
}

/// Self-hosted media server the playlists and segments come from.
#[derive(Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct UpstreamConfig {
    pub base_url: String,
    pub api_key: String,
    /// Query parameter carrying `api_key` on upstream requests
    pub credential_param: String,
    /// Path template for the master playlist, `{item_id}` is substituted
    pub playlist_path: String,
    /// Path template for segments, `{item_id}` and `{path}` are substituted
    pub segment_path: String,
    /// File extensions (without the dot) that mark a playlist line as a segment
    pub segment_extensions: Vec<String>,
    pub connect_timeout_seconds: u64,
    pub request_timeout_seconds: u64,
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            base_url: String::new(),
            api_key: String::new(),
            credential_param: "api_key".to_string(),
            playlist_path: "/Videos/{item_id}/master.m3u8".to_string(),
            segment_path: "/Videos/{item_id}/{path}".to_string(),
            segment_extensions: vec!["ts".to_string()],
            connect_timeout_seconds: 10,
            request_timeout_seconds: 30,
        }
    }
}

impl std::fmt::Debug for UpstreamConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UpstreamConfig")
            .field("base_url", &self.base_url)
            .field("api_key_set", &!self.api_key.is_empty())
            .field("credential_param", &self.credential_param)
            .field("playlist_path", &self.playlist_path)
            .field("segment_path", &self.segment_path)
            .field("segment_extensions", &self.segment_extensions)
            .field("connect_timeout_seconds", &self.connect_timeout_seconds)
            .field("request_timeout_seconds", &self.request_timeout_seconds)
            .finish()
    }
}

impl UpstreamConfig {
    #[must_use]
    pub const fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_seconds)
    }

    #[must_use]
    pub const fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_seconds)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProxyConfig {
    /// Endpoint that rewritten segment URLs point back at
    pub public_path: String,
}

impl Default for ProxyConfig {
    fn default() -> Self {
        Self {
            public_path: "/api/hls".to_string(),
        }
    }
}

#[derive(Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TokenConfig {
    /// HMAC key; a random per-process key is used when empty
    pub secret: String,
    pub default_ttl_seconds: u64,
}

impl Default for TokenConfig {
    fn default() -> Self {
        Self {
            secret: String::new(),
            default_ttl_seconds: 3600,
        }
    }
}

impl std::fmt::Debug for TokenConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenConfig")
            .field("secret_set", &!self.secret.is_empty())
            .field("default_ttl_seconds", &self.default_ttl_seconds)
            .finish()
    }
}

/// Third-party video platform queried through oEmbed
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MetadataConfig {
    /// Cache namespace for lookups
    pub provider: String,
    pub oembed_endpoint: String,
    /// Watch page template, `{key}` is substituted
    pub watch_url: String,
    pub cache_ttl_seconds: u64,
}

impl Default for MetadataConfig {
    fn default() -> Self {
        Self {
            provider: "youtube".to_string(),
            oembed_endpoint: "https://www.youtube.com/oembed".to_string(),
            watch_url: "https://www.youtube.com/watch?v={key}".to_string(),
            cache_ttl_seconds: 86400,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CacheBackend {
    /// Process-local map, single replica only
    #[default]
    Memory,
    /// Shared `cache_entries` table
    Postgres,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    pub backend: CacheBackend,
    pub database_url: String,
    pub max_connections: u32,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            backend: CacheBackend::Memory,
            database_url: String::new(),
            max_connections: 10,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub format: String, // "json" or "pretty"
    pub file_path: Option<String>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "pretty".to_string(),
            file_path: None,
        }
    }
}

impl Config {
    /// Load configuration from multiple sources with priority:
    /// 1. Environment variables (highest priority)
    /// 2. Config file (if provided)
    /// 3. Defaults (lowest priority)
    pub fn load(config_file: Option<&str>) -> Result<Self, ConfigError> {
        let mut builder = ConfigBuilder::builder();

        if let Some(path) = config_file {
            if Path::new(path).exists() {
                builder = builder.add_source(File::with_name(path));
            }
        }

        // STREAMGATE_UPSTREAM__API_KEY, STREAMGATE_TOKEN__DEFAULT_TTL_SECONDS, ...
        builder = builder.add_source(
            Environment::with_prefix("STREAMGATE")
                .prefix_separator("_")
                .separator("__")
                .list_separator(",")
                .with_list_parse_key("upstream.segment_extensions")
                .try_parsing(true),
        );

        builder.build()?.try_deserialize()
    }

    /// Resolve the config file (`STREAMGATE_CONFIG_PATH`, then `./config.yaml`)
    /// and load it together with the environment.
    pub fn discover() -> Result<Self, ConfigError> {
        let path = std::env::var("STREAMGATE_CONFIG_PATH")
            .ok()
            .filter(|p| Path::new(p).exists())
            .or_else(|| {
                Path::new("config.yaml")
                    .exists()
                    .then(|| "config.yaml".to_string())
            });
        Self::load(path.as_deref())
    }

    #[must_use]
    pub fn http_address(&self) -> String {
        format!("{}:{}", self.server.host, self.server.http_port)
    }

    /// Collect every configuration problem instead of stopping at the first.
    pub fn validate(&self) -> Result<(), Vec<String>> {
        let mut errors = Vec::new();

        if self.upstream.base_url.trim().is_empty() {
            errors.push("upstream.base_url must be set".to_string());
        } else if url::Url::parse(&self.upstream.base_url).is_err() {
            errors.push(format!(
                "upstream.base_url is not a valid URL: {}",
                self.upstream.base_url
            ));
        }
        if self.upstream.credential_param.trim().is_empty() {
            errors.push("upstream.credential_param must not be empty".to_string());
        }
        if !self.upstream.playlist_path.contains("{item_id}") {
            errors.push("upstream.playlist_path must contain {item_id}".to_string());
        }
        if !self.upstream.segment_path.contains("{path}") {
            errors.push("upstream.segment_path must contain {path}".to_string());
        }
        if self.upstream.segment_extensions.iter().all(|e| e.trim().is_empty()) {
            errors.push("upstream.segment_extensions must list at least one extension".to_string());
        }
        if self.upstream.request_timeout_seconds == 0 || self.upstream.connect_timeout_seconds == 0
        {
            errors.push("upstream timeouts must be positive".to_string());
        }
        if !self.proxy.public_path.starts_with('/') || self.proxy.public_path.contains('?') {
            errors.push(format!(
                "proxy.public_path must be an absolute path without a query: {}",
                self.proxy.public_path
            ));
        }
        if self.token.default_ttl_seconds == 0 {
            errors.push("token.default_ttl_seconds must be positive".to_string());
        }
        if self.metadata.cache_ttl_seconds == 0 {
            errors.push("metadata.cache_ttl_seconds must be positive".to_string());
        }
        if !self.metadata.watch_url.contains("{key}") {
            errors.push("metadata.watch_url must contain {key}".to_string());
        }
        if self.cache.backend == CacheBackend::Postgres && self.cache.database_url.is_empty() {
            errors.push("cache.database_url is required for the postgres backend".to_string());
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid_config() -> Config {
        let mut config = Config::default();
        config.upstream.base_url = "http://media.local:8096".to_string();
        config
    }

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.server.http_port, 8080);
        assert_eq!(config.upstream.credential_param, "api_key");
        assert_eq!(config.upstream.segment_extensions, vec!["ts".to_string()]);
        assert_eq!(config.proxy.public_path, "/api/hls");
        assert_eq!(config.token.default_ttl_seconds, 3600);
        assert_eq!(config.cache.backend, CacheBackend::Memory);
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn test_http_address() {
        let config = Config::default();
        assert_eq!(config.http_address(), "0.0.0.0:8080");
    }

    #[test]
    fn test_validate_accepts_minimal_config() {
        assert!(valid_config().validate().is_ok());
    }

    #[test]
    fn test_validate_reports_every_problem() {
        let mut config = Config::default();
        config.token.default_ttl_seconds = 0;
        config.cache.backend = CacheBackend::Postgres;
        config.proxy.public_path = "api/hls".to_string();

        let errors = config.validate().unwrap_err();
        assert_eq!(errors.len(), 4);
        assert!(errors.iter().any(|e| e.contains("base_url")));
        assert!(errors.iter().any(|e| e.contains("default_ttl_seconds")));
        assert!(errors.iter().any(|e| e.contains("database_url")));
        assert!(errors.iter().any(|e| e.contains("public_path")));
    }

    #[test]
    fn test_load_layers_environment_over_defaults() {
        std::env::set_var("STREAMGATE_METADATA__CACHE_TTL_SECONDS", "120");
        std::env::set_var("STREAMGATE_UPSTREAM__SEGMENT_EXTENSIONS", "ts,m4s");

        let config = Config::load(Some("/nonexistent/streamgate.yaml")).unwrap();

        std::env::remove_var("STREAMGATE_METADATA__CACHE_TTL_SECONDS");
        std::env::remove_var("STREAMGATE_UPSTREAM__SEGMENT_EXTENSIONS");

        assert_eq!(config.metadata.cache_ttl_seconds, 120);
        assert_eq!(
            config.upstream.segment_extensions,
            vec!["ts".to_string(), "m4s".to_string()]
        );
        assert_eq!(config.proxy.public_path, "/api/hls");
    }

    #[test]
    fn test_debug_hides_secrets() {
        let mut config = valid_config();
        config.upstream.api_key = "super-secret".to_string();
        config.token.secret = "hmac-secret".to_string();

        let rendered = format!("{config:?}");
        assert!(!rendered.contains("super-secret"));
        assert!(!rendered.contains("hmac-secret"));
        assert!(rendered.contains("api_key_set: true"));
    }
}
