//! Ingestion configuration: catalog address, proxy tunnel, timeouts, caps.
//!
//! One explicit [`IngestConfig`] value is built by the caller and handed to
//! each component, so multiple independent sessions (tunneled catalog vs.
//! direct mirror probes) can coexist without ambient singletons.

use serde::{Deserialize, Serialize};

/// Default SOCKS endpoint of a locally running Tor client.
pub const DEFAULT_PROXY: &str = "socks5h://127.0.0.1:9150";

/// Default metadata-request timeout in seconds.
pub const DEFAULT_FEED_TIMEOUT_SECS: u64 = 30;

/// Default content-download timeout in seconds (double the feed timeout; the
/// catalog is slow behind the tunnel).
pub const DEFAULT_CONTENT_TIMEOUT_SECS: u64 = 60;

/// Default retry ceiling for transient catalog failures.
pub const DEFAULT_MAX_RETRIES: u32 = 3;

/// Default hard cap on a single content download (50 MB).
pub const DEFAULT_MAX_CONTENT_BYTES: u64 = 50 * 1024 * 1024;

/// Ordered legacy encodings tried when confidence-based detection fails.
pub const LEGACY_ENCODINGS: [&str; 4] = ["utf-8", "windows-1251", "cp1251", "koi8-r"];

/// Sentinel returned when no cover provider produced an image URL.
pub const COVER_PLACEHOLDER: &str = "/placeholder-book.svg";

/// Configuration for one ingestion session.
///
/// `Default` carries the documented defaults for everything except
/// `catalog_root`, which has no meaningful default and must be set by the
/// caller.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IngestConfig {
    /// Root address of the catalog (typically an `.onion` host).
    pub catalog_root: String,

    /// SOCKS proxy endpoint used to reach the catalog root.
    ///
    /// Required whenever `catalog_root` is an `.onion` address; building a
    /// client without it is a hard error, never a silent direct connection.
    pub proxy: Option<String>,

    /// Clearnet mirror hosts probed for cover images by external id.
    pub mirrors: Vec<String>,

    /// Timeout for feed/metadata requests, in seconds.
    pub feed_timeout_secs: u64,

    /// Timeout for content downloads, in seconds.
    pub content_timeout_secs: u64,

    /// Maximum attempts for transient catalog failures (including the first).
    pub max_retries: u32,

    /// Hard byte ceiling for a single content download.
    pub max_content_bytes: u64,

    /// Google Books API endpoint.
    pub google_books_endpoint: String,

    /// Optional Google Books API key (the volumes endpoint works without one
    /// at reduced quota).
    pub google_books_key: Option<String>,

    /// Open Library search endpoint.
    pub open_library_endpoint: String,

    /// Open Library covers endpoint.
    pub open_library_covers_endpoint: String,

    /// Advisory request budget per minute. Not enforced internally; callers
    /// pace their own invocations.
    pub requests_per_minute: u32,

    /// Advisory request budget per hour. Not enforced internally.
    pub requests_per_hour: u32,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            catalog_root: String::new(),
            proxy: Some(DEFAULT_PROXY.to_string()),
            mirrors: Vec::new(),
            feed_timeout_secs: DEFAULT_FEED_TIMEOUT_SECS,
            content_timeout_secs: DEFAULT_CONTENT_TIMEOUT_SECS,
            max_retries: DEFAULT_MAX_RETRIES,
            max_content_bytes: DEFAULT_MAX_CONTENT_BYTES,
            google_books_endpoint: "https://www.googleapis.com/books/v1".to_string(),
            google_books_key: None,
            open_library_endpoint: "https://openlibrary.org".to_string(),
            open_library_covers_endpoint: "https://covers.openlibrary.org".to_string(),
            requests_per_minute: 30,
            requests_per_hour: 500,
        }
    }
}

impl IngestConfig {
    /// Creates a config bound to the given catalog root, defaults elsewhere.
    #[must_use]
    pub fn for_root(catalog_root: impl Into<String>) -> Self {
        Self {
            catalog_root: catalog_root.into(),
            ..Self::default()
        }
    }

    /// Whether the catalog root is only reachable through the proxy tunnel.
    #[must_use]
    pub fn root_requires_tunnel(&self) -> bool {
        url::Url::parse(&self.catalog_root)
            .ok()
            .and_then(|u| u.host_str().map(|h| h.ends_with(".onion")))
            .unwrap_or(false)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_default_values() {
        let config = IngestConfig::default();
        assert_eq!(config.proxy.as_deref(), Some(DEFAULT_PROXY));
        assert_eq!(config.feed_timeout_secs, 30);
        assert_eq!(config.content_timeout_secs, 60);
        assert_eq!(config.max_retries, 3);
        assert_eq!(config.max_content_bytes, 50 * 1024 * 1024);
        assert!(config.mirrors.is_empty());
    }

    #[test]
    fn test_root_requires_tunnel_for_onion() {
        let config = IngestConfig::for_root("http://exampleonionaddress.onion");
        assert!(config.root_requires_tunnel());
    }

    #[test]
    fn test_root_does_not_require_tunnel_for_clearnet() {
        let config = IngestConfig::for_root("http://127.0.0.1:8080");
        assert!(!config.root_requires_tunnel());
    }

    #[test]
    fn test_config_round_trips_through_serde() {
        let config = IngestConfig::for_root("http://example.onion");
        let json = serde_json::to_string(&config).unwrap();
        let back: IngestConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(back.catalog_root, config.catalog_root);
        assert_eq!(back.max_retries, config.max_retries);
    }

    #[test]
    fn test_partial_deserialization_fills_defaults() {
        let back: IngestConfig =
            serde_json::from_str(r#"{"catalog_root":"http://x.onion"}"#).unwrap();
        assert_eq!(back.catalog_root, "http://x.onion");
        assert_eq!(back.max_retries, DEFAULT_MAX_RETRIES);
        assert_eq!(back.proxy.as_deref(), Some(DEFAULT_PROXY));
    }
}
