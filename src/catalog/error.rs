//! Error types for catalog network access.

use thiserror::Error;

/// Errors surfaced by [`CatalogClient`](super::CatalogClient) operations.
///
/// These are the hard failures of the search/browse/fetch paths; feed
/// malformation is a separate, softer [`FeedError`](crate::feed::FeedError).
#[derive(Debug, Error)]
pub enum CatalogError {
    /// Network-level error (DNS, connection refused, TLS, proxy handshake).
    #[error("network error requesting {url}: {source}")]
    Network {
        /// The URL that failed.
        url: String,
        /// The underlying network error.
        #[source]
        source: reqwest::Error,
    },

    /// Request timed out before completion.
    #[error("timeout requesting {url}")]
    Timeout {
        /// The URL that timed out.
        url: String,
    },

    /// HTTP error response after retries were exhausted (or a non-retryable
    /// status on the first attempt).
    #[error("HTTP {status} requesting {url}")]
    HttpStatus {
        /// The URL that returned an error status.
        url: String,
        /// The HTTP status code.
        status: u16,
        /// The Retry-After header value, if present (for 429 responses).
        retry_after: Option<String>,
    },

    /// The catalog root is tunnel-only but no proxy is configured.
    ///
    /// Connecting directly to a tunneled address is a hard failure by
    /// contract, never a silent fallback.
    #[error("catalog root {root} is only reachable through a proxy, but none is configured")]
    ProxyRequired {
        /// The tunnel-only catalog root.
        root: String,
    },

    /// A URL was malformed or could not be resolved against the root.
    #[error("invalid URL: {url}")]
    InvalidUrl {
        /// The invalid URL string.
        url: String,
    },
}

impl CatalogError {
    /// Creates a network error from a reqwest error.
    pub fn network(url: impl Into<String>, source: reqwest::Error) -> Self {
        Self::Network {
            url: url.into(),
            source,
        }
    }

    /// Creates a timeout error.
    pub fn timeout(url: impl Into<String>) -> Self {
        Self::Timeout { url: url.into() }
    }

    /// Creates an HTTP status error.
    pub fn http_status(url: impl Into<String>, status: u16) -> Self {
        Self::HttpStatus {
            url: url.into(),
            status,
            retry_after: None,
        }
    }

    /// Creates an HTTP status error carrying a Retry-After header value.
    pub fn http_status_with_retry_after(
        url: impl Into<String>,
        status: u16,
        retry_after: Option<String>,
    ) -> Self {
        Self::HttpStatus {
            url: url.into(),
            status,
            retry_after,
        }
    }

    /// Creates a proxy-required error.
    pub fn proxy_required(root: impl Into<String>) -> Self {
        Self::ProxyRequired { root: root.into() }
    }

    /// Creates an invalid URL error.
    pub fn invalid_url(url: impl Into<String>) -> Self {
        Self::InvalidUrl { url: url.into() }
    }
}
