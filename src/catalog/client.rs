//! HTTP access to the catalog: one retried, proxy-tunneled session.
//!
//! [`CatalogClient`] is the single point of network access to one catalog
//! root. It is constructed explicitly from an [`IngestConfig`] and passed to
//! each component; cloning is cheap and shares the underlying connection
//! pool. Feed requests and content downloads use separate timeouts because
//! payloads behind the tunnel transfer slowly.

use std::time::Duration;

use reqwest::header::{ACCEPT, ACCEPT_LANGUAGE, HeaderMap, HeaderValue, RETRY_AFTER};
use reqwest::{Client, Proxy, Response};
use tracing::{debug, instrument, warn};
use url::Url;

use crate::config::IngestConfig;
use crate::user_agent;

use super::error::CatalogError;
use super::retry::{RetryDecision, RetryPolicy, parse_retry_after};

/// Connect timeout applied to both catalog clients.
const CONNECT_TIMEOUT_SECS: u64 = 10;

/// Accept header favoring OPDS/Atom but tolerating the catalog's occasional
/// HTML responses.
const FEED_ACCEPT: &str = "application/atom+xml,application/xml;q=0.9,text/html;q=0.8,*/*;q=0.7";

/// Retried, rate-aware HTTP session bound to a single catalog root.
///
/// When the root is a tunnel-only (`.onion`) address a SOCKS proxy must be
/// configured; construction fails hard otherwise. A direct connection to the
/// tunneled address is never attempted as a fallback.
#[derive(Debug, Clone)]
pub struct CatalogClient {
    feed_client: Client,
    content_client: Client,
    root: Url,
    retry_policy: RetryPolicy,
}

impl CatalogClient {
    /// Builds a client for the configured catalog root.
    ///
    /// # Errors
    ///
    /// Returns [`CatalogError::ProxyRequired`] when the root is an `.onion`
    /// address and no proxy is configured, [`CatalogError::InvalidUrl`] when
    /// the root or proxy endpoint does not parse, and
    /// [`CatalogError::Network`] when reqwest client construction fails.
    pub fn new(config: &IngestConfig) -> Result<Self, CatalogError> {
        if config.root_requires_tunnel() && config.proxy.is_none() {
            return Err(CatalogError::proxy_required(&config.catalog_root));
        }

        let root = Url::parse(&config.catalog_root)
            .map_err(|_| CatalogError::invalid_url(&config.catalog_root))?;

        let proxy = match &config.proxy {
            Some(endpoint) => {
                Some(Proxy::all(endpoint).map_err(|_| CatalogError::invalid_url(endpoint))?)
            }
            None => None,
        };

        let feed_client = build_client(proxy.clone(), config.feed_timeout_secs)
            .map_err(|e| CatalogError::network(&config.catalog_root, e))?;
        let content_client = build_client(proxy, config.content_timeout_secs)
            .map_err(|e| CatalogError::network(&config.catalog_root, e))?;

        Ok(Self {
            feed_client,
            content_client,
            root,
            retry_policy: RetryPolicy::with_max_attempts(config.max_retries),
        })
    }

    /// The catalog root this client is bound to.
    #[must_use]
    pub fn root(&self) -> &Url {
        &self.root
    }

    /// Resolves a possibly-relative catalog href against the root.
    ///
    /// # Errors
    ///
    /// Returns [`CatalogError::InvalidUrl`] when the href cannot be joined.
    pub fn resolve_href(&self, href: &str) -> Result<String, CatalogError> {
        self.root
            .join(href)
            .map(|u| u.to_string())
            .map_err(|_| CatalogError::invalid_url(href))
    }

    /// Fetches a feed/metadata document, fully buffered.
    ///
    /// Bytes are returned rather than a string because the catalog serves
    /// legacy encodings; decoding is the parser's concern.
    ///
    /// # Errors
    ///
    /// Returns [`CatalogError`] when the request fails after retries.
    #[instrument(skip(self), fields(url = %url))]
    pub async fn get_feed(&self, url: &str) -> Result<Vec<u8>, CatalogError> {
        let response = self.get_with_retry(&self.feed_client, url).await?;
        let bytes = response
            .bytes()
            .await
            .map_err(|e| CatalogError::network(url, e))?;
        debug!(bytes = bytes.len(), "feed fetched");
        Ok(bytes.to_vec())
    }

    /// Issues a retried GET on the content client and returns the streaming
    /// response; the caller owns body streaming (and size enforcement).
    ///
    /// # Errors
    ///
    /// Returns [`CatalogError`] when no successful response is obtained.
    #[instrument(skip(self), fields(url = %url))]
    pub async fn get_content_response(&self, url: &str) -> Result<Response, CatalogError> {
        self.get_with_retry(&self.content_client, url).await
    }

    async fn get_with_retry(&self, client: &Client, url: &str) -> Result<Response, CatalogError> {
        let mut attempt: u32 = 1;
        loop {
            match issue_get(client, url).await {
                Ok(response) => return Ok(response),
                Err(error) => {
                    let retry_after = match &error {
                        CatalogError::HttpStatus {
                            retry_after: Some(value),
                            ..
                        } => parse_retry_after(value),
                        _ => None,
                    };
                    match self.retry_policy.should_retry(&error, attempt, retry_after) {
                        RetryDecision::Retry {
                            delay,
                            attempt: next,
                        } => {
                            warn!(
                                %error,
                                attempt,
                                delay_ms = delay.as_millis(),
                                "transient catalog failure, retrying"
                            );
                            tokio::time::sleep(delay).await;
                            attempt = next;
                        }
                        RetryDecision::DoNotRetry { reason } => {
                            debug!(%reason, "not retrying");
                            return Err(error);
                        }
                    }
                }
            }
        }
    }
}

async fn issue_get(client: &Client, url: &str) -> Result<Response, CatalogError> {
    let response = client.get(url).send().await.map_err(|e| {
        if e.is_timeout() {
            CatalogError::timeout(url)
        } else {
            CatalogError::network(url, e)
        }
    })?;

    let status = response.status();
    if !status.is_success() {
        let retry_after = response
            .headers()
            .get(RETRY_AFTER)
            .and_then(|v| v.to_str().ok())
            .map(String::from);
        return Err(CatalogError::http_status_with_retry_after(
            url,
            status.as_u16(),
            retry_after,
        ));
    }
    Ok(response)
}

fn build_client(proxy: Option<Proxy>, timeout_secs: u64) -> Result<Client, reqwest::Error> {
    let mut headers = HeaderMap::new();
    headers.insert(ACCEPT, HeaderValue::from_static(FEED_ACCEPT));
    headers.insert(
        ACCEPT_LANGUAGE,
        HeaderValue::from_static("ru-RU,ru;q=0.8,en-US;q=0.5,en;q=0.3"),
    );

    let mut builder = Client::builder()
        .connect_timeout(Duration::from_secs(CONNECT_TIMEOUT_SECS))
        .timeout(Duration::from_secs(timeout_secs))
        .user_agent(user_agent::CATALOG_USER_AGENT)
        .default_headers(headers)
        .gzip(true);

    if let Some(proxy) = proxy {
        builder = builder.proxy(proxy);
    }

    builder.build()
}
