//! Cover image resolution: a cascade of independent providers.
//!
//! Order is deterministic: the direct id-probe first (cheapest, most
//! reliable when an external id exists), then Google Books, then Open
//! Library, then the placeholder sentinel. Every provider call is
//! independently guarded — a failure advances the cascade, and
//! [`CoverResolver::resolve`] never errors past its boundary.

mod direct;
mod googlebooks;
pub mod matching;
mod openlibrary;

pub use direct::DirectProbeProvider;
pub use googlebooks::GoogleBooksProvider;
pub use matching::{MATCH_THRESHOLD, is_title_match, title_match_score};
pub use openlibrary::OpenLibraryProvider;

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use thiserror::Error;
use tracing::{debug, instrument, warn};

use crate::config::{COVER_PLACEHOLDER, IngestConfig};
use crate::user_agent;

/// A provider failed; the cascade logs it and moves on.
#[derive(Debug, Error)]
#[error("cover provider {provider} failed: {message}")]
pub struct CoverError {
    provider: String,
    message: String,
}

impl CoverError {
    /// Creates a provider failure.
    pub fn provider(provider: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            provider: provider.into(),
            message: message.into(),
        }
    }
}

/// One source of cover image URLs.
///
/// # Object Safety
///
/// Uses `async_trait` to support dynamic dispatch via
/// `Box<dyn CoverProvider>`; Rust 2024 native async traits are not
/// object-safe, so the cascade pattern requires it.
#[async_trait]
pub trait CoverProvider: Send + Sync {
    /// Provider name for logs.
    fn name(&self) -> &str;

    /// Attempts to find a cover URL. `Ok(None)` means "not found here";
    /// `Err` means the provider itself failed. Both advance the cascade.
    async fn find_cover(
        &self,
        title: &str,
        author: Option<&str>,
        external_id: Option<&str>,
    ) -> Result<Option<String>, CoverError>;
}

/// Ordered provider cascade with a placeholder terminal fallback.
pub struct CoverResolver {
    providers: Vec<Box<dyn CoverProvider>>,
}

impl CoverResolver {
    /// Builds the default cascade from the ingest configuration.
    ///
    /// A provider whose construction fails is skipped with a warning; the
    /// resolver itself always constructs.
    #[must_use]
    pub fn new(config: &IngestConfig) -> Self {
        let mut providers: Vec<Box<dyn CoverProvider>> = Vec::new();

        match DirectProbeProvider::new(config.mirrors.clone()) {
            Ok(provider) => providers.push(Box::new(provider)),
            Err(error) => warn!(
                %error,
                "direct-probe provider unavailable; continuing with remaining providers"
            ),
        }
        match GoogleBooksProvider::new(config) {
            Ok(provider) => providers.push(Box::new(provider)),
            Err(error) => warn!(
                %error,
                "Google Books provider unavailable; continuing with remaining providers"
            ),
        }
        match OpenLibraryProvider::new(config) {
            Ok(provider) => providers.push(Box::new(provider)),
            Err(error) => warn!(
                %error,
                "Open Library provider unavailable; continuing with placeholder only"
            ),
        }

        Self { providers }
    }

    /// Builds a resolver over an explicit provider list (tests, custom
    /// cascades).
    #[must_use]
    pub fn with_providers(providers: Vec<Box<dyn CoverProvider>>) -> Self {
        Self { providers }
    }

    /// Resolves a cover URL, short-circuiting on the first success.
    ///
    /// Never fails: when every provider misses or breaks, the placeholder
    /// sentinel is returned.
    #[instrument(skip(self), fields(title = %title))]
    pub async fn resolve(
        &self,
        title: &str,
        author: Option<&str>,
        external_id: Option<&str>,
    ) -> String {
        for provider in &self.providers {
            match provider.find_cover(title, author, external_id).await {
                Ok(Some(url)) => {
                    debug!(provider = provider.name(), %url, "cover resolved");
                    return url;
                }
                Ok(None) => {
                    debug!(provider = provider.name(), "no cover here");
                }
                Err(error) => {
                    warn!(provider = provider.name(), %error, "provider failed, advancing cascade");
                }
            }
        }
        COVER_PLACEHOLDER.to_string()
    }
}

impl std::fmt::Debug for CoverResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let names: Vec<&str> = self.providers.iter().map(|p| p.name()).collect();
        f.debug_struct("CoverResolver")
            .field("providers", &names)
            .finish()
    }
}

/// Builds a direct (non-tunneled) HTTP client for provider traffic.
pub(crate) fn build_provider_client(timeout_secs: u64) -> Result<Client, reqwest::Error> {
    Client::builder()
        .connect_timeout(Duration::from_secs(timeout_secs.min(10)))
        .timeout(Duration::from_secs(timeout_secs))
        .user_agent(user_agent::default_provider_user_agent())
        .gzip(true)
        .build()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    struct FailingProvider;

    #[async_trait]
    impl CoverProvider for FailingProvider {
        fn name(&self) -> &str {
            "failing"
        }
        async fn find_cover(
            &self,
            _title: &str,
            _author: Option<&str>,
            _external_id: Option<&str>,
        ) -> Result<Option<String>, CoverError> {
            Err(CoverError::provider("failing", "always down"))
        }
    }

    struct MissProvider;

    #[async_trait]
    impl CoverProvider for MissProvider {
        fn name(&self) -> &str {
            "miss"
        }
        async fn find_cover(
            &self,
            _title: &str,
            _author: Option<&str>,
            _external_id: Option<&str>,
        ) -> Result<Option<String>, CoverError> {
            Ok(None)
        }
    }

    struct HitProvider(&'static str);

    #[async_trait]
    impl CoverProvider for HitProvider {
        fn name(&self) -> &str {
            "hit"
        }
        async fn find_cover(
            &self,
            _title: &str,
            _author: Option<&str>,
            _external_id: Option<&str>,
        ) -> Result<Option<String>, CoverError> {
            Ok(Some(self.0.to_string()))
        }
    }

    #[tokio::test]
    async fn test_all_providers_failing_yields_placeholder() {
        let resolver = CoverResolver::with_providers(vec![
            Box::new(FailingProvider),
            Box::new(MissProvider),
            Box::new(FailingProvider),
        ]);
        let url = resolver.resolve("Любая книга", None, Some("1")).await;
        assert_eq!(url, COVER_PLACEHOLDER);
    }

    #[tokio::test]
    async fn test_cascade_short_circuits_on_first_hit() {
        let resolver = CoverResolver::with_providers(vec![
            Box::new(MissProvider),
            Box::new(HitProvider("https://covers.example/1.jpg")),
            Box::new(FailingProvider),
        ]);
        let url = resolver.resolve("Книга", Some("Автор"), None).await;
        assert_eq!(url, "https://covers.example/1.jpg");
    }

    #[tokio::test]
    async fn test_empty_cascade_yields_placeholder() {
        let resolver = CoverResolver::with_providers(Vec::new());
        assert_eq!(resolver.resolve("X", None, None).await, COVER_PLACEHOLDER);
    }

    #[test]
    fn test_default_cascade_order() {
        let resolver = CoverResolver::new(&IngestConfig::default());
        let debug = format!("{resolver:?}");
        let direct = debug.find("direct-probe").unwrap();
        let google = debug.find("google-books").unwrap();
        let open_library = debug.find("open-library").unwrap();
        assert!(direct < google && google < open_library);
    }
}
