//! Google Books cover lookup.
//!
//! Queries the volumes endpoint by title (and author when known), fuzzy
//! matches result titles, and takes the highest-resolution image link. Two
//! known quirks of the API's image URLs are fixed up: the `zoom=1`
//! thumbnail parameter and plain-http links.

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use tracing::debug;

use crate::config::IngestConfig;
use crate::cover::matching::is_title_match;

use super::{CoverError, CoverProvider, build_provider_client};

const REQUEST_TIMEOUT_SECS: u64 = 10;
const MAX_RESULTS: u8 = 5;

// ==================== Volumes API response types ====================

#[derive(Debug, Deserialize)]
pub(crate) struct VolumesResponse {
    pub items: Option<Vec<Volume>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct Volume {
    pub volume_info: Option<VolumeInfo>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct VolumeInfo {
    pub title: Option<String>,
    pub image_links: Option<ImageLinks>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct ImageLinks {
    pub extra_large: Option<String>,
    pub large: Option<String>,
    pub medium: Option<String>,
    pub small: Option<String>,
    pub thumbnail: Option<String>,
}

impl ImageLinks {
    /// Highest-resolution link available.
    fn best(&self) -> Option<&str> {
        self.extra_large
            .as_deref()
            .or(self.large.as_deref())
            .or(self.medium.as_deref())
            .or(self.small.as_deref())
            .or(self.thumbnail.as_deref())
    }
}

// ==================== Provider ====================

/// Cover lookup via the Google Books volumes API.
pub struct GoogleBooksProvider {
    client: Client,
    base_url: String,
    api_key: Option<String>,
}

impl GoogleBooksProvider {
    /// Creates a provider from the ingest configuration.
    ///
    /// # Errors
    ///
    /// Returns [`CoverError`] when HTTP client construction fails.
    pub fn new(config: &IngestConfig) -> Result<Self, CoverError> {
        Self::with_base_url(&config.google_books_endpoint, config.google_books_key.clone())
    }

    /// Creates a provider against a custom endpoint (for testing with
    /// wiremock).
    ///
    /// # Errors
    ///
    /// Returns [`CoverError`] when HTTP client construction fails.
    pub fn with_base_url(
        base_url: impl Into<String>,
        api_key: Option<String>,
    ) -> Result<Self, CoverError> {
        let client = build_provider_client(REQUEST_TIMEOUT_SECS)
            .map_err(|e| CoverError::provider("google-books", e.to_string()))?;
        Ok(Self {
            client,
            base_url: base_url.into(),
            api_key,
        })
    }
}

impl std::fmt::Debug for GoogleBooksProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GoogleBooksProvider")
            .field("base_url", &self.base_url)
            .field("has_key", &self.api_key.is_some())
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl CoverProvider for GoogleBooksProvider {
    fn name(&self) -> &str {
        "google-books"
    }

    async fn find_cover(
        &self,
        title: &str,
        author: Option<&str>,
        _external_id: Option<&str>,
    ) -> Result<Option<String>, CoverError> {
        let mut query = title.to_string();
        if let Some(author) = author {
            query.push_str(&format!(" inauthor:{author}"));
        }
        let mut url = format!(
            "{}/volumes?q={}&maxResults={MAX_RESULTS}",
            self.base_url,
            urlencoding::encode(&query)
        );
        if let Some(key) = &self.api_key {
            url.push_str(&format!("&key={}", urlencoding::encode(key)));
        }

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| CoverError::provider("google-books", e.to_string()))?;
        if !response.status().is_success() {
            return Err(CoverError::provider(
                "google-books",
                format!("HTTP {}", response.status().as_u16()),
            ));
        }
        let body: VolumesResponse = response
            .json()
            .await
            .map_err(|e| CoverError::provider("google-books", e.to_string()))?;

        for volume in body.items.unwrap_or_default() {
            let Some(info) = volume.volume_info else {
                continue;
            };
            let found_title = info.title.as_deref().unwrap_or("");
            if !is_title_match(title, found_title) {
                continue;
            }
            if let Some(link) = info.image_links.as_ref().and_then(ImageLinks::best) {
                let polished = polish_image_url(link);
                debug!(cover = %polished, "cover found on Google Books");
                return Ok(Some(polished));
            }
        }
        Ok(None)
    }
}

/// Fixes the known malformations of volumes-API image URLs: the `zoom=1`
/// thumbnail parameter and plain-http transport.
fn polish_image_url(url: &str) -> String {
    let url = url.replace("zoom=1", "zoom=0");
    match url.strip_prefix("http://") {
        Some(rest) => format!("https://{rest}"),
        None => url,
    }
}
