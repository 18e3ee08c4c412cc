//! Open Library cover lookup.
//!
//! Queries the search endpoint by title and author, fuzzy matches result
//! titles, and builds the image URL from the provider's native cover-id
//! scheme.

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use tracing::debug;

use crate::config::IngestConfig;
use crate::cover::matching::is_title_match;

use super::{CoverError, CoverProvider, build_provider_client};

const REQUEST_TIMEOUT_SECS: u64 = 10;
const MAX_RESULTS: u8 = 5;

#[derive(Debug, Deserialize)]
pub(crate) struct SearchResponse {
    #[serde(default)]
    pub docs: Vec<Doc>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct Doc {
    pub title: Option<String>,
    pub cover_i: Option<i64>,
}

/// Cover lookup via the Open Library search API.
pub struct OpenLibraryProvider {
    client: Client,
    base_url: String,
    covers_url: String,
}

impl OpenLibraryProvider {
    /// Creates a provider from the ingest configuration.
    ///
    /// # Errors
    ///
    /// Returns [`CoverError`] when HTTP client construction fails.
    pub fn new(config: &IngestConfig) -> Result<Self, CoverError> {
        Self::with_base_urls(
            &config.open_library_endpoint,
            &config.open_library_covers_endpoint,
        )
    }

    /// Creates a provider against custom endpoints (for testing with
    /// wiremock).
    ///
    /// # Errors
    ///
    /// Returns [`CoverError`] when HTTP client construction fails.
    pub fn with_base_urls(
        base_url: impl Into<String>,
        covers_url: impl Into<String>,
    ) -> Result<Self, CoverError> {
        let client = build_provider_client(REQUEST_TIMEOUT_SECS)
            .map_err(|e| CoverError::provider("open-library", e.to_string()))?;
        Ok(Self {
            client,
            base_url: base_url.into(),
            covers_url: covers_url.into(),
        })
    }
}

impl std::fmt::Debug for OpenLibraryProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenLibraryProvider")
            .field("base_url", &self.base_url)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl CoverProvider for OpenLibraryProvider {
    fn name(&self) -> &str {
        "open-library"
    }

    async fn find_cover(
        &self,
        title: &str,
        author: Option<&str>,
        _external_id: Option<&str>,
    ) -> Result<Option<String>, CoverError> {
        let mut query = title.to_string();
        if let Some(author) = author {
            query.push(' ');
            query.push_str(author);
        }
        let url = format!(
            "{}/search.json?q={}&limit={MAX_RESULTS}",
            self.base_url,
            urlencoding::encode(&query)
        );

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| CoverError::provider("open-library", e.to_string()))?;
        if !response.status().is_success() {
            return Err(CoverError::provider(
                "open-library",
                format!("HTTP {}", response.status().as_u16()),
            ));
        }
        let body: SearchResponse = response
            .json()
            .await
            .map_err(|e| CoverError::provider("open-library", e.to_string()))?;

        for doc in body.docs {
            let found_title = doc.title.as_deref().unwrap_or("");
            if !is_title_match(title, found_title) {
                continue;
            }
            if let Some(cover_id) = doc.cover_i {
                // Size L is the largest the covers endpoint serves.
                let url = format!("{}/b/id/{cover_id}-L.jpg", self.covers_url);
                debug!(cover = %url, "cover found on Open Library");
                return Ok(Some(url));
            }
        }
        Ok(None)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_response_parses_docs() {
        let body: SearchResponse = serde_json::from_str(
            r#"{"docs":[{"title":"Анна Каренина","cover_i":1234,"extra":"ignored"}]}"#,
        )
        .unwrap();
        assert_eq!(body.docs.len(), 1);
        assert_eq!(body.docs[0].cover_i, Some(1234));
    }

    #[test]
    fn test_response_tolerates_missing_docs() {
        let body: SearchResponse = serde_json::from_str("{}").unwrap();
        assert!(body.docs.is_empty());
    }

    #[test]
    fn test_cover_url_scheme() {
        let url = format!("{}/b/id/{}-L.jpg", "https://covers.openlibrary.org", 97);
        assert_eq!(url, "https://covers.openlibrary.org/b/id/97-L.jpg");
    }
}
