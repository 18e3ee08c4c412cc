//! Direct cover probing against the origin's clearnet mirrors.
//!
//! When a candidate carries an external id, its cover usually sits at one of
//! a handful of well-known image paths. Lightweight HEAD probes find it
//! without involving any bibliographic API. This provider uses its own
//! direct client — mirror traffic never goes through the catalog tunnel.

use async_trait::async_trait;
use reqwest::Client;
use reqwest::header::CONTENT_TYPE;
use tracing::debug;

use super::{CoverError, CoverProvider, build_provider_client};

/// Probe timeout; these are existence checks, not downloads.
const PROBE_TIMEOUT_SECS: u64 = 5;

/// Plausible cover paths, probed in order. `{id}` is the external id.
const PATH_TEMPLATES: [&str; 6] = [
    "/i/0/{id}/cover.jpg",
    "/i/{id}/cover.jpg",
    "/covers/{id}.jpg",
    "/i/book/{id}.jpg",
    "/img/book/{id}.jpg",
    "/static/covers/{id}.jpg",
];

/// Probes id-derived image paths on each configured mirror.
pub struct DirectProbeProvider {
    client: Client,
    mirrors: Vec<String>,
}

impl DirectProbeProvider {
    /// Creates a probe provider over the given mirror hosts.
    ///
    /// # Errors
    ///
    /// Returns [`CoverError`] when HTTP client construction fails.
    pub fn new(mirrors: Vec<String>) -> Result<Self, CoverError> {
        let client = build_provider_client(PROBE_TIMEOUT_SECS)
            .map_err(|e| CoverError::provider("direct-probe", e.to_string()))?;
        Ok(Self { client, mirrors })
    }
}

impl std::fmt::Debug for DirectProbeProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DirectProbeProvider")
            .field("mirrors", &self.mirrors)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl CoverProvider for DirectProbeProvider {
    fn name(&self) -> &str {
        "direct-probe"
    }

    async fn find_cover(
        &self,
        _title: &str,
        _author: Option<&str>,
        external_id: Option<&str>,
    ) -> Result<Option<String>, CoverError> {
        let Some(id) = external_id else {
            return Ok(None);
        };

        for mirror in &self.mirrors {
            let host = mirror.trim_end_matches('/');
            for template in PATH_TEMPLATES {
                let url = format!("{host}{}", template.replace("{id}", id));
                // Per-URL failures just move the probe along.
                let Ok(response) = self.client.head(&url).send().await else {
                    continue;
                };
                if !response.status().is_success() {
                    continue;
                }
                let is_image = response
                    .headers()
                    .get(CONTENT_TYPE)
                    .and_then(|v| v.to_str().ok())
                    .is_some_and(|ct| ct.starts_with("image/"));
                if is_image {
                    debug!(%url, "cover found by direct probe");
                    return Ok(Some(url));
                }
            }
        }
        Ok(None)
    }
}
