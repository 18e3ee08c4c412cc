//! Content acquisition and decoding.
//!
//! One state machine per fetch: pick a download target, stream it under the
//! size cap, sniff for archive wrapping, extract the right inner file, then
//! decode by format. The decode half never raises past this module — every
//! payload ends as text (possibly Degraded) or an explicit
//! `FormatUnavailable`/`SizeExceeded`.

mod archive;
mod decode;
mod error;
mod select;

pub use archive::{InnerFile, extract_inner, format_from_name, is_zip};
pub use decode::{decode_text, extract_epub_text, extract_fb2_text, to_base64, visible_text};
pub use error::{ContentKind, DecodeQuality, DecodedContent, FetchError};
pub use select::select_target;

use futures_util::StreamExt;
use tracing::{debug, instrument, warn};

use crate::catalog::{CatalogClient, CatalogError};
use crate::config::IngestConfig;
use crate::feed::Candidate;

/// Nested-archive ceiling; past this the payload is treated as opaque.
const MAX_ARCHIVE_DEPTH: u8 = 3;

/// Downloads and decodes candidate content.
#[derive(Debug, Clone)]
pub struct ContentResolver {
    client: CatalogClient,
    max_content_bytes: u64,
}

impl ContentResolver {
    /// Creates a resolver sharing the given catalog session.
    #[must_use]
    pub fn new(client: CatalogClient, config: &IngestConfig) -> Self {
        Self {
            client,
            max_content_bytes: config.max_content_bytes,
        }
    }

    /// Fetches one candidate in the preferred format.
    ///
    /// # Errors
    ///
    /// [`FetchError::FormatUnavailable`] when no target matches the
    /// preference or the fallback list, [`FetchError::SizeExceeded`] when the
    /// payload trips the byte ceiling, [`FetchError::Catalog`] on network
    /// failure. Decode problems never error — they degrade (see
    /// [`DecodeQuality`]).
    #[instrument(skip(self, candidate), fields(title = %candidate.title, preferred = %preferred_format))]
    pub async fn fetch(
        &self,
        candidate: &Candidate,
        preferred_format: &str,
    ) -> Result<DecodedContent, FetchError> {
        let target = select_target(&candidate.targets, preferred_format)
            .ok_or_else(|| FetchError::format_unavailable(&candidate.title))?;

        debug!(format = %target.format, url = %target.url, "selected download target");
        let bytes = self.download(&target.url).await?;

        let content = decode_payload(&bytes, &target.format, 0);
        if let DecodeQuality::Degraded { reason } = &content.quality {
            warn!(%reason, title = %candidate.title, "decode degraded");
        }
        Ok(content)
    }

    /// Streams a URL into memory, enforcing the byte ceiling both against the
    /// declared content-length (fast reject) and incrementally mid-transfer,
    /// since length headers may be absent or wrong.
    async fn download(&self, url: &str) -> Result<Vec<u8>, FetchError> {
        let response = self.client.get_content_response(url).await?;

        if let Some(declared) = response.content_length()
            && declared > self.max_content_bytes
        {
            return Err(FetchError::size_exceeded(self.max_content_bytes, declared));
        }

        let mut data: Vec<u8> = Vec::new();
        let mut stream = response.bytes_stream();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(|e| CatalogError::network(url, e))?;
            let total = data.len() as u64 + chunk.len() as u64;
            if total > self.max_content_bytes {
                return Err(FetchError::size_exceeded(self.max_content_bytes, total));
            }
            data.extend_from_slice(&chunk);
        }
        debug!(bytes = data.len(), "content downloaded");
        Ok(data)
    }
}

/// Strips the archive suffix from a format tag (`fb2+zip` → `fb2`).
fn base_format(format: &str) -> &str {
    format.split('+').next().unwrap_or(format)
}

/// The decode state machine: *archive?* → unwrap inner file → decode by
/// format. Pure and total; unexpected shapes degrade to lossy text rather
/// than propagate.
#[must_use]
pub fn decode_payload(bytes: &[u8], declared_format: &str, depth: u8) -> DecodedContent {
    let base = base_format(declared_format);

    // An epub is itself a zip container; unwrapping applies only to payloads
    // that are not expected to be archives.
    if is_zip(bytes) && base != "epub" && depth < MAX_ARCHIVE_DEPTH {
        match extract_inner(bytes, base) {
            Ok(inner) => {
                let next = inner.format.clone().unwrap_or_else(|| base.to_string());
                debug!(member = %inner.name, format = %next, "unwrapped archive member");
                return decode_payload(&inner.bytes, &next, depth + 1);
            }
            Err(reason) => {
                warn!(%reason, "archive unwrap failed");
                return lossy(bytes, base, reason);
            }
        }
    }

    match base {
        "fb2" => {
            let (text, quality) = decode_text(bytes);
            match extract_fb2_text(&text) {
                Ok(extracted) => DecodedContent {
                    text: extracted,
                    format: "fb2".to_string(),
                    kind: ContentKind::PlainText,
                    quality,
                },
                Err(reason) => DecodedContent {
                    text,
                    format: "fb2".to_string(),
                    kind: ContentKind::PlainText,
                    quality: DecodeQuality::Degraded { reason },
                },
            }
        }
        "txt" => {
            let (text, quality) = decode_text(bytes);
            DecodedContent {
                text,
                format: "txt".to_string(),
                kind: ContentKind::PlainText,
                quality,
            }
        }
        "epub" => match extract_epub_text(bytes) {
            Ok(text) => DecodedContent {
                text,
                format: "epub".to_string(),
                kind: ContentKind::PlainText,
                quality: DecodeQuality::Clean,
            },
            Err(reason) => lossy(bytes, "epub", reason),
        },
        other => DecodedContent {
            text: to_base64(bytes),
            format: other.to_string(),
            kind: ContentKind::Base64Binary,
            quality: DecodeQuality::Clean,
        },
    }
}

fn lossy(bytes: &[u8], format: &str, reason: String) -> DecodedContent {
    DecodedContent {
        text: String::from_utf8_lossy(bytes).into_owned(),
        format: format.to_string(),
        kind: ContentKind::PlainText,
        quality: DecodeQuality::Degraded { reason },
    }
}
