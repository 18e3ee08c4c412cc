//! Catalog record parsing: structured feed first, markup soup as fallback.
//!
//! The catalog's responses range from clean OPDS/Atom to tag soup. The
//! structured pass ([`atom`]) is primary; the tolerant pass ([`soup`]) runs
//! only when the document is not well-formed XML. Both produce the same raw
//! shapes, which [`model::candidate_from_entry`] turns into [`Candidate`]s.

mod atom;
pub mod model;
mod soup;

pub use model::{
    ACQUISITION_RELS, Candidate, CategoryNode, DownloadTarget, IMAGE_RELS, RawEntry, RawLink,
    RelSet, UNKNOWN_AUTHOR, UNTITLED, candidate_from_entry, extract_external_id, format_from_mime,
};

use thiserror::Error;
use tracing::warn;

/// A parsed feed document: entries plus feed-level links (pagination,
/// search descriptors).
#[derive(Debug, Clone, Default)]
pub struct ParsedFeed {
    pub entries: Vec<RawEntry>,
    pub links: Vec<RawLink>,
}

/// A feed document neither parse path could make sense of.
///
/// This is the soft "protocol error" of the pipeline: navigators log it and
/// move to their next strategy rather than aborting the operation.
#[derive(Debug, Error)]
pub enum FeedError {
    /// The document is neither well-formed XML nor salvageable soup.
    #[error("malformed feed: {detail}")]
    Malformed {
        /// Parser diagnostic for the log.
        detail: String,
    },
}

impl FeedError {
    /// Creates a malformed-feed error.
    pub fn malformed(detail: impl Into<String>) -> Self {
        Self::Malformed {
            detail: detail.into(),
        }
    }
}

/// HTML entities the catalog leaks into its XML; replaced before the
/// structured pass so they do not force a soup fallback.
const LEAKED_ENTITIES: [(&str, &str); 6] = [
    ("&nbsp;", "\u{a0}"),
    ("&mdash;", "—"),
    ("&ndash;", "–"),
    ("&laquo;", "«"),
    ("&raquo;", "»"),
    ("&hellip;", "…"),
];

/// Parses one raw feed response.
///
/// Structured pass first; on XML failure the same text goes through the soup
/// pass. An empty feed is a valid outcome.
///
/// # Errors
///
/// Returns [`FeedError`] only when both passes produce nothing at all.
pub fn parse_feed(bytes: &[u8]) -> Result<ParsedFeed, FeedError> {
    let text = decode_feed_bytes(bytes);

    let mut cleaned = text.clone();
    for (entity, replacement) in LEAKED_ENTITIES {
        if cleaned.contains(entity) {
            cleaned = cleaned.replace(entity, replacement);
        }
    }

    match atom::parse_atom(&cleaned) {
        Ok(feed) => Ok(feed),
        Err(error) => {
            warn!(%error, "structured feed parse failed, trying markup soup");
            let feed = soup::parse_soup(&text);
            if feed.entries.is_empty() && feed.links.is_empty() {
                Err(error)
            } else {
                Ok(feed)
            }
        }
    }
}

/// Decodes feed bytes to text: strict UTF-8 first, then detector verdict,
/// then lossy UTF-8. Feeds are metadata-sized, so buffering is fine.
fn decode_feed_bytes(bytes: &[u8]) -> String {
    if let Ok(text) = std::str::from_utf8(bytes) {
        return text.to_string();
    }
    let (charset, _, _) = chardet::detect(bytes);
    if let Some(encoding) =
        encoding_rs::Encoding::for_label(chardet::charset2encoding(&charset).as_bytes())
    {
        let (decoded, _, had_errors) = encoding.decode(bytes);
        if !had_errors {
            return decoded.into_owned();
        }
    }
    String::from_utf8_lossy(bytes).into_owned()
}
