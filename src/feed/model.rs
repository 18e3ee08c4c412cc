//! Normalized catalog records and the raw shapes both parse paths produce.

use url::Url;

/// Link relations marking a downloadable document payload.
pub const ACQUISITION_RELS: [&str; 2] = [
    "http://opds-spec.org/acquisition",
    "http://opds-spec.org/acquisition/open-access",
];

/// Link relations marking cover imagery.
pub const IMAGE_RELS: [&str; 2] = [
    "http://opds-spec.org/image",
    "http://opds-spec.org/image/thumbnail",
];

/// Sentinel title for entries without one.
pub const UNTITLED: &str = "Untitled";

/// Sentinel author for entries without one.
pub const UNKNOWN_AUTHOR: &str = "Unknown author";

/// Path marker preceding the numeric external id in download URLs.
const ID_MARKER: &str = "/b/";

/// An ordered set of relation strings.
///
/// Origin nodes express `rel` as a scalar, a space-separated list, or a
/// repeated attribute; everything is normalized into this one shape at the
/// parse boundary before any matching logic runs.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RelSet(Vec<String>);

impl RelSet {
    /// Creates an empty set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds one raw attribute value, splitting on whitespace; duplicates are
    /// dropped, first-seen order kept.
    pub fn push_raw(&mut self, raw: &str) {
        for token in raw.split_whitespace() {
            if !self.0.iter().any(|r| r == token) {
                self.0.push(token.to_string());
            }
        }
    }

    /// Whether any relation equals any of the given values.
    #[must_use]
    pub fn contains_any(&self, values: &[&str]) -> bool {
        self.0.iter().any(|r| values.contains(&r.as_str()))
    }

    /// Whether the set is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Relations in first-seen order.
    #[must_use]
    pub fn as_slice(&self) -> &[String] {
        &self.0
    }
}

/// One link as produced by either parse path, before interpretation.
#[derive(Debug, Clone, Default)]
pub struct RawLink {
    pub rels: RelSet,
    pub href: Option<String>,
    pub mime: Option<String>,
}

/// One catalog entry as produced by either parse path, before
/// interpretation. May describe a book, a category, or a navigation node.
#[derive(Debug, Clone, Default)]
pub struct RawEntry {
    pub title: Option<String>,
    pub author: Option<String>,
    pub summary: Option<String>,
    pub categories: Vec<String>,
    pub links: Vec<RawLink>,
}

/// A downloadable payload variant of a [`Candidate`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadTarget {
    /// Short format tag (`fb2`, `epub`, `mobi`, `txt`, `pdf`, or the MIME
    /// subtype for anything else; archived variants keep their suffix, e.g.
    /// `fb2+zip`).
    pub format: String,
    /// Absolute download URL.
    pub url: String,
    /// MIME type as declared by the catalog.
    pub mime: String,
}

/// A discovered book, normalized, prior to content fetch.
///
/// Invariant: `targets` is never empty. Nodes without an acquisition link are
/// rejected during parsing and never become Candidates.
#[derive(Debug, Clone)]
pub struct Candidate {
    pub title: String,
    pub author: String,
    pub description: Option<String>,
    /// Genre terms in feed order.
    pub genres: Vec<String>,
    pub targets: Vec<DownloadTarget>,
    /// Numeric id extracted from a download URL, when present.
    pub external_id: Option<String>,
    /// MIME-confirmed cover URL from the feed, when present.
    pub cover_url: Option<String>,
}

impl Candidate {
    /// Genre terms comma-joined, the shape the surrounding application
    /// stores.
    #[must_use]
    pub fn genre(&self) -> String {
        self.genres.join(", ")
    }
}

/// A category/genre node; leaf or non-leaf is unknown until fetched.
/// Ephemeral, never persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CategoryNode {
    pub id: String,
    pub name: String,
    pub url: String,
}

/// Maps a declared MIME type to the short format tag.
///
/// Fixed table for the formats the catalog serves; anything else falls back
/// to the MIME subtype (which is how archived variants like
/// `application/fb2+zip` keep their `fb2+zip` tag).
#[must_use]
pub fn format_from_mime(mime: &str) -> String {
    let essence = mime.split(';').next().unwrap_or("").trim();
    match essence {
        "application/fb2+xml" => "fb2".to_string(),
        "application/epub+zip" => "epub".to_string(),
        "application/x-mobipocket-ebook" => "mobi".to_string(),
        "text/plain" => "txt".to_string(),
        "application/pdf" => "pdf".to_string(),
        other => other
            .rsplit('/')
            .next()
            .unwrap_or(other)
            .trim_start_matches("x-")
            .to_string(),
    }
}

/// Extracts the external id: the first purely-numeric path segment following
/// the `/b/` marker in any of the given URLs.
#[must_use]
pub fn extract_external_id<'a>(urls: impl IntoIterator<Item = &'a str>) -> Option<String> {
    for url in urls {
        if let Some(tail) = url.split(ID_MARKER).nth(1) {
            let segment = tail.split('/').next().unwrap_or("");
            if !segment.is_empty() && segment.bytes().all(|b| b.is_ascii_digit()) {
                return Some(segment.to_string());
            }
        }
    }
    None
}

/// Interprets one raw entry as a book, or rejects it as a structural node.
///
/// Returns `None` (not an error) for entries without an acquisition link:
/// those are categories or navigation headers. Relative hrefs are resolved
/// against `base`.
#[must_use]
pub fn candidate_from_entry(entry: &RawEntry, base: &Url) -> Option<Candidate> {
    let has_acquisition = entry
        .links
        .iter()
        .any(|l| l.rels.contains_any(&ACQUISITION_RELS));
    if !has_acquisition {
        return None;
    }

    let mut targets = Vec::new();
    let mut cover_url = None;

    for link in &entry.links {
        let Some(href) = link.href.as_deref() else {
            continue;
        };
        let Ok(resolved) = base.join(href) else {
            continue;
        };
        let mime = link.mime.clone().unwrap_or_default();

        if link.rels.contains_any(&ACQUISITION_RELS) {
            targets.push(DownloadTarget {
                format: format_from_mime(&mime),
                url: resolved.to_string(),
                mime,
            });
        } else if cover_url.is_none()
            && link.rels.contains_any(&IMAGE_RELS)
            && mime.starts_with("image/")
        {
            cover_url = Some(resolved.to_string());
        }
    }

    // An acquisition rel without a usable href leaves nothing to download.
    if targets.is_empty() {
        return None;
    }

    let external_id = extract_external_id(targets.iter().map(|t| t.url.as_str()));

    let title = entry
        .title
        .as_deref()
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .unwrap_or(UNTITLED)
        .to_string();
    let author = entry
        .author
        .as_deref()
        .map(str::trim)
        .filter(|a| !a.is_empty())
        .unwrap_or(UNKNOWN_AUTHOR)
        .to_string();
    let description = entry
        .summary
        .as_deref()
        .map(str::trim)
        .filter(|d| !d.is_empty())
        .map(String::from);

    Some(Candidate {
        title,
        author,
        description,
        genres: entry.categories.clone(),
        targets,
        external_id,
        cover_url,
    })
}
