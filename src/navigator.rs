//! Catalog navigation: search and browse-by-category.
//!
//! Composes [`CatalogClient`] and the feed parsers. Strategies are ordered
//! and each is independently guarded: a malformed feed or a failed sub-feed
//! request is logged and the next strategy is tried; only root-level network
//! failures surface to the caller. An empty result list is a valid outcome.

use std::collections::HashSet;

use once_cell::sync::Lazy;
use scraper::{ElementRef, Html, Selector};
use tracing::{debug, instrument, warn};

use crate::catalog::{CatalogClient, CatalogError};
use crate::feed::{
    Candidate, CategoryNode, ParsedFeed, RawEntry, candidate_from_entry, parse_feed,
};

/// Entry titles marking the book-search sub-feed in the navigational
/// search response. Author-search entries do not match and are skipped.
const BOOK_SEARCH_LABELS: [&str; 2] = ["Поиск книг", "Search books"];

/// Entry titles preferred when descending into subcategories with the
/// popularity flag set.
const POPULARITY_LABELS: [&str; 4] = ["Популярные", "популярности", "Popular", "popularity"];

/// OPDS catalog media type prefix expected on search sub-feed links.
const OPDS_CATALOG_MIME: &str = "application/atom+xml";

/// Ceiling on subcategory descent; guards against unexpected feed structure.
const MAX_BROWSE_DEPTH: usize = 5;

/// Ceiling on pagination follow-ups per search sub-feed.
const MAX_SEARCH_PAGES: usize = 10;

/// High-level catalog operations over one client session.
#[derive(Debug, Clone)]
pub struct CatalogNavigator {
    client: CatalogClient,
}

impl CatalogNavigator {
    /// Creates a navigator over the given catalog session.
    #[must_use]
    pub fn new(client: CatalogClient) -> Self {
        Self { client }
    }

    /// Searches the catalog, preserving server order, up to `limit` results.
    ///
    /// The root search feed is navigational: its entries link to dedicated
    /// book/author search sub-feeds. Book-search links are discovered by
    /// title, re-requested with the query substituted, and paginated only
    /// while below `limit`.
    ///
    /// # Errors
    ///
    /// Returns [`CatalogError`] when the root search feed cannot be fetched,
    /// or when every discovered sub-feed fails and nothing was collected.
    #[instrument(skip(self), fields(query = %query, limit))]
    pub async fn search(&self, query: &str, limit: usize) -> Result<Vec<Candidate>, CatalogError> {
        if limit == 0 {
            return Ok(Vec::new());
        }
        let encoded = urlencoding::encode(query);
        let root_url = self
            .client
            .resolve_href(&format!("/opds/search?searchTerm={encoded}"))?;

        let bytes = self.client.get_feed(&root_url).await?;
        let feed = match parse_feed(&bytes) {
            Ok(feed) => feed,
            Err(error) => {
                warn!(%error, "search root feed unparseable");
                return Ok(Vec::new());
            }
        };

        let search_links = discover_book_search_links(&feed);
        if search_links.is_empty() {
            // Already a result feed; parse entries directly.
            debug!("no search links discovered, treating root feed as results");
            return Ok(self.candidates_from(&feed, limit));
        }

        let mut candidates = Vec::new();
        let mut last_error: Option<CatalogError> = None;

        for href in search_links {
            if candidates.len() >= limit {
                break;
            }
            let url = match self.client.resolve_href(&href) {
                Ok(url) => substitute_query(&url, query),
                Err(error) => {
                    warn!(%error, %href, "unresolvable search link");
                    continue;
                }
            };
            if let Err(error) = self
                .collect_search_pages(&url, limit, &mut candidates)
                .await
            {
                warn!(%error, %url, "search sub-feed failed, trying next link");
                last_error = Some(error);
            }
        }

        if candidates.is_empty()
            && let Some(error) = last_error
        {
            return Err(error);
        }
        Ok(candidates)
    }

    /// Follows one search sub-feed plus its `rel="next"` pages while below
    /// the limit.
    async fn collect_search_pages(
        &self,
        first_url: &str,
        limit: usize,
        candidates: &mut Vec<Candidate>,
    ) -> Result<(), CatalogError> {
        let mut url = first_url.to_string();
        let mut seen: HashSet<String> = HashSet::new();

        for _ in 0..MAX_SEARCH_PAGES {
            if candidates.len() >= limit || !seen.insert(url.clone()) {
                break;
            }
            let bytes = self.client.get_feed(&url).await?;
            let feed = match parse_feed(&bytes) {
                Ok(feed) => feed,
                Err(error) => {
                    warn!(%error, %url, "search result feed unparseable");
                    break;
                }
            };

            for entry in &feed.entries {
                if candidates.len() >= limit {
                    break;
                }
                if let Some(candidate) = candidate_from_entry(entry, self.client.root()) {
                    candidates.push(candidate);
                }
            }

            match next_page_link(&feed).and_then(|href| self.client.resolve_href(&href).ok()) {
                Some(next) => url = next,
                None => break,
            }
        }
        Ok(())
    }

    /// Browses a category by URL or free-text name, up to `limit` books.
    ///
    /// A name is resolved against the fetched category listing
    /// (case-insensitive substring); when nothing matches, the name degrades
    /// to a full-text search. Category feeds holding subcategories are
    /// descended one level at a time, preferring a popularity-titled child
    /// when `popular` is set, guarded by a visited set and a depth ceiling.
    ///
    /// # Errors
    ///
    /// Returns [`CatalogError`] on network failure.
    #[instrument(skip(self), fields(category = %category, popular, limit))]
    pub async fn browse(
        &self,
        category: &str,
        popular: bool,
        limit: usize,
    ) -> Result<Vec<Candidate>, CatalogError> {
        if limit == 0 {
            return Ok(Vec::new());
        }
        let url = if category.starts_with("http") {
            category.to_string()
        } else {
            let listing = self.categories().await?;
            let lowered = category.to_lowercase();
            match listing
                .into_iter()
                .find(|node| node.name.to_lowercase().contains(&lowered))
            {
                Some(node) => node.url,
                None => {
                    debug!("no category matches name, degrading to full-text search");
                    return self.search(category, limit).await;
                }
            }
        };

        self.browse_url(&url, popular, limit).await
    }

    async fn browse_url(
        &self,
        url: &str,
        popular: bool,
        limit: usize,
    ) -> Result<Vec<Candidate>, CatalogError> {
        let mut visited: HashSet<String> = HashSet::new();
        let mut current = normalize_category_url(url);

        for _ in 0..MAX_BROWSE_DEPTH {
            if !visited.insert(current.clone()) {
                warn!(url = %current, "category loop detected");
                break;
            }

            let bytes = self.client.get_feed(&current).await?;
            let feed = match parse_feed(&bytes) {
                Ok(feed) => feed,
                Err(error) => {
                    warn!(%error, url = %current, "category feed unparseable");
                    return Ok(Vec::new());
                }
            };

            let Some(first) = feed.entries.first() else {
                return Ok(Vec::new());
            };

            // An author sub-element on the first entry means the feed already
            // contains books; otherwise it lists subcategories.
            if first.author.is_some() {
                return Ok(self.candidates_from(&feed, limit));
            }

            match pick_subcategory(&feed.entries, popular)
                .and_then(|href| self.client.resolve_href(&href).ok())
            {
                Some(next) => {
                    debug!(from = %current, to = %next, "descending into subcategory");
                    current = next;
                }
                None => return Ok(Vec::new()),
            }
        }

        Ok(Vec::new())
    }

    /// Fetches the full category/genre listing.
    ///
    /// # Errors
    ///
    /// Returns [`CatalogError`] on network failure; a malformed listing is
    /// logged and yields an empty list.
    #[instrument(skip(self))]
    pub async fn categories(&self) -> Result<Vec<CategoryNode>, CatalogError> {
        let url = self.client.resolve_href("/opds/genres")?;
        let bytes = self.client.get_feed(&url).await?;
        let feed = match parse_feed(&bytes) {
            Ok(feed) => feed,
            Err(error) => {
                warn!(%error, "genre listing unparseable");
                return Ok(Vec::new());
            }
        };

        let mut nodes = Vec::new();
        for entry in &feed.entries {
            let Some(name) = entry.title.as_deref().map(str::trim).filter(|t| !t.is_empty())
            else {
                continue;
            };
            let Some(url) = entry
                .links
                .iter()
                .filter_map(|l| l.href.as_deref())
                .find_map(|href| self.client.resolve_href(href).ok())
            else {
                continue;
            };
            nodes.push(CategoryNode {
                id: name.to_lowercase().replace(' ', "_"),
                name: name.to_string(),
                url,
            });
        }
        debug!(count = nodes.len(), "categories listed");
        Ok(nodes)
    }

    /// Scrapes the annotation section of a book page by external id.
    ///
    /// # Errors
    ///
    /// Returns [`CatalogError`] on network failure; a page without an
    /// annotation section yields `None`.
    #[instrument(skip(self), fields(external_id = %external_id))]
    pub async fn annotation(&self, external_id: &str) -> Result<Option<String>, CatalogError> {
        let url = self.client.resolve_href(&format!("/b/{external_id}"))?;
        let bytes = self.client.get_feed(&url).await?;
        // Book pages come back in whatever encoding the catalog feels like.
        let (html, _) = crate::content::decode_text(&bytes);
        Ok(extract_annotation(&html))
    }

    fn candidates_from(&self, feed: &ParsedFeed, limit: usize) -> Vec<Candidate> {
        feed.entries
            .iter()
            .filter_map(|entry| candidate_from_entry(entry, self.client.root()))
            .take(limit)
            .collect()
    }
}

/// Hrefs of entries labelled as book search, in feed order.
fn discover_book_search_links(feed: &ParsedFeed) -> Vec<String> {
    let mut links = Vec::new();
    for entry in &feed.entries {
        let Some(title) = entry.title.as_deref() else {
            continue;
        };
        if !BOOK_SEARCH_LABELS.iter().any(|label| title.contains(label)) {
            continue;
        }
        let href = entry.links.iter().find_map(|link| {
            let catalog_typed = link
                .mime
                .as_deref()
                .is_some_and(|m| m.starts_with(OPDS_CATALOG_MIME));
            if catalog_typed { link.href.clone() } else { None }
        });
        if let Some(href) = href {
            links.push(href);
        }
    }
    links
}

/// Substitutes the search term into a discovered sub-feed URL.
fn substitute_query(url: &str, query: &str) -> String {
    let encoded = urlencoding::encode(query);
    if !url.contains('?') {
        format!("{url}?searchTerm={encoded}")
    } else if !url.contains("searchTerm=") {
        format!("{url}&searchTerm={encoded}")
    } else {
        url.to_string()
    }
}

/// Feed-level `rel="next"` pagination link, when present.
fn next_page_link(feed: &ParsedFeed) -> Option<String> {
    feed.links
        .iter()
        .find(|link| link.rels.contains_any(&["next"]))
        .and_then(|link| link.href.clone())
}

/// Rewrites a plain category URL into its OPDS form (`/g/…` → `/opds/g/…`),
/// the shape the catalog actually serves feeds from.
fn normalize_category_url(url: &str) -> String {
    if url.contains("/g/") && !url.contains("/opds") {
        url.replace("/g/", "/opds/g/")
    } else {
        url.to_string()
    }
}

/// Picks the subcategory href to descend into: a popularity-titled entry
/// when preferred, else the first entry with a navigable link.
fn pick_subcategory(entries: &[RawEntry], popular: bool) -> Option<String> {
    let linked_href = |entry: &RawEntry| {
        entry
            .links
            .iter()
            .find_map(|link| link.href.clone().filter(|h| !h.is_empty()))
    };

    if popular {
        let preferred = entries.iter().find(|entry| {
            entry
                .title
                .as_deref()
                .is_some_and(|t| POPULARITY_LABELS.iter().any(|label| t.contains(label)))
        });
        if let Some(href) = preferred.and_then(linked_href) {
            return Some(href);
        }
    }
    entries.iter().find_map(linked_href)
}

#[allow(clippy::expect_used)]
static ANNOTATION_HEADINGS: Lazy<Selector> =
    Lazy::new(|| Selector::parse("h2").expect("static selector is valid"));

/// Pulls the annotation paragraphs that follow the `Аннотация` heading on a
/// book page, double-newline-joined.
#[must_use]
pub fn extract_annotation(html: &str) -> Option<String> {
    let document = Html::parse_document(html);
    let heading = document
        .select(&ANNOTATION_HEADINGS)
        .find(|h| h.text().collect::<String>().trim() == "Аннотация")?;

    let mut paragraphs = Vec::new();
    for sibling in heading.next_siblings() {
        if let Some(element) = ElementRef::wrap(sibling) {
            let name = element.value().name();
            if matches!(name, "h1" | "h2" | "h3" | "h4" | "h5" | "h6") {
                break;
            }
            if name == "p" {
                let text = element.text().collect::<String>().trim().to_string();
                if !text.is_empty() && text != "\u{a0}" {
                    paragraphs.push(text);
                }
            }
        } else if let Some(text) = sibling.value().as_text() {
            let text = text.trim();
            if !text.is_empty() && text != "\u{a0}" {
                paragraphs.push(text.to_string());
            }
        }
    }

    (!paragraphs.is_empty()).then(|| paragraphs.join("\n\n"))
}
