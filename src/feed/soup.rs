//! Tolerant markup-soup fallback parsing.
//!
//! The catalog occasionally answers feed requests with tag soup that no XML
//! reader accepts. This pass runs the same extraction over an HTML5 parse,
//! which never rejects its input. Triggered only when the structured pass
//! fails.

use once_cell::sync::Lazy;
use scraper::{ElementRef, Html, Selector};

use super::model::{RawEntry, RawLink};
use super::ParsedFeed;

#[allow(clippy::expect_used)]
fn selector(css: &str) -> Selector {
    Selector::parse(css).expect("static selector is valid")
}

static ENTRY: Lazy<Selector> = Lazy::new(|| selector("entry"));
static TITLE: Lazy<Selector> = Lazy::new(|| selector("title"));
static AUTHOR_NAME: Lazy<Selector> = Lazy::new(|| selector("author name"));
static SUMMARY: Lazy<Selector> = Lazy::new(|| selector("summary, content"));
static CATEGORY: Lazy<Selector> = Lazy::new(|| selector("category"));
static LINK: Lazy<Selector> = Lazy::new(|| selector("link"));

/// Parses tag soup into the same raw shape the structured pass produces.
///
/// Never fails; unrecognizable documents simply yield an empty feed.
#[must_use]
pub fn parse_soup(text: &str) -> ParsedFeed {
    let document = Html::parse_document(text);
    let mut feed = ParsedFeed::default();

    for entry_el in document.select(&ENTRY) {
        feed.entries.push(parse_entry(entry_el));
    }

    // Feed-level links: any link outside an entry (pagination and search
    // descriptors live here).
    for link_el in document.select(&LINK) {
        let inside_entry = link_el
            .ancestors()
            .filter_map(ElementRef::wrap)
            .any(|a| a.value().name() == "entry");
        if !inside_entry {
            feed.links.push(parse_link(link_el));
        }
    }

    feed
}

fn parse_entry(entry_el: ElementRef<'_>) -> RawEntry {
    let mut entry = RawEntry {
        title: first_text(entry_el, &TITLE),
        author: first_text(entry_el, &AUTHOR_NAME),
        summary: first_text(entry_el, &SUMMARY),
        ..RawEntry::default()
    };

    for category_el in entry_el.select(&CATEGORY) {
        let value = category_el
            .value()
            .attr("term")
            .or_else(|| category_el.value().attr("label"));
        if let Some(value) = value
            && !value.is_empty()
        {
            entry.categories.push(value.to_string());
        }
    }

    for link_el in entry_el.select(&LINK) {
        entry.links.push(parse_link(link_el));
    }

    entry
}

fn parse_link(link_el: ElementRef<'_>) -> RawLink {
    let mut link = RawLink::default();
    if let Some(rel) = link_el.value().attr("rel") {
        link.rels.push_raw(rel);
    }
    link.href = link_el.value().attr("href").map(String::from);
    link.mime = link_el.value().attr("type").map(String::from);
    link
}

fn first_text(scope: ElementRef<'_>, sel: &Selector) -> Option<String> {
    scope.select(sel).next().and_then(|el| {
        let text = el.text().collect::<String>().trim().to_string();
        (!text.is_empty()).then_some(text)
    })
}
