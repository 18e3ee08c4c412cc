//! Structured Atom/OPDS feed parsing.
//!
//! Event-driven rather than serde-derived: origin feeds are only loosely
//! Atom-shaped, so the reader tolerates unknown elements, arbitrary nesting
//! inside text fields, and repeated `rel` attributes. A hard XML error aborts
//! the pass and the caller falls back to the markup-soup parser.

use quick_xml::Reader;
use quick_xml::events::{BytesStart, Event};

use super::model::{RawEntry, RawLink};
use super::{FeedError, ParsedFeed};

/// Which text field is currently being captured.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Field {
    Title,
    AuthorName,
    Summary,
}

/// Parses one feed document into raw entries plus feed-level links.
///
/// # Errors
///
/// Returns [`FeedError::Malformed`] when the document is not well-formed
/// XML; entry-level oddities never fail the whole document.
pub fn parse_atom(text: &str) -> Result<ParsedFeed, FeedError> {
    // Whitespace is kept as-is while reading: captured fields are trimmed at
    // assignment, and trimming per text event would glue together text split
    // around nested markup.
    let mut reader = Reader::from_str(text);

    let mut feed = ParsedFeed::default();
    let mut entry: Option<RawEntry> = None;
    let mut in_author = false;
    // (element local name, target field, accumulated text)
    let mut capture: Option<(Vec<u8>, Field, String)> = None;

    loop {
        match reader.read_event() {
            Err(e) => return Err(FeedError::malformed(e.to_string())),
            Ok(Event::Eof) => break,

            Ok(Event::Start(e)) => {
                if capture.is_some() {
                    // Markup nested inside a text field (summary type="html"
                    // and the like); keep accumulating.
                    continue;
                }
                match e.local_name().as_ref() {
                    b"entry" => entry = Some(RawEntry::default()),
                    b"author" if entry.is_some() => in_author = true,
                    b"title" if entry.is_some() => {
                        capture = Some((b"title".to_vec(), Field::Title, String::new()));
                    }
                    b"name" if in_author => {
                        capture = Some((b"name".to_vec(), Field::AuthorName, String::new()));
                    }
                    b"summary" if entry.is_some() => {
                        capture = Some((b"summary".to_vec(), Field::Summary, String::new()));
                    }
                    b"content" if entry.is_some() => {
                        capture = Some((b"content".to_vec(), Field::Summary, String::new()));
                    }
                    b"link" => push_link(&e, entry.as_mut(), &mut feed)?,
                    b"category" => push_category(&e, entry.as_mut())?,
                    _ => {}
                }
            }

            Ok(Event::Empty(e)) => match e.local_name().as_ref() {
                b"link" => push_link(&e, entry.as_mut(), &mut feed)?,
                b"category" => push_category(&e, entry.as_mut())?,
                _ => {}
            },

            Ok(Event::Text(t)) => {
                if let Some((_, _, text)) = capture.as_mut() {
                    let piece = t
                        .unescape()
                        .map_err(|e| FeedError::malformed(e.to_string()))?;
                    text.push_str(&piece);
                }
            }

            Ok(Event::CData(t)) => {
                if let Some((_, _, text)) = capture.as_mut() {
                    text.push_str(&String::from_utf8_lossy(&t));
                }
            }

            Ok(Event::End(e)) => {
                let name = e.local_name().as_ref().to_vec();
                if let Some((cap_name, field, text)) = capture.take() {
                    if cap_name == name {
                        assign_field(entry.as_mut(), field, text);
                    } else {
                        // Closing tag of nested markup; keep capturing.
                        capture = Some((cap_name, field, text));
                        continue;
                    }
                }
                match name.as_slice() {
                    b"entry" => {
                        if let Some(done) = entry.take() {
                            feed.entries.push(done);
                        }
                        in_author = false;
                    }
                    b"author" => in_author = false,
                    _ => {}
                }
            }

            Ok(_) => {}
        }
    }

    Ok(feed)
}

fn assign_field(entry: Option<&mut RawEntry>, field: Field, text: String) {
    let Some(entry) = entry else { return };
    let text = text.trim().to_string();
    if text.is_empty() {
        return;
    }
    match field {
        Field::Title => entry.title = Some(text),
        Field::AuthorName => entry.author = Some(text),
        // First summary/content wins; the catalog sometimes carries both.
        Field::Summary => {
            if entry.summary.is_none() {
                entry.summary = Some(text);
            }
        }
    }
}

fn push_link(
    element: &BytesStart<'_>,
    entry: Option<&mut RawEntry>,
    feed: &mut ParsedFeed,
) -> Result<(), FeedError> {
    let mut link = RawLink::default();
    // with_checks(false): the catalog emits repeated rel attributes, which
    // strict attribute parsing would reject.
    for attr in element.attributes().with_checks(false) {
        let attr = attr.map_err(|e| FeedError::malformed(e.to_string()))?;
        let value = attr
            .unescape_value()
            .map_err(|e| FeedError::malformed(e.to_string()))?;
        match attr.key.local_name().as_ref() {
            b"rel" => link.rels.push_raw(&value),
            b"href" => link.href = Some(value.into_owned()),
            b"type" => link.mime = Some(value.into_owned()),
            _ => {}
        }
    }
    match entry {
        Some(entry) => entry.links.push(link),
        None => feed.links.push(link),
    }
    Ok(())
}

fn push_category(
    element: &BytesStart<'_>,
    entry: Option<&mut RawEntry>,
) -> Result<(), FeedError> {
    let Some(entry) = entry else { return Ok(()) };
    let mut term = None;
    let mut label = None;
    for attr in element.attributes().with_checks(false) {
        let attr = attr.map_err(|e| FeedError::malformed(e.to_string()))?;
        let value = attr
            .unescape_value()
            .map_err(|e| FeedError::malformed(e.to_string()))?;
        match attr.key.local_name().as_ref() {
            b"term" => term = Some(value.into_owned()),
            b"label" => label = Some(value.into_owned()),
            _ => {}
        }
    }
    if let Some(value) = term.or(label)
        && !value.is_empty()
    {
        entry.categories.push(value);
    }
    Ok(())
}
