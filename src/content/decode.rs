//! Text decoding: encoding inference, FictionBook and EPUB structural
//! extraction, opaque binary passthrough.
//!
//! Nothing in here fails outward. Every path ends in a string plus a
//! [`DecodeQuality`] verdict; the worst case is lossy UTF-8 marked Degraded.

use std::io::{Cursor, Read};

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use once_cell::sync::Lazy;
use quick_xml::Reader;
use quick_xml::events::Event;
use regex::Regex;
use scraper::Html;
use zip::ZipArchive;

use crate::config::LEGACY_ENCODINGS;

use super::error::DecodeQuality;

/// Detector verdicts below this confidence are ignored in favor of the
/// legacy-encoding list.
const DETECTOR_CONFIDENCE_FLOOR: f32 = 0.7;

#[allow(clippy::expect_used)]
static MULTI_SPACE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[ \t\u{a0}]{2,}").expect("static regex is valid"));

/// Decodes generic text bytes (fb2/txt payloads).
///
/// Confidence-scored detection first; on a weak or dirty verdict, the fixed
/// legacy list (UTF-8, Windows-1251, CP1251, KOI8-R) is tried in order,
/// accepting the first clean decode; the last resort is lossy UTF-8, which
/// never fails.
#[must_use]
pub fn decode_text(bytes: &[u8]) -> (String, DecodeQuality) {
    let (charset, confidence, _) = chardet::detect(bytes);
    if confidence > DETECTOR_CONFIDENCE_FLOOR
        && let Some(encoding) =
            encoding_rs::Encoding::for_label(chardet::charset2encoding(&charset).as_bytes())
    {
        let (decoded, _, had_errors) = encoding.decode(bytes);
        if !had_errors {
            return (decoded.into_owned(), DecodeQuality::Clean);
        }
    }

    for label in LEGACY_ENCODINGS {
        if let Some(encoding) = encoding_rs::Encoding::for_label(label.as_bytes()) {
            let (decoded, _, had_errors) = encoding.decode(bytes);
            if !had_errors {
                return (decoded.into_owned(), DecodeQuality::Clean);
            }
        }
    }

    (
        String::from_utf8_lossy(bytes).into_owned(),
        DecodeQuality::Degraded {
            reason: "no encoding decoded cleanly; invalid bytes discarded".to_string(),
        },
    )
}

/// Extracts readable text from a FictionBook document: the text of `<p>`
/// elements inside `<body>`, double-newline-joined.
///
/// # Errors
///
/// Returns a reason when the document is not parseable as FictionBook XML or
/// carries no body paragraphs; the caller degrades to the undecorated text.
pub fn extract_fb2_text(xml: &str) -> Result<String, String> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut body_depth = 0u32;
    let mut paragraph_depth = 0u32;
    let mut paragraphs: Vec<String> = Vec::new();
    let mut current = String::new();

    loop {
        match reader.read_event() {
            Err(e) => return Err(format!("not a FictionBook document: {e}")),
            Ok(Event::Eof) => break,
            Ok(Event::Start(e)) => match e.local_name().as_ref() {
                b"body" => body_depth += 1,
                b"p" if body_depth > 0 => {
                    paragraph_depth += 1;
                    if paragraph_depth == 1 {
                        current.clear();
                    }
                }
                _ => {}
            },
            Ok(Event::End(e)) => match e.local_name().as_ref() {
                b"body" => body_depth = body_depth.saturating_sub(1),
                b"p" if paragraph_depth > 0 => {
                    paragraph_depth -= 1;
                    if paragraph_depth == 0 {
                        let text = current.trim().to_string();
                        if !text.is_empty() {
                            paragraphs.push(text);
                        }
                    }
                }
                _ => {}
            },
            Ok(Event::Text(t)) => {
                if paragraph_depth > 0 {
                    let piece = t.unescape().map_err(|e| format!("bad entity: {e}"))?;
                    if !current.is_empty() && !current.ends_with(char::is_whitespace) {
                        current.push(' ');
                    }
                    current.push_str(piece.trim());
                }
            }
            Ok(Event::CData(t)) => {
                if paragraph_depth > 0 {
                    current.push_str(String::from_utf8_lossy(&t).trim());
                }
            }
            Ok(_) => {}
        }
    }

    if paragraphs.is_empty() {
        return Err("no body paragraphs found".to_string());
    }
    Ok(paragraphs.join("\n\n"))
}

/// Extracts readable text from an EPUB payload: every XHTML/HTML member in
/// archive order, scripts and styles dropped, whitespace collapsed, members
/// double-newline-joined.
///
/// # Errors
///
/// Returns a reason when the container is unreadable or holds no markup
/// members; the caller degrades.
pub fn extract_epub_text(bytes: &[u8]) -> Result<String, String> {
    let mut archive =
        ZipArchive::new(Cursor::new(bytes)).map_err(|e| format!("unreadable epub: {e}"))?;

    let mut parts: Vec<String> = Vec::new();
    for index in 0..archive.len() {
        let Ok(mut member) = archive.by_index(index) else {
            continue;
        };
        let name = member.name().to_lowercase();
        if !(name.ends_with(".xhtml") || name.ends_with(".html") || name.ends_with(".htm")) {
            continue;
        }
        let mut data = Vec::new();
        if member.read_to_end(&mut data).is_err() {
            continue;
        }
        let (markup, _) = decode_text(&data);
        let text = visible_text(&markup);
        if !text.is_empty() {
            parts.push(text);
        }
    }

    if parts.is_empty() {
        return Err("no text members in epub".to_string());
    }
    Ok(parts.join("\n\n"))
}

/// Visible text of one markup document: text nodes outside `script`/`style`,
/// line-trimmed, redundant whitespace collapsed, empty lines dropped.
#[must_use]
pub fn visible_text(markup: &str) -> String {
    let document = Html::parse_document(markup);
    let mut raw = String::new();
    for node in document.tree.nodes() {
        let Some(text) = node.value().as_text() else {
            continue;
        };
        let hidden = node.ancestors().any(|a| {
            a.value()
                .as_element()
                .is_some_and(|el| el.name() == "script" || el.name() == "style")
        });
        if !hidden {
            raw.push_str(text);
        }
    }

    raw.lines()
        .map(|line| MULTI_SPACE.replace_all(line, " ").trim().to_string())
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

/// Encodes raw bytes for opaque passthrough.
#[must_use]
pub fn to_base64(bytes: &[u8]) -> String {
    BASE64.encode(bytes)
}
