//! ZIP container detection and inner-file extraction.
//!
//! The catalog wraps most payloads in ZIP regardless of what the feed
//! declared, so detection goes by byte signature, never by format tag or
//! file extension.

use std::io::{Cursor, Read};

use zip::ZipArchive;

/// Known document extensions, in the order they are preferred when the
/// expected format is absent from an archive.
const DOCUMENT_EXTENSIONS: [(&str, &str); 5] = [
    (".fb2", "fb2"),
    (".epub", "epub"),
    (".txt", "txt"),
    (".pdf", "pdf"),
    (".mobi", "mobi"),
];

/// Whether the payload starts with a ZIP container signature
/// (regular, empty, or spanned archive).
#[must_use]
pub fn is_zip(bytes: &[u8]) -> bool {
    matches!(
        bytes.get(..4),
        Some([0x50, 0x4b, 0x03, 0x04] | [0x50, 0x4b, 0x05, 0x06] | [0x50, 0x4b, 0x07, 0x08])
    )
}

/// An extracted archive member.
#[derive(Debug)]
pub struct InnerFile {
    /// Member name inside the archive.
    pub name: String,
    /// Raw member bytes.
    pub bytes: Vec<u8>,
    /// Format tag derived from the member extension, when recognized.
    pub format: Option<String>,
}

/// Derives a format tag from a file name's extension, when recognized.
#[must_use]
pub fn format_from_name(name: &str) -> Option<String> {
    let lower = name.to_lowercase();
    DOCUMENT_EXTENSIONS
        .iter()
        .find(|(ext, _)| lower.ends_with(ext))
        .map(|(_, format)| (*format).to_string())
}

/// Picks and extracts the right inner file from a ZIP payload.
///
/// Choice order: first member matching the expected format's extension, else
/// first member matching any known document extension, else the first member
/// regardless.
///
/// # Errors
///
/// Returns a human-readable reason when the archive is unreadable or empty;
/// the caller degrades rather than propagating.
pub fn extract_inner(bytes: &[u8], expected_format: &str) -> Result<InnerFile, String> {
    let mut archive = ZipArchive::new(Cursor::new(bytes))
        .map_err(|e| format!("unreadable archive: {e}"))?;

    let mut names: Vec<String> = Vec::new();
    for index in 0..archive.len() {
        if let Ok(member) = archive.by_index(index)
            && !member.is_dir()
        {
            names.push(member.name().to_string());
        }
    }

    let expected_ext = format!(".{expected_format}");
    let chosen = names
        .iter()
        .find(|n| n.to_lowercase().ends_with(&expected_ext))
        .or_else(|| names.iter().find(|n| format_from_name(n).is_some()))
        .or_else(|| names.first())
        .cloned()
        .ok_or_else(|| "archive contains no files".to_string())?;

    let mut member = archive
        .by_name(&chosen)
        .map_err(|e| format!("cannot open archive member {chosen}: {e}"))?;
    let mut data = Vec::new();
    member
        .read_to_end(&mut data)
        .map_err(|e| format!("cannot read archive member {chosen}: {e}"))?;

    let format = format_from_name(&chosen);
    Ok(InnerFile {
        name: chosen,
        bytes: data,
        format,
    })
}
