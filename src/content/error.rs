//! Fetch outcomes: errors and the structured decode result.

use thiserror::Error;

use crate::catalog::CatalogError;

/// Errors surfaced by [`ContentResolver::fetch`](super::ContentResolver::fetch).
///
/// `FormatUnavailable` and `SizeExceeded` are legitimate terminal outcomes —
/// the caller skips the candidate. Only `Catalog` failures are worth a retry
/// or an upstream report.
#[derive(Debug, Error)]
pub enum FetchError {
    /// No download target matches the preference or the fallback list.
    #[error("no usable format for \"{title}\"")]
    FormatUnavailable {
        /// Title of the candidate that was skipped.
        title: String,
    },

    /// The payload exceeds the configured byte ceiling.
    #[error("content exceeds size limit: {actual} > {limit} bytes")]
    SizeExceeded {
        /// Configured ceiling in bytes.
        limit: u64,
        /// Declared or observed size that tripped the ceiling.
        actual: u64,
    },

    /// Network failure reaching the catalog.
    #[error(transparent)]
    Catalog(#[from] CatalogError),
}

impl FetchError {
    /// Creates a format-unavailable outcome.
    pub fn format_unavailable(title: impl Into<String>) -> Self {
        Self::FormatUnavailable {
            title: title.into(),
        }
    }

    /// Creates a size-exceeded outcome.
    pub fn size_exceeded(limit: u64, actual: u64) -> Self {
        Self::SizeExceeded { limit, actual }
    }
}

/// How the decode chain arrived at its text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DecodeQuality {
    /// Decoded exactly as intended.
    Clean,
    /// Something went wrong mid-chain and the result is best-effort.
    /// Never a hard error; `reason` says what degraded.
    Degraded {
        /// What forced the degradation.
        reason: String,
    },
}

impl DecodeQuality {
    /// Whether this outcome degraded.
    #[must_use]
    pub fn is_degraded(&self) -> bool {
        matches!(self, Self::Degraded { .. })
    }
}

/// What the `text` field of a [`DecodedContent`] holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentKind {
    /// Extracted plain text.
    PlainText,
    /// Base64 of raw bytes; formats this pipeline does not extract
    /// (pdf, mobi, unrecognized) pass through opaquely.
    Base64Binary,
}

/// The one product of a fetch: plain text (or opaque base64), produced once.
/// Persistence belongs to the caller.
#[derive(Debug, Clone)]
pub struct DecodedContent {
    /// Extracted text, or base64 for binary passthrough.
    pub text: String,
    /// Format tag of what was actually decoded (after unwrapping archives).
    pub format: String,
    /// Text or opaque binary.
    pub kind: ContentKind,
    /// Clean or degraded decode.
    pub quality: DecodeQuality,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_unavailable_display_names_title() {
        let error = FetchError::format_unavailable("Евгений Онегин");
        assert!(error.to_string().contains("Евгений Онегин"));
    }

    #[test]
    fn test_size_exceeded_display_has_both_numbers() {
        let error = FetchError::size_exceeded(100, 250);
        let msg = error.to_string();
        assert!(msg.contains("100") && msg.contains("250"), "got: {msg}");
    }

    #[test]
    fn test_quality_degraded_flag() {
        assert!(!DecodeQuality::Clean.is_degraded());
        assert!(
            DecodeQuality::Degraded {
                reason: "x".to_string()
            }
            .is_degraded()
        );
    }
}
