//! Download-target selection.

use crate::feed::DownloadTarget;

/// Fixed fallback priority when the preferred format is absent.
const FALLBACK_FORMATS: [&str; 2] = ["fb2", "epub"];

/// Whether `format` is the archived variant of `base` (`fb2+zip`,
/// `fb2+rar`, …).
fn is_archived_variant(format: &str, base: &str) -> bool {
    format
        .strip_prefix(base)
        .is_some_and(|rest| rest.starts_with('+'))
}

fn exact<'a>(targets: &'a [DownloadTarget], format: &str) -> Option<&'a DownloadTarget> {
    targets.iter().find(|t| t.format == format)
}

fn archived<'a>(targets: &'a [DownloadTarget], base: &str) -> Option<&'a DownloadTarget> {
    targets.iter().find(|t| is_archived_variant(&t.format, base))
}

/// Picks the target to download.
///
/// Order: exact preferred match, archived variant of the preferred format,
/// then the fixed fallback list (exact, then archived, per list entry).
/// `None` means the candidate has no usable format — a legitimate terminal
/// outcome, not a fetch error.
#[must_use]
pub fn select_target<'a>(
    targets: &'a [DownloadTarget],
    preferred: &str,
) -> Option<&'a DownloadTarget> {
    if let Some(target) = exact(targets, preferred).or_else(|| archived(targets, preferred)) {
        return Some(target);
    }
    for format in FALLBACK_FORMATS {
        if format == preferred {
            continue;
        }
        if let Some(target) = exact(targets, format).or_else(|| archived(targets, format)) {
            return Some(target);
        }
    }
    None
}
