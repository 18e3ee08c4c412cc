//! Word-overlap fuzzy title matching.
//!
//! Decides whether two titles likely denote the same work. Deliberately
//! crude: bibliographic providers decorate titles with series markers and
//! bracketed editions, which word overlap shrugs off and edit distance does
//! not.

use std::collections::HashSet;

/// Minimum overlap ratio for two titles to count as the same work.
pub const MATCH_THRESHOLD: f64 = 0.5;

/// Overlap ratio: `|common words| / |search-title words|`, lowercased and
/// whitespace-tokenized. Zero for an empty search title.
#[must_use]
pub fn title_match_score(search_title: &str, found_title: &str) -> f64 {
    let search = search_title.to_lowercase();
    let found = found_title.to_lowercase();
    let search_words: HashSet<&str> = search.split_whitespace().collect();
    if search_words.is_empty() {
        return 0.0;
    }
    let found_words: HashSet<&str> = found.split_whitespace().collect();
    let common = search_words.intersection(&found_words).count();
    common as f64 / search_words.len() as f64
}

/// Whether the found title scores at or above [`MATCH_THRESHOLD`].
#[must_use]
pub fn is_title_match(search_title: &str, found_title: &str) -> bool {
    title_match_score(search_title, found_title) >= MATCH_THRESHOLD
}
