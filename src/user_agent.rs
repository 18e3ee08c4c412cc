//! Shared User-Agent strings for catalog and cover-provider HTTP clients.
//!
//! Single source for the UA format so tunneled catalog traffic and clearnet
//! provider traffic stay consistent and easy to update.

/// Browser-like User-Agent presented to the catalog.
///
/// The catalog serves different markup to clients it does not recognize, so
/// the tunneled session identifies as a mainstream browser rather than as
/// this tool.
pub(crate) const CATALOG_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) \
    AppleWebKit/537.36 (KHTML, like Gecko) Chrome/91.0.4472.124 Safari/537.36";

/// Default User-Agent for cover-provider requests (identifies the tool).
#[must_use]
pub(crate) fn default_provider_user_agent() -> String {
    let version = env!("CARGO_PKG_VERSION");
    format!("bookferry/{version} (catalog-ingest)")
}
