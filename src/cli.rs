//! CLI argument definitions using clap derive macros.

use clap::{Parser, Subcommand};

/// Fetch and normalize e-books from a proxy-only catalog.
///
/// Bookferry searches and browses one catalog through its proxy tunnel,
/// downloads book content with archive unwrapping and encoding inference,
/// and resolves cover images through external providers.
#[derive(Parser, Debug)]
#[command(name = "bookferry")]
#[command(author, version, about)]
pub struct Args {
    /// Increase output verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Suppress non-error output
    #[arg(short, long)]
    pub quiet: bool,

    /// Catalog root address (typically an .onion host)
    #[arg(long, env = "BOOKFERRY_CATALOG")]
    pub catalog: String,

    /// SOCKS proxy endpoint for the catalog tunnel
    #[arg(long, env = "BOOKFERRY_PROXY")]
    pub proxy: Option<String>,

    /// Connect without any proxy (refused for .onion catalog roots)
    #[arg(long, conflicts_with = "proxy")]
    pub no_proxy: bool,

    /// Clearnet mirror host for cover probing (repeatable)
    #[arg(long = "mirror")]
    pub mirrors: Vec<String>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Search the catalog for books
    Search {
        /// Query text
        query: String,

        /// Maximum number of results
        #[arg(short, long, default_value_t = 10)]
        limit: usize,
    },

    /// Browse a category by URL or name
    Browse {
        /// Category URL or free-text category name
        category: String,

        /// Prefer the popularity-ordered subcategory when descending
        #[arg(long)]
        popular: bool,

        /// Maximum number of results
        #[arg(short, long, default_value_t = 10)]
        limit: usize,
    },

    /// Search for a book and print its decoded text
    Fetch {
        /// Query text; the first matching book is fetched
        query: String,

        /// Preferred format tag
        #[arg(short, long, default_value = "fb2")]
        format: String,
    },

    /// Resolve a cover image URL
    Cover {
        /// Book title
        title: String,

        /// Author name
        #[arg(short, long)]
        author: Option<String>,

        /// Catalog external id (enables direct mirror probing)
        #[arg(long)]
        id: Option<String>,
    },
}
