//! CLI entry point for the bookferry tool.

use anyhow::Result;
use bookferry_core::{
    CatalogClient, CatalogNavigator, ContentResolver, CoverResolver, FetchError, IngestConfig,
};
use clap::Parser;
use tracing::{debug, info, warn};

mod cli;

use cli::{Args, Command};

#[tokio::main]
async fn main() -> Result<()> {
    // Parse CLI arguments first (before tracing, so --help works without logs)
    let args = Args::parse();

    // Determine log level based on verbose/quiet flags
    // Priority: RUST_LOG env var > quiet flag > verbose flag > default (info)
    let default_level = if args.quiet {
        "error"
    } else {
        match args.verbose {
            0 => "info",
            1 => "debug",
            _ => "trace",
        }
    };

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level));

    // Logs to stderr; stdout is reserved for results (fetch pipes text).
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    debug!(?args, "CLI arguments parsed");

    let mut config = IngestConfig::for_root(&args.catalog);
    if args.no_proxy {
        config.proxy = None;
    } else if let Some(proxy) = args.proxy.clone() {
        config.proxy = Some(proxy);
    }
    config.mirrors = args.mirrors.clone();

    match args.command {
        Command::Search { query, limit } => {
            let client = CatalogClient::new(&config)?;
            let navigator = CatalogNavigator::new(client);
            let candidates = navigator.search(&query, limit).await?;
            info!(count = candidates.len(), "search complete");
            for candidate in &candidates {
                print_candidate(candidate);
            }
        }

        Command::Browse {
            category,
            popular,
            limit,
        } => {
            let client = CatalogClient::new(&config)?;
            let navigator = CatalogNavigator::new(client);
            let candidates = navigator.browse(&category, popular, limit).await?;
            info!(count = candidates.len(), "browse complete");
            for candidate in &candidates {
                print_candidate(candidate);
            }
        }

        Command::Fetch { query, format } => {
            let client = CatalogClient::new(&config)?;
            let navigator = CatalogNavigator::new(client.clone());
            let candidates = navigator.search(&query, 1).await?;
            let Some(candidate) = candidates.first() else {
                info!("nothing found for query");
                return Ok(());
            };
            let resolver = ContentResolver::new(client, &config);
            match resolver.fetch(candidate, &format).await {
                Ok(content) => {
                    if content.quality.is_degraded() {
                        warn!("decode degraded; text is best-effort");
                    }
                    println!("{}", content.text);
                }
                Err(FetchError::FormatUnavailable { .. } | FetchError::SizeExceeded { .. }) => {
                    // Terminal non-fatal outcomes; the user sees a plain
                    // message, never a technical trace.
                    info!("content unavailable");
                }
                Err(error) => return Err(error.into()),
            }
        }

        Command::Cover { title, author, id } => {
            let resolver = CoverResolver::new(&config);
            let url = resolver
                .resolve(&title, author.as_deref(), id.as_deref())
                .await;
            println!("{url}");
        }
    }

    Ok(())
}

fn print_candidate(candidate: &bookferry_core::Candidate) {
    let formats: Vec<&str> = candidate
        .targets
        .iter()
        .map(|t| t.format.as_str())
        .collect();
    println!(
        "{} — {} [{}]{}",
        candidate.title,
        candidate.author,
        formats.join(", "),
        candidate
            .external_id
            .as_deref()
            .map(|id| format!(" #{id}"))
            .unwrap_or_default()
    );
}
