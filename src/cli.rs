//! CLI argument definitions using clap derive macros.

use std::path::PathBuf;

use clap::Parser;

use bookmirror_core::fetch::{DEFAULT_MAX_RETRIES, DEFAULT_TIMEOUT_SECS};
use bookmirror_core::prober::DEFAULT_PAGE_CEILING;
use bookmirror_core::scheduler::DEFAULT_CONCURRENCY;

/// Mirror a paginated document-viewer site into a self-contained local tree.
///
/// Point bookmirror at a viewer URL with two path segments after the host
/// (the book identifiers) and it downloads every reachable asset, probes
/// the numbered page images, and rewrites references so the result renders
/// offline.
#[derive(Parser, Debug)]
#[command(name = "bookmirror")]
#[command(author, version, about)]
pub struct Args {
    /// Source viewer URL (needs two path segments after the host)
    pub source_url: String,

    /// Output folder (defaults to a name derived from the book identifiers)
    pub output: Option<PathBuf>,

    /// Maximum concurrent fetches (1-100)
    #[arg(short = 'c', long, default_value_t = DEFAULT_CONCURRENCY as u8, value_parser = clap::value_parser!(u8).range(1..=100))]
    pub concurrency: u8,

    /// Maximum retry attempts for transient failures (0-10)
    #[arg(short = 'r', long, default_value_t = DEFAULT_MAX_RETRIES as u8, value_parser = clap::value_parser!(u8).range(0..=10))]
    pub max_retries: u8,

    /// Minimum delay between requests to the same domain in milliseconds (0 to disable, max 60000)
    #[arg(short = 'l', long, default_value_t = 250, value_parser = clap::value_parser!(u64).range(0..=60000))]
    pub rate_limit: u64,

    /// Per-fetch timeout in seconds (1-600)
    #[arg(long, default_value_t = DEFAULT_TIMEOUT_SECS, value_parser = clap::value_parser!(u64).range(1..=600))]
    pub timeout: u64,

    /// Safety ceiling on the page-image probe (1-10000)
    #[arg(long, default_value_t = DEFAULT_PAGE_CEILING, value_parser = clap::value_parser!(u32).range(1..=10000))]
    pub page_limit: u32,

    /// Increase output verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Suppress non-error output
    #[arg(short, long)]
    pub quiet: bool,
}
