//! CLI entry point for the bookmirror tool.

use std::io::IsTerminal;
use std::time::Duration;

use anyhow::Result;
use clap::Parser;
use tracing::debug;

use bookmirror_core::fetch::RetryPolicy;
use bookmirror_core::mirror::{self, MirrorOptions};

mod cli;

use cli::Args;

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

    tracing_subscriber::fmt().with_env_filter(filter).init();

    debug!(?args, "CLI arguments parsed");

    let options = MirrorOptions {
        source_url: args.source_url,
        output_dir: args.output,
        concurrency: usize::from(args.concurrency),
        retry_policy: RetryPolicy::with_max_attempts(u32::from(args.max_retries)),
        rate_limit: Duration::from_millis(args.rate_limit),
        timeout: Duration::from_secs(args.timeout),
        page_ceiling: args.page_limit,
        show_progress: !args.quiet && std::io::stderr().is_terminal(),
    };

    let report = mirror::run(options).await?;

    println!(
        "Mirrored {} assets ({} downloaded, {} cached, {} failed, {} pages) into {}",
        report.total(),
        report.downloaded,
        report.cached,
        report.failed,
        report.pages_found,
        report.output_dir.display()
    );

    Ok(())
}
