//! Run orchestration: entry fetch, frontier seeding, scheduling, probing,
//! rewriting, reporting.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info, warn};
use url::Url;

use crate::book::{BookError, BookInfo};
use crate::extract::extract_html_assets;
use crate::fetch::{
    DEFAULT_TIMEOUT_SECS, FetchClient, FetchError, RateLimiter, RetryPolicy, fetch_with_retry,
};
use crate::prober::{DEFAULT_PAGE_CEILING, Prober};
use crate::report::MirrorReport;
use crate::rewrite::rewrite_tree;
use crate::scheduler::{DEFAULT_CONCURRENCY, Scheduler, SchedulerError};

/// Default minimum delay between same-domain requests.
pub const DEFAULT_RATE_LIMIT: Duration = Duration::from_millis(250);

/// Relative location the mobile entry document is probed at.
const MOBILE_ENTRY_PATH: &str = "mobile/index.html";

/// Fatal errors: everything per-asset is recorded, not raised, so only the
/// run-level failures live here.
#[derive(Debug, thiserror::Error)]
pub enum MirrorError {
    /// The source URL did not describe a book.
    #[error(transparent)]
    Book(#[from] BookError),

    /// Scheduler configuration was invalid.
    #[error(transparent)]
    Scheduler(#[from] SchedulerError),

    /// The entry document could not be fetched after all retries.
    #[error("entry document {url} unreachable after {attempts} attempts: {source}")]
    EntryFetch {
        /// Entry document URL.
        url: String,
        /// Attempts made.
        attempts: u32,
        /// Final fetch error.
        #[source]
        source: FetchError,
    },

    /// The output tree could not be created or written.
    #[error("IO error at {path}: {source}")]
    Io {
        /// Offending path.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },
}

/// Configuration for one mirror run.
#[derive(Debug, Clone)]
pub struct MirrorOptions {
    /// Source viewer URL.
    pub source_url: String,
    /// Output folder; defaults to `<primary>_<secondary>` from the URL.
    pub output_dir: Option<PathBuf>,
    /// Simultaneous in-flight fetches (1-100).
    pub concurrency: usize,
    /// Retry policy for every fetch except page probes.
    pub retry_policy: RetryPolicy,
    /// Minimum same-domain request spacing; zero disables.
    pub rate_limit: Duration,
    /// Per-fetch timeout.
    pub timeout: Duration,
    /// Page-prober safety ceiling.
    pub page_ceiling: u32,
    /// Show the interactive progress line.
    pub show_progress: bool,
}

impl MirrorOptions {
    /// Options with defaults for everything but the source URL.
    #[must_use]
    pub fn new(source_url: impl Into<String>) -> Self {
        Self {
            source_url: source_url.into(),
            output_dir: None,
            concurrency: DEFAULT_CONCURRENCY,
            retry_policy: RetryPolicy::default(),
            rate_limit: DEFAULT_RATE_LIMIT,
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            page_ceiling: DEFAULT_PAGE_CEILING,
            show_progress: false,
        }
    }
}

/// Mirrors one book end to end.
///
/// Fatal failures (bad URL, unreachable entry document, unusable output
/// folder) are returned as [`MirrorError`]; per-asset problems end up in
/// the report instead.
///
/// # Errors
///
/// See [`MirrorError`].
pub async fn run(options: MirrorOptions) -> Result<MirrorReport, MirrorError> {
    let book = BookInfo::parse(&options.source_url)?;
    info!(
        host = %book.host,
        primary = %book.primary_id,
        secondary = %book.secondary_id,
        "mirroring book"
    );

    let output_dir = options
        .output_dir
        .clone()
        .unwrap_or_else(|| PathBuf::from(book.default_output_dir()));
    std::fs::create_dir_all(&output_dir).map_err(|e| MirrorError::Io {
        path: output_dir.clone(),
        source: e,
    })?;

    let client = FetchClient::with_timeout(options.timeout)
        .with_referer(book.base_url.as_str().to_string());
    let rate_limiter = Arc::new(if options.rate_limit.is_zero() {
        RateLimiter::disabled()
    } else {
        RateLimiter::new(options.rate_limit)
    });

    // Entry document: the one fetch whose failure ends the run.
    let entry_url = book.entry_url.to_string();
    let entry_bytes =
        fetch_with_retry(&client, &entry_url, &options.retry_policy, &rate_limiter)
            .await
            .map_err(|(source, attempts)| MirrorError::EntryFetch {
                url: entry_url.clone(),
                attempts,
                source,
            })?;
    let entry_html = String::from_utf8_lossy(&entry_bytes).into_owned();

    let index_path = output_dir.join("index.html");
    std::fs::write(&index_path, &entry_bytes).map_err(|e| MirrorError::Io {
        path: index_path,
        source: e,
    })?;

    let mut seeds = extract_html_assets(&entry_html, &book.entry_url);
    let mut source_overrides: HashMap<String, Url> = HashMap::new();
    source_overrides.insert("index.html".to_string(), book.entry_url.clone());

    // Mobile variant: useful when present, not an error when absent.
    if let Ok(mobile_url) = book.base_url.join(MOBILE_ENTRY_PATH) {
        match fetch_with_retry(&client, mobile_url.as_str(), &options.retry_policy, &rate_limiter)
            .await
        {
            Ok(bytes) => {
                let mobile_path = output_dir.join("mobile.html");
                match std::fs::write(&mobile_path, &bytes) {
                    Ok(()) => {
                        let mobile_html = String::from_utf8_lossy(&bytes);
                        seeds.extend(extract_html_assets(&mobile_html, &mobile_url));
                        source_overrides.insert("mobile.html".to_string(), mobile_url);
                        info!("mobile entry document mirrored");
                    }
                    Err(e) => {
                        warn!(path = %mobile_path.display(), error = %e, "could not save mobile entry");
                    }
                }
            }
            Err((e, _)) => {
                debug!(error = %e, "no mobile entry document");
            }
        }
    }

    let scheduler = Scheduler::new(
        book.clone(),
        client.clone(),
        options.retry_policy.clone(),
        Arc::clone(&rate_limiter),
        options.concurrency,
        output_dir.clone(),
    )?
    .with_progress(options.show_progress);

    let mut outcomes = scheduler.run(seeds).await;

    let prober = Prober::new(
        book.clone(),
        client,
        rate_limiter,
        output_dir.clone(),
        options.page_ceiling,
    );
    let probe = prober.run().await;
    outcomes.extend(probe.outcomes);

    let rewrite = match rewrite_tree(&output_dir, &book, &source_overrides) {
        Ok(summary) => summary,
        Err(e) => {
            warn!(error = %e, "rewrite pass could not walk the tree");
            crate::rewrite::RewriteSummary::default()
        }
    };

    let report = MirrorReport::build(
        &outcomes,
        probe.pages_found,
        rewrite.files_rewritten,
        output_dir,
    );

    match report.write_verify_html(&book) {
        Ok(path) => debug!(path = %path.display(), "verification report written"),
        Err(e) => warn!(error = %e, "could not write verification report"),
    }
    report.log_summary();

    Ok(report)
}
