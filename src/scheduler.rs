//! Download scheduler: a frontier work queue with bounded concurrency.
//!
//! The scheduler owns three pieces of state: a FIFO `queue` of pending
//! URLs, a bounded set of in-flight fetches, and an `admitted` set of every
//! URL ever accepted. URLs are admitted exactly once; completed CSS and
//! viewer-config files are re-scanned and their unseen references pushed
//! onto the back of the queue, so the frontier grows live while downloads
//! are still running.
//!
//! Concurrency is cooperative: all in-flight fetches live in one
//! `FuturesUnordered` driven from a single owner loop, with no spawned
//! tasks and no locks on the queue. The cap on the in-flight set is the
//! sole backpressure mechanism.

use std::collections::{HashSet, VecDeque};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use futures_util::stream::{FuturesUnordered, StreamExt};
use indicatif::{ProgressBar, ProgressStyle};
use tracing::{debug, info, warn};
use url::Url;

use crate::book::BookInfo;
use crate::extract::{Dialect, extract_config_assets, extract_css_assets};
use crate::fetch::{FetchClient, RateLimiter, RetryPolicy, fetch_with_retry};
use crate::resolve::classify;

/// Minimum allowed concurrency value.
const MIN_CONCURRENCY: usize = 1;

/// Maximum allowed concurrency value.
const MAX_CONCURRENCY: usize = 100;

/// Default number of simultaneously in-flight fetches.
pub const DEFAULT_CONCURRENCY: usize = 5;

/// Error type for scheduler construction.
#[derive(Debug, thiserror::Error)]
pub enum SchedulerError {
    /// Invalid concurrency value provided.
    #[error(
        "invalid concurrency value {value}: must be between {MIN_CONCURRENCY} and {MAX_CONCURRENCY}"
    )]
    InvalidConcurrency {
        /// The invalid value.
        value: usize,
    },
}

/// Outcome of fetching one asset.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DownloadResult {
    /// Fetched over the network and written to disk.
    Downloaded,
    /// Already present on disk from a prior run; no network call made.
    Cached,
    /// All attempts exhausted; carries the final error message.
    Failed(String),
}

/// Per-asset record: what was fetched, where it landed, how it went.
#[derive(Debug, Clone)]
pub struct AssetOutcome {
    /// Absolute URL of the asset.
    pub url: String,
    /// Path inside the mirror tree, relative to the output root.
    pub local_path: String,
    /// How the fetch concluded.
    pub result: DownloadResult,
}

/// Frontier scheduler over one mirror run.
#[derive(Debug)]
pub struct Scheduler {
    book: BookInfo,
    client: FetchClient,
    retry_policy: RetryPolicy,
    rate_limiter: Arc<RateLimiter>,
    concurrency: usize,
    output_dir: PathBuf,
    show_progress: bool,
}

impl Scheduler {
    /// Creates a scheduler.
    ///
    /// # Errors
    ///
    /// Returns [`SchedulerError::InvalidConcurrency`] when `concurrency` is
    /// outside 1-100.
    pub fn new(
        book: BookInfo,
        client: FetchClient,
        retry_policy: RetryPolicy,
        rate_limiter: Arc<RateLimiter>,
        concurrency: usize,
        output_dir: PathBuf,
    ) -> Result<Self, SchedulerError> {
        if !(MIN_CONCURRENCY..=MAX_CONCURRENCY).contains(&concurrency) {
            return Err(SchedulerError::InvalidConcurrency { value: concurrency });
        }

        debug!(
            concurrency,
            max_retries = retry_policy.max_attempts(),
            rate_limit_disabled = rate_limiter.is_disabled(),
            "creating scheduler"
        );

        Ok(Self {
            book,
            client,
            retry_policy,
            rate_limiter,
            concurrency,
            output_dir,
            show_progress: false,
        })
    }

    /// Enables the progress line during [`run`](Self::run).
    #[must_use]
    pub fn with_progress(mut self, show_progress: bool) -> Self {
        self.show_progress = show_progress;
        self
    }

    /// Returns the configured concurrency limit.
    #[must_use]
    pub fn concurrency(&self) -> usize {
        self.concurrency
    }

    /// Drains the frontier seeded with `seeds`, growing it live as CSS and
    /// config files reveal more assets, and returns every asset's outcome.
    ///
    /// Per-asset failures are recorded, never propagated; this method does
    /// not fail.
    pub async fn run(&self, seeds: Vec<String>) -> Vec<AssetOutcome> {
        let mut queue: VecDeque<String> = VecDeque::new();
        let mut admitted: HashSet<String> = HashSet::new();

        for url in seeds {
            if admitted.insert(url.clone()) {
                queue.push_back(url);
            }
        }

        info!(seeded = queue.len(), "starting asset downloads");

        let progress = self.make_progress_bar();
        let mut in_flight = FuturesUnordered::new();
        let mut outcomes: Vec<AssetOutcome> = Vec::new();

        loop {
            // Admit up to the cap. Everything in `queue` has already passed
            // the admitted-set check at push time.
            while in_flight.len() < self.concurrency {
                let Some(url) = queue.pop_front() else { break };
                in_flight.push(self.process_one(url));
            }

            let Some((outcome, discovered)) = in_flight.next().await else {
                break;
            };

            // Fold transitive discoveries back into the frontier.
            for url in discovered {
                if admitted.insert(url.clone()) {
                    debug!(url = %url, "frontier grew");
                    queue.push_back(url);
                }
            }

            if let Some(bar) = &progress {
                bar.inc(1);
                bar.set_message(progress_message(&outcomes, &outcome));
            }
            outcomes.push(outcome);
        }

        if let Some(bar) = &progress {
            bar.finish_and_clear();
        }

        let downloaded = count(&outcomes, |r| matches!(r, DownloadResult::Downloaded));
        let cached = count(&outcomes, |r| matches!(r, DownloadResult::Cached));
        let failed = count(&outcomes, |r| matches!(r, DownloadResult::Failed(_)));
        info!(downloaded, cached, failed, total = outcomes.len(), "asset downloads complete");

        outcomes
    }

    /// Handles one admitted URL start to finish: classify, cached check,
    /// fetch with retry, persist, re-scan for transitive discoveries.
    async fn process_one(&self, url: String) -> (AssetOutcome, Vec<String>) {
        let Ok(parsed) = Url::parse(&url) else {
            return (
                AssetOutcome {
                    url,
                    local_path: String::new(),
                    result: DownloadResult::Failed("unparseable URL".to_string()),
                },
                Vec::new(),
            );
        };

        let Some(local_path) = classify(&parsed, &self.book) else {
            debug!(url = %url, "reference does not map into the mirror tree");
            return (
                AssetOutcome {
                    url,
                    local_path: String::new(),
                    result: DownloadResult::Failed("no local mapping".to_string()),
                },
                Vec::new(),
            );
        };

        let disk_path = self.output_dir.join(&local_path);

        if disk_path.exists() {
            debug!(url = %url, path = %disk_path.display(), "already on disk");
            let discovered = self.rescan_cached(&parsed, &local_path, &disk_path).await;
            return (
                AssetOutcome {
                    url,
                    local_path,
                    result: DownloadResult::Cached,
                },
                discovered,
            );
        }

        match fetch_with_retry(&self.client, &url, &self.retry_policy, &self.rate_limiter).await {
            Ok(bytes) => {
                if let Err(e) = write_asset(&disk_path, &bytes).await {
                    warn!(url = %url, path = %disk_path.display(), error = %e, "write failed");
                    return (
                        AssetOutcome {
                            url,
                            local_path,
                            result: DownloadResult::Failed(e.to_string()),
                        },
                        Vec::new(),
                    );
                }
                let discovered = self.discover_transitive(&parsed, &local_path, &bytes);
                (
                    AssetOutcome {
                        url,
                        local_path,
                        result: DownloadResult::Downloaded,
                    },
                    discovered,
                )
            }
            Err((e, attempts)) => {
                warn!(url = %url, attempts, error = %e, "asset failed after all attempts");
                (
                    AssetOutcome {
                        url,
                        local_path,
                        result: DownloadResult::Failed(e.to_string()),
                    },
                    Vec::new(),
                )
            }
        }
    }

    /// Re-scans a cached CSS/config file from disk so a resumed run still
    /// discovers the assets it references.
    ///
    /// A cached config file may already be in its rewritten form, where
    /// references are root-relative mirror paths rather than the site's
    /// original text; such references name files that exist in the tree
    /// and are skipped instead of resolved.
    async fn rescan_cached(&self, url: &Url, local_path: &str, disk_path: &Path) -> Vec<String> {
        let dialect = Dialect::from_path(local_path);
        if !matches!(
            dialect,
            Some(Dialect::Css | Dialect::Script | Dialect::Json)
        ) {
            return Vec::new();
        }
        let bytes = match tokio::fs::read(disk_path).await {
            Ok(bytes) => bytes,
            Err(e) => {
                warn!(path = %disk_path.display(), error = %e, "could not re-scan cached file");
                return Vec::new();
            }
        };

        if matches!(dialect, Some(Dialect::Css)) {
            return self.discover_transitive(url, local_path, &bytes);
        }

        let content = String::from_utf8_lossy(&bytes);
        let mut discovered = Vec::new();
        for literal in crate::extract::config_literals(&content) {
            if !literal.contains("://")
                && !literal.contains("..")
                && self.output_dir.join(literal).exists()
            {
                continue;
            }
            if let Some(resolved) = crate::resolve::resolve(literal, url) {
                discovered.push(resolved.to_string());
            }
        }
        discovered
    }

    /// Extracts further asset references from a completed CSS or config
    /// file. Other dialects contribute nothing here.
    fn discover_transitive(&self, url: &Url, local_path: &str, bytes: &[u8]) -> Vec<String> {
        match Dialect::from_path(local_path) {
            Some(Dialect::Css) => {
                let content = String::from_utf8_lossy(bytes);
                extract_css_assets(&content, url)
            }
            Some(Dialect::Script | Dialect::Json) => {
                let content = String::from_utf8_lossy(bytes);
                extract_config_assets(&content, url)
            }
            _ => Vec::new(),
        }
    }

    fn make_progress_bar(&self) -> Option<ProgressBar> {
        if !self.show_progress {
            return None;
        }
        let bar = ProgressBar::new_spinner();
        bar.set_style(
            ProgressStyle::with_template("{spinner} {pos} assets - {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner()),
        );
        bar.enable_steady_tick(Duration::from_millis(100));
        Some(bar)
    }
}

/// Writes asset bytes, creating parent directories first.
async fn write_asset(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    tokio::fs::write(path, bytes).await
}

fn count(outcomes: &[AssetOutcome], pred: impl Fn(&DownloadResult) -> bool) -> usize {
    outcomes.iter().filter(|o| pred(&o.result)).count()
}

fn progress_message(outcomes: &[AssetOutcome], latest: &AssetOutcome) -> String {
    let failed = count(outcomes, |r| matches!(r, DownloadResult::Failed(_)));
    let name = latest.local_path.rsplit('/').next().unwrap_or("");
    if failed > 0 {
        format!("{name} ({failed} failed)")
    } else {
        name.to_string()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn test_book() -> BookInfo {
        BookInfo::parse("https://viewer.example/abcd/1234/index.html").unwrap()
    }

    fn test_scheduler(concurrency: usize) -> Result<Scheduler, SchedulerError> {
        Scheduler::new(
            test_book(),
            FetchClient::new(),
            RetryPolicy::default(),
            Arc::new(RateLimiter::disabled()),
            concurrency,
            PathBuf::from("."),
        )
    }

    #[test]
    fn test_scheduler_accepts_valid_concurrency() {
        assert_eq!(test_scheduler(1).unwrap().concurrency(), 1);
        assert_eq!(test_scheduler(5).unwrap().concurrency(), 5);
        assert_eq!(test_scheduler(100).unwrap().concurrency(), 100);
    }

    #[test]
    fn test_scheduler_rejects_zero_concurrency() {
        assert!(matches!(
            test_scheduler(0),
            Err(SchedulerError::InvalidConcurrency { value: 0 })
        ));
    }

    #[test]
    fn test_scheduler_rejects_excessive_concurrency() {
        assert!(matches!(
            test_scheduler(101),
            Err(SchedulerError::InvalidConcurrency { value: 101 })
        ));
    }

    #[test]
    fn test_default_concurrency_constant() {
        assert_eq!(DEFAULT_CONCURRENCY, 5);
    }

    #[tokio::test]
    async fn test_run_with_empty_seeds_returns_no_outcomes() {
        let scheduler = test_scheduler(5).unwrap();
        let outcomes = scheduler.run(Vec::new()).await;
        assert!(outcomes.is_empty());
    }

    #[tokio::test]
    async fn test_unparseable_url_is_recorded_failed() {
        let scheduler = test_scheduler(5).unwrap();
        let outcomes = scheduler.run(vec!["::not-a-url::".to_string()]).await;
        assert_eq!(outcomes.len(), 1);
        assert!(matches!(outcomes[0].result, DownloadResult::Failed(_)));
    }

    #[tokio::test]
    async fn test_duplicate_seeds_admitted_once() {
        let scheduler = test_scheduler(5).unwrap();
        let url = "::still-not-a-url::".to_string();
        let outcomes = scheduler.run(vec![url.clone(), url.clone(), url]).await;
        assert_eq!(outcomes.len(), 1, "one admission per unique URL");
    }
}
