//! Page-sequence prober.
//!
//! Viewer sites keep page images at predictable numbered paths that are not
//! referenced anywhere in static markup. The prober walks page indices from
//! 1, trying a fixed template table per index with a single fetch attempt
//! each. Misses are expected and never retried; the first index where every
//! template misses ends the scan, since page sequences are contiguous.

use std::path::PathBuf;
use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::book::BookInfo;
use crate::extract::path_extension;
use crate::fetch::{FetchClient, RateLimiter};
use crate::scheduler::{AssetOutcome, DownloadResult};

/// Hard ceiling on the page index.
pub const DEFAULT_PAGE_CEILING: u32 = 500;

/// Directory probed pages are stored under, relative to the output root.
pub const PAGE_DIR: &str = "files/mobile";

/// Path templates tried, in order, for each page index. `{page}` is the
/// 1-based index. Covers the mobile/large/thumb layout variants seen in the
/// wild, with and without the `mobile/` prefix. Extend here when a new
/// viewer layout shows up.
pub const DEFAULT_PAGE_TEMPLATES: &[&str] = &[
    "files/mobile/{page}.jpg",
    "files/mobile/{page}.png",
    "mobile/files/mobile/{page}.jpg",
    "files/large/{page}.jpg",
    "files/large/{page}.png",
    "mobile/files/large/{page}.jpg",
    "files/thumb/{page}.jpg",
];

/// Scan state: either probing an index or finished.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ProbeState {
    /// Probing the contained 1-based page index.
    Probing(u32),
    /// First full-miss reached; the scan is over.
    Done,
}

/// Result of a prober run.
#[derive(Debug, Default)]
pub struct ProbeSummary {
    /// Number of contiguous pages found from index 1.
    pub pages_found: u32,
    /// Per-page outcomes, for the report.
    pub outcomes: Vec<AssetOutcome>,
}

/// Sequential page-image discovery against one book.
#[derive(Debug)]
pub struct Prober {
    book: BookInfo,
    client: FetchClient,
    rate_limiter: Arc<RateLimiter>,
    output_dir: PathBuf,
    page_ceiling: u32,
    templates: Vec<String>,
}

impl Prober {
    /// Creates a prober with the default template table.
    #[must_use]
    pub fn new(
        book: BookInfo,
        client: FetchClient,
        rate_limiter: Arc<RateLimiter>,
        output_dir: PathBuf,
        page_ceiling: u32,
    ) -> Self {
        Self {
            book,
            client,
            rate_limiter,
            output_dir,
            page_ceiling: page_ceiling.max(1),
            templates: DEFAULT_PAGE_TEMPLATES
                .iter()
                .map(ToString::to_string)
                .collect(),
        }
    }

    /// Replaces the template table.
    #[must_use]
    pub fn with_templates(mut self, templates: Vec<String>) -> Self {
        self.templates = templates;
        self
    }

    /// Walks page indices until the first full-miss or the ceiling.
    pub async fn run(&self) -> ProbeSummary {
        let mut summary = ProbeSummary::default();
        let mut state = ProbeState::Probing(1);

        while let ProbeState::Probing(page) = state {
            if page > self.page_ceiling {
                warn!(ceiling = self.page_ceiling, "page ceiling reached, stopping probe");
                break;
            }

            state = if self.probe_page(page, &mut summary).await {
                summary.pages_found = page;
                ProbeState::Probing(page + 1)
            } else {
                debug!(page, "all templates missed, page sequence ends");
                ProbeState::Done
            };
        }

        info!(pages = summary.pages_found, "page probe complete");
        summary
    }

    /// Tries every template for one index. Returns whether any hit.
    async fn probe_page(&self, page: u32, summary: &mut ProbeSummary) -> bool {
        let page_str = page.to_string();

        for template in &self.templates {
            let relative = template.replace("{page}", &page_str);
            let extension = path_extension(&relative).unwrap_or_else(|| "jpg".to_string());
            let local_path = format!("{PAGE_DIR}/{page_str}.{extension}");
            let disk_path = self.output_dir.join(&local_path);

            let Ok(url) = self.book.base_url.join(&relative) else {
                continue;
            };

            // A page image already on disk from a prior run is a hit
            // without network I/O.
            if disk_path.exists() {
                debug!(page, path = %local_path, "page already on disk");
                summary.outcomes.push(AssetOutcome {
                    url: url.to_string(),
                    local_path,
                    result: DownloadResult::Cached,
                });
                return true;
            }

            self.rate_limiter.acquire(url.as_str()).await;

            // Single attempt: a miss is a negative answer, not a failure.
            match self.client.fetch_bytes(url.as_str()).await {
                Ok(bytes) => {
                    if let Err(e) = write_page(&disk_path, &bytes).await {
                        warn!(page, path = %disk_path.display(), error = %e, "page write failed");
                        summary.outcomes.push(AssetOutcome {
                            url: url.to_string(),
                            local_path,
                            result: DownloadResult::Failed(e.to_string()),
                        });
                        return true;
                    }
                    debug!(page, template = %template, "page found");
                    summary.outcomes.push(AssetOutcome {
                        url: url.to_string(),
                        local_path,
                        result: DownloadResult::Downloaded,
                    });
                    return true;
                }
                Err(e) => {
                    debug!(page, template = %template, error = %e, "template missed");
                }
            }
        }

        false
    }
}

/// Writes page bytes, creating the page directory first.
async fn write_page(path: &std::path::Path, bytes: &[u8]) -> std::io::Result<()> {
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    tokio::fs::write(path, bytes).await
}
