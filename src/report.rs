//! Run summary: aggregated outcomes, console totals, and `verify.html`.

use std::path::PathBuf;

use serde::Serialize;
use tracing::{info, warn};

use crate::book::BookInfo;
use crate::scheduler::{AssetOutcome, DownloadResult};

/// Cap on the failed-URL list carried into the summary and report.
pub const MAX_REPORTED_FAILURES: usize = 20;

/// One failed asset with its first error message.
#[derive(Debug, Clone, Serialize)]
pub struct FailureRecord {
    /// The asset URL.
    pub url: String,
    /// The final error message.
    pub error: String,
}

/// Aggregated outcome of a mirror run.
#[derive(Debug, Serialize)]
pub struct MirrorReport {
    /// Assets fetched over the network this run.
    pub downloaded: usize,
    /// Assets already on disk from a prior run.
    pub cached: usize,
    /// Assets that exhausted their retries.
    pub failed: usize,
    /// Contiguous page images found by the prober.
    pub pages_found: u32,
    /// Files changed by the rewrite pass.
    pub files_rewritten: usize,
    /// First [`MAX_REPORTED_FAILURES`] failures.
    pub failures: Vec<FailureRecord>,
    /// Where the mirror tree lives.
    #[serde(skip)]
    pub output_dir: PathBuf,
}

impl MirrorReport {
    /// Aggregates per-asset outcomes into a report.
    #[must_use]
    pub fn build(
        outcomes: &[AssetOutcome],
        pages_found: u32,
        files_rewritten: usize,
        output_dir: PathBuf,
    ) -> Self {
        let mut downloaded = 0;
        let mut cached = 0;
        let mut failed = 0;
        let mut failures = Vec::new();

        for outcome in outcomes {
            match &outcome.result {
                DownloadResult::Downloaded => downloaded += 1,
                DownloadResult::Cached => cached += 1,
                DownloadResult::Failed(error) => {
                    failed += 1;
                    if failures.len() < MAX_REPORTED_FAILURES {
                        failures.push(FailureRecord {
                            url: outcome.url.clone(),
                            error: error.clone(),
                        });
                    }
                }
            }
        }

        Self {
            downloaded,
            cached,
            failed,
            pages_found,
            files_rewritten,
            failures,
            output_dir,
        }
    }

    /// Total assets the run touched.
    #[must_use]
    pub fn total(&self) -> usize {
        self.downloaded + self.cached + self.failed
    }

    /// Logs the console summary.
    pub fn log_summary(&self) {
        info!(
            downloaded = self.downloaded,
            cached = self.cached,
            failed = self.failed,
            pages = self.pages_found,
            rewritten = self.files_rewritten,
            total = self.total(),
            "mirror complete"
        );
        for failure in &self.failures {
            warn!(url = %failure.url, error = %failure.error, "asset not mirrored");
        }
        if self.failed > self.failures.len() {
            warn!(
                omitted = self.failed - self.failures.len(),
                "further failures omitted from the summary"
            );
        }
    }

    /// Writes `verify.html` into the output folder and returns its path.
    ///
    /// # Errors
    ///
    /// Returns an IO error when the file cannot be written.
    pub fn write_verify_html(&self, book: &BookInfo) -> std::io::Result<PathBuf> {
        let path = self.output_dir.join("verify.html");
        std::fs::write(&path, self.render_verify_html(book))?;
        Ok(path)
    }

    /// Renders the verification document.
    fn render_verify_html(&self, book: &BookInfo) -> String {
        let failure_rows: String = self
            .failures
            .iter()
            .map(|f| {
                format!(
                    "    <li><code>{}</code> &mdash; {}</li>\n",
                    escape_html(&f.url),
                    escape_html(&f.error)
                )
            })
            .collect();

        let failure_section = if self.failures.is_empty() {
            "  <p>No failed assets.</p>\n".to_string()
        } else {
            format!("  <ul>\n{failure_rows}  </ul>\n")
        };

        let summary_json =
            serde_json::to_string_pretty(self).unwrap_or_else(|_| "{}".to_string());

        format!(
            "<!DOCTYPE html>\n<html>\n<head>\n<meta charset=\"utf-8\">\n\
             <title>Mirror verification</title>\n</head>\n<body>\n\
             <h1>Mirror verification</h1>\n\
             <p>Source: <code>{source}</code></p>\n\
             <table border=\"1\" cellpadding=\"4\">\n\
             <tr><th>Downloaded</th><td>{downloaded}</td></tr>\n\
             <tr><th>Cached</th><td>{cached}</td></tr>\n\
             <tr><th>Failed</th><td>{failed}</td></tr>\n\
             <tr><th>Pages found</th><td>{pages}</td></tr>\n\
             <tr><th>Files rewritten</th><td>{rewritten}</td></tr>\n\
             <tr><th>Total assets</th><td>{total}</td></tr>\n\
             </table>\n\
             <h2>Entry points</h2>\n\
             <ul>\n    <li><a href=\"index.html\">index.html</a></li>\n\
             <li><a href=\"mobile.html\">mobile.html</a> (if mirrored)</li>\n</ul>\n\
             <h2>Failed assets</h2>\n{failure_section}\
             <script type=\"application/json\" id=\"mirror-summary\">\n{summary_json}\n</script>\n\
             </body>\n</html>\n",
            source = escape_html(book.entry_url.as_str()),
            downloaded = self.downloaded,
            cached = self.cached,
            failed = self.failed,
            pages = self.pages_found,
            rewritten = self.files_rewritten,
            total = self.total(),
        )
    }
}

/// Minimal HTML escaping for report text.
fn escape_html(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn outcome(url: &str, result: DownloadResult) -> AssetOutcome {
        AssetOutcome {
            url: url.to_string(),
            local_path: String::new(),
            result,
        }
    }

    fn test_book() -> BookInfo {
        BookInfo::parse("https://viewer.example/a/b/index.html").unwrap()
    }

    #[test]
    fn test_build_counts_each_outcome_kind() {
        let outcomes = vec![
            outcome("https://v/a.css", DownloadResult::Downloaded),
            outcome("https://v/b.png", DownloadResult::Downloaded),
            outcome("https://v/c.js", DownloadResult::Cached),
            outcome("https://v/d.gif", DownloadResult::Failed("HTTP 404".to_string())),
        ];
        let report = MirrorReport::build(&outcomes, 7, 3, PathBuf::from("."));
        assert_eq!(report.downloaded, 2);
        assert_eq!(report.cached, 1);
        assert_eq!(report.failed, 1);
        assert_eq!(report.pages_found, 7);
        assert_eq!(report.files_rewritten, 3);
        assert_eq!(report.total(), 4);
        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].error, "HTTP 404");
    }

    #[test]
    fn test_failure_list_is_truncated() {
        let outcomes: Vec<AssetOutcome> = (0..50)
            .map(|i| {
                outcome(
                    &format!("https://v/{i}.png"),
                    DownloadResult::Failed("HTTP 500".to_string()),
                )
            })
            .collect();
        let report = MirrorReport::build(&outcomes, 0, 0, PathBuf::from("."));
        assert_eq!(report.failed, 50);
        assert_eq!(report.failures.len(), MAX_REPORTED_FAILURES);
    }

    #[test]
    fn test_verify_html_contains_counts_and_failures() {
        let outcomes = vec![
            outcome("https://v/ok.css", DownloadResult::Downloaded),
            outcome("https://v/bad.png", DownloadResult::Failed("timeout".to_string())),
        ];
        let report = MirrorReport::build(&outcomes, 2, 1, PathBuf::from("."));
        let html = report.render_verify_html(&test_book());
        assert!(html.contains("<title>Mirror verification</title>"));
        assert!(html.contains("https://v/bad.png"));
        assert!(html.contains("timeout"));
        assert!(html.contains("mirror-summary"));
    }

    #[test]
    fn test_verify_html_escapes_markup_in_errors() {
        let outcomes = vec![outcome(
            "https://v/x.png",
            DownloadResult::Failed("<script>alert(1)</script>".to_string()),
        )];
        let report = MirrorReport::build(&outcomes, 0, 0, PathBuf::from("."));
        let html = report.render_verify_html(&test_book());
        assert!(!html.contains("<script>alert"));
        assert!(html.contains("&lt;script&gt;"));
    }
}
