//! Reference rewriting: remote URLs to local relative paths, in place.
//!
//! Runs once the asset tree is on disk. Every on-disk HTML/CSS/JS/JSON
//! file gets its dialect pass; each candidate reference is resolved against
//! the file's original remote URL, classified to its mirror path, and
//! replaced only when that path actually exists in the tree. Any failure
//! along that chain leaves the original text untouched (fail-open), which
//! also makes the whole pass idempotent: already-relative references map
//! back to themselves.

use std::collections::HashMap;
use std::path::Path;

use regex::{Captures, Regex};
use tracing::{debug, info, warn};
use url::Url;

use crate::book::BookInfo;
use crate::extract::Dialect;
use crate::resolve::{EXTERNAL_DIR, classify, relative_from, resolve};

mod css;
mod html;
mod json;
mod script;

pub use css::rewrite_css;
pub use html::rewrite_html;
pub use json::rewrite_json;
pub use script::rewrite_script;

/// Counts from one rewrite pass over the tree.
#[derive(Debug, Default, Clone, Copy)]
pub struct RewriteSummary {
    /// Rewritable-dialect files visited.
    pub files_scanned: usize,
    /// Files whose content actually changed.
    pub files_rewritten: usize,
}

/// Everything a dialect pass needs to map one file's references.
#[derive(Debug)]
pub struct RewriteContext<'a> {
    book: &'a BookInfo,
    output_dir: &'a Path,
    /// Path of the file being rewritten, relative to the output root.
    local_path: &'a str,
    /// The remote URL this file was fetched from; relative references
    /// resolve against it.
    source_url: Url,
}

impl<'a> RewriteContext<'a> {
    /// Creates a context for one file.
    #[must_use]
    pub fn new(
        book: &'a BookInfo,
        output_dir: &'a Path,
        local_path: &'a str,
        source_url: Url,
    ) -> Self {
        Self {
            book,
            output_dir,
            local_path,
            source_url,
        }
    }

    /// Maps a reference to a path relative to this file's directory.
    /// `None` when the reference does not resolve, classify, or exist in
    /// the tree; callers leave the original text in place.
    #[must_use]
    pub fn map_to_relative(&self, reference: &str) -> Option<String> {
        let target = self.map_to_root_relative(reference)?;
        Some(relative_from(&target, self.local_path))
    }

    /// Maps a reference to its root-relative mirror path, with the same
    /// `None`-on-any-failure contract.
    #[must_use]
    pub fn map_to_root_relative(&self, reference: &str) -> Option<String> {
        let absolute = resolve(reference, &self.source_url)?;
        let target = classify(&absolute, self.book)?;
        if !self.output_dir.join(&target).exists() {
            return None;
        }
        Some(target)
    }

    pub(crate) fn book(&self) -> &BookInfo {
        self.book
    }
}

/// Substitutes every match of `re`, keeping the original text wherever the
/// mapping declines. The shared fail-open primitive for all passes.
pub(crate) fn replace_all_fallible<F>(re: &Regex, content: &str, mut map: F) -> String
where
    F: FnMut(&Captures) -> Option<String>,
{
    re.replace_all(content, |caps: &Captures| {
        map(caps).unwrap_or_else(|| caps[0].to_string())
    })
    .into_owned()
}

/// Rewrites every HTML/CSS/JS/JSON file under `output_dir` in place.
///
/// `source_overrides` pins the remote URL for files whose mirror path is
/// not the inverse of classification (the entry documents at the root).
///
/// # Errors
///
/// Returns an error only when the tree itself cannot be walked; per-file
/// read/write problems are logged and skipped.
pub fn rewrite_tree(
    output_dir: &Path,
    book: &BookInfo,
    source_overrides: &HashMap<String, Url>,
) -> std::io::Result<RewriteSummary> {
    let mut files = Vec::new();
    collect_files(output_dir, output_dir, &mut files)?;

    let mut summary = RewriteSummary::default();

    for local_path in files {
        // The generated report is ours, not the site's.
        if local_path == "verify.html" {
            continue;
        }
        let Some(dialect) = Dialect::from_path(&local_path) else {
            continue;
        };
        let Some(source_url) = source_url_for(&local_path, book, source_overrides) else {
            debug!(path = %local_path, "no source URL, skipping rewrite");
            continue;
        };

        summary.files_scanned += 1;
        let disk_path = output_dir.join(&local_path);

        let original = match std::fs::read(&disk_path) {
            Ok(bytes) => bytes,
            Err(e) => {
                warn!(path = %disk_path.display(), error = %e, "could not read for rewrite");
                continue;
            }
        };

        let content = String::from_utf8_lossy(&original).into_owned();
        let ctx = RewriteContext::new(book, output_dir, &local_path, source_url);

        let rewritten = match dialect {
            Dialect::Html => rewrite_html(&content, &ctx),
            Dialect::Css => rewrite_css(&content, &ctx),
            Dialect::Script => rewrite_script(&content, &ctx),
            Dialect::Json => rewrite_json(&content, &ctx),
        };

        if rewritten != content {
            if let Err(e) = std::fs::write(&disk_path, &rewritten) {
                warn!(path = %disk_path.display(), error = %e, "could not write rewritten file");
                continue;
            }
            debug!(path = %local_path, "rewrote references");
            summary.files_rewritten += 1;
        }
    }

    info!(
        scanned = summary.files_scanned,
        rewritten = summary.files_rewritten,
        "rewrite pass complete"
    );
    Ok(summary)
}

/// Reconstructs the remote URL a mirrored file was fetched from.
///
/// Entry documents come from `source_overrides`; `external/<host>/...`
/// paths reconstruct against that host; everything else is the book origin
/// plus the local path. Query-hashed filenames do not invert exactly, but
/// the reconstruction only serves as a base for resolving relative
/// references, where the filename's query never participates.
fn source_url_for(
    local_path: &str,
    book: &BookInfo,
    source_overrides: &HashMap<String, Url>,
) -> Option<Url> {
    if let Some(url) = source_overrides.get(local_path) {
        return Some(url.clone());
    }

    if let Some(rest) = local_path.strip_prefix(&format!("{EXTERNAL_DIR}/")) {
        let (host, path) = rest.split_once('/')?;
        return Url::parse(&format!("{}://{host}/{path}", book.scheme)).ok();
    }

    let mut url = book.base_url.clone();
    url.set_path(&format!("/{local_path}"));
    Some(url)
}

/// Recursively collects files under `dir` as root-relative forward-slash
/// paths.
fn collect_files(dir: &Path, root: &Path, acc: &mut Vec<String>) -> std::io::Result<()> {
    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        let path = entry.path();
        if path.is_dir() {
            collect_files(&path, root, acc)?;
        } else if let Ok(relative) = path.strip_prefix(root) {
            let parts: Vec<String> = relative
                .components()
                .map(|c| c.as_os_str().to_string_lossy().into_owned())
                .collect();
            acc.push(parts.join("/"));
        }
    }
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn test_book() -> BookInfo {
        BookInfo::parse("https://viewer.example/abcd/1234/index.html").unwrap()
    }

    // ==================== Source URL Reconstruction ====================

    #[test]
    fn test_source_url_for_same_origin_path() {
        let url = source_url_for("abcd/1234/css/main.css", &test_book(), &HashMap::new()).unwrap();
        assert_eq!(url.as_str(), "https://viewer.example/abcd/1234/css/main.css");
    }

    #[test]
    fn test_source_url_for_external_path() {
        let url = source_url_for("external/cdn.example/lib/x.js", &test_book(), &HashMap::new())
            .unwrap();
        assert_eq!(url.as_str(), "https://cdn.example/lib/x.js");
    }

    #[test]
    fn test_source_url_for_prefers_override() {
        let mut overrides = HashMap::new();
        overrides.insert(
            "index.html".to_string(),
            Url::parse("https://viewer.example/abcd/1234/index.html").unwrap(),
        );
        let url = source_url_for("index.html", &test_book(), &overrides).unwrap();
        assert_eq!(url.as_str(), "https://viewer.example/abcd/1234/index.html");
    }

    // ==================== Fail-Open Substitution ====================

    #[test]
    fn test_replace_all_fallible_keeps_unmapped_matches() {
        let re = Regex::new(r"\b\w+\b").unwrap();
        let out = replace_all_fallible(&re, "keep swap keep", |caps| {
            (&caps[0] == "swap").then(|| "done".to_string())
        });
        assert_eq!(out, "keep done keep");
    }

    // ==================== Context Mapping ====================

    #[test]
    fn test_map_to_relative_requires_file_on_disk() {
        let temp = tempfile::TempDir::new().unwrap();
        let book = test_book();
        let ctx = RewriteContext::new(
            &book,
            temp.path(),
            "index.html",
            Url::parse("https://viewer.example/abcd/1234/index.html").unwrap(),
        );
        // Not on disk: mapping declines.
        assert!(ctx.map_to_relative("style/app.css").is_none());

        std::fs::create_dir_all(temp.path().join("abcd/1234/style")).unwrap();
        std::fs::write(temp.path().join("abcd/1234/style/app.css"), "x").unwrap();
        assert_eq!(
            ctx.map_to_relative("style/app.css").as_deref(),
            Some("abcd/1234/style/app.css")
        );
    }
}
