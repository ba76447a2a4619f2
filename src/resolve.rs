//! Reference resolution and local-path classification.
//!
//! Two pure functions carry the whole URL-to-disk mapping: [`resolve`] turns
//! a possibly-relative reference into an absolute URL, and [`classify`] turns
//! an absolute URL into the canonical path it occupies inside the mirror
//! tree. Both are deterministic functions of their inputs only; caching,
//! concurrent scheduling, and idempotent re-runs all lean on that.
//!
//! Mapping rules:
//! - same-origin URLs keep their path, minus the leading slash
//! - cross-origin URLs land under `external/<host>/<path>`
//! - a query string becomes a short stable hash suffix on the filename, so
//!   `app.js?v=1` and `app.js?v=2` occupy distinct paths
//! - an empty or directory path maps to `index.html`

use sha2::{Digest, Sha256};
use url::Url;

use crate::book::BookInfo;

/// Directory cross-origin assets are mirrored under.
pub const EXTERNAL_DIR: &str = "external";

/// Length of the query-string hash suffix, in hex characters.
const QUERY_HASH_LEN: usize = 8;

/// Resolves a reference found in a document against a base URL.
///
/// Returns `None` for references that are not fetchable assets: fragment
/// anchors, `data:`/`javascript:`/`mailto:` URIs, empty strings, and
/// anything that fails to parse. `None` is an expected filter result, not
/// an error.
#[must_use]
pub fn resolve(reference: &str, base: &Url) -> Option<Url> {
    let reference = reference.trim();

    if reference.is_empty() || reference.starts_with('#') {
        return None;
    }
    let lower = reference.to_ascii_lowercase();
    if lower.starts_with("data:") || lower.starts_with("javascript:") || lower.starts_with("mailto:")
    {
        return None;
    }

    let mut absolute = base.join(reference).ok()?;
    if !matches!(absolute.scheme(), "http" | "https") {
        return None;
    }
    // A fragment never names a distinct asset.
    absolute.set_fragment(None);
    Some(absolute)
}

/// Maps an absolute URL to its path inside the mirror tree.
///
/// The returned path is relative to the output root and uses forward
/// slashes. Returns `None` for non-http(s) URLs and for paths that would
/// escape the tree (`..` segments).
#[must_use]
pub fn classify(url: &Url, book: &BookInfo) -> Option<String> {
    if !matches!(url.scheme(), "http" | "https") {
        return None;
    }
    let host = url.host_str()?;

    let mut segments: Vec<String> = Vec::new();
    for segment in url.path_segments().into_iter().flatten() {
        if segment.is_empty() || segment == "." {
            continue;
        }
        let mut decoded = urlencoding::decode(segment)
            .map(|s| s.into_owned())
            .unwrap_or_else(|_| segment.to_string());
        // Decoded segments must stay segments: no traversal, no separators.
        if decoded == ".." || segment == ".." {
            return None;
        }
        if decoded == "." {
            continue;
        }
        if decoded.contains('/') || decoded.contains('\\') {
            decoded = segment.to_string();
        }
        segments.push(decoded);
    }

    // Directory URLs (trailing slash or bare host) get the index document.
    if segments.is_empty() || url.path().ends_with('/') {
        segments.push("index.html".to_string());
    }

    if let Some(query) = url.query().filter(|q| !q.is_empty()) {
        if let Some(last) = segments.last_mut() {
            *last = suffix_query_hash(last, query);
        }
    }

    let path = segments.join("/");

    if book.is_same_origin(url) {
        Some(path)
    } else {
        Some(format!("{EXTERNAL_DIR}/{host}/{path}"))
    }
}

/// Appends a short stable hash of `query` to `filename`, before the
/// extension when there is one.
fn suffix_query_hash(filename: &str, query: &str) -> String {
    let digest = Sha256::digest(query.as_bytes());
    let hash: String = digest
        .iter()
        .take(QUERY_HASH_LEN / 2)
        .map(|b| format!("{b:02x}"))
        .collect();

    match filename.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() => format!("{stem}_{hash}.{ext}"),
        _ => format!("{filename}_{hash}"),
    }
}

/// Computes the path of `target` relative to the directory containing
/// `from_file`. Both are root-relative forward-slash paths within the
/// mirror tree.
///
/// `relative_from("app/fonts/a.woff2", "app/css/main.css")` is
/// `"../fonts/a.woff2"`.
#[must_use]
pub fn relative_from(target: &str, from_file: &str) -> String {
    let from_dir: Vec<&str> = match from_file.rsplit_once('/') {
        Some((dir, _)) => dir.split('/').collect(),
        None => Vec::new(),
    };
    let target_parts: Vec<&str> = target.split('/').collect();

    // The final target component is a filename and never part of the
    // common directory prefix.
    let target_dirs = &target_parts[..target_parts.len().saturating_sub(1)];
    let common = from_dir
        .iter()
        .zip(target_dirs.iter())
        .take_while(|(a, b)| a == b)
        .count();

    let mut parts: Vec<&str> = Vec::new();
    for _ in common..from_dir.len() {
        parts.push("..");
    }
    parts.extend(&target_parts[common..]);
    parts.join("/")
}
