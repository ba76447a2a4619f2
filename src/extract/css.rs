//! CSS asset scanner.
//!
//! The one dialect with transitive discovery: every stylesheet's extracted
//! references are folded back into the download frontier, because fonts and
//! background images are reachable only from CSS.

use std::sync::LazyLock;

use regex::Regex;
use tracing::debug;
use url::Url;

use super::UrlSet;

/// `url(...)` functional references, quoted or bare.
#[allow(clippy::expect_used)]
static URL_FUNCTION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"url\(\s*['"]?([^'")\s]+)['"]?\s*\)"#).expect("url() regex is valid")
});

/// `@import "..."` / `@import '...'` without a url() wrapper.
/// The url() form is already covered by [`URL_FUNCTION`].
#[allow(clippy::expect_used)]
static IMPORT_STATEMENT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"@import\s+['"]([^'"]+)['"]"#).expect("@import regex is valid")
});

/// Extracts asset URLs from a stylesheet: `url(...)` references and
/// `@import` targets, data URIs skipped. Returns deduplicated absolute
/// URLs; malformed CSS degrades to a partial list.
#[must_use]
pub fn extract_css_assets(content: &str, base: &Url) -> Vec<String> {
    let mut set = UrlSet::new();

    for reference in scan_url_functions(content) {
        set.push_reference(reference, base);
    }

    for capture in IMPORT_STATEMENT.captures_iter(content) {
        set.push_reference(&capture[1], base);
    }

    let urls = set.into_vec();
    debug!(count = urls.len(), "extracted CSS asset references");
    urls
}

/// Iterates the raw targets of `url(...)` occurrences, skipping data URIs.
/// Shared with the HTML scanner for inline styles.
pub(crate) fn scan_url_functions(content: &str) -> impl Iterator<Item = &str> {
    URL_FUNCTION
        .captures_iter(content)
        .map(|c| c.get(1).map_or("", |m| m.as_str()))
        .filter(|target| !target.to_ascii_lowercase().starts_with("data:"))
}
