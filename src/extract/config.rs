//! JS/config asset scanner.
//!
//! Viewer configuration arrives as JavaScript objects or near-JSON blobs
//! that are frequently not valid JSON, so this scanner works on quoted
//! string literals rather than a parse tree: a literal is interesting when
//! it ends in a known asset extension or mentions a known path segment.
//! The trigger tables are deliberately one-place constants; tuning for a
//! new viewer site is an edit here, not a code change elsewhere.

use std::sync::LazyLock;

use regex::Regex;
use tracing::debug;
use url::Url;

use super::{UrlSet, has_asset_extension};

/// Path-segment markers that flag a string literal as a viewer asset path.
pub const PATH_MARKERS: &[&str] = &["files/", "mobile/", "large/", "thumb/"];

/// Quoted string literals, single- or double-quoted, no embedded newlines.
#[allow(clippy::expect_used)]
static STRING_LITERAL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#""([^"\\\r\n]+)"|'([^'\\\r\n]+)'"#).expect("string literal regex is valid")
});

/// Extracts asset URLs from a script or config document.
///
/// Heuristic by contract: quoted literals ending in a known asset extension
/// or containing a known path marker are resolved against `base`; nothing
/// else is touched. Never errors on malformed input.
#[must_use]
pub fn extract_config_assets(content: &str, base: &Url) -> Vec<String> {
    let mut set = UrlSet::new();

    for literal in config_literals(content) {
        set.push_reference(literal, base);
    }

    let urls = set.into_vec();
    debug!(count = urls.len(), "extracted config asset references");
    urls
}

/// Iterates the interesting raw string literals of a config document,
/// before any resolution. The scheduler uses this to re-scan cached files
/// with its own admission filtering.
pub(crate) fn config_literals(content: &str) -> impl Iterator<Item = &str> {
    STRING_LITERAL
        .captures_iter(content)
        .map(|capture| {
            capture
                .get(1)
                .or_else(|| capture.get(2))
                .map_or("", |m| m.as_str())
        })
        .filter(|literal| is_asset_literal(literal))
}

/// Whether a string literal looks like an asset path worth fetching.
fn is_asset_literal(literal: &str) -> bool {
    // Path-like only: no whitespace or markup fragments.
    if literal.is_empty() || literal.contains(char::is_whitespace) || literal.contains('<') {
        return false;
    }
    has_asset_extension(literal) || PATH_MARKERS.iter().any(|marker| literal.contains(marker))
}
