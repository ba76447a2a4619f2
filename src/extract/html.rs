//! HTML asset scanner.

use std::sync::LazyLock;

use regex::Regex;
use tracing::debug;
use url::Url;

use super::{UrlSet, has_asset_extension};

/// Attribute references: `src`, `href`, `data-src`, `data-original`.
#[allow(clippy::expect_used)]
static ATTR_REFERENCE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)(?:\bsrc|\bhref|\bdata-src|\bdata-original)\s*=\s*["']([^"']+)["']"#)
        .expect("attribute regex is valid")
});

/// Loosely-matched config/multimedia path literals anywhere in the markup.
/// Viewer pages embed JSON/XML/SWF paths in inline script and attributes; a
/// permissive net catches them where attribute scanning cannot.
#[allow(clippy::expect_used)]
static LOOSE_PATH_LITERAL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"["']([^"'<>\s]+\.(?:json|xml|swf|flv)(?:\?[^"'<>\s]*)?)["']"#)
        .expect("loose path regex is valid")
});

/// Extracts asset URLs from an HTML document.
///
/// Scans attribute references with recognized asset extensions, inline
/// `url(...)` occurrences (style attributes and `<style>` blocks), and
/// loose config/multimedia path literals. Returns deduplicated absolute
/// URLs; malformed markup degrades to a partial list.
#[must_use]
pub fn extract_html_assets(content: &str, base: &Url) -> Vec<String> {
    let mut set = UrlSet::new();

    for capture in ATTR_REFERENCE.captures_iter(content) {
        let reference = &capture[1];
        if has_asset_extension(reference) {
            set.push_reference(reference, base);
        }
    }

    // Inline style attributes and <style> blocks share the CSS url() syntax.
    for reference in super::css::scan_url_functions(content) {
        set.push_reference(reference, base);
    }

    for capture in LOOSE_PATH_LITERAL.captures_iter(content) {
        set.push_reference(&capture[1], base);
    }

    let urls = set.into_vec();
    debug!(count = urls.len(), "extracted HTML asset references");
    urls
}
