//! JavaScript rewrite pass.
//!
//! Scripts get the most conservative treatment: only absolute URLs whose
//! host belongs to the mirrored site (or a subdomain relative of it) are
//! rewritten. Arbitrary third-party URLs inside script text stay as they
//! are; rewriting them risks breaking logic that merely mentions a URL.

use std::sync::LazyLock;

use regex::Regex;
use url::Url;

use super::{RewriteContext, replace_all_fallible};

/// Absolute http(s) URLs inside quoted string literals.
#[allow(clippy::expect_used)]
static ABSOLUTE_URL_LITERAL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(["'])(https?://[^"'\s]+)(["'])"#).expect("script URL regex is valid")
});

/// Rewrites same-site absolute URLs in script text to root-relative mirror
/// paths. Scripts resolve paths against the page, so the root-relative
/// form is the one that keeps working after mirroring.
#[must_use]
pub fn rewrite_script(content: &str, ctx: &RewriteContext<'_>) -> String {
    replace_all_fallible(&ABSOLUTE_URL_LITERAL, content, |caps| {
        let url = Url::parse(&caps[2]).ok()?;
        let host = url.host_str()?;
        if !is_allowed_host(host, &ctx.book().host) {
            return None;
        }
        let mapped = ctx.map_to_root_relative(&caps[2])?;
        Some(format!("{}{}{}", &caps[1], mapped, &caps[3]))
    })
}

/// Whether a host is the mirrored host or a subdomain relative of it
/// (`www.viewer.example` vs `viewer.example`, either direction).
fn is_allowed_host(host: &str, book_host: &str) -> bool {
    let host = host.to_ascii_lowercase();
    host == book_host
        || host
            .strip_suffix(book_host)
            .is_some_and(|prefix| prefix.ends_with('.'))
        || book_host
            .strip_suffix(&host)
            .is_some_and(|prefix| prefix.ends_with('.'))
}
