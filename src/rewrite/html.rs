//! HTML rewrite pass.

use std::sync::LazyLock;

use regex::Regex;

use super::{RewriteContext, replace_all_fallible};

/// Rewritable attributes with their quoted values.
#[allow(clippy::expect_used)]
static ATTR_VALUE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)\b(src|href|data-src|data-original)(\s*=\s*)(["'])([^"']*)(["'])"#)
        .expect("attribute rewrite regex is valid")
});

/// Rewrites `src`/`href`/`data-src`/`data-original` attribute values to
/// local relative paths. References that do not map into the mirror tree
/// keep their original text.
#[must_use]
pub fn rewrite_html(content: &str, ctx: &RewriteContext<'_>) -> String {
    let html_pass = replace_all_fallible(&ATTR_VALUE, content, |caps| {
        let mapped = ctx.map_to_relative(&caps[4])?;
        Some(format!("{}{}{}{}{}", &caps[1], &caps[2], &caps[3], mapped, &caps[5]))
    });

    // Inline style attributes and <style> blocks carry CSS url() syntax.
    super::css::rewrite_url_functions(&html_pass, ctx)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::collections::HashMap;

    use tempfile::TempDir;
    use url::Url;

    use super::*;
    use crate::book::BookInfo;

    fn setup() -> (TempDir, BookInfo) {
        let temp = TempDir::new().unwrap();
        let book = BookInfo::parse("https://site.example/app/book/index.html").unwrap();
        (temp, book)
    }

    fn place(temp: &TempDir, path: &str) {
        let full = temp.path().join(path);
        std::fs::create_dir_all(full.parent().unwrap()).unwrap();
        std::fs::write(full, b"bytes").unwrap();
    }

    fn ctx<'a>(book: &'a BookInfo, temp: &'a TempDir) -> RewriteContext<'a> {
        RewriteContext::new(
            book,
            temp.path(),
            "index.html",
            Url::parse("https://site.example/app/book/index.html").unwrap(),
        )
    }

    #[test]
    fn test_rewrites_absolute_and_root_relative_references() {
        let (temp, book) = setup();
        place(&temp, "app/book/style.css");
        place(&temp, "app/logo.png");

        let html = r#"<link href="https://site.example/app/book/style.css"><img src="/app/logo.png">"#;
        let out = rewrite_html(html, &ctx(&book, &temp));
        assert_eq!(
            out,
            r#"<link href="app/book/style.css"><img src="app/logo.png">"#
        );
    }

    #[test]
    fn test_rewrites_inline_style_url() {
        let (temp, book) = setup();
        place(&temp, "app/book/fonts/a.woff2");

        let html = r#"<div style="background: url('fonts/a.woff2')"></div>"#;
        let out = rewrite_html(html, &ctx(&book, &temp));
        assert!(out.contains("url('app/book/fonts/a.woff2')"), "got: {out}");
    }

    #[test]
    fn test_unmapped_reference_left_untouched() {
        let (temp, book) = setup();
        // Nothing placed on disk.
        let html = r##"<img src="/app/missing.png"><a href="#page-2">next</a>"##;
        let out = rewrite_html(html, &ctx(&book, &temp));
        assert_eq!(out, html);
    }

    #[test]
    fn test_unrelated_text_untouched() {
        let (temp, book) = setup();
        place(&temp, "app/logo.png");
        let html = "<p>src is a word, href too.</p><img src=\"/app/logo.png\">";
        let out = rewrite_html(html, &ctx(&book, &temp));
        assert!(out.starts_with("<p>src is a word, href too.</p>"));
        assert!(out.ends_with("<img src=\"app/logo.png\">"));
    }

    #[test]
    fn test_rewrite_is_idempotent() {
        let (temp, book) = setup();
        place(&temp, "app/book/style.css");
        place(&temp, "app/logo.png");
        place(&temp, "app/book/fonts/a.woff2");

        let html = concat!(
            r#"<link href="https://site.example/app/book/style.css">"#,
            r#"<img src="/app/logo.png">"#,
            r#"<div style="background: url('fonts/a.woff2')"></div>"#,
        );
        let context = ctx(&book, &temp);
        let once = rewrite_html(html, &context);
        let twice = rewrite_html(&once, &context);
        assert_eq!(once, twice, "second rewrite must be a fixed point");
    }

    #[test]
    fn test_cross_origin_reference_maps_under_external() {
        let (temp, book) = setup();
        place(&temp, "external/cdn.example/lib/jquery.js");

        let html = r#"<script src="https://cdn.example/lib/jquery.js"></script>"#;
        let out = rewrite_html(html, &ctx(&book, &temp));
        assert!(out.contains(r#"src="external/cdn.example/lib/jquery.js""#), "got: {out}");
    }
}
