//! CSS rewrite pass.

use std::sync::LazyLock;

use regex::Regex;

use super::{RewriteContext, replace_all_fallible};

/// `url(...)` with its optional quotes captured.
#[allow(clippy::expect_used)]
static URL_FUNCTION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"url\(\s*(['"]?)([^'")\s]+)(['"]?)\s*\)"#).expect("url() rewrite regex is valid")
});

/// Plain-quoted `@import` targets (the url() form is covered above).
#[allow(clippy::expect_used)]
static IMPORT_TARGET: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(@import\s+)(['"])([^'"]+)(['"])"#).expect("@import rewrite regex is valid")
});

/// Rewrites `url(...)` and `@import` references to paths relative to the
/// stylesheet. Data URIs and unmapped references pass through unchanged.
#[must_use]
pub fn rewrite_css(content: &str, ctx: &RewriteContext<'_>) -> String {
    let pass = rewrite_url_functions(content, ctx);
    replace_all_fallible(&IMPORT_TARGET, &pass, |caps| {
        let mapped = ctx.map_to_relative(&caps[3])?;
        Some(format!("{}{}{}{}", &caps[1], &caps[2], mapped, &caps[4]))
    })
}

/// Rewrites the targets of `url(...)` occurrences. Shared with the HTML
/// pass for inline styles.
pub(crate) fn rewrite_url_functions(content: &str, ctx: &RewriteContext<'_>) -> String {
    replace_all_fallible(&URL_FUNCTION, content, |caps| {
        let target = &caps[2];
        if target.to_ascii_lowercase().starts_with("data:") {
            return None;
        }
        let mapped = ctx.map_to_relative(target)?;
        Some(format!("url({}{}{})", &caps[1], mapped, &caps[3]))
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
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

    /// Context for the stylesheet at app/book/css/main.css.
    fn ctx<'a>(book: &'a BookInfo, temp: &'a TempDir) -> RewriteContext<'a> {
        RewriteContext::new(
            book,
            temp.path(),
            "app/book/css/main.css",
            Url::parse("https://site.example/app/book/css/main.css").unwrap(),
        )
    }

    #[test]
    fn test_rewrites_absolute_url_to_stylesheet_relative() {
        let (temp, book) = setup();
        place(&temp, "app/book/fonts/r.woff2");

        let css = r#"@font-face { src: url("https://site.example/app/book/fonts/r.woff2"); }"#;
        let out = rewrite_css(css, &ctx(&book, &temp));
        assert!(out.contains(r#"url("../fonts/r.woff2")"#), "got: {out}");
    }

    #[test]
    fn test_relative_url_already_correct_is_fixed_point() {
        let (temp, book) = setup();
        place(&temp, "app/book/fonts/r.woff2");

        let css = "@font-face { src: url(../fonts/r.woff2); }";
        let out = rewrite_css(css, &ctx(&book, &temp));
        assert_eq!(out, css);
    }

    #[test]
    fn test_data_uri_passes_through() {
        let (temp, book) = setup();
        let css = ".dot { background: url(data:image/gif;base64,R0lGOD); }";
        assert_eq!(rewrite_css(css, &ctx(&book, &temp)), css);
    }

    #[test]
    fn test_unmapped_url_left_untouched() {
        let (temp, book) = setup();
        let css = ".x { background: url(/app/not-downloaded.png); }";
        assert_eq!(rewrite_css(css, &ctx(&book, &temp)), css);
    }

    #[test]
    fn test_rewrites_import_target() {
        let (temp, book) = setup();
        place(&temp, "app/book/css/reset.css");

        let css = r#"@import "https://site.example/app/book/css/reset.css";"#;
        let out = rewrite_css(css, &ctx(&book, &temp));
        assert_eq!(out, r#"@import "reset.css";"#);
    }
}
