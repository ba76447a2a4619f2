//! JSON rewrite pass.
//!
//! The only dialect handled structurally: the file is parsed, every string
//! value in the tree is visited, and values that are absolute http(s) URLs
//! mapping into the mirror are replaced with root-relative paths. Relative
//! strings are assumed already viewer-relative and left alone. A file that
//! does not parse as JSON passes through byte-for-byte.

use serde_json::Value;
use tracing::warn;

use super::RewriteContext;

/// Rewrites absolute same-mirror URLs in a JSON document.
#[must_use]
pub fn rewrite_json(content: &str, ctx: &RewriteContext<'_>) -> String {
    let mut value: Value = match serde_json::from_str(content) {
        Ok(value) => value,
        Err(e) => {
            warn!(error = %e, "config file is not valid JSON, leaving unrewritten");
            return content.to_string();
        }
    };

    let mut changed = false;
    rewrite_value(&mut value, ctx, &mut changed);

    if !changed {
        return content.to_string();
    }

    serde_json::to_string_pretty(&value).unwrap_or_else(|_| content.to_string())
}

/// Walks the JSON tree, rewriting eligible string values in place.
fn rewrite_value(value: &mut Value, ctx: &RewriteContext<'_>, changed: &mut bool) {
    match value {
        Value::String(s) => {
            if s.starts_with("http://") || s.starts_with("https://") {
                if let Some(mapped) = ctx.map_to_root_relative(s) {
                    *s = mapped;
                    *changed = true;
                }
            }
        }
        Value::Array(items) => {
            for item in items {
                rewrite_value(item, ctx, changed);
            }
        }
        Value::Object(map) => {
            for item in map.values_mut() {
                rewrite_value(item, ctx, changed);
            }
        }
        Value::Null | Value::Bool(_) | Value::Number(_) => {}
    }
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

    fn ctx<'a>(book: &'a BookInfo, temp: &'a TempDir) -> RewriteContext<'a> {
        RewriteContext::new(
            book,
            temp.path(),
            "app/book/config.json",
            Url::parse("https://site.example/app/book/config.json").unwrap(),
        )
    }

    #[test]
    fn test_rewrites_absolute_urls_in_nested_structure() {
        let (temp, book) = setup();
        place(&temp, "app/book/files/1.jpg");
        place(&temp, "app/book/files/2.jpg");

        let json = r#"{
            "pages": [
                { "image": "https://site.example/app/book/files/1.jpg" },
                { "image": "https://site.example/app/book/files/2.jpg" }
            ],
            "count": 2
        }"#;
        let out = rewrite_json(json, &ctx(&book, &temp));
        let parsed: Value = serde_json::from_str(&out).unwrap();
        assert_eq!(parsed["pages"][0]["image"], "app/book/files/1.jpg");
        assert_eq!(parsed["pages"][1]["image"], "app/book/files/2.jpg");
        assert_eq!(parsed["count"], 2);
    }

    #[test]
    fn test_relative_strings_untouched() {
        let (temp, book) = setup();
        let json = r#"{"thumb": "files/thumb/", "title": "Catalog"}"#;
        assert_eq!(rewrite_json(json, &ctx(&book, &temp)), json);
    }

    #[test]
    fn test_invalid_json_passes_through_unchanged() {
        let (temp, book) = setup();
        let blob = "{ bookId: 12, trailing: , }";
        assert_eq!(rewrite_json(blob, &ctx(&book, &temp)), blob);
    }

    #[test]
    fn test_unmapped_absolute_url_untouched() {
        let (temp, book) = setup();
        let json = r#"{"feed": "https://elsewhere.example/feed.json"}"#;
        assert_eq!(rewrite_json(json, &ctx(&book, &temp)), json);
    }

    #[test]
    fn test_rewrite_is_idempotent() {
        let (temp, book) = setup();
        place(&temp, "app/book/files/1.jpg");

        let json = r#"{"image": "https://site.example/app/book/files/1.jpg"}"#;
        let context = ctx(&book, &temp);
        let once = rewrite_json(json, &context);
        let twice = rewrite_json(&once, &context);
        assert_eq!(once, twice);
    }
}
