//! Asset discovery: per-dialect pattern scanners.
//!
//! Each scanner takes raw document text plus the base URL it was served
//! from and returns the absolute URLs of assets the document depends on.
//! The scanners are regex-driven, not parsers: viewer sites routinely ship
//! markup and config that no strict parser would accept, and a partial
//! asset list beats an error. A scanner never fails; at worst it returns
//! an empty list.

use std::collections::HashSet;

use url::Url;

mod config;
mod css;
mod html;

pub use config::extract_config_assets;
pub(crate) use config::config_literals;
pub use css::extract_css_assets;
pub use html::extract_html_assets;

/// Content dialects the extractor and rewriter distinguish, keyed by file
/// extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dialect {
    /// HTML markup.
    Html,
    /// CSS stylesheets.
    Css,
    /// JavaScript, including viewer config scripts.
    Script,
    /// JSON data/config files.
    Json,
}

impl Dialect {
    /// Determines the dialect of a path from its extension.
    #[must_use]
    pub fn from_path(path: &str) -> Option<Self> {
        let ext = path_extension(path)?;
        match ext.as_str() {
            "html" | "htm" | "xhtml" => Some(Self::Html),
            "css" => Some(Self::Css),
            "js" => Some(Self::Script),
            "json" => Some(Self::Json),
            _ => None,
        }
    }
}

/// Stylesheet extensions.
pub const STYLE_EXTENSIONS: &[&str] = &["css"];

/// Script extensions.
pub const SCRIPT_EXTENSIONS: &[&str] = &["js"];

/// Image extensions viewer pages commonly reference.
pub const IMAGE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "gif", "svg", "webp", "ico", "bmp"];

/// Font extensions.
pub const FONT_EXTENSIONS: &[&str] = &["woff", "woff2", "ttf", "otf", "eot"];

/// Legacy multimedia and data extensions embedded by older viewers.
pub const MEDIA_EXTENSIONS: &[&str] = &["swf", "flv", "mp3", "mp4", "ogg", "webm"];

/// Structured data extensions.
pub const DATA_EXTENSIONS: &[&str] = &["json", "xml", "txt"];

/// Whether `reference` (query/fragment tolerated) ends in any known asset
/// extension.
#[must_use]
pub fn has_asset_extension(reference: &str) -> bool {
    let Some(ext) = path_extension(reference) else {
        return false;
    };
    let ext = ext.as_str();
    STYLE_EXTENSIONS.contains(&ext)
        || SCRIPT_EXTENSIONS.contains(&ext)
        || IMAGE_EXTENSIONS.contains(&ext)
        || FONT_EXTENSIONS.contains(&ext)
        || MEDIA_EXTENSIONS.contains(&ext)
        || DATA_EXTENSIONS.contains(&ext)
}

/// Lowercased extension of a reference, ignoring query string and fragment.
/// Extensions are 1-5 alphanumeric characters.
#[must_use]
pub fn path_extension(reference: &str) -> Option<String> {
    let end = reference.find(['?', '#']).unwrap_or(reference.len());
    let path = &reference[..end];
    let name = path.rsplit('/').next().unwrap_or(path);
    let (_, ext) = name.rsplit_once('.')?;
    if (1..=5).contains(&ext.len()) && ext.chars().all(|c| c.is_ascii_alphanumeric()) {
        Some(ext.to_ascii_lowercase())
    } else {
        None
    }
}

/// Order-preserving collector that drops duplicate URLs.
#[derive(Debug, Default)]
pub(crate) struct UrlSet {
    seen: HashSet<String>,
    urls: Vec<String>,
}

impl UrlSet {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Resolves `reference` against `base` and records the absolute URL if
    /// it survives the resolve filter and hasn't been seen.
    pub(crate) fn push_reference(&mut self, reference: &str, base: &Url) {
        if let Some(url) = crate::resolve::resolve(reference, base) {
            let url = url.to_string();
            if self.seen.insert(url.clone()) {
                self.urls.push(url);
            }
        }
    }

    pub(crate) fn into_vec(self) -> Vec<String> {
        self.urls
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    // ==================== Dialect Dispatch ====================

    #[test]
    fn test_dialect_from_path() {
        assert_eq!(Dialect::from_path("index.html"), Some(Dialect::Html));
        assert_eq!(Dialect::from_path("a/b/style.css"), Some(Dialect::Css));
        assert_eq!(Dialect::from_path("app.js"), Some(Dialect::Script));
        assert_eq!(Dialect::from_path("config.json"), Some(Dialect::Json));
        assert_eq!(Dialect::from_path("logo.png"), None);
        assert_eq!(Dialect::from_path("no-extension"), None);
    }

    // ==================== Extension Recognition ====================

    #[test]
    fn test_path_extension_ignores_query_and_fragment() {
        assert_eq!(path_extension("app.js?v=3").as_deref(), Some("js"));
        assert_eq!(path_extension("sprite.svg#icon").as_deref(), Some("svg"));
    }

    #[test]
    fn test_path_extension_rejects_long_or_odd() {
        assert_eq!(path_extension("archive.backup1x"), None);
        assert_eq!(path_extension("noext"), None);
        assert_eq!(path_extension("trailing."), None);
    }

    #[test]
    fn test_has_asset_extension_families() {
        assert!(has_asset_extension("style/app.css"));
        assert!(has_asset_extension("js/viewer.js?v=2"));
        assert!(has_asset_extension("files/page/1.jpg"));
        assert!(has_asset_extension("fonts/reader.woff2"));
        assert!(has_asset_extension("media/intro.swf"));
        assert!(has_asset_extension("config.json"));
        assert!(!has_asset_extension("about/terms"));
        assert!(!has_asset_extension("page.aspx2024"));
    }

    // ==================== UrlSet ====================

    #[test]
    fn test_url_set_dedups_and_preserves_order() {
        let base = url::Url::parse("https://viewer.example/a/b/").unwrap();
        let mut set = UrlSet::new();
        set.push_reference("one.css", &base);
        set.push_reference("two.css", &base);
        set.push_reference("one.css", &base);
        set.push_reference("#anchor", &base);
        assert_eq!(
            set.into_vec(),
            vec![
                "https://viewer.example/a/b/one.css".to_string(),
                "https://viewer.example/a/b/two.css".to_string(),
            ]
        );
    }
}
