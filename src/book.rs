//! Parsed identity of the mirrored site.
//!
//! A viewer URL names a book as two path segments after the host
//! (`https://host/<primary>/<secondary>/...`). [`BookInfo`] captures those
//! identifiers plus the base URL every relative reference resolves against.
//! It is created once per run and never mutated.

use thiserror::Error;
use url::Url;

/// Errors raised while interpreting the source URL.
#[derive(Debug, Error)]
pub enum BookError {
    /// The input does not parse as a URL at all.
    #[error("invalid source URL '{url}': {reason}")]
    InvalidUrl {
        /// The offending input.
        url: String,
        /// Parser message.
        reason: String,
    },

    /// Parsed, but not an http(s) URL with a host.
    #[error("unsupported source URL '{url}': only http/https URLs with a host are supported")]
    UnsupportedUrl {
        /// The offending input.
        url: String,
    },

    /// Fewer than two non-empty path segments after the host.
    #[error(
        "source URL '{url}' must contain at least two path segments (book identifiers) after the host"
    )]
    MissingIdentifiers {
        /// The offending input.
        url: String,
    },
}

/// Identity of the mirrored site, derived once from the input URL.
#[derive(Debug, Clone)]
pub struct BookInfo {
    /// Full entry-document URL as given.
    pub entry_url: Url,
    /// URL scheme (`http` or `https`).
    pub scheme: String,
    /// Host the mirror is same-origin against.
    pub host: String,
    /// Effective port (explicit or scheme default).
    pub port: u16,
    /// First path segment, the primary book identifier.
    pub primary_id: String,
    /// Second path segment, the secondary book identifier.
    pub secondary_id: String,
    /// Base URL relative references resolve against:
    /// `<scheme>://<host>/<primary>/<secondary>/`.
    pub base_url: Url,
}

impl BookInfo {
    /// Parses the source URL into a book identity.
    ///
    /// # Errors
    ///
    /// Returns [`BookError`] when the input is not an http(s) URL with a
    /// host and at least two non-empty path segments.
    pub fn parse(input: &str) -> Result<Self, BookError> {
        let entry_url = Url::parse(input.trim()).map_err(|e| BookError::InvalidUrl {
            url: input.to_string(),
            reason: e.to_string(),
        })?;

        if !matches!(entry_url.scheme(), "http" | "https") {
            return Err(BookError::UnsupportedUrl {
                url: input.to_string(),
            });
        }

        let Some(host) = entry_url.host_str().map(str::to_lowercase) else {
            return Err(BookError::UnsupportedUrl {
                url: input.to_string(),
            });
        };

        let segments: Vec<&str> = entry_url
            .path_segments()
            .map(|s| s.filter(|seg| !seg.is_empty()).collect())
            .unwrap_or_default();

        let [primary_id, secondary_id, ..] = segments.as_slice() else {
            return Err(BookError::MissingIdentifiers {
                url: input.to_string(),
            });
        };

        let mut base_url = entry_url.clone();
        base_url.set_path(&format!("/{primary_id}/{secondary_id}/"));
        base_url.set_query(None);
        base_url.set_fragment(None);

        let port = entry_url.port_or_known_default().unwrap_or(0);

        Ok(Self {
            scheme: entry_url.scheme().to_string(),
            host,
            port,
            primary_id: (*primary_id).to_string(),
            secondary_id: (*secondary_id).to_string(),
            base_url,
            entry_url,
        })
    }

    /// Whether `url` points at the mirrored site's own origin.
    #[must_use]
    pub fn is_same_origin(&self, url: &Url) -> bool {
        url.host_str()
            .is_some_and(|h| h.eq_ignore_ascii_case(&self.host))
            && url.port_or_known_default().unwrap_or(0) == self.port
    }

    /// Default output folder name, derived from the two identifiers.
    #[must_use]
    pub fn default_output_dir(&self) -> String {
        format!("{}_{}", self.primary_id, self.secondary_id)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    // ==================== Parsing ====================

    #[test]
    fn test_parse_extracts_identifiers_and_base() {
        let book = BookInfo::parse("https://viewer.example/abcd/1234/index.html").unwrap();
        assert_eq!(book.scheme, "https");
        assert_eq!(book.host, "viewer.example");
        assert_eq!(book.primary_id, "abcd");
        assert_eq!(book.secondary_id, "1234");
        assert_eq!(book.base_url.as_str(), "https://viewer.example/abcd/1234/");
    }

    #[test]
    fn test_parse_accepts_bare_two_segments() {
        let book = BookInfo::parse("https://viewer.example/abcd/1234").unwrap();
        assert_eq!(book.primary_id, "abcd");
        assert_eq!(book.secondary_id, "1234");
    }

    #[test]
    fn test_parse_ignores_trailing_slash_segments() {
        let book = BookInfo::parse("https://viewer.example/abcd/1234/").unwrap();
        assert_eq!(book.secondary_id, "1234");
    }

    #[test]
    fn test_parse_strips_query_from_base() {
        let book = BookInfo::parse("https://viewer.example/abcd/1234/index.html?page=3").unwrap();
        assert_eq!(book.base_url.as_str(), "https://viewer.example/abcd/1234/");
    }

    #[test]
    fn test_parse_lowercases_host() {
        let book = BookInfo::parse("https://Viewer.EXAMPLE/a/b").unwrap();
        assert_eq!(book.host, "viewer.example");
    }

    #[test]
    fn test_parse_keeps_port_in_base() {
        let book = BookInfo::parse("http://127.0.0.1:8080/abcd/1234/index.html").unwrap();
        assert_eq!(book.port, 8080);
        assert_eq!(book.base_url.as_str(), "http://127.0.0.1:8080/abcd/1234/");
    }

    // ==================== Rejections ====================

    #[test]
    fn test_parse_rejects_garbage() {
        assert!(matches!(
            BookInfo::parse("not a url"),
            Err(BookError::InvalidUrl { .. })
        ));
    }

    #[test]
    fn test_parse_rejects_ftp() {
        assert!(matches!(
            BookInfo::parse("ftp://viewer.example/a/b"),
            Err(BookError::UnsupportedUrl { .. })
        ));
    }

    #[test]
    fn test_parse_rejects_single_segment() {
        assert!(matches!(
            BookInfo::parse("https://viewer.example/only-one"),
            Err(BookError::MissingIdentifiers { .. })
        ));
    }

    #[test]
    fn test_parse_rejects_empty_path() {
        assert!(matches!(
            BookInfo::parse("https://viewer.example/"),
            Err(BookError::MissingIdentifiers { .. })
        ));
    }

    // ==================== Origin and Defaults ====================

    #[test]
    fn test_same_origin_matches_host_and_port() {
        let book = BookInfo::parse("https://viewer.example/a/b/").unwrap();
        assert!(book.is_same_origin(&Url::parse("https://viewer.example/other.css").unwrap()));
        assert!(!book.is_same_origin(&Url::parse("https://cdn.example/other.css").unwrap()));
    }

    #[test]
    fn test_same_origin_distinguishes_ports() {
        let book = BookInfo::parse("http://127.0.0.1:8080/a/b/").unwrap();
        assert!(book.is_same_origin(&Url::parse("http://127.0.0.1:8080/x.png").unwrap()));
        assert!(!book.is_same_origin(&Url::parse("http://127.0.0.1:9090/x.png").unwrap()));
    }

    #[test]
    fn test_default_output_dir_joins_identifiers() {
        let book = BookInfo::parse("https://viewer.example/abcd/1234/").unwrap();
        assert_eq!(book.default_output_dir(), "abcd_1234");
    }
}
