//! HTTP client wrapper for retrieving site resources.
//!
//! `FetchClient` wraps a pooled `reqwest::Client` with the header shaping a
//! viewer site expects (tool User-Agent with a browser fallback on 403, a
//! Referer pinned to the mirrored site) and maps transport failures into
//! [`FetchError`] variants.

use std::time::Duration;

use reqwest::header::{REFERER, RETRY_AFTER, USER_AGENT};
use reqwest::{Client, ClientBuilder};
use tracing::{debug, warn};
use url::Url;

use super::error::FetchError;
use crate::user_agent;

/// Default per-request timeout (seconds).
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Browser User-Agent used as fallback when servers return 403.
///
/// The first attempt identifies the tool; viewer sites behind bot-detection
/// sometimes reject that, so a 403 triggers one more request with this UA.
pub const BROWSER_USER_AGENT: &str = "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) \
    AppleWebKit/537.36 (KHTML, like Gecko) Chrome/131.0.0.0 Safari/537.36";

/// HTTP client for fetching site resources.
///
/// Create once per run and reuse; the underlying `reqwest::Client` pools
/// connections and follows redirects.
#[derive(Debug, Clone)]
pub struct FetchClient {
    client: Client,
    /// Referer sent with every request, normally the mirrored site's base URL.
    referer: Option<String>,
}

impl Default for FetchClient {
    fn default() -> Self {
        Self::new()
    }
}

impl FetchClient {
    /// Creates a client with the default timeout.
    ///
    /// # Panics
    ///
    /// Panics if the HTTP client builder fails with the static
    /// configuration. This does not happen in practice.
    #[must_use]
    #[allow(clippy::expect_used)]
    pub fn new() -> Self {
        Self::with_timeout(Duration::from_secs(DEFAULT_TIMEOUT_SECS))
    }

    /// Creates a client with an explicit per-request timeout.
    ///
    /// # Panics
    ///
    /// Panics if the HTTP client builder fails with the supplied
    /// configuration.
    #[must_use]
    #[allow(clippy::expect_used)]
    pub fn with_timeout(timeout: Duration) -> Self {
        let client = ClientBuilder::new()
            .timeout(timeout)
            .connect_timeout(timeout.min(Duration::from_secs(DEFAULT_TIMEOUT_SECS)))
            .gzip(true)
            .cookie_store(true)
            .build()
            .expect("failed to build HTTP client with static configuration");
        Self {
            client,
            referer: None,
        }
    }

    /// Sets the Referer header sent with every request.
    #[must_use]
    pub fn with_referer(mut self, referer: impl Into<String>) -> Self {
        self.referer = Some(referer.into());
        self
    }

    /// Fetches `url` and returns the response body.
    ///
    /// A single logical attempt: no retries, except that a 403 response is
    /// re-requested once with a browser User-Agent before the error is
    /// reported.
    ///
    /// # Errors
    ///
    /// Returns [`FetchError`] if the URL is invalid, the request fails at
    /// the network level, it times out, or the server responds with a
    /// non-success status.
    pub async fn fetch_bytes(&self, url: &str) -> Result<Vec<u8>, FetchError> {
        Url::parse(url).map_err(|_| FetchError::invalid_url(url))?;

        match self.request(url, &user_agent::default_user_agent()).await {
            Err(FetchError::HttpStatus { status: 403, .. }) => {
                debug!(url = %url, "403 with tool User-Agent, retrying as browser");
                self.request(url, BROWSER_USER_AGENT).await
            }
            other => other,
        }
    }

    /// Fetches `url` and decodes the body as UTF-8, lossily.
    ///
    /// Viewer pages occasionally carry stray non-UTF-8 bytes in inline
    /// config; lossy decoding keeps the surrounding markup usable.
    ///
    /// # Errors
    ///
    /// Returns the same errors as [`fetch_bytes`](Self::fetch_bytes).
    pub async fn fetch_text(&self, url: &str) -> Result<String, FetchError> {
        let bytes = self.fetch_bytes(url).await?;
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }

    /// One GET request with the given User-Agent.
    async fn request(&self, url: &str, ua: &str) -> Result<Vec<u8>, FetchError> {
        let mut builder = self.client.get(url).header(USER_AGENT, ua);
        if let Some(referer) = &self.referer {
            builder = builder.header(REFERER, referer.as_str());
        }

        let response = builder.send().await.map_err(|e| {
            if e.is_timeout() {
                FetchError::timeout(url)
            } else {
                FetchError::network(url, e)
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            let retry_after = response
                .headers()
                .get(RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .map(str::to_string);
            if status.as_u16() >= 500 {
                warn!(url = %url, status = status.as_u16(), "server error response");
            }
            return Err(FetchError::http_status_with_retry_after(
                url,
                status.as_u16(),
                retry_after,
            ));
        }

        let bytes = response.bytes().await.map_err(|e| {
            if e.is_timeout() {
                FetchError::timeout(url)
            } else {
                FetchError::network(url, e)
            }
        })?;

        Ok(bytes.to_vec())
    }
}
