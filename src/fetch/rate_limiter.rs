//! Per-domain request spacing.
//!
//! Mirroring hammers a single origin by nature, so the limiter enforces a
//! minimum delay between consecutive requests to the same host. Requests to
//! different hosts (external assets) proceed independently. Server-mandated
//! delays from `Retry-After` headers are recorded and folded into the same
//! per-domain accounting.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use dashmap::DashMap;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::{debug, warn};

/// Warning threshold for cumulative delay per domain.
const CUMULATIVE_DELAY_WARNING_THRESHOLD: Duration = Duration::from_secs(30);

/// Cap on Retry-After values.
const MAX_RETRY_AFTER: Duration = Duration::from_secs(3600);

/// Per-domain rate limiter.
///
/// Designed to be wrapped in `Arc` and shared by every fetch path (scheduler,
/// prober, entry-document fetch). `DashMap` holds per-domain state; the inner
/// `Mutex` makes the read-update of the last-request time atomic. The DashMap
/// shard lock is released before any await.
#[derive(Debug)]
pub struct RateLimiter {
    /// Minimum delay between requests to the same domain.
    default_delay: Duration,

    /// Set for `--rate-limit 0`.
    disabled: bool,

    /// Per-domain state.
    domains: DashMap<String, Arc<DomainState>>,
}

#[derive(Debug)]
struct DomainState {
    /// Time of the last request to this domain; `None` until first request.
    last_request: Mutex<Option<Instant>>,

    /// Total delay applied to this domain so far, in milliseconds.
    cumulative_delay_ms: AtomicU64,
}

impl DomainState {
    fn new() -> Self {
        Self {
            last_request: Mutex::new(None),
            cumulative_delay_ms: AtomicU64::new(0),
        }
    }

    #[allow(clippy::cast_possible_truncation)]
    fn add_cumulative_delay(&self, delay: Duration) -> Duration {
        let delay_ms = delay.as_millis() as u64;
        let new_total = self
            .cumulative_delay_ms
            .fetch_add(delay_ms, Ordering::SeqCst)
            + delay_ms;
        Duration::from_millis(new_total)
    }
}

impl RateLimiter {
    /// Creates a limiter with the given minimum per-domain delay.
    #[must_use]
    pub fn new(default_delay: Duration) -> Self {
        Self {
            default_delay,
            disabled: false,
            domains: DashMap::new(),
        }
    }

    /// Creates a limiter that applies no delays (`--rate-limit 0`).
    #[must_use]
    pub fn disabled() -> Self {
        Self {
            default_delay: Duration::ZERO,
            disabled: true,
            domains: DashMap::new(),
        }
    }

    /// Returns whether rate limiting is disabled.
    #[must_use]
    pub fn is_disabled(&self) -> bool {
        self.disabled
    }

    /// Returns the configured per-domain delay.
    #[must_use]
    pub fn default_delay(&self) -> Duration {
        self.default_delay
    }

    /// Waits until a request to `url`'s domain is allowed, then records the
    /// request time. The first request to any domain proceeds immediately.
    pub async fn acquire(&self, url: &str) {
        if self.disabled {
            return;
        }

        let domain = extract_domain(url);

        let state = self
            .domains
            .entry(domain.clone())
            .or_insert_with(|| Arc::new(DomainState::new()))
            .clone();

        let mut last_request_guard = state.last_request.lock().await;

        if let Some(last_request) = *last_request_guard {
            let elapsed = last_request.elapsed();

            if elapsed < self.default_delay {
                let delay = self.default_delay.saturating_sub(elapsed);
                let cumulative = state.add_cumulative_delay(delay);

                debug!(
                    domain = %domain,
                    delay_ms = delay.as_millis(),
                    "applying rate limit delay"
                );

                if cumulative >= CUMULATIVE_DELAY_WARNING_THRESHOLD {
                    warn!(
                        domain = %domain,
                        cumulative_delay_secs = cumulative.as_secs(),
                        "heavy rate limiting on this domain"
                    );
                }

                tokio::time::sleep(delay).await;
            }
        }

        *last_request_guard = Some(Instant::now());
    }

    /// Records a server-mandated delay (Retry-After) against the domain's
    /// cumulative accounting.
    pub fn record_rate_limit(&self, url: &str, delay: Duration) {
        let domain = extract_domain(url);

        let state = self
            .domains
            .entry(domain.clone())
            .or_insert_with(|| Arc::new(DomainState::new()));
        let cumulative = state.add_cumulative_delay(delay);

        debug!(
            domain = %domain,
            delay_ms = delay.as_millis(),
            "recorded server rate limit"
        );

        if cumulative >= CUMULATIVE_DELAY_WARNING_THRESHOLD {
            warn!(
                domain = %domain,
                cumulative_delay_secs = cumulative.as_secs(),
                "server is rate limiting aggressively"
            );
        }
    }
}

/// Extracts the lowercased host from a URL, or `"unknown"` when the URL does
/// not parse. Unparseable URLs still share one rate-limit bucket.
#[must_use]
pub fn extract_domain(url: &str) -> String {
    url::Url::parse(url)
        .ok()
        .and_then(|u| u.host_str().map(str::to_lowercase))
        .unwrap_or_else(|| "unknown".to_string())
}

/// Parses a Retry-After header value (integer seconds or HTTP-date per
/// RFC 7231) into a duration, capped at one hour.
#[must_use]
pub fn parse_retry_after(header_value: &str) -> Option<Duration> {
    let header_value = header_value.trim();

    if let Ok(seconds) = header_value.parse::<i64>() {
        if seconds < 0 {
            return None;
        }

        #[allow(clippy::cast_sign_loss)]
        let duration = Duration::from_secs(seconds as u64);
        return Some(duration.min(MAX_RETRY_AFTER));
    }

    let date = httpdate::parse_http_date(header_value).ok()?;
    let delay = date
        .duration_since(std::time::SystemTime::now())
        .unwrap_or(Duration::ZERO);
    Some(delay.min(MAX_RETRY_AFTER))
}
