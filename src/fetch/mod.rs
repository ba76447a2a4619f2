//! HTTP retrieval: client, retry policy, and per-domain rate limiting.
//!
//! [`FetchClient`] performs single retrievals; [`fetch_with_retry`] wraps it
//! with the [`RetryPolicy`] backoff loop behind the [`RateLimiter`]. Every
//! network access in the crate goes through one of these two entry points.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info};

mod client;
mod error;
pub mod rate_limiter;
mod retry;

pub use client::{BROWSER_USER_AGENT, DEFAULT_TIMEOUT_SECS, FetchClient};
pub use error::FetchError;
pub use rate_limiter::{RateLimiter, extract_domain, parse_retry_after};
pub use retry::{DEFAULT_MAX_RETRIES, FailureType, RetryDecision, RetryPolicy, classify_error};

/// Fetches `url` with rate limiting and bounded retries.
///
/// Each attempt acquires the rate limiter for the URL's domain first. On a
/// transient failure the policy's backoff delay applies, except that a 429
/// with a parseable Retry-After header takes the server's delay instead.
///
/// # Errors
///
/// Returns the final error and the total attempt count once the policy
/// declines to retry.
pub async fn fetch_with_retry(
    client: &FetchClient,
    url: &str,
    policy: &RetryPolicy,
    rate_limiter: &Arc<RateLimiter>,
) -> Result<Vec<u8>, (FetchError, u32)> {
    let mut attempt = 0u32;

    loop {
        attempt += 1;
        debug!(url = %url, attempt, "attempting fetch");

        rate_limiter.acquire(url).await;

        match client.fetch_bytes(url).await {
            Ok(bytes) => return Ok(bytes),
            Err(e) => {
                let failure_type = classify_error(&e);

                let retry_after_delay = if failure_type == FailureType::RateLimited {
                    extract_retry_after_delay(&e, url, rate_limiter)
                } else {
                    None
                };

                match policy.should_retry(failure_type, attempt) {
                    RetryDecision::Retry {
                        delay: backoff_delay,
                        attempt: next_attempt,
                    } => {
                        let delay = retry_after_delay.unwrap_or(backoff_delay);
                        info!(
                            url = %url,
                            attempt = next_attempt,
                            max_attempts = policy.max_attempts(),
                            delay_ms = delay.as_millis(),
                            error = %e,
                            "retrying fetch"
                        );
                        tokio::time::sleep(delay).await;
                    }
                    RetryDecision::DoNotRetry { reason } => {
                        debug!(url = %url, %reason, "not retrying fetch");
                        return Err((e, attempt));
                    }
                }
            }
        }
    }
}

/// Pulls the Retry-After delay out of a rate-limited error and records it
/// with the limiter for the domain.
fn extract_retry_after_delay(
    error: &FetchError,
    url: &str,
    rate_limiter: &RateLimiter,
) -> Option<Duration> {
    let retry_after_header = match error {
        FetchError::HttpStatus { retry_after, .. } => retry_after.as_ref()?,
        _ => return None,
    };

    let delay = parse_retry_after(retry_after_header)?;
    rate_limiter.record_rate_limit(url, delay);

    debug!(
        url = %url,
        retry_after = %retry_after_header,
        delay_ms = delay.as_millis(),
        "using Retry-After header delay"
    );

    Some(delay)
}
