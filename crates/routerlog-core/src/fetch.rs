//! Retry policy for router fetches
//!
//! A [`Fetcher`] performs one attempt. [`RetryPolicy`] repeats failed
//! attempts with exponential backoff: the wait after attempt `n` is
//! `base × 2^(n-1)`, and there is no wait after the final attempt.

use std::time::Duration;
use tracing::{debug, warn};

use crate::config::FetchConfig;
use crate::error::{Error, Result};
use crate::traits::Fetcher;

/// Upper bound on the backoff exponent
const MAX_BACKOFF_SHIFT: u32 = 16;

/// Attempt count and backoff for fetching one URL
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first one
    pub max_attempts: u32,
    /// Wait after the first failed attempt
    pub base_backoff: Duration,
}

impl RetryPolicy {
    /// Create a new retry policy
    pub fn new(max_attempts: u32, base_backoff: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base_backoff,
        }
    }

    /// Build the policy from fetch configuration
    pub fn from_config(config: &FetchConfig) -> Self {
        Self::new(config.max_attempts, config.retry_backoff())
    }

    /// Wait after failed attempt `attempt` (1-based)
    pub fn backoff_for(&self, attempt: u32) -> Duration {
        let shift = attempt.saturating_sub(1).min(MAX_BACKOFF_SHIFT);
        self.base_backoff.saturating_mul(1 << shift)
    }

    /// Fetch `url`, retrying failed attempts
    ///
    /// # Returns
    ///
    /// - `Ok(String)`: Body of the first successful attempt
    /// - `Err(Error)`: Error of the last attempt once all attempts failed
    pub async fn fetch_with_retries(&self, fetcher: &dyn Fetcher, url: &str) -> Result<String> {
        let mut attempt = 1;

        loop {
            match fetcher.fetch(url).await {
                Ok(body) => {
                    debug!(
                        "Fetched {} bytes from {} via {} (attempt {})",
                        body.len(),
                        url,
                        fetcher.fetcher_name(),
                        attempt
                    );
                    return Ok(body);
                }
                Err(e) if attempt < self.max_attempts => {
                    let wait = self.backoff_for(attempt);
                    warn!(
                        "Fetch attempt {}/{} for {} failed: {}. Retrying in {:?}",
                        attempt, self.max_attempts, url, e, wait
                    );
                    tokio::time::sleep(wait).await;
                    attempt += 1;
                }
                Err(e) => {
                    warn!(
                        "Fetch attempt {}/{} for {} failed: {}. Giving up",
                        attempt, self.max_attempts, url, e
                    );
                    return Err(match e {
                        Error::Fetch(_) => e,
                        other => Error::fetch(other.to_string()),
                    });
                }
            }
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_config(&FetchConfig::default())
    }
}

/// Router address of a fetch URL: its authority component
///
/// `http://192.168.1.1:8080/cgi-bin/leases` yields `192.168.1.1:8080`.
pub fn router_address(url: &str) -> Option<&str> {
    let (_, rest) = url.split_once("://")?;
    let end = rest.find(['/', '?', '#']).unwrap_or(rest.len());
    let authority = &rest[..end];
    let host = authority.rsplit_once('@').map_or(authority, |(_, host)| host);

    if host.is_empty() { None } else { Some(host) }
}
