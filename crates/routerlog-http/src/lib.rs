// # HTTP Fetcher
//
// This crate provides the HTTP transport for the router usage collector.
//
// ## Purpose
//
// Routers expose their traffic counters and DHCP leases as plain-text pages
// (usually small CGI scripts). This fetcher performs a single GET per call:
//
// - Bounded by a client-level timeout
// - Non-2xx status is a fetch error
// - The body is returned as text, unparsed
//
// Retries and backoff are applied by `routerlog_core::RetryPolicy`.

use routerlog_core::config::FetchConfig;
use routerlog_core::traits::Fetcher;
use routerlog_core::{Error, Result};

use std::time::Duration;

/// User agent sent with every request
const USER_AGENT: &str = concat!("routerlog/", env!("CARGO_PKG_VERSION"));

/// HTTP fetcher for router endpoints
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    /// HTTP client
    client: reqwest::Client,

    /// Per-request timeout
    timeout: Duration,
}

impl HttpFetcher {
    /// Create a new HTTP fetcher
    ///
    /// # Parameters
    ///
    /// - `timeout`: Upper bound for one request, connect included
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| Error::config(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self { client, timeout })
    }

    /// Create a fetcher from fetch configuration
    pub fn from_config(config: &FetchConfig) -> Result<Self> {
        Self::new(config.timeout())
    }

    /// Per-request timeout
    pub fn timeout(&self) -> Duration {
        self.timeout
    }
}

#[async_trait::async_trait]
impl Fetcher for HttpFetcher {
    async fn fetch(&self, url: &str) -> Result<String> {
        let response = self.client.get(url).send().await.map_err(|e| {
            if e.is_timeout() {
                Error::fetch(format!("Request to {} timed out after {:?}", url, self.timeout))
            } else {
                Error::fetch(format!("Request to {} failed: {}", url, e))
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::fetch(format!("HTTP error from {}: {}", url, status)));
        }

        let body = response
            .text()
            .await
            .map_err(|e| Error::fetch(format!("Failed to read response from {}: {}", url, e)))?;

        tracing::debug!("GET {} -> {} ({} bytes)", url, status, body.len());
        Ok(body)
    }

    fn fetcher_name(&self) -> &'static str {
        "http"
    }
}
