// # Fetcher Trait
//
// Defines the interface for retrieving raw text dumps from router endpoints.
//
// ## Implementations
//
// - HTTP (reqwest): `routerlog-http` crate
// - Test doubles: scripted fetchers in the contract tests
//
// ## Usage
//
// ```rust,ignore
// use routerlog_core::Fetcher;
//
// #[tokio::main]
// async fn main() -> anyhow::Result<()> {
//     let fetcher = /* Fetcher implementation */;
//
//     // One attempt, no retries
//     let body = fetcher.fetch("http://192.168.1.1/cgi-bin/traffic").await?;
//     println!("{}", body);
//
//     Ok(())
// }
// ```

use async_trait::async_trait;

/// Trait for fetcher implementations
///
/// A fetcher performs exactly one bounded-timeout request per call.
///
/// ## Forbidden Capabilities
/// - ❌ Implement retry or backoff logic (owned by [`crate::fetch::RetryPolicy`])
/// - ❌ Parse the body (owned by [`crate::parse`])
/// - ❌ Access the usage store (owned by [`crate::Collector`])
///
/// Any network-level failure or non-success status must be returned as
/// [`crate::Error::Fetch`] so the retry policy can classify it.
#[async_trait]
pub trait Fetcher: Send + Sync {
    /// Fetch the body of `url` as text
    ///
    /// # Returns
    ///
    /// - `Ok(String)`: The response body
    /// - `Err(Error)`: Timeout, connection failure or non-success status
    async fn fetch(&self, url: &str) -> Result<String, crate::Error>;

    /// Short name used in logs
    fn fetcher_name(&self) -> &'static str {
        "fetcher"
    }
}
