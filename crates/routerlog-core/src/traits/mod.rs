//! Core traits for the collector
//!
//! This module defines the abstract interfaces that all implementations must follow.
//!
//! - [`Fetcher`]: Retrieve raw router output
//! - [`UsageStore`]: Persistent usage ledger and lease records

pub mod fetcher;
pub mod usage_store;

pub use fetcher::Fetcher;
pub use usage_store::{CounterState, LeaseRecord, UsageSample, UsageStore, UsageTotals};
