// # routerlog-core
//
// Core library for the router usage collector.
//
// ## Architecture Overview
//
// This library provides the core functionality for per-device traffic accounting:
// - **Fetcher**: Trait for retrieving raw router output (one attempt per call)
// - **RetryPolicy**: Exponential backoff around any Fetcher
// - **parse**: Line-oriented parsers for traffic counters and DHCP leases
// - **reconcile**: Absolute counters → per-cycle deltas, with reset detection
// - **UsageStore**: Trait for the persistent usage ledger (SQLite, memory)
// - **RetentionSweeper**: Cutoff-based deletion of old samples and leases
// - **Collector**: Orchestrates one collection cycle
//
// ## Design Principles
//
// 1. **Separation of Concerns**: Transport, parsing and storage are independent
// 2. **One Unit per Device**: Each device reconciliation commits or rolls back alone
// 3. **Never Abort a Cycle**: Failures are logged and reported per URL
// 4. **Library-First**: All core functionality can be used as a library

pub mod collector;
pub mod config;
pub mod error;
pub mod fetch;
pub mod parse;
pub mod reconcile;
pub mod retention;
pub mod store;
pub mod traits;

// Re-export core types for convenience
pub use collector::{Collector, CycleReport, SourceReport, SourceStatus};
pub use config::{CollectorConfig, FetchConfig, RetentionConfig, SampleRetention};
pub use error::{Error, LineError, Result};
pub use fetch::{RetryPolicy, router_address};
pub use parse::{LeaseCandidate, TrafficObservation, parse_leases, parse_traffic};
pub use reconcile::{DeltaKind, Reconciliation, UsageDelta, reconcile};
pub use retention::{RetentionSweeper, SweepReport};
pub use store::{MemoryUsageStore, SqliteUsageStore};
pub use traits::{CounterState, Fetcher, LeaseRecord, UsageSample, UsageStore, UsageTotals};
