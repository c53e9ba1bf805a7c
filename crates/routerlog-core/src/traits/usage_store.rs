// # Usage Store Trait
//
// Defines the interface for the persistent usage ledger.
//
// ## Purpose
//
// The store owns the four persisted entities:
// - Per-device counter state (last absolute reading, overwritten in place)
// - Per-device usage totals (running sums of increments)
// - Usage samples (append-only ledger of increments)
// - Lease records (first-seen wins, never updated)
//
// ## Implementations
//
// - SQLite: `store::sqlite`
// - In-memory: `store::memory`
//
// ## Usage
//
// ```rust,ignore
// use routerlog_core::{TrafficObservation, UsageStore};
//
// #[tokio::main]
// async fn main() -> anyhow::Result<()> {
//     let store = /* UsageStore implementation */;
//     let now = chrono::Local::now().naive_local();
//
//     let obs = TrafficObservation::new("aa:bb:cc:dd:ee:ff", 100, 200);
//     let outcome = store.record_observation(&obs, now).await?;
//     println!("+{} rx, +{} tx", outcome.delta.rx_bytes, outcome.delta.tx_bytes);
//
//     Ok(())
// }
// ```

use async_trait::async_trait;
use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

use crate::parse::{LeaseCandidate, TrafficObservation};
use crate::reconcile::Reconciliation;

/// Last absolute counter reading for a device
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CounterState {
    /// Device identifier (hardware address)
    pub device: String,
    /// Last observed absolute received bytes
    pub rx_bytes: u64,
    /// Last observed absolute transmitted bytes
    pub tx_bytes: u64,
}

/// Cumulative usage for a device
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UsageTotals {
    /// Device identifier (hardware address)
    pub device: String,
    /// Cumulative received bytes
    pub rx_bytes: u64,
    /// Cumulative transmitted bytes
    pub tx_bytes: u64,
}

/// One ledger row: bytes transferred by a device during one collection cycle
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UsageSample {
    /// Cycle timestamp (local wall-clock time)
    pub timestamp: NaiveDateTime,
    /// Device identifier (hardware address)
    pub device: String,
    /// Incremental received bytes
    pub rx_bytes: u64,
    /// Incremental transmitted bytes
    pub tx_bytes: u64,
}

/// A lease as first seen by the collector
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LeaseRecord {
    /// Date the identifier was first recorded
    pub first_seen: NaiveDate,
    /// Router the lease was collected from
    pub router: String,
    /// Hardware address or DUID
    pub identifier: String,
    /// Network address at first sight
    pub address: String,
    /// Hostname at first sight
    pub hostname: Option<String>,
}

/// Trait for usage store implementations
///
/// Implementations must be thread-safe and usable across async tasks.
///
/// ## Atomicity
///
/// [`UsageStore::record_observation`] is one reconciliation unit: the counter
/// state overwrite, the totals update and the sample append either all become
/// visible or none does. Implementations compute the increments with
/// [`crate::reconcile::reconcile`] against the state read inside that same unit.
///
/// ## Forbidden Capabilities
/// - ❌ Fetch or parse router output (owned by `Fetcher` and `parse`)
/// - ❌ Decide when sweeps or daily tasks run (owned by `Collector`)
/// - ❌ Change the delta rules (owned by `reconcile`)
#[async_trait]
pub trait UsageStore: Send + Sync {
    /// Reconcile one observation against the stored counter state
    ///
    /// # Parameters
    ///
    /// - `observation`: Absolute counters reported by the router
    /// - `at`: Cycle timestamp written to the usage sample
    ///
    /// # Returns
    ///
    /// - `Ok(Reconciliation)`: The committed increments and new state
    /// - `Err(Error)`: Storage error; nothing was written for this device
    async fn record_observation(
        &self,
        observation: &TrafficObservation,
        at: NaiveDateTime,
    ) -> Result<Reconciliation, crate::Error>;

    /// Insert lease records that are not already known
    ///
    /// Existing identifiers are left untouched; within one batch the first
    /// occurrence of an identifier wins.
    ///
    /// # Returns
    ///
    /// - `Ok(usize)`: Number of records inserted
    /// - `Err(Error)`: Storage error; nothing was inserted
    async fn record_leases(
        &self,
        leases: &[LeaseCandidate],
        router: &str,
        first_seen: NaiveDate,
    ) -> Result<usize, crate::Error>;

    /// Get the stored counter state for a device
    async fn counter_state(&self, device: &str) -> Result<Option<CounterState>, crate::Error>;

    /// Get the usage totals for a device
    async fn usage_totals(&self, device: &str) -> Result<Option<UsageTotals>, crate::Error>;

    /// List the usage samples of a device, oldest first
    async fn usage_samples(&self, device: &str) -> Result<Vec<UsageSample>, crate::Error>;

    /// Get the lease record for an identifier
    async fn lease(&self, identifier: &str) -> Result<Option<LeaseRecord>, crate::Error>;

    /// Delete usage samples with `timestamp < cutoff`
    ///
    /// # Returns
    ///
    /// - `Ok(usize)`: Number of samples deleted
    async fn delete_samples_before(&self, cutoff: NaiveDateTime) -> Result<usize, crate::Error>;

    /// Delete lease records first seen before `cutoff`
    ///
    /// # Returns
    ///
    /// - `Ok(usize)`: Number of lease records deleted
    async fn delete_leases_before(&self, cutoff: NaiveDate) -> Result<usize, crate::Error>;
}
