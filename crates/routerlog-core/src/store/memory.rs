// # Memory Usage Store
//
// In-memory implementation of UsageStore.
//
// ## Purpose
//
// Provides a simple, fast store that doesn't persist across restarts.
// Useful for testing and for embedding the collector where another
// component owns persistence.
//
// ## Atomicity
//
// Every operation holds the write lock for its whole duration and computes
// all new values before mutating anything, so a reconciliation unit is
// either fully applied or not applied at all.

use async_trait::async_trait;
use chrono::{NaiveDate, NaiveDateTime};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::Error;
use crate::parse::{LeaseCandidate, TrafficObservation};
use crate::reconcile::{self, Reconciliation};
use crate::traits::usage_store::{CounterState, LeaseRecord, UsageSample, UsageStore, UsageTotals};

#[derive(Debug, Default)]
struct Ledger {
    states: HashMap<String, CounterState>,
    totals: HashMap<String, UsageTotals>,
    samples: Vec<UsageSample>,
    leases: HashMap<String, LeaseRecord>,
}

/// In-memory usage store implementation
///
/// # Example
///
/// ```rust,no_run
/// use routerlog_core::store::MemoryUsageStore;
/// use routerlog_core::{TrafficObservation, UsageStore};
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let store = MemoryUsageStore::new();
///     let now = chrono::Local::now().naive_local();
///
///     let obs = TrafficObservation::new("aa:bb:cc:dd:ee:ff", 100, 200);
///     store.record_observation(&obs, now).await?;
///
///     let totals = store.usage_totals("aa:bb:cc:dd:ee:ff").await?;
///     assert_eq!(totals.map(|t| t.rx_bytes), Some(100));
///
///     Ok(())
/// }
/// ```
#[derive(Debug, Clone, Default)]
pub struct MemoryUsageStore {
    inner: Arc<RwLock<Ledger>>,
}

impl MemoryUsageStore {
    /// Create a new empty memory store
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of usage samples in the ledger
    pub async fn sample_count(&self) -> usize {
        self.inner.read().await.samples.len()
    }

    /// Number of lease records
    pub async fn lease_count(&self) -> usize {
        self.inner.read().await.leases.len()
    }

    /// Clear all records from the store
    pub async fn clear(&self) {
        *self.inner.write().await = Ledger::default();
    }
}

#[async_trait]
impl UsageStore for MemoryUsageStore {
    async fn record_observation(
        &self,
        observation: &TrafficObservation,
        at: NaiveDateTime,
    ) -> Result<Reconciliation, Error> {
        let mut guard = self.inner.write().await;

        let result = reconcile::reconcile(observation, guard.states.get(&observation.device));
        let previous = guard
            .totals
            .get(&observation.device)
            .map(|t| (t.rx_bytes, t.tx_bytes));
        let (rx_total, tx_total) = reconcile::accumulate(previous, result.delta);

        guard
            .states
            .insert(observation.device.clone(), result.state.clone());
        guard.totals.insert(
            observation.device.clone(),
            UsageTotals {
                device: observation.device.clone(),
                rx_bytes: rx_total,
                tx_bytes: tx_total,
            },
        );
        guard.samples.push(UsageSample {
            timestamp: at,
            device: observation.device.clone(),
            rx_bytes: result.delta.rx_bytes,
            tx_bytes: result.delta.tx_bytes,
        });

        Ok(result)
    }

    async fn record_leases(
        &self,
        leases: &[LeaseCandidate],
        router: &str,
        first_seen: NaiveDate,
    ) -> Result<usize, Error> {
        let mut guard = self.inner.write().await;
        let mut inserted = 0;

        for lease in leases {
            if guard.leases.contains_key(&lease.identifier) {
                continue;
            }
            guard.leases.insert(
                lease.identifier.clone(),
                LeaseRecord {
                    first_seen,
                    router: router.to_string(),
                    identifier: lease.identifier.clone(),
                    address: lease.address.clone(),
                    hostname: lease.hostname.clone(),
                },
            );
            inserted += 1;
        }

        Ok(inserted)
    }

    async fn counter_state(&self, device: &str) -> Result<Option<CounterState>, Error> {
        Ok(self.inner.read().await.states.get(device).cloned())
    }

    async fn usage_totals(&self, device: &str) -> Result<Option<UsageTotals>, Error> {
        Ok(self.inner.read().await.totals.get(device).cloned())
    }

    async fn usage_samples(&self, device: &str) -> Result<Vec<UsageSample>, Error> {
        let guard = self.inner.read().await;
        Ok(guard
            .samples
            .iter()
            .filter(|s| s.device == device)
            .cloned()
            .collect())
    }

    async fn lease(&self, identifier: &str) -> Result<Option<LeaseRecord>, Error> {
        Ok(self.inner.read().await.leases.get(identifier).cloned())
    }

    async fn delete_samples_before(&self, cutoff: NaiveDateTime) -> Result<usize, Error> {
        let mut guard = self.inner.write().await;
        let before = guard.samples.len();
        guard.samples.retain(|s| s.timestamp >= cutoff);
        Ok(before - guard.samples.len())
    }

    async fn delete_leases_before(&self, cutoff: NaiveDate) -> Result<usize, Error> {
        let mut guard = self.inner.write().await;
        let before = guard.leases.len();
        guard.leases.retain(|_, lease| lease.first_seen >= cutoff);
        Ok(before - guard.leases.len())
    }
}
