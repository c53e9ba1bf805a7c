//! Test doubles and common utilities for collector contract tests
//!
//! This module provides minimal test doubles that script router responses
//! and inject store failures without any network or disk access.

#![allow(dead_code)]

use chrono::{NaiveDate, NaiveDateTime};
use routerlog_core::error::{Error, Result};
use routerlog_core::parse::{LeaseCandidate, TrafficObservation};
use routerlog_core::reconcile::Reconciliation;
use routerlog_core::store::MemoryUsageStore;
use routerlog_core::traits::{
    CounterState, Fetcher, LeaseRecord, UsageSample, UsageStore, UsageTotals,
};
use routerlog_core::CollectorConfig;
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// One scripted reply
#[derive(Debug, Clone)]
pub enum Reply {
    Body(String),
    Failure(String),
}

/// A Fetcher that replays scripted replies per URL
///
/// Each URL has a queue of replies. Once the queue holds a single reply, that
/// reply is repeated forever. A URL without a script fails.
#[derive(Clone, Default)]
pub struct ScriptedFetcher {
    scripts: Arc<Mutex<HashMap<String, VecDeque<Reply>>>>,
    calls: Arc<Mutex<Vec<(String, tokio::time::Instant)>>>,
}

impl ScriptedFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a successful reply for `url`
    pub fn respond(&self, url: &str, body: &str) -> &Self {
        self.push(url, Reply::Body(body.to_string()))
    }

    /// Queue `times` failed replies for `url`
    pub fn fail(&self, url: &str, times: usize) -> &Self {
        for _ in 0..times {
            self.push(url, Reply::Failure("connection refused".to_string()));
        }
        self
    }

    fn push(&self, url: &str, reply: Reply) -> &Self {
        self.scripts
            .lock()
            .unwrap()
            .entry(url.to_string())
            .or_default()
            .push_back(reply);
        self
    }

    /// Number of attempts made against `url`
    pub fn call_count(&self, url: &str) -> usize {
        self.calls.lock().unwrap().iter().filter(|(u, _)| u == url).count()
    }

    /// Instants of every attempt against `url`
    pub fn call_times(&self, url: &str) -> Vec<tokio::time::Instant> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|(u, _)| u == url)
            .map(|(_, at)| *at)
            .collect()
    }

    /// URLs in the order they were attempted
    pub fn call_order(&self) -> Vec<String> {
        self.calls.lock().unwrap().iter().map(|(u, _)| u.clone()).collect()
    }
}

#[async_trait::async_trait]
impl Fetcher for ScriptedFetcher {
    async fn fetch(&self, url: &str) -> Result<String> {
        self.calls
            .lock()
            .unwrap()
            .push((url.to_string(), tokio::time::Instant::now()));

        let reply = {
            let mut scripts = self.scripts.lock().unwrap();
            match scripts.get_mut(url) {
                Some(queue) if queue.len() > 1 => queue.pop_front(),
                Some(queue) => queue.front().cloned(),
                None => None,
            }
        };

        match reply {
            Some(Reply::Body(body)) => Ok(body),
            Some(Reply::Failure(msg)) => Err(Error::fetch(msg)),
            None => Err(Error::fetch(format!("no script for {}", url))),
        }
    }

    fn fetcher_name(&self) -> &'static str {
        "scripted"
    }
}

/// A UsageStore that rejects selected devices and delegates the rest
#[derive(Clone)]
pub struct FailingStore {
    inner: MemoryUsageStore,
    rejected: Arc<HashSet<String>>,
    fail_leases: bool,
    fail_sample_sweep: bool,
}

impl FailingStore {
    /// Reject every observation for the given devices
    pub fn rejecting(inner: MemoryUsageStore, devices: &[&str]) -> Self {
        Self {
            inner,
            rejected: Arc::new(devices.iter().map(|d| d.to_string()).collect()),
            fail_leases: false,
            fail_sample_sweep: false,
        }
    }

    /// Reject every lease batch
    pub fn rejecting_leases(inner: MemoryUsageStore) -> Self {
        Self {
            inner,
            rejected: Arc::new(HashSet::new()),
            fail_leases: true,
            fail_sample_sweep: false,
        }
    }

    /// Reject every usage sample sweep
    pub fn rejecting_sample_sweep(inner: MemoryUsageStore) -> Self {
        Self {
            inner,
            rejected: Arc::new(HashSet::new()),
            fail_leases: false,
            fail_sample_sweep: true,
        }
    }
}

#[async_trait::async_trait]
impl UsageStore for FailingStore {
    async fn record_observation(
        &self,
        observation: &TrafficObservation,
        at: NaiveDateTime,
    ) -> Result<Reconciliation> {
        if self.rejected.contains(&observation.device) {
            return Err(Error::store(format!("rejected {}", observation.device)));
        }
        self.inner.record_observation(observation, at).await
    }

    async fn record_leases(
        &self,
        leases: &[LeaseCandidate],
        router: &str,
        first_seen: NaiveDate,
    ) -> Result<usize> {
        if self.fail_leases {
            return Err(Error::store("lease table locked"));
        }
        self.inner.record_leases(leases, router, first_seen).await
    }

    async fn counter_state(&self, device: &str) -> Result<Option<CounterState>> {
        self.inner.counter_state(device).await
    }

    async fn usage_totals(&self, device: &str) -> Result<Option<UsageTotals>> {
        self.inner.usage_totals(device).await
    }

    async fn usage_samples(&self, device: &str) -> Result<Vec<UsageSample>> {
        self.inner.usage_samples(device).await
    }

    async fn lease(&self, identifier: &str) -> Result<Option<LeaseRecord>> {
        self.inner.lease(identifier).await
    }

    async fn delete_samples_before(&self, cutoff: NaiveDateTime) -> Result<usize> {
        if self.fail_sample_sweep {
            return Err(Error::store("usage table locked"));
        }
        self.inner.delete_samples_before(cutoff).await
    }

    async fn delete_leases_before(&self, cutoff: NaiveDate) -> Result<usize> {
        self.inner.delete_leases_before(cutoff).await
    }
}

pub const TRAFFIC_URL: &str = "http://192.168.1.1/cgi-bin/traffic";
pub const LEASE_URL: &str = "http://192.168.1.1/cgi-bin/leases";

/// Helper to create a minimal CollectorConfig for testing
pub fn minimal_config(traffic_urls: &[&str], lease_urls: &[&str]) -> CollectorConfig {
    let mut config = CollectorConfig::new(
        traffic_urls.iter().map(|u| u.to_string()).collect(),
        "unused.db",
    );
    config.lease_urls = lease_urls.iter().map(|u| u.to_string()).collect();
    config.daily_run_hour = 0;
    config.fetch.max_attempts = 3;
    config.fetch.retry_backoff_ms = 1000;
    config
}

/// `2024-05-<day> <hour>:00:00`
pub fn at(day: u32, hour: u32) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2024, 5, day)
        .unwrap()
        .and_hms_opt(hour, 0, 0)
        .unwrap()
}

/// Assert two paused-clock durations match up to timer granularity
pub fn assert_near(actual: Duration, expected: Duration) {
    let skew = actual.abs_diff(expected);
    assert!(skew <= Duration::from_millis(5), "{:?} != {:?}", actual, expected);
}
