//! Collection cycle
//!
//! The Collector is responsible for:
//! - Fetching traffic and lease dumps via a Fetcher, with retries
//! - Parsing the dumps
//! - Reconciling each device against the UsageStore
//! - Running the daily lease collection and retention sweep
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────┐
//! │   Fetcher   │─── raw text ───┐
//! └─────────────┘                │
//!                                ▼
//!                       ┌──────────────┐
//!                       │  Collector   │── parse ──┐
//!                       └──────────────┘           │
//!                                │                 │
//!          ┌─────────────────────┼─────────────────┘
//!          │                     │
//!          ▼                     ▼
//! ┌─────────────┐       ┌──────────────────┐
//! │ UsageStore  │       │  CycleReport     │
//! │ (per unit)  │       │  (per URL)       │
//! └─────────────┘       └──────────────────┘
//! ```
//!
//! ## Cycle Flow
//!
//! 1. Traffic task, every cycle: fetch, parse, one store unit per device
//! 2. At the daily hour: lease task, then retention sweep
//! 3. Every failure is logged and reported, never propagated

use chrono::{NaiveDate, NaiveDateTime, Timelike};
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::{debug, error, info, warn};

use crate::config::CollectorConfig;
use crate::error::Result;
use crate::fetch::{RetryPolicy, router_address};
use crate::parse::{self, ParseOutcome};
use crate::retention::{RetentionSweeper, SweepReport};
use crate::traits::{Fetcher, UsageStore};

/// Outcome of processing one URL
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum SourceStatus {
    /// All fetch attempts failed
    FetchFailed {
        /// Error of the last attempt
        error: String,
    },

    /// The body parsed to zero records
    Empty {
        /// Lines that could not be parsed
        skipped_lines: usize,
    },

    /// Records were parsed and handed to the store
    Collected {
        /// Parsed records
        records: usize,
        /// Lines that could not be parsed
        skipped_lines: usize,
        /// Units written (for leases: newly inserted records)
        stored: usize,
        /// Units rolled back
        failed: usize,
    },
}

impl fmt::Display for SourceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::FetchFailed { error } => write!(f, "fetch failed: {}", error),
            Self::Empty { skipped_lines } => {
                write!(f, "no records ({} lines skipped)", skipped_lines)
            }
            Self::Collected {
                records,
                skipped_lines,
                stored,
                failed,
            } => write!(
                f,
                "{} records, {} stored, {} failed, {} lines skipped",
                records, stored, failed, skipped_lines
            ),
        }
    }
}

/// Per-URL summary
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceReport {
    /// Fetched URL
    pub url: String,
    /// Router address derived from the URL
    pub router: Option<String>,
    /// What happened
    pub status: SourceStatus,
}

/// Summary of one collection cycle
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CycleReport {
    /// Time stamped on every sample of the cycle
    pub started_at: NaiveDateTime,
    /// One entry per traffic URL, in configuration order
    pub traffic: Vec<SourceReport>,
    /// One entry per lease URL, empty when daily tasks did not run
    pub leases: Vec<SourceReport>,
    /// Whether the daily tasks ran
    pub daily_tasks_ran: bool,
    /// Retention sweep result, `None` when daily tasks did not run
    pub sweep: Option<SweepReport>,
}

impl CycleReport {
    /// All per-URL reports, traffic first
    pub fn sources(&self) -> impl Iterator<Item = &SourceReport> {
        self.traffic.iter().chain(self.leases.iter())
    }

    /// Number of URLs whose fetch failed
    pub fn fetch_failures(&self) -> usize {
        self.sources()
            .filter(|s| matches!(s.status, SourceStatus::FetchFailed { .. }))
            .count()
    }

    /// Number of store units that were rolled back
    pub fn failed_units(&self) -> usize {
        self.sources()
            .map(|s| match s.status {
                SourceStatus::Collected { failed, .. } => failed,
                _ => 0,
            })
            .sum()
    }
}

/// Router usage collector
///
/// One call to [`Collector::run_cycle`] is one scheduled invocation. There
/// is no internal scheduler; the caller decides when cycles run.
///
/// ## Lifecycle
///
/// 1. Create with [`Collector::new()`]
/// 2. Call [`Collector::run_cycle()`] once per scheduling tick
/// 3. Inspect the returned [`CycleReport`]
pub struct Collector {
    /// Single-attempt transport
    fetcher: Box<dyn Fetcher>,

    /// Usage ledger
    store: Box<dyn UsageStore>,

    /// Endpoints returning traffic counters
    traffic_urls: Vec<String>,

    /// Endpoints returning lease dumps
    lease_urls: Vec<String>,

    /// Hour of day at which daily tasks run
    daily_run_hour: u32,

    /// Attempts and backoff per URL
    retry: RetryPolicy,

    /// Retention policies
    sweeper: RetentionSweeper,
}

impl Collector {
    /// Create a new collector
    ///
    /// # Parameters
    ///
    /// - `fetcher`: Fetcher implementation
    /// - `store`: Usage store implementation
    /// - `config`: Collector configuration
    ///
    /// # Returns
    ///
    /// The collector, or a configuration error if `config` is invalid
    pub fn new(
        fetcher: Box<dyn Fetcher>,
        store: Box<dyn UsageStore>,
        config: CollectorConfig,
    ) -> Result<Self> {
        config.validate()?;

        Ok(Self {
            fetcher,
            store,
            retry: RetryPolicy::from_config(&config.fetch),
            sweeper: RetentionSweeper::new(config.retention),
            traffic_urls: config.traffic_urls,
            lease_urls: config.lease_urls,
            daily_run_hour: config.daily_run_hour,
        })
    }

    /// The underlying store
    pub fn store(&self) -> &dyn UsageStore {
        self.store.as_ref()
    }

    /// Whether `now` falls in the daily task hour
    pub fn is_daily_hour(&self, now: NaiveDateTime) -> bool {
        now.hour() == self.daily_run_hour
    }

    /// Run one collection cycle
    ///
    /// Never fails: fetch, parse and store failures are logged and
    /// reported per URL.
    pub async fn run_cycle(&self, now: NaiveDateTime) -> CycleReport {
        info!("Starting collection cycle at {}", now);

        let traffic = self.collect_traffic(now).await;

        let daily_tasks_ran = self.is_daily_hour(now);
        let (leases, sweep) = if daily_tasks_ran {
            info!("Running daily tasks (hour {})", self.daily_run_hour);
            let leases = self.collect_leases(now.date()).await;
            let sweep = self.sweeper.sweep(self.store.as_ref(), now).await;
            (leases, Some(sweep))
        } else {
            debug!(
                "Skipping daily tasks: hour {} is not {}",
                now.hour(),
                self.daily_run_hour
            );
            (Vec::new(), None)
        };

        let report = CycleReport {
            started_at: now,
            traffic,
            leases,
            daily_tasks_ran,
            sweep,
        };

        info!(
            "Collection cycle finished: {} URLs, {} fetch failures, {} failed units",
            report.sources().count(),
            report.fetch_failures(),
            report.failed_units()
        );

        report
    }

    /// Fetch every traffic URL and reconcile each device at `now`
    pub async fn collect_traffic(&self, now: NaiveDateTime) -> Vec<SourceReport> {
        let mut reports = Vec::with_capacity(self.traffic_urls.len());

        for url in &self.traffic_urls {
            let status = match self.fetch(url).await {
                Err(status) => status,
                Ok(raw) => {
                    let outcome = parse::parse_traffic(&raw);
                    match empty_status(&outcome) {
                        Some(status) => {
                            warn!("No valid traffic data from {}", url);
                            status
                        }
                        None => self.store_traffic(url, &outcome, now).await,
                    }
                }
            };

            info!("Traffic from {}: {}", url, status);
            reports.push(source_report(url, status));
        }

        reports
    }

    /// Fetch every lease URL and record unseen leases as first seen on `today`
    pub async fn collect_leases(&self, today: NaiveDate) -> Vec<SourceReport> {
        let mut reports = Vec::with_capacity(self.lease_urls.len());

        for url in &self.lease_urls {
            let status = match self.fetch(url).await {
                Err(status) => status,
                Ok(raw) => {
                    let outcome = parse::parse_leases(&raw);
                    match empty_status(&outcome) {
                        Some(status) => {
                            warn!("No valid lease data from {}", url);
                            status
                        }
                        None => {
                            let router = router_address(url).unwrap_or(url);
                            let records = outcome.records.len();
                            let skipped_lines = outcome.issues.len();

                            match self.store.record_leases(&outcome.records, router, today).await {
                                Ok(inserted) => SourceStatus::Collected {
                                    records,
                                    skipped_lines,
                                    stored: inserted,
                                    failed: 0,
                                },
                                Err(e) => {
                                    error!("Failed to record leases from {}: {}", url, e);
                                    SourceStatus::Collected {
                                        records,
                                        skipped_lines,
                                        stored: 0,
                                        failed: records,
                                    }
                                }
                            }
                        }
                    }
                }
            };

            info!("Leases from {}: {}", url, status);
            reports.push(source_report(url, status));
        }

        reports
    }

    async fn fetch(&self, url: &str) -> std::result::Result<String, SourceStatus> {
        self.retry
            .fetch_with_retries(self.fetcher.as_ref(), url)
            .await
            .map_err(|e| {
                error!("Giving up on {}: {}", url, e);
                SourceStatus::FetchFailed {
                    error: e.to_string(),
                }
            })
    }

    async fn store_traffic(
        &self,
        url: &str,
        outcome: &ParseOutcome<parse::TrafficObservation>,
        now: NaiveDateTime,
    ) -> SourceStatus {
        let mut stored = 0;
        let mut failed = 0;

        for observation in &outcome.records {
            match self.store.record_observation(observation, now).await {
                Ok(result) => {
                    stored += 1;
                    debug!(
                        "{} from {}: +{} rx, +{} tx ({:?})",
                        observation.device,
                        url,
                        result.delta.rx_bytes,
                        result.delta.tx_bytes,
                        result.kind
                    );
                }
                Err(e) => {
                    failed += 1;
                    error!("Failed to record usage for {}: {}", observation.device, e);
                }
            }
        }

        SourceStatus::Collected {
            records: outcome.records.len(),
            skipped_lines: outcome.issues.len(),
            stored,
            failed,
        }
    }
}

fn empty_status<T>(outcome: &ParseOutcome<T>) -> Option<SourceStatus> {
    outcome.records.is_empty().then(|| SourceStatus::Empty {
        skipped_lines: outcome.issues.len(),
    })
}

fn source_report(url: &str, status: SourceStatus) -> SourceReport {
    SourceReport {
        url: url.to_string(),
        router: router_address(url).map(str::to_string),
        status,
    }
}
