//! Retention sweeps
//!
//! Usage samples and lease records are deleted when they are strictly older
//! than a cutoff. A row exactly at the cutoff is kept.

use chrono::{Datelike, Duration, NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use tracing::{error, info};

use crate::config::{RetentionConfig, SampleRetention};
use crate::traits::UsageStore;

/// Rows deleted by one sweep
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SweepReport {
    /// Deleted usage samples
    pub samples_deleted: usize,
    /// Deleted lease records
    pub leases_deleted: usize,
    /// Sweeps that failed (0 to 2)
    pub failures: usize,
}

/// Applies the configured retention policies to a store
#[derive(Debug, Clone)]
pub struct RetentionSweeper {
    config: RetentionConfig,
}

impl RetentionSweeper {
    /// Create a sweeper for the given policies
    pub fn new(config: RetentionConfig) -> Self {
        Self { config }
    }

    /// Cutoff for usage samples, `None` when the sweep is disabled
    pub fn sample_cutoff(&self, now: NaiveDateTime) -> Option<NaiveDateTime> {
        match self.config.samples {
            SampleRetention::CalendarMonth => NaiveDate::from_ymd_opt(now.year(), now.month(), 1)
                .and_then(|first| first.and_hms_opt(0, 0, 0)),
            SampleRetention::RollingWindow { days } if days > 0 => {
                now.checked_sub_signed(Duration::try_days(days)?)
            }
            SampleRetention::RollingWindow { .. } | SampleRetention::Disabled => None,
        }
    }

    /// Cutoff for lease records, `None` when the sweep is disabled
    pub fn lease_cutoff(&self, today: NaiveDate) -> Option<NaiveDate> {
        match self.config.lease_max_age_days {
            Some(days) if days > 0 => today.checked_sub_signed(Duration::try_days(days)?),
            _ => None,
        }
    }

    /// Delete everything older than the cutoffs derived from `now`
    ///
    /// The sample and lease sweeps run independently. A failed sweep is
    /// logged and counted in [`SweepReport::failures`].
    pub async fn sweep(&self, store: &dyn UsageStore, now: NaiveDateTime) -> SweepReport {
        let mut report = SweepReport::default();

        match self.sample_cutoff(now) {
            Some(cutoff) => match store.delete_samples_before(cutoff).await {
                Ok(deleted) => {
                    report.samples_deleted = deleted;
                    info!("Deleted {} usage samples older than {}", deleted, cutoff);
                }
                Err(e) => {
                    report.failures += 1;
                    error!("Usage sample sweep before {} failed: {}", cutoff, e);
                }
            },
            None => info!("Usage sample retention disabled"),
        }

        if let Some(cutoff) = self.lease_cutoff(now.date()) {
            match store.delete_leases_before(cutoff).await {
                Ok(deleted) => {
                    report.leases_deleted = deleted;
                    info!(
                        "Deleted {} lease records first seen before {}",
                        deleted, cutoff
                    );
                }
                Err(e) => {
                    report.failures += 1;
                    error!("Lease sweep before {} failed: {}", cutoff, e);
                }
            }
        }

        report
    }
}
