// # routerlogd - Router Usage Collector
//
// The routerlogd binary is a thin integration layer. All collection logic
// lives in routerlog-core. It is responsible for:
// 1. Reading settings from environment variables
// 2. Loading the JSON collector configuration
// 3. Initializing logging and the runtime
// 4. Opening the SQLite store and running exactly one collection cycle
//
// It is meant to be started by an external scheduler (cron, systemd timer)
// once per collection interval.
//
// ## Environment
//
// - `ROUTERLOG_CONFIG`: Path to the JSON configuration file (default: `config.json`)
// - `ROUTERLOG_LOG_LEVEL`: trace, debug, info, warn or error (default: `info`)
//
// ## Example
//
// ```bash
// export ROUTERLOG_CONFIG=/etc/routerlog/config.json
//
// # crontab: hourly collection
// 0 * * * * /usr/local/bin/routerlogd
// ```

use anyhow::{Context, Result};
use routerlog_core::store::SqliteUsageStore;
use routerlog_core::{Collector, CollectorConfig, CycleReport, SourceStatus};
use routerlog_http::HttpFetcher;
use std::env;
use std::process::ExitCode;
use tracing::{Level, error, info, warn};
use tracing_subscriber::FmtSubscriber;

const DEFAULT_CONFIG_PATH: &str = "config.json";

/// Exit codes for different termination scenarios
///
/// - 0: Cycle completed, even with per-URL or per-device failures
/// - 1: Configuration or startup error, nothing was collected
/// - 2: Runtime error (unexpected)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RouterlogExitCode {
    /// Cycle completed
    Completed = 0,
    /// Configuration error or startup failure
    ConfigError = 1,
    /// Runtime error (unexpected failure)
    RuntimeError = 2,
}

impl From<RouterlogExitCode> for ExitCode {
    fn from(code: RouterlogExitCode) -> Self {
        ExitCode::from(code as u8)
    }
}

/// Process settings read from the environment
struct Settings {
    config_path: String,
    log_level: Level,
}

impl Settings {
    /// Load settings from environment variables
    fn from_env() -> Result<Self> {
        let config_path =
            env::var("ROUTERLOG_CONFIG").unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());
        let log_level = env::var("ROUTERLOG_LOG_LEVEL").unwrap_or_else(|_| "info".to_string());

        Ok(Self {
            config_path,
            log_level: parse_log_level(&log_level)?,
        })
    }
}

fn parse_log_level(value: &str) -> Result<Level> {
    match value.to_lowercase().as_str() {
        "trace" => Ok(Level::TRACE),
        "debug" => Ok(Level::DEBUG),
        "info" => Ok(Level::INFO),
        "warn" => Ok(Level::WARN),
        "error" => Ok(Level::ERROR),
        _ => anyhow::bail!(
            "ROUTERLOG_LOG_LEVEL '{}' is not valid. \
            Valid levels: trace, debug, info, warn, error",
            value
        ),
    }
}

fn main() -> ExitCode {
    let settings = match Settings::from_env() {
        Ok(settings) => settings,
        Err(e) => {
            eprintln!("Configuration error: {}", e);
            return RouterlogExitCode::ConfigError.into();
        }
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(settings.log_level)
        .finish();

    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to set tracing subscriber: {}", e);
        return RouterlogExitCode::ConfigError.into();
    }

    let collector = match prepare_collector(&settings.config_path) {
        Ok(collector) => collector,
        Err(code) => return code.into(),
    };

    let rt = match tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            error!("Failed to create tokio runtime: {}", e);
            return RouterlogExitCode::RuntimeError.into();
        }
    };

    let report = rt.block_on(async {
        let now = chrono::Local::now().naive_local();
        collector.run_cycle(now).await
    });

    log_summary(&report);
    RouterlogExitCode::Completed.into()
}

/// Load the configuration at `config_path` and build the collector
///
/// Every failure here happens before anything is collected and maps to
/// [`RouterlogExitCode::ConfigError`].
fn prepare_collector(config_path: &str) -> std::result::Result<Collector, RouterlogExitCode> {
    let config = CollectorConfig::from_file(config_path).map_err(|e| {
        error!("Configuration error: {}", e);
        RouterlogExitCode::ConfigError
    })?;

    info!(
        "Configuration loaded from {}: {} traffic URL(s), {} lease URL(s)",
        config_path,
        config.traffic_urls.len(),
        config.lease_urls.len()
    );

    build_collector(config).map_err(|e| {
        error!("Startup error: {:#}", e);
        RouterlogExitCode::ConfigError
    })
}

/// Wire the HTTP fetcher and SQLite store into a collector
fn build_collector(config: CollectorConfig) -> Result<Collector> {
    let fetcher = HttpFetcher::from_config(&config.fetch).context("Failed to create HTTP fetcher")?;
    let store = SqliteUsageStore::open(&config.database_path).with_context(|| {
        format!(
            "Failed to open database {}",
            config.database_path.display()
        )
    })?;

    info!("Using database {}", config.database_path.display());

    Collector::new(Box::new(fetcher), Box::new(store), config).context("Invalid configuration")
}

fn log_summary(report: &CycleReport) {
    for source in report.sources() {
        let router = source.router.as_deref().unwrap_or("?");
        match &source.status {
            SourceStatus::Collected { failed: 0, .. } => {
                info!("{} [{}]: {}", source.url, router, source.status)
            }
            _ => warn!("{} [{}]: {}", source.url, router, source.status),
        }
    }

    match report.sweep {
        Some(sweep) if sweep.failures > 0 => warn!(
            "Daily tasks done with {} failed sweep(s): {} samples and {} leases deleted",
            sweep.failures, sweep.samples_deleted, sweep.leases_deleted
        ),
        Some(sweep) => info!(
            "Daily tasks done: {} samples and {} leases deleted",
            sweep.samples_deleted, sweep.leases_deleted
        ),
        None => info!("Daily tasks not due this cycle"),
    }

    info!(
        "Collection finished: {} URL(s), {} fetch failure(s), {} failed unit(s)",
        report.sources().count(),
        report.fetch_failures(),
        report.failed_units()
    );
}
