// # SQLite Usage Store
//
// SQLite implementation of UsageStore.
//
// ## Purpose
//
// Durable ledger for usage samples, running totals, per-device counter state
// and first-seen lease records.
//
// ## Transactions
//
// - One reconciliation unit = one `rusqlite::Transaction`
// - A transaction that is dropped without `commit()` rolls back, so every
//   early return through `?` leaves the database untouched
// - One lease batch = one transaction
//
// ## Schema
//
// Table and column names match the legacy collector database layout
// so existing databases keep working:
//
// ```text
// traffic_data      (id, timestamp, device_mac, hourly_rx_bytes, hourly_tx_bytes)
// total_traffic     (id, device_mac UNIQUE, total_rx_bytes, total_tx_bytes)
// last_known_stats  (id, device_mac UNIQUE, last_rx_bytes, last_tx_bytes)
// dhcp_leases       (id, collection_timestamp, router_ip, mac_address UNIQUE, ip_address, hostname)
// ```

use async_trait::async_trait;
use chrono::{NaiveDate, NaiveDateTime};
use rusqlite::{Connection, OptionalExtension, Row, params};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::Error;
use crate::parse::{LeaseCandidate, TrafficObservation};
use crate::reconcile::{self, Reconciliation};
use crate::traits::usage_store::{CounterState, LeaseRecord, UsageSample, UsageStore, UsageTotals};

/// Text format of `traffic_data.timestamp`
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Text format of `dhcp_leases.collection_timestamp`
pub const DATE_FORMAT: &str = "%Y-%m-%d";

const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

const SCHEMA: &str = r"
CREATE TABLE IF NOT EXISTS traffic_data (
    id              INTEGER PRIMARY KEY AUTOINCREMENT,
    timestamp       TEXT NOT NULL,
    device_mac      TEXT NOT NULL,
    hourly_rx_bytes INTEGER NOT NULL,
    hourly_tx_bytes INTEGER NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_traffic_data_timestamp ON traffic_data (timestamp);

CREATE TABLE IF NOT EXISTS total_traffic (
    id              INTEGER PRIMARY KEY AUTOINCREMENT,
    device_mac      TEXT NOT NULL UNIQUE,
    total_rx_bytes  INTEGER NOT NULL,
    total_tx_bytes  INTEGER NOT NULL
);

CREATE TABLE IF NOT EXISTS last_known_stats (
    id              INTEGER PRIMARY KEY AUTOINCREMENT,
    device_mac      TEXT NOT NULL UNIQUE,
    last_rx_bytes   INTEGER NOT NULL,
    last_tx_bytes   INTEGER NOT NULL
);

CREATE TABLE IF NOT EXISTS dhcp_leases (
    id                   INTEGER PRIMARY KEY AUTOINCREMENT,
    collection_timestamp TEXT NOT NULL,
    router_ip            TEXT NOT NULL,
    mac_address          TEXT NOT NULL UNIQUE,
    ip_address           TEXT NOT NULL,
    hostname             TEXT
);
";

/// SQLite-backed usage store
///
/// Access to the single connection is serialized by a mutex, and every
/// operation runs on the blocking thread pool.
///
/// # Example
///
/// ```rust,no_run
/// use routerlog_core::store::SqliteUsageStore;
/// use routerlog_core::{TrafficObservation, UsageStore};
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let store = SqliteUsageStore::open("/var/lib/routerlog/usage.db")?;
///     let now = chrono::Local::now().naive_local();
///
///     let obs = TrafficObservation::new("aa:bb:cc:dd:ee:ff", 100, 200);
///     let outcome = store.record_observation(&obs, now).await?;
///     println!("{:?}", outcome.delta);
///
///     Ok(())
/// }
/// ```
pub struct SqliteUsageStore {
    conn: Arc<Mutex<Connection>>,
    path: Option<PathBuf>,
}

impl std::fmt::Debug for SqliteUsageStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteUsageStore")
            .field("path", &self.path)
            .finish_non_exhaustive()
    }
}

impl SqliteUsageStore {
    /// Open or create a store at the given path
    ///
    /// Creates the parent directory if needed and the schema if missing.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, Error> {
        let path = path.as_ref().to_path_buf();

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                std::fs::create_dir_all(parent).map_err(|e| {
                    Error::store(format!(
                        "Failed to create database directory {}: {}",
                        parent.display(),
                        e
                    ))
                })?;
            }
        }

        let conn = Connection::open(&path).map_err(|e| {
            Error::store(format!("Failed to open database {}: {}", path.display(), e))
        })?;
        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA synchronous=NORMAL;")?;

        let store = Self::from_connection(conn, Some(path))?;
        tracing::debug!("Opened usage store at {:?}", store.path);
        Ok(store)
    }

    /// Open an in-memory store (for testing)
    pub fn open_in_memory() -> Result<Self, Error> {
        Self::from_connection(Connection::open_in_memory()?, None)
    }

    fn from_connection(conn: Connection, path: Option<PathBuf>) -> Result<Self, Error> {
        conn.busy_timeout(BUSY_TIMEOUT)?;
        conn.execute_batch(SCHEMA)?;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
            path,
        })
    }

    /// Database file location, `None` for in-memory stores
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Run `f` against the connection on the blocking thread pool
    async fn with_conn<F, T>(&self, f: F) -> Result<T, Error>
    where
        F: FnOnce(&mut Connection) -> Result<T, Error> + Send + 'static,
        T: Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || {
            let mut guard = conn
                .lock()
                .map_err(|_| Error::store("SQLite connection lock poisoned"))?;
            f(&mut guard)
        })
        .await
        .map_err(|e| Error::store(format!("SQLite task failed: {}", e)))?
    }
}

/// Convert a counter for storage in a signed 64-bit column
fn to_sql_int(device: &str, what: &str, value: u64) -> Result<i64, Error> {
    i64::try_from(value).map_err(|_| {
        Error::store(format!(
            "{} for {} does not fit in the database: {}",
            what, device, value
        ))
    })
}

fn read_u64(row: &Row<'_>, idx: usize) -> rusqlite::Result<u64> {
    let value: i64 = row.get(idx)?;
    u64::try_from(value).map_err(|_| rusqlite::Error::IntegralValueOutOfRange(idx, value))
}

fn read_timestamp(row: &Row<'_>, idx: usize) -> rusqlite::Result<NaiveDateTime> {
    let text: String = row.get(idx)?;
    NaiveDateTime::parse_from_str(&text, TIMESTAMP_FORMAT).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, Box::new(e))
    })
}

fn read_date(row: &Row<'_>, idx: usize) -> rusqlite::Result<NaiveDate> {
    let text: String = row.get(idx)?;
    NaiveDate::parse_from_str(&text, DATE_FORMAT).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, Box::new(e))
    })
}

fn select_state(conn: &Connection, device: &str) -> rusqlite::Result<Option<CounterState>> {
    conn.query_row(
        "SELECT last_rx_bytes, last_tx_bytes FROM last_known_stats WHERE device_mac = ?1",
        params![device],
        |row| {
            Ok(CounterState {
                device: device.to_string(),
                rx_bytes: read_u64(row, 0)?,
                tx_bytes: read_u64(row, 1)?,
            })
        },
    )
    .optional()
}

fn select_totals(conn: &Connection, device: &str) -> rusqlite::Result<Option<UsageTotals>> {
    conn.query_row(
        "SELECT total_rx_bytes, total_tx_bytes FROM total_traffic WHERE device_mac = ?1",
        params![device],
        |row| {
            Ok(UsageTotals {
                device: device.to_string(),
                rx_bytes: read_u64(row, 0)?,
                tx_bytes: read_u64(row, 1)?,
            })
        },
    )
    .optional()
}

/// One reconciliation unit: read state and totals, write sample, totals and state
fn apply_observation(
    conn: &mut Connection,
    observation: &TrafficObservation,
    at: NaiveDateTime,
) -> Result<Reconciliation, Error> {
    let device = observation.device.as_str();
    let tx = conn.transaction()?;

    let stored = select_state(&tx, device)?;
    let result = reconcile::reconcile(observation, stored.as_ref());

    let previous = select_totals(&tx, device)?.map(|t| (t.rx_bytes, t.tx_bytes));
    let (rx_total, tx_total) = reconcile::accumulate(previous, result.delta);

    tx.execute(
        "INSERT INTO traffic_data (timestamp, device_mac, hourly_rx_bytes, hourly_tx_bytes) \
         VALUES (?1, ?2, ?3, ?4)",
        params![
            at.format(TIMESTAMP_FORMAT).to_string(),
            device,
            to_sql_int(device, "rx delta", result.delta.rx_bytes)?,
            to_sql_int(device, "tx delta", result.delta.tx_bytes)?,
        ],
    )?;

    tx.execute(
        "INSERT INTO total_traffic (device_mac, total_rx_bytes, total_tx_bytes) \
         VALUES (?1, ?2, ?3) \
         ON CONFLICT(device_mac) DO UPDATE SET \
             total_rx_bytes = excluded.total_rx_bytes, \
             total_tx_bytes = excluded.total_tx_bytes",
        params![
            device,
            to_sql_int(device, "rx total", rx_total)?,
            to_sql_int(device, "tx total", tx_total)?,
        ],
    )?;

    tx.execute(
        "INSERT INTO last_known_stats (device_mac, last_rx_bytes, last_tx_bytes) \
         VALUES (?1, ?2, ?3) \
         ON CONFLICT(device_mac) DO UPDATE SET \
             last_rx_bytes = excluded.last_rx_bytes, \
             last_tx_bytes = excluded.last_tx_bytes",
        params![
            device,
            to_sql_int(device, "rx counter", result.state.rx_bytes)?,
            to_sql_int(device, "tx counter", result.state.tx_bytes)?,
        ],
    )?;

    tx.commit()?;
    Ok(result)
}

#[async_trait]
impl UsageStore for SqliteUsageStore {
    async fn record_observation(
        &self,
        observation: &TrafficObservation,
        at: NaiveDateTime,
    ) -> Result<Reconciliation, Error> {
        let observation = observation.clone();
        self.with_conn(move |conn| apply_observation(conn, &observation, at))
            .await
    }

    async fn record_leases(
        &self,
        leases: &[LeaseCandidate],
        router: &str,
        first_seen: NaiveDate,
    ) -> Result<usize, Error> {
        let leases = leases.to_vec();
        let router = router.to_string();

        self.with_conn(move |conn| {
            let tx = conn.transaction()?;
            let mut inserted = 0;
            {
                let mut stmt = tx.prepare(
                    "INSERT OR IGNORE INTO dhcp_leases \
                     (collection_timestamp, router_ip, mac_address, ip_address, hostname) \
                     VALUES (?1, ?2, ?3, ?4, ?5)",
                )?;
                let day = first_seen.format(DATE_FORMAT).to_string();
                for lease in &leases {
                    inserted += stmt.execute(params![
                        day,
                        router,
                        lease.identifier,
                        lease.address,
                        lease.hostname,
                    ])?;
                }
            }
            tx.commit()?;
            Ok(inserted)
        })
        .await
    }

    async fn counter_state(&self, device: &str) -> Result<Option<CounterState>, Error> {
        let device = device.to_string();
        self.with_conn(move |conn| Ok(select_state(conn, &device)?))
            .await
    }

    async fn usage_totals(&self, device: &str) -> Result<Option<UsageTotals>, Error> {
        let device = device.to_string();
        self.with_conn(move |conn| Ok(select_totals(conn, &device)?))
            .await
    }

    async fn usage_samples(&self, device: &str) -> Result<Vec<UsageSample>, Error> {
        let device = device.to_string();
        self.with_conn(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT timestamp, device_mac, hourly_rx_bytes, hourly_tx_bytes \
                 FROM traffic_data WHERE device_mac = ?1 ORDER BY id",
            )?;
            let rows = stmt.query_map(params![device], |row| {
                Ok(UsageSample {
                    timestamp: read_timestamp(row, 0)?,
                    device: row.get(1)?,
                    rx_bytes: read_u64(row, 2)?,
                    tx_bytes: read_u64(row, 3)?,
                })
            })?;

            let mut samples = Vec::new();
            for row in rows {
                samples.push(row?);
            }
            Ok(samples)
        })
        .await
    }

    async fn lease(&self, identifier: &str) -> Result<Option<LeaseRecord>, Error> {
        let identifier = identifier.to_string();
        self.with_conn(move |conn| {
            let lease = conn
                .query_row(
                    "SELECT collection_timestamp, router_ip, mac_address, ip_address, hostname \
                     FROM dhcp_leases WHERE mac_address = ?1",
                    params![identifier],
                    |row| {
                        Ok(LeaseRecord {
                            first_seen: read_date(row, 0)?,
                            router: row.get(1)?,
                            identifier: row.get(2)?,
                            address: row.get(3)?,
                            hostname: row.get(4)?,
                        })
                    },
                )
                .optional()?;
            Ok(lease)
        })
        .await
    }

    async fn delete_samples_before(&self, cutoff: NaiveDateTime) -> Result<usize, Error> {
        let cutoff = cutoff.format(TIMESTAMP_FORMAT).to_string();
        self.with_conn(move |conn| {
            Ok(conn.execute(
                "DELETE FROM traffic_data WHERE timestamp < ?1",
                params![cutoff],
            )?)
        })
        .await
    }

    async fn delete_leases_before(&self, cutoff: NaiveDate) -> Result<usize, Error> {
        let cutoff = cutoff.format(DATE_FORMAT).to_string();
        self.with_conn(move |conn| {
            Ok(conn.execute(
                "DELETE FROM dhcp_leases WHERE collection_timestamp < ?1",
                params![cutoff],
            )?)
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn at(day: u32, hour: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 5, day)
            .unwrap()
            .and_hms_opt(hour, 0, 0)
            .unwrap()
    }

    fn row_count(store: &SqliteUsageStore, table: &str) -> i64 {
        let conn = store.conn.lock().unwrap();
        conn.query_row(&format!("SELECT COUNT(*) FROM {}", table), [], |row| row.get(0))
            .unwrap()
    }

    #[tokio::test]
    async fn test_sqlite_store_delta_sequence() {
        let store = SqliteUsageStore::open_in_memory().unwrap();
        let device = "aa:bb:cc:dd:ee:ff";

        for (hour, (rx, tx)) in [(100, 200), (150, 250), (10, 10)].into_iter().enumerate() {
            store
                .record_observation(&TrafficObservation::new(device, rx, tx), at(1, hour as u32))
                .await
                .unwrap();
        }

        let samples = store.usage_samples(device).await.unwrap();
        let deltas: Vec<(u64, u64)> = samples.iter().map(|s| (s.rx_bytes, s.tx_bytes)).collect();
        assert_eq!(deltas, vec![(100, 200), (50, 50), (10, 10)]);
        assert_eq!(samples[2].timestamp, at(1, 2));

        let totals = store.usage_totals(device).await.unwrap().unwrap();
        assert_eq!((totals.rx_bytes, totals.tx_bytes), (160, 260));

        let state = store.counter_state(device).await.unwrap().unwrap();
        assert_eq!((state.rx_bytes, state.tx_bytes), (10, 10));
    }

    #[tokio::test]
    async fn test_failed_unit_rolls_back_and_others_proceed() {
        let store = SqliteUsageStore::open_in_memory().unwrap();
        store
            .conn
            .lock()
            .unwrap()
            .execute_batch(
                "CREATE TRIGGER reject_state BEFORE INSERT ON last_known_stats \
                 WHEN NEW.device_mac = 'bad' BEGIN SELECT RAISE(ABORT, 'rejected'); END;",
            )
            .unwrap();

        let err = store
            .record_observation(&TrafficObservation::new("bad", 5, 5), at(1, 0))
            .await
            .unwrap_err();
        assert!(err.is_persistence());

        // Sample and totals were written before the failing statement
        assert!(store.usage_samples("bad").await.unwrap().is_empty());
        assert!(store.usage_totals("bad").await.unwrap().is_none());
        assert!(store.counter_state("bad").await.unwrap().is_none());

        store
            .record_observation(&TrafficObservation::new("good", 5, 5), at(1, 0))
            .await
            .unwrap();
        assert_eq!(row_count(&store, "traffic_data"), 1);
        assert_eq!(row_count(&store, "total_traffic"), 1);
    }

    #[tokio::test]
    async fn test_oversized_counter_is_rejected_atomically() {
        let store = SqliteUsageStore::open_in_memory().unwrap();

        let result = store
            .record_observation(&TrafficObservation::new("dev", u64::MAX, 1), at(1, 0))
            .await;
        assert!(matches!(result, Err(Error::Store(_))));
        assert_eq!(row_count(&store, "traffic_data"), 0);
        assert_eq!(row_count(&store, "last_known_stats"), 0);
    }

    #[tokio::test]
    async fn test_leases_insert_or_ignore() {
        let store = SqliteUsageStore::open_in_memory().unwrap();
        let day1 = NaiveDate::from_ymd_opt(2024, 5, 1).unwrap();
        let day2 = NaiveDate::from_ymd_opt(2024, 5, 2).unwrap();

        let lease = LeaseCandidate {
            identifier: "aa:bb:cc:dd:ee:ff".to_string(),
            address: "192.168.1.5".to_string(),
            hostname: None,
        };
        assert_eq!(
            store.record_leases(&[lease.clone()], "192.168.1.1", day1).await.unwrap(),
            1
        );

        let moved = LeaseCandidate {
            address: "192.168.1.99".to_string(),
            hostname: Some("renamed".to_string()),
            ..lease
        };
        assert_eq!(
            store.record_leases(&[moved], "10.0.0.1", day2).await.unwrap(),
            0
        );

        let stored = store.lease("aa:bb:cc:dd:ee:ff").await.unwrap().unwrap();
        assert_eq!(stored.first_seen, day1);
        assert_eq!(stored.router, "192.168.1.1");
        assert_eq!(stored.address, "192.168.1.5");
        assert_eq!(stored.hostname, None);
    }

    #[tokio::test]
    async fn test_sample_sweep_keeps_boundary() {
        let store = SqliteUsageStore::open_in_memory().unwrap();
        for day in [1, 2, 3] {
            store
                .record_observation(&TrafficObservation::new("dev", day as u64, 0), at(day, 0))
                .await
                .unwrap();
        }

        let deleted = store.delete_samples_before(at(2, 0)).await.unwrap();
        assert_eq!(deleted, 1);

        let remaining = store.usage_samples("dev").await.unwrap();
        assert_eq!(remaining.first().map(|s| s.timestamp), Some(at(2, 0)));
    }

    #[tokio::test]
    async fn test_lease_sweep() {
        let store = SqliteUsageStore::open_in_memory().unwrap();
        let old = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        let new = NaiveDate::from_ymd_opt(2024, 5, 1).unwrap();

        let lease = |id: &str| LeaseCandidate {
            identifier: id.to_string(),
            address: "10.0.0.1".to_string(),
            hostname: None,
        };
        store.record_leases(&[lease("old")], "r", old).await.unwrap();
        store.record_leases(&[lease("new")], "r", new).await.unwrap();

        assert_eq!(store.delete_leases_before(new).await.unwrap(), 1);
        assert!(store.lease("old").await.unwrap().is_none());
        assert!(store.lease("new").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_file_store_persists_and_schema_is_idempotent() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("usage.db");

        {
            let store = SqliteUsageStore::open(&path).unwrap();
            assert_eq!(store.path(), Some(path.as_path()));
            store
                .record_observation(&TrafficObservation::new("dev", 100, 200), at(1, 0))
                .await
                .unwrap();
        }

        let reopened = SqliteUsageStore::open(&path).unwrap();
        let state = reopened.counter_state("dev").await.unwrap().unwrap();
        assert_eq!((state.rx_bytes, state.tx_bytes), (100, 200));

        reopened
            .record_observation(&TrafficObservation::new("dev", 130, 260), at(1, 1))
            .await
            .unwrap();
        let totals = reopened.usage_totals("dev").await.unwrap().unwrap();
        assert_eq!((totals.rx_bytes, totals.tx_bytes), (130, 260));
    }

    #[test]
    fn test_unusable_directory_is_store_error() {
        let dir = tempdir().unwrap();
        let blocker = dir.path().join("blocker");
        std::fs::write(&blocker, b"not a directory").unwrap();

        let err = SqliteUsageStore::open(blocker.join("usage.db")).unwrap_err();
        assert!(matches!(err, Error::Store(_)), "{:?}", err);
        assert!(err.is_persistence());
    }
}
