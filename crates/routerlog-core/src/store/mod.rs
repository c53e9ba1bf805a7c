//! Usage store implementations
//!
//! - [`SqliteUsageStore`]: durable ledger used by the daemon
//! - [`MemoryUsageStore`]: non-persistent store for tests and embedding

pub mod memory;
pub mod sqlite;

pub use memory::MemoryUsageStore;
pub use sqlite::SqliteUsageStore;
