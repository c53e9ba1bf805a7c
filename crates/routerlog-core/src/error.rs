//! Error types for the collector
//!
//! This module defines all error types used throughout the crate.

use thiserror::Error;

/// Result type alias for collector operations
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for the collector
#[derive(Error, Debug)]
pub enum Error {
    /// Fetch failures (timeout, connection refused, non-success status)
    #[error("Fetch error: {0}")]
    Fetch(String),

    /// Persistent store errors
    #[error("Store error: {0}")]
    Store(String),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// SQLite errors
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// Generic error with context
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Create a fetch error
    pub fn fetch(msg: impl Into<String>) -> Self {
        Self::Fetch(msg.into())
    }

    /// Create a store error
    pub fn store(msg: impl Into<String>) -> Self {
        Self::Store(msg.into())
    }

    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Whether this error is a persistence failure
    ///
    /// Persistence failures abort a single reconciliation unit, never the run.
    pub fn is_persistence(&self) -> bool {
        matches!(self, Self::Store(_) | Self::Sqlite(_))
    }
}

/// Helper for converting anyhow::Error to our Error type
impl From<anyhow::Error> for Error {
    fn from(err: anyhow::Error) -> Self {
        Self::Other(err.to_string())
    }
}

/// Reason a single input line was skipped by a parser
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LineError {
    /// Traffic line without exactly three fields
    #[error("expected {expected} fields, found {found}")]
    FieldCount {
        /// Required number of fields
        expected: usize,
        /// Number of fields on the line
        found: usize,
    },

    /// Lease line with fewer fields than required
    #[error("too few fields: need at least {min}, found {found}")]
    TooFewFields {
        /// Minimum number of fields
        min: usize,
        /// Number of fields on the line
        found: usize,
    },

    /// Counter field that is not a non-negative integer
    #[error("could not parse {field} bytes from '{value}'")]
    InvalidCounter {
        /// Which counter ("rx" or "tx")
        field: &'static str,
        /// The offending token
        value: String,
    },

    /// Lease line without a resolvable identifier
    #[error("could not determine unique identifier")]
    UnresolvedIdentifier,
}
