//! Parsers for router text dumps
//!
//! Router output has no fixed schema. Both parsers work line by line, skip
//! and report lines they cannot use, and never abort the batch.

pub mod lease;
pub mod traffic;

pub use lease::{IdentifierResolution, IdentifierSource, LeaseCandidate, parse_leases};
pub use traffic::{TrafficObservation, parse_traffic};

use crate::error::LineError;

/// A skipped input line
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LineIssue {
    /// 1-based line number in the raw text
    pub line_number: usize,
    /// The line as received
    pub line: String,
    /// Why the line was skipped
    pub error: LineError,
}

/// Records parsed from one dump plus the lines that were skipped
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseOutcome<T> {
    /// Parsed records, in input order
    pub records: Vec<T>,
    /// Skipped lines, in input order
    pub issues: Vec<LineIssue>,
}

impl<T> ParseOutcome<T> {
    pub(crate) fn new() -> Self {
        Self {
            records: Vec::new(),
            issues: Vec::new(),
        }
    }

    pub(crate) fn skip(&mut self, line_number: usize, line: &str, error: LineError) {
        self.issues.push(LineIssue {
            line_number,
            line: line.to_string(),
            error,
        });
    }
}
