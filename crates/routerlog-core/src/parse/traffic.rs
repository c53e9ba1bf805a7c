//! Traffic counter dump parser
//!
//! Each line carries one device: `<identifier> <rx bytes> <tx bytes>`.

use serde::{Deserialize, Serialize};
use tracing::warn;

use super::ParseOutcome;
use crate::error::LineError;

/// Absolute counters reported for one device in one fetch
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrafficObservation {
    /// Device identifier (usually a hardware address)
    pub device: String,
    /// Absolute received bytes
    pub rx_bytes: u64,
    /// Absolute transmitted bytes
    pub tx_bytes: u64,
}

impl TrafficObservation {
    /// Create a new observation
    pub fn new(device: impl Into<String>, rx_bytes: u64, tx_bytes: u64) -> Self {
        Self {
            device: device.into(),
            rx_bytes,
            tx_bytes,
        }
    }
}

const TRAFFIC_FIELDS: usize = 3;

/// Parse a traffic counter dump
///
/// Lines that do not have exactly three fields, or whose counters are not
/// non-negative integers, are skipped and reported. This includes blank
/// lines inside the dump. Duplicate devices are kept.
pub fn parse_traffic(raw: &str) -> ParseOutcome<TrafficObservation> {
    let mut outcome = ParseOutcome::new();

    // Trailing blank lines are dropped, any other blank line is malformed
    for (index, line) in raw.trim_end().lines().enumerate() {
        let line_number = index + 1;
        let fields: Vec<&str> = line.split_whitespace().collect();

        match parse_line(&fields) {
            Ok(observation) => outcome.records.push(observation),
            Err(e) => {
                warn!("Skipping traffic line {}: {} ({})", line_number, line, e);
                outcome.skip(line_number, line, e);
            }
        }
    }

    outcome
}

fn parse_line(fields: &[&str]) -> Result<TrafficObservation, LineError> {
    let [device, rx, tx] = fields else {
        return Err(LineError::FieldCount {
            expected: TRAFFIC_FIELDS,
            found: fields.len(),
        });
    };

    Ok(TrafficObservation {
        device: device.to_string(),
        rx_bytes: parse_counter("rx", rx)?,
        tx_bytes: parse_counter("tx", tx)?,
    })
}

fn parse_counter(field: &'static str, value: &str) -> Result<u64, LineError> {
    value.parse::<u64>().map_err(|_| LineError::InvalidCounter {
        field,
        value: value.to_string(),
    })
}
