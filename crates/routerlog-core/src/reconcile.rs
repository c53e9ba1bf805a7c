//! Counter delta reconciliation
//!
//! Routers report absolute byte counters that only grow until the router (or
//! the device) restarts. [`reconcile`] turns the current reading and the last
//! stored reading into the bytes transferred since the previous cycle.
//!
//! ## Rules
//!
//! 1. No stored reading: the whole counter is new usage.
//! 2. Either counter went down: both counters restarted from zero, so both
//!    current values are new usage. Wrap-around width is never inferred.
//! 3. Otherwise: usage is the per-field difference.
//!
//! In every case the current reading becomes the new stored state.

use serde::{Deserialize, Serialize};

use crate::parse::TrafficObservation;
use crate::traits::CounterState;

/// Bytes transferred during one cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct UsageDelta {
    /// Incremental received bytes
    pub rx_bytes: u64,
    /// Incremental transmitted bytes
    pub tx_bytes: u64,
}

/// Which rule produced a delta
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DeltaKind {
    /// First reading for the device
    FirstObservation,
    /// A counter decreased since the last reading
    CounterReset,
    /// Regular difference against the last reading
    Incremental,
}

/// Result of reconciling one observation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reconciliation {
    /// Usage since the previous reading
    pub delta: UsageDelta,
    /// Rule that produced the delta
    pub kind: DeltaKind,
    /// State to store in place of the previous one
    pub state: CounterState,
}

/// Compute the usage delta for an observation against the stored state
pub fn reconcile(observation: &TrafficObservation, stored: Option<&CounterState>) -> Reconciliation {
    let current = UsageDelta {
        rx_bytes: observation.rx_bytes,
        tx_bytes: observation.tx_bytes,
    };

    let (delta, kind) = match stored {
        None => (current, DeltaKind::FirstObservation),
        Some(last) if observation.rx_bytes < last.rx_bytes || observation.tx_bytes < last.tx_bytes => {
            (current, DeltaKind::CounterReset)
        }
        Some(last) => (
            UsageDelta {
                rx_bytes: observation.rx_bytes - last.rx_bytes,
                tx_bytes: observation.tx_bytes - last.tx_bytes,
            },
            DeltaKind::Incremental,
        ),
    };

    Reconciliation {
        delta,
        kind,
        state: CounterState {
            device: observation.device.clone(),
            rx_bytes: observation.rx_bytes,
            tx_bytes: observation.tx_bytes,
        },
    }
}

/// Add a delta to existing totals
///
/// Totals saturate at `u64::MAX` instead of wrapping.
pub fn accumulate(totals: Option<(u64, u64)>, delta: UsageDelta) -> (u64, u64) {
    match totals {
        None => (delta.rx_bytes, delta.tx_bytes),
        Some((rx, tx)) => (
            rx.saturating_add(delta.rx_bytes),
            tx.saturating_add(delta.tx_bytes),
        ),
    }
}
