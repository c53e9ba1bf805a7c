//! DHCP lease dump parser
//!
//! dnsmasq-style lease files mix IPv4 lines
//! (`<expiry> <mac> <ip> <hostname> <client-id>`) with IPv6 lines where the
//! second field is an IAID and the DUID sits at the end. The identifier is
//! resolved by trying a fixed, ordered list of strategies.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::LazyLock;
use tracing::{debug, warn};

use super::ParseOutcome;
use crate::error::LineError;

/// Six colon-separated groups of two hex digits
static HARDWARE_ADDRESS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^([0-9a-fA-F]{2}:){5}[0-9a-fA-F]{2}$").expect("hardware address pattern is valid")
});

/// First field of the server DUID line, which carries no lease
const DUID_MARKER: &str = "duid";

const MIN_LEASE_FIELDS: usize = 4;

/// A parsed lease, before it is stamped with router and date
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LeaseCandidate {
    /// Hardware address or DUID
    pub identifier: String,
    /// Leased network address
    pub address: String,
    /// Client hostname, if the router knows one
    pub hostname: Option<String>,
}

/// Which field the identifier was taken from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdentifierSource {
    /// Second field is a hardware address
    SecondField,
    /// Fifth field is a hardware address
    FifthField,
    /// Last field, for DUID-style identifiers
    LastField,
}

/// Outcome of identifier resolution for one lease line
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdentifierResolution<'a> {
    /// An identifier was found
    Resolved {
        /// The identifier token
        identifier: &'a str,
        /// The field it came from
        source: IdentifierSource,
    },
    /// No strategy applied
    Unresolved,
}

type Strategy = for<'a, 'b> fn(&'b [&'a str]) -> Option<&'a str>;

/// Resolution strategies, in precedence order
const STRATEGIES: &[(IdentifierSource, Strategy)] = &[
    (IdentifierSource::SecondField, second_field_hardware_address),
    (IdentifierSource::FifthField, fifth_field_hardware_address),
    (IdentifierSource::LastField, last_field),
];

fn second_field_hardware_address<'a>(fields: &[&'a str]) -> Option<&'a str> {
    fields.get(1).copied().filter(|f| is_hardware_address(f))
}

fn fifth_field_hardware_address<'a>(fields: &[&'a str]) -> Option<&'a str> {
    fields.get(4).copied().filter(|f| is_hardware_address(f))
}

fn last_field<'a>(fields: &[&'a str]) -> Option<&'a str> {
    if fields.len() >= 5 {
        fields.last().copied()
    } else {
        None
    }
}

/// Whether a token is a colon-separated hardware address
pub fn is_hardware_address(token: &str) -> bool {
    HARDWARE_ADDRESS.is_match(token)
}

/// Resolve the unique identifier of a lease line from its fields
pub fn resolve_identifier<'a>(fields: &[&'a str]) -> IdentifierResolution<'a> {
    STRATEGIES
        .iter()
        .find_map(|(source, strategy)| {
            strategy(fields).map(|identifier| IdentifierResolution::Resolved {
                identifier,
                source: *source,
            })
        })
        .unwrap_or(IdentifierResolution::Unresolved)
}

/// Parse a DHCP lease dump
///
/// Blank lines and the `duid` line are ignored. Lines with fewer than four
/// fields or without a resolvable identifier are skipped and reported.
pub fn parse_leases(raw: &str) -> ParseOutcome<LeaseCandidate> {
    let mut outcome = ParseOutcome::new();

    for (index, line) in raw.lines().enumerate() {
        let line_number = index + 1;
        let fields: Vec<&str> = line.split_whitespace().collect();

        match fields.first() {
            None => continue,
            Some(&first) if first == DUID_MARKER => continue,
            Some(_) => {}
        }

        match parse_line(&fields) {
            Ok(lease) => {
                debug!("Lease {} -> {}", lease.identifier, lease.address);
                outcome.records.push(lease);
            }
            Err(e) => {
                warn!("Skipping lease line {}: {} ({})", line_number, line, e);
                outcome.skip(line_number, line, e);
            }
        }
    }

    outcome
}

fn parse_line(fields: &[&str]) -> Result<LeaseCandidate, LineError> {
    if fields.len() < MIN_LEASE_FIELDS {
        return Err(LineError::TooFewFields {
            min: MIN_LEASE_FIELDS,
            found: fields.len(),
        });
    }

    let identifier = match resolve_identifier(fields) {
        IdentifierResolution::Resolved { identifier, .. } => identifier,
        IdentifierResolution::Unresolved => return Err(LineError::UnresolvedIdentifier),
    };

    let hostname = match fields[3] {
        "*" | "" => None,
        name => Some(name.to_string()),
    };

    Ok(LeaseCandidate {
        identifier: identifier.to_string(),
        address: fields[2].to_string(),
        hostname,
    })
}
