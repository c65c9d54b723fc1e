//! Core domain types for host triage.
//!
//! These types describe the sweep target, the per-host probe outcome,
//! and the report persisted at the end of a run.

use std::collections::BTreeMap;
use std::fmt;
use std::net::Ipv4Addr;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use ipnet::Ipv4Net;
use serde::{Deserialize, Serialize};

use crate::error::PrefixError;

// ── Sweep Target ──────────────────────────────────────────────────

/// The first three octets of an IPv4 /24, e.g. `192.168.1`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubnetPrefix([u8; 3]);

impl SubnetPrefix {
    pub const fn new(a: u8, b: u8, c: u8) -> Self {
        Self([a, b, c])
    }

    pub fn octets(&self) -> [u8; 3] {
        self.0
    }

    /// The /24 network this prefix identifies.
    pub fn network(&self) -> Ipv4Net {
        let [a, b, c] = self.0;
        Ipv4Net::new(Ipv4Addr::new(a, b, c, 0), 24).expect("24 is a valid IPv4 prefix length")
    }

    /// Every sweepable address, `.1` through `.254`, ascending.
    ///
    /// The network (`.0`) and broadcast (`.255`) addresses are never included.
    pub fn candidates(&self) -> Vec<Ipv4Addr> {
        self.network().hosts().collect()
    }

    /// Whether `addr` is one of this prefix's candidate addresses.
    pub fn contains(&self, addr: Ipv4Addr) -> bool {
        let [a, b, c, d] = addr.octets();
        [a, b, c] == self.0 && (1..=254).contains(&d)
    }
}

impl FromStr for SubnetPrefix {
    type Err = PrefixError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let fields: Vec<&str> = s.split('.').collect();
        if fields.len() != 3 {
            return Err(PrefixError::FieldCount {
                input: s.to_string(),
                found: fields.len(),
            });
        }

        let mut octets = [0u8; 3];
        for (slot, field) in octets.iter_mut().zip(&fields) {
            *slot = parse_octet(field).ok_or_else(|| PrefixError::InvalidOctet {
                input: s.to_string(),
                octet: field.to_string(),
            })?;
        }

        Ok(Self(octets))
    }
}

/// Strict decimal octet: 1-3 ASCII digits, value <= 255. No signs or whitespace.
fn parse_octet(field: &str) -> Option<u8> {
    if field.is_empty() || field.len() > 3 || !field.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    field.parse().ok()
}

impl fmt::Display for SubnetPrefix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let [a, b, c] = self.0;
        write!(f, "{a}.{b}.{c}")
    }
}

// ── Probe Outcome ─────────────────────────────────────────────────

/// Outcome of probing one candidate address.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LivenessResult {
    pub address: Ipv4Addr,
    pub reachable: bool,
}

// ── Report ────────────────────────────────────────────────────────

/// Fact label → captured utility output.
pub type FactMap = BTreeMap<String, String>;

/// The persisted triage artifact for one run.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TriageReport {
    pub timestamp: DateTime<Utc>,
    pub system_info: FactMap,
    pub network_info: FactMap,
    /// Reachable hosts as dotted quads, ascending by host octet.
    pub active_hosts: Vec<String>,
}

impl TriageReport {
    pub fn new(timestamp: DateTime<Utc>) -> Self {
        Self {
            timestamp,
            system_info: FactMap::new(),
            network_info: FactMap::new(),
            active_hosts: Vec::new(),
        }
    }

    pub fn set_active_hosts(&mut self, hosts: &[Ipv4Addr]) {
        self.active_hosts = hosts.iter().map(ToString::to_string).collect();
    }
}
