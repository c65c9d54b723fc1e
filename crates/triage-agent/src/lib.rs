//! triage-agent: Lightweight forensic triage for a single Windows host.
//!
//! Captures system and network facts from OS utilities, sweeps a /24 for
//! reachable hosts, and writes a timestamped JSON report with a BLAKE3
//! digest alongside it.

pub mod collector;
pub mod error;
pub mod platform;
pub mod report;
pub mod run;
