//! triage-sweep: Liveness sweep of a /24 subnet.
//!
//! Probes `.1` through `.254` of a subnet prefix with a fixed-size worker
//! pool, a hard per-host timeout, and an aggregate scan budget, and returns
//! the reachable hosts in ascending order.

pub mod error;
pub mod probe;
pub mod scanner;

pub use error::SweepError;
pub use probe::{build_probe, probe_address, PingProbe, Probe, TcpConnectProbe};
pub use scanner::{ScanSettings, Scanner};
