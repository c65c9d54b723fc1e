//! Single-host reachability probes.
//!
//! A probe answers one question for one address within one timeout: did
//! anything answer? Every network-level failure folds into `false`.

use std::net::{Ipv4Addr, SocketAddr};
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::net::TcpStream;
use tokio::process::Command;
use tokio::time::{timeout, Instant};

use triage_core::config::{ProbeMethod, ScanConfig};

use crate::error::{Result, SweepError};

/// Tests reachability of one candidate address.
///
/// Implementations must not retry and must treat timeout, refusal, and
/// unreachable-network conditions as `false`.
#[async_trait]
pub trait Probe: Send + Sync {
    async fn probe(&self, address: Ipv4Addr, timeout: Duration) -> bool;
}

/// Probe an address given as text. A string that is not a dotted-quad IPv4
/// address is a caller bug and is rejected before anything is sent.
pub async fn probe_address(probe: &dyn Probe, address: &str, timeout: Duration) -> Result<bool> {
    let parsed: Ipv4Addr = address
        .parse()
        .map_err(|_| SweepError::InvalidAddress(address.to_string()))?;
    Ok(probe.probe(parsed, timeout).await)
}

/// Build the probe selected by configuration.
pub fn build_probe(config: &ScanConfig) -> Arc<dyn Probe> {
    match config.method {
        ProbeMethod::Ping => Arc::new(PingProbe::new(&config.ping_path)),
        ProbeMethod::Tcp => Arc::new(TcpConnectProbe::new(config.tcp_ports.clone())),
    }
}

// ── ICMP via OS utility ───────────────────────────────────────────

/// One ICMP echo through the OS `ping` binary.
pub struct PingProbe {
    ping_path: String,
}

impl PingProbe {
    pub fn new(ping_path: &str) -> Self {
        Self {
            ping_path: ping_path.to_string(),
        }
    }

    fn command(&self, address: Ipv4Addr, timeout: Duration) -> Command {
        let mut cmd = Command::new(&self.ping_path);
        cmd.args(ping_args(std::env::consts::OS, timeout))
            .arg(address.to_string())
            .stdin(Stdio::null())
            .kill_on_drop(true);
        cmd
    }
}

/// One-echo `ping` arguments for `os`, as named by `std::env::consts::OS`.
///
/// The reply wait is milliseconds on Windows, macOS and FreeBSD, and whole
/// seconds on Linux (iputils, busybox).
fn ping_args(os: &str, timeout: Duration) -> Vec<String> {
    let wait_ms = timeout.as_millis().max(1).to_string();
    let wait_secs = timeout.as_secs_f64().ceil().max(1.0) as u64;

    let (count_flag, wait_flag, wait) = match os {
        "windows" => ("-n", "-w", wait_ms),
        "macos" | "ios" | "freebsd" | "dragonfly" => ("-c", "-W", wait_ms),
        _ => ("-c", "-W", wait_secs.to_string()),
    };
    vec![
        count_flag.to_string(),
        "1".to_string(),
        wait_flag.to_string(),
        wait,
    ]
}

#[async_trait]
impl Probe for PingProbe {
    async fn probe(&self, address: Ipv4Addr, timeout: Duration) -> bool {
        let output = match self.command(address, timeout).output().await {
            Ok(o) => o,
            Err(e) => {
                tracing::debug!(%address, error = %e, "Failed to spawn ping");
                return false;
            }
        };

        if cfg!(windows) {
            // Windows ping exits 0 for "Destination host unreachable" replies
            // relayed by a gateway, so look for a real echo reply instead.
            echo_reply_received(&String::from_utf8_lossy(&output.stdout))
        } else {
            output.status.success()
        }
    }
}

/// Whether Windows `ping` output contains an echo reply line.
///
/// Only genuine echo replies carry a TTL; gateway-relayed unreachable
/// messages also start with "Reply from" but do not.
pub fn echo_reply_received(stdout: &str) -> bool {
    stdout
        .lines()
        .any(|line| line.to_ascii_uppercase().contains("TTL="))
}

// ── TCP connect ───────────────────────────────────────────────────

/// Reachability by completing a TCP handshake with any of a few common ports.
///
/// Useful where ICMP is filtered. A refused connection counts as unreachable.
pub struct TcpConnectProbe {
    ports: Vec<u16>,
}

impl TcpConnectProbe {
    pub fn new(ports: Vec<u16>) -> Self {
        Self { ports }
    }
}

#[async_trait]
impl Probe for TcpConnectProbe {
    async fn probe(&self, address: Ipv4Addr, budget: Duration) -> bool {
        let deadline = Instant::now() + budget;

        for &port in &self.ports {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                break;
            }

            let addr = SocketAddr::from((address, port));
            if let Ok(Ok(_)) = timeout(remaining, TcpStream::connect(addr)).await {
                tracing::debug!(%address, port, "TCP handshake completed");
                return true;
            }
        }

        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::net::TcpListener;

    struct CountingProbe(AtomicUsize);

    #[async_trait]
    impl Probe for CountingProbe {
        async fn probe(&self, _address: Ipv4Addr, _timeout: Duration) -> bool {
            self.0.fetch_add(1, Ordering::SeqCst);
            true
        }
    }

    #[test]
    fn test_echo_reply_detection() {
        let reply = "Pinging 10.0.0.5 with 32 bytes of data:\r\n\
                     Reply from 10.0.0.5: bytes=32 time<1ms TTL=128\r\n";
        assert!(echo_reply_received(reply));

        let unreachable = "Pinging 10.0.0.6 with 32 bytes of data:\r\n\
                           Reply from 10.0.0.1: Destination host unreachable.\r\n";
        assert!(!echo_reply_received(unreachable));

        let timed_out = "Pinging 10.0.0.7 with 32 bytes of data:\r\nRequest timed out.\r\n";
        assert!(!echo_reply_received(timed_out));
        assert!(!echo_reply_received(""));
    }

    #[test]
    fn test_wait_flag_matches_platform_units() {
        let wait = Duration::from_millis(1500);

        assert_eq!(ping_args("linux", wait), ["-c", "1", "-W", "2"]);
        assert_eq!(ping_args("macos", wait), ["-c", "1", "-W", "1500"]);
        assert_eq!(ping_args("freebsd", wait), ["-c", "1", "-W", "1500"]);
        assert_eq!(ping_args("windows", wait), ["-n", "1", "-w", "1500"]);

        // Sub-second timeouts still wait at least one unit.
        assert_eq!(ping_args("linux", Duration::from_millis(200)), ["-c", "1", "-W", "1"]);
        assert_eq!(ping_args("macos", Duration::from_micros(10)), ["-c", "1", "-W", "1"]);
    }

    #[tokio::test]
    async fn test_probe_address_rejects_malformed_input() {
        let probe = CountingProbe(AtomicUsize::new(0));

        for bad in ["not-an-ip", "10.0.0", "10.0.0.256", ""] {
            let result = probe_address(&probe, bad, Duration::from_millis(10)).await;
            assert!(matches!(result, Err(SweepError::InvalidAddress(_))), "{bad:?}");
        }
        assert_eq!(probe.0.load(Ordering::SeqCst), 0);

        let ok = probe_address(&probe, "10.0.0.9", Duration::from_millis(10)).await;
        assert!(ok.unwrap());
        assert_eq!(probe.0.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_tcp_probe_detects_listener() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();

        let probe = TcpConnectProbe::new(vec![port]);
        assert!(probe.probe(Ipv4Addr::LOCALHOST, Duration::from_secs(2)).await);
    }

    #[tokio::test]
    async fn test_tcp_probe_treats_refusal_as_unreachable() {
        let port = {
            let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
            listener.local_addr().unwrap().port()
        };

        let probe = TcpConnectProbe::new(vec![port]);
        assert!(!probe.probe(Ipv4Addr::LOCALHOST, Duration::from_secs(2)).await);
    }

    #[tokio::test]
    async fn test_tcp_probe_with_no_ports_is_unreachable() {
        let probe = TcpConnectProbe::new(Vec::new());
        assert!(!probe.probe(Ipv4Addr::LOCALHOST, Duration::from_millis(50)).await);
    }

    #[tokio::test]
    async fn test_ping_missing_binary_is_unreachable() {
        let probe = PingProbe::new("/nonexistent/ping-binary");
        assert!(!probe.probe(Ipv4Addr::LOCALHOST, Duration::from_millis(100)).await);
    }

    #[tokio::test]
    async fn test_configured_tcp_reaches_listener() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();

        let config = ScanConfig {
            method: ProbeMethod::Tcp,
            tcp_ports: vec![port],
            ..ScanConfig::default()
        };
        let probe = build_probe(&config);
        assert!(probe.probe(Ipv4Addr::LOCALHOST, Duration::from_secs(2)).await);
    }
}
