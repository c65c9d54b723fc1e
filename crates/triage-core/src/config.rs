//! Configuration management for triage runs.
//!
//! Configuration is loaded from (in priority order):
//! 1. Environment variables (TRIAGE__ prefix, `__` between sections)
//! 2. Config file (triage.toml)
//! 3. Defaults

use std::time::Duration;

use serde::Deserialize;

use crate::error::TriageError;

/// Top-level triage configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TriageConfig {
    #[serde(default)]
    pub scan: ScanConfig,

    #[serde(default)]
    pub collect: CollectConfig,

    #[serde(default)]
    pub output: OutputConfig,
}

/// Host sweep tunables. Not exposed as CLI flags.
#[derive(Debug, Clone, Deserialize)]
pub struct ScanConfig {
    /// Per-host probe timeout in milliseconds.
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,

    /// Number of sweep workers.
    #[serde(default = "default_max_concurrency")]
    pub max_concurrency: usize,

    /// Slack added to the aggregate scan budget for scheduling overhead.
    #[serde(default = "default_grace_ms")]
    pub grace_ms: u64,

    /// How liveness is probed.
    #[serde(default)]
    pub method: ProbeMethod,

    /// Path to the OS ping utility.
    #[serde(default = "default_ping_path")]
    pub ping_path: String,

    /// Ports tried in order by the TCP connect probe.
    #[serde(default = "default_tcp_ports")]
    pub tcp_ports: Vec<u16>,
}

/// Reachability probe implementations.
#[derive(Debug, Clone, Copy, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ProbeMethod {
    /// One ICMP echo through the OS `ping` utility.
    #[default]
    Ping,
    /// TCP connect to a short list of common ports.
    Tcp,
}

/// Fact collection settings.
#[derive(Debug, Clone, Deserialize)]
pub struct CollectConfig {
    /// Timeout for each OS utility invocation.
    #[serde(default = "default_command_timeout_secs")]
    pub command_timeout_secs: u64,

    /// Refuse to run on anything but Windows.
    #[serde(default = "default_true")]
    pub require_windows: bool,
}

/// Output locations. Overridable from the CLI.
#[derive(Debug, Clone, Deserialize)]
pub struct OutputConfig {
    #[serde(default = "default_report_path")]
    pub report_path: String,

    #[serde(default = "default_log_file")]
    pub log_file: String,
}

fn default_timeout_ms() -> u64 {
    1000
}

fn default_max_concurrency() -> usize {
    50
}

fn default_grace_ms() -> u64 {
    250
}

fn default_ping_path() -> String {
    "ping".to_string()
}

fn default_tcp_ports() -> Vec<u16> {
    vec![445, 139, 135, 3389, 80, 22]
}

fn default_command_timeout_secs() -> u64 {
    30
}

fn default_true() -> bool {
    true
}

fn default_report_path() -> String {
    "forensic_results.json".to_string()
}

fn default_log_file() -> String {
    "forensic_scan.log".to_string()
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            timeout_ms: default_timeout_ms(),
            max_concurrency: default_max_concurrency(),
            grace_ms: default_grace_ms(),
            method: ProbeMethod::default(),
            ping_path: default_ping_path(),
            tcp_ports: default_tcp_ports(),
        }
    }
}

impl Default for CollectConfig {
    fn default() -> Self {
        Self {
            command_timeout_secs: default_command_timeout_secs(),
            require_windows: default_true(),
        }
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            report_path: default_report_path(),
            log_file: default_log_file(),
        }
    }
}

impl ScanConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn grace(&self) -> Duration {
        Duration::from_millis(self.grace_ms)
    }
}

impl CollectConfig {
    pub fn command_timeout(&self) -> Duration {
        Duration::from_secs(self.command_timeout_secs)
    }
}

impl TriageConfig {
    /// Load from `{file_prefix}.{toml,yaml,json,...}` (optional) and
    /// `TRIAGE__*` environment variables, then validate.
    pub fn load(file_prefix: &str) -> Result<Self, TriageError> {
        let cfg = config::Config::builder()
            .add_source(config::File::with_name(file_prefix).required(false))
            .add_source(
                config::Environment::with_prefix("TRIAGE")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .map_err(|e| TriageError::Config(e.to_string()))?;

        let loaded: TriageConfig = cfg
            .try_deserialize()
            .map_err(|e| TriageError::Config(e.to_string()))?;

        loaded.validate()?;
        tracing::debug!(file_prefix, ?loaded, "Configuration loaded");
        Ok(loaded)
    }

    pub fn validate(&self) -> Result<(), TriageError> {
        if self.scan.timeout_ms == 0 {
            return Err(TriageError::Config(
                "scan.timeout_ms must be greater than zero".to_string(),
            ));
        }
        if self.scan.max_concurrency == 0 {
            return Err(TriageError::Config(
                "scan.max_concurrency must be at least 1".to_string(),
            ));
        }
        if self.collect.command_timeout_secs == 0 {
            return Err(TriageError::Config(
                "collect.command_timeout_secs must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}
