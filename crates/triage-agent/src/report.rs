//! Report assembly and persistence.
//!
//! The report is written as 4-space-indented JSON. A BLAKE3 digest of the
//! exact bytes written is stored next to it in `<report>.b3`, in the
//! `b3sum` line format, so later tampering with the artifact is detectable.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::Utc;
use serde::Serialize;
use triage_core::types::{SubnetPrefix, TriageReport};
use triage_sweep::Scanner;

use crate::collector::{Collector, CommandRunner};
use crate::error::Result;

/// Build a report: facts first (sequential), then the sweep if a subnet was given.
pub async fn assemble<R: CommandRunner>(
    collector: &Collector<R>,
    scanner: &Scanner,
    subnet: Option<&SubnetPrefix>,
) -> TriageReport {
    let mut report = TriageReport::new(Utc::now());

    report.system_info = collector.collect_system_info().await;
    report.network_info = collector.collect_network_info().await;

    match subnet {
        Some(prefix) => {
            let hosts = scanner.scan_prefix(prefix).await;
            report.set_active_hosts(&hosts);
        }
        None => tracing::info!("No subnet given, skipping host sweep"),
    }

    report
}

/// Item counts for the end-of-run summary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReportSummary {
    pub system_facts: usize,
    pub network_facts: usize,
    pub active_hosts: usize,
}

impl From<&TriageReport> for ReportSummary {
    fn from(report: &TriageReport) -> Self {
        Self {
            system_facts: report.system_info.len(),
            network_facts: report.network_info.len(),
            active_hosts: report.active_hosts.len(),
        }
    }
}

/// Where a report was written and its content digest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportDigest {
    pub report_path: PathBuf,
    pub sidecar_path: PathBuf,
    /// BLAKE3 of the report bytes, hex encoded.
    pub hex: String,
}

/// Write `report` to `path`, creating parent directories, plus its digest sidecar.
pub fn write_report(report: &TriageReport, path: &Path) -> Result<ReportDigest> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }

    let bytes = to_json_bytes(report)?;
    fs::write(path, &bytes)?;

    let hex = blake3::hash(&bytes).to_hex().to_string();
    let sidecar_path = sidecar_path(path);
    fs::write(&sidecar_path, format!("{hex}  {}\n", file_label(path)))?;

    tracing::info!(
        path = %path.display(),
        blake3 = %hex,
        "Report written"
    );

    Ok(ReportDigest {
        report_path: path.to_path_buf(),
        sidecar_path,
        hex,
    })
}

/// Recompute the report digest and compare it with the stored sidecar.
pub fn verify_report(path: &Path) -> Result<bool> {
    let bytes = fs::read(path)?;
    let recorded = fs::read_to_string(sidecar_path(path))?;

    let actual = blake3::hash(&bytes).to_hex();
    let matches = recorded
        .split_whitespace()
        .next()
        .is_some_and(|stored| stored == actual.as_str());

    if !matches {
        tracing::warn!(path = %path.display(), "Report digest mismatch");
    }
    Ok(matches)
}

fn to_json_bytes(report: &TriageReport) -> Result<Vec<u8>> {
    let mut buf = Vec::new();
    let formatter = serde_json::ser::PrettyFormatter::with_indent(b"    ");
    let mut ser = serde_json::Serializer::with_formatter(&mut buf, formatter);
    report.serialize(&mut ser)?;
    Ok(buf)
}

fn sidecar_path(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_os_string();
    name.push(".b3");
    PathBuf::from(name)
}

fn file_label(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}
