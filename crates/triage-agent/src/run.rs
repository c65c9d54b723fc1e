//! One triage run: validate → collect → sweep → write.

use std::path::Path;
use std::sync::Arc;

use tracing::Instrument;
use triage_core::config::TriageConfig;
use triage_core::types::{SubnetPrefix, TriageReport};
use triage_core::TriageError;
use triage_sweep::{Probe, ScanSettings, Scanner};

use crate::collector::{Collector, CommandRunner};
use crate::error::Result;
use crate::platform;
use crate::report::{self, ReportDigest, ReportSummary};

/// Everything a finished run produced.
pub struct RunOutcome {
    pub report: TriageReport,
    pub summary: ReportSummary,
    pub digest: ReportDigest,
}

/// Execute a full triage run and write the report to `output`.
///
/// Platform, configuration, and the subnet prefix are all checked before any
/// command runs or any probe is sent; after that, nothing the network or the
/// host utilities do can fail the run. Only writing the report can.
pub async fn run_triage<R: CommandRunner>(
    runner: R,
    probe: Arc<dyn Probe>,
    config: &TriageConfig,
    subnet: Option<&str>,
    output: &Path,
) -> Result<RunOutcome> {
    platform::verify_platform(&config.collect)?;
    config.validate()?;

    let prefix = subnet
        .map(str::parse::<SubnetPrefix>)
        .transpose()
        .map_err(TriageError::from)?;

    let run_span = match &prefix {
        Some(p) => tracing::info_span!("triage_run", subnet = %p),
        None => tracing::info_span!("triage_run", subnet = tracing::field::Empty),
    };

    let collector =
        Collector::new(runner, config.collect.command_timeout()).with_span(run_span.clone());
    let scanner =
        Scanner::new(probe, ScanSettings::from_config(&config.scan)?).with_span(run_span.clone());

    let report = report::assemble(&collector, &scanner, prefix.as_ref())
        .instrument(run_span.clone())
        .await;
    let summary = ReportSummary::from(&report);

    let digest = run_span.in_scope(|| {
        tracing::info!(
            system_facts = summary.system_facts,
            network_facts = summary.network_facts,
            active_hosts = summary.active_hosts,
            "Analysis summary"
        );
        report::write_report(&report, output)
    })?;

    Ok(RunOutcome {
        report,
        summary,
        digest,
    })
}
