//! CLI entry point for the triage agent.

use std::fs::{self, OpenOptions};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use clap::Parser;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

use triage_core::config::TriageConfig;
use triage_sweep::build_probe;

use triage_agent::collector::ShellRunner;
use triage_agent::report::verify_report;
use triage_agent::run::run_triage;

#[derive(Parser)]
#[command(name = "triage")]
#[command(about = "Lightweight forensic triage for a Windows host")]
struct Cli {
    /// Subnet prefix to sweep (first three octets, e.g., 192.168.1).
    #[arg(long)]
    subnet: Option<String>,

    /// Output file for results (default: output.report_path from config).
    #[arg(long)]
    output: Option<PathBuf>,

    /// Log file location (default: output.log_file from config).
    #[arg(long)]
    log: Option<PathBuf>,

    /// Config file prefix (default: triage).
    #[arg(short, long, default_value = "triage")]
    config: String,

    /// Check an existing report against its .b3 digest sidecar, then exit.
    #[arg(long, value_name = "REPORT", conflicts_with_all = ["subnet", "output"])]
    verify: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = TriageConfig::load(&cli.config)?;

    let log_path = cli
        .log
        .clone()
        .unwrap_or_else(|| PathBuf::from(&config.output.log_file));
    init_logging(&log_path)?;

    if let Some(report) = &cli.verify {
        if !verify_report(report)? {
            anyhow::bail!("report digest mismatch: {}", report.display());
        }
        tracing::info!(report = %report.display(), "Report digest verified");
        return Ok(());
    }

    let output = cli
        .output
        .clone()
        .unwrap_or_else(|| PathBuf::from(&config.output.report_path));

    tracing::info!(
        subnet = cli.subnet.as_deref().unwrap_or("-"),
        output = %output.display(),
        "Starting forensic analysis"
    );

    let probe = build_probe(&config.scan);
    let outcome = run_triage(ShellRunner, probe, &config, cli.subnet.as_deref(), &output).await?;

    tracing::info!(
        system_facts = outcome.summary.system_facts,
        network_facts = outcome.summary.network_facts,
        active_hosts = outcome.summary.active_hosts,
        report = %outcome.digest.report_path.display(),
        blake3 = %outcome.digest.hex,
        "Results exported"
    );

    Ok(())
}

/// Human-readable events on stdout, JSON events appended to `log_path`.
fn init_logging(log_path: &Path) -> anyhow::Result<()> {
    if let Some(parent) = log_path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(log_path)?;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer())
        .with(fmt::layer().json().with_writer(Mutex::new(file)))
        .init();

    Ok(())
}
