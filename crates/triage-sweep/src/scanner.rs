//! Subnet sweep engine.
//!
//! Candidates are statically partitioned across a fixed number of worker
//! tasks. Each worker probes its share one address at a time, every probe
//! hard-bounded by the per-host timeout, and sends each outcome to a single
//! aggregator. The aggregator stops at the scan budget, aborts whatever is
//! still running, and returns the reachable hosts in ascending order.

use std::net::Ipv4Addr;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tokio::time::{timeout, timeout_at, Instant};
use tracing::{Instrument, Span};

use triage_core::config::ScanConfig;
use triage_core::types::{LivenessResult, SubnetPrefix};

use crate::error::{Result, SweepError};
use crate::probe::Probe;

const DEFAULT_GRACE: Duration = Duration::from_millis(250);
const FAR_FUTURE: Duration = Duration::from_secs(86_400 * 365 * 30);

/// Validated sweep tunables.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScanSettings {
    timeout_per_host: Duration,
    max_concurrency: usize,
    grace: Duration,
}

impl ScanSettings {
    pub fn new(timeout_per_host: Duration, max_concurrency: usize) -> Result<Self> {
        if timeout_per_host.is_zero() {
            return Err(SweepError::InvalidSettings(
                "timeout_per_host must be greater than zero".to_string(),
            ));
        }
        if max_concurrency == 0 {
            return Err(SweepError::InvalidSettings(
                "max_concurrency must be at least 1".to_string(),
            ));
        }
        Ok(Self {
            timeout_per_host,
            max_concurrency,
            grace: DEFAULT_GRACE,
        })
    }

    pub fn from_config(config: &ScanConfig) -> Result<Self> {
        Ok(Self::new(config.timeout(), config.max_concurrency)?.with_grace(config.grace()))
    }

    /// Slack added on top of the worst-case probing time.
    pub fn with_grace(mut self, grace: Duration) -> Self {
        self.grace = grace;
        self
    }

    pub fn timeout_per_host(&self) -> Duration {
        self.timeout_per_host
    }

    pub fn max_concurrency(&self) -> usize {
        self.max_concurrency
    }

    /// Workers actually started for `candidates` addresses.
    pub fn workers_for(&self, candidates: usize) -> usize {
        self.max_concurrency.min(candidates).max(1)
    }

    /// Aggregate time ceiling: `ceil(n / workers) * timeout + grace`.
    pub fn budget(&self, candidates: usize) -> Duration {
        let rounds = candidates.div_ceil(self.workers_for(candidates));
        let rounds = u32::try_from(rounds).unwrap_or(u32::MAX);
        self.timeout_per_host
            .saturating_mul(rounds)
            .saturating_add(self.grace)
    }
}

/// `start + budget`, or roughly thirty years out when that overflows `Instant`.
fn deadline_after(start: Instant, budget: Duration) -> Instant {
    start
        .checked_add(budget)
        .unwrap_or_else(|| start + FAR_FUTURE)
}

/// Sweeps candidate addresses with a bounded worker pool.
pub struct Scanner {
    probe: Arc<dyn Probe>,
    settings: ScanSettings,
    span: Span,
}

impl Scanner {
    pub fn new(probe: Arc<dyn Probe>, settings: ScanSettings) -> Self {
        Self {
            probe,
            settings,
            span: Span::none(),
        }
    }

    /// Attach the logging span scans run under.
    pub fn with_span(mut self, span: Span) -> Self {
        self.span = span;
        self
    }

    pub fn settings(&self) -> &ScanSettings {
        &self.settings
    }

    /// Validate `subnet_prefix` and sweep `.1` through `.254`.
    ///
    /// A malformed prefix is rejected before any probe is sent. Everything
    /// after validation is infallible: unreachable hosts, a dead network
    /// stack, and abandoned probes all simply leave the result shorter.
    pub async fn scan(&self, subnet_prefix: &str) -> Result<Vec<Ipv4Addr>> {
        let prefix: SubnetPrefix = subnet_prefix.parse()?;
        Ok(self.scan_prefix(&prefix).await)
    }

    pub async fn scan_prefix(&self, prefix: &SubnetPrefix) -> Vec<Ipv4Addr> {
        let span = tracing::info_span!(parent: &self.span, "sweep", prefix = %prefix);
        self.run(prefix.candidates()).instrument(span).await
    }

    /// Sweep an arbitrary candidate list.
    pub async fn sweep(&self, candidates: Vec<Ipv4Addr>) -> Vec<Ipv4Addr> {
        self.run(candidates).instrument(self.span.clone()).await
    }

    async fn run(&self, candidates: Vec<Ipv4Addr>) -> Vec<Ipv4Addr> {
        let total = candidates.len();
        if total == 0 {
            return Vec::new();
        }

        let start = Instant::now();
        let workers = self.settings.workers_for(total);
        let budget = self.settings.budget(total);
        let deadline = deadline_after(start, budget);

        tracing::info!(
            candidates = total,
            workers,
            timeout_ms = self.settings.timeout_per_host.as_millis() as u64,
            budget_ms = budget.as_millis() as u64,
            "Starting host sweep"
        );

        let (tx, mut rx) = mpsc::channel::<LivenessResult>(total);
        let mut pool = JoinSet::new();

        for lane in partition(candidates, workers) {
            let probe = Arc::clone(&self.probe);
            let tx = tx.clone();
            let per_host = self.settings.timeout_per_host;

            pool.spawn(
                async move {
                    for address in lane {
                        let reachable = timeout(per_host, probe.probe(address, per_host))
                            .await
                            .unwrap_or(false);
                        if tx.send(LivenessResult { address, reachable }).await.is_err() {
                            break;
                        }
                    }
                }
                .in_current_span(),
            );
        }
        drop(tx);

        let mut results = Vec::with_capacity(total);
        let mut exhausted = false;
        loop {
            match timeout_at(deadline, rx.recv()).await {
                Ok(Some(result)) => results.push(result),
                Ok(None) => break,
                Err(_) => {
                    tracing::warn!(
                        abandoned = total - results.len(),
                        budget_ms = budget.as_millis() as u64,
                        "Scan budget exhausted, treating outstanding probes as unreachable"
                    );
                    exhausted = true;
                    break;
                }
            }
        }

        if exhausted {
            // A worker blocked outside the runtime cannot be cancelled; do not wait on it.
            pool.abort_all();
            pool.detach_all();
        } else {
            // Every sender is gone, so every worker has already returned or panicked.
            while let Some(joined) = pool.join_next().await {
                if let Err(e) = joined {
                    if e.is_panic() {
                        tracing::error!(error = %e, "Sweep worker panicked");
                    }
                }
            }
        }

        let mut active: Vec<Ipv4Addr> = results
            .into_iter()
            .filter(|r| r.reachable)
            .map(|r| r.address)
            .collect();
        active.sort_unstable();

        for address in &active {
            tracing::debug!(%address, "Host reachable");
        }

        tracing::info!(
            candidates = total,
            reachable = active.len(),
            duration_ms = start.elapsed().as_millis() as u64,
            "Host sweep complete"
        );

        active
    }
}

/// Stripe candidates across `workers` lanes: lane `i` gets `i, i+w, i+2w, ...`.
fn partition(candidates: Vec<Ipv4Addr>, workers: usize) -> Vec<Vec<Ipv4Addr>> {
    let mut lanes: Vec<Vec<Ipv4Addr>> = (0..workers)
        .map(|_| Vec::with_capacity(candidates.len().div_ceil(workers)))
        .collect();
    for (i, address) in candidates.into_iter().enumerate() {
        lanes[i % workers].push(address);
    }
    lanes
}
