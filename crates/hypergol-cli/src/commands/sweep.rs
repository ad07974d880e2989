//! Batch sweep: generate random configurations and explore each one in a
//! separate worker process.
//!
//! Workers are this binary re-invoked as `hypergol search ... --outfile`.
//! They run in their own process group, so a terminal Ctrl-C reaches only
//! the orchestrator. The first Ctrl-C stops issuing jobs and lets running
//! workers finish; the second kills them.

use std::fmt;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use anyhow::{Context, Result};
use rand::rngs::StdRng;
use rand::seq::IndexedRandom;
use rand::{Rng, SeedableRng};
use tokio::process::Command;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use hypergol_core::Rule;

/// Longest a capacity wait goes without re-checking shutdown.
const POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Sweep parameters, already merged from config and flags.
#[derive(Debug, Clone)]
pub struct SweepOptions {
    pub jobs: usize,
    pub limit: Option<u64>,
    pub sweep_seed: u64,
    pub layers: u32,
    pub max_steps: u64,
    pub results_dir: PathBuf,
    pub geometries: Vec<(u32, u32)>,
}

/// One configuration to explore.
#[derive(Debug, Clone, PartialEq)]
pub struct Job {
    pub rule: Rule,
    pub p: u32,
    pub q: u32,
    pub seed: u64,
    pub output: PathBuf,
}

impl Job {
    /// A job is done when its output exists and is non-empty.
    pub fn is_done(&self) -> bool {
        std::fs::metadata(&self.output)
            .map(|m| m.is_file() && m.len() > 0)
            .unwrap_or(false)
    }
}

/// `<results>/<p>_<q>/<rule_token>_<seed>.log`
pub fn output_path(results_dir: &Path, rule: &Rule, p: u32, q: u32, seed: u64) -> PathBuf {
    results_dir
        .join(format!("{p}_{q}"))
        .join(format!("{}_{seed}.log", rule.to_token()))
}

/// A rule with one fair coin per (count, set) for counts `0..=max_degree`.
pub fn random_rule<R: Rng + ?Sized>(max_degree: u32, rng: &mut R) -> Rule {
    let mut born = Vec::new();
    let mut survive = Vec::new();
    for count in 0..=max_degree {
        if rng.random_bool(0.5) {
            born.push(count);
        }
        if rng.random_bool(0.5) {
            survive.push(count);
        }
    }
    Rule::new(born, survive)
}

/// Deterministic stream of jobs for a given sweep seed.
pub struct JobSource {
    rng: StdRng,
    results_dir: PathBuf,
    geometries: Vec<(u32, u32)>,
}

impl JobSource {
    pub fn new(seed: u64, results_dir: PathBuf, geometries: Vec<(u32, u32)>) -> Result<Self> {
        if geometries.is_empty() {
            anyhow::bail!("No geometries configured for the sweep");
        }
        Ok(Self {
            rng: StdRng::seed_from_u64(seed),
            results_dir,
            geometries,
        })
    }

    pub fn next_job(&mut self) -> Job {
        let (p, q) = self
            .geometries
            .choose(&mut self.rng)
            .copied()
            .unwrap_or((4, 5));
        let rule = random_rule(p * q.saturating_sub(2), &mut self.rng);
        let seed = self.rng.random();
        let output = output_path(&self.results_dir, &rule, p, q, seed);
        Job {
            rule,
            p,
            q,
            seed,
            output,
        }
    }
}

/// How far shutdown has progressed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownStage {
    Running,
    /// No new jobs; running workers finish.
    Draining,
    /// Running workers are killed.
    Forced,
}

/// Two-stage shutdown signal shared by the orchestrator and its workers.
#[derive(Debug, Clone, Default)]
pub struct Shutdown {
    drain: CancellationToken,
    force: CancellationToken,
}

impl Shutdown {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stage(&self) -> ShutdownStage {
        if self.force.is_cancelled() {
            ShutdownStage::Forced
        } else if self.drain.is_cancelled() {
            ShutdownStage::Draining
        } else {
            ShutdownStage::Running
        }
    }

    /// Advance one stage. Forcing implies draining.
    pub fn escalate(&self) -> ShutdownStage {
        if self.drain.is_cancelled() {
            self.force.cancel();
        } else {
            self.drain.cancel();
        }
        self.stage()
    }
}

/// Terminal state of one worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobOutcome {
    Completed,
    Failed,
    Killed,
}

/// Per-outcome job counts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepSummary {
    pub completed: u64,
    pub failed: u64,
    pub skipped: u64,
    pub killed: u64,
}

impl SweepSummary {
    fn record(&mut self, joined: Result<JobOutcome, tokio::task::JoinError>) {
        match joined {
            Ok(JobOutcome::Completed) => self.completed += 1,
            Ok(JobOutcome::Failed) => self.failed += 1,
            Ok(JobOutcome::Killed) => self.killed += 1,
            Err(err) => {
                warn!(error = %err, "sweep_task_panicked");
                self.failed += 1;
            }
        }
    }
}

impl fmt::Display for SweepSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "completed={} failed={} skipped={} killed={}",
            self.completed, self.failed, self.skipped, self.killed
        )
    }
}

/// Settings every worker is started with.
#[derive(Debug, Clone)]
struct WorkerSettings {
    exe: PathBuf,
    layers: u32,
    max_steps: u64,
}

async fn run_job(settings: WorkerSettings, job: Job, shutdown: Shutdown) -> JobOutcome {
    let mut cmd = Command::new(&settings.exe);
    cmd.arg("--quiet")
        .arg("search")
        .arg(job.rule.to_string())
        .arg(job.p.to_string())
        .arg(job.q.to_string())
        .arg("--layers")
        .arg(settings.layers.to_string())
        .arg("--max-steps")
        .arg(settings.max_steps.to_string())
        .arg("--seed")
        .arg(job.seed.to_string())
        .arg("--outfile")
        .arg(&job.output)
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .kill_on_drop(true);
    #[cfg(unix)]
    cmd.process_group(0);

    let mut child = match cmd.spawn() {
        Ok(child) => child,
        Err(err) => {
            warn!(error = %err, output = %job.output.display(), "sweep_spawn_failed");
            return JobOutcome::Failed;
        }
    };
    debug!(pid = ?child.id(), rule = %job.rule, p = job.p, q = job.q, "sweep_job_started");

    tokio::select! {
        status = child.wait() => match status {
            Ok(status) if status.success() => {
                debug!(output = %job.output.display(), "sweep_job_completed");
                JobOutcome::Completed
            }
            Ok(status) => {
                warn!(code = ?status.code(), output = %job.output.display(), "sweep_job_failed");
                JobOutcome::Failed
            }
            Err(err) => {
                warn!(error = %err, "sweep_job_wait_failed");
                JobOutcome::Failed
            }
        },
        _ = shutdown.force.cancelled() => {
            if let Err(err) = child.kill().await {
                warn!(error = %err, "sweep_job_kill_failed");
            }
            JobOutcome::Killed
        }
    }
}

async fn listen_for_interrupts(shutdown: Shutdown) {
    while shutdown.stage() != ShutdownStage::Forced {
        if tokio::signal::ctrl_c().await.is_err() {
            return;
        }
        match shutdown.escalate() {
            ShutdownStage::Draining => {
                eprintln!("Interrupted: finishing running jobs (Ctrl-C again to kill them)");
            }
            ShutdownStage::Forced => eprintln!("Killing running jobs"),
            ShutdownStage::Running => {}
        }
        info!(stage = ?shutdown.stage(), "sweep_shutdown_escalated");
    }
}

/// Run the sweep until the limit is reached or shutdown is requested.
pub async fn execute(options: SweepOptions) -> Result<SweepSummary> {
    let exe = std::env::current_exe().context("Failed to locate the hypergol binary")?;
    let settings = WorkerSettings {
        exe,
        layers: options.layers,
        max_steps: options.max_steps,
    };
    let mut source = JobSource::new(
        options.sweep_seed,
        options.results_dir.clone(),
        options.geometries.clone(),
    )?;
    let jobs = options.jobs.max(1);
    info!(
        jobs,
        limit = ?options.limit,
        sweep_seed = options.sweep_seed,
        results = %options.results_dir.display(),
        "sweep_start"
    );

    let shutdown = Shutdown::new();
    let signals = tokio::spawn(listen_for_interrupts(shutdown.clone()));

    let mut tasks: JoinSet<JobOutcome> = JoinSet::new();
    let mut summary = SweepSummary::default();
    let mut issued = 0u64;

    'issue: loop {
        if shutdown.stage() != ShutdownStage::Running {
            break;
        }
        if options.limit.is_some_and(|limit| issued >= limit) {
            break;
        }

        while tasks.len() >= jobs {
            tokio::select! {
                Some(joined) = tasks.join_next() => summary.record(joined),
                _ = shutdown.drain.cancelled() => break 'issue,
                _ = tokio::time::sleep(POLL_INTERVAL) => {}
            }
        }

        let job = source.next_job();
        issued += 1;
        if job.is_done() {
            debug!(output = %job.output.display(), "sweep_job_skipped");
            summary.skipped += 1;
            continue;
        }
        if let Some(parent) = job.output.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
        tasks.spawn(run_job(settings.clone(), job, shutdown.clone()));
    }

    while let Some(joined) = tasks.join_next().await {
        summary.record(joined);
    }
    signals.abort();

    info!(
        completed = summary.completed,
        failed = summary.failed,
        skipped = summary.skipped,
        killed = summary.killed,
        stage = ?shutdown.stage(),
        "sweep_done"
    );
    eprintln!("Sweep finished: {summary}");
    Ok(summary)
}
