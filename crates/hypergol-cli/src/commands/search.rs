//! Single exploration run: random start, run to termination, report.

use std::ffi::OsString;
use std::fs::{self, File};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use rand::rngs::StdRng;
use rand::SeedableRng;
use tracing::{info, warn};

use hypergol_automaton::{ExplorationReport, Explorer, GraphAutomaton, ReportMode, RunHeader};
use hypergol_core::Rule;
use hypergol_tiling::HyperbolicTiling;

/// Parameters of one exploration.
#[derive(Debug, Clone)]
pub struct SearchOptions {
    pub rule: String,
    pub p: u32,
    pub q: u32,
    pub layers: u32,
    pub max_steps: u64,
    pub seed: Option<u64>,
    pub outfile: Option<PathBuf>,
    pub trace: bool,
    /// Explicit alive probability; `None` uses `default_p_alive`.
    pub p_alive: Option<f64>,
    pub default_p_alive: f64,
    pub limit: Option<usize>,
}

/// `<path>.partial`, the name a run writes under until it succeeds.
pub fn partial_path(path: &Path) -> PathBuf {
    let mut name = OsString::from(path.as_os_str());
    name.push(".partial");
    PathBuf::from(name)
}

/// Run one exploration, writing to stdout or to `outfile`.
pub fn execute(options: SearchOptions) -> Result<ExplorationReport> {
    let rule = Rule::parse(&options.rule)?;
    let tiling = HyperbolicTiling::new(options.p, options.q, options.layers)?;
    let seed = options.seed.unwrap_or_else(super::time_seed);
    let p_alive = options.p_alive.unwrap_or(options.default_p_alive);

    let automaton = GraphAutomaton::new(tiling, rule.clone());
    let mut rng = StdRng::seed_from_u64(seed);
    automaton.randomize(p_alive, options.limit, &mut rng)?;

    let header = RunHeader {
        rule,
        p: options.p,
        q: options.q,
        layers: options.layers,
        max_steps: options.max_steps,
        seed,
        p_alive: options.p_alive,
        limit: options.limit,
    };
    let mode = if options.trace {
        ReportMode::Trace
    } else {
        ReportMode::Exploration
    };
    info!(
        rule = %header.rule,
        p = header.p,
        q = header.q,
        seed,
        cells = automaton.cell_count(),
        "search_start"
    );

    let explore = |out: &mut dyn Write| -> Result<ExplorationReport> {
        let mut out = BufWriter::new(out);
        header.write_to(&mut out)?;
        let report = Explorer::new(&automaton, options.max_steps)
            .with_mode(mode)
            .run(&mut out)?;
        Ok(report)
    };

    let report = match &options.outfile {
        None => explore(&mut io::stdout().lock())?,
        Some(path) => {
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                fs::create_dir_all(parent)
                    .with_context(|| format!("Failed to create {}", parent.display()))?;
            }
            let partial = partial_path(path);
            let mut file = File::create(&partial)
                .with_context(|| format!("Failed to create {}", partial.display()))?;

            match explore(&mut file) {
                Ok(report) => {
                    file.sync_all()?;
                    drop(file);
                    fs::rename(&partial, path).with_context(|| {
                        format!("Failed to move {} into place", partial.display())
                    })?;
                    report
                }
                Err(err) => {
                    drop(file);
                    if let Err(cleanup) = fs::remove_file(&partial) {
                        warn!(error = %cleanup, path = %partial.display(), "partial_cleanup_failed");
                    }
                    return Err(err);
                }
            }
        }
    };

    info!(
        reason = %report.termination,
        generation = report.generation,
        "search_done"
    );
    Ok(report)
}
