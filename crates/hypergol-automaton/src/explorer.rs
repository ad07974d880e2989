//! Exploration: run an automaton until it terminates and summarize the run.
//!
//! Each generation is looked up by content in a generation index. A repeat of
//! the previous generation is a fixed point (`STATIC`); a repeat of any older
//! generation is a cycle (`PERIODIC`). Generation 0 is a valid match target.

use std::collections::HashMap;
use std::fmt;
use std::io::Write;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use hypergol_core::{CellState, NeighborGraph, Rule, StateVector};

use crate::automaton::GraphAutomaton;
use crate::error::AutomatonResult;

/// Final line of an exploration report.
pub const DONE_SENTINEL: &str = "### DONE ###";

/// Why an exploration stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Termination {
    /// Every cell shares one state.
    AllEqual(CellState),
    /// The state equals the previous generation's.
    Static { since: u64 },
    /// The state equals an older generation's.
    Periodic { revisited: u64, period: u64 },
    /// The generation budget ran out.
    MaxSteps,
}

impl fmt::Display for Termination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Termination::AllEqual(state) => write!(f, "ALL STATES EQUAL {state}"),
            Termination::Static { since } => {
                write!(f, "STATIC. NO CHANGE FROM GENERATION {since}")
            }
            Termination::Periodic { revisited, period } => write!(
                f,
                "PERIODIC. REVISITED GENERATION {revisited}. PERIOD={period}"
            ),
            Termination::MaxSteps => f.write_str("MAX STEPS REACHED"),
        }
    }
}

/// How the termination is reported.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReportMode {
    /// `<generation>: <REASON>`, statistics block, sentinel.
    #[default]
    Exploration,
    /// `TERMINATED: <REASON>` only.
    Trace,
}

/// One-line JSON header describing a run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunHeader {
    pub rule: Rule,
    pub p: u32,
    pub q: u32,
    pub layers: u32,
    pub max_steps: u64,
    pub seed: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub p_alive: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limit: Option<usize>,
}

impl RunHeader {
    pub fn write_to<W: Write>(&self, out: &mut W) -> AutomatonResult<()> {
        writeln!(out, "{}", serde_json::to_string(self)?)?;
        Ok(())
    }
}

/// Max/min/range and sample standard deviation of a series.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CountStats {
    pub max: i64,
    pub min: i64,
    pub range: i64,
    /// Present when the series has at least two samples.
    pub stdev: Option<f64>,
}

impl CountStats {
    /// Summarize a series; `None` when it is empty.
    pub fn from_series(series: &[i64]) -> Option<Self> {
        let max = *series.iter().max()?;
        let min = *series.iter().min()?;
        Some(Self {
            max,
            min,
            range: max - min,
            stdev: sample_stdev(series),
        })
    }
}

impl fmt::Display for CountStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "max={} min={} range={}", self.max, self.min, self.range)?;
        if let Some(stdev) = self.stdev {
            write!(f, " stdev={stdev:.3}")?;
        }
        Ok(())
    }
}

fn sample_stdev(series: &[i64]) -> Option<f64> {
    if series.len() < 2 {
        return None;
    }
    let n = series.len() as f64;
    let mean = series.iter().map(|&x| x as f64).sum::<f64>() / n;
    let sum_sq: f64 = series.iter().map(|&x| (x as f64 - mean).powi(2)).sum();
    Some((sum_sq / (n - 1.0)).sqrt())
}

/// Statistics of one state's cell count across recorded generations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StateStatistics {
    pub state: CellState,
    pub counts: CountStats,
    /// Successive differences; present with at least two generations.
    pub deltas: Option<CountStats>,
}

/// Statistics for every state across a run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RunStatistics {
    pub generations: usize,
    pub per_state: Vec<StateStatistics>,
}

impl RunStatistics {
    /// Build from per-generation counts aligned with [`CellState::ALL`].
    pub fn from_history(history: &[Vec<usize>]) -> Self {
        let per_state = CellState::ALL
            .iter()
            .enumerate()
            .filter_map(|(slot, &state)| {
                let series: Vec<i64> = history.iter().map(|row| row[slot] as i64).collect();
                let counts = CountStats::from_series(&series)?;
                let diffs: Vec<i64> = series.windows(2).map(|w| w[1] - w[0]).collect();
                Some(StateStatistics {
                    state,
                    counts,
                    deltas: CountStats::from_series(&diffs),
                })
            })
            .collect();

        Self {
            generations: history.len(),
            per_state,
        }
    }

    pub fn get(&self, state: CellState) -> Option<&StateStatistics> {
        self.per_state.iter().find(|s| s.state == state)
    }

    fn write_to<W: Write>(&self, out: &mut W) -> std::io::Result<()> {
        if self.per_state.is_empty() {
            writeln!(out, "NO GENERATIONS RECORDED")?;
        }
        for stats in &self.per_state {
            writeln!(out, "{} count: {}", stats.state, stats.counts)?;
            if let Some(deltas) = &stats.deltas {
                writeln!(out, "{} delta: {}", stats.state, deltas)?;
            }
        }
        Ok(())
    }
}

/// Outcome of an exploration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExplorationReport {
    pub termination: Termination,
    /// Generation at which the run stopped.
    pub generation: u64,
    pub statistics: RunStatistics,
}

/// Drives a [`GraphAutomaton`] until a termination condition holds.
pub struct Explorer<'a, G: NeighborGraph> {
    automaton: &'a GraphAutomaton<G>,
    max_steps: u64,
    mode: ReportMode,
    generation: u64,
    seen: HashMap<StateVector, u64>,
    history: Vec<Vec<usize>>,
}

impl<'a, G: NeighborGraph> Explorer<'a, G> {
    pub fn new(automaton: &'a GraphAutomaton<G>, max_steps: u64) -> Self {
        Self {
            automaton,
            max_steps,
            mode: ReportMode::default(),
            generation: 0,
            seen: HashMap::new(),
            history: Vec::new(),
        }
    }

    pub fn with_mode(mut self, mode: ReportMode) -> Self {
        self.mode = mode;
        self
    }

    /// Current generation counter.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Run to termination, writing one summary line per generation.
    pub fn run<W: Write>(&mut self, out: &mut W) -> AutomatonResult<ExplorationReport> {
        info!(max_steps = self.max_steps, mode = ?self.mode, "exploration_start");

        let termination = loop {
            let states = self.automaton.states();
            let counts = count_states(&states);

            if let Some(state) = uniform_state(&states) {
                break Termination::AllEqual(state);
            }

            match self.seen.get(&states) {
                Some(&previous) if previous + 1 == self.generation => {
                    break Termination::Static { since: previous };
                }
                Some(&previous) => {
                    break Termination::Periodic {
                        revisited: previous,
                        period: self.generation - previous,
                    };
                }
                None => {}
            }

            self.seen.insert(states, self.generation);
            self.history.push(counts.clone());

            if self.generation >= self.max_steps {
                break Termination::MaxSteps;
            }

            writeln!(out, "{}: {}", self.generation, summary(&counts))?;

            self.automaton.step();
            self.generation += 1;
            debug!(generation = self.generation, "exploration_generation");
        };

        let statistics = RunStatistics::from_history(&self.history);
        match self.mode {
            ReportMode::Exploration => {
                writeln!(out, "{}: {}", self.generation, termination)?;
                statistics.write_to(out)?;
                writeln!(out, "{DONE_SENTINEL}")?;
            }
            ReportMode::Trace => writeln!(out, "TERMINATED: {termination}")?,
        }
        out.flush()?;

        info!(
            generation = self.generation,
            reason = %termination,
            "exploration_terminated"
        );

        Ok(ExplorationReport {
            termination,
            generation: self.generation,
            statistics,
        })
    }
}

/// Cell counts aligned with [`CellState::ALL`].
fn count_states(states: &[CellState]) -> Vec<usize> {
    let mut counts = vec![0; CellState::ALL.len()];
    for state in states {
        if let Some(slot) = CellState::ALL.iter().position(|s| s == state) {
            counts[slot] += 1;
        }
    }
    counts
}

/// The shared state when every cell agrees. An empty vector counts as dead.
fn uniform_state(states: &[CellState]) -> Option<CellState> {
    match states.first() {
        None => Some(CellState::Dead),
        Some(&first) => states.iter().all(|s| *s == first).then_some(first),
    }
}

fn summary(counts: &[usize]) -> String {
    let total: usize = counts.iter().sum();
    CellState::ALL
        .iter()
        .zip(counts)
        .map(|(state, &count)| {
            let fraction = if total == 0 {
                0.0
            } else {
                count as f64 / total as f64
            };
            format!("{count}({fraction:.3}) {state}")
        })
        .collect::<Vec<_>>()
        .join(" ")
}
