//! Interactive shell over a running controller.

use std::io::{self, BufRead, Write};
use std::str::FromStr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use anyhow::{Context, Result};
use rand::rngs::StdRng;
use rand::SeedableRng;
use tracing::{debug, info, warn};

use hypergol_automaton::{AutomatonError, GraphAutomaton, RunController};
use hypergol_core::{CellIndex, NeighborGraph, Rule};
use hypergol_tiling::HyperbolicTiling;

use crate::config::Config;
use crate::renderer::TerminalRenderer;

const PROMPT: &str = "(hypergol) ";

const HELP: &str = "\
set <i>...          make cells alive
kill <i>...         make cells dead
toggle <i>...       flip cells
clear               kill every cell
rule [text]         show or change the rule, e.g. `rule b3/s23`
step [n]            step n times (default 1, Ctrl-C stops early)
run | stop          start or stop stepping every `rate` seconds
rate [seconds]      show or change the stepping interval
randomize [p] [n]   randomize all cells, or n sampled cells
move <i>            center the view on a cell and grow around it
number on|off       show or hide cell labels
exit                leave the shell";

/// Shell startup options.
#[derive(Debug, Clone)]
pub struct ShellOptions {
    pub p: u32,
    pub q: u32,
    pub layers: u32,
    pub rule: String,
    pub rate: Option<f64>,
    pub seed: u64,
}

/// One parsed operator line.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Set(Vec<CellIndex>),
    Kill(Vec<CellIndex>),
    Toggle(Vec<CellIndex>),
    Clear,
    Rule(Option<String>),
    Step(usize),
    Run,
    Stop,
    Rate(Option<f64>),
    Randomize {
        p_alive: Option<f64>,
        limit: Option<usize>,
    },
    Move(CellIndex),
    Number(bool),
    Help,
    Exit,
    Empty,
}

fn number<T>(argument: &str) -> Result<T, AutomatonError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    argument
        .parse()
        .map_err(|e: T::Err| AutomatonError::InvalidNumericArgument {
            argument: argument.to_string(),
            reason: e.to_string(),
        })
}

fn indices(args: &[&str]) -> Result<Vec<CellIndex>, AutomatonError> {
    args.iter().map(|a| number(a)).collect()
}

fn optional<T>(arg: Option<&&str>) -> Result<Option<T>, AutomatonError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    arg.map(|a| number(a)).transpose()
}

impl FromStr for Command {
    type Err = anyhow::Error;

    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let mut words = line.split_whitespace();
        let Some(keyword) = words.next() else {
            return Ok(Command::Empty);
        };
        let args: Vec<&str> = words.collect();

        let command = match keyword.to_lowercase().as_str() {
            "set" => Command::Set(indices(&args)?),
            "kill" => Command::Kill(indices(&args)?),
            "toggle" => Command::Toggle(indices(&args)?),
            "clear" => Command::Clear,
            "rule" if args.is_empty() => Command::Rule(None),
            "rule" => Command::Rule(Some(args.join(" "))),
            "step" => Command::Step(optional(args.first())?.unwrap_or(1)),
            "run" => Command::Run,
            "stop" => Command::Stop,
            "rate" => Command::Rate(optional(args.first())?),
            "randomize" => Command::Randomize {
                p_alive: optional(args.first())?,
                limit: optional(args.get(1))?,
            },
            "move" => match args.first() {
                Some(index) => Command::Move(number(index)?),
                None => anyhow::bail!("usage: move <index>"),
            },
            "number" => match args.first().map(|a| a.to_lowercase()).as_deref() {
                Some("on") => Command::Number(true),
                Some("off") => Command::Number(false),
                _ => anyhow::bail!("usage: number on|off"),
            },
            "help" | "?" => Command::Help,
            "exit" | "quit" => Command::Exit,
            other => anyhow::bail!("unknown command: {other}"),
        };
        Ok(command)
    }
}

/// What the read loop does after a command.
#[derive(Debug, PartialEq, Eq)]
enum Flow {
    Continue,
    Exit,
}

struct Shell {
    controller: RunController<HyperbolicTiling>,
    rng: StdRng,
    p_alive: f64,
    /// Set by Ctrl-C; cuts a running `step n` short.
    interrupted: Arc<AtomicBool>,
}

impl Shell {
    fn dispatch(&mut self, command: Command) -> Result<Flow, AutomatonError> {
        let controller = &self.controller;
        match command {
            Command::Set(cells) => controller.set_cells(&cells, true)?,
            Command::Kill(cells) => controller.set_cells(&cells, false)?,
            Command::Toggle(cells) => controller.toggle_cells(&cells)?,
            Command::Clear => controller.clear()?,
            Command::Rule(None) => println!("{}", controller.rule()),
            Command::Rule(Some(text)) => {
                let rule = controller.set_rule(&text)?;
                println!("rule: {rule}");
            }
            Command::Step(n) => {
                self.interrupted.store(false, Ordering::SeqCst);
                let taken = controller.step_until_interrupted(n, &self.interrupted)?;
                if taken < n {
                    println!("interrupted after {taken} of {n} steps");
                }
            }
            Command::Run => controller.run(),
            Command::Stop => controller.pause(),
            Command::Rate(None) => println!("{}", controller.rate()),
            Command::Rate(Some(seconds)) => controller.set_rate(seconds)?,
            Command::Randomize { p_alive, limit } => {
                let p_alive = p_alive.unwrap_or(self.p_alive);
                controller.randomize(p_alive, limit, &mut self.rng)?;
            }
            Command::Move(index) => {
                let added = controller.move_to(index)?;
                if added > 0 {
                    let total = controller.automaton().cell_count();
                    println!("grew {added} cells ({total} total)");
                }
            }
            Command::Number(on) => controller.set_labels(on)?,
            Command::Help => println!("{HELP}"),
            Command::Exit => return Ok(Flow::Exit),
            Command::Empty => {}
        }
        Ok(Flow::Continue)
    }
}

fn prompt() {
    print!("{PROMPT}");
    let _ = io::stdout().flush();
}

/// Run the interactive shell until `exit` or end of input.
pub fn execute(config: &Config, options: ShellOptions) -> Result<()> {
    let tiling = HyperbolicTiling::new(options.p, options.q, options.layers)?;
    let rule = Rule::parse(&options.rule)?;
    info!(
        p = options.p,
        q = options.q,
        layers = options.layers,
        cells = tiling.cell_count(),
        "shell_start"
    );

    let automaton = Arc::new(GraphAutomaton::new(tiling, rule));
    let controller = RunController::new(automaton);
    if let Some(rate) = options.rate {
        controller.set_rate(rate)?;
    }
    controller
        .start(TerminalRenderer::new(io::stderr()))
        .context("Failed to start the run controller")?;

    let interrupted = Arc::new(AtomicBool::new(false));
    let flag = Arc::clone(&interrupted);
    if let Err(err) = ctrlc::set_handler(move || {
        flag.store(true, Ordering::SeqCst);
        println!();
        prompt();
    }) {
        warn!(error = %err, "interrupt_handler_unavailable");
    }

    let mut shell = Shell {
        controller,
        rng: StdRng::seed_from_u64(options.seed),
        p_alive: config.p_alive,
        interrupted,
    };
    shell.controller.render()?;

    let stdin = io::stdin();
    let mut lines = stdin.lock().lines();
    loop {
        prompt();
        let command = match lines.next() {
            Some(line) => line.context("Failed to read from stdin")?.parse::<Command>(),
            None => {
                println!();
                Ok(Command::Exit)
            }
        };

        let command = match command {
            Ok(command) => command,
            Err(err) => {
                println!("*** {err}");
                continue;
            }
        };
        debug!(?command, "shell_command");

        match shell.dispatch(command) {
            Ok(Flow::Continue) => {}
            Ok(Flow::Exit) => break,
            Err(AutomatonError::RenderAborted) => {
                warn!("renderer_gone");
                break;
            }
            Err(err) => println!("*** {err}"),
        }
    }

    shell.controller.shutdown();
    Ok(())
}
