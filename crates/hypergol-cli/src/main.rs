//! Hypergol CLI - Life-like cellular automata on hyperbolic tilings.
//!
//! `shell` drives an automaton interactively, `search` runs one exploration
//! to termination and `sweep` explores many random configurations in
//! parallel worker processes.

use std::io;
use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing::Level;
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::EnvFilter;

use hypergol_automaton::AutomatonError;

mod commands;
mod config;
mod renderer;

use commands::search::SearchOptions;
use commands::shell::ShellOptions;
use commands::sweep::SweepOptions;
use config::Config;

/// Hypergol - Life-like automata on {p,q} hyperbolic tilings.
#[derive(Parser, Debug)]
#[command(
    name = "hypergol",
    author,
    version,
    about = "Hypergol: Life-like cellular automata on hyperbolic tilings",
    long_about = None
)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Suppress all output except errors
    #[arg(short, long, global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Available CLI commands.
#[derive(Subcommand, Debug)]
enum Commands {
    /// Drive an automaton interactively.
    Shell {
        /// Number of sides to a polygon.
        #[arg(default_value_t = 7)]
        p: u32,

        /// Number of polygons around a vertex.
        #[arg(default_value_t = 3)]
        q: u32,

        /// Tiling layers around the central polygon.
        #[arg(short, long)]
        layers: Option<u32>,

        /// Initial rule.
        #[arg(short, long, default_value = "b 3 s 2 3")]
        rule: String,

        /// Seconds between autonomous steps.
        #[arg(long)]
        rate: Option<f64>,

        /// Seed for `randomize` (defaults to the clock).
        #[arg(short, long)]
        seed: Option<u64>,
    },

    /// Explore one random configuration until it terminates.
    Search {
        /// Rule text, e.g. "b 3 s 2 3" or "B3/S23".
        rule: String,

        /// Number of sides to a polygon.
        p: u32,

        /// Number of polygons around a vertex.
        q: u32,

        /// Tiling layers around the central polygon.
        #[arg(short, long)]
        layers: Option<u32>,

        /// Generation budget.
        #[arg(short = 'n', long)]
        max_steps: Option<u64>,

        /// Randomization seed (defaults to the clock).
        #[arg(short, long)]
        seed: Option<u64>,

        /// Write the report here instead of stdout.
        #[arg(short, long)]
        outfile: Option<PathBuf>,

        /// Report only `TERMINATED: <reason>`, without statistics.
        #[arg(long)]
        trace: bool,

        /// Probability of a cell starting alive.
        #[arg(long)]
        p_alive: Option<f64>,

        /// Randomize only this many sampled cells.
        #[arg(long)]
        limit: Option<usize>,
    },

    /// Explore random rules and seeds in parallel worker processes.
    Sweep {
        /// Concurrent workers.
        #[arg(short, long)]
        jobs: Option<usize>,

        /// Stop after this many configurations (unbounded by default).
        #[arg(long)]
        limit: Option<u64>,

        /// Seed for the configuration stream (defaults to the clock).
        #[arg(long)]
        sweep_seed: Option<u64>,

        /// Tiling layers for every job.
        #[arg(short, long)]
        layers: Option<u32>,

        /// Generation budget for every job.
        #[arg(short = 'n', long)]
        max_steps: Option<u64>,

        /// Output root directory.
        #[arg(long)]
        results_dir: Option<PathBuf>,
    },

    /// Inspect CLI configuration.
    #[command(subcommand)]
    Config(ConfigCommands),
}

/// Configuration subcommands.
#[derive(Subcommand, Debug)]
enum ConfigCommands {
    /// Show the effective configuration.
    Show,

    /// Show path to config file.
    Path,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // Setup tracing based on verbosity
    let level = if cli.quiet {
        Level::ERROR
    } else if cli.verbose {
        Level::DEBUG
    } else {
        Level::WARN
    };

    let filter = EnvFilter::builder()
        .with_default_directive(LevelFilter::from_level(level).into())
        .from_env_lossy();

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_span_events(FmtSpan::CLOSE)
        .with_target(false)
        .init();

    match run(cli.command).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) if is_broken_pipe(&err) => ExitCode::FAILURE,
        Err(err) => {
            eprintln!("Error: {err:#}");
            ExitCode::FAILURE
        }
    }
}

async fn run(command: Commands) -> Result<()> {
    let config = Config::load()?;

    match command {
        Commands::Shell {
            p,
            q,
            layers,
            rule,
            rate,
            seed,
        } => {
            let options = ShellOptions {
                p,
                q,
                layers: layers.unwrap_or(config.layers),
                rule,
                rate,
                seed: seed.unwrap_or_else(commands::time_seed),
            };
            commands::shell::execute(&config, options)?;
        }

        Commands::Search {
            rule,
            p,
            q,
            layers,
            max_steps,
            seed,
            outfile,
            trace,
            p_alive,
            limit,
        } => {
            let options = SearchOptions {
                rule,
                p,
                q,
                layers: layers.unwrap_or(config.layers),
                max_steps: max_steps.unwrap_or(config.max_steps),
                seed,
                outfile,
                trace,
                p_alive,
                default_p_alive: config.p_alive,
                limit,
            };
            commands::search::execute(options)?;
        }

        Commands::Sweep {
            jobs,
            limit,
            sweep_seed,
            layers,
            max_steps,
            results_dir,
        } => {
            let options = SweepOptions {
                jobs: jobs.unwrap_or(config.jobs),
                limit,
                sweep_seed: sweep_seed.unwrap_or_else(commands::time_seed),
                layers: layers.unwrap_or(config.sweep_layers),
                max_steps: max_steps.unwrap_or(config.max_steps),
                results_dir: results_dir.unwrap_or_else(|| config.results_dir.clone()),
                geometries: config.geometries.clone(),
            };
            commands::sweep::execute(options).await?;
        }

        Commands::Config(ConfigCommands::Show) => {
            println!("{}", serde_json::to_string_pretty(&config)?);
        }

        Commands::Config(ConfigCommands::Path) => {
            if let Some(path) = Config::config_file_path() {
                println!("{}", path.display());
            } else {
                println!("(no config file path available)");
            }
        }
    }

    Ok(())
}

/// Whether the error comes from writing into a closed pipe.
fn is_broken_pipe(err: &anyhow::Error) -> bool {
    err.chain().any(|cause| {
        matches!(
            cause.downcast_ref::<AutomatonError>(),
            Some(AutomatonError::BrokenOutputPipe)
        ) || cause
            .downcast_ref::<io::Error>()
            .is_some_and(|e| e.kind() == io::ErrorKind::BrokenPipe)
    })
}
