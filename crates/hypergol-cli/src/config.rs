//! CLI configuration management.
//!
//! Precedence, lowest first: built-in defaults, the JSON config file,
//! environment variables (a `.env` file is honored), command-line flags.

use std::path::PathBuf;
use std::str::FromStr;

use anyhow::{Context, Result};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};

/// Application-wide configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Root directory for sweep output.
    pub results_dir: PathBuf,

    /// Concurrent sweep workers.
    pub jobs: usize,

    /// Tiling layers for `search` and `shell`.
    pub layers: u32,

    /// Tiling layers for sweep jobs.
    pub sweep_layers: u32,

    /// Generation budget per exploration.
    pub max_steps: u64,

    /// `{p,q}` pairs a sweep draws from.
    pub geometries: Vec<(u32, u32)>,

    /// Probability of a cell starting alive.
    pub p_alive: f64,
}

impl Default for Config {
    fn default() -> Self {
        let jobs = std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1);

        Self {
            results_dir: PathBuf::from("results"),
            jobs,
            layers: 5,
            sweep_layers: 7,
            max_steps: 4096,
            geometries: vec![(4, 5)],
            p_alive: 0.5,
        }
    }
}

impl Config {
    /// Load configuration from the config file and environment variables.
    pub fn load() -> Result<Self> {
        // Load .env file if present (silently ignore if missing)
        let _ = dotenvy::dotenv();

        let mut config = match Self::config_file_path() {
            Some(path) if path.exists() => {
                let contents = std::fs::read_to_string(&path)
                    .with_context(|| format!("Failed to read config from {}", path.display()))?;
                serde_json::from_str(&contents)
                    .with_context(|| format!("Failed to parse config file {}", path.display()))?
            }
            _ => Self::default(),
        };

        if let Ok(dir) = std::env::var("HYPERGOL_RESULTS_DIR") {
            config.results_dir = PathBuf::from(dir);
        }
        env_override("HYPERGOL_JOBS", &mut config.jobs)?;
        env_override("HYPERGOL_MAX_STEPS", &mut config.max_steps)?;
        if env_override("HYPERGOL_LAYERS", &mut config.layers)? {
            config.sweep_layers = config.layers;
        }

        Ok(config)
    }

    /// Get the path to the config file.
    pub fn config_file_path() -> Option<PathBuf> {
        ProjectDirs::from("dev", "hypergol", "hypergol")
            .map(|dirs| dirs.config_dir().join("config.json"))
    }
}

/// Replace `slot` with the parsed value of `name` when it is set.
fn env_override<T>(name: &str, slot: &mut T) -> Result<bool>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match std::env::var(name) {
        Ok(raw) => {
            *slot = raw
                .trim()
                .parse()
                .with_context(|| format!("{name}={raw:?} is not a valid value"))?;
            Ok(true)
        }
        Err(_) => Ok(false),
    }
}
