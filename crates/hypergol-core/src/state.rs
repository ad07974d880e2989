//! Cell states.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// State of a single cell.
///
/// The set is closed; statistics and summaries iterate [`CellState::ALL`], so
/// adding a variant here extends every report without further changes.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CellState {
    /// Quiescent cell; also the state of freshly grown cells.
    #[default]
    Dead,
    /// Live cell, counted by the rule engine.
    Alive,
}

/// Index-aligned cell states, one entry per graph cell.
pub type StateVector = Vec<CellState>;

impl CellState {
    /// Every state, in declaration order.
    pub const ALL: &'static [CellState] = &[CellState::Dead, CellState::Alive];

    /// Upper-case name used in logs and run output.
    pub fn name(&self) -> &'static str {
        match self {
            CellState::Dead => "DEAD",
            CellState::Alive => "ALIVE",
        }
    }

    /// Look a state up by name (case-insensitive).
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL
            .iter()
            .copied()
            .find(|s| s.name().eq_ignore_ascii_case(name))
    }

    /// Whether the cell counts as alive for neighbor counting.
    pub fn is_alive(&self) -> bool {
        matches!(self, CellState::Alive)
    }

    /// The opposite binary state.
    pub fn toggled(&self) -> Self {
        match self {
            CellState::Dead => CellState::Alive,
            CellState::Alive => CellState::Dead,
        }
    }
}

impl From<bool> for CellState {
    fn from(alive: bool) -> Self {
        if alive {
            CellState::Alive
        } else {
            CellState::Dead
        }
    }
}

impl fmt::Display for CellState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for CellState {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_name(s).ok_or_else(|| format!("unknown cell state: {s}"))
    }
}
