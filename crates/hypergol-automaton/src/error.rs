//! Error types for the automaton system.

use std::io;

use hypergol_core::{CellIndex, RuleParseError};
use thiserror::Error;

/// Result type alias for automaton operations.
pub type AutomatonResult<T> = Result<T, AutomatonError>;

/// Errors that can occur during automaton operations.
///
/// Validation errors are raised before any state is touched, so a rejected
/// command leaves the automaton exactly as it was.
#[derive(Debug, Error)]
pub enum AutomatonError {
    /// Rule text did not parse.
    #[error(transparent)]
    InvalidRule(#[from] RuleParseError),

    /// Randomization probability outside `[0, 1]`.
    #[error("invalid probability: {value} (must be within [0, 1])")]
    InvalidProbability { value: f64 },

    /// Randomization limit of zero cells.
    #[error("invalid limit: {value} (must be > 0)")]
    InvalidLimit { value: usize },

    /// Negative, non-finite or unrepresentable step rate.
    #[error("invalid rate: {value} (must be a finite number of seconds >= 0)")]
    InvalidRate { value: f64 },

    /// An operator argument that is not a valid number for its slot.
    #[error("invalid numeric argument {argument:?}: {reason}")]
    InvalidNumericArgument { argument: String, reason: String },

    /// A cell index outside `[0, cell_count)`.
    #[error("cell {index} out of range (cell count {count})")]
    CellOutOfRange { index: CellIndex, count: usize },

    /// A state vector of the wrong length.
    #[error("state vector has {actual} cells, graph has {expected}")]
    LengthMismatch { expected: usize, actual: usize },

    /// The render rendezvous was torn down while waiting on it.
    #[error("render handoff aborted (controller shutting down)")]
    RenderAborted,

    /// The downstream consumer closed the output.
    #[error("output pipe closed")]
    BrokenOutputPipe,

    /// I/O error while writing run output.
    #[error("i/o error: {0}")]
    Io(io::Error),

    /// Run header serialization error.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl From<io::Error> for AutomatonError {
    fn from(err: io::Error) -> Self {
        if err.kind() == io::ErrorKind::BrokenPipe {
            AutomatonError::BrokenOutputPipe
        } else {
            AutomatonError::Io(err)
        }
    }
}

impl AutomatonError {
    /// Whether the error is an operator validation error (state unchanged).
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            AutomatonError::InvalidRule(_)
                | AutomatonError::InvalidProbability { .. }
                | AutomatonError::InvalidLimit { .. }
                | AutomatonError::InvalidRate { .. }
                | AutomatonError::InvalidNumericArgument { .. }
                | AutomatonError::CellOutOfRange { .. }
                | AutomatonError::LengthMismatch { .. }
        )
    }
}
