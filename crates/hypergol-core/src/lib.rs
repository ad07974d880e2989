//! Core domain types shared across the Hypergol workspace.
//!
//! Hypergol runs Life-like automata over the cell graph of an arbitrary,
//! growable planar graph. This crate holds the parts that have no notion of
//! time or concurrency:
//!
//! - **CellState**: the closed enumeration of cell states
//! - **Rule**: `(born, survive)` neighbor-count sets and the pure rule engine
//! - **NeighborGraph**: the interface an external geometry provider implements
//! - **Renderer**: the output-only interface of an external renderer, plus the
//!   presentation mapping from states to colors
//!
//! ```text
//! evaluate(states, graph, rule) -> next_states
//! ```

mod graph;
mod render;
mod rule;
mod state;

pub use graph::{AdjacencyGraph, CellIndex, GrowthFilter, NeighborGraph, PendingLayer, Point};
pub use render::{Color, Palette, Renderer};
pub use rule::{evaluate, Rule, RuleParseError};
pub use state::{CellState, StateVector};
