//! Graph automaton with an interactive run controller and a cycle-detecting explorer.
//!
//! ## Core Concepts
//!
//! - **GraphAutomaton**: one neighbor graph, one state vector and one rule, each
//!   behind its own lock so unrelated readers never wait on a step
//! - **RenderRendezvous**: single-slot handoff between "automaton changed" and
//!   "automaton drawn", poisoned on shutdown
//! - **RunController**: interactive commands plus a rate-limited stepping loop
//! - **Explorer**: drives an automaton to a [`Termination`] and reports
//!   per-state statistics
//!
//! ```text
//! operator ──┐                         ┌── renderer
//!            ├── mutate ── rendezvous ─┤
//! stepper ───┘                         └── ack
//! ```

mod automaton;
mod controller;
mod error;
mod explorer;
mod rendezvous;

pub use automaton::GraphAutomaton;
pub use controller::{Lifecycle, RunController, DEFAULT_RATE};
pub use error::{AutomatonError, AutomatonResult};
pub use explorer::{
    CountStats, ExplorationReport, Explorer, ReportMode, RunHeader, RunStatistics,
    StateStatistics, Termination, DONE_SENTINEL,
};
pub use rendezvous::RenderRendezvous;

pub use hypergol_core::{CellIndex, CellState, NeighborGraph, Rule, StateVector};
