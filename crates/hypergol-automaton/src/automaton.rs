//! Graph automaton: one neighbor graph, one state vector, one rule.
//!
//! Each field sits behind its own lock. When more than one is held the order
//! is always graph → states → rule; `step` clones the rule before touching
//! the other two so a rule swap never waits on an in-progress step.

use std::sync::{Mutex, MutexGuard, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use rand::Rng;
use tracing::{debug, info};

use hypergol_core::{evaluate, CellIndex, CellState, NeighborGraph, Rule, StateVector};

use crate::error::{AutomatonError, AutomatonResult};

pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

fn read<T>(lock: &RwLock<T>) -> RwLockReadGuard<'_, T> {
    lock.read().unwrap_or_else(PoisonError::into_inner)
}

fn write<T>(lock: &RwLock<T>) -> RwLockWriteGuard<'_, T> {
    lock.write().unwrap_or_else(PoisonError::into_inner)
}

/// Life-like automaton over a growable neighbor graph.
///
/// All methods take `&self`; share it across threads with `Arc`.
pub struct GraphAutomaton<G: NeighborGraph> {
    graph: Mutex<G>,
    states: RwLock<StateVector>,
    rule: RwLock<Rule>,
}

impl<G: NeighborGraph> GraphAutomaton<G> {
    /// Create an automaton with every cell dead.
    pub fn new(graph: G, rule: Rule) -> Self {
        let states = vec![CellState::Dead; graph.cell_count()];
        Self {
            graph: Mutex::new(graph),
            states: RwLock::new(states),
            rule: RwLock::new(rule),
        }
    }

    /// Number of cells (equal to the graph's cell count).
    pub fn cell_count(&self) -> usize {
        read(&self.states).len()
    }

    /// Copy of the current state vector.
    pub fn states(&self) -> StateVector {
        read(&self.states).clone()
    }

    /// Run `f` against the current states without copying them.
    pub fn with_states<R>(&self, f: impl FnOnce(&[CellState]) -> R) -> R {
        f(&read(&self.states))
    }

    /// Run `f` against the graph.
    pub fn with_graph<R>(&self, f: impl FnOnce(&G) -> R) -> R {
        f(&lock(&self.graph))
    }

    /// State of a single cell.
    pub fn state_of(&self, index: CellIndex) -> AutomatonResult<CellState> {
        let states = read(&self.states);
        states
            .get(index)
            .copied()
            .ok_or(AutomatonError::CellOutOfRange {
                index,
                count: states.len(),
            })
    }

    /// Replace the whole state vector; its length must match the graph.
    pub fn load_states(&self, new_states: StateVector) -> AutomatonResult<()> {
        let mut states = write(&self.states);
        if new_states.len() != states.len() {
            return Err(AutomatonError::LengthMismatch {
                expected: states.len(),
                actual: new_states.len(),
            });
        }
        *states = new_states;
        Ok(())
    }

    /// Set one cell alive or dead.
    pub fn set(&self, index: CellIndex, alive: bool) -> AutomatonResult<()> {
        self.set_cells(&[index], alive)
    }

    /// Flip one cell.
    pub fn toggle(&self, index: CellIndex) -> AutomatonResult<()> {
        self.toggle_cells(&[index])
    }

    /// Set several cells; nothing changes unless every index is in range.
    pub fn set_cells(&self, indices: &[CellIndex], alive: bool) -> AutomatonResult<()> {
        let mut states = write(&self.states);
        check_indices(indices, states.len())?;
        for &index in indices {
            states[index] = CellState::from(alive);
        }
        Ok(())
    }

    /// Flip several cells; nothing changes unless every index is in range.
    ///
    /// A repeated index is flipped once per occurrence.
    pub fn toggle_cells(&self, indices: &[CellIndex]) -> AutomatonResult<()> {
        let mut states = write(&self.states);
        check_indices(indices, states.len())?;
        for &index in indices {
            states[index] = states[index].toggled();
        }
        Ok(())
    }

    /// Kill every cell.
    pub fn clear(&self) {
        write(&self.states).fill(CellState::Dead);
    }

    /// Advance one generation.
    ///
    /// Atomic with respect to every other reader and writer of the states.
    pub fn step(&self) {
        let rule = self.rule();
        let graph = lock(&self.graph);
        let mut states = write(&self.states);
        let next = evaluate(&states, &*graph, &rule);
        *states = next;
        debug!(cells = states.len(), "automaton_step");
    }

    /// Randomize cells with probability `p_alive` of being alive.
    ///
    /// Without a limit every cell gets one draw, in index order. With a limit,
    /// `min(limit, cell_count)` distinct cells are sampled uniformly without
    /// replacement and only those get a draw; all other cells keep their state.
    pub fn randomize<R: Rng + ?Sized>(
        &self,
        p_alive: f64,
        limit: Option<usize>,
        rng: &mut R,
    ) -> AutomatonResult<()> {
        if !(0.0..=1.0).contains(&p_alive) {
            return Err(AutomatonError::InvalidProbability { value: p_alive });
        }
        if limit == Some(0) {
            return Err(AutomatonError::InvalidLimit { value: 0 });
        }

        let mut states = write(&self.states);
        let count = states.len();
        match limit {
            None => {
                for state in states.iter_mut() {
                    *state = CellState::from(rng.random_bool(p_alive));
                }
            }
            Some(limit) => {
                let chosen = rand::seq::index::sample(rng, count, limit.min(count));
                for index in chosen.iter() {
                    states[index] = CellState::from(rng.random_bool(p_alive));
                }
            }
        }
        debug!(cells = count, p_alive, limit = ?limit, "automaton_randomized");
        Ok(())
    }

    /// Grow the graph around `focus` when it is not fully surrounded.
    ///
    /// Requests one layer from the provider when the focus cell has fewer
    /// neighbors than a full cell or is flagged exposed. New cells start dead
    /// and existing states are untouched. Returns the number of new cells.
    pub fn grow_if_needed(&self, focus: CellIndex) -> AutomatonResult<usize> {
        let mut graph = lock(&self.graph);
        let before = graph.cell_count();
        if focus >= before {
            return Err(AutomatonError::CellOutOfRange {
                index: focus,
                count: before,
            });
        }

        let needs_growth = graph.degree(focus) < graph.full_degree() || graph.is_exposed(focus);
        if !needs_growth {
            return Ok(0);
        }

        let filter = graph.growth_filter(focus);
        let added = graph.add_layer(&filter);
        let after = graph.cell_count();
        debug_assert_eq!(after - before, added.len());

        let mut states = write(&self.states);
        states.resize(after, CellState::Dead);
        info!(focus, added = after - before, cells = after, "automaton_grown");
        Ok(after - before)
    }

    /// Recenter the provider's view on a cell.
    pub fn recenter_at(&self, index: CellIndex) -> AutomatonResult<()> {
        let mut graph = lock(&self.graph);
        let count = graph.cell_count();
        if index >= count {
            return Err(AutomatonError::CellOutOfRange { index, count });
        }
        graph.recenter_at(index);
        Ok(())
    }

    /// Current rule.
    pub fn rule(&self) -> Rule {
        read(&self.rule).clone()
    }

    /// Parse and install a rule. On error the previous rule stays in effect.
    pub fn set_rule(&self, text: &str) -> AutomatonResult<Rule> {
        let rule = Rule::parse(text)?;
        self.replace_rule(rule.clone());
        Ok(rule)
    }

    /// Install an already validated rule.
    pub fn replace_rule(&self, rule: Rule) {
        info!(rule = %rule, "automaton_rule_changed");
        *write(&self.rule) = rule;
    }
}

fn check_indices(indices: &[CellIndex], count: usize) -> AutomatonResult<()> {
    match indices.iter().find(|&&i| i >= count) {
        Some(&index) => Err(AutomatonError::CellOutOfRange { index, count }),
        None => Ok(()),
    }
}

impl<G: NeighborGraph> std::fmt::Debug for GraphAutomaton<G> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GraphAutomaton")
            .field("cell_count", &self.cell_count())
            .field("rule", &self.rule().to_string())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hypergol_core::{AdjacencyGraph, PendingLayer, Point};
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    use hypergol_core::CellState::{Alive, Dead};

    fn ring_automaton(n: usize) -> GraphAutomaton<AdjacencyGraph> {
        GraphAutomaton::new(AdjacencyGraph::ring(n), Rule::conway())
    }

    #[test]
    fn test_new_automaton_is_dead() {
        let automaton = ring_automaton(5);
        assert_eq!(automaton.cell_count(), 5);
        assert!(automaton.states().iter().all(|s| *s == Dead));
    }

    #[test]
    fn test_set_and_toggle() {
        let automaton = ring_automaton(4);
        automaton.set(1, true).unwrap();
        automaton.toggle(2).unwrap();
        automaton.toggle(1).unwrap();
        assert_eq!(automaton.states(), vec![Dead, Dead, Alive, Dead]);
    }

    #[test]
    fn test_out_of_range_rejects_whole_command() {
        let automaton = ring_automaton(4);
        let err = automaton.set_cells(&[0, 9], true).unwrap_err();
        assert!(matches!(err, AutomatonError::CellOutOfRange { index: 9, count: 4 }));
        assert!(automaton.states().iter().all(|s| *s == Dead));
    }

    #[test]
    fn test_step_uses_rule() {
        let automaton =
            GraphAutomaton::new(AdjacencyGraph::from_edges(2, &[(0, 1)]), Rule::new([1], []));
        automaton.set(0, true).unwrap();
        automaton.step();
        assert_eq!(automaton.states(), vec![Dead, Alive]);
    }

    #[test]
    fn test_invalid_rule_keeps_previous() {
        let automaton = ring_automaton(3);
        assert!(automaton.set_rule("b 3 x").is_err());
        assert_eq!(automaton.rule(), Rule::conway());

        let rule = automaton.set_rule("b1/s").unwrap();
        assert_eq!(automaton.rule(), rule);
    }

    #[test]
    fn test_randomize_validates_arguments() {
        let automaton = ring_automaton(3);
        let mut rng = StdRng::seed_from_u64(1);
        assert!(matches!(
            automaton.randomize(1.5, None, &mut rng),
            Err(AutomatonError::InvalidProbability { .. })
        ));
        assert!(matches!(
            automaton.randomize(f64::NAN, None, &mut rng),
            Err(AutomatonError::InvalidProbability { .. })
        ));
        assert!(matches!(
            automaton.randomize(0.5, Some(0), &mut rng),
            Err(AutomatonError::InvalidLimit { value: 0 })
        ));
    }

    #[test]
    fn test_randomize_extremes() {
        let automaton = ring_automaton(20);
        let mut rng = StdRng::seed_from_u64(7);
        automaton.randomize(1.0, None, &mut rng).unwrap();
        assert!(automaton.states().iter().all(|s| *s == Alive));
        automaton.randomize(0.0, None, &mut rng).unwrap();
        assert!(automaton.states().iter().all(|s| *s == Dead));
    }

    #[test]
    fn test_randomize_limit_touches_exactly_limit_cells() {
        let automaton = ring_automaton(50);
        let mut rng = StdRng::seed_from_u64(3);
        automaton.randomize(1.0, Some(7), &mut rng).unwrap();
        let alive = automaton.states().iter().filter(|s| s.is_alive()).count();
        assert_eq!(alive, 7);

        // A limit larger than the graph clamps to every cell.
        automaton.randomize(1.0, Some(500), &mut rng).unwrap();
        assert!(automaton.states().iter().all(|s| *s == Alive));
    }

    #[test]
    fn test_randomize_is_reproducible() {
        let a = ring_automaton(64);
        let b = ring_automaton(64);
        a.randomize(0.5, None, &mut StdRng::seed_from_u64(99)).unwrap();
        b.randomize(0.5, None, &mut StdRng::seed_from_u64(99)).unwrap();
        assert_eq!(a.states(), b.states());
    }

    #[test]
    fn test_grow_preserves_existing_states() {
        let mut graph = AdjacencyGraph::from_edges(3, &[(0, 1), (1, 2)]).with_full_degree(2);
        graph.queue_layer(PendingLayer {
            cells: vec![Point::new(1.0, 0.0), Point::new(2.0, 0.0)],
            edges: vec![(0, 3), (3, 4), (2, 4)],
        });
        let automaton = GraphAutomaton::new(graph, Rule::conway());
        automaton.set_cells(&[0, 2], true).unwrap();
        let before = automaton.states();

        let added = automaton.grow_if_needed(0).unwrap();

        assert_eq!(added, 2);
        let after = automaton.states();
        assert_eq!(after.len(), before.len() + 2);
        assert_eq!(&after[..before.len()], &before[..]);
        assert!(after[before.len()..].iter().all(|s| *s == Dead));
        assert_eq!(automaton.with_graph(|g| g.cell_count()), after.len());
    }

    #[test]
    fn test_full_cell_does_not_grow() {
        let mut graph = AdjacencyGraph::ring(4);
        graph.queue_layer(PendingLayer {
            cells: vec![Point::new(5.0, 5.0)],
            edges: vec![(0, 4)],
        });
        let automaton = GraphAutomaton::new(graph, Rule::conway());
        assert_eq!(automaton.grow_if_needed(0).unwrap(), 0);
        assert_eq!(automaton.cell_count(), 4);
    }

    #[test]
    fn test_exposed_cell_grows() {
        let mut graph = AdjacencyGraph::ring(4);
        graph.mark_exposed(2);
        graph.queue_layer(PendingLayer {
            cells: vec![Point::new(5.0, 5.0)],
            edges: vec![(2, 4)],
        });
        let automaton = GraphAutomaton::new(graph, Rule::conway());
        assert_eq!(automaton.grow_if_needed(2).unwrap(), 1);
        assert_eq!(automaton.cell_count(), 5);
    }
}
