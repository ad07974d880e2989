//! Growth of a tiling driven through the automaton.

use hypergol_automaton::GraphAutomaton;
use hypergol_core::CellState::{Alive, Dead};
use hypergol_core::{NeighborGraph, Rule};
use hypergol_tiling::HyperbolicTiling;

#[test]
fn growing_around_the_center_completes_it() {
    let tiling = HyperbolicTiling::new(4, 5, 2).unwrap();
    let automaton = GraphAutomaton::new(tiling, Rule::conway());
    automaton.set_cells(&[1, 3], true).unwrap();

    let added = automaton.grow_if_needed(0).unwrap();

    assert_eq!(added, 12);
    assert_eq!(automaton.cell_count(), 17);
    let states = automaton.states();
    assert_eq!(states[1], Alive);
    assert_eq!(states[3], Alive);
    assert!(states[5..].iter().all(|s| *s == Dead));
    assert_eq!(
        automaton.with_graph(|g| g.degree(0)),
        automaton.with_graph(|g| g.full_degree())
    );

    assert_eq!(automaton.grow_if_needed(0).unwrap(), 0);
}

#[test]
fn moving_to_a_frontier_cell_grows_around_it() {
    let tiling = HyperbolicTiling::new(4, 5, 3).unwrap();
    let automaton = GraphAutomaton::new(tiling, Rule::conway());
    let before = automaton.cell_count();

    let frontier = automaton.with_graph(|g| (0..g.cell_count()).rev().find(|&i| g.is_exposed(i)));
    let frontier = frontier.unwrap();

    automaton.recenter_at(frontier).unwrap();
    let added = automaton.grow_if_needed(frontier).unwrap();

    assert!(added > 0);
    assert_eq!(automaton.cell_count(), before + added);
    let center = automaton.with_graph(|g| g.center_of(frontier));
    assert!(center.x.abs() < 1e-9 && center.y.abs() < 1e-9);
}

#[test]
fn evolution_on_a_tiling_is_deterministic() {
    let build = || {
        let automaton = GraphAutomaton::new(
            HyperbolicTiling::new(5, 4, 3).unwrap(),
            Rule::parse("b 3 s 2 3").unwrap(),
        );
        automaton.set_cells(&[0, 1, 2, 6, 7], true).unwrap();
        for _ in 0..4 {
            automaton.step();
        }
        automaton.states()
    };
    assert_eq!(build(), build());
}
