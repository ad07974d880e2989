//! Neighbor graph abstraction supplied by an external geometry provider.
//!
//! Cells are identified by stable indices in `[0, cell_count())`. Growth only
//! ever appends indices at the end; existing indices are never renumbered.

use std::collections::{HashMap, HashSet, VecDeque};

use petgraph::graph::{NodeIndex, UnGraph};
use serde::{Deserialize, Serialize};

/// Stable index of a cell.
pub type CellIndex = usize;

/// A position in the provider's drawing plane.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Euclidean distance in the drawing plane.
    pub fn distance(&self, other: &Point) -> f64 {
        (self.x - other.x).hypot(self.y - other.y)
    }
}

/// Predicate deciding which candidate cells a new layer keeps, by center.
pub type GrowthFilter = Box<dyn Fn(Point) -> bool + Send + Sync>;

/// Adjacency structure over cell indices.
///
/// Implemented by the geometry provider; the automaton only calls into it.
pub trait NeighborGraph: Send {
    /// Number of cells, i.e. the size of the index space.
    fn cell_count(&self) -> usize;

    /// Neighbor indices of a cell (unordered, no duplicates).
    fn neighbors_of(&self, index: CellIndex) -> impl Iterator<Item = CellIndex> + '_;

    /// Number of neighbors of a cell.
    fn degree(&self, index: CellIndex) -> usize {
        self.neighbors_of(index).count()
    }

    /// Neighbor count of a fully surrounded (interior) cell.
    fn full_degree(&self) -> usize;

    /// Whether the provider considers the cell to sit on the growth frontier.
    fn is_exposed(&self, index: CellIndex) -> bool;

    /// Distance-based filter to pass to [`NeighborGraph::add_layer`] when
    /// growing around `focus`.
    fn growth_filter(&self, focus: CellIndex) -> GrowthFilter;

    /// Append one layer of cells accepted by `filter`, returning the new
    /// indices (contiguous, starting at the previous `cell_count()`).
    fn add_layer(&mut self, filter: &GrowthFilter) -> Vec<CellIndex>;

    /// Drawing position of a cell's center.
    fn center_of(&self, index: CellIndex) -> Point;

    /// Move the view so that the given cell sits at the origin.
    fn recenter_at(&mut self, index: CellIndex);
}

// =============================================================================
// Explicit adjacency provider
// =============================================================================

/// A layer queued on an [`AdjacencyGraph`] for a later `add_layer` call.
///
/// Edges use provisional indices: existing cells keep their index, and the
/// `k`-th queued cell is addressed as `cell_count() + k` at queue time.
#[derive(Debug, Clone, Default)]
pub struct PendingLayer {
    pub cells: Vec<Point>,
    pub edges: Vec<(CellIndex, CellIndex)>,
}

/// Explicit, petgraph-backed neighbor graph.
///
/// Useful for lattices, rings and hand-built fixtures. Growth replays layers
/// queued with [`AdjacencyGraph::queue_layer`].
#[derive(Debug, Clone, Default)]
pub struct AdjacencyGraph {
    graph: UnGraph<Point, ()>,
    full_degree: Option<usize>,
    exposed: HashSet<CellIndex>,
    pending: VecDeque<(CellIndex, PendingLayer)>,
    growth_radius: Option<f64>,
}

impl AdjacencyGraph {
    /// Create an empty graph.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a graph of `n` isolated cells at the origin.
    pub fn with_cells(n: usize) -> Self {
        let mut graph = Self::new();
        for _ in 0..n {
            graph.add_cell(Point::default());
        }
        graph
    }

    /// Create a graph of `n` cells and the given undirected edges.
    pub fn from_edges(n: usize, edges: &[(CellIndex, CellIndex)]) -> Self {
        let mut graph = Self::with_cells(n);
        for &(a, b) in edges {
            graph.connect(a, b);
        }
        graph
    }

    /// A cycle of `n` cells laid out on the unit circle.
    pub fn ring(n: usize) -> Self {
        let mut graph = Self::new();
        for i in 0..n {
            let angle = std::f64::consts::TAU * i as f64 / n.max(1) as f64;
            graph.add_cell(Point::new(angle.cos(), angle.sin()));
        }
        for i in 0..n {
            graph.connect(i, (i + 1) % n);
        }
        graph
    }

    /// Fix the full-cell neighbor count instead of deriving it.
    pub fn with_full_degree(mut self, degree: usize) -> Self {
        self.full_degree = Some(degree);
        self
    }

    /// Only accept grown cells within this distance of the focus center.
    pub fn with_growth_radius(mut self, radius: f64) -> Self {
        self.growth_radius = Some(radius);
        self
    }

    /// Append a cell and return its index.
    pub fn add_cell(&mut self, center: Point) -> CellIndex {
        self.graph.add_node(center).index()
    }

    /// Connect two cells; repeated calls keep a single edge.
    pub fn connect(&mut self, a: CellIndex, b: CellIndex) {
        if a == b {
            return;
        }
        self.graph
            .update_edge(NodeIndex::new(a), NodeIndex::new(b), ());
    }

    /// Flag a cell as exposed (on the growth frontier).
    pub fn mark_exposed(&mut self, index: CellIndex) {
        self.exposed.insert(index);
    }

    /// Queue a layer to be appended by the next `add_layer` call.
    pub fn queue_layer(&mut self, layer: PendingLayer) {
        let base = self.cell_count()
            + self
                .pending
                .iter()
                .map(|(_, queued)| queued.cells.len())
                .sum::<usize>();
        self.pending.push_back((base, layer));
    }
}

impl NeighborGraph for AdjacencyGraph {
    fn cell_count(&self) -> usize {
        self.graph.node_count()
    }

    fn neighbors_of(&self, index: CellIndex) -> impl Iterator<Item = CellIndex> + '_ {
        self.graph
            .neighbors(NodeIndex::new(index))
            .map(|n| n.index())
    }

    fn full_degree(&self) -> usize {
        self.full_degree.unwrap_or_else(|| {
            (0..self.cell_count())
                .map(|i| self.degree(i))
                .max()
                .unwrap_or(0)
        })
    }

    fn is_exposed(&self, index: CellIndex) -> bool {
        self.exposed.contains(&index)
    }

    fn growth_filter(&self, focus: CellIndex) -> GrowthFilter {
        match self.growth_radius {
            Some(radius) => {
                let center = self.center_of(focus);
                Box::new(move |p: Point| p.distance(&center) <= radius)
            }
            None => Box::new(|_| true),
        }
    }

    fn add_layer(&mut self, filter: &GrowthFilter) -> Vec<CellIndex> {
        let Some((base, layer)) = self.pending.pop_front() else {
            return Vec::new();
        };

        let mut remap: HashMap<CellIndex, CellIndex> = HashMap::new();
        let mut added = Vec::new();
        for (k, center) in layer.cells.iter().enumerate() {
            if filter(*center) {
                let index = self.add_cell(*center);
                remap.insert(base + k, index);
                added.push(index);
            }
        }

        let resolve = |i: CellIndex| -> Option<CellIndex> {
            if i < base {
                Some(i)
            } else {
                remap.get(&i).copied()
            }
        };
        for (a, b) in layer.edges {
            if let (Some(a), Some(b)) = (resolve(a), resolve(b)) {
                self.connect(a, b);
            }
        }

        added
    }

    fn center_of(&self, index: CellIndex) -> Point {
        self.graph[NodeIndex::new(index)]
    }

    fn recenter_at(&mut self, index: CellIndex) {
        let origin = self.center_of(index);
        for weight in self.graph.node_weights_mut() {
            weight.x -= origin.x;
            weight.y -= origin.y;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ring_neighbors() {
        let graph = AdjacencyGraph::ring(5);
        let mut neighbors: Vec<_> = graph.neighbors_of(0).collect();
        neighbors.sort();
        assert_eq!(neighbors, vec![1, 4]);
        assert_eq!(graph.full_degree(), 2);
    }

    #[test]
    fn test_connect_is_idempotent() {
        let mut graph = AdjacencyGraph::with_cells(2);
        graph.connect(0, 1);
        graph.connect(1, 0);
        graph.connect(1, 1);
        assert_eq!(graph.degree(0), 1);
        assert_eq!(graph.degree(1), 1);
    }

    #[test]
    fn test_queued_layer_is_appended_and_filtered() {
        let mut graph = AdjacencyGraph::from_edges(2, &[(0, 1)]);
        graph.queue_layer(PendingLayer {
            cells: vec![Point::new(1.0, 0.0), Point::new(50.0, 0.0)],
            edges: vec![(0, 2), (1, 3), (2, 3)],
        });

        let filter: GrowthFilter = Box::new(|p: Point| p.x < 10.0);
        let added = graph.add_layer(&filter);

        assert_eq!(added, vec![2]);
        assert_eq!(graph.cell_count(), 3);
        assert_eq!(graph.neighbors_of(2).collect::<Vec<_>>(), vec![0]);
        assert!(graph.add_layer(&filter).is_empty());
    }

    #[test]
    fn test_recenter_moves_focus_to_origin() {
        let mut graph = AdjacencyGraph::ring(4);
        graph.recenter_at(1);
        let center = graph.center_of(1);
        assert!(center.x.abs() < 1e-12 && center.y.abs() < 1e-12);
    }
}
