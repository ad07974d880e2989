//! `{p,q}` tiling patch stored as a petgraph of polygons.

use std::collections::{BTreeSet, HashMap};
use std::f64::consts::{PI, TAU};

use petgraph::graph::{NodeIndex, UnGraph};
use tracing::{debug, info};

use hypergol_core::{CellIndex, GrowthFilter, NeighborGraph, Point};

use num_complex::Complex64;

use crate::disk::{from_point, to_point, DiskGeometry};
use crate::error::TilingError;

/// Two points closer than this hyperbolic distance are the same point.
const TOLERANCE: f64 = 1e-6;

/// Bucket edge; at least the Euclidean size of [`TOLERANCE`] anywhere in the disk.
const GRID: f64 = TOLERANCE / 2.0;

#[derive(Debug, Clone)]
struct Polygon {
    center: Complex64,
    vertices: Vec<Complex64>,
}

impl Polygon {
    fn regular(sides: u32, radius: f64) -> Self {
        let vertices = (0..sides)
            .map(|k| Complex64::from_polar(radius, TAU * f64::from(k) / f64::from(sides)))
            .collect();
        Self {
            center: Complex64::new(0.0, 0.0),
            vertices,
        }
    }

    fn edge(&self, k: usize) -> (Complex64, Complex64) {
        let next = (k + 1) % self.vertices.len();
        (self.vertices[k], self.vertices[next])
    }

    fn map(&self, f: impl Fn(Complex64) -> Complex64) -> Self {
        Self {
            center: f(self.center),
            vertices: self.vertices.iter().map(|&v| f(v)).collect(),
        }
    }

    /// The neighboring tile across edge `k`.
    fn reflected(&self, k: usize) -> Self {
        let (a, b) = self.edge(k);
        self.map(|z| z.reflect_across(a, b))
    }
}

/// Grid-bucketed point lookup with hyperbolic tolerance.
#[derive(Debug, Clone, Default)]
struct SpatialIndex {
    buckets: HashMap<(i64, i64), Vec<(Complex64, CellIndex)>>,
}

impl SpatialIndex {
    fn key(z: Complex64) -> (i64, i64) {
        ((z.re / GRID).floor() as i64, (z.im / GRID).floor() as i64)
    }

    fn insert(&mut self, z: Complex64, index: CellIndex) {
        self.buckets.entry(Self::key(z)).or_default().push((z, index));
    }

    fn matches(&self, z: Complex64) -> impl Iterator<Item = CellIndex> + '_ {
        let (kx, ky) = Self::key(z);
        (-1..=1)
            .flat_map(move |dx| (-1..=1).map(move |dy| (kx + dx, ky + dy)))
            .filter_map(|key| self.buckets.get(&key))
            .flatten()
            .filter(move |(w, _)| w.hyperbolic_distance(z) < TOLERANCE)
            .map(|&(_, index)| index)
    }

    fn contains(&self, z: Complex64) -> bool {
        self.matches(z).next().is_some()
    }
}

/// A finite, growable patch of a regular `{p,q}` hyperbolic tiling.
///
/// Cell indices are assigned in insertion order, so growth only appends.
/// Neighbors are cells sharing at least one vertex, which gives interior
/// cells `p·(q-2)` neighbors.
#[derive(Debug, Clone)]
pub struct HyperbolicTiling {
    p: u32,
    q: u32,
    graph: UnGraph<Polygon, ()>,
    centers: SpatialIndex,
    vertices: SpatialIndex,
    reach: f64,
}

impl HyperbolicTiling {
    /// Build a patch of `layers` rings around a central polygon.
    ///
    /// One layer is the central polygon alone; every further layer adds the
    /// reflections of the current frontier across its open edges.
    pub fn new(p: u32, q: u32, layers: u32) -> Result<Self, TilingError> {
        if p < 3 || q < 3 {
            return Err(TilingError::TooSmall { p, q });
        }
        if u64::from(p - 2) * u64::from(q - 2) <= 4 {
            return Err(TilingError::NotHyperbolic { p, q });
        }
        if layers == 0 {
            return Err(TilingError::NoLayers);
        }

        let (pf, qf) = (f64::from(p), f64::from(q));
        let vertex_radius = ((PI / pf + PI / qf).cos() / (PI / pf - PI / qf).cos()).sqrt();
        let circumradius = ((PI / pf).tan().recip() * (PI / qf).tan().recip()).acosh();
        let inradius = ((PI / qf).cos() / (PI / pf).sin()).acosh();

        let mut tiling = Self {
            p,
            q,
            graph: UnGraph::default(),
            centers: SpatialIndex::default(),
            vertices: SpatialIndex::default(),
            reach: 2.0 * (circumradius + inradius) + TOLERANCE,
        };
        tiling.insert(Polygon::regular(p, vertex_radius));
        for _ in 1..layers {
            tiling.grow_layer(|_| true);
        }

        info!(p, q, layers, cells = tiling.cell_count(), "tiling_built");
        Ok(tiling)
    }

    /// Polygon side count.
    pub fn p(&self) -> u32 {
        self.p
    }

    /// Polygons meeting at each vertex.
    pub fn q(&self) -> u32 {
        self.q
    }

    fn polygon(&self, index: CellIndex) -> &Polygon {
        &self.graph[NodeIndex::new(index)]
    }

    fn insert(&mut self, polygon: Polygon) -> CellIndex {
        let index = self.graph.node_count();
        let adjacent: BTreeSet<CellIndex> = polygon
            .vertices
            .iter()
            .flat_map(|&v| self.vertices.matches(v))
            .collect();

        for &v in &polygon.vertices {
            self.vertices.insert(v, index);
        }
        self.centers.insert(polygon.center, index);
        let node = self.graph.add_node(polygon);

        for other in adjacent {
            self.graph.update_edge(node, NodeIndex::new(other), ());
        }
        index
    }

    fn grow_layer(&mut self, accept: impl Fn(Complex64) -> bool) -> Vec<CellIndex> {
        let frontier: Vec<CellIndex> = (0..self.cell_count())
            .filter(|&i| self.is_exposed(i))
            .collect();

        let mut added = Vec::new();
        for cell in frontier {
            for k in 0..self.p as usize {
                let candidate = self.polygon(cell).reflected(k);
                if self.centers.contains(candidate.center) || !accept(candidate.center) {
                    continue;
                }
                added.push(self.insert(candidate));
            }
        }

        debug!(added = added.len(), cells = self.cell_count(), "tiling_layer_added");
        added
    }

    fn rebuild_indexes(&mut self) {
        self.centers = SpatialIndex::default();
        self.vertices = SpatialIndex::default();
        for node in self.graph.node_indices() {
            let polygon = &self.graph[node];
            self.centers.insert(polygon.center, node.index());
            for &v in &polygon.vertices {
                self.vertices.insert(v, node.index());
            }
        }
    }
}

impl NeighborGraph for HyperbolicTiling {
    fn cell_count(&self) -> usize {
        self.graph.node_count()
    }

    fn neighbors_of(&self, index: CellIndex) -> impl Iterator<Item = CellIndex> + '_ {
        self.graph
            .neighbors(NodeIndex::new(index))
            .map(|n| n.index())
    }

    fn full_degree(&self) -> usize {
        (self.p * (self.q - 2)) as usize
    }

    /// A cell is exposed while some tile across one of its edges is missing.
    fn is_exposed(&self, index: CellIndex) -> bool {
        let polygon = self.polygon(index);
        (0..polygon.vertices.len()).any(|k| {
            let (a, b) = polygon.edge(k);
            !self.centers.contains(polygon.center.reflect_across(a, b))
        })
    }

    /// Accepts centers within two circumradii plus one tile spacing of the
    /// focus, measured hyperbolically.
    fn growth_filter(&self, focus: CellIndex) -> GrowthFilter {
        let center = self.polygon(focus).center;
        let reach = self.reach;
        Box::new(move |p: Point| center.hyperbolic_distance(from_point(p)) <= reach)
    }

    fn add_layer(&mut self, filter: &GrowthFilter) -> Vec<CellIndex> {
        self.grow_layer(|z| filter(to_point(z)))
    }

    fn center_of(&self, index: CellIndex) -> Point {
        to_point(self.polygon(index).center)
    }

    fn recenter_at(&mut self, index: CellIndex) {
        let a = self.polygon(index).center;
        for polygon in self.graph.node_weights_mut() {
            *polygon = polygon.map(|z| z.mobius(a));
        }
        self.rebuild_indexes();
        debug!(index, "tiling_recentered");
    }
}
