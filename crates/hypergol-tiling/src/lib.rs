//! Regular hyperbolic tilings as neighbor graphs.
//!
//! A `{p,q}` tiling covers the hyperbolic plane with regular `p`-gons, `q`
//! of them meeting at every vertex. It exists when `(p-2)(q-2) > 4`. The
//! tiling is drawn in the Poincaré disk model: cells are polygons, two
//! cells are neighbors when they share at least one vertex, and the patch
//! grows by reflecting frontier polygons across their edges.
//!
//! ```
//! use hypergol_core::NeighborGraph;
//! use hypergol_tiling::HyperbolicTiling;
//!
//! let tiling = HyperbolicTiling::new(7, 3, 2).unwrap();
//! assert_eq!(tiling.cell_count(), 8);
//! assert_eq!(tiling.degree(0), tiling.full_degree());
//! ```

mod disk;
mod error;
mod tiling;

pub use disk::{from_point, to_point, DiskGeometry};
pub use error::TilingError;
pub use tiling::HyperbolicTiling;
