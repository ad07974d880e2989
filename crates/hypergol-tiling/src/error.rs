use thiserror::Error;

/// Reasons a `{p,q}` tiling cannot be built.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum TilingError {
    #[error("{{{p},{q}}} needs p >= 3 and q >= 3")]
    TooSmall { p: u32, q: u32 },

    #[error("{{{p},{q}}} is not hyperbolic: (p-2)(q-2) must exceed 4")]
    NotHyperbolic { p: u32, q: u32 },

    #[error("a tiling needs at least one layer")]
    NoLayers,
}
