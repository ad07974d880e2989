//! Presentation seam.
//!
//! Cell states carry no display data. The renderer side owns a [`Palette`]
//! that maps each state to a color and receives one color per cell.

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::graph::{CellIndex, Point};
use crate::state::CellState;

/// RGBA color.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl Color {
    pub const WHITE: Color = Color::rgb(255, 255, 255);
    pub const BLUE: Color = Color::rgb(0, 0, 255);

    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b, a: 255 }
    }
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{:02x}{:02x}{:02x}{:02x}", self.r, self.g, self.b, self.a)
    }
}

/// Mapping from cell state to display color.
#[derive(Debug, Clone, PartialEq)]
pub struct Palette {
    colors: HashMap<CellState, Color>,
    fallback: Color,
}

impl Default for Palette {
    fn default() -> Self {
        Self::new(Color::WHITE)
            .with(CellState::Dead, Color::WHITE)
            .with(CellState::Alive, Color::BLUE)
    }
}

impl Palette {
    /// Empty palette; unmapped states use `fallback`.
    pub fn new(fallback: Color) -> Self {
        Self {
            colors: HashMap::new(),
            fallback,
        }
    }

    /// Assign a color to a state (builder pattern).
    pub fn with(mut self, state: CellState, color: Color) -> Self {
        self.colors.insert(state, color);
        self
    }

    pub fn color_of(&self, state: CellState) -> Color {
        self.colors.get(&state).copied().unwrap_or(self.fallback)
    }

    /// One color per cell, index-aligned with `states`.
    pub fn colors_for(&self, states: &[CellState]) -> Vec<Color> {
        states.iter().map(|s| self.color_of(*s)).collect()
    }
}

/// Output-only interface of an external renderer.
pub trait Renderer: Send {
    /// Draw every cell with the given colors (index-aligned).
    fn render(&mut self, colors: &[Color]);

    /// Draw a cell's index at a position.
    fn place_label(&mut self, index: CellIndex, position: Point);

    /// Remove every label placed so far.
    fn clear_labels(&mut self);
}
