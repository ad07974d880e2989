//! Terminal renderer for the interactive shell.
//!
//! Each frame is a row-wrapped strip of truecolor blocks, one per cell in
//! index order. Labels are listed under the frame as `#index (x, y)`.

use std::io::Write;

use hypergol_core::{CellIndex, Color, Point, Renderer};
use tracing::warn;

/// Cells per printed row.
const ROW_WIDTH: usize = 48;

pub struct TerminalRenderer<W: Write + Send> {
    out: W,
    frame: u64,
}

impl<W: Write + Send> TerminalRenderer<W> {
    pub fn new(out: W) -> Self {
        Self { out, frame: 0 }
    }

    fn draw(&mut self, colors: &[Color]) -> std::io::Result<()> {
        writeln!(self.out, "[frame {}] cells={}", self.frame, colors.len())?;
        for row in colors.chunks(ROW_WIDTH) {
            for color in row {
                write!(self.out, "\x1b[38;2;{};{};{}m█", color.r, color.g, color.b)?;
            }
            writeln!(self.out, "\x1b[0m")?;
        }
        self.out.flush()
    }
}

impl<W: Write + Send> Renderer for TerminalRenderer<W> {
    fn render(&mut self, colors: &[Color]) {
        self.frame += 1;
        if let Err(err) = self.draw(colors) {
            warn!(error = %err, "render_failed");
        }
    }

    fn place_label(&mut self, index: CellIndex, center: Point) {
        if let Err(err) = writeln!(self.out, "  #{index} ({:.3}, {:.3})", center.x, center.y) {
            warn!(error = %err, "label_failed");
        }
    }

    // Printed labels scroll away with their frame.
    fn clear_labels(&mut self) {}
}
