//! Mosaic layout engine
//!
//! Turns a window count into an ordered list of non-overlapping rectangles
//! inside the root surface. Stateless: call it again whenever the root
//! surface changes size.

use serde::{Deserialize, Serialize};

use crate::error::{WmError, WmResult};

/// Rectangle in root-surface pixel coordinates
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Rect {
    pub x: i32,
    pub y: i32,
    pub width: u32,
    pub height: u32,
}

impl Rect {
    pub const fn new(x: i32, y: i32, width: u32, height: u32) -> Self {
        Self { x, y, width, height }
    }

    /// Rectangle anchored at the origin covering `size`
    pub const fn from_size(size: Size) -> Self {
        Self::new(0, 0, size.width, size.height)
    }

    pub fn size(&self) -> Size {
        Size::new(self.width, self.height)
    }

    #[cfg(test)]
    pub fn area(&self) -> u64 {
        self.width as u64 * self.height as u64
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    /// Intersection with the area `(0, 0, size)`; empty if they don't overlap
    pub fn clamp_to(&self, size: Size) -> Rect {
        let x0 = self.x.clamp(0, size.width as i32);
        let y0 = self.y.clamp(0, size.height as i32);
        let x1 = (self.x as i64 + self.width as i64).clamp(x0 as i64, size.width as i64);
        let y1 = (self.y as i64 + self.height as i64).clamp(y0 as i64, size.height as i64);
        Rect::new(x0, y0, (x1 - x0 as i64) as u32, (y1 - y0 as i64) as u32)
    }
}

/// Width/height pair
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Size {
    pub width: u32,
    pub height: u32,
}

impl Size {
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }
}

/// How windows are arranged in the root surface
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Layout {
    /// Automatic grid, recomputed from the root size
    Grid,
    /// Explicit rectangles, one per window, in absolute root coordinates
    Manual(Vec<Rect>),
}

impl Layout {
    /// Check that this layout can place `count` windows
    pub fn validate(&self, count: usize) -> WmResult<()> {
        match self {
            Layout::Grid => Ok(()),
            Layout::Manual(rects) if rects.len() == count => Ok(()),
            Layout::Manual(rects) => Err(WmError::Configuration(format!(
                "manual layout has {} rects but {} windows are configured",
                rects.len(),
                count
            ))),
        }
    }

    /// Rectangles for `count` windows inside a root surface of `area`
    ///
    /// Manual rects are returned verbatim; the caller validates the count
    /// before applying them.
    pub fn compute(&self, count: usize, area: Size) -> Vec<Rect> {
        match self {
            Layout::Grid => grid(count, area),
            Layout::Manual(rects) => rects.clone(),
        }
    }
}

/// Columns and rows for `n` cells: the smallest square-ish grid, wider than tall
pub fn grid_dimensions(n: usize) -> (usize, usize) {
    if n == 0 {
        return (0, 0);
    }
    let mut cols = (n as f64).sqrt().ceil() as usize;
    // Guard against float rounding on perfect squares
    while cols > 1 && (cols - 1) * (cols - 1) >= n {
        cols -= 1;
    }
    let rows = n.div_ceil(cols);
    (cols, rows)
}

fn grid(n: usize, area: Size) -> Vec<Rect> {
    let (cols, rows) = grid_dimensions(n);
    let mut rects = Vec::with_capacity(n);

    for row in 0..rows {
        let remaining = n - row * cols;
        let in_row = remaining.min(cols);
        let y0 = split(area.height, rows, row);
        let y1 = split(area.height, rows, row + 1);

        for col in 0..in_row {
            let x0 = split(area.width, in_row, col);
            let x1 = split(area.width, in_row, col + 1);
            rects.push(Rect::new(x0 as i32, y0 as i32, x1 - x0, y1 - y0));
        }
    }

    rects
}

/// Boundary `i` of `total` divided into `parts`; boundaries tile exactly
fn split(total: u32, parts: usize, i: usize) -> u32 {
    (total as u64 * i as u64 / parts as u64) as u32
}
