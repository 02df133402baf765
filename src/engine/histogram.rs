use serde::{Deserialize, Serialize};

use crate::error::{FlameError, Result};
use crate::model::{Color, ColorMap, Point};

/// Dense additive accumulator over `width × height` cells, row-major.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistogramBuffer {
    width: u32,
    height: u32,
    cells: Vec<Color>,
}

/// Summary of a histogram's contents.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct HistogramStats {
    /// Cells with any accumulated contribution.
    pub hit_cells: usize,
    pub total_alpha: f64,
    pub max_alpha: f32,
}

impl HistogramBuffer {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            cells: vec![Color::ZERO; width as usize * height as usize],
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    /// Raw cell data, row-major.
    pub fn cells(&self) -> &[Color] {
        &self.cells
    }

    pub fn get(&self, x: u32, y: u32) -> Option<Color> {
        if x >= self.width || y >= self.height {
            return None;
        }
        self.cells
            .get(y as usize * self.width as usize + x as usize)
            .copied()
    }

    /// Reset every cell to zero.
    pub fn clear(&mut self) {
        self.cells.fill(Color::ZERO);
    }

    /// Clear and reallocate for a new size.
    pub fn resize(&mut self, width: u32, height: u32) {
        self.cells.clear();
        self.cells
            .resize(width as usize * height as usize, Color::ZERO);
        self.width = width;
        self.height = height;
    }

    /// Pixel under a system-space point, or `None` outside the half-open
    /// range `[0, width) × [0, height)`. NaN coordinates are outside.
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    pub fn pixel_for(&self, point: Point) -> Option<(u32, u32)> {
        let w = self.width as f32;
        let h = self.height as f32;
        let px = (point.x + 1.0) * (w * 0.5);
        let py = (point.y + 1.0) * (h * 0.5);
        if !(px >= 0.0 && px < w && py >= 0.0 && py < h) {
            return None;
        }
        Some((px as u32, py as u32))
    }

    /// Accumulate one emission. Out-of-bounds points are dropped silently.
    ///
    /// With a color map the cell receives `map(factor)`, otherwise
    /// `(1, 1, 1, factor)`. Returns whether a cell was hit.
    pub fn add(&mut self, point: Point, factor: f32, color_map: Option<&dyn ColorMap>) -> bool {
        let Some((x, y)) = self.pixel_for(point) else {
            return false;
        };
        let contribution = match color_map {
            Some(map) => map.map(factor),
            None => Color::rgba(1.0, 1.0, 1.0, factor),
        };
        self.plot(x, y, contribution)
    }

    /// Add `color` to one cell. Returns false when `(x, y)` is outside the buffer.
    pub fn plot(&mut self, x: u32, y: u32, color: Color) -> bool {
        if x >= self.width || y >= self.height {
            return false;
        }
        let idx = y as usize * self.width as usize + x as usize;
        match self.cells.get_mut(idx) {
            Some(cell) => {
                *cell += color;
                true
            }
            None => false,
        }
    }

    /// Cell-wise sum of another buffer of the same size into this one.
    pub fn merge(&mut self, other: &HistogramBuffer) -> Result<()> {
        if (self.width, self.height) != (other.width, other.height) {
            return Err(FlameError::configuration(format!(
                "cannot merge a {}x{} histogram into a {}x{} one",
                other.width, other.height, self.width, self.height
            )));
        }
        for (cell, &add) in self.cells.iter_mut().zip(&other.cells) {
            *cell += add;
        }
        Ok(())
    }

    pub fn is_empty(&self) -> bool {
        self.cells.iter().all(Color::is_zero)
    }

    pub fn stats(&self) -> HistogramStats {
        self.cells
            .iter()
            .filter(|c| !c.is_zero())
            .fold(HistogramStats::default(), |mut stats, c| {
                stats.hit_cells += 1;
                stats.total_alpha += f64::from(c.a);
                stats.max_alpha = stats.max_alpha.max(c.a);
                stats
            })
    }
}
