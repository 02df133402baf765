use rand::rngs::StdRng;
use serde::Serialize;

use crate::error::{FlameError, Result};
use crate::interpreter::Interpreter;
use crate::model::{FormulaDef, Params, Particle, Point, SystemDef};
use crate::random::seeded;

/// Fraction of the raw extent added around the preview points, split evenly
/// between both sides.
const MARGIN: f32 = 0.2;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Bounds {
    pub min: Point,
    pub max: Point,
}

impl Bounds {
    pub fn width(&self) -> f32 {
        self.max.x - self.min.x
    }

    pub fn height(&self) -> f32 {
        self.max.y - self.min.y
    }

    fn expanded(self, fraction: f32) -> Self {
        let dx = self.width() * fraction * 0.5;
        let dy = self.height() * fraction * 0.5;
        Self {
            min: Point::new(self.min.x - dx, self.min.y - dy),
            max: Point::new(self.max.x + dx, self.max.y + dy),
        }
    }
}

/// Where a regular grid ends up after a few applications of one formula.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PreviewGrid {
    pub width: u32,
    pub height: u32,
    /// Row-major, one per grid node.
    pub points: Vec<Point>,
    /// Extent of the finite points plus a margin. `None` if every point diverged.
    pub bounds: Option<Bounds>,
}

/// Push a `width × height` grid spanning `[-1, 1]²` through `formula`
/// `iterations` times.
pub fn preview_grid(
    formula: &FormulaDef,
    width: u32,
    height: u32,
    iterations: u32,
) -> Result<PreviewGrid> {
    if width < 2 || height < 2 {
        return Err(FlameError::configuration(format!(
            "preview grid needs at least 2x2 nodes, got {width}x{height}"
        )));
    }
    let def = SystemDef::single(formula.clone().with_weight(1.0));
    def.validate()?;
    let mut interpreter: Interpreter<StdRng> = Interpreter::new(
        &def.to_source(),
        Params::from_system(&def),
        Particle::IMMORTAL,
        seeded(Some(0)),
    )?;
    interpreter.check_bindings()?;

    let mut points = Vec::with_capacity(width as usize * height as usize);
    for j in 0..height {
        for i in 0..width {
            let start = Point::new(grid_coord(i, width), grid_coord(j, height));
            let mut particle = Particle::new(start, 0.0, Particle::IMMORTAL);
            let mut shown = start;
            for _ in 0..iterations {
                let result = interpreter.step(particle)?;
                particle = result.next;
                shown = result.emission.point;
            }
            points.push(shown);
        }
    }

    let bounds = bounding_box(&points).map(|b| b.expanded(MARGIN));
    Ok(PreviewGrid {
        width,
        height,
        points,
        bounds,
    })
}

#[allow(clippy::cast_precision_loss)]
fn grid_coord(i: u32, n: u32) -> f32 {
    i as f32 * 2.0 / (n - 1) as f32 - 1.0
}

fn bounding_box(points: &[Point]) -> Option<Bounds> {
    points
        .iter()
        .filter(|p| p.x.is_finite() && p.y.is_finite())
        .fold(None, |acc: Option<Bounds>, &p| {
            Some(match acc {
                None => Bounds { min: p, max: p },
                Some(b) => Bounds {
                    min: Point::new(b.min.x.min(p.x), b.min.y.min(p.y)),
                    max: Point::new(b.max.x.max(p.x), b.max.y.max(p.y)),
                },
            })
        })
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use super::*;
    use crate::ast::helpers::*;
    use crate::ast::Formula;
    use crate::library::FormulaKind;

    #[test]
    fn zero_iterations_returns_the_grid() {
        let grid = preview_grid(&FormulaDef::library(FormulaKind::Linear), 3, 2, 0).unwrap();
        assert_eq!(grid.points.len(), 6);
        assert_eq!(grid.points[0], Point::new(-1.0, -1.0));
        assert_eq!(grid.points[1], Point::new(0.0, -1.0));
        assert_eq!(grid.points[5], Point::new(1.0, 1.0));
        let bounds = grid.bounds.unwrap();
        assert!((bounds.min.x + 1.2).abs() < 1e-6);
        assert!((bounds.max.y - 1.2).abs() < 1e-6);
    }

    #[test]
    fn iterates_the_formula() {
        let halve = FormulaDef::custom(Formula::new(x() * 0.5, y() * 0.5), vec![]);
        let grid = preview_grid(&halve, 2, 2, 2).unwrap();
        assert_eq!(grid.points[3], Point::new(0.25, 0.25));
        let bounds = grid.bounds.unwrap();
        assert!((bounds.width() - 0.6).abs() < 1e-6);
    }

    #[test]
    fn diverging_points_are_left_out_of_bounds() {
        let blowup = FormulaDef::custom(Formula::new(x() / 0.0, y()), vec![]);
        let grid = preview_grid(&blowup, 2, 2, 1).unwrap();
        // x = ±1 / 0 is infinite everywhere
        assert!(grid.bounds.is_none());
    }

    #[test]
    fn uses_the_formula_parameters() {
        let scaled = FormulaDef::custom(Formula::new(x() * param(0), y()), vec![0.0]);
        let grid = preview_grid(&scaled, 2, 2, 1).unwrap();
        assert!(grid.points.iter().all(|p| p.x == 0.0));
        assert!(preview_grid(&scaled, 1, 4, 1).is_err());
    }
}
