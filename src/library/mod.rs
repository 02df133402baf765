//! Built-in formula kinds, expressed as AST sources.
//!
//! Each kind's source reads its own parameters as `Parameter(0..n)`;
//! [`crate::model::SystemDef::to_source`] rebases them into the system-wide
//! index space.

use std::fmt;
use std::str::FromStr;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::ast::helpers::*;
use crate::ast::{Expression, Formula};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
pub enum FormulaKind {
    Linear,
    Sinusoidal,
    Spherical,
    Swirl,
    Horseshoe,
    Polar,
    DeJong,
}

impl FormulaKind {
    pub const ALL: [FormulaKind; 7] = [
        FormulaKind::Linear,
        FormulaKind::Sinusoidal,
        FormulaKind::Spherical,
        FormulaKind::Swirl,
        FormulaKind::Horseshoe,
        FormulaKind::Polar,
        FormulaKind::DeJong,
    ];

    pub fn name(self) -> &'static str {
        match self {
            FormulaKind::Linear => "Linear",
            FormulaKind::Sinusoidal => "Sinusoidal",
            FormulaKind::Spherical => "Spherical",
            FormulaKind::Swirl => "Swirl",
            FormulaKind::Horseshoe => "Horseshoe",
            FormulaKind::Polar => "Polar",
            FormulaKind::DeJong => "DeJong",
        }
    }

    /// Names of the local parameters, in index order.
    pub fn param_names(self) -> &'static [&'static str] {
        match self {
            FormulaKind::DeJong => &["a", "b", "c", "d"],
            _ => &[],
        }
    }

    pub fn param_count(self) -> usize {
        self.param_names().len()
    }

    /// A parameter set that produces a visually interesting attractor.
    pub fn default_params(self) -> Vec<f32> {
        match self {
            FormulaKind::DeJong => vec![
                -1.929_230_2,
                -1.755_941,
                -1.841_377_2,
                -1.972_643_8,
            ],
            _ => Vec::new(),
        }
    }

    pub fn source(self) -> Formula {
        match self {
            FormulaKind::Linear => Formula::new(x(), y()),
            FormulaKind::Sinusoidal => Formula::new(sin(x()), sin(y())),
            FormulaKind::Spherical => Formula::new(x() / radius_squared(), y() / radius_squared()),
            FormulaKind::Swirl => Formula::new(
                x() * sin(radius_squared()) - y() * cos(radius_squared()),
                x() * cos(radius_squared()) + y() * sin(radius_squared()),
            ),
            FormulaKind::Horseshoe => Formula::new(
                (x() - y()) * (x() + y()) / radius(),
                2.0 * x() * y() / radius(),
            ),
            FormulaKind::Polar => Formula::new(
                atan(y() / x()) / std::f32::consts::PI,
                radius() - 1.0,
            ),
            FormulaKind::DeJong => Formula::new(
                sin(param(0) * y()) - cos(param(1) * x()),
                sin(param(2) * x()) - cos(param(3) * y()),
            ),
        }
    }
}

fn radius_squared() -> Expression {
    x() * x() + y() * y()
}

fn radius() -> Expression {
    distance(point(x(), y()), point(0.0, 0.0))
}

impl fmt::Display for FormulaKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for FormulaKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        FormulaKind::ALL
            .into_iter()
            .find(|kind| kind.name().eq_ignore_ascii_case(s))
            .ok_or_else(|| format!("Unknown formula kind: {s}"))
    }
}
