//! Editable system description, one level above the AST.
//!
//! A [`SystemDef`] is what gets loaded from disk or assembled by a host: formulas
//! carry their own local parameter values. [`SystemDef::to_source`] lowers it into
//! an immutable [`System`] and [`Params::from_system`](super::Params::from_system)
//! collects the values that the lowered tree references.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use super::transform::Transform;
use crate::ast::{Blend, Expression, Formula, LimitedBlend, System, WeightedFormula};
use crate::error::{FlameError, Result};
use crate::library::FormulaKind;

fn default_weight() -> f32 {
    1.0
}

fn default_color() -> f32 {
    0.5
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum FormulaSource {
    Library(FormulaKind),
    Custom {
        x: Expression,
        y: Expression,
        /// Display names for the local parameters. Missing names fall back to `p{k}`.
        #[serde(default)]
        param_names: Vec<String>,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct FormulaDef {
    pub source: FormulaSource,
    /// Local parameter values, referenced as `Parameter(0..n)` by the source.
    #[serde(default)]
    pub params: Vec<f32>,
    #[serde(default = "default_weight")]
    pub weight: f32,
    #[serde(default = "default_color")]
    pub color: f32,
}

impl FormulaDef {
    /// Library formula with its default parameters.
    pub fn library(kind: FormulaKind) -> Self {
        Self {
            source: FormulaSource::Library(kind),
            params: kind.default_params(),
            weight: default_weight(),
            color: default_color(),
        }
    }

    pub fn custom(formula: Formula, params: Vec<f32>) -> Self {
        Self {
            source: FormulaSource::Custom {
                x: formula.x,
                y: formula.y,
                param_names: Vec::new(),
            },
            params,
            weight: default_weight(),
            color: default_color(),
        }
    }

    pub fn with_weight(mut self, weight: f32) -> Self {
        self.weight = weight;
        self
    }

    pub fn with_color(mut self, color: f32) -> Self {
        self.color = color;
        self
    }

    /// The formula with local parameter indices.
    pub fn formula(&self) -> Formula {
        match &self.source {
            FormulaSource::Library(kind) => kind.source(),
            FormulaSource::Custom { x, y, .. } => Formula {
                x: x.clone(),
                y: y.clone(),
            },
        }
    }

    /// Number of parameter slots the formula references.
    pub fn param_count(&self) -> usize {
        match &self.source {
            FormulaSource::Library(kind) => kind.param_count(),
            FormulaSource::Custom { .. } => {
                let formula = self.formula();
                let mut count = 0;
                for expr in [&formula.x, &formula.y] {
                    crate::ast::Node::Expression(expr).walk(&mut |node| {
                        if let crate::ast::Node::Expression(Expression::Parameter(i)) = node {
                            count = count.max(*i as usize + 1);
                        }
                    });
                }
                count
            }
        }
    }

    pub fn param_name(&self, k: usize) -> String {
        let named = match &self.source {
            FormulaSource::Library(kind) => kind.param_names().get(k).map(|s| (*s).to_string()),
            FormulaSource::Custom { param_names, .. } => param_names.get(k).cloned(),
        };
        named.unwrap_or_else(|| format!("p{k}"))
    }

    fn to_source(&self, offset: &mut u32) -> WeightedFormula {
        let formula = self.formula().rebased(*offset);
        *offset += u32::try_from(self.param_count()).unwrap_or(u32::MAX);
        WeightedFormula::new(formula, self.weight, self.color)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct BlendDef {
    #[serde(default)]
    pub pre: Transform,
    #[serde(default)]
    pub post: Transform,
    #[serde(default)]
    pub formulas: Vec<FormulaDef>,
    /// Selection weight among the system's blends. Ignored on the final blend.
    #[serde(default = "default_weight")]
    pub weight: f32,
}

impl Default for BlendDef {
    fn default() -> Self {
        Self {
            pre: Transform::IDENTITY,
            post: Transform::IDENTITY,
            formulas: Vec::new(),
            weight: default_weight(),
        }
    }
}

impl BlendDef {
    pub fn new(formulas: Vec<FormulaDef>) -> Self {
        Self {
            formulas,
            ..Self::default()
        }
    }

    fn to_source(&self, offset: &mut u32) -> Blend {
        let formulas = self.formulas.iter().map(|f| f.to_source(offset)).collect();
        Blend::new(formulas, self.pre, self.post)
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize, JsonSchema)]
pub struct SystemDef {
    pub blends: Vec<BlendDef>,
    #[serde(default)]
    pub final_blend: BlendDef,
}

impl SystemDef {
    /// One blend holding one formula, pass-through final blend.
    pub fn single(formula: FormulaDef) -> Self {
        Self {
            blends: vec![BlendDef::new(vec![formula])],
            final_blend: BlendDef::default(),
        }
    }

    /// Every formula with its parameter-name prefix, in parameter index order.
    pub fn formulas_in_order(&self) -> impl Iterator<Item = (String, &FormulaDef)> {
        let blends = self.blends.iter().enumerate().flat_map(|(i, blend)| {
            blend
                .formulas
                .iter()
                .enumerate()
                .map(move |(j, f)| (format!("blend{i}.formula{j}"), f))
        });
        let final_blend = self
            .final_blend
            .formulas
            .iter()
            .enumerate()
            .map(|(j, f)| (format!("final.formula{j}"), f));
        blends.chain(final_blend)
    }

    /// Lower into the immutable AST, rebasing each formula's local parameters.
    pub fn to_source(&self) -> System {
        let mut offset = 0;
        let blends = self
            .blends
            .iter()
            .map(|b| LimitedBlend::new(b.to_source(&mut offset), b.weight))
            .collect();
        let final_blend = self.final_blend.to_source(&mut offset);
        System::new(blends, final_blend)
    }

    /// Every formula must supply exactly as many values as it references, and a
    /// custom formula's parameter names must be distinct.
    pub fn validate(&self) -> Result<()> {
        if self.blends.is_empty() {
            return Err(FlameError::configuration("system has no blends"));
        }
        for (prefix, formula) in self.formulas_in_order() {
            let expected = formula.param_count();
            if formula.params.len() != expected {
                return Err(FlameError::configuration(format!(
                    "{prefix}: expected {expected} parameter values, got {}",
                    formula.params.len()
                )));
            }
            if let FormulaSource::Custom { param_names, .. } = &formula.source {
                if let Some((k, name)) = param_names
                    .iter()
                    .enumerate()
                    .find(|&(k, name)| param_names.get(..k).is_some_and(|prev| prev.contains(name)))
                {
                    return Err(FlameError::configuration(format!(
                        "{prefix}: parameter name '{name}' is used twice (slot {k})"
                    )));
                }
            }
        }
        Ok(())
    }
}
