//! Immutable expression tree for IFS systems.
//!
//! Scalar nodes ([`Expression`]) compose into [`Formula`]s, which are wrapped by
//! [`WeightedFormula`], grouped into [`Blend`]s, weighted again by
//! [`LimitedBlend`] and finally collected into a [`System`].

pub mod display;
pub mod helpers;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::model::Transform;

/// Which particle coordinate an [`Expression::Input`] reads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum Axis {
    X,
    Y,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum UnaryKind {
    Sin,
    Cos,
    Tan,
    Atan,
    Negate,
    Sqrt,
    Trunc,
    Exp,
    Floor,
    Ceil,
    Signum,
    Abs,
    Not,
    Frac,
}

impl UnaryKind {
    pub const ALL: [UnaryKind; 14] = [
        UnaryKind::Sin,
        UnaryKind::Cos,
        UnaryKind::Tan,
        UnaryKind::Atan,
        UnaryKind::Negate,
        UnaryKind::Sqrt,
        UnaryKind::Trunc,
        UnaryKind::Exp,
        UnaryKind::Floor,
        UnaryKind::Ceil,
        UnaryKind::Signum,
        UnaryKind::Abs,
        UnaryKind::Not,
        UnaryKind::Frac,
    ];

    pub fn name(self) -> &'static str {
        match self {
            UnaryKind::Sin => "sin",
            UnaryKind::Cos => "cos",
            UnaryKind::Tan => "tan",
            UnaryKind::Atan => "atan",
            UnaryKind::Negate => "negate",
            UnaryKind::Sqrt => "sqrt",
            UnaryKind::Trunc => "trunc",
            UnaryKind::Exp => "exp",
            UnaryKind::Floor => "floor",
            UnaryKind::Ceil => "ceil",
            UnaryKind::Signum => "signum",
            UnaryKind::Abs => "abs",
            UnaryKind::Not => "not",
            UnaryKind::Frac => "frac",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum BinaryKind {
    Add,
    Subtract,
    Multiply,
    Divide,
    Power,
    Modulo,
    And,
    Or,
    LessThan,
    GreaterThan,
    Equals,
    LessOrEqual,
    GreaterOrEqual,
    /// Euclidean distance between two 2-vectors. Scalar operands are lifted to `(v, 0)`.
    Distance,
}

impl BinaryKind {
    pub const ALL: [BinaryKind; 14] = [
        BinaryKind::Add,
        BinaryKind::Subtract,
        BinaryKind::Multiply,
        BinaryKind::Divide,
        BinaryKind::Power,
        BinaryKind::Modulo,
        BinaryKind::And,
        BinaryKind::Or,
        BinaryKind::LessThan,
        BinaryKind::GreaterThan,
        BinaryKind::Equals,
        BinaryKind::LessOrEqual,
        BinaryKind::GreaterOrEqual,
        BinaryKind::Distance,
    ];

    pub fn name(self) -> &'static str {
        match self {
            BinaryKind::Add => "add",
            BinaryKind::Subtract => "subtract",
            BinaryKind::Multiply => "multiply",
            BinaryKind::Divide => "divide",
            BinaryKind::Power => "pow",
            BinaryKind::Modulo => "mod",
            BinaryKind::And => "and",
            BinaryKind::Or => "or",
            BinaryKind::LessThan => "lt",
            BinaryKind::GreaterThan => "gt",
            BinaryKind::Equals => "eq",
            BinaryKind::LessOrEqual => "lte",
            BinaryKind::GreaterOrEqual => "gte",
            BinaryKind::Distance => "distance",
        }
    }
}

/// Scalar expression node. Children are owned exclusively.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum Expression {
    Number(f32),
    Input(Axis),
    Parameter(u32),
    UnaryOp {
        kind: UnaryKind,
        operand: Box<Expression>,
    },
    BinaryOp {
        kind: BinaryKind,
        left: Box<Expression>,
        right: Box<Expression>,
    },
    /// A 2-vector built from two scalar expressions. Only valid as a distance operand.
    Point {
        x: Box<Expression>,
        y: Box<Expression>,
    },
}

impl Expression {
    pub fn unary(kind: UnaryKind, operand: impl Into<Expression>) -> Self {
        Expression::UnaryOp {
            kind,
            operand: Box::new(operand.into()),
        }
    }

    pub fn binary(kind: BinaryKind, left: impl Into<Expression>, right: impl Into<Expression>) -> Self {
        Expression::BinaryOp {
            kind,
            left: Box::new(left.into()),
            right: Box::new(right.into()),
        }
    }

    /// True when no `Parameter` node occurs anywhere in the tree.
    pub fn is_parameter_free(&self) -> bool {
        let mut free = true;
        Node::Expression(self).walk(&mut |node| {
            if let Node::Expression(Expression::Parameter(_)) = node {
                free = false;
            }
        });
        free
    }

    /// Same tree with every parameter index shifted by `offset`.
    pub fn rebased(&self, offset: u32) -> Expression {
        match self {
            Expression::Parameter(i) => Expression::Parameter(i.saturating_add(offset)),
            Expression::Number(_) | Expression::Input(_) => self.clone(),
            Expression::UnaryOp { kind, operand } => Expression::UnaryOp {
                kind: *kind,
                operand: Box::new(operand.rebased(offset)),
            },
            Expression::BinaryOp { kind, left, right } => Expression::BinaryOp {
                kind: *kind,
                left: Box::new(left.rebased(offset)),
                right: Box::new(right.rebased(offset)),
            },
            Expression::Point { x, y } => Expression::Point {
                x: Box::new(x.rebased(offset)),
                y: Box::new(y.rebased(offset)),
            },
        }
    }
}

impl From<f32> for Expression {
    fn from(value: f32) -> Self {
        Expression::Number(value)
    }
}

impl From<Axis> for Expression {
    fn from(axis: Axis) -> Self {
        Expression::Input(axis)
    }
}

/// A user-defined variation: computes a new `(x, y)` from the current particle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Formula {
    pub x: Expression,
    pub y: Expression,
}

impl Formula {
    pub fn new(x: impl Into<Expression>, y: impl Into<Expression>) -> Self {
        Self {
            x: x.into(),
            y: y.into(),
        }
    }

    /// `(x, y) -> (x, y)`
    pub fn identity() -> Self {
        Self::new(Axis::X, Axis::Y)
    }

    pub fn rebased(&self, offset: u32) -> Formula {
        Formula {
            x: self.x.rebased(offset),
            y: self.y.rebased(offset),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct WeightedFormula {
    pub formula: Formula,
    /// Relative selection probability within the owning blend.
    pub weight: f32,
    /// Palette index contributed when this formula is chosen.
    pub color: f32,
}

impl WeightedFormula {
    pub fn new(formula: Formula, weight: f32, color: f32) -> Self {
        Self {
            formula,
            weight,
            color,
        }
    }
}

/// Apply `pre`, evaluate one formula chosen by weight, apply `post`.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize, JsonSchema)]
pub struct Blend {
    #[serde(default)]
    pub pre: Transform,
    #[serde(default)]
    pub post: Transform,
    #[serde(default)]
    pub formulas: Vec<WeightedFormula>,
}

impl Blend {
    pub fn new(formulas: Vec<WeightedFormula>, pre: Transform, post: Transform) -> Self {
        Self { pre, post, formulas }
    }

    /// A blend with no formulas and identity transforms.
    pub fn pass_through() -> Self {
        Self::default()
    }

    pub fn total_weight(&self) -> f32 {
        self.formulas.iter().map(|f| f.weight).sum()
    }
}

/// A blend entry in a system's top-level list, selected by `weight`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct LimitedBlend {
    pub blend: Blend,
    pub weight: f32,
}

impl LimitedBlend {
    pub fn new(blend: Blend, weight: f32) -> Self {
        Self { blend, weight }
    }
}

/// A complete generative program.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct System {
    pub blends: Vec<LimitedBlend>,
    /// Applied to every emission after the selected blend.
    #[serde(default)]
    pub final_blend: Blend,
}

impl System {
    pub fn new(blends: Vec<LimitedBlend>, final_blend: Blend) -> Self {
        Self {
            blends,
            final_blend,
        }
    }

    pub fn total_weight(&self) -> f32 {
        self.blends.iter().map(|b| b.weight).sum()
    }

    /// Every parameter index referenced anywhere in the system, sorted and deduplicated.
    pub fn parameter_indices(&self) -> Vec<u32> {
        let mut indices = Vec::new();
        Node::System(self).walk(&mut |node| {
            if let Node::Expression(Expression::Parameter(i)) = node {
                indices.push(*i);
            }
        });
        indices.sort_unstable();
        indices.dedup();
        indices
    }
}

/// Borrowed view over any node of the tree, for generic traversal and printing.
#[derive(Debug, Clone, Copy)]
pub enum Node<'a> {
    Expression(&'a Expression),
    Transform(&'a Transform),
    Formula(&'a Formula),
    WeightedFormula(&'a WeightedFormula),
    Blend(&'a Blend),
    LimitedBlend(&'a LimitedBlend),
    System(&'a System),
}

impl<'a> Node<'a> {
    pub fn node_type(&self) -> &'static str {
        match self {
            Node::Expression(Expression::Number(_)) => "Number",
            Node::Expression(Expression::Input(_)) => "Input",
            Node::Expression(Expression::Parameter(_)) => "Parameter",
            Node::Expression(Expression::UnaryOp { .. }) => "UnaryOp",
            Node::Expression(Expression::BinaryOp { .. }) => "BinaryOp",
            Node::Expression(Expression::Point { .. }) => "Point",
            Node::Transform(_) => "Transform",
            Node::Formula(_) => "Formula",
            Node::WeightedFormula(_) => "WeightedFormula",
            Node::Blend(_) => "Blend",
            Node::LimitedBlend(_) => "LimitedBlend",
            Node::System(_) => "System",
        }
    }

    /// Direct children in evaluation order.
    pub fn children(&self) -> Vec<Node<'a>> {
        match *self {
            Node::Expression(expr) => match expr {
                Expression::Number(_) | Expression::Input(_) | Expression::Parameter(_) => {
                    Vec::new()
                }
                Expression::UnaryOp { operand, .. } => vec![Node::Expression(operand)],
                Expression::BinaryOp { left, right, .. } => {
                    vec![Node::Expression(left), Node::Expression(right)]
                }
                Expression::Point { x, y } => vec![Node::Expression(x), Node::Expression(y)],
            },
            Node::Transform(_) => Vec::new(),
            Node::Formula(f) => vec![Node::Expression(&f.x), Node::Expression(&f.y)],
            Node::WeightedFormula(wf) => vec![Node::Formula(&wf.formula)],
            Node::Blend(b) => {
                let mut out = vec![Node::Transform(&b.pre)];
                out.extend(b.formulas.iter().map(Node::WeightedFormula));
                out.push(Node::Transform(&b.post));
                out
            }
            Node::LimitedBlend(lb) => vec![Node::Blend(&lb.blend)],
            Node::System(s) => {
                let mut out: Vec<Node<'a>> = s.blends.iter().map(Node::LimitedBlend).collect();
                out.push(Node::Blend(&s.final_blend));
                out
            }
        }
    }

    /// Pre-order traversal.
    pub fn walk(&self, visit: &mut impl FnMut(Node<'a>)) {
        visit(*self);
        for child in self.children() {
            child.walk(visit);
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::helpers::*;
    use super::*;

    #[test]
    fn parameter_indices_are_collected_across_the_tree() {
        let formula = Formula::new(param(3) * x(), sin(param(1)) + param(3));
        let final_formula = Formula::new(x() + param(0), y());
        let system = System::new(
            vec![LimitedBlend::new(
                Blend::new(
                    vec![WeightedFormula::new(formula, 1.0, 0.5)],
                    Transform::IDENTITY,
                    Transform::IDENTITY,
                ),
                1.0,
            )],
            Blend::new(
                vec![WeightedFormula::new(final_formula, 1.0, 0.0)],
                Transform::IDENTITY,
                Transform::IDENTITY,
            ),
        );
        assert_eq!(system.parameter_indices(), vec![0, 1, 3]);
    }

    #[test]
    fn rebasing_shifts_only_parameters() {
        let expr = param(0) + n(2.0) * param(4);
        assert_eq!(expr.rebased(10), param(10) + n(2.0) * param(14));
        assert!(!expr.is_parameter_free());
        assert!((x() + n(1.0)).is_parameter_free());
    }

    #[test]
    fn blend_children_are_ordered_pre_formulas_post() {
        let blend = Blend::new(
            vec![
                WeightedFormula::new(Formula::identity(), 1.0, 0.0),
                WeightedFormula::new(Formula::identity(), 2.0, 1.0),
            ],
            Transform::scale(2.0),
            Transform::translate(1.0, 0.0),
        );
        let types: Vec<&str> = Node::Blend(&blend)
            .children()
            .iter()
            .map(Node::node_type)
            .collect();
        assert_eq!(
            types,
            vec!["Transform", "WeightedFormula", "WeightedFormula", "Transform"]
        );
        assert_eq!(blend.total_weight(), 3.0);
    }

    #[test]
    fn serde_round_trip_preserves_tree() {
        let system = make_system(Formula::new(sin(x()) - param(0), distance(point(x(), y()), 0.0)));
        let json = serde_json::to_string(&system).unwrap();
        let back: System = serde_json::from_str(&json).unwrap();
        assert_eq!(back, system);
    }

    #[test]
    fn final_blend_defaults_to_pass_through() {
        let json = r#"{"blends": []}"#;
        let system: System = serde_json::from_str(json).unwrap();
        assert_eq!(system.final_blend, Blend::pass_through());
    }
}
