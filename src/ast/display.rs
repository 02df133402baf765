//! Function-call notation for every node, e.g. `add(sin(x), 2)`.

use std::fmt;

use super::{Axis, Blend, Expression, Formula, LimitedBlend, Node, System, WeightedFormula};
use crate::model::Transform;

impl fmt::Display for Axis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Axis::X => f.write_str("x"),
            Axis::Y => f.write_str("y"),
        }
    }
}

impl fmt::Display for Expression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expression::Number(v) => write!(f, "{v}"),
            Expression::Input(axis) => write!(f, "{axis}"),
            Expression::Parameter(i) => write!(f, "param({i})"),
            Expression::UnaryOp { kind, operand } => write!(f, "{}({operand})", kind.name()),
            Expression::BinaryOp { kind, left, right } => {
                write!(f, "{}({left}, {right})", kind.name())
            }
            Expression::Point { x, y } => write!(f, "point({x}, {y})"),
        }
    }
}

impl fmt::Display for Transform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let [a, b, c, d, e, g] = self.params();
        write!(f, "transform({a}, {b}, {c}, {d}, {e}, {g})")
    }
}

impl fmt::Display for Formula {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "formula({}, {})", self.x, self.y)
    }
}

impl fmt::Display for WeightedFormula {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "weighted({}, {}, {})", self.formula, self.weight, self.color)
    }
}

fn write_list<T: fmt::Display>(f: &mut fmt::Formatter<'_>, items: &[T]) -> fmt::Result {
    f.write_str("[")?;
    for (i, item) in items.iter().enumerate() {
        if i > 0 {
            f.write_str(", ")?;
        }
        write!(f, "{item}")?;
    }
    f.write_str("]")
}

impl fmt::Display for Blend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "blend({}, {}, ", self.pre, self.post)?;
        write_list(f, &self.formulas)?;
        f.write_str(")")
    }
}

impl fmt::Display for LimitedBlend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "limited({}, {})", self.blend, self.weight)
    }
}

impl fmt::Display for System {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("system(")?;
        write_list(f, &self.blends)?;
        write!(f, ", {})", self.final_blend)
    }
}

impl fmt::Display for Node<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Node::Expression(n) => n.fmt(f),
            Node::Transform(n) => n.fmt(f),
            Node::Formula(n) => n.fmt(f),
            Node::WeightedFormula(n) => n.fmt(f),
            Node::Blend(n) => n.fmt(f),
            Node::LimitedBlend(n) => n.fmt(f),
            Node::System(n) => n.fmt(f),
        }
    }
}
