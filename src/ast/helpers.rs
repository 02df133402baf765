//! Terse constructors for building expression trees in code.
//!
//! ```
//! use flamecore::ast::helpers::*;
//! let swirl_x = x() * sin(x() * x() + y() * y()) - y() * cos(x() * x() + y() * y());
//! ```

use std::ops;

use super::{Axis, BinaryKind, Blend, Expression, Formula, LimitedBlend, System, UnaryKind, WeightedFormula};
use crate::model::Transform;

pub fn n(value: f32) -> Expression {
    Expression::Number(value)
}

pub fn x() -> Expression {
    Expression::Input(Axis::X)
}

pub fn y() -> Expression {
    Expression::Input(Axis::Y)
}

pub fn param(index: u32) -> Expression {
    Expression::Parameter(index)
}

pub fn point(x: impl Into<Expression>, y: impl Into<Expression>) -> Expression {
    Expression::Point {
        x: Box::new(x.into()),
        y: Box::new(y.into()),
    }
}

macro_rules! unary_helpers {
    ($($name:ident => $kind:ident),* $(,)?) => {
        $(
            pub fn $name(e: impl Into<Expression>) -> Expression {
                Expression::unary(UnaryKind::$kind, e)
            }
        )*
    };
}

macro_rules! binary_helpers {
    ($($name:ident => $kind:ident),* $(,)?) => {
        $(
            pub fn $name(a: impl Into<Expression>, b: impl Into<Expression>) -> Expression {
                Expression::binary(BinaryKind::$kind, a, b)
            }
        )*
    };
}

unary_helpers! {
    sin => Sin,
    cos => Cos,
    tan => Tan,
    atan => Atan,
    negative => Negate,
    sqrt => Sqrt,
    trunc => Trunc,
    exp => Exp,
    floor => Floor,
    ceil => Ceil,
    signum => Signum,
    abs => Abs,
    not => Not,
    frac => Frac,
}

binary_helpers! {
    add => Add,
    subtract => Subtract,
    multiply => Multiply,
    divide => Divide,
    pow => Power,
    modulo => Modulo,
    and => And,
    or => Or,
    lt => LessThan,
    gt => GreaterThan,
    eq => Equals,
    lte => LessOrEqual,
    gte => GreaterOrEqual,
    distance => Distance,
}

/// Single-blend system around one formula, with a pass-through final blend.
pub fn make_system(formula: Formula) -> System {
    System::new(
        vec![LimitedBlend::new(
            Blend::new(
                vec![WeightedFormula::new(formula, 1.0, 1.0)],
                Transform::IDENTITY,
                Transform::IDENTITY,
            ),
            1.0,
        )],
        Blend::pass_through(),
    )
}

macro_rules! binary_operator {
    ($trait:ident, $method:ident, $kind:ident) => {
        impl<R: Into<Expression>> ops::$trait<R> for Expression {
            type Output = Expression;

            fn $method(self, rhs: R) -> Expression {
                Expression::binary(BinaryKind::$kind, self, rhs)
            }
        }

        impl ops::$trait<Expression> for f32 {
            type Output = Expression;

            fn $method(self, rhs: Expression) -> Expression {
                Expression::binary(BinaryKind::$kind, self, rhs)
            }
        }
    };
}

binary_operator!(Add, add, Add);
binary_operator!(Sub, sub, Subtract);
binary_operator!(Mul, mul, Multiply);
binary_operator!(Div, div, Divide);
binary_operator!(Rem, rem, Modulo);

impl ops::Neg for Expression {
    type Output = Expression;

    fn neg(self) -> Expression {
        Expression::unary(UnaryKind::Negate, self)
    }
}

impl ops::Not for Expression {
    type Output = Expression;

    fn not(self) -> Expression {
        Expression::unary(UnaryKind::Not, self)
    }
}
