use crate::ast::{Axis, BinaryKind, Expression, Formula, UnaryKind};
use crate::error::{FlameError, Result};

/// Bytecode operations for the expression VM.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Op {
    /// Push a constant from the constant pool.
    PushConst(u16),
    /// Push a parameter value (resolved at runtime).
    PushParam(u32),
    PushX,
    PushY,

    // Arithmetic
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Pow,
    Neg,

    // Comparison
    Lt,
    Gt,
    Le,
    Ge,
    Eq,

    // Logic
    And,
    Or,
    Not,

    // Math (1-arg)
    Sin,
    Cos,
    Tan,
    Atan,
    Sqrt,
    Trunc,
    Exp,
    Floor,
    Ceil,
    Sign,
    Abs,
    Frac,

    // Vec2
    /// Pop x, y → push Vec2
    MakeVec2,
    /// Pop Vec2, Vec2 → push float distance
    Distance,

    /// Halt execution, top of stack is the result.
    Return,
}

/// Static type of a compiled sub-expression.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ValueType {
    Float,
    Vec2,
}

/// Bytecode for one scalar expression. Constants live in the owning pool.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Chunk {
    pub ops: Vec<Op>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CompiledFormula {
    pub x: Chunk,
    pub y: Chunk,
}

/// Compiles expressions into chunks sharing one deduplicated constant pool.
#[derive(Debug, Default)]
pub struct Compiler {
    constants: Vec<f32>,
    max_parameter: Option<u32>,
}

impl Compiler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Highest parameter index referenced by anything compiled so far.
    pub fn max_parameter(&self) -> Option<u32> {
        self.max_parameter
    }

    pub fn into_constants(self) -> Vec<f32> {
        self.constants
    }

    pub fn compile_formula(&mut self, formula: &Formula) -> Result<CompiledFormula> {
        Ok(CompiledFormula {
            x: self.compile_scalar(&formula.x)?,
            y: self.compile_scalar(&formula.y)?,
        })
    }

    /// Compile a top-level expression, which must produce a scalar.
    pub fn compile_scalar(&mut self, expr: &Expression) -> Result<Chunk> {
        let mut ops = Vec::new();
        self.compile_float(expr, &mut ops)?;
        ops.push(Op::Return);
        Ok(Chunk { ops })
    }

    fn add_constant(&mut self, value: f32) -> Result<u16> {
        // Check if constant already exists (exact bit equality)
        for (i, &c) in self.constants.iter().enumerate() {
            if c.to_bits() == value.to_bits() {
                return u16::try_from(i)
                    .map_err(|_| FlameError::configuration("Too many constants (max 65535)"));
            }
        }
        let idx = u16::try_from(self.constants.len())
            .map_err(|_| FlameError::configuration("Too many constants (max 65535)"))?;
        self.constants.push(value);
        Ok(idx)
    }

    fn emit_const(&mut self, value: f32, ops: &mut Vec<Op>) -> Result<()> {
        let idx = self.add_constant(value)?;
        ops.push(Op::PushConst(idx));
        Ok(())
    }

    fn compile_float(&mut self, expr: &Expression, ops: &mut Vec<Op>) -> Result<()> {
        match self.compile_expr(expr, ops)? {
            ValueType::Float => Ok(()),
            ValueType::Vec2 => Err(FlameError::configuration(format!(
                "point {expr} used where a scalar is required (points are only valid as distance operands)"
            ))),
        }
    }

    fn compile_expr(&mut self, expr: &Expression, ops: &mut Vec<Op>) -> Result<ValueType> {
        match expr {
            Expression::Number(v) => {
                self.emit_const(*v, ops)?;
            }
            Expression::Input(Axis::X) => ops.push(Op::PushX),
            Expression::Input(Axis::Y) => ops.push(Op::PushY),
            Expression::Parameter(i) => {
                self.max_parameter = Some(self.max_parameter.map_or(*i, |m| m.max(*i)));
                ops.push(Op::PushParam(*i));
            }
            Expression::UnaryOp { kind, operand } => {
                self.compile_float(operand, ops)?;
                ops.push(match kind {
                    UnaryKind::Sin => Op::Sin,
                    UnaryKind::Cos => Op::Cos,
                    UnaryKind::Tan => Op::Tan,
                    UnaryKind::Atan => Op::Atan,
                    UnaryKind::Negate => Op::Neg,
                    UnaryKind::Sqrt => Op::Sqrt,
                    UnaryKind::Trunc => Op::Trunc,
                    UnaryKind::Exp => Op::Exp,
                    UnaryKind::Floor => Op::Floor,
                    UnaryKind::Ceil => Op::Ceil,
                    UnaryKind::Signum => Op::Sign,
                    UnaryKind::Abs => Op::Abs,
                    UnaryKind::Not => Op::Not,
                    UnaryKind::Frac => Op::Frac,
                });
            }
            Expression::BinaryOp {
                kind: BinaryKind::Distance,
                left,
                right,
            } => {
                self.compile_vec2(left, ops)?;
                self.compile_vec2(right, ops)?;
                ops.push(Op::Distance);
            }
            Expression::BinaryOp { kind, left, right } => {
                self.compile_float(left, ops)?;
                self.compile_float(right, ops)?;
                ops.push(match kind {
                    BinaryKind::Add => Op::Add,
                    BinaryKind::Subtract => Op::Sub,
                    BinaryKind::Multiply => Op::Mul,
                    BinaryKind::Divide => Op::Div,
                    BinaryKind::Power => Op::Pow,
                    BinaryKind::Modulo => Op::Mod,
                    BinaryKind::And => Op::And,
                    BinaryKind::Or => Op::Or,
                    BinaryKind::LessThan => Op::Lt,
                    BinaryKind::GreaterThan => Op::Gt,
                    BinaryKind::Equals => Op::Eq,
                    BinaryKind::LessOrEqual => Op::Le,
                    BinaryKind::GreaterOrEqual => Op::Ge,
                    BinaryKind::Distance => Op::Distance,
                });
            }
            Expression::Point { x, y } => {
                self.compile_float(x, ops)?;
                self.compile_float(y, ops)?;
                ops.push(Op::MakeVec2);
                return Ok(ValueType::Vec2);
            }
        }
        Ok(ValueType::Float)
    }

    /// Distance operand: points pass through, scalars are lifted to `(v, 0)`.
    fn compile_vec2(&mut self, expr: &Expression, ops: &mut Vec<Op>) -> Result<()> {
        if self.compile_expr(expr, ops)? == ValueType::Float {
            self.emit_const(0.0, ops)?;
            ops.push(Op::MakeVec2);
        }
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::ast::helpers::*;

    fn compile(expr: &Expression) -> (Chunk, Vec<f32>) {
        let mut compiler = Compiler::new();
        let chunk = compiler.compile_scalar(expr).unwrap();
        (chunk, compiler.into_constants())
    }

    #[test]
    fn postfix_order() {
        let (chunk, constants) = compile(&(x() + n(2.0) * y()));
        assert_eq!(
            chunk.ops,
            vec![Op::PushX, Op::PushConst(0), Op::PushY, Op::Mul, Op::Add, Op::Return]
        );
        assert_eq!(constants, vec![2.0]);
    }

    #[test]
    fn constant_dedup() {
        let (_, constants) = compile(&(n(1.0) + n(1.0) + n(2.0)));
        assert_eq!(constants, vec![1.0, 2.0]);
    }

    #[test]
    fn negative_zero_is_a_distinct_constant() {
        let (_, constants) = compile(&(n(0.0) + n(-0.0)));
        assert_eq!(constants.len(), 2);
    }

    #[test]
    fn scalar_distance_operands_are_lifted() {
        let (chunk, _) = compile(&distance(x(), point(1.0, y())));
        assert_eq!(
            chunk.ops,
            vec![
                Op::PushX,
                Op::PushConst(0),
                Op::MakeVec2,
                Op::PushConst(1),
                Op::PushY,
                Op::MakeVec2,
                Op::Distance,
                Op::Return,
            ]
        );
    }

    #[test]
    fn point_outside_distance_is_rejected() {
        let mut compiler = Compiler::new();
        let err = compiler.compile_scalar(&(point(x(), y()) + 1.0)).unwrap_err();
        assert!(matches!(err, FlameError::Configuration { .. }));
        assert!(compiler.compile_scalar(&point(x(), y())).is_err());
    }

    #[test]
    fn tracks_highest_parameter() {
        let mut compiler = Compiler::new();
        assert_eq!(compiler.max_parameter(), None);
        compiler
            .compile_formula(&Formula::new(param(2), param(7) - param(1)))
            .unwrap();
        assert_eq!(compiler.max_parameter(), Some(7));
    }

    #[test]
    fn shared_pool_across_formulas() {
        let mut compiler = Compiler::new();
        compiler.compile_formula(&Formula::new(n(3.0), n(4.0))).unwrap();
        let second = compiler.compile_formula(&Formula::new(n(4.0), n(3.0))).unwrap();
        assert_eq!(second.x.ops, vec![Op::PushConst(1), Op::Return]);
        assert_eq!(compiler.into_constants(), vec![3.0, 4.0]);
    }
}
