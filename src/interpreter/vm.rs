use super::compiler::{Chunk, Op};
use crate::error::{FlameError, Result};
use crate::model::Params;

/// Maximum stack depth to prevent runaway expressions.
const MAX_STACK: usize = 1024;

/// Runtime value on the VM stack.
#[derive(Debug, Clone, Copy)]
enum Value {
    Float(f32),
    Vec2(f32, f32),
}

impl Value {
    fn as_float(self) -> f32 {
        match self {
            Self::Float(f) => f,
            Self::Vec2(_, _) => 0.0,
        }
    }
}

/// Reusable VM working memory. Create once per interpreter, reuse across steps
/// to avoid heap allocations in the per-iteration hot path.
#[derive(Debug, Default)]
pub struct VmBuffers {
    stack: Vec<Value>,
}

impl VmBuffers {
    pub fn new() -> Self {
        Self {
            stack: Vec::with_capacity(32),
        }
    }
}

/// Inputs visible to an expression.
pub struct VmContext<'a> {
    pub x: f32,
    pub y: f32,
    pub constants: &'a [f32],
    pub params: &'a Params,
}

/// Execute one chunk. The only runtime error is an unbound parameter; IEEE
/// results (NaN, infinities) are returned as values.
pub fn execute(chunk: &Chunk, ctx: &VmContext<'_>, buffers: &mut VmBuffers) -> Result<f32> {
    let stack = &mut buffers.stack;
    stack.clear();

    for &op in &chunk.ops {
        if stack.len() >= MAX_STACK {
            return Err(FlameError::configuration("expression stack overflow"));
        }

        match op {
            Op::PushConst(idx) => {
                let val = ctx.constants.get(idx as usize).copied().unwrap_or(0.0);
                stack.push(Value::Float(val));
            }
            Op::PushParam(idx) => {
                let val = ctx.params.get(idx).ok_or(FlameError::MissingParameter {
                    index: idx,
                    available: ctx.params.len(),
                })?;
                stack.push(Value::Float(val));
            }
            Op::PushX => stack.push(Value::Float(ctx.x)),
            Op::PushY => stack.push(Value::Float(ctx.y)),

            // Arithmetic
            Op::Add => float_binop(stack, |a, b| a + b),
            Op::Sub => float_binop(stack, |a, b| a - b),
            Op::Mul => float_binop(stack, |a, b| a * b),
            Op::Div => float_binop(stack, |a, b| a / b),
            Op::Mod => float_binop(stack, |a, b| a % b),
            Op::Pow => float_binop(stack, f32::powf),
            Op::Neg => float_unary(stack, |a| -a),

            // Comparison
            Op::Lt => float_cmp(stack, |a, b| a < b),
            Op::Gt => float_cmp(stack, |a, b| a > b),
            Op::Le => float_cmp(stack, |a, b| a <= b),
            Op::Ge => float_cmp(stack, |a, b| a >= b),
            Op::Eq => float_cmp(stack, |a, b| a == b),

            // Logic: nonzero is true, NaN included.
            Op::And => float_cmp(stack, |a, b| a != 0.0 && b != 0.0),
            Op::Or => float_cmp(stack, |a, b| a != 0.0 || b != 0.0),
            Op::Not => float_unary(stack, |a| if a == 0.0 { 1.0 } else { 0.0 }),

            // Math (1-arg)
            Op::Sin => float_unary(stack, f32::sin),
            Op::Cos => float_unary(stack, f32::cos),
            Op::Tan => float_unary(stack, f32::tan),
            Op::Atan => float_unary(stack, f32::atan),
            Op::Sqrt => float_unary(stack, f32::sqrt),
            Op::Trunc => float_unary(stack, f32::trunc),
            Op::Exp => float_unary(stack, f32::exp),
            Op::Floor => float_unary(stack, f32::floor),
            Op::Ceil => float_unary(stack, f32::ceil),
            Op::Sign => float_unary(stack, sign),
            Op::Abs => float_unary(stack, f32::abs),
            Op::Frac => float_unary(stack, |a| a - a.floor()),

            // Vec2
            Op::MakeVec2 => {
                if stack.len() >= 2 {
                    let y = stack.pop().map_or(0.0, Value::as_float);
                    let x = stack.pop().map_or(0.0, Value::as_float);
                    stack.push(Value::Vec2(x, y));
                }
            }
            Op::Distance => {
                if stack.len() >= 2 {
                    let b = stack.pop().unwrap_or(Value::Float(0.0));
                    let a = stack.pop().unwrap_or(Value::Float(0.0));
                    match (a, b) {
                        (Value::Vec2(ax, ay), Value::Vec2(bx, by)) => {
                            let dx = bx - ax;
                            let dy = by - ay;
                            stack.push(Value::Float((dx * dx + dy * dy).sqrt()));
                        }
                        _ => stack.push(Value::Float(0.0)),
                    }
                }
            }

            Op::Return => break,
        }
    }

    Ok(stack.pop().map_or(0.0, Value::as_float))
}

/// `-1`, `0` or `1`; zero keeps its sign bit and NaN stays NaN.
fn sign(a: f32) -> f32 {
    if a > 0.0 {
        1.0
    } else if a < 0.0 {
        -1.0
    } else {
        a
    }
}

fn float_binop(stack: &mut Vec<Value>, op: impl FnOnce(f32, f32) -> f32) {
    if stack.len() >= 2 {
        let b = stack.pop().map_or(0.0, Value::as_float);
        let a = stack.pop().map_or(0.0, Value::as_float);
        stack.push(Value::Float(op(a, b)));
    }
}

fn float_cmp(stack: &mut Vec<Value>, op: impl FnOnce(f32, f32) -> bool) {
    if stack.len() >= 2 {
        let b = stack.pop().map_or(0.0, Value::as_float);
        let a = stack.pop().map_or(0.0, Value::as_float);
        stack.push(Value::Float(if op(a, b) { 1.0 } else { 0.0 }));
    }
}

fn float_unary(stack: &mut Vec<Value>, op: impl FnOnce(f32) -> f32) {
    if let Some(val) = stack.pop() {
        stack.push(Value::Float(op(val.as_float())));
    }
}
