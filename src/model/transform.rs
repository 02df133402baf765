use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use super::particle::Point;

/// A 2×3 affine map `(a, b, c, d, e, f)`:
///
/// ```text
/// x' = a·x + b·y + c
/// y' = d·x + e·y + f
/// ```
///
/// Equality is exact float-tuple equality.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(transparent)]
pub struct Transform {
    params: [f32; 6],
}

impl Transform {
    pub const IDENTITY: Transform = Transform {
        params: [1.0, 0.0, 0.0, 0.0, 1.0, 0.0],
    };

    pub const fn new(a: f32, b: f32, c: f32, d: f32, e: f32, f: f32) -> Self {
        Self {
            params: [a, b, c, d, e, f],
        }
    }

    pub const fn identity() -> Self {
        Self::IDENTITY
    }

    pub const fn scale(factor: f32) -> Self {
        Self::scale_xy(factor, factor)
    }

    pub const fn scale_xy(x: f32, y: f32) -> Self {
        Self::new(x, 0.0, 0.0, 0.0, y, 0.0)
    }

    pub const fn translate(x: f32, y: f32) -> Self {
        Self::new(1.0, 0.0, x, 0.0, 1.0, y)
    }

    /// Counter-clockwise rotation around the origin, in radians.
    pub fn rotate(angle: f32) -> Self {
        let (sin, cos) = angle.sin_cos();
        Self::new(cos, -sin, 0.0, sin, cos, 0.0)
    }

    pub const fn params(&self) -> &[f32; 6] {
        &self.params
    }

    pub fn is_identity(&self) -> bool {
        *self == Self::IDENTITY
    }

    pub fn apply(&self, point: Point) -> Point {
        let [a, b, c, d, e, f] = self.params;
        Point::new(
            a * point.x + b * point.y + c,
            d * point.x + e * point.y + f,
        )
    }

    /// `outer ∘ inner`: the result applies `inner` first, then `outer`.
    ///
    /// With either side equal to the identity and finite coefficients the result
    /// is equal under `==` to the other side. Signed zeros may flip to `+0.0`.
    pub fn compose(outer: &Transform, inner: &Transform) -> Transform {
        let [a2, b2, c2, d2, e2, f2] = outer.params;
        let [a1, b1, c1, d1, e1, f1] = inner.params;
        Transform::new(
            a2 * a1 + b2 * d1,
            a2 * b1 + b2 * e1,
            a2 * c1 + b2 * f1 + c2,
            d2 * a1 + e2 * d1,
            d2 * b1 + e2 * e1,
            d2 * c1 + e2 * f1 + f2,
        )
    }

    /// Chain `next` after `self`.
    pub fn then(&self, next: &Transform) -> Transform {
        Transform::compose(next, self)
    }
}

impl Default for Transform {
    fn default() -> Self {
        Self::IDENTITY
    }
}
