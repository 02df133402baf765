use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// A point in system space. The visible region is `[-1, 1]²`.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize, JsonSchema)]
pub struct Point {
    pub x: f32,
    pub y: f32,
}

impl Point {
    pub const ORIGIN: Point = Point { x: 0.0, y: 0.0 };

    pub const fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    pub fn distance(self, other: Point) -> f32 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        (dx * dx + dy * dy).sqrt()
    }
}

impl From<(f32, f32)> for Point {
    fn from((x, y): (f32, f32)) -> Self {
        Self { x, y }
    }
}

/// Per-iteration state threaded through the interpreter.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Particle {
    pub point: Point,
    /// Running palette index, normally in `[0, 1]`.
    pub color: f32,
    /// Remaining iterations before the particle is re-randomised. [`Particle::IMMORTAL`] never expires.
    pub ttl: i32,
}

impl Particle {
    pub const IMMORTAL: i32 = -1;
    pub const INITIAL_COLOR: f32 = 0.5;

    pub const fn new(point: Point, color: f32, ttl: i32) -> Self {
        Self { point, color, ttl }
    }

    pub fn is_immortal(&self) -> bool {
        self.ttl == Self::IMMORTAL
    }

    /// Mortal and out of lifetime.
    pub fn is_expired(&self) -> bool {
        !self.is_immortal() && self.ttl <= 0
    }

    /// The ttl the particle carries into the next iteration.
    pub fn aged(self) -> Self {
        if self.is_immortal() {
            self
        } else {
            Self {
                ttl: self.ttl - 1,
                ..self
            }
        }
    }
}

impl Default for Particle {
    fn default() -> Self {
        Self {
            point: Point::ORIGIN,
            color: Self::INITIAL_COLOR,
            ttl: Self::IMMORTAL,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn immortal_particles_never_age() {
        let p = Particle::default();
        assert!(p.is_immortal());
        assert_eq!(p.aged().ttl, Particle::IMMORTAL);
        assert!(!p.is_expired());
    }

    #[test]
    fn mortal_particles_expire_at_zero() {
        let p = Particle::new(Point::ORIGIN, 0.5, 1);
        assert!(!p.is_expired());
        let p = p.aged();
        assert_eq!(p.ttl, 0);
        assert!(p.is_expired());
    }

    #[test]
    fn point_distance() {
        assert_eq!(Point::new(0.0, 0.0).distance(Point::new(3.0, 4.0)), 5.0);
    }
}
