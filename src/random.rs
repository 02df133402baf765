//! Injected uniform random source.
//!
//! Every random draw of a run (blend and formula selection, particle
//! re-randomization) goes through one [`RandomSource`], so a seeded source
//! makes iteration bit-reproducible.

use rand::rngs::{StdRng, ThreadRng};
use rand::{Rng, SeedableRng};

use crate::model::{Particle, Point};

pub trait RandomSource {
    /// Uniform value in `[0, 1)`.
    fn next_unit(&mut self) -> f32;

    /// Uniform value in `[-1, 1)`.
    fn next_signed(&mut self) -> f32 {
        self.next_unit() * 2.0 - 1.0
    }
}

impl RandomSource for StdRng {
    fn next_unit(&mut self) -> f32 {
        self.gen::<f32>()
    }
}

impl RandomSource for ThreadRng {
    fn next_unit(&mut self) -> f32 {
        self.gen::<f32>()
    }
}

impl<R: RandomSource + ?Sized> RandomSource for &mut R {
    fn next_unit(&mut self) -> f32 {
        (**self).next_unit()
    }
}

impl<R: RandomSource + ?Sized> RandomSource for Box<R> {
    fn next_unit(&mut self) -> f32 {
        (**self).next_unit()
    }
}

/// Seeded source when `seed` is set, entropy-seeded otherwise.
pub fn seeded(seed: Option<u64>) -> StdRng {
    match seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    }
}

/// Fresh particle uniformly placed in `[-1, 1]²` (x drawn first).
pub fn random_particle(rng: &mut impl RandomSource, ttl: i32) -> Particle {
    let x = rng.next_signed();
    let y = rng.next_signed();
    Particle::new(Point::new(x, y), Particle::INITIAL_COLOR, ttl)
}

/// Cycles through a fixed list of unit draws.
#[cfg(test)]
pub(crate) struct Scripted {
    values: Vec<f32>,
    cursor: usize,
}

#[cfg(test)]
impl Scripted {
    pub(crate) fn new(values: &[f32]) -> Self {
        Self {
            values: values.to_vec(),
            cursor: 0,
        }
    }

    pub(crate) fn draws(&self) -> usize {
        self.cursor
    }
}

#[cfg(test)]
impl RandomSource for Scripted {
    fn next_unit(&mut self) -> f32 {
        let value = self
            .values
            .get(self.cursor % self.values.len().max(1))
            .copied()
            .unwrap_or(0.0);
        self.cursor += 1;
        value
    }
}
