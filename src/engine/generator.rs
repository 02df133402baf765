use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use log::{debug, warn};
use rand::rngs::StdRng;
use serde::Serialize;

use super::histogram::HistogramBuffer;
use crate::ast::System;
use crate::config::GeneratorConfig;
use crate::error::Result;
use crate::interpreter::Interpreter;
use crate::model::{ColorMap, Params, Particle, SystemDef};
use crate::random::{seeded, RandomSource};

/// How a run ended when it did not fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum RunOutcome {
    Completed { iterations: u64 },
    Cancelled { iterations: u64 },
}

impl RunOutcome {
    pub fn iterations(&self) -> u64 {
        match self {
            RunOutcome::Completed { iterations } | RunOutcome::Cancelled { iterations } => {
                *iterations
            }
        }
    }
}

/// Drives an interpreter and accumulates its emissions into a histogram.
///
/// The current particle survives across runs, so running in batches walks the
/// same orbit as one long run.
pub struct Generator<R: RandomSource = StdRng> {
    interpreter: Interpreter<R>,
    particle: Particle,
    histogram: HistogramBuffer,
    color_map: Option<Arc<dyn ColorMap>>,
}

impl Generator<StdRng> {
    /// Build from a validated description and configuration.
    pub fn from_config(system: &SystemDef, config: &GeneratorConfig) -> Result<Self> {
        config.validate()?;
        system.validate()?;
        let mut generator = Generator::new(
            &system.to_source(),
            Params::from_system(system),
            config.width,
            config.height,
            config.ttl,
            seeded(config.seed),
        )?;
        generator.set_color_map(config.color_map()?);
        Ok(generator)
    }
}

impl<R: RandomSource> Generator<R> {
    pub fn new(
        system: &System,
        params: Params,
        width: u32,
        height: u32,
        ttl: i32,
        rng: R,
    ) -> Result<Self> {
        let mut interpreter = Interpreter::new(system, params, ttl, rng)?;
        let particle = interpreter.random_particle();
        Ok(Self {
            interpreter,
            particle,
            histogram: HistogramBuffer::new(width, height),
            color_map: None,
        })
    }

    /// Swap in a new system. The histogram is kept; the particle is re-randomized.
    pub fn set_system(&mut self, system: &System, params: Params) -> Result<()> {
        self.interpreter.set_system(system)?;
        self.interpreter.set_params(params);
        self.particle = self.interpreter.random_particle();
        Ok(())
    }

    /// The histogram is kept; the particle is re-randomized with the new lifetime.
    pub fn set_ttl(&mut self, ttl: i32) {
        self.interpreter.set_ttl(ttl);
        self.particle = self.interpreter.random_particle();
        debug!("generator: ttl set to {ttl}");
    }

    /// Resizing clears the histogram.
    pub fn set_size(&mut self, width: u32, height: u32) {
        self.histogram.resize(width, height);
        debug!("generator: histogram resized to {width}x{height}");
    }

    pub fn set_color_map(&mut self, color_map: Option<Arc<dyn ColorMap>>) {
        self.color_map = color_map;
    }

    pub fn clear(&mut self) {
        self.histogram.clear();
    }

    pub fn histogram(&self) -> &HistogramBuffer {
        &self.histogram
    }

    pub fn into_histogram(self) -> HistogramBuffer {
        self.histogram
    }

    pub fn particle(&self) -> Particle {
        self.particle
    }

    pub fn interpreter(&self) -> &Interpreter<R> {
        &self.interpreter
    }

    /// Accumulate one emission. Returns whether it landed inside the buffer.
    pub fn add(&mut self, emission: &Particle) -> bool {
        self.histogram
            .add(emission.point, emission.color, self.color_map.as_deref())
    }

    /// One iteration: step the interpreter, keep its next state, plot its emission.
    pub fn step(&mut self) -> Result<()> {
        let result = self.interpreter.step(self.particle)?;
        self.particle = result.next;
        self.add(&result.emission);
        Ok(())
    }

    /// Iterate `iterations` times, or until `cancel` is set when `None`.
    ///
    /// Cancellation is observed between iterations. An evaluation error halts the
    /// run and is returned; everything accumulated before it stays in the histogram.
    pub fn run(&mut self, iterations: Option<u32>, cancel: &AtomicBool) -> Result<RunOutcome> {
        let limit = iterations.map(u64::from);
        let mut done: u64 = 0;
        loop {
            if limit.is_some_and(|limit| done >= limit) {
                return Ok(RunOutcome::Completed { iterations: done });
            }
            if cancel.load(Ordering::Relaxed) {
                return Ok(RunOutcome::Cancelled { iterations: done });
            }
            if let Err(e) = self.step() {
                warn!("generator: run halted after {done} iterations: {e}");
                return Err(e);
            }
            done += 1;
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::thread;
    use std::time::Duration;

    use super::*;
    use crate::ast::helpers::*;
    use crate::ast::Formula;
    use crate::error::FlameError;
    use crate::library::FormulaKind;
    use crate::model::{Color, ColorGradient, FormulaDef, Point};
    use crate::random::Scripted;

    /// Collapses every particle to the origin, which maps to cell (1, 1) of a 2×2 buffer.
    fn origin_system() -> System {
        make_system(Formula::new(0.0, 0.0))
    }

    #[test]
    fn bounded_run_plots_every_emission() {
        let mut generator =
            Generator::new(&origin_system(), Params::new(), 2, 2, -1, Scripted::new(&[0.3]))
                .unwrap();
        let outcome = generator.run(Some(10), &AtomicBool::new(false)).unwrap();
        assert_eq!(outcome, RunOutcome::Completed { iterations: 10 });
        let cell = generator.histogram().get(1, 1).unwrap();
        assert_eq!(cell.r, 10.0);
        assert_eq!(generator.histogram().stats().hit_cells, 1);
    }

    #[test]
    fn cancelled_flag_stops_before_first_iteration() {
        let mut generator =
            Generator::new(&origin_system(), Params::new(), 2, 2, -1, Scripted::new(&[0.3]))
                .unwrap();
        let outcome = generator.run(None, &AtomicBool::new(true)).unwrap();
        assert_eq!(outcome, RunOutcome::Cancelled { iterations: 0 });
        assert!(generator.histogram().is_empty());
    }

    #[test]
    fn unbounded_run_stops_on_cancel() {
        let cancel = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&cancel);
        let handle = thread::spawn(move || {
            let mut generator = Generator::new(
                &origin_system(),
                Params::new(),
                2,
                2,
                -1,
                seeded(Some(1)),
            )
            .unwrap();
            let outcome = generator.run(None, &flag).unwrap();
            (outcome, generator.histogram().get(1, 1).unwrap())
        });
        thread::sleep(Duration::from_millis(5));
        cancel.store(true, Ordering::Relaxed);
        let (outcome, cell) = handle.join().unwrap();
        assert!(matches!(outcome, RunOutcome::Cancelled { .. }));
        // every iteration before the cancel was accumulated
        assert_eq!(u64::from(cell.r as u32), outcome.iterations());
    }

    #[test]
    fn evaluation_error_halts_and_keeps_histogram() {
        let system = make_system(Formula::new(param(0), 0.0));
        let mut generator = Generator::new(
            &system,
            Params::from_values(&[0.0]),
            2,
            2,
            -1,
            Scripted::new(&[0.3]),
        )
        .unwrap();
        generator.run(Some(3), &AtomicBool::new(false)).unwrap();

        generator
            .set_system(&system, Params::new())
            .unwrap();
        generator.histogram.plot(0, 0, Color::WHITE);
        let err = generator.run(Some(3), &AtomicBool::new(false)).unwrap_err();
        assert!(matches!(err, FlameError::MissingParameter { index: 0, .. }));
        assert_eq!(generator.histogram().get(1, 1).unwrap().r, 3.0);
        assert_eq!(generator.histogram().get(0, 0), Some(Color::WHITE));
    }

    #[test]
    fn reconfiguration_keeps_histogram_until_clear() {
        let mut generator =
            Generator::new(&origin_system(), Params::new(), 2, 2, 5, Scripted::new(&[0.3]))
                .unwrap();
        generator.run(Some(4), &AtomicBool::new(false)).unwrap();
        generator.set_ttl(7);
        assert_eq!(generator.particle().ttl, 7);
        generator
            .set_system(&make_system(Formula::identity()), Params::new())
            .unwrap();
        generator.set_color_map(Some(Arc::new(ColorGradient::two_color(
            Color::BLACK,
            Color::WHITE,
        ))));
        assert_eq!(generator.histogram().stats().hit_cells, 1);

        generator.clear();
        assert!(generator.histogram().is_empty());

        generator.run(Some(1), &AtomicBool::new(false)).unwrap();
        generator.set_size(4, 4);
        assert!(generator.histogram().is_empty());
        assert_eq!(generator.histogram().width(), 4);
    }

    #[test]
    fn color_map_is_applied_to_particle_color() {
        let system = make_system(Formula::new(0.0, 0.0));
        let mut generator =
            Generator::new(&system, Params::new(), 2, 2, -1, Scripted::new(&[0.3])).unwrap();
        generator.set_color_map(Some(Arc::new(ColorGradient::two_color(
            Color::BLACK,
            Color::WHITE,
        ))));
        // make_system uses color 1.0, start color 0.5 → mixed 0.75
        generator.step().unwrap();
        let cell = generator.histogram().get(1, 1).unwrap();
        assert!((cell.r - 0.75).abs() < 1e-6);
        assert_eq!(cell.a, 1.0);
    }

    #[test]
    fn add_discards_outside_points() {
        let mut generator =
            Generator::new(&origin_system(), Params::new(), 2, 2, -1, Scripted::new(&[0.3]))
                .unwrap();
        let outside = Particle::new(Point::new(1.0, 0.0), 1.0, -1);
        assert!(!generator.add(&outside));
        assert!(generator.histogram().is_empty());
    }

    #[test]
    fn from_config_is_reproducible_with_seed() {
        let def = SystemDef::single(FormulaDef::library(FormulaKind::DeJong));
        let config = GeneratorConfig {
            width: 32,
            height: 32,
            seed: Some(11),
            ..GeneratorConfig::default()
        };
        let render = || {
            let mut generator = Generator::from_config(&def, &config).unwrap();
            generator.run(Some(2_000), &AtomicBool::new(false)).unwrap();
            generator.into_histogram()
        };
        let first = render();
        assert!(!first.is_empty());
        assert_eq!(first, render());
    }
}
