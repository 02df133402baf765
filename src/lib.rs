pub mod ast;
pub mod config;
pub mod engine;
pub mod error;
pub mod interpreter;
pub mod library;
pub mod model;
pub mod random;

pub use ast::{Blend, Expression, Formula, LimitedBlend, System, WeightedFormula};
pub use config::GeneratorConfig;
pub use engine::{BackgroundGenerator, Generator, HistogramBuffer, RunOutcome};
pub use error::{FlameError, Result};
pub use interpreter::{Interpreter, StepResult};
pub use model::{Params, Particle, Point, SystemDef, Transform};
