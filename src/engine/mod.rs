pub mod generator;
pub mod histogram;
pub mod parallel;
pub mod preview;
pub mod worker;

pub use generator::{Generator, RunOutcome};
pub use histogram::{HistogramBuffer, HistogramStats};
pub use parallel::render_parallel;
pub use preview::{preview_grid, Bounds, PreviewGrid};
pub use worker::BackgroundGenerator;
