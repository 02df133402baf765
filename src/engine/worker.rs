use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use log::{info, warn};
use parking_lot::Mutex;
use rand::rngs::StdRng;

use super::generator::{Generator, RunOutcome};
use super::histogram::HistogramBuffer;
use crate::config::GeneratorConfig;
use crate::error::{FlameError, Result};
use crate::model::SystemDef;
use crate::random::RandomSource;

/// Runs a [`Generator`] on a dedicated thread in batches.
///
/// The generator sits behind a mutex that the worker only holds for one batch
/// at a time, so readers and reconfiguration interleave at batch boundaries.
pub struct BackgroundGenerator<R: RandomSource + Send + 'static = StdRng> {
    generator: Arc<Mutex<Generator<R>>>,
    cancel: Arc<AtomicBool>,
    handle: Option<JoinHandle<Result<RunOutcome>>>,
    batch_size: u32,
    iterations: Option<u32>,
}

impl BackgroundGenerator<StdRng> {
    pub fn from_config(system: &SystemDef, config: &GeneratorConfig) -> Result<Self> {
        let generator = Generator::from_config(system, config)?;
        Ok(Self::new(generator, config.batch_size, config.iterations))
    }
}

impl<R: RandomSource + Send + 'static> BackgroundGenerator<R> {
    /// `iterations` bounds each started run; `None` runs until stopped.
    pub fn new(generator: Generator<R>, batch_size: u32, iterations: Option<u32>) -> Self {
        Self {
            generator: Arc::new(Mutex::new(generator)),
            cancel: Arc::new(AtomicBool::new(false)),
            handle: None,
            batch_size: batch_size.max(1),
            iterations,
        }
    }

    pub fn is_running(&self) -> bool {
        self.handle.as_ref().is_some_and(|h| !h.is_finished())
    }

    /// Start generating. Returns false (and does nothing) if a run is already
    /// in progress. A previous run that finished on its own is reaped first; its
    /// outcome is only logged, so call [`wait`](Self::wait) beforehand to keep it.
    pub fn start(&mut self) -> bool {
        if self.handle.as_ref().is_some_and(JoinHandle::is_finished) {
            let _ = self.join();
        }
        if self.handle.is_some() {
            return false;
        }
        self.cancel.store(false, Ordering::Relaxed);
        let generator = Arc::clone(&self.generator);
        let cancel = Arc::clone(&self.cancel);
        let batch_size = self.batch_size;
        let limit = self.iterations.map(u64::from);
        info!(
            "background generator: starting ({} iterations, batches of {batch_size})",
            limit.map_or_else(|| "unbounded".to_string(), |n| n.to_string())
        );
        self.handle = Some(thread::spawn(move || {
            run_batches(&generator, &cancel, batch_size, limit)
        }));
        true
    }

    /// Cancel and join the worker. `None` when nothing was started.
    pub fn stop(&mut self) -> Option<Result<RunOutcome>> {
        self.cancel.store(true, Ordering::Relaxed);
        self.join()
    }

    /// Join without cancelling; blocks until a bounded run completes.
    pub fn wait(&mut self) -> Option<Result<RunOutcome>> {
        self.join()
    }

    fn join(&mut self) -> Option<Result<RunOutcome>> {
        let handle = self.handle.take()?;
        let result = handle
            .join()
            .unwrap_or_else(|_| Err(FlameError::configuration("generator thread panicked")));
        match &result {
            Ok(outcome) => info!("background generator: stopped ({outcome:?})"),
            Err(e) => warn!("background generator: stopped on error: {e}"),
        }
        Some(result)
    }

    /// Read-only access to the histogram. Locks the generator for the duration
    /// of `f`, which can only happen between batches.
    pub fn with_histogram<F, T>(&self, f: F) -> T
    where
        F: FnOnce(&HistogramBuffer) -> T,
    {
        let guard = self.generator.lock();
        f(guard.histogram())
    }

    /// Owned copy of the histogram.
    pub fn snapshot(&self) -> HistogramBuffer {
        self.with_histogram(Clone::clone)
    }

    /// Mutating access to the generator, e.g. `set_system` or `clear`. Applied
    /// between batches while running.
    pub fn with_generator_mut<F, T>(&self, f: F) -> T
    where
        F: FnOnce(&mut Generator<R>) -> T,
    {
        let mut guard = self.generator.lock();
        f(&mut guard)
    }
}

impl<R: RandomSource + Send + 'static> Drop for BackgroundGenerator<R> {
    fn drop(&mut self) {
        let _ = self.stop();
    }
}

fn run_batches<R: RandomSource>(
    generator: &Mutex<Generator<R>>,
    cancel: &AtomicBool,
    batch_size: u32,
    limit: Option<u64>,
) -> Result<RunOutcome> {
    let mut total: u64 = 0;
    loop {
        let batch = match limit {
            Some(limit) if total >= limit => {
                return Ok(RunOutcome::Completed { iterations: total })
            }
            Some(limit) => u32::try_from(limit - total).map_or(batch_size, |left| left.min(batch_size)),
            None => batch_size,
        };
        let outcome = generator.lock().run(Some(batch), cancel)?;
        total += outcome.iterations();
        if let RunOutcome::Cancelled { .. } = outcome {
            return Ok(RunOutcome::Cancelled { iterations: total });
        }
    }
}
