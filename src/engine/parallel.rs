use std::sync::atomic::AtomicBool;
use std::thread;

use log::{debug, info};

use super::generator::Generator;
use super::histogram::HistogramBuffer;
use crate::ast::System;
use crate::config::GeneratorConfig;
use crate::error::{FlameError, Result};
use crate::model::Params;
use crate::random::seeded;

/// Render a bounded run on `workers` independent generators and merge their
/// buffers.
///
/// Worker `i` is seeded with `seed + i` when the configuration carries a seed,
/// so a seeded render is reproducible for a fixed worker count. The configured
/// iteration count is split across workers, with the remainder going to the
/// first ones.
pub fn render_parallel(
    system: &System,
    params: &Params,
    config: &GeneratorConfig,
    workers: usize,
) -> Result<HistogramBuffer> {
    config.validate()?;
    let Some(total) = config.iterations else {
        return Err(FlameError::configuration(
            "parallel rendering needs a bounded iteration count",
        ));
    };
    let workers = u32::try_from(workers.max(1)).unwrap_or(u32::MAX).min(total.max(1));
    let color_map = config.color_map()?;
    let never = AtomicBool::new(false);

    info!("render: {total} iterations on {workers} workers");
    let partials: Vec<Result<HistogramBuffer>> = thread::scope(|scope| {
        let handles: Vec<_> = (0..workers)
            .map(|i| {
                let share = total / workers + u32::from(i < total % workers);
                let seed = config.seed.map(|s| s.wrapping_add(u64::from(i)));
                let color_map = color_map.clone();
                let never = &never;
                scope.spawn(move || -> Result<HistogramBuffer> {
                    let mut generator = Generator::new(
                        system,
                        params.clone(),
                        config.width,
                        config.height,
                        config.ttl,
                        seeded(seed),
                    )?;
                    generator.set_color_map(color_map);
                    let outcome = generator.run(Some(share), never)?;
                    debug!("render: worker {i} finished {} iterations", outcome.iterations());
                    Ok(generator.into_histogram())
                })
            })
            .collect();
        handles
            .into_iter()
            .map(|h| {
                h.join()
                    .unwrap_or_else(|_| Err(FlameError::configuration("render worker panicked")))
            })
            .collect()
    });

    let mut merged = HistogramBuffer::new(config.width, config.height);
    for partial in partials {
        merged.merge(&partial?)?;
    }
    Ok(merged)
}
