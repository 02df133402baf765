// CLI binary: panicking on unrecoverable errors is standard for CLI tools.
#![allow(clippy::unwrap_used, clippy::expect_used, clippy::unreachable, clippy::indexing_slicing)]

use std::path::{Path, PathBuf};
use std::process;
use std::thread;
use std::time::{Duration, Instant};

use clap::{Parser, Subcommand};
use serde::Serialize;

use flamecore::config::{load_system, GeneratorConfig};
use flamecore::engine::{preview_grid, render_parallel, BackgroundGenerator, HistogramStats};
use flamecore::library::FormulaKind;
use flamecore::model::{palettes, FormulaDef, Params, SystemDef};
use flamecore::{FlameError, HistogramBuffer};

// ── CLI argument parsing ─────────────────────────────────────────

#[derive(Parser)]
#[command(name = "flamecore-cli", about = "Chaos-game IFS renderer", version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Output raw JSON instead of formatted text
    #[arg(long, global = true)]
    json: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Render a system description into a histogram
    Render {
        /// System description (JSON)
        system: PathBuf,
        /// Generator configuration (JSON); flags below override it
        #[arg(long)]
        config: Option<PathBuf>,
        #[arg(long)]
        width: Option<u32>,
        #[arg(long)]
        height: Option<u32>,
        #[arg(long)]
        iterations: Option<u32>,
        #[arg(long)]
        seed: Option<u64>,
        /// Particle lifetime, -1 for immortal
        #[arg(long, allow_hyphen_values = true)]
        ttl: Option<i32>,
        #[arg(long)]
        palette: Option<String>,
        /// Number of worker threads
        #[arg(long, default_value = "1")]
        workers: usize,
        /// Run in the background for this long instead of a fixed iteration count
        #[arg(long, conflicts_with_all = ["iterations", "workers"])]
        seconds: Option<f64>,
        /// Write the raw histogram cells as JSON
        #[arg(long)]
        dump: Option<PathBuf>,
    },
    /// Show where a grid over [-1, 1]² lands after a few applications of a formula
    Preview {
        /// Library formula name
        formula: FormulaKind,
        /// Parameter values, defaults to the formula's defaults
        #[arg(long, value_delimiter = ',', allow_hyphen_values = true)]
        params: Option<Vec<f32>>,
        #[arg(long, default_value = "16")]
        grid: u32,
        #[arg(long, default_value = "3")]
        iterations: u32,
    },
    /// List library formulas and their parameters
    Formulas,
    /// Print the JSON schema of the system description format
    Schema,
}

// ── Output ───────────────────────────────────────────────────────

#[derive(Serialize)]
struct RenderSummary {
    width: u32,
    height: u32,
    iterations: u64,
    elapsed_ms: u128,
    stats: HistogramStats,
}

fn print_json<T: Serialize>(value: &T) {
    println!("{}", serde_json::to_string_pretty(value).unwrap_or_default());
}

fn fail(e: FlameError) -> ! {
    eprintln!("Error: {e}");
    process::exit(1);
}

// ── Commands ─────────────────────────────────────────────────────

fn run_render(
    system_path: &Path,
    mut config: GeneratorConfig,
    workers: usize,
    seconds: Option<f64>,
    dump: Option<&Path>,
    raw_json: bool,
) {
    let def = load_system(system_path).unwrap_or_else(|e| fail(e));
    let started = Instant::now();

    let (histogram, iterations) = match seconds {
        Some(seconds) => {
            config.iterations = None;
            let mut worker = BackgroundGenerator::from_config(&def, &config).unwrap_or_else(|e| fail(e));
            worker.start();
            thread::sleep(Duration::from_secs_f64(seconds.max(0.0)));
            let outcome = worker.stop().unwrap().unwrap_or_else(|e| fail(e));
            (worker.snapshot(), outcome.iterations())
        }
        None => {
            let histogram = render_parallel(
                &def.to_source(),
                &Params::from_system(&def),
                &config,
                workers,
            )
            .unwrap_or_else(|e| fail(e));
            (histogram, config.iterations.map_or(0, u64::from))
        }
    };

    let summary = RenderSummary {
        width: histogram.width(),
        height: histogram.height(),
        iterations,
        elapsed_ms: started.elapsed().as_millis(),
        stats: histogram.stats(),
    };

    if let Some(path) = dump {
        write_dump(path, &histogram);
    }

    if raw_json {
        print_json(&summary);
        return;
    }
    println!(
        "Rendered {} iterations into {}x{} in {} ms",
        summary.iterations, summary.width, summary.height, summary.elapsed_ms
    );
    println!(
        "  hit cells: {} ({:.1}%)",
        summary.stats.hit_cells,
        100.0 * summary.stats.hit_cells as f64 / (f64::from(summary.width) * f64::from(summary.height))
    );
    println!("  total alpha: {:.1}", summary.stats.total_alpha);
    println!("  max alpha: {:.1}", summary.stats.max_alpha);
}

fn write_dump(path: &Path, histogram: &HistogramBuffer) {
    let json = serde_json::to_string(histogram).unwrap_or_else(|e| fail(e.into()));
    std::fs::write(path, json).unwrap_or_else(|e| fail(e.into()));
    eprintln!("Wrote {}", path.display());
}

fn run_preview(kind: FormulaKind, params: Option<Vec<f32>>, grid: u32, iterations: u32, raw_json: bool) {
    let mut formula = FormulaDef::library(kind);
    if let Some(params) = params {
        formula.params = params;
    }
    let preview = preview_grid(&formula, grid, grid, iterations).unwrap_or_else(|e| fail(e));
    if raw_json {
        print_json(&preview);
        return;
    }
    println!("{kind}: {grid}x{grid} grid after {iterations} iterations");
    match preview.bounds {
        Some(b) => println!(
            "  bounds: [{:.4}, {:.4}] x [{:.4}, {:.4}]",
            b.min.x, b.max.x, b.min.y, b.max.y
        ),
        None => println!("  every point diverged"),
    }
}

#[derive(Serialize)]
struct FormulaInfo {
    name: &'static str,
    params: Vec<ParamInfo>,
    source: String,
}

#[derive(Serialize)]
struct ParamInfo {
    name: &'static str,
    default: f32,
}

fn run_formulas(raw_json: bool) {
    let infos: Vec<FormulaInfo> = FormulaKind::ALL
        .iter()
        .map(|&kind| FormulaInfo {
            name: kind.name(),
            params: kind
                .param_names()
                .iter()
                .zip(kind.default_params())
                .map(|(&name, default)| ParamInfo { name, default })
                .collect(),
            source: kind.source().to_string(),
        })
        .collect();
    if raw_json {
        print_json(&infos);
        return;
    }
    for info in &infos {
        let params: Vec<String> = info
            .params
            .iter()
            .map(|p| format!("{}={}", p.name, p.default))
            .collect();
        println!("{:<12} [{}]", info.name, params.join(", "));
        println!("    {}", info.source);
    }
    println!("\nPalettes: {}", palettes::NAMES.join(", "));
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();
    let cli = Cli::parse();

    match cli.command {
        Commands::Render {
            system,
            config,
            width,
            height,
            iterations,
            seed,
            ttl,
            palette,
            workers,
            seconds,
            dump,
        } => {
            let mut cfg = match config {
                Some(path) => GeneratorConfig::load(&path).unwrap_or_else(|e| fail(e)),
                None => GeneratorConfig::default(),
            };
            if let Some(v) = width {
                cfg.width = v;
            }
            if let Some(v) = height {
                cfg.height = v;
            }
            if let Some(v) = iterations {
                cfg.iterations = Some(v);
            }
            if seed.is_some() {
                cfg.seed = seed;
            }
            if let Some(v) = ttl {
                cfg.ttl = v;
            }
            if palette.is_some() {
                cfg.palette = palette;
            }
            run_render(&system, cfg, workers, seconds, dump.as_deref(), cli.json);
        }
        Commands::Preview {
            formula,
            params,
            grid,
            iterations,
        } => run_preview(formula, params, grid, iterations, cli.json),
        Commands::Formulas => run_formulas(cli.json),
        Commands::Schema => print_json(&schemars::schema_for!(SystemDef)),
    }
}
