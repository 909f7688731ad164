//! Command-line entry point for the `edgematch` solver.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use edgematch::{
    CheckpointRecord, CheckpointStore, ConsoleReporter, DriverConfig, ParallelDriver,
    ProgressReporter, Puzzle, SearchOutcome, SilentReporter, TilePool, default_workers,
};

/// Edge-matching puzzle solver.
#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Config {
    /// Puzzle identifier; resolves to `<POOL_DIR>/<name>.txt`.
    puzzle: Option<String>,

    /// Puzzle identifier (alternative to the positional form).
    #[arg(long = "puzzle", value_name = "NAME", conflicts_with = "puzzle")]
    puzzle_name: Option<String>,

    /// Enable step logging.
    #[arg(short, long)]
    verbose: bool,

    /// Suppress non-error output.
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,

    /// Use the parallel driver.
    #[arg(short, long)]
    parallel: bool,

    /// Worker count for the parallel driver.
    #[arg(short, long, value_name = "N")]
    threads: Option<usize>,

    /// Wall-clock timeout in seconds.
    #[arg(long, value_name = "SECONDS")]
    timeout: Option<u64>,

    /// Disable the singleton detector.
    #[arg(long = "no-singletons")]
    no_singletons: bool,

    /// Smallest depth reported as a new record.
    #[arg(long = "min-depth", value_name = "DEPTH", default_value_t = 0)]
    min_depth: usize,
}

fn main() {
    let config = match Config::try_parse() {
        Ok(config) => config,
        Err(err) => {
            let code = if err.use_stderr() { 1 } else { 0 };
            let _ = err.print();
            std::process::exit(code);
        }
    };
    std::process::exit(run(&config));
}

fn run(config: &Config) -> i32 {
    init_logging(config);

    let Some(name) = config.puzzle_name.clone().or_else(|| config.puzzle.clone()) else {
        error!("no puzzle given; pass a name or --puzzle");
        return 1;
    };

    let (puzzle, store, resume) = match load(&name) {
        Ok(loaded) => loaded,
        Err(err) => {
            error!("{err:#}");
            return 1;
        }
    };

    let workers = if config.parallel {
        config.threads.unwrap_or_else(default_workers)
    } else {
        1
    };
    if workers == 0 {
        error!("--threads must be positive");
        return 1;
    }

    let driver_config = DriverConfig {
        workers,
        singletons: !config.no_singletons,
        timeout: config.timeout.map(Duration::from_secs),
        min_depth: config.min_depth,
        ..DriverConfig::default()
    };
    let reporter: Arc<dyn ProgressReporter> = if config.quiet {
        Arc::new(SilentReporter)
    } else {
        Arc::new(ConsoleReporter::new(puzzle.cell_count(), config.min_depth))
    };

    let mut driver = ParallelDriver::new(&puzzle, driver_config)
        .with_reporter(reporter)
        .with_store(store);
    if let Some(record) = resume {
        driver = driver.with_resume(record);
    }

    let report = match driver.run() {
        Ok(report) => report,
        Err(err) => {
            error!("{err}");
            return 1;
        }
    };
    info!(
        outcome = report.outcome.name(),
        nodes = report.stats.nodes,
        placements = report.stats.placements,
        fit_checks = report.stats.fit_checks,
        best_depth = report.best_depth,
        "search complete"
    );

    match report.outcome {
        SearchOutcome::Solved => {
            if let Some(board) = &report.solution {
                if !config.quiet {
                    println!("{board}");
                }
            }
            0
        }
        SearchOutcome::Exhausted => 1,
        SearchOutcome::TimedOut => 2,
        SearchOutcome::Cancelled => 130,
    }
}

/// Load the pool for `name` from `POOL_DIR` and any resumable checkpoint
/// from `SAVES_DIR`.
fn load(name: &str) -> anyhow::Result<(Puzzle, CheckpointStore, Option<CheckpointRecord>)> {
    let pool_dir = env_dir("POOL_DIR", "./data");
    let saves_dir = env_dir("SAVES_DIR", "./saves");

    let pool_path = pool_dir.join(format!("{name}.txt"));
    let pool = TilePool::load(&pool_path, None)
        .with_context(|| format!("cannot load pool {}", pool_path.display()))?;
    info!(
        puzzle = name,
        rows = pool.rows(),
        cols = pool.cols(),
        tiles = pool.tile_count(),
        "pool loaded"
    );
    let puzzle = Puzzle::compile(name, pool);

    let store = CheckpointStore::new(saves_dir, name);
    let resume = store
        .load_current()
        .with_context(|| format!("cannot resume from {}", store.current_path().display()))?;
    if resume.is_some() {
        info!(path = %store.current_path().display(), "resuming from checkpoint");
    }

    Ok((puzzle, store, resume))
}

fn env_dir(variable: &str, default: &str) -> PathBuf {
    std::env::var(variable)
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from(default))
}

fn init_logging(config: &Config) {
    let default = if config.quiet {
        "error"
    } else if config.verbose {
        "debug"
    } else {
        "info"
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}
