use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use crossbeam_channel::{RecvTimeoutError, unbounded};
use tracing::{debug, info, warn};

use crate::board::Board;
use crate::checkpoint::{CheckpointRecord, CheckpointStore};
use crate::error::SolveError;
use crate::puzzle::Puzzle;
use crate::solver::engine::{SearchConfig, SearchEngine, SearchOutcome};
use crate::solver::heuristics::OrderMode;
use crate::stats::{
    MonitorSnapshot, PlacementView, ProgressReporter, RunStatus, SilentReporter, Statistics,
    weighted_progress,
};

/// Cross-worker shared state: atomic flags and counters plus the
/// lock-guarded deepest-board snapshot. One instance per run, outliving all
/// workers.
pub struct SharedSearchState {
    solved: AtomicBool,
    cancelled: AtomicBool,
    running: AtomicBool,
    timed_out: AtomicBool,
    best_depth: AtomicUsize,
    placements: AtomicU64,
    base_elapsed_ms: AtomicU64,
    best_board: Mutex<Option<Board>>,
    solution: Mutex<Option<Board>>,
    progress: Mutex<Vec<(u32, u32)>>,
    started: Instant,
}

impl SharedSearchState {
    /// Fresh state for one run.
    pub fn new() -> Self {
        Self {
            solved: AtomicBool::new(false),
            cancelled: AtomicBool::new(false),
            running: AtomicBool::new(false),
            timed_out: AtomicBool::new(false),
            best_depth: AtomicUsize::new(0),
            placements: AtomicU64::new(0),
            base_elapsed_ms: AtomicU64::new(0),
            best_board: Mutex::new(None),
            solution: Mutex::new(None),
            progress: Mutex::new(Vec::new()),
            started: Instant::now(),
        }
    }

    /// Request cancellation; workers observe it at stability boundaries,
    /// finish their current commit, and exit.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Release);
    }

    /// Has a worker published a solution?
    pub fn is_solved(&self) -> bool {
        self.solved.load(Ordering::Acquire)
    }

    /// Was the run cancelled?
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }

    /// Should workers stop at the next stability boundary?
    pub fn stop_requested(&self) -> bool {
        self.is_solved() || self.is_cancelled()
    }

    /// Deepest stable configuration seen by any worker.
    pub fn best_depth(&self) -> usize {
        self.best_depth.load(Ordering::Acquire)
    }

    /// Snapshot of the deepest board seen, if any.
    pub fn best_board(&self) -> Option<Board> {
        self.best_board.lock().map(|guard| guard.clone()).unwrap_or(None)
    }

    /// The published solution, if any.
    pub fn solution(&self) -> Option<Board> {
        self.solution.lock().map(|guard| guard.clone()).unwrap_or(None)
    }

    pub(crate) fn publish_solution(&self, board: &Board) {
        if let Ok(mut guard) = self.solution.lock() {
            *guard = Some(board.clone());
        }
        self.best_depth.fetch_max(board.filled(), Ordering::AcqRel);
        self.solved.store(true, Ordering::Release);
    }

    /// Record a new depth if it strictly exceeds the best seen; the board
    /// snapshot is updated under the lock. Returns whether this was a
    /// record.
    pub(crate) fn record_depth(&self, depth: usize, board: &Board) -> bool {
        let previous = self.best_depth.fetch_max(depth, Ordering::AcqRel);
        if depth <= previous {
            return false;
        }
        if let Ok(mut guard) = self.best_board.lock() {
            *guard = Some(board.clone());
        }
        true
    }

    pub(crate) fn note_placement(&self) {
        self.placements.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn set_progress(&self, levels: &[(u32, u32)]) {
        if let Ok(mut guard) = self.progress.lock() {
            guard.clear();
            guard.extend_from_slice(levels);
        }
    }

    pub(crate) fn set_base_elapsed_ms(&self, elapsed_ms: u64) {
        self.base_elapsed_ms.store(elapsed_ms, Ordering::Release);
    }

    pub(crate) fn mark_running(&self, running: bool) {
        self.running.store(running, Ordering::Release);
    }

    pub(crate) fn mark_timed_out(&self) {
        self.timed_out.store(true, Ordering::Release);
    }

    /// Cumulative compute time, including resumed runs.
    pub fn compute_ms(&self) -> u64 {
        self.base_elapsed_ms.load(Ordering::Acquire) + self.started.elapsed().as_millis() as u64
    }

    /// Build the snapshot structure the monitoring collaborator polls.
    /// Values may be slightly stale relative to each other.
    pub fn snapshot(&self, config_id: &str) -> MonitorSnapshot {
        let status = if self.is_solved() {
            RunStatus::Solved
        } else if self.timed_out.load(Ordering::Acquire) {
            RunStatus::TimedOut
        } else if self.running.load(Ordering::Acquire) {
            RunStatus::Running
        } else {
            RunStatus::Idle
        };

        let levels = self
            .progress
            .lock()
            .map(|guard| guard.clone())
            .unwrap_or_default();
        let board = self.solution().or_else(|| self.best_board());
        let placements = board.map_or_else(Vec::new, |board| {
            let (rows, cols) = board.dims();
            let mut view = Vec::with_capacity(board.filled());
            for r in 0..rows {
                for c in 0..cols {
                    if let Some(placement) = board.get(r, c) {
                        view.push(PlacementView {
                            row: r,
                            col: c,
                            tile: placement.tile(),
                            rotation: placement.rotation(),
                        });
                    }
                }
            }
            view
        });

        let compute_ms = self.compute_ms();
        let run_secs = self.started.elapsed().as_secs_f64();
        let tiles_per_second = if run_secs > 0.0 {
            self.placements.load(Ordering::Relaxed) as f64 / run_secs
        } else {
            0.0
        };

        MonitorSnapshot {
            config_id: config_id.to_owned(),
            depth: self.best_depth(),
            progress_pct: weighted_progress(&levels),
            compute_ms,
            tiles_per_second,
            status,
            placements,
        }
    }
}

impl Default for SharedSearchState {
    fn default() -> Self {
        Self::new()
    }
}

/// Default worker count: `max(4, ⌊0.75 · cores⌋)`.
pub fn default_workers() -> usize {
    let cores = std::thread::available_parallelism()
        .map(std::num::NonZeroUsize::get)
        .unwrap_or(4);
    usize::max(4, cores * 3 / 4)
}

/// How a run should be executed.
#[derive(Clone, Debug)]
pub struct DriverConfig {
    /// Worker count; 1 is the sequential mode.
    pub workers: usize,
    /// Base seed diversifying LCV tie-breaks across workers.
    pub seed: u64,
    /// Run the singleton fixpoint after each propagation pass.
    pub singletons: bool,
    /// Apply the anchor-cell symmetry restriction.
    pub symmetry: bool,
    /// Wall-clock budget for the whole run.
    pub timeout: Option<Duration>,
    /// Interval between periodic checkpoint snapshots.
    pub snapshot_interval: Option<Duration>,
    /// Smallest depth reported as a new record.
    pub min_depth: usize,
}

impl Default for DriverConfig {
    fn default() -> Self {
        Self {
            workers: 1,
            seed: 0,
            singletons: true,
            symmetry: true,
            timeout: None,
            snapshot_interval: Some(Duration::from_secs(30)),
            min_depth: 0,
        }
    }
}

/// Outcome of a whole run plus the merged worker statistics.
#[derive(Clone, Debug)]
pub struct DriverReport {
    /// Terminal state of the run.
    pub outcome: SearchOutcome,
    /// The solution board, when one was found.
    pub solution: Option<Board>,
    /// Counters merged across all workers.
    pub stats: Statistics,
    /// Worker that produced the solution, if any.
    pub winner: Option<usize>,
    /// Deepest stable configuration any worker reached.
    pub best_depth: usize,
}

/// Spawns N workers over independent engines sharing one
/// `SharedSearchState`, funnels their snapshot requests to the single
/// checkpoint writer on the calling thread, and joins everyone.
///
/// Diversification is the sole parallelism mechanism: workers differ in
/// value-ordering mode and tie-break seed, and no partial subtree ever
/// migrates between them.
pub struct ParallelDriver<'p> {
    puzzle: &'p Puzzle,
    config: DriverConfig,
    shared: Arc<SharedSearchState>,
    reporter: Arc<dyn ProgressReporter>,
    store: Option<CheckpointStore>,
    resume: Option<CheckpointRecord>,
}

impl<'p> ParallelDriver<'p> {
    /// Build a driver over a compiled puzzle.
    pub fn new(puzzle: &'p Puzzle, config: DriverConfig) -> Self {
        Self {
            puzzle,
            config,
            shared: Arc::new(SharedSearchState::new()),
            reporter: Arc::new(SilentReporter),
            store: None,
            resume: None,
        }
    }

    /// Publish progress events through `reporter`.
    pub fn with_reporter(mut self, reporter: Arc<dyn ProgressReporter>) -> Self {
        self.reporter = reporter;
        self
    }

    /// Persist checkpoints through `store`.
    pub fn with_store(mut self, store: CheckpointStore) -> Self {
        self.store = Some(store);
        self
    }

    /// Resume worker 0 from a decoded checkpoint; the other workers start
    /// fresh with diversified orderings.
    pub fn with_resume(mut self, record: CheckpointRecord) -> Self {
        self.resume = Some(record);
        self
    }

    /// Handle for external monitoring polls.
    pub fn shared(&self) -> Arc<SharedSearchState> {
        Arc::clone(&self.shared)
    }

    /// Run the search across all workers and aggregate the result.
    ///
    /// # Errors
    ///
    /// Returns `InvalidCheckpoint` when the resume record does not fit the
    /// puzzle. Checkpoint persistence failures are logged, never returned.
    pub fn run(&self) -> Result<DriverReport, SolveError> {
        let workers = self.config.workers.max(1);
        let deadline = self.config.timeout.map(|timeout| Instant::now() + timeout);
        info!(
            puzzle = self.puzzle.name(),
            workers,
            timeout_s = self.config.timeout.map(|t| t.as_secs()),
            "run started"
        );

        let (snapshot_tx, snapshot_rx) = unbounded::<CheckpointRecord>();
        let (done_tx, done_rx) = unbounded::<(usize, SearchOutcome, Statistics)>();

        let mut engines = Vec::with_capacity(workers);
        for worker in 0..workers {
            let mut engine = SearchEngine::new(self.puzzle, self.worker_config(worker, deadline))
                .with_shared(Arc::clone(&self.shared))
                .with_reporter(Arc::clone(&self.reporter))
                .with_snapshots(snapshot_tx.clone());
            if worker == 0 {
                if let Some(record) = &self.resume {
                    engine.resume_from(record)?;
                }
            }
            engines.push(engine);
        }
        drop(snapshot_tx);

        self.shared.mark_running(true);
        let mut outcomes = vec![SearchOutcome::Cancelled; workers];
        let mut stats = Statistics::default();
        let mut winner = None;
        let mut deepest: Option<CheckpointRecord> = None;

        std::thread::scope(|scope| {
            for (worker, mut engine) in engines.drain(..).enumerate() {
                let done_tx = done_tx.clone();
                scope.spawn(move || {
                    let outcome = engine.run();
                    let _ = done_tx.send((worker, outcome, engine.stats()));
                });
            }
            drop(done_tx);

            let mut remaining = workers;
            while remaining > 0 {
                match done_rx.recv_timeout(Duration::from_millis(100)) {
                    Ok((worker, outcome, worker_stats)) => {
                        remaining -= 1;
                        debug!(worker, outcome = outcome.name(), "worker joined");
                        self.reporter
                            .worker_finished(worker, outcome.name(), &worker_stats);
                        stats.merge(&worker_stats);
                        if outcome == SearchOutcome::Solved && winner.is_none() {
                            winner = Some(worker);
                        }
                        if outcome == SearchOutcome::TimedOut {
                            self.shared.mark_timed_out();
                        }
                        outcomes[worker] = outcome;
                    }
                    Err(RecvTimeoutError::Timeout) => {}
                    Err(RecvTimeoutError::Disconnected) => break,
                }
                self.drain_snapshots(&snapshot_rx, &mut deepest);
            }
        });
        self.drain_snapshots(&snapshot_rx, &mut deepest);
        self.shared.mark_running(false);

        if let (Some(store), Some(record)) = (&self.store, &deepest) {
            store.save_best(record);
        }

        let outcome = if outcomes.contains(&SearchOutcome::Solved) {
            SearchOutcome::Solved
        } else if outcomes.contains(&SearchOutcome::TimedOut) {
            SearchOutcome::TimedOut
        } else if self.shared.is_cancelled() {
            SearchOutcome::Cancelled
        } else {
            SearchOutcome::Exhausted
        };
        self.reporter.finished();
        info!(outcome = outcome.name(), best_depth = self.shared.best_depth(), "run finished");

        Ok(DriverReport {
            outcome,
            solution: self.shared.solution(),
            stats,
            winner,
            best_depth: self.shared.best_depth(),
        })
    }

    /// Diversify one worker: worker 0 keeps the deterministic baseline so
    /// resume cursors stay valid, the rest cycle order modes and seeds.
    fn worker_config(&self, worker: usize, deadline: Option<Instant>) -> SearchConfig {
        let order = if worker == 0 {
            OrderMode::LeastConstraining
        } else {
            match worker % 3 {
                0 => OrderMode::LeastConstraining,
                1 => OrderMode::TileAscending,
                _ => OrderMode::TileDescending,
            }
        };
        let jitter_seed = if worker == 0 {
            None
        } else {
            Some(self.config.seed.wrapping_add(worker as u64))
        };
        SearchConfig {
            order,
            jitter_seed,
            singletons: self.config.singletons,
            symmetry: self.config.symmetry,
            deadline,
            snapshot_interval: self.config.snapshot_interval,
            min_depth: self.config.min_depth,
            worker,
            publish_progress: worker == 0,
        }
    }

    fn drain_snapshots(
        &self,
        snapshot_rx: &crossbeam_channel::Receiver<CheckpointRecord>,
        deepest: &mut Option<CheckpointRecord>,
    ) {
        while let Ok(record) = snapshot_rx.try_recv() {
            if deepest
                .as_ref()
                .is_none_or(|best| record.placements.len() > best.placements.len())
            {
                *deepest = Some(record.clone());
            }
            if let Some(store) = &self.store {
                store.save_current(&record);
            } else {
                warn!("snapshot requested but no checkpoint store configured");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::TilePool;
    use crate::tile::Tile;

    fn unique_pool(rows: usize, cols: usize) -> TilePool {
        let horizontal = |r: usize, c: usize| (1 + r * (cols - 1) + c) as u16;
        let vertical = |r: usize, c: usize| (1 + rows * (cols - 1) + r * cols + c) as u16;
        let mut tiles = Vec::new();
        for r in 0..rows {
            for c in 0..cols {
                let id = (r * cols + c + 1) as u16;
                let n = if r == 0 { 0 } else { vertical(r - 1, c) };
                let e = if c == cols - 1 { 0 } else { horizontal(r, c) };
                let s = if r == rows - 1 { 0 } else { vertical(r, c) };
                let w = if c == 0 { 0 } else { horizontal(r, c - 1) };
                tiles.push(Tile::new(id, [n, e, s, w]));
            }
        }
        TilePool::new(tiles, rows, cols).unwrap()
    }

    #[test]
    fn sequential_and_parallel_agree_on_solvability() {
        let puzzle = Puzzle::compile("6x6", unique_pool(6, 6));

        let sequential = ParallelDriver::new(&puzzle, DriverConfig::default())
            .run()
            .unwrap();
        assert_eq!(sequential.outcome, SearchOutcome::Solved);
        sequential
            .solution
            .as_ref()
            .unwrap()
            .validate(puzzle.tiles())
            .unwrap();

        let parallel = ParallelDriver::new(
            &puzzle,
            DriverConfig {
                workers: 4,
                ..DriverConfig::default()
            },
        )
        .run()
        .unwrap();
        assert_eq!(parallel.outcome, SearchOutcome::Solved);
        let board = parallel.solution.unwrap();
        board.validate(puzzle.tiles()).unwrap();
        assert!(board.is_full());
        assert!(parallel.winner.is_some());
    }

    #[test]
    fn driver_reports_exhaustion() {
        let tiles = vec![
            Tile::new(1, [0, 1, 2, 3]),
            Tile::new(2, [0, 0, 1, 1]),
            Tile::new(3, [1, 1, 0, 0]),
            Tile::new(4, [2, 0, 0, 1]),
        ];
        let puzzle = Puzzle::compile("2x2", TilePool::new(tiles, 2, 2).unwrap());
        let report = ParallelDriver::new(&puzzle, DriverConfig::default())
            .run()
            .unwrap();
        assert_eq!(report.outcome, SearchOutcome::Exhausted);
        assert!(report.solution.is_none());
        assert!(report.winner.is_none());
    }

    #[test]
    fn snapshot_reflects_solved_state() {
        let puzzle = Puzzle::compile("3x3", unique_pool(3, 3));
        let driver = ParallelDriver::new(&puzzle, DriverConfig::default());
        let shared = driver.shared();

        let idle = shared.snapshot("3x3");
        assert_eq!(idle.status, RunStatus::Idle);
        assert_eq!(idle.depth, 0);

        let report = driver.run().unwrap();
        assert_eq!(report.outcome, SearchOutcome::Solved);

        let snapshot = shared.snapshot("3x3");
        assert_eq!(snapshot.status, RunStatus::Solved);
        assert_eq!(snapshot.depth, 9);
        assert_eq!(snapshot.placements.len(), 9);
        assert_eq!(snapshot.config_id, "3x3");
    }
}
