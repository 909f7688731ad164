use std::sync::Arc;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use crossbeam_channel::Sender;
use fixedbitset::FixedBitSet;
use rand::SeedableRng;
use rand::rngs::StdRng;
use tracing::{debug, trace};

use crate::board::Board;
use crate::checkpoint::{CheckpointRecord, DepthCursor, PlacementStep};
use crate::domain::DomainGrid;
use crate::error::SolveError;
use crate::puzzle::Puzzle;
use crate::rules::{entry_of, entry_tile};
use crate::solver::fits::FitsChecker;
use crate::solver::heuristics::{OrderMode, order_candidates, select_cell};
use crate::solver::parallel::SharedSearchState;
use crate::solver::propagate::{Propagation, propagate};
use crate::solver::singleton::next_singleton;
use crate::solver::symmetry::SymmetryBreaker;
use crate::solver::trail::{Trail, TrailEntry};
use crate::stats::{ProgressReporter, SilentReporter, Statistics};

/// Terminal state of a search run.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SearchOutcome {
    /// A complete legal placement was found.
    Solved,
    /// The search tree is exhausted; no solution exists under the
    /// configured restrictions.
    Exhausted,
    /// The wall-clock deadline elapsed at a stability boundary.
    TimedOut,
    /// Another worker succeeded or the run was cancelled externally.
    Cancelled,
}

impl SearchOutcome {
    /// Stable lower-case name for logs and reporters.
    pub fn name(self) -> &'static str {
        match self {
            SearchOutcome::Solved => "solved",
            SearchOutcome::Exhausted => "exhausted",
            SearchOutcome::TimedOut => "timed-out",
            SearchOutcome::Cancelled => "cancelled",
        }
    }
}

/// Number of shallow trail depths whose candidate cursors are recorded, for
/// progress weighting and checkpoint resume.
pub const PROGRESS_DEPTHS: usize = 8;

/// Tunables of one search engine.
#[derive(Clone, Debug)]
pub struct SearchConfig {
    /// Candidate-ordering policy.
    pub order: OrderMode,
    /// Seed for LCV tie-break jitter; `None` keeps orderings fully
    /// deterministic (tile-id ties).
    pub jitter_seed: Option<u64>,
    /// Run the singleton fixpoint after each propagation pass.
    pub singletons: bool,
    /// Apply the anchor-cell symmetry restriction.
    pub symmetry: bool,
    /// Wall-clock deadline, observed only at stability boundaries.
    pub deadline: Option<Instant>,
    /// Interval between periodic snapshot requests.
    pub snapshot_interval: Option<Duration>,
    /// Smallest depth reported as a new record.
    pub min_depth: usize,
    /// Worker identifier, for logs and diversification.
    pub worker: usize,
    /// Publish shallow-depth cursors to the shared state.
    pub publish_progress: bool,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            order: OrderMode::LeastConstraining,
            jitter_seed: None,
            singletons: true,
            symmetry: true,
            deadline: None,
            snapshot_interval: None,
            min_depth: 0,
            worker: 0,
            publish_progress: true,
        }
    }
}

#[derive(Clone, Copy)]
struct NodeProgress {
    depth: usize,
    tried: u32,
    total: u32,
}

enum Resume {
    Fresh,
    At(usize),
    After(usize),
}

/// The recursive backtracking engine.
///
/// Owns its board, domains, used-tile set, and trail, mutated under a
/// strict place → propagate → recurse → unpropagate → remove discipline;
/// the only cross-worker state it touches is the `SharedSearchState`.
pub struct SearchEngine<'p> {
    puzzle: &'p Puzzle,
    config: SearchConfig,
    symmetry: SymmetryBreaker,
    board: Board,
    domains: DomainGrid,
    used: FixedBitSet,
    trail: Trail,
    fits: FitsChecker,
    stats: Statistics,
    shared: Arc<SharedSearchState>,
    reporter: Arc<dyn ProgressReporter>,
    snapshots: Option<Sender<CheckpointRecord>>,
    last_snapshot: Instant,
    run_started: Instant,
    base_elapsed: Duration,
    forced: Vec<(usize, usize, usize)>,
    resume_cursors: Vec<DepthCursor>,
    active: Vec<NodeProgress>,
}

impl<'p> SearchEngine<'p> {
    /// Build an engine over a compiled puzzle with its own shared state and
    /// a silent reporter.
    pub fn new(puzzle: &'p Puzzle, config: SearchConfig) -> Self {
        let symmetry = if config.symmetry {
            SymmetryBreaker::standard()
        } else {
            SymmetryBreaker::disabled()
        };
        let now = Instant::now();
        Self {
            puzzle,
            symmetry,
            board: Board::new(puzzle.rows(), puzzle.cols()),
            domains: DomainGrid::initialize(puzzle),
            used: FixedBitSet::with_capacity(puzzle.cell_count()),
            trail: Trail::new(),
            fits: FitsChecker::new(),
            stats: Statistics::default(),
            shared: Arc::new(SharedSearchState::new()),
            reporter: Arc::new(SilentReporter),
            snapshots: None,
            last_snapshot: now,
            run_started: now,
            base_elapsed: Duration::ZERO,
            forced: Vec::new(),
            resume_cursors: Vec::new(),
            active: Vec::new(),
            config,
        }
    }

    /// Share cross-worker state with other engines.
    pub fn with_shared(mut self, shared: Arc<SharedSearchState>) -> Self {
        self.shared = shared;
        self
    }

    /// Publish progress events through `reporter`.
    pub fn with_reporter(mut self, reporter: Arc<dyn ProgressReporter>) -> Self {
        self.reporter = reporter;
        self
    }

    /// Send snapshot requests through the single-writer channel.
    pub fn with_snapshots(mut self, snapshots: Sender<CheckpointRecord>) -> Self {
        self.snapshots = Some(snapshots);
        self
    }

    /// The engine's board, a legal partial placement at every suspension
    /// point.
    pub fn board(&self) -> &Board {
        &self.board
    }

    /// The engine's counters.
    pub fn stats(&self) -> Statistics {
        let mut stats = self.stats.clone();
        stats.fit_checks = self.fits.checks();
        stats
    }

    /// The placements currently on the trail, in placement order.
    pub fn trail(&self) -> &[TrailEntry] {
        self.trail.entries()
    }

    /// Seed the engine from a decoded checkpoint instead of an empty board.
    ///
    /// The placements replay as a forced prefix of the recursion; the depth
    /// cursors steer candidate enumeration once a replayed subtree is
    /// exhausted, so no already-explored candidate is retried.
    ///
    /// # Errors
    ///
    /// Returns `InvalidCheckpoint` when the record is inconsistent with the
    /// puzzle or describes an illegal board.
    pub fn resume_from(&mut self, record: &CheckpointRecord) -> Result<(), SolveError> {
        record.board(self.puzzle)?;
        self.forced = record
            .placements
            .iter()
            .map(|step| {
                (
                    step.row,
                    step.col,
                    entry_of(usize::from(step.tile) - 1, step.rotation),
                )
            })
            .collect();
        self.resume_cursors = record.cursors.clone();
        self.base_elapsed = Duration::from_millis(record.elapsed_ms);
        self.shared.set_base_elapsed_ms(record.elapsed_ms);
        Ok(())
    }

    /// Run the search to a terminal state.
    ///
    /// The board is left as the search ended: complete on `Solved`, the
    /// last stable configuration on `TimedOut` and `Cancelled`, empty on
    /// `Exhausted`.
    pub fn run(&mut self) -> SearchOutcome {
        self.run_started = Instant::now();
        self.last_snapshot = self.run_started;
        self.reporter.search_started(
            self.puzzle.rows(),
            self.puzzle.cols(),
            self.puzzle.cell_count(),
        );
        debug!(worker = self.config.worker, "search started");

        let outcome = if self.config.singletons && self.forced.is_empty() && !self.settle_initial()
        {
            SearchOutcome::Exhausted
        } else {
            self.node()
        };

        match outcome {
            SearchOutcome::Solved => {
                self.shared.publish_solution(&self.board);
                self.reporter.solved(self.config.worker);
            }
            SearchOutcome::TimedOut => {
                if let Some(snapshots) = &self.snapshots {
                    let _ = snapshots.send(self.checkpoint_record());
                }
            }
            SearchOutcome::Exhausted | SearchOutcome::Cancelled => {}
        }

        debug!(
            worker = self.config.worker,
            outcome = outcome.name(),
            nodes = self.stats.nodes,
            placements = self.stats.placements,
            dead_ends = self.stats.dead_ends,
            "search finished"
        );
        outcome
    }

    /// Build a checkpoint describing the current stable configuration.
    pub fn checkpoint_record(&self) -> CheckpointRecord {
        let timestamp_ms = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|elapsed| elapsed.as_millis() as u64)
            .unwrap_or(0);
        CheckpointRecord {
            rows: self.puzzle.rows(),
            cols: self.puzzle.cols(),
            tile_count: self.puzzle.cell_count(),
            elapsed_ms: (self.base_elapsed + self.run_started.elapsed()).as_millis() as u64,
            timestamp_ms,
            placements: self
                .trail
                .entries()
                .iter()
                .map(|entry| PlacementStep {
                    row: entry.row(),
                    col: entry.col(),
                    tile: entry.tile(),
                    rotation: entry.rotation(),
                })
                .collect(),
            cursors: self
                .active
                .iter()
                .map(|node| DepthCursor {
                    depth: node.depth,
                    tried: node.tried as usize,
                })
                .collect(),
        }
    }

    /// Commit every initially-forced cell before the first choice is made.
    fn settle_initial(&mut self) -> bool {
        while let Some((r, c, entry)) = next_singleton(&self.board, &self.domains) {
            self.stats.singletons += 1;
            if !self.commit_one(r, c, entry) {
                self.retract_to(0);
                return false;
            }
        }
        true
    }

    /// One node of the backtracking recursion. Entered only at stability
    /// boundaries: the board, used-tile set, and domains always describe a
    /// legal partial placement here.
    fn node(&mut self) -> SearchOutcome {
        self.stats.nodes += 1;
        self.stats.visit_depth(self.trail.depth());
        if self.board.is_full() {
            return SearchOutcome::Solved;
        }
        if self.shared.stop_requested() {
            return SearchOutcome::Cancelled;
        }
        if self.deadline_elapsed() {
            return SearchOutcome::TimedOut;
        }
        self.maybe_snapshot();

        let depth = self.trail.depth();
        if depth < self.forced.len() {
            self.replay_node(depth)
        } else {
            self.search_node(depth, Resume::Fresh)
        }
    }

    /// Replay one checkpointed placement as a forced choice.
    fn replay_node(&mut self, depth: usize) -> SearchOutcome {
        let (r, c, entry) = self.forced[depth];
        // A checkpoint captures a stable configuration; replaying its
        // prefix against the same pool cannot dead-end.
        assert!(
            self.commit_one(r, c, entry),
            "checkpoint replay dead-ended at depth {depth}"
        );
        self.after_commit();

        let outcome = self.node();
        if outcome != SearchOutcome::Exhausted {
            return outcome;
        }

        // The replayed subtree is spent: lift the forced prefix and fall
        // back to ordinary enumeration from the recorded cursor.
        let resume = self
            .resume_cursors
            .iter()
            .find(|cursor| cursor.depth == depth)
            .map_or(Resume::After(entry), |cursor| Resume::At(cursor.tried));
        self.retract_to(depth);
        self.forced.truncate(depth);
        self.search_node(depth, resume)
    }

    /// Ordinary search at one node: select a cell, try its candidates.
    fn search_node(&mut self, depth: usize, resume: Resume) -> SearchOutcome {
        let Some((r, c)) = select_cell(
            self.puzzle,
            &self.board,
            &self.domains,
            self.symmetry.anchor(),
        ) else {
            // A full board never reaches here; the caller returns Solved.
            return SearchOutcome::Solved;
        };
        if self.domains.size(r, c) == 0 {
            return SearchOutcome::Exhausted;
        }

        let mut jitter = self.node_rng(depth);
        let candidates = order_candidates(
            self.puzzle,
            &self.board,
            &self.domains,
            r,
            c,
            self.config.order,
            jitter.as_mut(),
        );
        let start = match resume {
            Resume::Fresh => 0,
            Resume::At(tried) => tried,
            Resume::After(entry) => candidates
                .iter()
                .position(|&candidate| candidate == entry)
                .map_or(0, |index| index + 1),
        };
        self.push_progress(depth, start as u32, candidates.len() as u32);

        for index in start..candidates.len() {
            let entry = candidates[index];
            let rotation = (entry % 4) as u8;
            if !self.symmetry.admits(self.trail.is_empty(), r, c, rotation) {
                continue;
            }
            let edges = self.puzzle.rules().edges(entry);
            if !self
                .fits
                .fits(&self.board, self.puzzle.constraints(), r, c, edges)
            {
                continue;
            }
            self.update_progress(depth, (index + 1) as u32);

            if !self.commit(r, c, entry) {
                continue;
            }
            self.after_commit();

            let outcome = self.node();
            if outcome != SearchOutcome::Exhausted {
                // Leave the board intact so upstream checkpoints see it.
                return outcome;
            }
            self.retract_to(depth);
        }

        self.pop_progress(depth);
        SearchOutcome::Exhausted
    }

    /// Commit a placement, propagate, and settle singletons. On a dead end
    /// everything this commit did is rolled back and `false` is returned.
    fn commit(&mut self, r: usize, c: usize, entry: usize) -> bool {
        let mark = self.trail.depth();
        if !self.commit_one(r, c, entry) {
            self.retract_to(mark);
            return false;
        }
        if self.config.singletons {
            while let Some((sr, sc, singleton)) = next_singleton(&self.board, &self.domains) {
                self.stats.singletons += 1;
                if !self.commit_one(sr, sc, singleton) {
                    self.retract_to(mark);
                    return false;
                }
            }
        }
        true
    }

    /// Place one entry and propagate its constraints.
    fn commit_one(&mut self, r: usize, c: usize, entry: usize) -> bool {
        let tile_index = entry_tile(entry);
        debug_assert!(!self.used.contains(tile_index), "Tile placed twice");

        let placement = self.puzzle.placement(entry);
        self.board.place(r, c, placement);
        self.used.insert(tile_index);
        self.trail
            .begin(r, c, placement.tile(), placement.rotation());
        self.stats.placements += 1;
        self.shared.note_placement();
        trace!(
            worker = self.config.worker,
            r,
            c,
            tile = placement.tile(),
            rotation = placement.rotation(),
            "place"
        );

        match propagate(
            self.puzzle,
            &self.board,
            &mut self.domains,
            &mut self.trail,
            &mut self.stats,
            r,
            c,
            tile_index,
        ) {
            Propagation::Stable => true,
            Propagation::DeadEnd => {
                self.stats.dead_ends += 1;
                false
            }
        }
    }

    /// Pop trail frames until the trail is `depth` placements long,
    /// restoring domains, board, and used-tile set exactly.
    fn retract_to(&mut self, depth: usize) {
        while self.trail.depth() > depth {
            let domains = &mut self.domains;
            let Some(frame) = self
                .trail
                .pop_frame(|r, c, entry| domains.reinsert(r, c, entry))
            else {
                break;
            };
            let placement = self.board.remove(frame.row(), frame.col());
            self.used.remove(usize::from(placement.tile()) - 1);
            self.stats.retractions += 1;
        }
    }

    /// Bookkeeping at a fresh stability boundary.
    fn after_commit(&mut self) {
        let depth = self.trail.depth();
        if depth > self.stats.max_depth {
            self.stats.max_depth = depth;
        }
        if self.shared.record_depth(depth, &self.board) && depth >= self.config.min_depth {
            self.reporter
                .depth_record(self.config.worker, depth, self.puzzle.cell_count());
        }
    }

    fn deadline_elapsed(&self) -> bool {
        self.config
            .deadline
            .is_some_and(|deadline| Instant::now() >= deadline)
    }

    fn maybe_snapshot(&mut self) {
        let Some(interval) = self.config.snapshot_interval else {
            return;
        };
        if self.snapshots.is_none() || self.last_snapshot.elapsed() < interval {
            return;
        }
        self.last_snapshot = Instant::now();
        let record = self.checkpoint_record();
        if let Some(snapshots) = &self.snapshots {
            let _ = snapshots.send(record);
        }
    }

    fn node_rng(&self, depth: usize) -> Option<StdRng> {
        // Seeded per node, never from a shared stream, so a resumed run
        // reproduces the ordering its cursors were recorded against.
        self.config.jitter_seed.map(|seed| {
            StdRng::seed_from_u64(seed ^ (depth as u64).wrapping_mul(0x9E37_79B9_7F4A_7C15))
        })
    }

    fn push_progress(&mut self, depth: usize, tried: u32, total: u32) {
        if depth >= PROGRESS_DEPTHS {
            return;
        }
        self.active.push(NodeProgress {
            depth,
            tried,
            total,
        });
        self.publish_progress();
    }

    fn update_progress(&mut self, depth: usize, tried: u32) {
        if depth >= PROGRESS_DEPTHS {
            return;
        }
        if let Some(node) = self.active.last_mut() {
            debug_assert_eq!(node.depth, depth);
            node.tried = tried;
        }
        self.publish_progress();
    }

    fn pop_progress(&mut self, depth: usize) {
        if depth >= PROGRESS_DEPTHS {
            return;
        }
        let popped = self.active.pop();
        debug_assert!(popped.is_some_and(|node| node.depth == depth));
        self.publish_progress();
    }

    fn publish_progress(&self) {
        if !self.config.publish_progress {
            return;
        }
        let levels: Vec<(u32, u32)> = self
            .active
            .iter()
            .map(|node| (node.tried, node.total))
            .collect();
        self.shared.set_progress(&levels);
    }
}
