use indicatif::{ProgressBar, ProgressStyle};
use serde::Serialize;

/// Counters accumulated by one search engine.
///
/// The driver merges worker counters into one report at the end of a run.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Statistics {
    /// Search-tree nodes entered.
    pub nodes: u64,
    /// Local edge-compatibility tests performed.
    pub fit_checks: u64,
    /// Placements committed (searched, singleton, and replayed alike).
    pub placements: u64,
    /// Placements withdrawn while backtracking.
    pub retractions: u64,
    /// Placements forced by the singleton detector.
    pub singletons: u64,
    /// Domain entries removed by propagation and used-tile exclusion.
    pub pruned_entries: u64,
    /// Propagation passes that emptied a domain.
    pub dead_ends: u64,
    /// Deepest stable configuration reached.
    pub max_depth: usize,
    /// Histogram of node visits per trail depth.
    pub depth_nodes: Vec<u64>,
}

impl Statistics {
    /// Fold another worker's counters into this one.
    pub fn merge(&mut self, other: &Statistics) {
        self.nodes += other.nodes;
        self.fit_checks += other.fit_checks;
        self.placements += other.placements;
        self.retractions += other.retractions;
        self.singletons += other.singletons;
        self.pruned_entries += other.pruned_entries;
        self.dead_ends += other.dead_ends;
        self.max_depth = self.max_depth.max(other.max_depth);
        if self.depth_nodes.len() < other.depth_nodes.len() {
            self.depth_nodes.resize(other.depth_nodes.len(), 0);
        }
        for (mine, theirs) in self.depth_nodes.iter_mut().zip(&other.depth_nodes) {
            *mine += theirs;
        }
    }

    /// Count a node visit at `depth`.
    pub fn visit_depth(&mut self, depth: usize) {
        if self.depth_nodes.len() <= depth {
            self.depth_nodes.resize(depth + 1, 0);
        }
        self.depth_nodes[depth] += 1;
    }
}

/// Progress events a search run publishes.
///
/// A narrow contract with two implementations: silent and detailed. The
/// engine holds it behind an `Arc` and never calls back into the driver.
pub trait ProgressReporter: Send + Sync {
    /// A run started on an R×C board with P tiles.
    fn search_started(&self, _rows: usize, _cols: usize, _tiles: usize) {}

    /// A worker reached a new deepest stable configuration.
    fn depth_record(&self, _worker: usize, _depth: usize, _cells: usize) {}

    /// A worker found a complete solution.
    fn solved(&self, _worker: usize) {}

    /// A worker reached a terminal state.
    fn worker_finished(&self, _worker: usize, _outcome: &str, _stats: &Statistics) {}

    /// The run is over; release any display resources.
    fn finished(&self) {}
}

/// Reporter that swallows every event.
#[derive(Default)]
pub struct SilentReporter;

impl ProgressReporter for SilentReporter {}

/// Detailed reporter drawing an `indicatif` bar tracking the deepest
/// configuration across all workers.
pub struct ConsoleReporter {
    bar: ProgressBar,
    min_depth: usize,
}

impl ConsoleReporter {
    /// Build a reporter for a board of `cells` cells, reporting depth
    /// records from `min_depth` up.
    pub fn new(cells: usize, min_depth: usize) -> Self {
        let bar = ProgressBar::new(cells as u64);
        bar.set_style(
            ProgressStyle::with_template(
                "{spinner:.green} [{elapsed_precise}] {bar:40.cyan/blue} {pos}/{len} cells {msg}",
            )
            .unwrap()
            .progress_chars("##-"),
        );
        Self { bar, min_depth }
    }
}

impl ProgressReporter for ConsoleReporter {
    fn search_started(&self, rows: usize, cols: usize, tiles: usize) {
        self.bar
            .println(format!("searching {rows}x{cols} board, {tiles} tiles"));
    }

    fn depth_record(&self, worker: usize, depth: usize, _cells: usize) {
        if depth < self.min_depth {
            return;
        }
        if depth as u64 > self.bar.position() {
            self.bar.set_position(depth as u64);
            self.bar.set_message(format!("(worker {worker})"));
        }
    }

    fn solved(&self, worker: usize) {
        self.bar.println(format!("worker {worker} found a solution"));
    }

    fn worker_finished(&self, worker: usize, outcome: &str, stats: &Statistics) {
        self.bar.println(format!(
            "worker {worker} finished: {outcome} ({} nodes, {} placements, {} dead ends)",
            stats.nodes, stats.placements, stats.dead_ends
        ));
    }

    fn finished(&self) {
        self.bar.finish_and_clear();
    }
}

/// Run status exposed to the monitoring feed.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum RunStatus {
    /// No run in progress.
    Idle,
    /// Workers are searching.
    Running,
    /// A complete placement was found.
    Solved,
    /// The wall-clock budget elapsed.
    TimedOut,
}

/// One placed cell in a monitoring snapshot.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct PlacementView {
    /// Row of the cell.
    pub row: usize,
    /// Column of the cell.
    pub col: usize,
    /// Id of the placed tile.
    pub tile: u16,
    /// Rotation of the placed tile.
    pub rotation: u8,
}

/// Snapshot structure polled by the external monitoring collaborator.
///
/// Counters behind it are atomics; readers tolerate slightly stale values.
#[derive(Clone, Debug, Serialize)]
pub struct MonitorSnapshot {
    /// Identifier of the puzzle configuration being solved.
    pub config_id: String,
    /// Depth of the deepest stable configuration seen so far.
    pub depth: usize,
    /// Progress percentage weighted by candidate counts at the first depths.
    pub progress_pct: f64,
    /// Cumulative compute time in milliseconds, across resumes.
    pub compute_ms: u64,
    /// Placement throughput over the current run.
    pub tiles_per_second: f64,
    /// Current status.
    pub status: RunStatus,
    /// The deepest placement grid seen so far.
    pub placements: Vec<PlacementView>,
}

/// Weight shallow-depth candidate cursors into a single percentage: each
/// recorded depth contributes its tried fraction scaled by the product of
/// the candidate counts above it.
pub fn weighted_progress(levels: &[(u32, u32)]) -> f64 {
    let mut denominator = 1.0;
    let mut progress = 0.0;
    for &(tried, total) in levels {
        if total == 0 {
            break;
        }
        denominator *= f64::from(total);
        progress += f64::from(tried.saturating_sub(1)) / denominator;
    }
    (progress * 100.0).clamp(0.0, 100.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn merge_sums_counters_and_maxes_depth() {
        let mut a = Statistics {
            nodes: 10,
            fit_checks: 100,
            placements: 5,
            retractions: 3,
            singletons: 1,
            pruned_entries: 40,
            dead_ends: 2,
            max_depth: 7,
            depth_nodes: vec![4, 3, 3],
        };
        let b = Statistics {
            nodes: 1,
            max_depth: 9,
            depth_nodes: vec![1, 0, 0, 2],
            ..Statistics::default()
        };
        a.merge(&b);
        assert_eq!(a.nodes, 11);
        assert_eq!(a.placements, 5);
        assert_eq!(a.max_depth, 9);
        assert_eq!(a.depth_nodes, vec![5, 3, 3, 2]);
    }

    #[test]
    fn visit_depth_grows_the_histogram() {
        let mut stats = Statistics::default();
        stats.visit_depth(2);
        stats.visit_depth(2);
        stats.visit_depth(0);
        assert_eq!(stats.depth_nodes, vec![1, 0, 2]);
    }

    #[test]
    fn weighted_progress_tracks_the_first_depths() {
        assert_eq!(weighted_progress(&[]), 0.0);
        // First of four candidates at the root: nothing finished yet.
        assert_eq!(weighted_progress(&[(1, 4)]), 0.0);
        // Third of four: two subtrees done.
        assert!((weighted_progress(&[(3, 4)]) - 50.0).abs() < 1e-9);
        // Half way through the second level refines the estimate.
        let pct = weighted_progress(&[(3, 4), (2, 2)]);
        assert!((pct - 62.5).abs() < 1e-9);
        assert!(weighted_progress(&[(4, 4), (2, 2), (5, 8)]) <= 100.0);
    }

}
