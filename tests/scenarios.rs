//! End-to-end solver scenarios exercised through the public API.

use std::time::Duration;

use rand::prelude::*;
use rand::rngs::StdRng;

use edgematch::{
    Board, CheckpointRecord, CheckpointStore, DriverConfig, ParallelDriver, PlacementStep, Puzzle,
    SearchConfig, SearchEngine, SearchOutcome, Tile, TilePool,
};

/// Pool whose interior edges all carry distinct labels; the identity layout
/// at rotation 0 is the unique solution up to board rotation.
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

/// Pool generated from a random interior labelling over a small alphabet,
/// with every tile's listing rotated by a seed-dependent amount. Solvable
/// by construction.
fn random_pool(rows: usize, cols: usize, labels: u16, seed: u64) -> TilePool {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut horizontal = vec![vec![0u16; cols - 1]; rows];
    let mut vertical = vec![vec![0u16; cols]; rows - 1];
    for row in &mut horizontal {
        for label in row.iter_mut() {
            *label = rng.random_range(1..=labels);
        }
    }
    for row in &mut vertical {
        for label in row.iter_mut() {
            *label = rng.random_range(1..=labels);
        }
    }

    let mut tiles = Vec::new();
    for r in 0..rows {
        for c in 0..cols {
            let id = (r * cols + c + 1) as u16;
            let n = if r == 0 { 0 } else { vertical[r - 1][c] };
            let e = if c == cols - 1 { 0 } else { horizontal[r][c] };
            let s = if r == rows - 1 { 0 } else { vertical[r][c] };
            let w = if c == 0 { 0 } else { horizontal[r][c - 1] };
            let spin = rng.random_range(0..4u8);
            let listed = edgematch::rotate_edges([n, e, s, w], spin);
            tiles.push(Tile::new(id, listed));
        }
    }
    TilePool::new(tiles, rows, cols).unwrap()
}

/// A 2x2 pool where tile 1 never presents two adjacent zero edges, so no
/// corner accepts it.
fn insoluble_pool() -> TilePool {
    let tiles = vec![
        Tile::new(1, [0, 1, 2, 3]),
        Tile::new(2, [0, 0, 1, 1]),
        Tile::new(3, [1, 1, 0, 0]),
        Tile::new(4, [2, 0, 0, 1]),
    ];
    TilePool::new(tiles, 2, 2).unwrap()
}

/// Brute-force oracle: every complete assignment of (tile, rotation, cell)
/// that satisfies all constraints, with no propagation and no symmetry
/// breaking.
fn oracle_solutions(puzzle: &Puzzle) -> Vec<Vec<(u16, u8)>> {
    let rows = puzzle.rows();
    let cols = puzzle.cols();
    let count = puzzle.cell_count();
    let mut grid: Vec<Option<(u16, u8)>> = vec![None; count];
    let mut used = vec![false; count];
    let mut found = Vec::new();

    fn edge_at(puzzle: &Puzzle, grid: &[Option<(u16, u8)>], index: usize, side: usize) -> u16 {
        let (tile, rotation) = grid[index].unwrap();
        puzzle.tile_by_id(tile).rotated(rotation)[side]
    }

    fn fill(
        puzzle: &Puzzle,
        grid: &mut Vec<Option<(u16, u8)>>,
        used: &mut Vec<bool>,
        index: usize,
        found: &mut Vec<Vec<(u16, u8)>>,
    ) {
        let rows = puzzle.rows();
        let cols = puzzle.cols();
        if index == rows * cols {
            found.push(grid.iter().map(|cell| cell.unwrap()).collect());
            return;
        }
        let (r, c) = (index / cols, index % cols);
        for tile_index in 0..rows * cols {
            if used[tile_index] {
                continue;
            }
            let tile = puzzle.tile_by_id((tile_index + 1) as u16);
            for rotation in 0..4u8 {
                let edges = tile.rotated(rotation);
                let north_ok = if r == 0 {
                    edges[0] == 0
                } else {
                    edges[0] != 0 && edges[0] == edge_at(puzzle, grid, index - cols, 2)
                };
                let west_ok = if c == 0 {
                    edges[3] == 0
                } else {
                    edges[3] != 0 && edges[3] == edge_at(puzzle, grid, index - 1, 1)
                };
                let east_ok = if c == cols - 1 {
                    edges[1] == 0
                } else {
                    edges[1] != 0
                };
                let south_ok = if r == rows - 1 {
                    edges[2] == 0
                } else {
                    edges[2] != 0
                };
                if !(north_ok && west_ok && east_ok && south_ok) {
                    continue;
                }
                grid[index] = Some(((tile_index + 1) as u16, rotation));
                used[tile_index] = true;
                fill(puzzle, grid, used, index + 1, found);
                used[tile_index] = false;
                grid[index] = None;
            }
        }
    }

    fill(puzzle, &mut grid, &mut used, 0, &mut found);
    found
}

fn board_cells(board: &Board) -> Vec<(u16, u8)> {
    let (rows, cols) = board.dims();
    let mut cells = Vec::with_capacity(rows * cols);
    for r in 0..rows {
        for c in 0..cols {
            let placement = board.get(r, c).unwrap();
            cells.push((placement.tile(), placement.rotation()));
        }
    }
    cells
}

#[test]
fn unique_three_by_three_solves_to_one_representative() {
    let puzzle = Puzzle::compile("3x3", unique_pool(3, 3));
    let report = ParallelDriver::new(&puzzle, DriverConfig::default())
        .run()
        .unwrap();

    assert_eq!(report.outcome, SearchOutcome::Solved);
    let board = report.solution.unwrap();
    board.validate(puzzle.tiles()).unwrap();
    // The symmetry breaker pins the representative with anchor rotation 0:
    // the identity layout, tile ids in row-major order.
    let cells = board_cells(&board);
    let expected: Vec<(u16, u8)> = (1..=9).map(|id| (id as u16, 0)).collect();
    assert_eq!(cells, expected);
}

#[test]
fn insoluble_two_by_two_exhausts_without_best_checkpoint() {
    let puzzle = Puzzle::compile("2x2", insoluble_pool());
    let saves = tempfile::tempdir().unwrap();
    let store = CheckpointStore::new(saves.path(), "2x2");

    let report = ParallelDriver::new(&puzzle, DriverConfig::default())
        .with_store(CheckpointStore::new(saves.path(), "2x2"))
        .run()
        .unwrap();

    assert_eq!(report.outcome, SearchOutcome::Exhausted);
    assert!(report.solution.is_none());
    assert!(!store.best_path().exists());
    assert!(!store.current_path().exists());
}

#[test]
fn singletons_cut_recursion_but_not_the_solution() {
    let puzzle = Puzzle::compile("4x4", unique_pool(4, 4));

    let mut with = SearchEngine::new(&puzzle, SearchConfig::default());
    assert_eq!(with.run(), SearchOutcome::Solved);

    let mut without = SearchEngine::new(
        &puzzle,
        SearchConfig {
            singletons: false,
            ..SearchConfig::default()
        },
    );
    assert_eq!(without.run(), SearchOutcome::Solved);

    assert_eq!(board_cells(with.board()), board_cells(without.board()));
    assert!(
        with.stats().nodes < without.stats().nodes,
        "singleton forcing should enter fewer nodes ({} vs {})",
        with.stats().nodes,
        without.stats().nodes
    );
}

#[test]
fn resumed_run_replays_the_checkpoint_order_then_solves() {
    let puzzle = Puzzle::compile("6x6", unique_pool(6, 6));

    let mut first = SearchEngine::new(&puzzle, SearchConfig::default());
    assert_eq!(first.run(), SearchOutcome::Solved);
    let depth = 12;
    let prefix: Vec<PlacementStep> = first.trail()[..depth]
        .iter()
        .map(|entry| PlacementStep {
            row: entry.row(),
            col: entry.col(),
            tile: entry.tile(),
            rotation: entry.rotation(),
        })
        .collect();

    let record = CheckpointRecord {
        rows: 6,
        cols: 6,
        tile_count: 36,
        elapsed_ms: 1000,
        timestamp_ms: 1_700_000_000_000,
        placements: prefix.clone(),
        cursors: Vec::new(),
    };

    // Persist and reload through the store, as a relaunch would.
    let saves = tempfile::tempdir().unwrap();
    let store = CheckpointStore::new(saves.path(), "6x6");
    store.save_current(&record);
    let loaded = store.load_current().unwrap().unwrap();
    assert_eq!(loaded, record);

    let mut second = SearchEngine::new(&puzzle, SearchConfig::default());
    second.resume_from(&loaded).unwrap();
    assert_eq!(second.run(), SearchOutcome::Solved);

    let replayed: Vec<PlacementStep> = second.trail()[..depth]
        .iter()
        .map(|entry| PlacementStep {
            row: entry.row(),
            col: entry.col(),
            tile: entry.tile(),
            rotation: entry.rotation(),
        })
        .collect();
    assert_eq!(replayed, prefix);
    second.board().validate(puzzle.tiles()).unwrap();
}

#[test]
fn timed_out_run_checkpoints_a_valid_board() {
    let puzzle = Puzzle::compile("6x6", unique_pool(6, 6));
    let saves = tempfile::tempdir().unwrap();
    let store = CheckpointStore::new(saves.path(), "6x6");

    let report = ParallelDriver::new(
        &puzzle,
        DriverConfig {
            timeout: Some(Duration::ZERO),
            ..DriverConfig::default()
        },
    )
    .with_store(CheckpointStore::new(saves.path(), "6x6"))
    .run()
    .unwrap();

    assert_eq!(report.outcome, SearchOutcome::TimedOut);
    // The emitted checkpoint must describe a board satisfying every
    // invariant, stable enough to resume from.
    let record = store.load_current().unwrap().unwrap();
    record.board(&puzzle).unwrap();
}

#[test]
fn sequential_and_parallel_runs_both_solve() {
    let puzzle = Puzzle::compile("6x6", unique_pool(6, 6));

    let sequential = ParallelDriver::new(&puzzle, DriverConfig::default())
        .run()
        .unwrap();
    assert_eq!(sequential.outcome, SearchOutcome::Solved);
    let sequential_board = sequential.solution.unwrap();
    sequential_board.validate(puzzle.tiles()).unwrap();

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
    let parallel_board = parallel.solution.unwrap();
    parallel_board.validate(puzzle.tiles()).unwrap();
    assert!(parallel_board.is_full());
}

#[test]
fn engine_agrees_with_the_brute_force_oracle() {
    for seed in [1, 7, 21, 99, 1234] {
        let puzzle = Puzzle::compile("fuzz", random_pool(3, 3, 3, seed));
        let solutions = oracle_solutions(&puzzle);
        assert!(
            !solutions.is_empty(),
            "seed {seed}: generated pools are solvable by construction"
        );

        let mut engine = SearchEngine::new(
            &puzzle,
            SearchConfig {
                symmetry: false,
                ..SearchConfig::default()
            },
        );
        assert_eq!(engine.run(), SearchOutcome::Solved, "seed {seed}");
        engine.board().validate(puzzle.tiles()).unwrap();
        let cells = board_cells(engine.board());
        assert!(
            solutions.contains(&cells),
            "seed {seed}: engine solution must be one the oracle enumerates"
        );
    }

    // And where the oracle finds nothing, the engine exhausts.
    let puzzle = Puzzle::compile("2x2", insoluble_pool());
    assert!(oracle_solutions(&puzzle).is_empty());
    let mut engine = SearchEngine::new(
        &puzzle,
        SearchConfig {
            symmetry: false,
            ..SearchConfig::default()
        },
    );
    assert_eq!(engine.run(), SearchOutcome::Exhausted);
}
