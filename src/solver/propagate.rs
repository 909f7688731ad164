use std::collections::VecDeque;

use crate::board::Board;
use crate::domain::DomainGrid;
use crate::puzzle::Puzzle;
use crate::rules::entry_of;
use crate::solver::trail::Trail;
use crate::stats::Statistics;
use crate::tile::ALL_SIDES;

/// Result of a propagation pass.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Propagation {
    /// Every touched domain kept at least one entry.
    Stable,
    /// Some empty cell's domain emptied out; the placement cannot stand.
    DeadEnd,
}

/// Enforce arc consistency on the empty cells reachable from a fresh
/// placement of tile `tile_index` at `(r, c)`.
///
/// First the placed tile's four entries leave every empty cell's domain,
/// then a worklist pass re-checks each reachable empty cell: an entry
/// survives only if, on every side facing the border or an already-filled
/// cell, it presents the required label. All removals land on the open
/// trail frame so the placement can be withdrawn exactly.
pub fn propagate(
    puzzle: &Puzzle,
    board: &Board,
    domains: &mut DomainGrid,
    trail: &mut Trail,
    stats: &mut Statistics,
    r: usize,
    c: usize,
    tile_index: usize,
) -> Propagation {
    let (rows, cols) = (puzzle.rows(), puzzle.cols());

    // The committed tile is spent: drop its entries everywhere.
    for er in 0..rows {
        for ec in 0..cols {
            if !board.is_empty(er, ec) {
                continue;
            }
            for rotation in 0..4 {
                let entry = entry_of(tile_index, rotation);
                if domains.remove(er, ec, entry) {
                    trail.log_removal(er, ec, entry);
                    stats.pruned_entries += 1;
                }
            }
            if domains.size(er, ec) == 0 {
                return Propagation::DeadEnd;
            }
        }
    }

    let mut worklist: VecDeque<(usize, usize)> = VecDeque::new();
    for (_, (nr, nc)) in puzzle.constraints().at(r, c).neighbours() {
        if board.is_empty(nr, nc) {
            worklist.push_back((nr, nc));
        }
    }

    while let Some((er, ec)) = worklist.pop_front() {
        if !revise(puzzle, board, domains, trail, stats, er, ec) {
            continue;
        }
        if domains.size(er, ec) == 0 {
            return Propagation::DeadEnd;
        }
        for (_, (nr, nc)) in puzzle.constraints().at(er, ec).neighbours() {
            if board.is_empty(nr, nc) {
                worklist.push_back((nr, nc));
            }
        }
    }

    Propagation::Stable
}

/// Re-check one empty cell against its filled neighbours. Returns whether
/// any entry was removed.
fn revise(
    puzzle: &Puzzle,
    board: &Board,
    domains: &mut DomainGrid,
    trail: &mut Trail,
    stats: &mut Statistics,
    r: usize,
    c: usize,
) -> bool {
    let rules = puzzle.rules();
    let cell = puzzle.constraints().at(r, c);

    // Required labels come only from filled neighbours; the static border
    // mask was applied when the domains were initialized and removals are
    // monotone, so it never needs re-checking.
    let mut required: [Option<u16>; 4] = [None; 4];
    let mut constrained = false;
    for side in ALL_SIDES {
        if let Some((nr, nc)) = cell.neighbour(side) {
            if let Some(neighbour) = board.get(nr, nc) {
                required[side.index()] = Some(neighbour.edges()[side.opposite().index()]);
                constrained = true;
            }
        }
    }
    if !constrained {
        return false;
    }

    let mut to_remove = Vec::new();
    for entry in domains.entries(r, c).ones() {
        let supported = ALL_SIDES.into_iter().all(|side| match required[side.index()] {
            Some(label) => rules.mask(side, label)[entry],
            None => true,
        });
        if !supported {
            to_remove.push(entry);
        }
    }

    let modified = !to_remove.is_empty();
    for entry in to_remove {
        domains.remove(r, c, entry);
        trail.log_removal(r, c, entry);
        stats.pruned_entries += 1;
    }
    modified
}
