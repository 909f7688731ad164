use rand::Rng;
use rand::rngs::StdRng;
use std::cmp::Reverse;

use crate::board::Board;
use crate::domain::DomainGrid;
use crate::puzzle::Puzzle;
use crate::rules::entry_tile;

/// Candidate-ordering policy for a worker.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OrderMode {
    /// Least constraining value: most-preserving candidates first.
    LeastConstraining,
    /// Ascending tile id; overrides LCV to diversify parallel workers.
    TileAscending,
    /// Descending tile id; overrides LCV to diversify parallel workers.
    TileDescending,
}

/// Choose the next cell to fill: among empty cells with at least one filled
/// neighbour, the one with the smallest current domain, ties broken by
/// row-major coordinate. An empty board opens at `anchor`. Returns `None`
/// on a full board, and falls back to the first empty cell in the (never
/// reached on a connected grid) case where no empty cell touches a filled
/// one.
pub fn select_cell(
    puzzle: &Puzzle,
    board: &Board,
    domains: &DomainGrid,
    anchor: (usize, usize),
) -> Option<(usize, usize)> {
    if board.filled() == 0 {
        return Some(anchor);
    }
    if board.is_full() {
        return None;
    }

    let mut best: Option<((usize, usize), usize)> = None;
    let mut first_empty = None;
    for r in 0..puzzle.rows() {
        for c in 0..puzzle.cols() {
            if !board.is_empty(r, c) {
                continue;
            }
            if first_empty.is_none() {
                first_empty = Some((r, c));
            }
            let connected = puzzle
                .constraints()
                .at(r, c)
                .neighbours()
                .any(|(_, (nr, nc))| !board.is_empty(nr, nc));
            if !connected {
                continue;
            }
            let size = domains.size(r, c);
            if best.map_or(true, |(_, s)| size < s) {
                best = Some(((r, c), size));
            }
        }
    }

    best.map(|(pos, _)| pos).or(first_empty)
}

/// Order the candidates of `(r, c)`.
///
/// LCV ranks candidates by how many entries they preserve across the
/// still-empty neighbours' domains, most-preserving first; ties fall back
/// to tile id, or to seeded jitter when a diversified worker supplies one.
/// The tile-id modes replace the preservation metric entirely.
pub fn order_candidates(
    puzzle: &Puzzle,
    board: &Board,
    domains: &DomainGrid,
    r: usize,
    c: usize,
    mode: OrderMode,
    mut jitter: Option<&mut StdRng>,
) -> Vec<usize> {
    let mut entries: Vec<usize> = domains.entries(r, c).ones().collect();
    match mode {
        OrderMode::TileAscending => entries,
        OrderMode::TileDescending => {
            entries.sort_by_key(|&e| (Reverse(entry_tile(e)), e % 4));
            entries
        }
        OrderMode::LeastConstraining => {
            let mut keyed = Vec::with_capacity(entries.len());
            for &entry in &entries {
                let score = preserved(puzzle, board, domains, r, c, entry);
                let tie = match jitter.as_deref_mut() {
                    Some(rng) => rng.random::<u64>(),
                    None => 0,
                };
                keyed.push((Reverse(score), tie, entry));
            }
            keyed.sort_unstable();
            keyed.into_iter().map(|(_, _, entry)| entry).collect()
        }
    }
}

/// Count the entries this candidate would leave alive across the empty
/// neighbours of `(r, c)`: entries facing it with the matching label,
/// minus those spent with the candidate's own tile.
fn preserved(
    puzzle: &Puzzle,
    board: &Board,
    domains: &DomainGrid,
    r: usize,
    c: usize,
    entry: usize,
) -> usize {
    let rules = puzzle.rules();
    let tile = entry_tile(entry);
    let mut kept = 0;
    for (side, (nr, nc)) in puzzle.constraints().at(r, c).neighbours() {
        if !board.is_empty(nr, nc) {
            continue;
        }
        let mask = rules.mask(side.opposite(), rules.edge(entry, side));
        kept += domains
            .entries(nr, nc)
            .ones()
            .filter(|&e| mask[e] && entry_tile(e) != tile)
            .count();
    }
    kept
}
