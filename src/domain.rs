use fixedbitset::FixedBitSet;
use ndarray::Array2;

use crate::puzzle::Puzzle;
use crate::rules::{entry_rotation, entry_tile};
use crate::tile::{ALL_SIDES, BORDER};

/// Per-cell candidate sets over the 4·P `(tile, rotation)` entries, with
/// cached sizes for the cell-selection heuristic.
///
/// A filled cell's domain is left untouched and never consulted; an empty
/// cell whose domain empties out signals a dead end.
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct DomainGrid {
    domains: Array2<FixedBitSet>,
    sizes: Array2<usize>,
}

impl DomainGrid {
    /// Populate every cell with the entries satisfying its static border
    /// mask: label 0 on border sides, non-zero inland. No neighbour
    /// information enters here.
    pub fn initialize(puzzle: &Puzzle) -> Self {
        let (rows, cols) = (puzzle.rows(), puzzle.cols());
        let rules = puzzle.rules();
        let entry_count = rules.entry_count();

        let mut domains =
            Array2::from_elem((rows, cols), FixedBitSet::with_capacity(entry_count));
        let mut sizes = Array2::from_elem((rows, cols), 0);

        for r in 0..rows {
            for c in 0..cols {
                let constraints = puzzle.constraints().at(r, c);
                let domain = &mut domains[(r, c)];
                for entry in 0..entry_count {
                    let edges = rules.edges(entry);
                    let fits_statically = ALL_SIDES.into_iter().all(|side| {
                        if constraints.is_border(side) {
                            edges[side.index()] == BORDER
                        } else {
                            edges[side.index()] != BORDER
                        }
                    });
                    if fits_statically {
                        domain.insert(entry);
                    }
                }
                sizes[(r, c)] = domain.count_ones(..);
            }
        }

        Self { domains, sizes }
    }

    /// Current domain size of a cell.
    pub fn size(&self, r: usize, c: usize) -> usize {
        self.sizes[(r, c)]
    }

    /// The raw entry set of a cell.
    pub fn entries(&self, r: usize, c: usize) -> &FixedBitSet {
        &self.domains[(r, c)]
    }

    /// Is an entry currently in the cell's domain?
    pub fn contains(&self, r: usize, c: usize, entry: usize) -> bool {
        self.domains[(r, c)].contains(entry)
    }

    /// Remove an entry from a cell's domain. Returns whether it was present.
    pub fn remove(&mut self, r: usize, c: usize, entry: usize) -> bool {
        let domain = &mut self.domains[(r, c)];
        if domain.contains(entry) {
            domain.remove(entry);
            self.sizes[(r, c)] -= 1;
            true
        } else {
            false
        }
    }

    /// Reinsert an entry removed earlier.
    pub fn reinsert(&mut self, r: usize, c: usize, entry: usize) {
        let domain = &mut self.domains[(r, c)];
        debug_assert!(!domain.contains(entry), "Entry restored twice");
        domain.insert(entry);
        self.sizes[(r, c)] += 1;
    }

    /// Current candidates of a cell in deterministic order: by tile id,
    /// then rotation (entries are tile-major).
    pub fn candidates(&self, r: usize, c: usize) -> impl Iterator<Item = (usize, u8)> + '_ {
        self.domains[(r, c)]
            .ones()
            .map(|entry| (entry_tile(entry), entry_rotation(entry)))
    }

    /// The single remaining entry of a cell, when its domain is a singleton.
    pub fn sole_entry(&self, r: usize, c: usize) -> Option<usize> {
        if self.sizes[(r, c)] == 1 {
            self.domains[(r, c)].ones().next()
        } else {
            None
        }
    }
}
