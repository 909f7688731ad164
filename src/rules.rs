use bitvec::prelude::*;

use crate::tile::{Side, Tile};

/// Encode a `(tile index, rotation)` pair as a dense domain entry.
pub fn entry_of(tile: usize, rotation: u8) -> usize {
    tile * 4 + usize::from(rotation)
}

/// Tile index of a domain entry.
pub fn entry_tile(entry: usize) -> usize {
    entry / 4
}

/// Rotation of a domain entry.
pub fn entry_rotation(entry: usize) -> u8 {
    (entry % 4) as u8
}

/// Edge-compatibility oracle compiled once from the pool.
///
/// Domain entries are the 4·P `(tile, rotation)` pairs in
/// tile-major order. For every side and edge label the rules hold a bitmask
/// over entries carrying that label on that side, so the propagator and the
/// value-ordering heuristic test compatibility without touching the tiles.
pub struct EdgeRules {
    /// Rotated edge quadruple per entry.
    entry_edges: Vec<[u16; 4]>,
    /// `side_masks[side][label]` marks entries whose edge on `side` is `label`.
    side_masks: [Vec<BitVec>; 4],
    /// Largest edge label in the pool.
    max_label: u16,
}

impl EdgeRules {
    /// Compile the rules for a pool of tiles.
    pub fn compile(tiles: &[Tile]) -> Self {
        debug_assert!(!tiles.is_empty());

        let entry_count = tiles.len() * 4;
        let mut entry_edges = Vec::with_capacity(entry_count);
        for tile in tiles {
            for rotation in 0..4 {
                entry_edges.push(tile.rotated(rotation));
            }
        }

        let max_label = entry_edges
            .iter()
            .flat_map(|edges| edges.iter().copied())
            .max()
            .unwrap_or(0);

        let side_masks = std::array::from_fn(|side| {
            (0..=max_label)
                .map(|label| {
                    let mut mask = bitvec![0; entry_count];
                    for (entry, edges) in entry_edges.iter().enumerate() {
                        if edges[side] == label {
                            mask.set(entry, true);
                        }
                    }
                    mask
                })
                .collect()
        });

        Self {
            entry_edges,
            side_masks,
            max_label,
        }
    }

    /// Number of domain entries (4·P).
    pub fn entry_count(&self) -> usize {
        self.entry_edges.len()
    }

    /// The rotated edges an entry presents.
    pub fn edges(&self, entry: usize) -> [u16; 4] {
        self.entry_edges[entry]
    }

    /// The edge label an entry presents on one side.
    pub fn edge(&self, entry: usize, side: Side) -> u16 {
        self.entry_edges[entry][side.index()]
    }

    /// Entries presenting `label` on `side`.
    pub fn mask(&self, side: Side, label: u16) -> &BitSlice {
        debug_assert!(label <= self.max_label);
        &self.side_masks[side.index()][usize::from(label)]
    }

    /// Largest edge label in the pool.
    pub fn max_label(&self) -> u16 {
        self.max_label
    }
}
