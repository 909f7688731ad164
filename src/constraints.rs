use ndarray::Array2;

use crate::tile::{ALL_SIDES, Side};

/// Static constraints of one cell: which sides face the outer border, and
/// the coordinates of the neighbour across each interior side.
#[derive(Clone, Debug, Default)]
pub struct CellConstraints {
    /// Bitmask over side indices; a set bit means that side is border.
    border: u8,
    /// Neighbour coordinate per side, `None` on border sides.
    neighbours: [Option<(usize, usize)>; 4],
}

impl CellConstraints {
    /// Does `side` face the outer border?
    pub fn is_border(&self, side: Side) -> bool {
        self.border & (1 << side.index()) != 0
    }

    /// Bitmask of border sides, bit `i` for side index `i`.
    pub fn border_mask(&self) -> u8 {
        self.border
    }

    /// The neighbour across `side`, if any.
    pub fn neighbour(&self, side: Side) -> Option<(usize, usize)> {
        self.neighbours[side.index()]
    }

    /// All interior neighbours with the side they sit across.
    pub fn neighbours(&self) -> impl Iterator<Item = (Side, (usize, usize))> + '_ {
        ALL_SIDES
            .into_iter()
            .filter_map(|side| self.neighbours[side.index()].map(|pos| (side, pos)))
    }
}

/// Grid of precomputed per-cell constraints, built once per run.
pub struct ConstraintGrid {
    cells: Array2<CellConstraints>,
}

impl ConstraintGrid {
    /// Precompute border masks and neighbour coordinates for an R×C board.
    pub fn build(rows: usize, cols: usize) -> Self {
        debug_assert!(rows > 0 && cols > 0);

        let mut cells = Array2::from_elem((rows, cols), CellConstraints::default());
        for r in 0..rows {
            for c in 0..cols {
                let mut border = 0u8;
                let mut neighbours = [None; 4];
                for side in ALL_SIDES {
                    let (dr, dc) = side.delta();
                    let coords = match (r.checked_add_signed(dr), c.checked_add_signed(dc)) {
                        (Some(nr), Some(nc)) if nr < rows && nc < cols => Some((nr, nc)),
                        _ => None,
                    };
                    match coords {
                        Some(pos) => neighbours[side.index()] = Some(pos),
                        None => border |= 1 << side.index(),
                    }
                }
                cells[(r, c)] = CellConstraints { border, neighbours };
            }
        }

        Self { cells }
    }

    /// Constraints of the cell at `(r, c)`.
    pub fn at(&self, r: usize, c: usize) -> &CellConstraints {
        &self.cells[(r, c)]
    }
}
