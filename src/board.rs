use ndarray::Array2;
use std::fmt::{Display, Formatter};

use crate::tile::{ALL_SIDES, BORDER, Tile};

/// A tile installed at a cell: id, rotation, and the edges it presents.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Placement {
    tile: u16,
    rotation: u8,
    edges: [u16; 4],
}

impl Placement {
    /// Construct a placement of tile `tile` at `rotation`, presenting `edges`.
    pub fn new(tile: u16, rotation: u8, edges: [u16; 4]) -> Self {
        debug_assert!(tile >= 1);
        debug_assert!(rotation < 4);
        Self {
            tile,
            rotation,
            edges,
        }
    }

    /// Id of the placed tile.
    pub fn tile(&self) -> u16 {
        self.tile
    }

    /// Rotation of the placed tile.
    pub fn rotation(&self) -> u8 {
        self.rotation
    }

    /// The rotated edges the placement presents, in (N, E, S, W) order.
    pub fn edges(&self) -> [u16; 4] {
        self.edges
    }
}

/// R×C grid of optional placements.
///
/// Invariants: at most one placement per cell, each tile id at most once
/// across the board, shared edges of adjacent placements equal, border-side
/// edges zero. The search engine maintains these through its
/// place/propagate/recurse/unpropagate/remove discipline; `validate` checks
/// them wholesale for decoded checkpoints and tests.
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct Board {
    cells: Array2<Option<Placement>>,
    filled: usize,
}

impl Board {
    /// Create an empty R×C board.
    pub fn new(rows: usize, cols: usize) -> Self {
        debug_assert!(rows > 0 && cols > 0);
        Self {
            cells: Array2::from_elem((rows, cols), None),
            filled: 0,
        }
    }

    /// Board dimensions as (rows, cols).
    pub fn dims(&self) -> (usize, usize) {
        self.cells.dim()
    }

    /// Number of rows.
    pub fn rows(&self) -> usize {
        self.cells.dim().0
    }

    /// Number of columns.
    pub fn cols(&self) -> usize {
        self.cells.dim().1
    }

    /// The placement at `(r, c)`, if any.
    pub fn get(&self, r: usize, c: usize) -> Option<Placement> {
        self.cells[(r, c)]
    }

    /// Is the cell at `(r, c)` empty?
    pub fn is_empty(&self, r: usize, c: usize) -> bool {
        self.cells[(r, c)].is_none()
    }

    /// Number of filled cells.
    pub fn filled(&self) -> usize {
        self.filled
    }

    /// Is every cell filled?
    pub fn is_full(&self) -> bool {
        self.filled == self.cells.len()
    }

    /// Install a placement at an empty cell.
    pub fn place(&mut self, r: usize, c: usize, placement: Placement) {
        debug_assert!(self.cells[(r, c)].is_none(), "Cell already filled");
        self.cells[(r, c)] = Some(placement);
        self.filled += 1;
    }

    /// Withdraw the placement at a filled cell.
    pub fn remove(&mut self, r: usize, c: usize) -> Placement {
        let placement = self.cells[(r, c)].take().expect("Cell already empty");
        self.filled -= 1;
        placement
    }

    /// Check every board invariant against the pool the board was built for.
    ///
    /// # Errors
    ///
    /// Returns a description of the first violated invariant.
    pub fn validate(&self, tiles: &[Tile]) -> Result<(), String> {
        let (rows, cols) = self.dims();
        let mut used = vec![false; tiles.len() + 1];
        let mut filled = 0;

        for r in 0..rows {
            for c in 0..cols {
                let Some(placement) = self.cells[(r, c)] else {
                    continue;
                };
                filled += 1;

                let id = usize::from(placement.tile());
                if id == 0 || id > tiles.len() {
                    return Err(format!("cell ({r},{c}): unknown tile id {id}"));
                }
                if used[id] {
                    return Err(format!("tile {id} placed more than once"));
                }
                used[id] = true;

                let expected = tiles[id - 1].rotated(placement.rotation());
                if expected != placement.edges() {
                    return Err(format!(
                        "cell ({r},{c}): edges {:?} do not match tile {id} at rotation {}",
                        placement.edges(),
                        placement.rotation()
                    ));
                }

                for side in ALL_SIDES {
                    let edge = placement.edges()[side.index()];
                    let (dr, dc) = side.delta();
                    let neighbour = match (r.checked_add_signed(dr), c.checked_add_signed(dc)) {
                        (Some(nr), Some(nc)) if nr < rows && nc < cols => Some((nr, nc)),
                        _ => None,
                    };
                    match neighbour {
                        None => {
                            if edge != BORDER {
                                return Err(format!(
                                    "cell ({r},{c}): {side} side faces the border with label {edge}"
                                ));
                            }
                        }
                        Some((nr, nc)) => {
                            if edge == BORDER {
                                return Err(format!(
                                    "cell ({r},{c}): {side} side is interior with label 0"
                                ));
                            }
                            if let Some(other) = self.cells[(nr, nc)] {
                                let facing = other.edges()[side.opposite().index()];
                                if facing != edge {
                                    return Err(format!(
                                        "cells ({r},{c}) and ({nr},{nc}): edges {edge} vs {facing}"
                                    ));
                                }
                            }
                        }
                    }
                }
            }
        }

        if filled != self.filled {
            return Err(format!(
                "filled count {} disagrees with grid ({filled})",
                self.filled
            ));
        }
        Ok(())
    }
}

impl Display for Board {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        let width = self
            .cells
            .iter()
            .flatten()
            .map(|p| p.tile().to_string().len())
            .max()
            .unwrap_or(1);
        for row in self.cells.rows() {
            for cell in row.iter() {
                match cell {
                    Some(p) => write!(f, "{:>width$}/{} ", p.tile(), p.rotation())?,
                    None => write!(f, "{:>width$}.. ", "")?,
                }
            }
            writeln!(f)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tiles() -> Vec<Tile> {
        // A solved 2x2: internal vertical edges 1, internal horizontal 2 and 3.
        vec![
            Tile::new(1, [0, 1, 2, 0]),
            Tile::new(2, [0, 0, 3, 1]),
            Tile::new(3, [2, 1, 0, 0]),
            Tile::new(4, [3, 0, 0, 1]),
        ]
    }

    fn solved_board(tiles: &[Tile]) -> Board {
        let mut board = Board::new(2, 2);
        for (i, (r, c)) in [(0, 0), (0, 1), (1, 0), (1, 1)].into_iter().enumerate() {
            board.place(r, c, Placement::new(tiles[i].id(), 0, tiles[i].rotated(0)));
        }
        board
    }

    #[test]
    fn full_valid_board_passes() {
        let tiles = tiles();
        let board = solved_board(&tiles);
        assert!(board.is_full());
        board.validate(&tiles).unwrap();
    }

    #[test]
    fn partial_board_passes() {
        let tiles = tiles();
        let mut board = solved_board(&tiles);
        board.remove(1, 1);
        assert_eq!(board.filled(), 3);
        board.validate(&tiles).unwrap();
    }

    #[test]
    fn duplicate_tile_fails() {
        let tiles = tiles();
        let mut board = solved_board(&tiles);
        board.remove(1, 1);
        board.place(1, 1, Placement::new(1, 0, tiles[0].rotated(0)));
        assert!(board.validate(&tiles).is_err());
    }

    #[test]
    fn mismatched_edge_fails() {
        let tiles = tiles();
        let mut board = solved_board(&tiles);
        board.remove(0, 1);
        // Tile 2 rotated once no longer matches its west neighbour.
        board.place(0, 1, Placement::new(2, 1, tiles[1].rotated(1)));
        assert!(board.validate(&tiles).is_err());
    }

    #[test]
    fn border_label_must_be_zero() {
        let tiles = vec![Tile::new(1, [5, 0, 0, 0])];
        let mut board = Board::new(1, 1);
        board.place(0, 0, Placement::new(1, 0, tiles[0].rotated(0)));
        assert!(board.validate(&tiles).is_err());
    }
}
