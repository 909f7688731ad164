use crate::board::Board;
use crate::constraints::ConstraintGrid;
use crate::tile::{ALL_SIDES, BORDER};

/// Fast local edge-compatibility test for a candidate at a position.
#[derive(Default)]
pub struct FitsChecker {
    checks: u64,
}

impl FitsChecker {
    /// A fresh checker with a zeroed counter.
    pub fn new() -> Self {
        Self::default()
    }

    /// True iff placing `edges` at `(r, c)` keeps the board locally legal:
    /// border sides carry label 0, interior sides carry non-zero labels
    /// even when the neighbouring cell is still empty, and any already
    /// placed neighbour presents the same label on the shared edge.
    pub fn fits(
        &mut self,
        board: &Board,
        constraints: &ConstraintGrid,
        r: usize,
        c: usize,
        edges: [u16; 4],
    ) -> bool {
        self.checks += 1;
        let cell = constraints.at(r, c);

        for side in ALL_SIDES {
            let edge = edges[side.index()];
            match cell.neighbour(side) {
                None => {
                    if edge != BORDER {
                        return false;
                    }
                }
                Some((nr, nc)) => {
                    if edge == BORDER {
                        return false;
                    }
                    if let Some(neighbour) = board.get(nr, nc) {
                        if neighbour.edges()[side.opposite().index()] != edge {
                            return false;
                        }
                    }
                }
            }
        }
        true
    }

    /// Number of fit checks performed so far.
    pub fn checks(&self) -> u64 {
        self.checks
    }
}
