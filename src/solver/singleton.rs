use crate::board::Board;
use crate::domain::DomainGrid;

/// Find an empty cell whose domain holds exactly one `(tile, rotation)`
/// entry, scanning row-major. Returns `(row, col, entry)`.
///
/// The engine commits the returned placement like any other (it lands on
/// the trail and rolls back in reverse order) and calls back here until no
/// singleton remains or a dead end is reached.
pub fn next_singleton(board: &Board, domains: &DomainGrid) -> Option<(usize, usize, usize)> {
    let (rows, cols) = board.dims();
    for r in 0..rows {
        for c in 0..cols {
            if !board.is_empty(r, c) {
                continue;
            }
            if let Some(entry) = domains.sole_entry(r, c) {
                return Some((r, c, entry));
            }
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::TilePool;
    use crate::puzzle::Puzzle;
    use crate::rules::entry_of;
    use crate::tile::Tile;

    #[test]
    fn reports_first_singleton_row_major() {
        // 1x2: each cell has exactly one statically valid entry.
        let tiles = vec![Tile::new(1, [0, 1, 0, 0]), Tile::new(2, [0, 0, 0, 1])];
        let puzzle = Puzzle::compile("t", TilePool::new(tiles, 1, 2).unwrap());
        let board = Board::new(1, 2);
        let mut domains = DomainGrid::initialize(&puzzle);

        // Both cells start with two entries; trim (0,1) down to one.
        assert_eq!(domains.size(0, 1), 2);
        assert!(domains.remove(0, 1, entry_of(0, 2)));
        assert_eq!(
            next_singleton(&board, &domains),
            Some((0, 1, entry_of(1, 0)))
        );

        // Trimming (0,0) as well makes it win the row-major scan.
        assert!(domains.remove(0, 0, entry_of(1, 2)));
        assert_eq!(
            next_singleton(&board, &domains),
            Some((0, 0, entry_of(0, 0)))
        );
    }
}
