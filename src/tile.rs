use std::fmt::{Display, Formatter};

/// Edge label reserved for sides that touch the outer border.
pub const BORDER: u16 = 0;

/// One of the four sides of a tile or cell, in the fixed (N, E, S, W) order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Side {
    /// Towards row 0.
    North,
    /// Towards the last column.
    East,
    /// Towards the last row.
    South,
    /// Towards column 0.
    West,
}

/// All four sides in edge order.
pub const ALL_SIDES: [Side; 4] = [Side::North, Side::East, Side::South, Side::West];

impl Side {
    /// Position of this side within an edge quadruple.
    pub fn index(self) -> usize {
        match self {
            Side::North => 0,
            Side::East => 1,
            Side::South => 2,
            Side::West => 3,
        }
    }

    /// The side facing this one from the neighbouring cell.
    pub fn opposite(self) -> Self {
        match self {
            Side::North => Side::South,
            Side::East => Side::West,
            Side::South => Side::North,
            Side::West => Side::East,
        }
    }

    /// Row/column offset of the neighbour across this side.
    pub fn delta(self) -> (isize, isize) {
        match self {
            Side::North => (-1, 0),
            Side::East => (0, 1),
            Side::South => (1, 0),
            Side::West => (0, -1),
        }
    }
}

impl Display for Side {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        let name = match self {
            Side::North => "north",
            Side::East => "east",
            Side::South => "south",
            Side::West => "west",
        };
        write!(f, "{name}")
    }
}

/// Rotate an edge quadruple `k` quarter turns clockwise.
///
/// A tile with edges (N, E, S, W) at rotation 1 presents (W, N, E, S).
pub fn rotate_edges(edges: [u16; 4], k: u8) -> [u16; 4] {
    let k = usize::from(k % 4);
    std::array::from_fn(|i| edges[(i + 4 - k) % 4])
}

/// A square puzzle tile: a unique id, four labelled edges in (N, E, S, W)
/// order, and the precomputed table of its four rotated edge quadruples.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Tile {
    /// Identifier, dense in 1..=P for a pool of P tiles.
    id: u16,
    /// Edge labels at rotation 0.
    edges: [u16; 4],
    /// Rotation table; entry `k` holds the edges after `k` clockwise turns.
    rotations: [[u16; 4]; 4],
}

impl Tile {
    /// Construct a new `Tile` with a given id and base edges.
    pub fn new(id: u16, edges: [u16; 4]) -> Self {
        debug_assert!(id >= 1, "Tile ids start at 1");

        let rotations = std::array::from_fn(|k| rotate_edges(edges, k as u8));
        Self {
            id,
            edges,
            rotations,
        }
    }

    /// Get the `Tile`'s id.
    pub fn id(&self) -> u16 {
        self.id
    }

    /// Get the `Tile`'s edges at rotation 0.
    pub fn edges(&self) -> [u16; 4] {
        self.edges
    }

    /// Get the `Tile`'s edges after `rotation` clockwise quarter turns.
    pub fn rotated(&self, rotation: u8) -> [u16; 4] {
        debug_assert!(rotation < 4, "Rotations are 0..4");
        self.rotations[usize::from(rotation)]
    }

    /// Count this tile's border (label 0) edges.
    pub fn border_edges(&self) -> usize {
        self.edges.iter().filter(|&&e| e == BORDER).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use quickcheck_macros::quickcheck;

    #[test]
    fn rotation_one_presents_wnes() {
        let tile = Tile::new(1, [1, 2, 3, 4]);
        assert_eq!(tile.rotated(0), [1, 2, 3, 4]);
        assert_eq!(tile.rotated(1), [4, 1, 2, 3]);
        assert_eq!(tile.rotated(2), [3, 4, 1, 2]);
        assert_eq!(tile.rotated(3), [2, 3, 4, 1]);
    }

    #[quickcheck]
    fn rotation_law(n: u16, e: u16, s: u16, w: u16, k: u8) -> bool {
        let k = k % 4;
        let edges = [n, e, s, w];
        rotate_edges(rotate_edges(edges, k), 4 - k) == edges
    }

    #[quickcheck]
    fn rotations_compose(n: u16, e: u16, s: u16, w: u16, a: u8, b: u8) -> bool {
        let (a, b) = (a % 4, b % 4);
        let edges = [n, e, s, w];
        rotate_edges(rotate_edges(edges, a), b) == rotate_edges(edges, (a + b) % 4)
    }

    #[test]
    fn opposite_sides_pair_up() {
        for side in ALL_SIDES {
            assert_eq!(side.opposite().opposite(), side);
            let (dr, dc) = side.delta();
            let (or, oc) = side.opposite().delta();
            assert_eq!((dr + or, dc + oc), (0, 0));
        }
    }
}
