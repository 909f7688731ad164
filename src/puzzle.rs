use crate::board::Placement;
use crate::constraints::ConstraintGrid;
use crate::pool::TilePool;
use crate::rules::{EdgeRules, entry_rotation, entry_tile};
use crate::tile::Tile;

/// Immutable per-run data: the tile pool plus everything compiled from it.
///
/// Built once, then shared read-only by every worker.
pub struct Puzzle {
    name: String,
    tiles: Vec<Tile>,
    rows: usize,
    cols: usize,
    rules: EdgeRules,
    constraints: ConstraintGrid,
}

impl Puzzle {
    /// Compile a pool into its per-run lookup structures.
    pub fn compile(name: impl Into<String>, pool: TilePool) -> Self {
        let rows = pool.rows();
        let cols = pool.cols();
        let tiles = pool.tiles().to_vec();
        let rules = EdgeRules::compile(&tiles);
        let constraints = ConstraintGrid::build(rows, cols);
        Self {
            name: name.into(),
            tiles,
            rows,
            cols,
            rules,
            constraints,
        }
    }

    /// Identifier of this puzzle configuration.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The tiles, sorted by id.
    pub fn tiles(&self) -> &[Tile] {
        &self.tiles
    }

    /// The tile with a given id.
    pub fn tile_by_id(&self, id: u16) -> &Tile {
        &self.tiles[usize::from(id) - 1]
    }

    /// Board rows.
    pub fn rows(&self) -> usize {
        self.rows
    }

    /// Board columns.
    pub fn cols(&self) -> usize {
        self.cols
    }

    /// Number of cells (and tiles).
    pub fn cell_count(&self) -> usize {
        self.rows * self.cols
    }

    /// The compiled edge-compatibility rules.
    pub fn rules(&self) -> &EdgeRules {
        &self.rules
    }

    /// The precomputed per-cell constraints.
    pub fn constraints(&self) -> &ConstraintGrid {
        &self.constraints
    }

    /// Materialize a domain entry as a board placement.
    pub fn placement(&self, entry: usize) -> Placement {
        let tile = &self.tiles[entry_tile(entry)];
        let rotation = entry_rotation(entry);
        Placement::new(tile.id(), rotation, tile.rotated(rotation))
    }
}
