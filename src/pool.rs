use std::path::Path;

use crate::error::SolveError;
use crate::tile::Tile;

/// A validated pool of tiles together with the board dimensions they fill.
///
/// The text format is one tile per line, whitespace-separated:
/// `id N E S W`, with ids dense in 1..=P. Lines starting with `#` are
/// comments. An optional `dims R C` line before the first tile embeds the
/// board dimensions in the file itself.
#[derive(Clone, Debug)]
pub struct TilePool {
    tiles: Vec<Tile>,
    rows: usize,
    cols: usize,
}

impl TilePool {
    /// Build a pool from already-constructed tiles.
    ///
    /// # Errors
    ///
    /// Returns `InvalidPool` when ids are not dense in 1..=P or when
    /// P does not equal `rows * cols`.
    pub fn new(tiles: Vec<Tile>, rows: usize, cols: usize) -> Result<Self, SolveError> {
        validate(&tiles, rows, cols)?;
        let mut tiles = tiles;
        tiles.sort_by_key(Tile::id);
        Ok(Self { tiles, rows, cols })
    }

    /// Parse the pool text format.
    ///
    /// `dims` supplies the board dimensions when the file carries no
    /// `dims` header; when both are present they must agree.
    ///
    /// # Errors
    ///
    /// Returns `InvalidPool` on any structural or consistency failure.
    pub fn parse(text: &str, dims: Option<(usize, usize)>) -> Result<Self, SolveError> {
        let mut header_dims: Option<(usize, usize)> = None;
        let mut tiles = Vec::new();

        for (line_no, raw) in text.lines().enumerate() {
            let line = raw.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }

            let fields: Vec<&str> = line.split_whitespace().collect();
            if fields[0] == "dims" {
                if !tiles.is_empty() || header_dims.is_some() {
                    return Err(invalid(line_no, "stray dims line"));
                }
                if fields.len() != 3 {
                    return Err(invalid(line_no, "dims line needs two values"));
                }
                let r = parse_field::<usize>(fields[1], line_no, "rows")?;
                let c = parse_field::<usize>(fields[2], line_no, "cols")?;
                header_dims = Some((r, c));
                continue;
            }

            if fields.len() != 5 {
                return Err(invalid(
                    line_no,
                    &format!("expected `id N E S W`, got {} fields", fields.len()),
                ));
            }
            let id = parse_field::<u16>(fields[0], line_no, "id")?;
            if id == 0 {
                return Err(invalid(line_no, "tile ids start at 1"));
            }
            let mut edges = [0u16; 4];
            for (slot, field) in edges.iter_mut().zip(&fields[1..]) {
                *slot = parse_field::<u16>(field, line_no, "edge")?;
            }
            tiles.push(Tile::new(id, edges));
        }

        if tiles.is_empty() {
            return Err(SolveError::InvalidPool("no tiles in pool".into()));
        }

        let (rows, cols) = match (header_dims, dims) {
            (Some(h), Some(d)) if h != d => {
                return Err(SolveError::InvalidPool(format!(
                    "header dims {}x{} disagree with requested {}x{}",
                    h.0, h.1, d.0, d.1
                )));
            }
            (Some(h), _) => h,
            (None, Some(d)) => d,
            (None, None) => square_dims(tiles.len())?,
        };

        Self::new(tiles, rows, cols)
    }

    /// Load and parse a pool file.
    ///
    /// # Errors
    ///
    /// Returns `Io` when the file cannot be read and `InvalidPool` when it
    /// cannot be parsed.
    pub fn load(path: &Path, dims: Option<(usize, usize)>) -> Result<Self, SolveError> {
        let text = std::fs::read_to_string(path)?;
        Self::parse(&text, dims)
    }

    /// The tiles, sorted by id.
    pub fn tiles(&self) -> &[Tile] {
        &self.tiles
    }

    /// Board rows.
    pub fn rows(&self) -> usize {
        self.rows
    }

    /// Board columns.
    pub fn cols(&self) -> usize {
        self.cols
    }

    /// Number of tiles, equal to `rows * cols`.
    pub fn tile_count(&self) -> usize {
        self.tiles.len()
    }
}

fn invalid(line_no: usize, message: &str) -> SolveError {
    SolveError::InvalidPool(format!("line {}: {message}", line_no + 1))
}

fn parse_field<T: std::str::FromStr>(
    field: &str,
    line_no: usize,
    what: &str,
) -> Result<T, SolveError> {
    field
        .parse()
        .map_err(|_| invalid(line_no, &format!("unparseable {what} `{field}`")))
}

fn square_dims(count: usize) -> Result<(usize, usize), SolveError> {
    let side = (count as f64).sqrt().round() as usize;
    if side * side == count {
        Ok((side, side))
    } else {
        Err(SolveError::InvalidPool(format!(
            "{count} tiles with no dims given and no square board matches"
        )))
    }
}

fn validate(tiles: &[Tile], rows: usize, cols: usize) -> Result<(), SolveError> {
    if rows == 0 || cols == 0 {
        return Err(SolveError::InvalidPool("board dimensions must be positive".into()));
    }
    if tiles.len() != rows * cols {
        return Err(SolveError::InvalidPool(format!(
            "{} tiles cannot fill a {rows}x{cols} board",
            tiles.len()
        )));
    }

    let count = tiles.len();
    let mut seen = vec![false; count + 1];
    for tile in tiles {
        let id = usize::from(tile.id());
        if id > count {
            return Err(SolveError::InvalidPool(format!(
                "tile id {id} exceeds pool size {count}"
            )));
        }
        if seen[id] {
            return Err(SolveError::InvalidPool(format!("duplicate tile id {id}")));
        }
        seen[id] = true;
    }
    // Dense ids plus no duplicates implies every id in 1..=P is present.
    Ok(())
}
