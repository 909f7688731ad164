use std::fmt::Write as _;
use std::path::{Path, PathBuf};

use tracing::{error, warn};

use crate::board::Board;
use crate::error::SolveError;
use crate::puzzle::Puzzle;

const MAGIC: &str = "# edgematch checkpoint v1";

/// One placed cell, in placement order.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PlacementStep {
    /// Row of the cell.
    pub row: usize,
    /// Column of the cell.
    pub col: usize,
    /// Id of the placed tile.
    pub tile: u16,
    /// Rotation of the placed tile.
    pub rotation: u8,
}

/// Candidate cursor at one recorded depth: how many candidates the node at
/// that trail depth had already tried.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DepthCursor {
    /// Trail depth of the node.
    pub depth: usize,
    /// Index of the last candidate tried there (1-based count).
    pub tried: usize,
}

/// A stable partial configuration plus the exploration trail needed to
/// resume search where it left off.
///
/// A record always describes a board satisfying every board invariant;
/// never a mid-rotation, never a speculative placement.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CheckpointRecord {
    /// Board rows.
    pub rows: usize,
    /// Board columns.
    pub cols: usize,
    /// Pool size, equal to `rows * cols`.
    pub tile_count: usize,
    /// Cumulative compute time in milliseconds, across resumes.
    pub elapsed_ms: u64,
    /// Wall-clock timestamp of the snapshot, in milliseconds since the
    /// Unix epoch.
    pub timestamp_ms: u64,
    /// Placements in placement order.
    pub placements: Vec<PlacementStep>,
    /// Candidate cursors for the recorded shallow depths.
    pub cursors: Vec<DepthCursor>,
}

impl CheckpointRecord {
    /// Serialize to the plain-text checkpoint format.
    ///
    /// The format is byte-stable: encoding a decoded record reproduces the
    /// input exactly.
    pub fn encode(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "{MAGIC}");
        let _ = writeln!(
            out,
            "header {} {} {} {} {}",
            self.rows, self.cols, self.tile_count, self.elapsed_ms, self.timestamp_ms
        );
        let _ = writeln!(out, "placements {}", self.placements.len());
        for step in &self.placements {
            let _ = writeln!(out, "{} {} {} {}", step.row, step.col, step.tile, step.rotation);
        }
        let _ = writeln!(out, "cursors {}", self.cursors.len());
        for cursor in &self.cursors {
            let _ = writeln!(out, "{} {}", cursor.depth, cursor.tried);
        }
        out
    }

    /// Parse the plain-text checkpoint format.
    ///
    /// # Errors
    ///
    /// Returns `InvalidCheckpoint` on any structural failure.
    pub fn decode(text: &str) -> Result<Self, SolveError> {
        let mut lines = text.lines();

        if lines.next() != Some(MAGIC) {
            return Err(invalid("missing magic line"));
        }

        let header = section(&mut lines, "header")?;
        if header.len() != 5 {
            return Err(invalid("header needs five values"));
        }
        let rows = parse(&header[0], "rows")?;
        let cols = parse(&header[1], "cols")?;
        let tile_count = parse(&header[2], "tile count")?;
        let elapsed_ms = parse(&header[3], "elapsed time")?;
        let timestamp_ms = parse(&header[4], "timestamp")?;

        let count = section(&mut lines, "placements")?;
        if count.len() != 1 {
            return Err(invalid("placements header needs one value"));
        }
        let count: usize = parse(&count[0], "placement count")?;
        let mut placements = Vec::with_capacity(count);
        for _ in 0..count {
            let fields = row(&mut lines, 4, "placement")?;
            placements.push(PlacementStep {
                row: parse(&fields[0], "row")?,
                col: parse(&fields[1], "col")?,
                tile: parse(&fields[2], "tile")?,
                rotation: parse(&fields[3], "rotation")?,
            });
        }

        let count = section(&mut lines, "cursors")?;
        if count.len() != 1 {
            return Err(invalid("cursors header needs one value"));
        }
        let count: usize = parse(&count[0], "cursor count")?;
        let mut cursors = Vec::with_capacity(count);
        for _ in 0..count {
            let fields = row(&mut lines, 2, "cursor")?;
            cursors.push(DepthCursor {
                depth: parse(&fields[0], "depth")?,
                tried: parse(&fields[1], "tried")?,
            });
        }

        if lines.any(|line| !line.trim().is_empty()) {
            return Err(invalid("trailing content"));
        }

        Ok(Self {
            rows,
            cols,
            tile_count,
            elapsed_ms,
            timestamp_ms,
            placements,
            cursors,
        })
    }

    /// Rebuild the board this record describes and check it against the
    /// pool and every board invariant.
    ///
    /// # Errors
    ///
    /// Returns `InvalidCheckpoint` when the record is inconsistent with the
    /// puzzle or describes an illegal board.
    pub fn board(&self, puzzle: &Puzzle) -> Result<Board, SolveError> {
        if (self.rows, self.cols) != (puzzle.rows(), puzzle.cols()) {
            return Err(invalid(&format!(
                "{}x{} board does not match the {}x{} pool",
                self.rows,
                self.cols,
                puzzle.rows(),
                puzzle.cols()
            )));
        }
        if self.tile_count != puzzle.cell_count() {
            return Err(invalid("tile count does not match the pool"));
        }

        let mut board = Board::new(self.rows, self.cols);
        for step in &self.placements {
            if step.row >= self.rows || step.col >= self.cols {
                return Err(invalid(&format!(
                    "placement at ({}, {}) is off the board",
                    step.row, step.col
                )));
            }
            if step.tile == 0 || usize::from(step.tile) > puzzle.cell_count() {
                return Err(invalid(&format!("unknown tile id {}", step.tile)));
            }
            if step.rotation > 3 {
                return Err(invalid(&format!("rotation {} out of range", step.rotation)));
            }
            if board.get(step.row, step.col).is_some() {
                return Err(invalid(&format!(
                    "cell ({}, {}) placed twice",
                    step.row, step.col
                )));
            }
            let tile = puzzle.tile_by_id(step.tile);
            board.place(
                step.row,
                step.col,
                crate::board::Placement::new(step.tile, step.rotation, tile.rotated(step.rotation)),
            );
        }

        board
            .validate(puzzle.tiles())
            .map_err(|reason| invalid(&reason))?;
        Ok(board)
    }
}

fn invalid(message: &str) -> SolveError {
    SolveError::InvalidCheckpoint(message.into())
}

fn parse<T: std::str::FromStr>(field: &str, what: &str) -> Result<T, SolveError> {
    field
        .parse()
        .map_err(|_| invalid(&format!("unparseable {what} `{field}`")))
}

fn section<'a>(
    lines: &mut impl Iterator<Item = &'a str>,
    keyword: &str,
) -> Result<Vec<String>, SolveError> {
    let line = lines
        .next()
        .ok_or_else(|| invalid(&format!("missing {keyword} section")))?;
    let mut fields = line.split_whitespace();
    if fields.next() != Some(keyword) {
        return Err(invalid(&format!("expected {keyword} section, got `{line}`")));
    }
    Ok(fields.map(str::to_owned).collect())
}

fn row<'a>(
    lines: &mut impl Iterator<Item = &'a str>,
    arity: usize,
    what: &str,
) -> Result<Vec<String>, SolveError> {
    let line = lines
        .next()
        .ok_or_else(|| invalid(&format!("truncated {what} list")))?;
    let fields: Vec<String> = line.split_whitespace().map(str::to_owned).collect();
    if fields.len() != arity {
        return Err(invalid(&format!(
            "{what} line needs {arity} values, got {}",
            fields.len()
        )));
    }
    Ok(fields)
}

/// On-disk checkpoint store with backup rotation.
///
/// The newest stable snapshot lives at `current_<id>.txt` and the deepest
/// one at `best_<id>.txt`; earlier snapshots rotate into timestamped
/// archives pruned to the most recent `keep`. Write failures are logged and
/// retried once under an alternate name; they never stop the search.
pub struct CheckpointStore {
    dir: PathBuf,
    id: String,
    keep: usize,
}

impl CheckpointStore {
    /// Archives kept by default.
    pub const DEFAULT_KEEP: usize = 5;

    /// A store for puzzle `id` under `dir`.
    pub fn new(dir: impl Into<PathBuf>, id: impl Into<String>) -> Self {
        Self {
            dir: dir.into(),
            id: id.into(),
            keep: Self::DEFAULT_KEEP,
        }
    }

    /// Override the number of archives kept.
    pub fn with_keep(mut self, keep: usize) -> Self {
        self.keep = keep;
        self
    }

    /// Path of the newest stable snapshot.
    pub fn current_path(&self) -> PathBuf {
        self.dir.join(format!("current_{}.txt", self.id))
    }

    /// Path of the deepest snapshot seen.
    pub fn best_path(&self) -> PathBuf {
        self.dir.join(format!("best_{}.txt", self.id))
    }

    fn archive_path(&self, timestamp_ms: u64) -> PathBuf {
        self.dir
            .join(format!("checkpoint_{}_{timestamp_ms:013}.txt", self.id))
    }

    /// Write the newest snapshot, rotating the previous one into the
    /// archives and pruning old archives.
    pub fn save_current(&self, record: &CheckpointRecord) {
        if let Err(err) = std::fs::create_dir_all(&self.dir) {
            warn!("cannot create checkpoint directory {}: {err}", self.dir.display());
        }

        let current = self.current_path();
        if current.exists() {
            let stamp = std::fs::read_to_string(&current)
                .ok()
                .and_then(|text| CheckpointRecord::decode(&text).ok())
                .map_or_else(|| record.timestamp_ms.saturating_sub(1), |old| old.timestamp_ms);
            let archive = self.archive_path(stamp);
            if let Err(err) = std::fs::rename(&current, &archive) {
                warn!("cannot archive checkpoint {}: {err}", current.display());
            }
        }

        self.write_with_retry(&current, &record.encode());
        self.prune_archives();
    }

    /// Write the deepest snapshot seen.
    pub fn save_best(&self, record: &CheckpointRecord) {
        if let Err(err) = std::fs::create_dir_all(&self.dir) {
            warn!("cannot create checkpoint directory {}: {err}", self.dir.display());
        }
        self.write_with_retry(&self.best_path(), &record.encode());
    }

    /// Load the newest snapshot, if one exists.
    ///
    /// # Errors
    ///
    /// Returns `Io` when the file cannot be read and `InvalidCheckpoint`
    /// when it cannot be parsed.
    pub fn load_current(&self) -> Result<Option<CheckpointRecord>, SolveError> {
        let path = self.current_path();
        if !path.exists() {
            return Ok(None);
        }
        let text = std::fs::read_to_string(&path)?;
        CheckpointRecord::decode(&text).map(Some)
    }

    fn write_with_retry(&self, path: &Path, content: &str) {
        if let Err(err) = std::fs::write(path, content) {
            warn!("checkpoint write to {} failed: {err}, retrying", path.display());
            let retry = path.with_extension("retry.txt");
            if let Err(err) = std::fs::write(&retry, content) {
                error!("checkpoint retry to {} failed: {err}", retry.display());
            }
        }
    }

    fn prune_archives(&self) {
        let prefix = format!("checkpoint_{}_", self.id);
        let Ok(entries) = std::fs::read_dir(&self.dir) else {
            return;
        };
        let mut archives: Vec<PathBuf> = entries
            .filter_map(Result::ok)
            .map(|entry| entry.path())
            .filter(|path| {
                path.file_name()
                    .and_then(|name| name.to_str())
                    .is_some_and(|name| name.starts_with(&prefix) && name.ends_with(".txt"))
            })
            .collect();
        // Timestamps are zero-padded, so name order is age order.
        archives.sort();
        while archives.len() > self.keep {
            let oldest = archives.remove(0);
            if let Err(err) = std::fs::remove_file(&oldest) {
                warn!("cannot prune archive {}: {err}", oldest.display());
                break;
            }
        }
    }
}
