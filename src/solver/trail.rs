/// One committed placement on the search path.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TrailEntry {
    row: usize,
    col: usize,
    tile: u16,
    rotation: u8,
    undo_from: usize,
}

impl TrailEntry {
    /// Row of the placement.
    pub fn row(&self) -> usize {
        self.row
    }

    /// Column of the placement.
    pub fn col(&self) -> usize {
        self.col
    }

    /// Id of the placed tile.
    pub fn tile(&self) -> u16 {
        self.tile
    }

    /// Rotation of the placed tile.
    pub fn rotation(&self) -> u8 {
        self.rotation
    }
}

#[derive(Clone, Copy, Debug)]
struct UndoRecord {
    row: u32,
    col: u32,
    entry: u32,
}

/// Ordered log of placements plus the domain-undo deltas needed to roll
/// each one back exactly.
///
/// Every placement opens a frame; all domain removals caused by that
/// placement (used-tile exclusion and propagation prunes) are logged on the
/// open frame and restored in reverse order when the frame is popped.
#[derive(Default)]
pub struct Trail {
    entries: Vec<TrailEntry>,
    undo: Vec<UndoRecord>,
}

impl Trail {
    /// An empty trail.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of placements on the trail.
    pub fn depth(&self) -> usize {
        self.entries.len()
    }

    /// Is the trail empty?
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// The placements in placement order.
    pub fn entries(&self) -> &[TrailEntry] {
        &self.entries
    }

    /// Open a frame for a fresh placement.
    pub fn begin(&mut self, row: usize, col: usize, tile: u16, rotation: u8) {
        self.entries.push(TrailEntry {
            row,
            col,
            tile,
            rotation,
            undo_from: self.undo.len(),
        });
    }

    /// Log a domain removal on the open frame.
    pub fn log_removal(&mut self, row: usize, col: usize, entry: usize) {
        debug_assert!(!self.entries.is_empty(), "No open frame");
        self.undo.push(UndoRecord {
            row: row as u32,
            col: col as u32,
            entry: entry as u32,
        });
    }

    /// Pop the newest frame, feeding its recorded removals to `restore` in
    /// reverse order of recording. Returns the popped placement.
    pub fn pop_frame(
        &mut self,
        mut restore: impl FnMut(usize, usize, usize),
    ) -> Option<TrailEntry> {
        let frame = self.entries.pop()?;
        for undo in self.undo.drain(frame.undo_from..).rev() {
            restore(undo.row as usize, undo.col as usize, undo.entry as usize);
        }
        Some(frame)
    }
}
