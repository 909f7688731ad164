//! Checkpoint persistence: byte-stable files, backup rotation, and the
//! never-fatal write path.

use edgematch::{CheckpointRecord, CheckpointStore, DepthCursor, PlacementStep};

fn record(timestamp_ms: u64, placements: usize) -> CheckpointRecord {
    CheckpointRecord {
        rows: 4,
        cols: 4,
        tile_count: 16,
        elapsed_ms: timestamp_ms / 1000,
        timestamp_ms,
        placements: (0..placements)
            .map(|i| PlacementStep {
                row: i / 4,
                col: i % 4,
                tile: (i + 1) as u16,
                rotation: (i % 4) as u8,
            })
            .collect(),
        cursors: vec![DepthCursor { depth: 0, tried: 2 }],
    }
}

#[test]
fn files_round_trip_byte_identically() {
    let saves = tempfile::tempdir().unwrap();
    let store = CheckpointStore::new(saves.path(), "demo");

    let record = record(1_700_000_000_000, 5);
    store.save_current(&record);

    let text = std::fs::read_to_string(store.current_path()).unwrap();
    let decoded = CheckpointRecord::decode(&text).unwrap();
    assert_eq!(decoded, record);
    assert_eq!(decoded.encode(), text);
}

#[test]
fn current_rotates_into_timestamped_archives() {
    let saves = tempfile::tempdir().unwrap();
    let store = CheckpointStore::new(saves.path(), "demo").with_keep(2);

    for i in 0..5u64 {
        store.save_current(&record(1_700_000_000_000 + i * 1000, i as usize));
    }

    // Latest snapshot stays current; older ones rotate out, pruned to two.
    let newest = store.load_current().unwrap().unwrap();
    assert_eq!(newest.placements.len(), 4);

    let archives: Vec<String> = std::fs::read_dir(saves.path())
        .unwrap()
        .filter_map(Result::ok)
        .map(|entry| entry.file_name().to_string_lossy().into_owned())
        .filter(|name| name.starts_with("checkpoint_demo_"))
        .collect();
    assert_eq!(archives.len(), 2);
}

#[test]
fn best_is_written_alongside_current() {
    let saves = tempfile::tempdir().unwrap();
    let store = CheckpointStore::new(saves.path(), "demo");

    store.save_best(&record(1_700_000_000_000, 7));
    let text = std::fs::read_to_string(store.best_path()).unwrap();
    assert_eq!(
        CheckpointRecord::decode(&text).unwrap().placements.len(),
        7
    );
    assert!(!store.current_path().exists());
}

#[test]
fn missing_current_resumes_nothing() {
    let saves = tempfile::tempdir().unwrap();
    let store = CheckpointStore::new(saves.path(), "demo");
    assert!(store.load_current().unwrap().is_none());
}

#[test]
fn corrupt_current_is_an_invalid_checkpoint() {
    let saves = tempfile::tempdir().unwrap();
    let store = CheckpointStore::new(saves.path(), "demo");
    std::fs::write(store.current_path(), "not a checkpoint\n").unwrap();
    assert!(matches!(
        store.load_current(),
        Err(edgematch::SolveError::InvalidCheckpoint(_))
    ));
}

#[cfg(unix)]
#[test]
fn unwritable_directory_never_panics() {
    use std::os::unix::fs::PermissionsExt;

    let saves = tempfile::tempdir().unwrap();
    let dir = saves.path().join("frozen");
    std::fs::create_dir(&dir).unwrap();
    std::fs::set_permissions(&dir, std::fs::Permissions::from_mode(0o555)).unwrap();

    let store = CheckpointStore::new(&dir, "demo");
    // Logged and retried, never propagated.
    store.save_current(&record(1_700_000_000_000, 3));
    store.save_best(&record(1_700_000_000_000, 3));

    std::fs::set_permissions(&dir, std::fs::Permissions::from_mode(0o755)).unwrap();
    assert!(!store.current_path().exists());
}
