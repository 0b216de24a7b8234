//! Tests for Storage backends
//!
//! These tests verify:
//! - Cold start reads as "no database"
//! - Exact snapshot round-trip (memory, JSON file, framed file)
//! - Atomic whole-file replacement
//! - Framed file corruption detection
//! - Close is best-effort and reads keep working

use std::collections::BTreeMap;
use std::fs;
use std::path::PathBuf;
use std::sync::Arc;

use atlasdoc::storage::{
    FileOptions, FrameHeader, FramedStorage, JsonStorage, MemoryStorage, RawTable, Snapshot,
    Storage, HEADER_SIZE,
};
use atlasdoc::{AtlasError, Table};
use serde_json::json;
use tempfile::TempDir;

// =============================================================================
// Helper Functions
// =============================================================================

fn setup_temp_file(name: &str) -> (TempDir, PathBuf) {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join(name);
    (temp_dir, path)
}

fn sample_snapshot() -> Snapshot {
    let mut users = RawTable::new();
    users.insert(
        "1".to_string(),
        json!({"name": "ada", "tags": ["x", "y"], "nested": {"n": 1.5}})
            .as_object()
            .unwrap()
            .clone(),
    );
    users.insert("10".to_string(), json!({}).as_object().unwrap().clone());

    let mut snapshot = BTreeMap::new();
    snapshot.insert("users".to_string(), users);
    snapshot.insert("empty".to_string(), RawTable::new());
    snapshot
}

// =============================================================================
// MemoryStorage Tests
// =============================================================================

#[test]
fn test_memory_starts_empty() {
    let storage = MemoryStorage::new();
    assert!(storage.read().unwrap().is_none());
    assert_eq!(storage.write_count(), 0);
}

#[test]
fn test_memory_round_trip() {
    let storage = MemoryStorage::new();
    storage.write(&sample_snapshot()).unwrap();

    assert_eq!(storage.read().unwrap(), Some(sample_snapshot()));
    assert_eq!(storage.write_count(), 1);
}

#[test]
fn test_memory_read_returns_copy() {
    let storage = MemoryStorage::with_snapshot(sample_snapshot());

    let mut copy = storage.read().unwrap().unwrap();
    copy.clear();

    assert_eq!(storage.read().unwrap(), Some(sample_snapshot()));
}

// =============================================================================
// JsonStorage Tests
// =============================================================================

#[test]
fn test_json_open_creates_file_and_dirs() {
    let (_temp, dir) = setup_temp_file("nested");
    let path = dir.join("deeper").join("db.json");

    let storage = JsonStorage::open(&path, FileOptions::default()).unwrap();

    assert!(path.exists());
    assert_eq!(storage.path(), path.as_path());
    assert!(storage.read().unwrap().is_none());
}

#[test]
fn test_json_open_without_create_dirs_fails() {
    let (_temp, dir) = setup_temp_file("missing");
    let path = dir.join("db.json");
    let options = FileOptions {
        create_dirs: false,
        ..FileOptions::default()
    };

    let err = JsonStorage::open(&path, options).unwrap_err();
    assert!(matches!(err, AtlasError::Io(_)));
}

#[test]
fn test_json_round_trip() {
    let (_temp, path) = setup_temp_file("db.json");
    let storage = JsonStorage::open(&path, FileOptions::default()).unwrap();

    storage.write(&sample_snapshot()).unwrap();

    let reopened = JsonStorage::open(&path, FileOptions::default()).unwrap();
    assert_eq!(reopened.read().unwrap(), Some(sample_snapshot()));
}

#[test]
fn test_json_file_is_plain_json() {
    let (_temp, path) = setup_temp_file("db.json");
    let storage = JsonStorage::open(&path, FileOptions::default()).unwrap();
    storage.write(&sample_snapshot()).unwrap();

    let on_disk: serde_json::Value = serde_json::from_slice(&fs::read(&path).unwrap()).unwrap();
    assert_eq!(on_disk["users"]["1"]["name"], json!("ada"));
    assert_eq!(on_disk["empty"], json!({}));
}

#[test]
fn test_json_pretty_output() {
    let (_temp, path) = setup_temp_file("db.json");
    let options = FileOptions {
        pretty: true,
        ..FileOptions::default()
    };
    let storage = JsonStorage::open(&path, options).unwrap();
    storage.write(&sample_snapshot()).unwrap();

    let text = fs::read_to_string(&path).unwrap();
    assert!(text.contains('\n'));
    assert_eq!(storage.read().unwrap(), Some(sample_snapshot()));
}

#[test]
fn test_json_write_replaces_everything() {
    let (_temp, path) = setup_temp_file("db.json");
    let storage = JsonStorage::open(&path, FileOptions::default()).unwrap();

    storage.write(&sample_snapshot()).unwrap();
    storage.write(&Snapshot::new()).unwrap();

    assert_eq!(storage.read().unwrap(), Some(Snapshot::new()));
    assert!(!path.with_file_name("db.json.tmp").exists());
}

#[test]
fn test_json_garbage_is_serialization_error() {
    let (_temp, path) = setup_temp_file("db.json");
    fs::write(&path, b"{ not json").unwrap();

    let storage = JsonStorage::open(&path, FileOptions::default()).unwrap();
    assert!(matches!(
        storage.read(),
        Err(AtlasError::Serialization(_))
    ));
}

#[test]
fn test_json_document_must_be_object() {
    let (_temp, path) = setup_temp_file("db.json");
    fs::write(&path, br#"{"t": {"1": [1, 2]}}"#).unwrap();

    let storage = JsonStorage::open(&path, FileOptions::default()).unwrap();
    assert!(matches!(
        storage.read(),
        Err(AtlasError::Serialization(_))
    ));
}

#[test]
fn test_json_close_is_best_effort() {
    let (_temp, path) = setup_temp_file("db.json");
    let storage = JsonStorage::open(&path, FileOptions::default()).unwrap();
    storage.write(&sample_snapshot()).unwrap();

    storage.close().unwrap();
    assert!(storage.is_closed());
    assert_eq!(storage.read().unwrap(), Some(sample_snapshot()));
}

// =============================================================================
// FramedStorage Tests
// =============================================================================

#[test]
fn test_framed_round_trip() {
    let (_temp, path) = setup_temp_file("db.adoc");
    let storage = FramedStorage::open(&path, FileOptions::default()).unwrap();
    assert!(storage.read().unwrap().is_none());

    storage.write(&sample_snapshot()).unwrap();

    let reopened = FramedStorage::open(&path, FileOptions::default()).unwrap();
    assert_eq!(reopened.read().unwrap(), Some(sample_snapshot()));
}

#[test]
fn test_framed_header_on_disk() {
    let (_temp, path) = setup_temp_file("db.adoc");
    let storage = FramedStorage::open(&path, FileOptions::default()).unwrap();
    storage.write(&sample_snapshot()).unwrap();

    let bytes = fs::read(&path).unwrap();
    assert_eq!(&bytes[0..4], b"ADOC");

    let header = FrameHeader::decode(&bytes[..HEADER_SIZE]).unwrap();
    assert_eq!(header.payload_len as usize, bytes.len() - HEADER_SIZE);
    assert!(header.validate(&bytes[HEADER_SIZE..]).is_ok());
}

#[test]
fn test_framed_detects_flipped_payload_byte() {
    let (_temp, path) = setup_temp_file("db.adoc");
    let storage = FramedStorage::open(&path, FileOptions::default()).unwrap();
    storage.write(&sample_snapshot()).unwrap();

    let mut bytes = fs::read(&path).unwrap();
    let last = bytes.len() - 2;
    bytes[last] ^= 0x01;
    fs::write(&path, &bytes).unwrap();

    assert!(matches!(
        storage.read(),
        Err(AtlasError::SnapshotCorruption(_))
    ));
}

#[test]
fn test_framed_detects_truncation() {
    let (_temp, path) = setup_temp_file("db.adoc");
    let storage = FramedStorage::open(&path, FileOptions::default()).unwrap();
    storage.write(&sample_snapshot()).unwrap();

    let bytes = fs::read(&path).unwrap();
    fs::write(&path, &bytes[..bytes.len() - 5]).unwrap();
    assert!(matches!(
        storage.read(),
        Err(AtlasError::SnapshotCorruption(_))
    ));

    fs::write(&path, &bytes[..HEADER_SIZE - 1]).unwrap();
    assert!(matches!(
        storage.read(),
        Err(AtlasError::SnapshotCorruption(_))
    ));
}

#[test]
fn test_framed_rejects_plain_json_file() {
    let (_temp, path) = setup_temp_file("db.json");
    let json = JsonStorage::open(&path, FileOptions::default()).unwrap();
    json.write(&sample_snapshot()).unwrap();

    let framed = FramedStorage::open(&path, FileOptions::default()).unwrap();
    assert!(matches!(
        framed.read(),
        Err(AtlasError::SnapshotCorruption(_))
    ));
}

// =============================================================================
// Table over File Storage Tests
// =============================================================================

#[test]
fn test_table_round_trip_through_restart() {
    let (_temp, path) = setup_temp_file("db.json");

    let written = {
        let storage = Arc::new(JsonStorage::open(&path, FileOptions::default()).unwrap());
        let mut table = Table::new(storage.clone(), "T");
        table.insert(json!({"a": 1})).unwrap();
        table.insert(json!({"a": 2, "s": "two"})).unwrap();
        table.insert(atlasdoc::Document::from_value(10, json!({"a": 3})).unwrap()).unwrap();
        storage.close().unwrap();
        table.all().unwrap()
    };

    // Copy the snapshot into a framed file as well
    let snapshot = JsonStorage::open(&path, FileOptions::default())
        .unwrap()
        .read()
        .unwrap()
        .unwrap();
    let framed = Arc::new(FramedStorage::open(path.with_extension("adoc"), FileOptions::default()).unwrap());
    framed.write(&snapshot).unwrap();

    // Fresh tables over both files see the same logical documents
    let json = Arc::new(JsonStorage::open(&path, FileOptions::default()).unwrap());
    let json_table = Table::new(json, "T");
    let framed_table = Table::new(framed, "T");

    assert_eq!(json_table.all().unwrap(), written);
    assert_eq!(framed_table.all().unwrap(), written);
    assert_eq!(written.iter().map(|d| d.id).collect::<Vec<_>>(), vec![1, 2, 10]);
}

#[test]
fn test_failed_insert_leaves_file_bytes_unchanged() {
    let (_temp, path) = setup_temp_file("db.adoc");
    let storage = Arc::new(FramedStorage::open(&path, FileOptions::default()).unwrap());
    let mut table = Table::new(storage, "T");

    table.insert(json!({"a": 1})).unwrap();
    let before = fs::read(&path).unwrap();

    let dup = atlasdoc::Document::from_value(1, json!({"a": 2})).unwrap();
    assert!(table.insert(dup).is_err());

    assert_eq!(fs::read(&path).unwrap(), before);
}
