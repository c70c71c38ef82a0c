//! Tests for tree snapshots
//!
//! These tests verify:
//! - Values, versions and structure survive a save/load cycle
//! - Ephemeral nodes are left out
//! - Corrupted or missing files are rejected

mod common;

use std::fs;

use bytes::Bytes;
use common::{config, setup};
use tempfile::TempDir;
use treekv::tree::snapshot::{temp_path, HEADER_SIZE};
use treekv::{Client, KvError, MemoryTree};

// =============================================================================
// Round Trip Tests
// =============================================================================

#[test]
fn test_snapshot_preserves_values_and_versions() {
    let dir = TempDir::new().unwrap();
    let file = dir.path().join("tree.snap");

    let (tree, client) = setup();
    client.create("/a", "one", false).unwrap();
    client.create("/a/b", "two", false).unwrap();
    client.set("/a", "three").unwrap();
    client.set("/a", "four").unwrap();
    tree.save_snapshot(&file).unwrap();

    let restored = MemoryTree::load_snapshot(&file).unwrap();
    assert_eq!(restored.node_count(), tree.node_count());

    let reader = Client::connect(&restored, config()).unwrap();
    let (version, value, _) = reader.get("/a", false).unwrap();
    assert_eq!(version, 3);
    assert_eq!(value, Bytes::from("four"));
    assert_eq!(reader.children("/a", false).unwrap().0, vec!["/a/b".to_string()]);

    // version checks keep working against restored versions
    assert_eq!(reader.cas("/a", "five", 3).unwrap(), 4);
}

#[test]
fn test_snapshot_skips_ephemerals() {
    let dir = TempDir::new().unwrap();
    let file = dir.path().join("tree.snap");

    let (tree, client) = setup();
    client.create("/durable", "v", false).unwrap();
    client.create("/lease", "v", true).unwrap();
    tree.save_snapshot(&file).unwrap();

    let restored = MemoryTree::load_snapshot(&file).unwrap();
    let reader = Client::connect(&restored, config()).unwrap();
    assert_eq!(reader.exists("/durable", false).unwrap().0, 1);
    assert_eq!(reader.exists("/lease", false).unwrap().0, 0);
}

#[test]
fn test_snapshot_of_empty_tree() {
    let dir = TempDir::new().unwrap();
    let file = dir.path().join("empty.snap");

    MemoryTree::new().save_snapshot(&file).unwrap();
    let restored = MemoryTree::load_snapshot(&file).unwrap();
    assert_eq!(restored.node_count(), 1);
}

#[test]
fn test_snapshot_replaces_previous_file() {
    let dir = TempDir::new().unwrap();
    let file = dir.path().join("tree.snap");

    let (tree, client) = setup();
    client.create("/a", "first", false).unwrap();
    tree.save_snapshot(&file).unwrap();
    client.set("/a", "second").unwrap();
    tree.save_snapshot(&file).unwrap();

    assert!(!temp_path(&file).exists());
    assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 1);

    let restored = MemoryTree::load_snapshot(&file).unwrap();
    let reader = Client::connect(&restored, config()).unwrap();
    assert_eq!(reader.get("/a", false).unwrap().1, Bytes::from("second"));
}

// =============================================================================
// Corruption Tests
// =============================================================================

#[test]
fn test_snapshot_rejects_flipped_payload_byte() {
    let dir = TempDir::new().unwrap();
    let file = dir.path().join("tree.snap");

    let (tree, client) = setup();
    client.create("/a", "value", false).unwrap();
    tree.save_snapshot(&file).unwrap();

    let mut bytes = fs::read(&file).unwrap();
    let last = bytes.len() - 1;
    bytes[last] ^= 0xff;
    fs::write(&file, bytes).unwrap();

    assert!(matches!(MemoryTree::load_snapshot(&file), Err(KvError::Snapshot(_))));
}

#[test]
fn test_snapshot_rejects_truncated_file() {
    let dir = TempDir::new().unwrap();
    let file = dir.path().join("tree.snap");

    let (tree, client) = setup();
    client.create("/a", "value", false).unwrap();
    tree.save_snapshot(&file).unwrap();

    let bytes = fs::read(&file).unwrap();
    fs::write(&file, &bytes[..HEADER_SIZE + 2]).unwrap();
    assert!(matches!(MemoryTree::load_snapshot(&file), Err(KvError::Snapshot(_))));

    fs::write(&file, &bytes[..3]).unwrap();
    assert!(matches!(MemoryTree::load_snapshot(&file), Err(KvError::Snapshot(_))));
}

#[test]
fn test_snapshot_rejects_foreign_file() {
    let dir = TempDir::new().unwrap();
    let file = dir.path().join("notes.txt");
    fs::write(&file, b"just some text, not a tree").unwrap();

    assert!(matches!(MemoryTree::load_snapshot(&file), Err(KvError::Snapshot(_))));
}

#[test]
fn test_snapshot_missing_file() {
    let dir = TempDir::new().unwrap();
    let result = MemoryTree::load_snapshot(dir.path().join("nope.snap"));
    assert!(matches!(result, Err(KvError::Io(_))));
}
