//! Snapshot Tests
//!
//! Tests verify:
//! - Write/load preserves entries and the folded LSN
//! - Borrowed entries stream to the same file as owned ones
//! - Rewrites replace the previous file without leaving temp files
//! - Corruption is detected before anything is returned

use std::fs;
use std::path::PathBuf;

use sitesmith::storage::Snapshot;
use sitesmith::SiteError;
use tempfile::TempDir;

fn setup_temp_snapshot() -> (TempDir, PathBuf) {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("snapshot.db");
    (temp_dir, path)
}

fn sample_entries() -> Vec<(Vec<u8>, Vec<u8>)> {
    vec![
        (b"project:3:ada:4:blog:v1".to_vec(), br#"{"entry":"index.html","files":[]}"#.to_vec()),
        (b"project:3:ada:4:blog:version".to_vec(), b"1".to_vec()),
        (b"projects:ada".to_vec(), vec![1, 0, 0, 0, 0, 0, 0, 0, 4, 0, 0, 0, 0, 0, 0, 0]),
    ]
}

#[test]
fn test_write_then_load() {
    let (_temp, path) = setup_temp_snapshot();
    let entries = sample_entries();

    let written = Snapshot::write(&path, &entries, 17).unwrap();
    let (loaded, info) = Snapshot::load(&path).unwrap();

    assert_eq!(loaded, entries);
    assert_eq!(info, written);
    assert_eq!(info.entry_count, 3);
    assert_eq!(info.last_lsn, 17);
}

#[test]
fn test_write_from_borrowed_entries() {
    let (temp, path) = setup_temp_snapshot();
    let entries = sample_entries();
    let owned_path = temp.path().join("owned.db");

    let info = Snapshot::write_from(
        &path,
        entries.iter().map(|(k, v)| (k.as_slice(), v.as_slice())),
        9,
    )
    .unwrap();
    Snapshot::write(&owned_path, &entries, 9).unwrap();

    assert_eq!(info.entry_count, 3);
    assert_eq!(fs::read(&path).unwrap(), fs::read(&owned_path).unwrap());
    assert_eq!(Snapshot::load(&path).unwrap().0, entries);
}

#[test]
fn test_empty_snapshot() {
    let (_temp, path) = setup_temp_snapshot();

    Snapshot::write(&path, &[], 0).unwrap();
    let (loaded, info) = Snapshot::load(&path).unwrap();

    assert!(loaded.is_empty());
    assert_eq!(info.entry_count, 0);
}

#[test]
fn test_rewrite_replaces_previous() {
    let (temp, path) = setup_temp_snapshot();
    Snapshot::write(&path, &sample_entries(), 3).unwrap();

    let smaller = vec![(b"only".to_vec(), b"one".to_vec())];
    Snapshot::write(&path, &smaller, 9).unwrap();

    let (loaded, info) = Snapshot::load(&path).unwrap();
    assert_eq!(loaded, smaller);
    assert_eq!(info.last_lsn, 9);

    let leftovers: Vec<_> = fs::read_dir(temp.path())
        .unwrap()
        .map(|e| e.unwrap().file_name())
        .collect();
    assert_eq!(leftovers, vec![std::ffi::OsString::from("snapshot.db")]);
}

#[test]
fn test_flipped_byte_detected() {
    let (_temp, path) = setup_temp_snapshot();
    Snapshot::write(&path, &sample_entries(), 5).unwrap();

    let mut bytes = fs::read(&path).unwrap();
    bytes[20] ^= 0x01;
    fs::write(&path, &bytes).unwrap();

    let err = Snapshot::load(&path).unwrap_err();
    assert!(matches!(err, SiteError::Storage(_)));
    assert!(err.to_string().contains("checksum"));
}

#[test]
fn test_bad_magic_rejected() {
    let (_temp, path) = setup_temp_snapshot();
    Snapshot::write(&path, &sample_entries(), 5).unwrap();

    let mut bytes = fs::read(&path).unwrap();
    bytes[0..4].copy_from_slice(b"NOPE");
    fs::write(&path, &bytes).unwrap();

    assert!(Snapshot::load(&path).unwrap_err().to_string().contains("magic"));
}

#[test]
fn test_too_small_rejected() {
    let (_temp, path) = setup_temp_snapshot();
    fs::write(&path, b"SSKV").unwrap();

    assert!(matches!(Snapshot::load(&path), Err(SiteError::Storage(_))));
}
