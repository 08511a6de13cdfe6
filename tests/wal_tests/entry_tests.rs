//! Tests for WAL entry framing
//!
//! These tests verify:
//! - Header layout (LSN, CRC, length)
//! - CRC coverage of LSN and payload
//! - Rejection of short and oversized frames

use sitesmith::wal::{Operation, WalEntry, HEADER_SIZE, MAX_ENTRY_SIZE};
use sitesmith::SiteError;

fn put(key: &str, value: &str) -> Operation {
    Operation::Put {
        key: key.as_bytes().to_vec(),
        value: value.as_bytes().to_vec(),
    }
}

// =============================================================================
// Framing Tests
// =============================================================================

#[test]
fn test_put_survives_encoding() {
    let entry = WalEntry::new(7, put("project:ada:blog:version", "3"));

    let bytes = entry.serialize().unwrap();
    let decoded = WalEntry::deserialize(&bytes).unwrap();

    assert_eq!(decoded, entry);
}

#[test]
fn test_delete_survives_encoding() {
    let entry = WalEntry::new(42, Operation::Delete { key: b"gone".to_vec() });

    let decoded = WalEntry::deserialize(&entry.serialize().unwrap()).unwrap();

    assert_eq!(decoded.operation, Operation::Delete { key: b"gone".to_vec() });
}

#[test]
fn test_header_layout() {
    let entry = WalEntry::new(0x0102030405060708, put("k", "v"));
    let bytes = entry.serialize().unwrap();

    assert_eq!(&bytes[0..8], &0x0102030405060708u64.to_be_bytes());
    assert_eq!(&bytes[8..12], &entry.compute_crc().unwrap().to_be_bytes());

    let len = u32::from_be_bytes([bytes[12], bytes[13], bytes[14], bytes[15]]) as usize;
    assert_eq!(bytes.len(), HEADER_SIZE + len);
    assert_eq!(entry.serialized_size().unwrap(), bytes.len());
}

#[test]
fn test_binary_and_empty_values() {
    let entry = WalEntry::new(
        3,
        Operation::Put {
            key: vec![0, 255, 10, 13],
            value: vec![],
        },
    );

    let decoded = WalEntry::deserialize(&entry.serialize().unwrap()).unwrap();

    assert_eq!(decoded, entry);
}

#[test]
fn test_trailing_bytes_are_ignored() {
    let entry = WalEntry::new(1, put("a", "1"));
    let mut bytes = entry.serialize().unwrap();
    bytes.extend_from_slice(b"next frame starts here");

    assert_eq!(WalEntry::deserialize(&bytes).unwrap(), entry);
}

// =============================================================================
// Corruption Tests
// =============================================================================

#[test]
fn test_flipped_payload_bit_fails_crc() {
    let mut bytes = WalEntry::new(1, put("key", "value")).serialize().unwrap();
    let last = bytes.len() - 1;
    bytes[last] ^= 0x01;

    let err = WalEntry::deserialize(&bytes).unwrap_err();
    assert!(matches!(err, SiteError::WalCorruption(_)));
}

#[test]
fn test_rewritten_lsn_fails_crc() {
    let mut bytes = WalEntry::new(5, put("key", "value")).serialize().unwrap();
    bytes[7] = 6;

    assert!(matches!(
        WalEntry::deserialize(&bytes),
        Err(SiteError::WalCorruption(_))
    ));
}

#[test]
fn test_short_header_rejected() {
    let bytes = vec![0u8; HEADER_SIZE - 1];

    assert!(matches!(
        WalEntry::deserialize(&bytes),
        Err(SiteError::WalCorruption(_))
    ));
}

#[test]
fn test_truncated_payload_rejected() {
    let bytes = WalEntry::new(1, put("key", "a longer value")).serialize().unwrap();

    let err = WalEntry::deserialize(&bytes[..bytes.len() - 3]).unwrap_err();
    assert!(err.to_string().contains("Incomplete entry"));
}

#[test]
fn test_oversized_length_rejected() {
    let mut bytes = vec![0u8; HEADER_SIZE];
    bytes[12..16].copy_from_slice(&((MAX_ENTRY_SIZE as u32) + 1).to_be_bytes());

    assert!(matches!(
        WalEntry::deserialize(&bytes),
        Err(SiteError::WalCorruption(_))
    ));
}

#[test]
fn test_crc_depends_on_content() {
    let a = WalEntry {
        lsn: 1,
        operation: put("k", "v1"),
        timestamp: 0,
    };
    let b = WalEntry {
        lsn: 1,
        operation: put("k", "v2"),
        timestamp: 0,
    };

    assert_ne!(a.compute_crc().unwrap(), b.compute_crc().unwrap());
}
