//! WAL Entry definitions
//!
//! Defines the structure of individual WAL log entries and their framing.

use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

use crate::error::{Result, SiteError};
use crate::kv::{MAX_KEY_BYTES, MAX_VALUE_BYTES};

/// Frame header: LSN (8) + CRC (4) + payload length (4)
pub const HEADER_SIZE: usize = 16;

/// Upper bound on a single payload: a put of the largest key and value plus
/// bincode's tag, length prefixes and timestamp
pub const MAX_ENTRY_SIZE: usize = MAX_KEY_BYTES + MAX_VALUE_BYTES + 64;

/// A single entry in the WAL
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WalEntry {
    /// Log Sequence Number - monotonically increasing
    pub lsn: u64,

    /// The operation to perform
    pub operation: Operation,

    /// Timestamp (unix millis) when entry was created
    pub timestamp: u64,
}

/// Operations that can be logged
///
/// Read-modify-write commands (increment, set add) are logged as the `Put`
/// of their result, so replay never re-applies arithmetic.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Operation {
    /// Put a key-value pair
    Put { key: Vec<u8>, value: Vec<u8> },

    /// Delete a key
    Delete { key: Vec<u8> },
}

/// Body encoded after the header
#[derive(Serialize, Deserialize)]
struct Payload {
    operation: Operation,
    timestamp: u64,
}

impl WalEntry {
    /// Create an entry stamped with the current time
    pub fn new(lsn: u64, operation: Operation) -> Self {
        let timestamp = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or(0);
        Self { lsn, operation, timestamp }
    }

    /// Encode as `LSN | CRC | LEN | payload`
    pub fn serialize(&self) -> Result<Vec<u8>> {
        let payload = self.encode_payload()?;
        let crc = checksum(self.lsn, &payload);

        let mut bytes = Vec::with_capacity(HEADER_SIZE + payload.len());
        bytes.extend_from_slice(&self.lsn.to_be_bytes());
        bytes.extend_from_slice(&crc.to_be_bytes());
        bytes.extend_from_slice(&(payload.len() as u32).to_be_bytes());
        bytes.extend_from_slice(&payload);
        Ok(bytes)
    }

    /// Decode one framed entry from the front of `bytes`
    pub fn deserialize(bytes: &[u8]) -> Result<Self> {
        let header = Header::parse(bytes)?;
        let end = HEADER_SIZE + header.len;
        if bytes.len() < end {
            return Err(SiteError::WalCorruption(format!(
                "Incomplete entry: expected {} bytes, got {}",
                end,
                bytes.len()
            )));
        }
        Self::from_parts(&header, &bytes[HEADER_SIZE..end])
    }

    /// Total framed size in bytes
    pub fn serialized_size(&self) -> Result<usize> {
        Ok(HEADER_SIZE + self.encode_payload()?.len())
    }

    /// CRC32 over the LSN and the encoded payload
    pub fn compute_crc(&self) -> Result<u32> {
        Ok(checksum(self.lsn, &self.encode_payload()?))
    }

    /// Verify a payload against its header and decode it
    pub(crate) fn from_parts(header: &Header, payload: &[u8]) -> Result<Self> {
        let actual = checksum(header.lsn, payload);
        if actual != header.crc {
            return Err(SiteError::WalCorruption(format!(
                "CRC mismatch at LSN {}: stored {:08x}, computed {:08x}",
                header.lsn, header.crc, actual
            )));
        }
        let decoded: Payload = bincode::deserialize(payload)
            .map_err(|e| SiteError::WalCorruption(format!("Undecodable payload: {}", e)))?;
        Ok(Self {
            lsn: header.lsn,
            operation: decoded.operation,
            timestamp: decoded.timestamp,
        })
    }

    fn encode_payload(&self) -> Result<Vec<u8>> {
        Ok(bincode::serialize(&Payload {
            operation: self.operation.clone(),
            timestamp: self.timestamp,
        })?)
    }
}

/// Parsed frame header
#[derive(Debug, Clone, Copy)]
pub(crate) struct Header {
    pub lsn: u64,
    pub crc: u32,
    pub len: usize,
}

impl Header {
    pub(crate) fn parse(bytes: &[u8]) -> Result<Self> {
        if bytes.len() < HEADER_SIZE {
            return Err(SiteError::WalCorruption(format!(
                "Incomplete header: expected {} bytes, got {}",
                HEADER_SIZE,
                bytes.len()
            )));
        }
        let mut lsn = [0u8; 8];
        lsn.copy_from_slice(&bytes[0..8]);
        let crc = u32::from_be_bytes([bytes[8], bytes[9], bytes[10], bytes[11]]);
        let len = u32::from_be_bytes([bytes[12], bytes[13], bytes[14], bytes[15]]) as usize;
        if len > MAX_ENTRY_SIZE {
            return Err(SiteError::WalCorruption(format!(
                "Entry length {} exceeds maximum {}",
                len, MAX_ENTRY_SIZE
            )));
        }
        Ok(Self {
            lsn: u64::from_be_bytes(lsn),
            crc,
            len,
        })
    }
}

fn checksum(lsn: u64, payload: &[u8]) -> u32 {
    let mut hasher = crc32fast::Hasher::new();
    hasher.update(&lsn.to_be_bytes());
    hasher.update(payload);
    hasher.finalize()
}
