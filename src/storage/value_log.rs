//! Value log
//!
//! Append-only file for values too large to keep in the keyspace. The engine
//! stores a [`ValuePointer`] in their place and reads the bytes back on
//! demand, so resident memory and checkpoint size depend on the number of
//! keys rather than on the total bytes ever written.
//!
//! Record layout: `LEN (4, LE) | CRC32 (4, LE) | value`
//!
//! Records are never rewritten. Space held by overwritten or deleted values
//! is not reclaimed.

use std::borrow::Cow;
use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use parking_lot::Mutex;

use crate::error::{Result, SiteError};

/// LEN (4) + CRC (4)
const RECORD_HEADER_SIZE: u64 = 8;

/// Tag of a value held in the keyspace itself
const TAG_INLINE: u8 = 0x00;

/// Tag of a value held in the value log
const TAG_LOGGED: u8 = 0x01;

/// Tag (1) + offset (8) + length (4)
const POINTER_SIZE: usize = 13;

/// Location of one record in the value log
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ValuePointer {
    pub offset: u64,
    pub len: u32,
}

/// A keyspace value as the engine stores it
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoredValue<'a> {
    Inline(&'a [u8]),
    Logged(ValuePointer),
}

impl<'a> StoredValue<'a> {
    /// Tagged bytes kept in the memtable, WAL and snapshot
    pub fn encode(&self) -> Vec<u8> {
        match self {
            StoredValue::Inline(value) => {
                let mut bytes = Vec::with_capacity(1 + value.len());
                bytes.push(TAG_INLINE);
                bytes.extend_from_slice(value);
                bytes
            }
            StoredValue::Logged(pointer) => {
                let mut bytes = Vec::with_capacity(POINTER_SIZE);
                bytes.push(TAG_LOGGED);
                bytes.extend_from_slice(&pointer.offset.to_le_bytes());
                bytes.extend_from_slice(&pointer.len.to_le_bytes());
                bytes
            }
        }
    }

    pub fn decode(bytes: &'a [u8]) -> Result<Self> {
        match bytes.split_first() {
            Some((&TAG_INLINE, value)) => Ok(StoredValue::Inline(value)),
            Some((&TAG_LOGGED, rest)) if rest.len() == POINTER_SIZE - 1 => {
                let mut offset = [0u8; 8];
                offset.copy_from_slice(&rest[0..8]);
                let len = u32::from_le_bytes([rest[8], rest[9], rest[10], rest[11]]);
                Ok(StoredValue::Logged(ValuePointer {
                    offset: u64::from_le_bytes(offset),
                    len,
                }))
            }
            Some((tag, rest)) => Err(SiteError::Storage(format!(
                "Unrecognized stored value: tag 0x{:02x}, {} bytes",
                tag,
                rest.len()
            ))),
            None => Err(SiteError::Storage("Empty stored value".to_string())),
        }
    }
}

/// Append-only store for large values
pub struct ValueLog {
    path: PathBuf,

    /// Shared by appends and reads; each seeks before use
    file: Mutex<File>,
}

impl ValueLog {
    /// Open or create the log at `path`
    ///
    /// A torn record at the tail (crash mid-append) is left in place: no
    /// pointer was ever logged for it, and new records go after it.
    pub fn open(path: &Path) -> Result<Self> {
        let file = OpenOptions::new()
            .create(true)
            .read(true)
            .append(true)
            .open(path)?;

        Ok(Self {
            path: path.to_path_buf(),
            file: Mutex::new(file),
        })
    }

    /// Append `value` and sync it; the returned pointer is safe to log
    pub fn append(&self, value: &[u8]) -> Result<ValuePointer> {
        let len = u32::try_from(value.len()).map_err(|_| {
            SiteError::Storage(format!("Value of {} bytes is too large to log", value.len()))
        })?;

        let mut file = self.file.lock();
        let offset = file.seek(SeekFrom::End(0))?;

        let mut record = Vec::with_capacity(RECORD_HEADER_SIZE as usize + value.len());
        record.extend_from_slice(&len.to_le_bytes());
        record.extend_from_slice(&crc32fast::hash(value).to_le_bytes());
        record.extend_from_slice(value);
        file.write_all(&record)?;
        file.sync_data()?;

        Ok(ValuePointer { offset, len })
    }

    /// Read back the record at `pointer`, verifying its checksum
    pub fn read(&self, pointer: &ValuePointer) -> Result<Vec<u8>> {
        let mut file = self.file.lock();
        file.seek(SeekFrom::Start(pointer.offset))?;

        let mut header = [0u8; RECORD_HEADER_SIZE as usize];
        file.read_exact(&mut header)?;
        let len = u32::from_le_bytes([header[0], header[1], header[2], header[3]]);
        let crc = u32::from_le_bytes([header[4], header[5], header[6], header[7]]);
        if len != pointer.len {
            return Err(SiteError::Storage(format!(
                "Value log record at {} has length {}, expected {}",
                pointer.offset, len, pointer.len
            )));
        }

        let mut value = vec![0u8; len as usize];
        file.read_exact(&mut value)?;
        if crc32fast::hash(&value) != crc {
            return Err(SiteError::Storage(format!(
                "Value log checksum mismatch at offset {}",
                pointer.offset
            )));
        }
        Ok(value)
    }

    /// Resolve a stored value to its bytes
    pub fn resolve<'a>(&self, stored: &'a [u8]) -> Result<Cow<'a, [u8]>> {
        match StoredValue::decode(stored)? {
            StoredValue::Inline(value) => Ok(Cow::Borrowed(value)),
            StoredValue::Logged(pointer) => Ok(Cow::Owned(self.read(&pointer)?)),
        }
    }

    /// Current file size in bytes
    pub fn size(&self) -> Result<u64> {
        Ok(self.file.lock().metadata()?.len())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}
