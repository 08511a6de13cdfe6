//! WAL Reader
//!
//! Handles reading entries from the WAL file.

use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

use crate::error::{Result, SiteError};
use super::entry::{Header, HEADER_SIZE, MAX_ENTRY_SIZE};
use super::WalEntry;

/// What a single frame read produced
#[derive(Debug)]
pub enum ReadOutcome {
    /// A valid entry
    Entry(WalEntry),

    /// A complete frame whose checksum or payload is bad; `len` is its size
    Corrupt { lsn: u64, len: u64 },

    /// The file ends mid-frame (or the header length is unusable)
    TornTail,

    /// Clean end of file
    End,
}

/// Reads entries from the WAL file
pub struct WalReader {
    reader: BufReader<File>,

    /// Byte offset of the next frame
    position: u64,
}

impl WalReader {
    /// Open a WAL file for reading
    pub fn open(path: &Path) -> Result<Self> {
        let file = File::open(path)?;
        Ok(Self {
            reader: BufReader::new(file),
            position: 0,
        })
    }

    /// Read the next entry from the WAL
    ///
    /// Returns `Ok(None)` at a clean end of file; corruption and partial
    /// frames are errors.
    pub fn next_entry(&mut self) -> Result<Option<WalEntry>> {
        match self.read_frame()? {
            ReadOutcome::Entry(entry) => Ok(Some(entry)),
            ReadOutcome::End => Ok(None),
            ReadOutcome::Corrupt { lsn, .. } => Err(SiteError::WalCorruption(format!(
                "Corrupted entry at LSN {}",
                lsn
            ))),
            ReadOutcome::TornTail => Err(SiteError::WalCorruption(format!(
                "Partial entry at offset {}",
                self.position
            ))),
        }
    }

    /// Read one frame and classify it
    ///
    /// `position` advances past complete frames (valid or corrupt) only.
    pub fn read_frame(&mut self) -> Result<ReadOutcome> {
        let mut header_bytes = [0u8; HEADER_SIZE];
        let read = read_full(&mut self.reader, &mut header_bytes)?;
        if read == 0 {
            return Ok(ReadOutcome::End);
        }
        if read < HEADER_SIZE {
            return Ok(ReadOutcome::TornTail);
        }

        let header = match Header::parse(&header_bytes) {
            Ok(header) => header,
            Err(_) => return Ok(ReadOutcome::TornTail),
        };
        debug_assert!(header.len <= MAX_ENTRY_SIZE);

        let mut payload = vec![0u8; header.len];
        if read_full(&mut self.reader, &mut payload)? < header.len {
            return Ok(ReadOutcome::TornTail);
        }

        let frame_len = (HEADER_SIZE + header.len) as u64;
        self.position += frame_len;

        match WalEntry::from_parts(&header, &payload) {
            Ok(entry) => Ok(ReadOutcome::Entry(entry)),
            Err(_) => Ok(ReadOutcome::Corrupt {
                lsn: header.lsn,
                len: frame_len,
            }),
        }
    }

    /// Byte offset of the next unread frame
    pub fn position(&self) -> u64 {
        self.position
    }

    /// Iterate over all valid entries
    pub fn entries(self) -> WalIterator {
        WalIterator {
            reader: self,
            done: false,
        }
    }
}

/// Iterator over WAL entries; stops after the first error
pub struct WalIterator {
    reader: WalReader,
    done: bool,
}

impl Iterator for WalIterator {
    type Item = Result<WalEntry>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        match self.reader.next_entry() {
            Ok(Some(entry)) => Some(Ok(entry)),
            Ok(None) => {
                self.done = true;
                None
            }
            Err(e) => {
                self.done = true;
                Some(Err(e))
            }
        }
    }
}

/// Fill `buf` unless EOF comes first; returns bytes read
fn read_full<R: Read>(reader: &mut R, buf: &mut [u8]) -> std::io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
    Ok(filled)
}
