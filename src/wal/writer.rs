//! WAL Writer
//!
//! Handles appending entries to the WAL file.

use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use crate::config::WalSyncStrategy;
use crate::error::Result;
use super::{Operation, ReadOutcome, WalEntry, WalReader};

/// Writes entries to the WAL file
pub struct WalWriter {
    path: PathBuf,

    writer: BufWriter<File>,

    /// LSN the next append will receive
    next_lsn: u64,

    sync_strategy: WalSyncStrategy,

    /// Entries appended since the last fsync
    unsynced: usize,

    /// Bytes in the file (appended since the last truncate)
    bytes_written: u64,
}

impl WalWriter {
    /// Open or create a WAL file
    ///
    /// An existing file is scanned so LSNs continue after the last valid
    /// entry. Call [`WalRecovery::recover`](super::WalRecovery::recover)
    /// first if the file may have a torn tail.
    pub fn open(path: &Path, sync_strategy: WalSyncStrategy) -> Result<Self> {
        let mut last_lsn = 0;
        if path.exists() {
            let mut reader = WalReader::open(path)?;
            loop {
                match reader.read_frame()? {
                    ReadOutcome::Entry(entry) => last_lsn = last_lsn.max(entry.lsn),
                    ReadOutcome::Corrupt { lsn, .. } => last_lsn = last_lsn.max(lsn),
                    ReadOutcome::TornTail | ReadOutcome::End => break,
                }
            }
        }

        let mut file = OpenOptions::new().create(true).append(true).open(path)?;
        let bytes_written = file.seek(SeekFrom::End(0))?;

        Ok(Self {
            path: path.to_path_buf(),
            writer: BufWriter::new(file),
            next_lsn: last_lsn + 1,
            sync_strategy,
            unsynced: 0,
            bytes_written,
        })
    }

    /// Append an operation; returns its LSN
    ///
    /// The entry reaches the OS before this returns; fsync follows the
    /// configured strategy.
    pub fn append(&mut self, operation: Operation) -> Result<u64> {
        let lsn = self.next_lsn;
        let bytes = WalEntry::new(lsn, operation).serialize()?;

        self.writer.write_all(&bytes)?;
        self.writer.flush()?;
        self.next_lsn += 1;
        self.unsynced += 1;
        self.bytes_written += bytes.len() as u64;

        let due = match self.sync_strategy {
            WalSyncStrategy::EveryWrite => true,
            WalSyncStrategy::EveryNEntries { count } => self.unsynced >= count.max(1),
        };
        if due {
            self.sync()?;
        }

        Ok(lsn)
    }

    /// Force sync to disk
    pub fn sync(&mut self) -> Result<()> {
        self.writer.flush()?;
        self.writer.get_ref().sync_data()?;
        self.unsynced = 0;
        Ok(())
    }

    /// Discard all entries (after a checkpoint); LSNs keep counting
    pub fn truncate(&mut self) -> Result<()> {
        self.writer.flush()?;
        let file = self.writer.get_mut();
        file.set_len(0)?;
        file.seek(SeekFrom::Start(0))?;
        file.sync_all()?;
        self.unsynced = 0;
        self.bytes_written = 0;
        Ok(())
    }

    /// Get the LSN the next append will receive
    pub fn current_lsn(&self) -> u64 {
        self.next_lsn
    }

    /// Make sure the next LSN is greater than `lsn`
    ///
    /// Used after a checkpoint so a truncated log never reuses LSNs already
    /// folded into the snapshot.
    pub fn advance_past(&mut self, lsn: u64) {
        self.next_lsn = self.next_lsn.max(lsn + 1);
    }

    /// Bytes currently in the log
    pub fn bytes_written(&self) -> u64 {
        self.bytes_written
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}
