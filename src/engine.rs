//! Engine Module
//!
//! The embedded, durable key-value engine behind the project store.
//!
//! ## Responsibilities
//! - Coordinate WAL, MemTable, value log and snapshot storage
//! - Handle concurrent read/write access
//! - Make counter increments, counter raises and set additions atomic
//! - Checkpoint when the WAL grows past its threshold
//! - Manage crash recovery on startup
//!
//! ## Stored Values
//! The memtable, WAL and snapshot hold each value in its stored form: the
//! bytes themselves when shorter than `value_log_threshold`, otherwise a
//! pointer into the value log. Manifests therefore stay on disk and only
//! their keys and pointers are resident.

use std::fs;
use std::path::{Path, PathBuf};

use parking_lot::Mutex;

use crate::config::Config;
use crate::error::{Result, SiteError};
use crate::kv::{
    add_member, check_sizes, decode_members, encode_members, next_counter, raise_counter,
    KvBackend,
};
use crate::memtable::MemTable;
use crate::protocol::Command;
use crate::storage::{Snapshot, SnapshotInfo, StoredValue, ValueLog};
use crate::wal::{Operation, WalRecovery, WalWriter};

/// The main storage engine
///
/// ## Concurrency Model: Single-Writer / Multiple-Reader (SWMR)
///
/// - **Writes** (put/delete/increment/raise/set-add/checkpoint): serialized
///   by `write_lock`. Order: write_lock → value log → WAL → memtable.
/// - **Reads** (get/members): the memtable's read lock, then the value log
///   for values stored there.
///
/// Read-modify-write commands compute their result and log it while the
/// write lock is held, so two increments of the same counter can never
/// observe the same starting value.
pub struct Engine {
    /// Engine configuration
    config: Config,

    /// Checkpoint file
    snapshot_path: PathBuf,

    /// Write-ahead log for durability (exclusive access needed)
    wal: Mutex<WalWriter>,

    /// Out-of-line storage for large values
    values: ValueLog,

    /// The whole keyspace in stored form (internal RwLock)
    memtable: MemTable,

    /// Serializes write operations
    write_lock: Mutex<()>,
}

impl Engine {
    // =========================================================================
    // Internal Path Constants
    // =========================================================================
    const WAL_FILENAME: &'static str = "wal.log";
    const SNAPSHOT_FILENAME: &'static str = "snapshot.db";
    const VALUE_LOG_FILENAME: &'static str = "values.log";

    /// Open or create an engine with the given config
    ///
    /// On startup:
    /// 1. Open/create data directory and value log
    /// 2. Load the last snapshot if one exists
    /// 3. Replay WAL entries newer than the snapshot
    /// 4. Checkpoint if anything was replayed
    pub fn open(config: Config) -> Result<Self> {
        fs::create_dir_all(&config.data_dir)?;

        let snapshot_path = config.data_dir.join(Self::SNAPSHOT_FILENAME);
        let wal_path = config.data_dir.join(Self::WAL_FILENAME);
        let values = ValueLog::open(&config.data_dir.join(Self::VALUE_LOG_FILENAME))?;

        let memtable = MemTable::new();
        let mut folded_lsn = 0;

        if snapshot_path.exists() {
            let (entries, info) = Snapshot::load(&snapshot_path)?;
            for (key, value) in entries {
                memtable.put(key, value);
            }
            folded_lsn = info.last_lsn;
            tracing::info!(
                entries = info.entry_count,
                last_lsn = info.last_lsn,
                "Loaded snapshot"
            );
        }

        let mut replayed = 0u64;
        let mut last_lsn = folded_lsn;
        if wal_path.exists() {
            let (entries, result) = WalRecovery::recover(&wal_path)?;

            if result.entries_recovered > 0 || result.entries_corrupted > 0 {
                tracing::info!(
                    recovered = result.entries_recovered,
                    corrupted = result.entries_corrupted,
                    last_lsn = result.last_lsn,
                    truncated = result.was_truncated,
                    "WAL recovery"
                );
            }

            for entry in entries {
                // Already folded into the snapshot (crash between rename and truncate)
                if entry.lsn <= folded_lsn {
                    continue;
                }
                match entry.operation {
                    Operation::Put { key, value } => {
                        memtable.put(key, value);
                    }
                    Operation::Delete { key } => {
                        memtable.delete(&key);
                    }
                }
                last_lsn = last_lsn.max(entry.lsn);
                replayed += 1;
            }
        }

        let mut wal = WalWriter::open(&wal_path, config.wal_sync_strategy)?;
        wal.advance_past(last_lsn);

        let engine = Self {
            config,
            snapshot_path,
            wal: Mutex::new(wal),
            values,
            memtable,
            write_lock: Mutex::new(()),
        };

        // Make replayed data durable in the snapshot before accepting writes
        if replayed > 0 {
            tracing::info!(replayed, "Checkpointing recovered entries");
            let _guard = engine.write_lock.lock();
            engine.checkpoint_internal()?;
        }

        Ok(engine)
    }

    /// Open with a path (convenience method)
    ///
    /// Uses default config with the specified data directory
    pub fn open_path(path: &Path) -> Result<Self> {
        let mut config = Config::default();
        config.data_dir = path.to_path_buf();
        Self::open(config)
    }

    /// Execute a protocol command
    ///
    /// Missing keys on GET surface as `KeyNotFound`.
    pub fn execute(&self, command: Command) -> Result<Option<Vec<u8>>> {
        match command {
            Command::Get { key } => self.get(&key)?.map(Some).ok_or(SiteError::KeyNotFound),
            Command::Put { key, value } => {
                self.put(&key, &value)?;
                Ok(None)
            }
            Command::Delete { key } => {
                self.delete(&key)?;
                Ok(None)
            }
            Command::Ping => Ok(Some(b"PONG".to_vec())),
            Command::Incr { key } => {
                let value = self.increment_and_get(&key)?;
                Ok(Some(value.to_be_bytes().to_vec()))
            }
            Command::SAdd { key, member } => {
                let added = self.add_to_set(&key, &member)?;
                Ok(Some(vec![added as u8]))
            }
            Command::SMembers { key } => {
                let members = decode_members(self.get(&key)?.as_deref())?;
                Ok(Some(encode_members(&members)?))
            }
            Command::Raise { key, value } => {
                let value = self.raise_to(&key, value)?;
                Ok(Some(value.to_be_bytes().to_vec()))
            }
        }
    }

    /// Get a value by key
    pub fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>> {
        match self.memtable.get(key) {
            Some(stored) => Ok(Some(self.values.resolve(&stored)?.into_owned())),
            None => Ok(None),
        }
    }

    /// Put a key-value pair
    ///
    /// Steps:
    /// 1. Reject keys and values over the size limits
    /// 2. Acquire write lock
    /// 3. Move a large value to the value log (synced)
    /// 4. Write the stored form to the WAL (durability)
    /// 5. Write to MemTable
    /// 6. Checkpoint if the WAL is over its threshold
    pub fn put(&self, key: &[u8], value: &[u8]) -> Result<()> {
        check_sizes(key, value)?;
        let _write_guard = self.write_lock.lock();

        let stored = if value.len() >= self.config.value_log_threshold {
            StoredValue::Logged(self.values.append(value)?).encode()
        } else {
            StoredValue::Inline(value).encode()
        };
        self.wal.lock().append(Operation::Put {
            key: key.to_vec(),
            value: stored.clone(),
        })?;
        self.memtable.put(key.to_vec(), stored);

        self.maybe_checkpoint()
    }

    /// Delete a key
    pub fn delete(&self, key: &[u8]) -> Result<()> {
        let _write_guard = self.write_lock.lock();

        self.wal.lock().append(Operation::Delete { key: key.to_vec() })?;
        self.memtable.delete(key);

        self.maybe_checkpoint()
    }

    /// Atomically increment the counter at `key`; returns the new value
    pub fn increment_and_get(&self, key: &[u8]) -> Result<u64> {
        self.update(key, |current| {
            let (value, next) = next_counter(current)?;
            Ok((Some(value), next))
        })
    }

    /// Atomically raise the counter at `key` to at least `value`; returns the
    /// counter afterwards
    pub fn raise_to(&self, key: &[u8], value: u64) -> Result<u64> {
        self.update(key, |current| raise_counter(current, value))
    }

    /// Add `member` to the set at `key`; true if it was not present
    pub fn add_to_set(&self, key: &[u8], member: &[u8]) -> Result<bool> {
        self.update(key, |current| {
            let updated = add_member(current, member)?;
            let added = updated.is_some();
            Ok((updated, added))
        })
    }

    /// Read-modify-write one key under the write lock
    ///
    /// `f` sees the current value and returns `(new_value, output)`. A new
    /// value is logged as a plain put of the result and kept inline; `None`
    /// writes nothing.
    fn update<T, F>(&self, key: &[u8], f: F) -> Result<T>
    where
        F: FnOnce(Option<&[u8]>) -> Result<(Option<Vec<u8>>, T)>,
    {
        let _write_guard = self.write_lock.lock();

        let (output, wrote) = self.memtable.update(key, |stored| {
            let current = stored.map(|s| self.values.resolve(s)).transpose()?;
            let (value, output) = f(current.as_deref())?;
            let Some(value) = value else {
                return Ok((None, (output, false)));
            };
            let stored = StoredValue::Inline(&value).encode();
            self.wal.lock().append(Operation::Put {
                key: key.to_vec(),
                value: stored.clone(),
            })?;
            Ok((Some(stored), (output, true)))
        })?;

        if wrote {
            self.maybe_checkpoint()?;
        }
        Ok(output)
    }

    /// Write a snapshot and truncate the WAL (public API)
    pub fn checkpoint(&self) -> Result<SnapshotInfo> {
        let _write_guard = self.write_lock.lock();
        self.checkpoint_internal()
    }

    /// Checkpoint only when the WAL has outgrown its threshold
    /// (called with write lock held)
    fn maybe_checkpoint(&self) -> Result<()> {
        let wal_bytes = self.wal.lock().bytes_written();
        if wal_bytes >= self.config.checkpoint_threshold as u64 {
            self.checkpoint_internal()?;
        }
        Ok(())
    }

    /// Internal checkpoint implementation (called with write lock held)
    fn checkpoint_internal(&self) -> Result<SnapshotInfo> {
        let mut wal = self.wal.lock();
        let last_lsn = wal.current_lsn().saturating_sub(1);

        // Step 1: Persist the keyspace, streamed from the memtable
        let info = self
            .memtable
            .scan(|entries| Snapshot::write_from(&self.snapshot_path, entries, last_lsn))?;

        // Step 2: Entries are now durable in the snapshot
        wal.truncate()?;

        tracing::debug!(entries = info.entry_count, last_lsn, "Checkpoint written");
        Ok(info)
    }

    /// Close the engine gracefully
    ///
    /// Checkpoints pending WAL entries and syncs to disk
    pub fn close(self) -> Result<()> {
        let _write_guard = self.write_lock.lock();
        if self.wal.lock().bytes_written() > 0 {
            self.checkpoint_internal()?;
        }
        self.wal.lock().sync()?;
        Ok(())
    }

    // =========================================================================
    // Accessors (for testing and debugging)
    // =========================================================================

    /// Get the data directory path
    pub fn data_dir(&self) -> &Path {
        &self.config.data_dir
    }

    /// Get the snapshot file path
    pub fn snapshot_path(&self) -> &Path {
        &self.snapshot_path
    }

    /// Get the value log path
    pub fn value_log_path(&self) -> &Path {
        self.values.path()
    }

    /// Bytes held in the value log
    pub fn value_log_size(&self) -> Result<u64> {
        self.values.size()
    }

    /// Get the current memtable size (stored forms, not resolved values)
    pub fn memtable_size(&self) -> usize {
        self.memtable.size()
    }

    /// Get the number of live keys
    pub fn entry_count(&self) -> usize {
        self.memtable.entry_count()
    }

    /// Bytes in the WAL since the last checkpoint
    pub fn wal_size(&self) -> u64 {
        self.wal.lock().bytes_written()
    }

    /// Get the configuration
    pub fn config(&self) -> &Config {
        &self.config
    }
}

impl KvBackend for Engine {
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>> {
        Engine::get(self, key)
    }

    fn set(&self, key: &[u8], value: &[u8]) -> Result<()> {
        self.put(key, value)
    }

    fn increment_and_get(&self, key: &[u8]) -> Result<u64> {
        Engine::increment_and_get(self, key)
    }

    fn raise_to(&self, key: &[u8], value: u64) -> Result<u64> {
        Engine::raise_to(self, key, value)
    }

    fn add_to_set(&self, key: &[u8], member: &[u8]) -> Result<bool> {
        Engine::add_to_set(self, key, member)
    }

    fn members(&self, key: &[u8]) -> Result<Vec<Vec<u8>>> {
        Ok(decode_members(self.get(key)?.as_deref())?.into_iter().collect())
    }
}
