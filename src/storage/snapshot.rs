//! Snapshot reader/writer

use std::fs::{self, File, OpenOptions};
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};

use crate::error::{Result, SiteError};

/// Magic bytes identifying a Sitesmith snapshot file
const MAGIC: &[u8; 4] = b"SSKV";

/// Current snapshot format version
const VERSION: u16 = 1;

/// Magic (4) + Version (2) + Count (8)
const HEADER_SIZE: usize = 14;

/// Last LSN (8) + CRC (4)
const FOOTER_SIZE: usize = 12;

/// Summary of a written or loaded snapshot
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SnapshotInfo {
    pub path: PathBuf,
    pub entry_count: u64,
    /// Highest WAL LSN folded into this snapshot
    pub last_lsn: u64,
}

/// Whole-keyspace checkpoint file
pub struct Snapshot;

impl Snapshot {
    /// Write `entries` (sorted) to `path`, replacing any previous snapshot
    pub fn write(path: &Path, entries: &[(Vec<u8>, Vec<u8>)], last_lsn: u64) -> Result<SnapshotInfo> {
        Self::write_from(
            path,
            entries.iter().map(|(k, v)| (k.as_slice(), v.as_slice())),
            last_lsn,
        )
    }

    /// Stream borrowed entries (sorted) to `path` without collecting them
    pub fn write_from<'a, I>(path: &Path, entries: I, last_lsn: u64) -> Result<SnapshotInfo>
    where
        I: ExactSizeIterator<Item = (&'a [u8], &'a [u8])>,
    {
        let entry_count = entries.len() as u64;
        let tmp_path = path.with_extension("tmp");
        {
            let file = OpenOptions::new()
                .create(true)
                .write(true)
                .truncate(true)
                .open(&tmp_path)?;
            let mut writer = BufWriter::new(file);
            let mut hasher = crc32fast::Hasher::new();

            writer.write_all(MAGIC)?;
            writer.write_all(&VERSION.to_le_bytes())?;
            writer.write_all(&entry_count.to_le_bytes())?;

            for (key, value) in entries {
                let key_len = (key.len() as u32).to_le_bytes();
                let value_len = (value.len() as u32).to_le_bytes();
                for chunk in [&key_len[..], &value_len[..], key, value] {
                    hasher.update(chunk);
                    writer.write_all(chunk)?;
                }
            }

            writer.write_all(&last_lsn.to_le_bytes())?;
            writer.write_all(&hasher.finalize().to_le_bytes())?;
            writer.flush()?;
            writer.get_ref().sync_all()?;
        }
        fs::rename(&tmp_path, path)?;

        Ok(SnapshotInfo {
            path: path.to_path_buf(),
            entry_count,
            last_lsn,
        })
    }

    /// Load and validate a snapshot; entries come back in file order
    pub fn load(path: &Path) -> Result<(Vec<(Vec<u8>, Vec<u8>)>, SnapshotInfo)> {
        let mut bytes = Vec::new();
        BufReader::new(File::open(path)?).read_to_end(&mut bytes)?;

        if bytes.len() < HEADER_SIZE + FOOTER_SIZE {
            return Err(SiteError::Storage(format!(
                "Snapshot too small: {} bytes",
                bytes.len()
            )));
        }
        if &bytes[0..4] != MAGIC {
            return Err(SiteError::Storage(format!(
                "Invalid snapshot magic: {:?}",
                &bytes[0..4]
            )));
        }
        let version = u16::from_le_bytes([bytes[4], bytes[5]]);
        if version != VERSION {
            return Err(SiteError::Storage(format!(
                "Unsupported snapshot version: {}",
                version
            )));
        }
        let entry_count = read_u64(&bytes, 6);

        let data_end = bytes.len() - FOOTER_SIZE;
        let last_lsn = read_u64(&bytes, data_end);
        let stored_crc = read_u32(&bytes, data_end + 8);
        let data = &bytes[HEADER_SIZE..data_end];
        if crc32fast::hash(data) != stored_crc {
            return Err(SiteError::Storage("Snapshot checksum mismatch".to_string()));
        }

        let mut entries = Vec::with_capacity(entry_count.min(1 << 20) as usize);
        let mut pos = 0;
        while pos < data.len() {
            if pos + 8 > data.len() {
                return Err(SiteError::Storage("Truncated snapshot entry header".to_string()));
            }
            let key_len = read_u32(data, pos) as usize;
            let value_len = read_u32(data, pos + 4) as usize;
            pos += 8;
            if pos + key_len + value_len > data.len() {
                return Err(SiteError::Storage("Truncated snapshot entry".to_string()));
            }
            let key = data[pos..pos + key_len].to_vec();
            pos += key_len;
            let value = data[pos..pos + value_len].to_vec();
            pos += value_len;
            entries.push((key, value));
        }

        if entries.len() as u64 != entry_count {
            return Err(SiteError::Storage(format!(
                "Snapshot entry count mismatch: header {}, found {}",
                entry_count,
                entries.len()
            )));
        }

        Ok((
            entries,
            SnapshotInfo {
                path: path.to_path_buf(),
                entry_count,
                last_lsn,
            },
        ))
    }
}

fn read_u64(bytes: &[u8], at: usize) -> u64 {
    let mut buf = [0u8; 8];
    buf.copy_from_slice(&bytes[at..at + 8]);
    u64::from_le_bytes(buf)
}

fn read_u32(bytes: &[u8], at: usize) -> u32 {
    u32::from_le_bytes([bytes[at], bytes[at + 1], bytes[at + 2], bytes[at + 3]])
}
