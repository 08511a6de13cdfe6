//! Storage Module
//!
//! On-disk files of the embedded engine besides the WAL.
//!
//! ## Responsibilities
//! - Persist the keyspace in sorted order at each checkpoint
//! - Detect corruption before anything is loaded
//! - Replace the previous checkpoint atomically (temp file + rename)
//! - Keep large values out of memory in an append-only value log
//!
//! ## Snapshot Format (V1)
//! ```text
//! ┌────────────────────────────────────────┐
//! │ Header                                 │
//! │ ┌──────────┬──────────┬──────────────┐ │
//! │ │Magic (4) │Version(2)│ Count (8)    │ │
//! │ └──────────┴──────────┴──────────────┘ │
//! ├────────────────────────────────────────┤
//! │ Data Block                             │
//! │ ┌────────┬────────┬─────┬───────────┐  │
//! │ │KeyLen 4│ValLen 4│ Key │   Value   │  │
//! │ └────────┴────────┴─────┴───────────┘  │
//! │ ... (repeated for each entry)          │
//! ├────────────────────────────────────────┤
//! │ Footer                                 │
//! │ ┌──────────────────┬─────────────────┐ │
//! │ │ Last LSN (8)     │  Data CRC32 (4) │ │
//! │ └──────────────────┴─────────────────┘ │
//! └────────────────────────────────────────┘
//! ```

mod snapshot;
mod value_log;

pub use snapshot::{Snapshot, SnapshotInfo};
pub use value_log::{StoredValue, ValueLog, ValuePointer};
