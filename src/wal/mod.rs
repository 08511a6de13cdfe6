//! Write-Ahead Log
//!
//! Every engine mutation is appended here before it touches the memtable.
//! Since the memtable holds the whole keyspace, the log only has to cover
//! what happened after the last snapshot; a checkpoint truncates it.
//!
//! ## Frame
//! ```text
//! ┌──────────┬──────────┬──────────┬──────────────────────────┐
//! │ LSN (8)  │ CRC (4)  │ Len (4)  │ bincode(op, timestamp)   │
//! └──────────┴──────────┴──────────┴──────────────────────────┘
//! ```
//! All integers are big-endian. The CRC covers the LSN and the payload, so
//! a frame copied to the wrong position fails its check.
//!
//! ## Recovery
//! A complete frame with a bad CRC is skipped. A frame cut short by a crash
//! can only be the last one, so it is truncated away and appends resume
//! from the previous frame boundary.

mod entry;
mod reader;
mod recovery;
mod writer;

pub use entry::{Operation, WalEntry, HEADER_SIZE, MAX_ENTRY_SIZE};
pub use reader::{ReadOutcome, WalIterator, WalReader};
pub use recovery::{RecoveryResult, WalRecovery};
pub use writer::WalWriter;
