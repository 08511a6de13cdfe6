//! MemTable Module
//!
//! In-memory home of the whole keyspace. The engine keeps large values in
//! its value log and stores only their pointers here.
//!
//! ## Responsibilities
//! - Fast reads and writes in memory
//! - Single-writer/multi-reader access pattern
//! - Atomic read-modify-write for counters and sets
//! - Ordered iteration for snapshot creation
//!
//! ## Data Structure Choice
//! `BTreeMap` wrapped in a `parking_lot::RwLock`:
//! - Ordered keys (snapshots are written sorted)
//! - `update` holds the write lock across read and write, which is what makes
//!   `increment_and_get` and `add_to_set` atomic

mod table;

pub use table::{Entries, MemTable};
