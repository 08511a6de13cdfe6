//! Key-Value Backend Module
//!
//! The primitives the project store is written against, and the backends
//! that provide them.
//!
//! ## Backends
//! - [`Engine`](crate::Engine): embedded, durable (WAL + snapshot)
//! - [`MemoryKv`]: process-local, for tests and throwaway sessions
//! - [`RemoteKv`]: a `sitesmith-kv` server over TCP
//!
//! ## Value Encodings
//! - counters: ASCII decimal (`b"42"`)
//! - sets: bincode-encoded sorted set of byte strings
//!
//! ## Size Limits
//! Every backend accepts keys up to [`MAX_KEY_BYTES`] and values up to
//! [`MAX_VALUE_BYTES`], the worst-case JSON encoding of a manifest under the
//! default [`Limits`]. The wire frame and WAL entry bounds are derived from
//! these two.

mod memory;
mod remote;
mod value;

use std::sync::Arc;

use crate::error::{Result, SiteError};
use crate::manifest::Limits;

pub use memory::MemoryKv;
pub use remote::RemoteKv;
pub use value::{
    add_member, decode_counter, decode_members, encode_members, next_counter, raise_counter,
};

/// Largest key any backend accepts
pub const MAX_KEY_BYTES: usize = 64 * 1024;

/// Largest value any backend accepts
pub const MAX_VALUE_BYTES: usize = Limits::DEFAULT.max_encoded_bytes();

/// Reject a key or value no backend can carry
pub fn check_sizes(key: &[u8], value: &[u8]) -> Result<()> {
    if key.len() > MAX_KEY_BYTES {
        return Err(SiteError::Persistence(format!(
            "Key of {} bytes exceeds {} bytes",
            key.len(),
            MAX_KEY_BYTES
        )));
    }
    if value.len() > MAX_VALUE_BYTES {
        return Err(SiteError::Persistence(format!(
            "Value of {} bytes exceeds {} bytes",
            value.len(),
            MAX_VALUE_BYTES
        )));
    }
    Ok(())
}

/// Primitive operations of a key-value backend
///
/// `increment_and_get`, `raise_to` and `add_to_set` must be atomic per key:
/// concurrent callers each observe a distinct result and no update is lost.
pub trait KvBackend: Send + Sync {
    /// Read a value
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>>;

    /// Write a value, replacing any previous one
    fn set(&self, key: &[u8], value: &[u8]) -> Result<()>;

    /// Add one to the counter at `key` (absent = 0) and return the new value
    fn increment_and_get(&self, key: &[u8]) -> Result<u64>;

    /// Raise the counter at `key` to `value` unless it is already higher;
    /// returns the counter afterwards
    fn raise_to(&self, key: &[u8], value: u64) -> Result<u64>;

    /// Add `member` to the set at `key`; true if it was not present
    fn add_to_set(&self, key: &[u8], member: &[u8]) -> Result<bool>;

    /// Members of the set at `key`, sorted; empty if absent
    fn members(&self, key: &[u8]) -> Result<Vec<Vec<u8>>>;
}

impl<T: KvBackend + ?Sized> KvBackend for Arc<T> {
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>> {
        (**self).get(key)
    }

    fn set(&self, key: &[u8], value: &[u8]) -> Result<()> {
        (**self).set(key, value)
    }

    fn increment_and_get(&self, key: &[u8]) -> Result<u64> {
        (**self).increment_and_get(key)
    }

    fn raise_to(&self, key: &[u8], value: u64) -> Result<u64> {
        (**self).raise_to(key, value)
    }

    fn add_to_set(&self, key: &[u8], member: &[u8]) -> Result<bool> {
        (**self).add_to_set(key, member)
    }

    fn members(&self, key: &[u8]) -> Result<Vec<Vec<u8>>> {
        (**self).members(key)
    }
}
