//! In-memory backend

use crate::error::Result;
use crate::memtable::MemTable;

use super::{add_member, check_sizes, decode_members, next_counter, raise_counter, KvBackend};

/// Process-local backend over a [`MemTable`]; contents die with the process
#[derive(Default)]
pub struct MemoryKv {
    table: MemTable,
}

impl MemoryKv {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of keys held
    pub fn len(&self) -> usize {
        self.table.entry_count()
    }

    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }
}

impl KvBackend for MemoryKv {
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>> {
        Ok(self.table.get(key))
    }

    fn set(&self, key: &[u8], value: &[u8]) -> Result<()> {
        check_sizes(key, value)?;
        self.table.put(key.to_vec(), value.to_vec());
        Ok(())
    }

    fn increment_and_get(&self, key: &[u8]) -> Result<u64> {
        self.table.update(key, |current| {
            let (value, next) = next_counter(current)?;
            Ok((Some(value), next))
        })
    }

    fn raise_to(&self, key: &[u8], value: u64) -> Result<u64> {
        self.table.update(key, |current| raise_counter(current, value))
    }

    fn add_to_set(&self, key: &[u8], member: &[u8]) -> Result<bool> {
        self.table.update(key, |current| {
            let updated = add_member(current, member)?;
            let added = updated.is_some();
            Ok((updated, added))
        })
    }

    fn members(&self, key: &[u8]) -> Result<Vec<Vec<u8>>> {
        let value = self.table.get(key);
        Ok(decode_members(value.as_deref())?.into_iter().collect())
    }
}
