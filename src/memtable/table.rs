//! MemTable implementation
//!
//! BTreeMap-based memtable with RwLock for concurrency.

use std::collections::{btree_map, BTreeMap};
use std::sync::atomic::{AtomicUsize, Ordering};

use parking_lot::RwLock;

use crate::error::Result;

/// In-memory key-value table
pub struct MemTable {
    /// Sorted key → value map
    data: RwLock<BTreeMap<Vec<u8>, Vec<u8>>>,

    /// Approximate size in bytes (keys + values)
    size: AtomicUsize,
}

impl MemTable {
    /// Create a new empty MemTable
    pub fn new() -> Self {
        Self {
            data: RwLock::new(BTreeMap::new()),
            size: AtomicUsize::new(0),
        }
    }

    /// Get a value by key (read lock)
    pub fn get(&self, key: &[u8]) -> Option<Vec<u8>> {
        self.data.read().get(key).cloned()
    }

    /// Put a key-value pair (write lock); returns the new approximate size
    pub fn put(&self, key: Vec<u8>, value: Vec<u8>) -> usize {
        let mut data = self.data.write();
        self.insert_locked(&mut data, key, value)
    }

    /// Remove a key (write lock); returns the new approximate size
    pub fn delete(&self, key: &[u8]) -> usize {
        let mut data = self.data.write();
        if let Some(old) = data.remove(key) {
            self.size.fetch_sub(key.len() + old.len(), Ordering::SeqCst);
        }
        self.size.load(Ordering::SeqCst)
    }

    /// Atomically read, transform and write one key
    ///
    /// `f` sees the current value and returns `(new_value, output)`. A `None`
    /// new value leaves the key untouched. The write lock is held throughout,
    /// so concurrent updates to the same key are serialized.
    pub fn update<T, F>(&self, key: &[u8], f: F) -> Result<T>
    where
        F: FnOnce(Option<&[u8]>) -> Result<(Option<Vec<u8>>, T)>,
    {
        let mut data = self.data.write();
        let (new_value, output) = f(data.get(key).map(|v| v.as_slice()))?;
        if let Some(value) = new_value {
            self.insert_locked(&mut data, key.to_vec(), value);
        }
        Ok(output)
    }

    /// Get approximate size in bytes
    pub fn size(&self) -> usize {
        self.size.load(Ordering::SeqCst)
    }

    /// Get entry count
    pub fn entry_count(&self) -> usize {
        self.data.read().len()
    }

    /// Check if the table holds no entries
    pub fn is_empty(&self) -> bool {
        self.data.read().is_empty()
    }

    /// Snapshot of all entries in sorted key order
    pub fn iter(&self) -> Vec<(Vec<u8>, Vec<u8>)> {
        self.data
            .read()
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }

    /// Run `f` over all entries in sorted key order under one read lock
    ///
    /// Nothing is copied; writers wait until `f` returns.
    pub fn scan<T>(&self, f: impl FnOnce(Entries<'_>) -> T) -> T {
        let data = self.data.read();
        f(Entries { inner: data.iter() })
    }

    /// Clear all entries
    pub fn clear(&self) {
        let mut data = self.data.write();
        data.clear();
        self.size.store(0, Ordering::SeqCst);
    }

    fn insert_locked(&self, data: &mut BTreeMap<Vec<u8>, Vec<u8>>, key: Vec<u8>, value: Vec<u8>) -> usize {
        let key_len = key.len();
        let value_len = value.len();
        match data.insert(key, value) {
            // Key bytes were already counted; only the value size changes
            Some(old) => {
                self.size.fetch_sub(old.len(), Ordering::SeqCst);
                self.size.fetch_add(value_len, Ordering::SeqCst);
            }
            None => {
                self.size.fetch_add(key_len + value_len, Ordering::SeqCst);
            }
        }
        self.size.load(Ordering::SeqCst)
    }
}

/// Borrowed entries handed out by [`MemTable::scan`]
pub struct Entries<'a> {
    inner: btree_map::Iter<'a, Vec<u8>, Vec<u8>>,
}

impl<'a> Iterator for Entries<'a> {
    type Item = (&'a [u8], &'a [u8]);

    fn next(&mut self) -> Option<Self::Item> {
        self.inner.next().map(|(k, v)| (k.as_slice(), v.as_slice()))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}

impl ExactSizeIterator for Entries<'_> {}

impl Default for MemTable {
    fn default() -> Self {
        Self::new()
    }
}
