//! Configuration for Sitesmith
//!
//! Centralized configuration with sensible defaults.

use std::path::PathBuf;

use crate::error::{Result, SiteError};
use crate::kv::MAX_VALUE_BYTES;
use crate::manifest::{Limits, DOCTYPE, MAX_FILES, MAX_FILE_BYTES};

/// Main configuration for a Sitesmith instance
#[derive(Debug, Clone)]
pub struct Config {
    // -------------------------------------------------------------------------
    // Storage Configuration
    // -------------------------------------------------------------------------
    /// Root directory for the embedded key-value engine
    /// Internal structure:
    ///   {data_dir}/
    ///     ├── wal.log          (write-ahead log)
    ///     ├── values.log       (large values, append-only)
    ///     └── snapshot.db      (last checkpoint)
    pub data_dir: PathBuf,

    /// Sync strategy: how often to fsync WAL
    pub wal_sync_strategy: WalSyncStrategy,

    /// WAL bytes written since the last checkpoint before a new one is taken
    pub checkpoint_threshold: usize,

    /// Values of at least this many bytes are kept in the value log
    pub value_log_threshold: usize,

    /// Where versioned projects are persisted
    pub store_backend: StoreBackend,

    // -------------------------------------------------------------------------
    // Network Configuration
    // -------------------------------------------------------------------------
    /// TCP listen address for the key-value server
    pub listen_addr: String,

    /// Worker threads serving client connections
    pub max_connections: usize,

    /// Connection read timeout (milliseconds, 0 = none)
    pub read_timeout_ms: u64,

    /// Connection write timeout (milliseconds, 0 = none)
    pub write_timeout_ms: u64,

    // -------------------------------------------------------------------------
    // Completion Service Configuration
    // -------------------------------------------------------------------------
    /// Chat-completions endpoint
    pub api_url: String,

    /// Bearer credential; generation is rejected when absent
    pub api_key: Option<String>,

    /// Model used when the request does not name one
    pub model: String,

    pub temperature: f32,

    pub max_tokens: u32,

    /// Whole-request timeout for the completion call (milliseconds)
    pub request_timeout_ms: u64,

    // -------------------------------------------------------------------------
    // Manifest Limits
    // -------------------------------------------------------------------------
    /// Files kept per manifest
    pub max_files: usize,

    /// Per-file content budget in bytes
    pub max_file_bytes: usize,
}

/// WAL sync strategy
#[derive(Debug, Clone, Copy)]
pub enum WalSyncStrategy {
    /// fsync after every write (safest, slowest)
    EveryWrite,

    /// fsync after N uncommitted entries (balanced durability/performance)
    EveryNEntries { count: usize },
}

/// Persistence backend for versioned projects
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreBackend {
    /// No persistence; generation still works, versions are not recorded
    Disabled,

    /// Process-local map, lost on exit
    Memory,

    /// Embedded engine rooted at `data_dir`
    Embedded,

    /// A `sitesmith-kv` server
    Remote { addr: String },
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("./sitesmith_data"),
            wal_sync_strategy: WalSyncStrategy::EveryNEntries { count: 100 },
            checkpoint_threshold: 4 * 1024 * 1024, // 4 MB
            value_log_threshold: 4 * 1024,
            store_backend: StoreBackend::Disabled,
            listen_addr: "127.0.0.1:6380".to_string(),
            max_connections: 64,
            read_timeout_ms: 30_000,
            write_timeout_ms: 5000,
            api_url: "https://api.groq.com/openai/v1/chat/completions".to_string(),
            api_key: None,
            model: "qwen/qwen3-32b".to_string(),
            temperature: 0.6,
            max_tokens: 4096,
            request_timeout_ms: 120_000,
            max_files: MAX_FILES,
            max_file_bytes: MAX_FILE_BYTES,
        }
    }
}

impl Config {
    /// Create a new config builder
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::default()
    }

    /// Reject values that would break manifest invariants or the worker pool
    pub fn validate(&self) -> Result<()> {
        if self.max_files == 0 {
            return Err(SiteError::Config("max_files must be at least 1".to_string()));
        }
        // The byte cap must leave room for the doctype so truncation never cuts it
        if self.max_file_bytes <= DOCTYPE.len() {
            return Err(SiteError::Config(format!(
                "max_file_bytes must exceed {} bytes",
                DOCTYPE.len()
            )));
        }
        // Every manifest these limits admit must fit through every backend
        let encoded = Limits::from_config(self).max_encoded_bytes();
        if encoded > MAX_VALUE_BYTES {
            return Err(SiteError::Config(format!(
                "max_files x max_file_bytes allows manifests of up to {} encoded bytes; the store carries at most {}",
                encoded, MAX_VALUE_BYTES
            )));
        }
        if self.max_connections == 0 {
            return Err(SiteError::Config(
                "max_connections must be at least 1".to_string(),
            ));
        }
        if let StoreBackend::Remote { addr } = &self.store_backend {
            if addr.trim().is_empty() {
                return Err(SiteError::Config("remote store address is empty".to_string()));
            }
        }
        Ok(())
    }
}

/// Builder for Config
#[derive(Default)]
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    /// Set the data directory (root for the embedded engine)
    pub fn data_dir(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.data_dir = path.into();
        self
    }

    /// Set the WAL sync strategy
    pub fn wal_sync_strategy(mut self, strategy: WalSyncStrategy) -> Self {
        self.config.wal_sync_strategy = strategy;
        self
    }

    /// Set the WAL size (in bytes) that triggers a checkpoint
    pub fn checkpoint_threshold(mut self, bytes: usize) -> Self {
        self.config.checkpoint_threshold = bytes;
        self
    }

    /// Set the value size (in bytes) from which values go to the value log
    pub fn value_log_threshold(mut self, bytes: usize) -> Self {
        self.config.value_log_threshold = bytes;
        self
    }

    /// Set the project persistence backend
    pub fn store_backend(mut self, backend: StoreBackend) -> Self {
        self.config.store_backend = backend;
        self
    }

    /// Set the TCP listen address
    pub fn listen_addr(mut self, addr: impl Into<String>) -> Self {
        self.config.listen_addr = addr.into();
        self
    }

    /// Set the number of connection workers
    pub fn max_connections(mut self, count: usize) -> Self {
        self.config.max_connections = count;
        self
    }

    /// Set the read timeout (in milliseconds)
    pub fn read_timeout_ms(mut self, ms: u64) -> Self {
        self.config.read_timeout_ms = ms;
        self
    }

    /// Set the write timeout (in milliseconds)
    pub fn write_timeout_ms(mut self, ms: u64) -> Self {
        self.config.write_timeout_ms = ms;
        self
    }

    /// Set the completion endpoint URL
    pub fn api_url(mut self, url: impl Into<String>) -> Self {
        self.config.api_url = url.into();
        self
    }

    /// Set (or clear) the completion credential
    pub fn api_key(mut self, key: Option<String>) -> Self {
        self.config.api_key = key.filter(|k| !k.trim().is_empty());
        self
    }

    /// Set the default model
    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.config.model = model.into();
        self
    }

    pub fn temperature(mut self, temperature: f32) -> Self {
        self.config.temperature = temperature;
        self
    }

    pub fn max_tokens(mut self, tokens: u32) -> Self {
        self.config.max_tokens = tokens;
        self
    }

    pub fn request_timeout_ms(mut self, ms: u64) -> Self {
        self.config.request_timeout_ms = ms;
        self
    }

    /// Set the per-manifest file cap
    pub fn max_files(mut self, count: usize) -> Self {
        self.config.max_files = count;
        self
    }

    /// Set the per-file byte budget
    pub fn max_file_bytes(mut self, bytes: usize) -> Self {
        self.config.max_file_bytes = bytes;
        self
    }

    pub fn build(self) -> Config {
        self.config
    }
}
