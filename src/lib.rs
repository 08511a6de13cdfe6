//! # Sitesmith
//!
//! Prompt-to-website generation with:
//! - A normalizer that shapes untrusted completion output into a manifest
//! - Versioned project storage with atomic per-project version assignment
//! - A bundler that inlines a manifest into one sandbox-ready document
//! - An embedded, WAL-backed key-value engine (and a TCP server for it)
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                       SiteService                            │
//! │            generate / projects / preview                     │
//! └──────┬──────────────────┬───────────────────────┬───────────┘
//!        │                  │                       │
//!        ▼                  ▼                       ▼
//!  ┌────────────┐    ┌─────────────┐         ┌─────────────┐
//!  │ Completion │    │ Normalizer  │         │   Bundler   │
//!  │  (HTTP)    │    │ (manifest)  │         │  (bundle)   │
//!  └────────────┘    └─────────────┘         └─────────────┘
//!                           │
//!                           ▼
//!                   ┌───────────────┐
//!                   │ ProjectStore  │
//!                   └───────┬───────┘
//!                           │ KvBackend
//!          ┌────────────────┼────────────────┐
//!          ▼                ▼                ▼
//!   ┌─────────────┐  ┌─────────────┐  ┌─────────────┐
//!   │  MemoryKv   │  │   Engine    │  │  RemoteKv   │──► sitesmith-kv
//!   └─────────────┘  │ WAL+Snapshot│  └─────────────┘
//!                    └─────────────┘
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod config;

pub mod manifest;
pub mod bundle;
pub mod store;
pub mod completion;
pub mod service;

pub mod kv;
pub mod wal;
pub mod memtable;
pub mod storage;
pub mod network;
pub mod protocol;
pub mod engine;

// =============================================================================
// Public API Re-exports
// =============================================================================

pub use error::{ErrorKind, Result, SiteError};
pub use config::{Config, StoreBackend};
pub use manifest::{normalize, FileEntry, Manifest};
pub use bundle::bundle;
pub use store::{KvProjectStore, ProjectStore, ProjectSummary};
pub use service::SiteService;
pub use kv::KvBackend;
pub use engine::Engine;

// =============================================================================
// Version Info
// =============================================================================

/// Current version of Sitesmith
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
