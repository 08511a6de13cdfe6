//! Versioned Project Store
//!
//! Persists manifests under a per-(owner, project) version that only ever
//! grows, and answers listing/lookup queries.
//!
//! ## Key Layout
//! ```text
//! project:{len}:{owner}:{len}:{project}:seq       → last reserved version
//! project:{len}:{owner}:{len}:{project}:version   → latest stored version
//! project:{len}:{owner}:{len}:{project}:v{n}      → manifest JSON for version n
//! projects:{owner}                                → set of project ids
//! ```
//! `{len}` is the byte length of the part that follows, so ids containing
//! `:` cannot alias another (owner, project) pair.
//!
//! ## Versioning
//! `put` reserves its version with the backend's atomic
//! `increment_and_get` on `seq`, so concurrent puts for the same project each
//! get a distinct version and neither manifest is overwritten. Only after the
//! manifest is written does `raise_to` move `version` forward, so the latest
//! version always names a stored manifest. A put that fails after reserving
//! leaves a gap in `seq`; versions are never reused.

use serde::{Deserialize, Serialize};

use crate::error::{Result, SiteError};
use crate::kv::{check_sizes, decode_counter, KvBackend};
use crate::manifest::Manifest;

/// One entry of an owner's project listing
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectSummary {
    pub project_id: String,
    pub last_version: u64,
}

/// Versioned manifest storage
pub trait ProjectStore: Send + Sync {
    /// Latest stored version; 0 when the project has none
    fn latest_version(&self, owner: &str, project_id: &str) -> Result<u64>;

    /// The manifest stored at exactly `version`
    fn get(&self, owner: &str, project_id: &str, version: u64) -> Result<Option<Manifest>>;

    /// Store `manifest` as the next version and return that version
    fn put(&self, owner: &str, project_id: &str, manifest: &Manifest) -> Result<u64>;

    /// The owner's projects with their latest versions, sorted by id
    fn list(&self, owner: &str) -> Result<Vec<ProjectSummary>>;
}

/// [`ProjectStore`] over any [`KvBackend`]
pub struct KvProjectStore<B> {
    backend: B,
}

impl<B: KvBackend> KvProjectStore<B> {
    pub fn new(backend: B) -> Self {
        Self { backend }
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    fn project_key(owner: &str, project_id: &str, suffix: &str) -> Vec<u8> {
        format!(
            "project:{}:{}:{}:{}:{}",
            owner.len(),
            owner,
            project_id.len(),
            project_id,
            suffix
        )
        .into_bytes()
    }

    fn sequence_key(owner: &str, project_id: &str) -> Vec<u8> {
        Self::project_key(owner, project_id, "seq")
    }

    fn version_key(owner: &str, project_id: &str) -> Vec<u8> {
        Self::project_key(owner, project_id, "version")
    }

    fn manifest_key(owner: &str, project_id: &str, version: u64) -> Vec<u8> {
        Self::project_key(owner, project_id, &format!("v{}", version))
    }

    fn index_key(owner: &str) -> Vec<u8> {
        format!("projects:{}", owner).into_bytes()
    }
}

impl<B: KvBackend> ProjectStore for KvProjectStore<B> {
    fn latest_version(&self, owner: &str, project_id: &str) -> Result<u64> {
        let value = self.backend.get(&Self::version_key(owner, project_id))?;
        decode_counter(value.as_deref())
    }

    fn get(&self, owner: &str, project_id: &str, version: u64) -> Result<Option<Manifest>> {
        if version == 0 {
            return Ok(None);
        }
        match self.backend.get(&Self::manifest_key(owner, project_id, version))? {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }

    fn put(&self, owner: &str, project_id: &str, manifest: &Manifest) -> Result<u64> {
        let body = serde_json::to_vec(manifest)?;
        // Widest manifest key this project can produce
        check_sizes(&Self::manifest_key(owner, project_id, u64::MAX), &body)?;

        let version = self
            .backend
            .increment_and_get(&Self::sequence_key(owner, project_id))?;
        self.backend
            .set(&Self::manifest_key(owner, project_id, version), &body)?;
        self.backend
            .raise_to(&Self::version_key(owner, project_id), version)?;
        self.backend
            .add_to_set(&Self::index_key(owner), project_id.as_bytes())?;

        tracing::debug!(owner, project_id, version, "Stored manifest");
        Ok(version)
    }

    fn list(&self, owner: &str) -> Result<Vec<ProjectSummary>> {
        let mut summaries = Vec::new();
        for member in self.backend.members(&Self::index_key(owner))? {
            let project_id = String::from_utf8(member)
                .map_err(|e| SiteError::Storage(format!("Project id is not UTF-8: {}", e)))?;
            let last_version = self.latest_version(owner, &project_id)?;
            summaries.push(ProjectSummary {
                project_id,
                last_version,
            });
        }
        summaries.sort_by(|a, b| a.project_id.cmp(&b.project_id));
        Ok(summaries)
    }
}
