//! Service Module
//!
//! The operations exposed to callers: generate a site, list or fetch stored
//! versions, and render a stored version for preview.
//!
//! ## Generate Flow
//! ```text
//! request ─► validate ─► completion ─► normalize ─► store.put ─► response
//!                                                      │
//!                                         (best effort; failure = v1)
//! ```

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::bundle::bundle;
use crate::completion::{CompletionClient, CompletionRequest, HttpCompletionClient};
use crate::config::{Config, StoreBackend};
use crate::engine::Engine;
use crate::error::{Result, SiteError};
use crate::kv::{MemoryKv, RemoteKv};
use crate::manifest::{normalize_with, Limits, Manifest};
use crate::store::{KvProjectStore, ProjectStore, ProjectSummary};

/// Version reported when nothing was persisted
pub const UNPERSISTED_VERSION: u64 = 1;

/// Body of a generate call
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateRequest {
    #[serde(default)]
    pub prompt: String,

    /// Human-chosen display name
    #[serde(default)]
    pub username: String,

    /// Stable caller identifier; preferred over `username` as owner key
    #[serde(default)]
    pub user_id: Option<String>,

    #[serde(default)]
    pub project_id: String,

    #[serde(default)]
    pub model: Option<String>,
}

impl GenerateRequest {
    /// Storage namespace for this caller
    pub fn owner_key(&self) -> &str {
        self.user_id
            .as_deref()
            .map(str::trim)
            .filter(|id| !id.is_empty())
            .unwrap_or(self.username.trim())
    }

    fn validate(&self) -> Result<()> {
        let missing: Vec<&str> = [
            ("prompt", &self.prompt),
            ("username", &self.username),
            ("projectId", &self.project_id),
        ]
        .into_iter()
        .filter(|(_, value)| value.trim().is_empty())
        .map(|(name, _)| name)
        .collect();

        if missing.is_empty() {
            Ok(())
        } else {
            Err(SiteError::InvalidRequest(format!(
                "Missing fields: {}. Required: prompt, username, projectId.",
                missing.join(", ")
            )))
        }
    }
}

/// Result of a generate call
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateResponse {
    pub project_id: String,
    pub version: u64,
    pub manifest: Manifest,
}

/// Query of the projects endpoint
///
/// `user_key` alone lists projects; with `project_id` and `version` it
/// fetches one stored manifest. This is also the deep-link triple (owner,
/// project, version).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectsQuery {
    #[serde(default)]
    pub user_key: String,

    #[serde(default)]
    pub project_id: Option<String>,

    #[serde(default)]
    pub version: Option<u64>,
}

/// Answer of the projects endpoint; serializes as a bare list or manifest
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ProjectsResponse {
    List(Vec<ProjectSummary>),
    Manifest(Option<Manifest>),
}

/// Generation, lookup and preview over injected collaborators
pub struct SiteService {
    completion: Option<Arc<dyn CompletionClient>>,
    store: Option<Arc<dyn ProjectStore>>,
    limits: Limits,
    default_model: String,
    temperature: f32,
    max_tokens: u32,
}

impl SiteService {
    /// Assemble from explicit parts
    ///
    /// `None` for `completion` makes every generate call `Unconfigured`;
    /// `None` for `store` disables persistence.
    pub fn new(
        completion: Option<Arc<dyn CompletionClient>>,
        store: Option<Arc<dyn ProjectStore>>,
        config: &Config,
    ) -> Self {
        Self {
            completion,
            store,
            limits: Limits::from_config(config),
            default_model: config.model.clone(),
            temperature: config.temperature,
            max_tokens: config.max_tokens,
        }
    }

    /// Build the collaborators `config` describes
    ///
    /// A missing credential or an unopenable store is not an error here:
    /// the service starts without that capability and logs why.
    pub fn from_config(config: &Config) -> Result<Self> {
        config.validate()?;

        let completion: Option<Arc<dyn CompletionClient>> = match config.api_key {
            Some(_) => Some(Arc::new(HttpCompletionClient::from_config(config)?)),
            None => {
                tracing::warn!("No completion API key configured; generation is disabled");
                None
            }
        };

        let store = match open_store(config) {
            Ok(store) => store,
            Err(e) => {
                tracing::warn!("Project store unavailable, continuing without persistence: {}", e);
                None
            }
        };

        Ok(Self::new(completion, store, config))
    }

    /// True when a project store is attached
    pub fn has_store(&self) -> bool {
        self.store.is_some()
    }

    /// Generate a site from a prompt and persist it as the next version
    pub fn generate(&self, request: &GenerateRequest) -> Result<GenerateResponse> {
        request.validate()?;
        let completion = self
            .completion
            .as_ref()
            .ok_or_else(|| SiteError::Unconfigured("completion API key is not set".to_string()))?;

        let completion_request = CompletionRequest {
            model: request
                .model
                .clone()
                .filter(|m| !m.trim().is_empty())
                .unwrap_or_else(|| self.default_model.clone()),
            temperature: self.temperature,
            max_tokens: self.max_tokens,
            prompt: request.prompt.trim().to_string(),
        };
        let raw = completion.complete(&completion_request)?;
        let manifest = normalize_with(&raw, &self.limits);

        let owner = request.owner_key();
        let project_id = request.project_id.trim();
        let version = self.persist(owner, project_id, &manifest);

        tracing::info!(
            owner,
            project_id,
            version,
            files = manifest.files.len(),
            "Generated site"
        );

        Ok(GenerateResponse {
            project_id: project_id.to_string(),
            version,
            manifest,
        })
    }

    /// List an owner's projects, or fetch one stored manifest
    pub fn projects(&self, query: &ProjectsQuery) -> Result<ProjectsResponse> {
        let owner = query.user_key.trim();
        if owner.is_empty() {
            return Err(SiteError::InvalidRequest("Missing userKey".to_string()));
        }

        match (query.project_id.as_deref(), query.version) {
            (Some(project_id), Some(version)) => {
                Ok(ProjectsResponse::Manifest(self.load(owner, project_id, version)?))
            }
            _ => Ok(ProjectsResponse::List(self.list(owner)?)),
        }
    }

    /// The owner's projects; empty without a store
    pub fn list(&self, owner: &str) -> Result<Vec<ProjectSummary>> {
        match &self.store {
            Some(store) => store.list(owner),
            None => Ok(Vec::new()),
        }
    }

    /// One stored manifest; `None` without a store or when absent
    pub fn load(&self, owner: &str, project_id: &str, version: u64) -> Result<Option<Manifest>> {
        match &self.store {
            Some(store) => store.get(owner, project_id, version),
            None => Ok(None),
        }
    }

    /// Bundle a stored version into one previewable document
    pub fn preview(&self, owner: &str, project_id: &str, version: u64) -> Result<Option<String>> {
        Ok(self.load(owner, project_id, version)?.map(|m| bundle(&m)))
    }

    /// Store best-effort; failures are logged and reported as version 1
    fn persist(&self, owner: &str, project_id: &str, manifest: &Manifest) -> u64 {
        let Some(store) = &self.store else {
            return UNPERSISTED_VERSION;
        };
        match store.put(owner, project_id, manifest) {
            Ok(version) => version,
            Err(e) => {
                tracing::warn!(owner, project_id, "Persisting manifest failed: {}", e);
                UNPERSISTED_VERSION
            }
        }
    }
}

/// Open the configured backend as a project store
pub fn open_store(config: &Config) -> Result<Option<Arc<dyn ProjectStore>>> {
    let store: Arc<dyn ProjectStore> = match &config.store_backend {
        StoreBackend::Disabled => return Ok(None),
        StoreBackend::Memory => Arc::new(KvProjectStore::new(MemoryKv::new())),
        StoreBackend::Embedded => Arc::new(KvProjectStore::new(Engine::open(config.clone())?)),
        StoreBackend::Remote { addr } => Arc::new(KvProjectStore::new(RemoteKv::new(
            addr.clone(),
            Duration::from_millis(config.write_timeout_ms.max(1)),
        ))),
    };
    Ok(Some(store))
}
