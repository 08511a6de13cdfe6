//! Error types for Sitesmith
//!
//! Provides a unified error type for all operations, plus a coarse
//! classification used at the request boundary.

use thiserror::Error;

/// Result type alias using SiteError
pub type Result<T> = std::result::Result<T, SiteError>;

/// Unified error type for Sitesmith operations
#[derive(Debug, Error)]
pub enum SiteError {
    // -------------------------------------------------------------------------
    // Request Errors
    // -------------------------------------------------------------------------
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Not configured: {0}")]
    Unconfigured(String),

    // -------------------------------------------------------------------------
    // Completion Service Errors
    // -------------------------------------------------------------------------
    #[error("Completion service returned {status}: {detail}")]
    UpstreamGeneration { status: u16, detail: String },

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    // -------------------------------------------------------------------------
    // Persistence Errors
    // -------------------------------------------------------------------------
    #[error("Persistence error: {0}")]
    Persistence(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("WAL corruption detected: {0}")]
    WalCorruption(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Key not found")]
    KeyNotFound,

    // -------------------------------------------------------------------------
    // Serialization Errors
    // -------------------------------------------------------------------------
    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    // -------------------------------------------------------------------------
    // Network Errors
    // -------------------------------------------------------------------------
    #[error("Network error: {0}")]
    Network(String),

    #[error("Protocol error: {0}")]
    Protocol(String),

    // -------------------------------------------------------------------------
    // Configuration Errors
    // -------------------------------------------------------------------------
    #[error("Configuration error: {0}")]
    Config(String),

    // -------------------------------------------------------------------------
    // Catch-all
    // -------------------------------------------------------------------------
    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<bincode::Error> for SiteError {
    fn from(e: bincode::Error) -> Self {
        SiteError::Serialization(e.to_string())
    }
}

/// Boundary classification of a [`SiteError`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Missing or malformed request field; not retryable
    InvalidRequest,

    /// Required credential or backend absent; not retryable
    Unconfigured,

    /// Completion service answered with a non-success status; retryable
    UpstreamGeneration,

    /// Key-value backend unreachable or a write failed
    Persistence,

    /// Anything else
    Internal,
}

impl SiteError {
    /// Map this error onto its boundary category
    pub fn kind(&self) -> ErrorKind {
        match self {
            SiteError::InvalidRequest(_) => ErrorKind::InvalidRequest,
            SiteError::Unconfigured(_) | SiteError::Config(_) => ErrorKind::Unconfigured,
            SiteError::UpstreamGeneration { .. } => ErrorKind::UpstreamGeneration,
            SiteError::Persistence(_)
            | SiteError::Io(_)
            | SiteError::WalCorruption(_)
            | SiteError::Storage(_)
            | SiteError::KeyNotFound
            | SiteError::Network(_)
            | SiteError::Protocol(_) => ErrorKind::Persistence,
            SiteError::Http(_)
            | SiteError::Serialization(_)
            | SiteError::Json(_)
            | SiteError::Internal(_) => ErrorKind::Internal,
        }
    }

    /// Message suitable for an end user
    ///
    /// Internal faults get a generic message; the full detail is only in
    /// `Display` for operators.
    pub fn public_message(&self) -> String {
        match self {
            SiteError::InvalidRequest(msg) => msg.clone(),
            SiteError::Unconfigured(_) | SiteError::Config(_) => {
                "Server misconfigured. Contact support.".to_string()
            }
            SiteError::UpstreamGeneration { .. } => {
                "Generation failed. Please try again. If this persists, contact support."
                    .to_string()
            }
            _ => "We couldn't complete your request. Please try again.".to_string(),
        }
    }

    /// Short machine-readable code for response bodies
    pub fn code(&self) -> &'static str {
        match self.kind() {
            ErrorKind::InvalidRequest => "BadRequest",
            ErrorKind::Unconfigured => "MissingConfig",
            ErrorKind::UpstreamGeneration => "UpstreamError",
            ErrorKind::Persistence => "StoreError",
            ErrorKind::Internal => "ServerError",
        }
    }
}
