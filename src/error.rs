use thiserror::Error;

use crate::types::{ResourceType, Roles};

#[derive(Debug, Error)]
pub enum Error {
    #[error("permission denied: {required} required on {resource}")]
    PermissionDenied {
        resource: ResourceType,
        required: Roles,
    },

    #[error("{0} not found")]
    ResourceNotFound(ResourceType),

    #[error("limit exceeded: {0}")]
    LimitExceeded(String),

    #[error("storage conflict: {0}")]
    StorageConflict(String),

    #[error("storage unavailable: {0}")]
    StorageUnavailable(#[from] rusqlite::Error),

    #[error("already exists: {0}")]
    AlreadyExists(String),

    #[error("bad request: {0}")]
    BadRequest(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("invalid configuration: {0}")]
    Config(String),
}

impl Error {
    /// Conflicts and storage outages may succeed when the whole logical
    /// operation is re-run from a fresh read.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::StorageConflict(_) | Self::StorageUnavailable(_))
    }
}

pub type Result<T> = std::result::Result<T, Error>;
