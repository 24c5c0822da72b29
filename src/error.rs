use thiserror::Error;

use crate::core::EntityKind;

/// Failures surfaced by the record client and the entity services.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ServiceError {
    /// No record client could be built (missing base URL or API key).
    #[error("record client not initialized: {0}")]
    NotInitialized(String),

    /// The store answered with `success: false`.
    #[error("{0}")]
    Server(String),

    #[error("{kind} with Id {id} not found")]
    NotFound { kind: EntityKind, id: i64 },

    #[error("request failed: {0}")]
    Transport(String),

    #[error("unexpected record shape: {0}")]
    Decode(String),

    /// Form input rejected before anything was sent.
    #[error("{0}")]
    Validation(String),
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to write config {path}: {source}")]
    Write {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed config {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: serde_json::Error,
    },
}
