//! Error types for rovnic-state

use thiserror::Error;

/// Errors raised while connecting to or preparing the database backend
#[derive(Error, Debug)]
pub enum StateError {
    /// Database connection error
    #[error("Database connection failed: {0}")]
    Connection(String),

    /// Database query error
    #[error("Database query failed: {0}")]
    Query(String),

    /// Serialization error
    #[error("Serialization failed: {0}")]
    Serialization(String),

    /// Schema setup error
    #[error("Schema setup failed: {0}")]
    SchemaSetup(String),
}

impl From<surrealdb::Error> for StateError {
    fn from(err: surrealdb::Error) -> Self {
        StateError::Query(err.to_string())
    }
}

impl From<serde_json::Error> for StateError {
    fn from(err: serde_json::Error) -> Self {
        StateError::Serialization(err.to_string())
    }
}

/// Errors returned by the storage traits
#[derive(Error, Debug)]
pub enum StorageError {
    /// No artifact has ever been promoted for the domain
    #[error("no artifact found for domain: {domain}")]
    ArtifactNotFound { domain: String },

    /// Rollback requested with fewer than two artifacts in history
    #[error("no previous artifact to roll back to for domain: {domain}")]
    NoPreviousArtifact { domain: String },

    /// Promotion refused because one half of the artifact pair is missing
    #[error("artifact {version} for {domain} is incomplete: {missing} is empty")]
    IncompleteArtifact {
        domain: String,
        version: String,
        missing: String,
    },

    /// Promotion refused because the blobs do not hash to the recorded digest
    #[error("artifact digest mismatch: expected {expected}, got {actual}")]
    DigestMismatch { expected: String, actual: String },

    /// A digest string that is not 64 hex characters
    #[error("invalid digest: {digest}")]
    InvalidDigest { digest: String },

    /// An outcome record that violates its field invariants
    #[error("invalid outcome record: {0}")]
    InvalidRecord(String),

    /// Backend failure (connection, query, decode)
    #[error("storage backend error: {0}")]
    Backend(String),
}

impl From<surrealdb::Error> for StorageError {
    fn from(err: surrealdb::Error) -> Self {
        StorageError::Backend(err.to_string())
    }
}
