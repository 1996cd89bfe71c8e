//! Storage trait definitions for Rovnic
//!
//! These traits define the collaborator contracts the retraining core
//! depends on:
//! - `OutcomeStore`: append-only prediction outcomes, queried by domain
//! - `ArtifactRegistry`: active model artifact per domain (promote/rollback)
//! - `AuditLog`: append-only retraining audit trail
//!
//! All traits are async and backend-agnostic. In-memory fakes are provided
//! for testing via the `fakes` module.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::Sha256;

use crate::error::StorageError;
use crate::schema::{ModelArtifact, OutcomeRecord, RetrainingAuditEntry};

/// Result type for storage operations
pub type StorageResult<T> = std::result::Result<T, StorageError>;

// ---------------------------------------------------------------------------
// ContentDigest
// ---------------------------------------------------------------------------

/// Content digest (SHA-256 hex string).
///
/// The inner field is private to guarantee the string is always valid
/// lowercase hex produced by `from_parts` or validated via `TryFrom<String>`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ContentDigest(String);

impl ContentDigest {
    /// Compute the SHA-256 digest of the given bytes.
    pub fn from_bytes(data: &[u8]) -> Self {
        Self::from_parts(&[data])
    }

    /// Compute one SHA-256 digest over several byte slices, in order.
    pub fn from_parts(parts: &[&[u8]]) -> Self {
        use sha2::Digest;
        let mut hasher = Sha256::new();
        for part in parts {
            hasher.update(part);
        }
        ContentDigest(hex::encode(hasher.finalize()))
    }

    /// Return the full hex string.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Short form (first 12 hex chars).
    pub fn short(&self) -> &str {
        &self.0[..12.min(self.0.len())]
    }
}

impl TryFrom<String> for ContentDigest {
    type Error = StorageError;

    fn try_from(s: String) -> std::result::Result<Self, Self::Error> {
        if s.len() != 64 || !s.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(StorageError::InvalidDigest { digest: s });
        }
        Ok(ContentDigest(s.to_ascii_lowercase()))
    }
}

impl std::fmt::Display for ContentDigest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// OutcomeStore: Prediction Outcome History
// ---------------------------------------------------------------------------

/// Selection of outcome records for one domain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutcomeQuery {
    pub domain: String,
    /// Only records observed at or after this instant. `None` means no
    /// lower bound.
    pub since: Option<DateTime<Utc>>,
    /// Maximum number of records returned.
    pub limit: usize,
}

impl OutcomeQuery {
    pub fn recent(domain: impl Into<String>, limit: usize) -> Self {
        Self {
            domain: domain.into(),
            since: None,
            limit,
        }
    }

    pub fn since(mut self, since: DateTime<Utc>) -> Self {
        self.since = Some(since);
        self
    }
}

/// Append-only store of prediction outcomes.
///
/// Guarantees:
/// - Records are immutable once appended.
/// - `query` returns at most `limit` records of the requested domain,
///   newest `observed_at` first.
#[async_trait]
pub trait OutcomeStore: Send + Sync {
    /// Append a record. Rejects records whose confidence is outside `[0, 1]`.
    async fn append(&self, record: OutcomeRecord) -> StorageResult<()>;

    /// Fetch recent records for a domain.
    async fn query(&self, query: &OutcomeQuery) -> StorageResult<Vec<OutcomeRecord>>;
}

// ---------------------------------------------------------------------------
// ArtifactRegistry: Active Model Management
// ---------------------------------------------------------------------------

/// Per-domain model artifact registry.
///
/// Semantics:
/// - `promote` verifies the artifact (both blobs present, digest matches)
///   and appends it as the new active artifact in a single write. A refused
///   or failed promotion leaves the previous artifact active.
/// - `rollback` re-appends the previous artifact as a new entry, preserving
///   the full history (append-only).
/// - `history` returns every promotion, newest first.
#[async_trait]
pub trait ArtifactRegistry: Send + Sync {
    /// The active artifact for a domain, if any.
    async fn current(&self, domain: &str) -> StorageResult<Option<ModelArtifact>>;

    /// Promote an artifact, returning it with its assigned revision.
    async fn promote(&self, artifact: ModelArtifact) -> StorageResult<ModelArtifact>;

    /// Roll back to the previous artifact. Fails if none exists.
    async fn rollback(&self, domain: &str) -> StorageResult<ModelArtifact>;

    /// Full promotion history for a domain (newest first).
    async fn history(&self, domain: &str) -> StorageResult<Vec<ModelArtifact>>;
}

// ---------------------------------------------------------------------------
// AuditLog: Retraining Audit Trail
// ---------------------------------------------------------------------------

/// Append-only log of retraining attempts.
#[async_trait]
pub trait AuditLog: Send + Sync {
    /// Append one entry.
    async fn append_audit(&self, entry: RetrainingAuditEntry) -> StorageResult<()>;

    /// Most recent entries, newest first, optionally for a single domain.
    async fn audit_history(
        &self,
        domain: Option<&str>,
        limit: usize,
    ) -> StorageResult<Vec<RetrainingAuditEntry>>;
}
