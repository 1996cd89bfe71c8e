//! In-memory fakes for storage traits (testing only)
//!
//! Provides `MemoryOutcomeStore`, `MemoryArtifactRegistry`, and
//! `MemoryAuditLog` that satisfy the trait contracts without any external
//! dependencies.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;

use crate::error::StorageError;
use crate::schema::{ModelArtifact, OutcomeRecord, RetrainingAuditEntry};
use crate::storage_traits::*;

// ---------------------------------------------------------------------------
// MemoryOutcomeStore
// ---------------------------------------------------------------------------

/// In-memory outcome store backed by a `HashMap<domain, Vec<OutcomeRecord>>`.
#[derive(Debug, Default)]
pub struct MemoryOutcomeStore {
    records: Mutex<HashMap<String, Vec<OutcomeRecord>>>,
}

impl MemoryOutcomeStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of records held for a domain.
    pub fn len(&self, domain: &str) -> usize {
        let records = self.records.lock().unwrap();
        records.get(domain).map(Vec::len).unwrap_or(0)
    }
}

#[async_trait]
impl OutcomeStore for MemoryOutcomeStore {
    async fn append(&self, record: OutcomeRecord) -> StorageResult<()> {
        record.validate()?;
        let mut records = self.records.lock().unwrap();
        records
            .entry(record.domain.clone())
            .or_default()
            .push(record);
        Ok(())
    }

    async fn query(&self, query: &OutcomeQuery) -> StorageResult<Vec<OutcomeRecord>> {
        let records = self.records.lock().unwrap();
        let mut selected: Vec<OutcomeRecord> = records
            .get(&query.domain)
            .map(|all| {
                all.iter()
                    .filter(|r| query.since.map(|s| r.observed_at >= s).unwrap_or(true))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();
        // Latest append wins ties on observed_at (sort is stable).
        selected.reverse();
        selected.sort_by(|a, b| b.observed_at.cmp(&a.observed_at));
        selected.truncate(query.limit);
        Ok(selected)
    }
}

// ---------------------------------------------------------------------------
// MemoryArtifactRegistry
// ---------------------------------------------------------------------------

/// In-memory artifact registry backed by a `HashMap<domain, Vec<ModelArtifact>>`.
///
/// Each domain maps to its full promotion history (newest last internally).
#[derive(Debug, Default)]
pub struct MemoryArtifactRegistry {
    artifacts: Mutex<HashMap<String, Vec<ModelArtifact>>>,
}

impl MemoryArtifactRegistry {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ArtifactRegistry for MemoryArtifactRegistry {
    async fn current(&self, domain: &str) -> StorageResult<Option<ModelArtifact>> {
        let artifacts = self.artifacts.lock().unwrap();
        Ok(artifacts.get(domain).and_then(|h| h.last().cloned()))
    }

    async fn promote(&self, mut artifact: ModelArtifact) -> StorageResult<ModelArtifact> {
        artifact.verify()?;
        let mut artifacts = self.artifacts.lock().unwrap();
        let history = artifacts.entry(artifact.domain.clone()).or_default();
        artifact.revision = history.last().map(|a| a.revision + 1).unwrap_or(1);
        history.push(artifact.clone());
        Ok(artifact)
    }

    async fn rollback(&self, domain: &str) -> StorageResult<ModelArtifact> {
        let mut artifacts = self.artifacts.lock().unwrap();
        let history = artifacts
            .get_mut(domain)
            .ok_or_else(|| StorageError::ArtifactNotFound {
                domain: domain.to_string(),
            })?;
        if history.len() < 2 {
            return Err(StorageError::NoPreviousArtifact {
                domain: domain.to_string(),
            });
        }
        // Append-only: re-append the previous artifact under a new revision
        // instead of destroying the current one.
        let mut previous = history[history.len() - 2].clone();
        previous.revision = history[history.len() - 1].revision + 1;
        history.push(previous.clone());
        Ok(previous)
    }

    async fn history(&self, domain: &str) -> StorageResult<Vec<ModelArtifact>> {
        let artifacts = self.artifacts.lock().unwrap();
        let mut history = artifacts.get(domain).cloned().unwrap_or_default();
        history.reverse(); // newest first
        Ok(history)
    }
}

// ---------------------------------------------------------------------------
// MemoryAuditLog
// ---------------------------------------------------------------------------

/// In-memory audit log backed by a `Vec<RetrainingAuditEntry>` in append order.
#[derive(Debug, Default)]
pub struct MemoryAuditLog {
    entries: Mutex<Vec<RetrainingAuditEntry>>,
}

impl MemoryAuditLog {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl AuditLog for MemoryAuditLog {
    async fn append_audit(&self, entry: RetrainingAuditEntry) -> StorageResult<()> {
        let mut entries = self.entries.lock().unwrap();
        entries.push(entry);
        Ok(())
    }

    async fn audit_history(
        &self,
        domain: Option<&str>,
        limit: usize,
    ) -> StorageResult<Vec<RetrainingAuditEntry>> {
        let entries = self.entries.lock().unwrap();
        Ok(entries
            .iter()
            .rev()
            .filter(|e| domain.map(|d| e.domain == d).unwrap_or(true))
            .take(limit)
            .cloned()
            .collect())
    }
}
