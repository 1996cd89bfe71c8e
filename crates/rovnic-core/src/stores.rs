//! The three storage collaborators, bundled for injection.

use std::sync::Arc;

use rovnic_state::fakes::{MemoryArtifactRegistry, MemoryAuditLog, MemoryOutcomeStore};
use rovnic_state::{ArtifactRegistry, AuditLog, OutcomeStore};

#[derive(Clone)]
pub struct Stores {
    pub outcomes: Arc<dyn OutcomeStore>,
    pub registry: Arc<dyn ArtifactRegistry>,
    pub audit: Arc<dyn AuditLog>,
}

impl Stores {
    /// Use one backend for all three concerns.
    pub fn from_backend<B>(backend: B) -> Self
    where
        B: OutcomeStore + ArtifactRegistry + AuditLog + 'static,
    {
        let backend = Arc::new(backend);
        Self {
            outcomes: backend.clone(),
            registry: backend.clone(),
            audit: backend,
        }
    }

    /// Independent in-memory fakes.
    pub fn in_memory() -> Self {
        Self {
            outcomes: Arc::new(MemoryOutcomeStore::new()),
            registry: Arc::new(MemoryArtifactRegistry::new()),
            audit: Arc::new(MemoryAuditLog::new()),
        }
    }
}
