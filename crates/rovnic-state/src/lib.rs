//! Rovnic-State: persistence layer for the retraining core
//!
//! This crate owns every record the retraining core reads or writes and the
//! storage contracts through which it does so.
//!
//! ## Layer 0 - Data/Persistence
//!
//! Focus: append-only outcome history, all-or-nothing artifact promotion,
//! and an append-only audit trail.
//!
//! ## Key Components
//!
//! - `OutcomeStore`: resolved and pending prediction outcomes per domain
//! - `ArtifactRegistry`: the active `ModelArtifact` per domain (promote/rollback)
//! - `AuditLog`: one `RetrainingAuditEntry` per orchestration attempt
//! - `SurrealStore`: SurrealDB backend implementing all three
//! - `fakes`: in-memory implementations for tests

mod error;
pub mod fakes;
mod handle;
mod migrations;
mod schema;
pub mod storage_traits;

pub use error::{StateError, StorageError};
pub use handle::{CloudConfig, SurrealStore};
pub use schema::{AuditStatus, ModelArtifact, OutcomeRecord, RetrainingAuditEntry};
pub use storage_traits::{
    ArtifactRegistry, AuditLog, ContentDigest, OutcomeQuery, OutcomeStore, StorageResult,
};

/// Result type for rovnic-state backend operations
pub type Result<T> = std::result::Result<T, StateError>;
