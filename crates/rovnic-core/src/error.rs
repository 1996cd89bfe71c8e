//! Error taxonomy for the retraining core.
//!
//! Every domain-scoped operation converts these into a result value or an
//! audit entry; only `Configuration` is allowed to stop the process, and only
//! at startup.

use std::future::Future;
use std::time::Duration;

use rovnic_state::{StorageError, StorageResult};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CoreError {
    /// Not enough labelled history to fit or score a model.
    #[error("insufficient data: need {needed}, have {available}")]
    InsufficientData { needed: usize, available: usize },

    /// Numeric or data-shape failure while fitting.
    #[error("training failed: {0}")]
    Training(String),

    /// Numeric or data-shape failure while scoring.
    #[error("validation failed: {0}")]
    Validation(String),

    /// A store or provider timed out or errored.
    #[error("{collaborator} unavailable: {detail}")]
    CollaboratorUnavailable {
        collaborator: String,
        detail: String,
    },

    #[error("configuration error: {0}")]
    Configuration(String),

    /// Raw game context could not be turned into a feature vector.
    #[error("feature extraction failed: {0}")]
    FeatureExtraction(String),

    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl CoreError {
    pub fn unavailable(collaborator: impl Into<String>, detail: impl ToString) -> Self {
        CoreError::CollaboratorUnavailable {
            collaborator: collaborator.into(),
            detail: detail.to_string(),
        }
    }

    /// Whether the failure came from outside the core (store, provider).
    pub fn is_collaborator_failure(&self) -> bool {
        matches!(
            self,
            CoreError::CollaboratorUnavailable { .. }
                | CoreError::Storage(StorageError::Backend(_))
        )
    }
}

pub type Result<T> = std::result::Result<T, CoreError>;

/// Await a storage call under `limit`.
///
/// Expiry and backend errors become `CollaboratorUnavailable`; contract
/// errors (missing artifact, digest mismatch) pass through as `Storage`.
pub(crate) async fn call_store<T, F>(collaborator: &str, limit: Duration, call: F) -> Result<T>
where
    F: Future<Output = StorageResult<T>>,
{
    match tokio::time::timeout(limit, call).await {
        Err(_) => Err(CoreError::unavailable(
            collaborator,
            format!("timed out after {}ms", limit.as_millis()),
        )),
        Ok(Err(StorageError::Backend(detail))) => Err(CoreError::unavailable(collaborator, detail)),
        Ok(Err(e)) => Err(CoreError::Storage(e)),
        Ok(Ok(value)) => Ok(value),
    }
}
