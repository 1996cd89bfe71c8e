//! Record definitions shared by every storage backend
//!
//! - `OutcomeRecord`: one resolved or pending prediction
//! - `ModelArtifact`: fitted weights plus normalizer for a domain
//! - `RetrainingAuditEntry`: terminal result of one retraining attempt

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::StorageError;
use crate::storage_traits::{ContentDigest, StorageResult};

// ---------------------------------------------------------------------------
// OutcomeRecord
// ---------------------------------------------------------------------------

/// A past prediction and, once known, whether it was correct.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutcomeRecord {
    pub id: String,
    /// Sport key, e.g. "nba"
    pub domain: String,
    /// Label the model emitted ("Win" / "Loss")
    pub predicted_label: String,
    /// Model confidence in [0, 1]
    pub confidence: f64,
    /// `None` until the outcome has been settled
    pub actual_correct: Option<bool>,
    /// Feature vector the predictor consumed, when captured
    #[serde(default)]
    pub features: Vec<f64>,
    pub observed_at: DateTime<Utc>,
}

impl OutcomeRecord {
    pub fn new(
        domain: impl Into<String>,
        predicted_label: impl Into<String>,
        confidence: f64,
        actual_correct: Option<bool>,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            domain: domain.into(),
            predicted_label: predicted_label.into(),
            confidence,
            actual_correct,
            features: Vec::new(),
            observed_at: Utc::now(),
        }
    }

    pub fn with_features(mut self, features: Vec<f64>) -> Self {
        self.features = features;
        self
    }

    pub fn observed_at(mut self, at: DateTime<Utc>) -> Self {
        self.observed_at = at;
        self
    }

    /// Whether correctness has been settled.
    pub fn is_resolved(&self) -> bool {
        self.actual_correct.is_some()
    }

    /// Check field invariants before the record is persisted.
    pub fn validate(&self) -> StorageResult<()> {
        if self.domain.is_empty() {
            return Err(StorageError::InvalidRecord("domain is empty".to_string()));
        }
        if !self.confidence.is_finite() || !(0.0..=1.0).contains(&self.confidence) {
            return Err(StorageError::InvalidRecord(format!(
                "confidence {} outside [0, 1]",
                self.confidence
            )));
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// ModelArtifact
// ---------------------------------------------------------------------------

/// A fitted model for one domain: classifier weights and the feature
/// normalizer, both as opaque serialized blobs.
///
/// # Invariants
///
/// `digest` is the SHA-256 of `weights_blob ++ normalizer_blob`. Registries
/// refuse to promote an artifact that violates this or has an empty blob.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelArtifact {
    pub domain: String,
    /// Unique identifier of this fitted artifact
    pub version: String,
    /// Position in the domain's promotion history, assigned on promotion
    pub revision: u64,
    pub weights_blob: Vec<u8>,
    pub normalizer_blob: Vec<u8>,
    pub digest: ContentDigest,
    pub fitted_at: DateTime<Utc>,
    /// Accuracy measured by the validator, once validated
    pub validation_accuracy: Option<f64>,
    /// Number of labelled samples the model was fitted on
    pub sample_count: usize,
}

impl ModelArtifact {
    /// Package a freshly fitted weights/normalizer pair. The artifact is not
    /// active until a registry promotes it.
    pub fn new(
        domain: impl Into<String>,
        weights_blob: Vec<u8>,
        normalizer_blob: Vec<u8>,
        sample_count: usize,
    ) -> Self {
        let digest = Self::compute_digest(&weights_blob, &normalizer_blob);
        Self {
            domain: domain.into(),
            version: Uuid::new_v4().to_string(),
            revision: 0,
            weights_blob,
            normalizer_blob,
            digest,
            fitted_at: Utc::now(),
            validation_accuracy: None,
            sample_count,
        }
    }

    pub fn with_validation_accuracy(mut self, accuracy: f64) -> Self {
        self.validation_accuracy = Some(accuracy);
        self
    }

    pub fn compute_digest(weights_blob: &[u8], normalizer_blob: &[u8]) -> ContentDigest {
        ContentDigest::from_parts(&[weights_blob, normalizer_blob])
    }

    /// Verify that both halves are present and match the recorded digest.
    pub fn verify(&self) -> StorageResult<()> {
        let missing = if self.weights_blob.is_empty() {
            Some("weights_blob")
        } else if self.normalizer_blob.is_empty() {
            Some("normalizer_blob")
        } else {
            None
        };
        if let Some(missing) = missing {
            return Err(StorageError::IncompleteArtifact {
                domain: self.domain.clone(),
                version: self.version.clone(),
                missing: missing.to_string(),
            });
        }

        let actual = Self::compute_digest(&self.weights_blob, &self.normalizer_blob);
        if actual != self.digest {
            return Err(StorageError::DigestMismatch {
                expected: self.digest.to_string(),
                actual: actual.to_string(),
            });
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// RetrainingAuditEntry
// ---------------------------------------------------------------------------

/// Status of a retraining attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditStatus {
    Started,
    Skipped,
    Failed,
    Completed,
}

impl AuditStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuditStatus::Started => "started",
            AuditStatus::Skipped => "skipped",
            AuditStatus::Failed => "failed",
            AuditStatus::Completed => "completed",
        }
    }

    /// Whether the status ends an attempt.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, AuditStatus::Started)
    }
}

impl std::fmt::Display for AuditStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One entry per orchestration attempt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetrainingAuditEntry {
    pub domain: String,
    pub status: AuditStatus,
    pub reason: Option<String>,
    /// Validation accuracy of the promoted artifact (completed only)
    pub resulting_accuracy: Option<f64>,
    pub sample_count: usize,
    /// Version of the promoted artifact (completed only)
    pub artifact_version: Option<String>,
    pub timestamp: DateTime<Utc>,
}

impl RetrainingAuditEntry {
    pub fn new(domain: impl Into<String>, status: AuditStatus) -> Self {
        Self {
            domain: domain.into(),
            status,
            reason: None,
            resulting_accuracy: None,
            sample_count: 0,
            artifact_version: None,
            timestamp: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_artifact_verifies() {
        let artifact = ModelArtifact::new("nba", b"w".to_vec(), b"n".to_vec(), 12);
        artifact.verify().unwrap();
        assert_eq!(artifact.revision, 0);
        assert!(artifact.validation_accuracy.is_none());
    }

    #[test]
    fn artifact_without_normalizer_is_incomplete() {
        let artifact = ModelArtifact::new("nba", b"w".to_vec(), Vec::new(), 12);
        let err = artifact.verify().unwrap_err();
        assert!(matches!(
            err,
            StorageError::IncompleteArtifact { ref missing, .. } if missing == "normalizer_blob"
        ));
    }

    #[test]
    fn tampered_artifact_fails_digest_check() {
        let mut artifact = ModelArtifact::new("nba", b"w".to_vec(), b"n".to_vec(), 12);
        artifact.weights_blob = b"other".to_vec();
        assert!(matches!(
            artifact.verify().unwrap_err(),
            StorageError::DigestMismatch { .. }
        ));
    }

    #[test]
    fn outcome_confidence_must_be_a_probability() {
        let record = OutcomeRecord::new("nfl", "Win", 1.2, Some(true));
        assert!(record.validate().is_err());
        let record = OutcomeRecord::new("nfl", "Win", f64::NAN, Some(true));
        assert!(record.validate().is_err());
        let record = OutcomeRecord::new("nfl", "Win", 0.7, None);
        record.validate().unwrap();
        assert!(!record.is_resolved());
    }

    #[test]
    fn audit_status_serializes_lowercase() {
        let json = serde_json::to_string(&AuditStatus::Completed).unwrap();
        assert_eq!(json, "\"completed\"");
        assert!(AuditStatus::Skipped.is_terminal());
        assert!(!AuditStatus::Started.is_terminal());
    }
}
