//! Retraining Orchestrator.
//!
//! # State machine
//!
//! ```text
//! STARTED ──(resolved < min_predictions)──────────────▶ SKIPPED
//!    │
//!    ├──(fetch/derive/train/validate/promote error)───▶ FAILED
//!    │
//!    └──(promoted)────────────────────────────────────▶ COMPLETED
//! ```
//!
//! Every attempt ends in exactly one terminal status and writes exactly one
//! audit entry. Nothing but promotion touches the artifact registry, and a
//! failed promotion leaves the previous artifact active.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::{DateTime, Utc};
use rovnic_state::{
    ArtifactRegistry, AuditLog, AuditStatus, ModelArtifact, OutcomeQuery, OutcomeStore,
    RetrainingAuditEntry,
};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::config::RetrainConfig;
use crate::error::{call_store, CoreError, Result};
use crate::ml::{Trainer, TrainingSet, Validator};
use crate::obs;
use crate::stats::ServiceStats;
use crate::stores::Stores;

/// Reason recorded when a domain lacks enough resolved outcomes.
pub const INSUFFICIENT_DATA_REASON: &str = "Insufficient data";

/// Terminal result of one orchestration attempt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetrainOutcome {
    pub domain: String,
    pub status: AuditStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resulting_accuracy: Option<f64>,
    pub sample_count: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub artifact_version: Option<String>,
    pub finished_at: DateTime<Utc>,
}

impl RetrainOutcome {
    fn new(domain: &str, status: AuditStatus) -> Self {
        Self {
            domain: domain.to_string(),
            status,
            reason: None,
            resulting_accuracy: None,
            sample_count: 0,
            artifact_version: None,
            finished_at: Utc::now(),
        }
    }

    pub fn skipped(domain: &str, sample_count: usize) -> Self {
        Self {
            reason: Some(INSUFFICIENT_DATA_REASON.to_string()),
            sample_count,
            ..Self::new(domain, AuditStatus::Skipped)
        }
    }

    pub fn failed(domain: &str, reason: impl ToString, sample_count: usize) -> Self {
        Self {
            reason: Some(reason.to_string()),
            sample_count,
            ..Self::new(domain, AuditStatus::Failed)
        }
    }

    pub fn completed(artifact: &ModelArtifact, accuracy: f64) -> Self {
        Self {
            resulting_accuracy: Some(accuracy),
            sample_count: artifact.sample_count,
            artifact_version: Some(artifact.version.clone()),
            ..Self::new(&artifact.domain, AuditStatus::Completed)
        }
    }

    pub fn is_failed(&self) -> bool {
        self.status == AuditStatus::Failed
    }

    pub fn to_audit_entry(&self) -> RetrainingAuditEntry {
        RetrainingAuditEntry {
            domain: self.domain.clone(),
            status: self.status,
            reason: self.reason.clone(),
            resulting_accuracy: self.resulting_accuracy,
            sample_count: self.sample_count,
            artifact_version: self.artifact_version.clone(),
            timestamp: self.finished_at,
        }
    }
}

/// Sequences fetch → derive → train → validate → promote for a domain.
///
/// Runs and rollbacks for the same domain are serialised by a per-domain
/// async mutex shared by the scheduler and the operational surface.
pub struct RetrainOrchestrator {
    outcomes: Arc<dyn OutcomeStore>,
    registry: Arc<dyn ArtifactRegistry>,
    audit: Arc<dyn AuditLog>,
    trainer: Arc<dyn Trainer>,
    validator: Arc<dyn Validator>,
    stats: Arc<ServiceStats>,
    min_predictions: usize,
    query_limit: usize,
    holdout: f64,
    min_validation_accuracy: f64,
    timeout: Duration,
    locks: Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>,
}

impl RetrainOrchestrator {
    pub fn new(
        stores: &Stores,
        trainer: Arc<dyn Trainer>,
        validator: Arc<dyn Validator>,
        stats: Arc<ServiceStats>,
        config: &RetrainConfig,
    ) -> Self {
        Self {
            outcomes: stores.outcomes.clone(),
            registry: stores.registry.clone(),
            audit: stores.audit.clone(),
            trainer,
            validator,
            stats,
            min_predictions: config.min_predictions_for_retrain,
            query_limit: config.outcome_query_limit,
            holdout: config.validation_holdout,
            min_validation_accuracy: config.min_validation_accuracy,
            timeout: config.request_timeout(),
            locks: Mutex::new(HashMap::new()),
        }
    }

    fn domain_lock(&self, domain: &str) -> Arc<tokio::sync::Mutex<()>> {
        let mut locks = self.locks.lock().unwrap_or_else(|e| e.into_inner());
        locks.entry(domain.to_string()).or_default().clone()
    }

    /// Run one attempt to a terminal status. Never returns an error; the
    /// outcome is also appended to the audit log.
    pub async fn run(&self, domain: &str) -> RetrainOutcome {
        let lock = self.domain_lock(domain);
        let _guard = lock.lock().await;
        info!(domain, status = %AuditStatus::Started, "Retraining started");

        let outcome = match self.attempt(domain).await {
            Ok(outcome) => outcome,
            Err((e, sample_count)) => RetrainOutcome::failed(domain, e, sample_count),
        };

        if let Err(e) = self.audit.append_audit(outcome.to_audit_entry()).await {
            warn!(domain, error = %e, "Failed to append retraining audit entry");
        }
        self.stats.record_retrain(outcome.status);
        obs::emit_retrain_finished(domain, outcome.status.as_str(), outcome.reason.as_deref());
        outcome
    }

    /// Steps 2–6. Errors carry the number of samples seen so far.
    async fn attempt(&self, domain: &str) -> std::result::Result<RetrainOutcome, (CoreError, usize)> {
        let query = OutcomeQuery::recent(domain, self.query_limit);
        let records = call_store("outcome store", self.timeout, self.outcomes.query(&query))
            .await
            .map_err(|e| (e, 0))?;

        let set = TrainingSet::from_outcomes(&records);
        let samples = set.len();
        if samples < self.min_predictions {
            info!(domain, samples, needed = self.min_predictions, "Not enough resolved outcomes");
            return Ok(RetrainOutcome::skipped(domain, samples));
        }

        let (train, holdout) = set.split_holdout(self.holdout);
        let artifact = self
            .trainer
            .train(domain, &train.features, &train.labels)
            .map_err(|e| (e, samples))?;

        let eval = if holdout.is_empty() { &train } else { &holdout };
        let accuracy = self
            .validator
            .validate(&artifact, &eval.features, &eval.labels)
            .map_err(|e| (e, samples))?;
        if !(0.0..=1.0).contains(&accuracy) {
            return Err((
                CoreError::Validation(format!("accuracy {accuracy} outside [0, 1]")),
                samples,
            ));
        }
        if accuracy < self.min_validation_accuracy {
            return Err((
                CoreError::Validation(format!(
                    "validation accuracy {accuracy:.3} below promotion floor {:.3}",
                    self.min_validation_accuracy
                )),
                samples,
            ));
        }

        let artifact = artifact.with_validation_accuracy(accuracy);
        let promoted = call_store(
            "artifact registry",
            self.timeout,
            self.registry.promote(artifact),
        )
        .await
        .map_err(|e| (e, samples))?;
        obs::emit_artifact_promoted(domain, &promoted.version, promoted.revision, accuracy);

        Ok(RetrainOutcome::completed(&promoted, accuracy))
    }

    /// Re-activate the previous artifact for `domain` under the same
    /// per-domain guard as [`RetrainOrchestrator::run`].
    pub async fn rollback(&self, domain: &str) -> Result<ModelArtifact> {
        let lock = self.domain_lock(domain);
        let _guard = lock.lock().await;
        let restored =
            call_store("artifact registry", self.timeout, self.registry.rollback(domain)).await?;
        info!(
            domain,
            version = %restored.version,
            revision = restored.revision,
            "Artifact rolled back"
        );
        Ok(restored)
    }
}
