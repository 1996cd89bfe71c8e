//! Operational surface: summary, manual retrain, audit feed, rollback and
//! stats.
//!
//! Every call is safe alongside a running cycle. Reads are idempotent; the
//! manual retrain and rollback take the orchestrator's per-domain guard.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use rovnic_state::{AuditLog, ModelArtifact, RetrainingAuditEntry};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::config::RetrainConfig;
use crate::error::{call_store, CoreError, Result};
use crate::monitor::RetrainingGate;
use crate::orchestrator::{RetrainOrchestrator, RetrainOutcome};
use crate::stats::{ServiceStats, StatsSnapshot};

/// Accuracy fields are `None` exactly when `error` is set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DomainAccuracy {
    pub domain: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub accuracy: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sample_count: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub needs_retraining: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Latest rolling accuracy for every configured domain.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PerformanceSummary {
    pub computed_at: DateTime<Utc>,
    pub threshold: f64,
    pub domains: Vec<DomainAccuracy>,
}

pub struct OperationsApi {
    config: RetrainConfig,
    gate: RetrainingGate,
    orchestrator: Arc<RetrainOrchestrator>,
    audit: Arc<dyn AuditLog>,
    stats: Arc<ServiceStats>,
    timeout: Duration,
}

impl OperationsApi {
    pub fn new(
        config: RetrainConfig,
        gate: RetrainingGate,
        orchestrator: Arc<RetrainOrchestrator>,
        audit: Arc<dyn AuditLog>,
        stats: Arc<ServiceStats>,
    ) -> Self {
        let timeout = config.request_timeout();
        Self {
            config,
            gate,
            orchestrator,
            audit,
            stats,
            timeout,
        }
    }

    /// Per-domain accuracy. A domain whose query fails is reported with only
    /// `error` set instead of failing the whole summary.
    pub async fn accuracy_summary(&self) -> PerformanceSummary {
        let mut domains = Vec::with_capacity(self.config.domains.len());
        for domain in &self.config.domains {
            let entry = match self.gate.evaluate(domain).await {
                Ok(decision) => DomainAccuracy {
                    domain: domain.clone(),
                    accuracy: Some(decision.sample.accuracy),
                    sample_count: Some(decision.sample.sample_count),
                    needs_retraining: Some(decision.needs_retraining),
                    error: None,
                },
                Err(e) => {
                    warn!(domain = %domain, error = %e, "Accuracy unavailable");
                    DomainAccuracy {
                        domain: domain.clone(),
                        accuracy: None,
                        sample_count: None,
                        needs_retraining: None,
                        error: Some(e.to_string()),
                    }
                }
            };
            domains.push(entry);
        }
        PerformanceSummary {
            computed_at: Utc::now(),
            threshold: self.gate.threshold(),
            domains,
        }
    }

    /// Force an orchestrator run outside the cycle. Unknown domains come
    /// back as a `failed` outcome without touching any store.
    pub async fn trigger_retrain(&self, domain: &str) -> RetrainOutcome {
        if !self.config.knows_domain(domain) {
            return RetrainOutcome::failed(domain, format!("unknown domain '{domain}'"), 0);
        }
        info!(domain, "Manual retrain requested");
        self.orchestrator.run(domain).await
    }

    /// Retraining audit entries, newest first.
    pub async fn audit_history(
        &self,
        domain: Option<&str>,
        limit: usize,
    ) -> Result<Vec<RetrainingAuditEntry>> {
        call_store("audit log", self.timeout, self.audit.audit_history(domain, limit)).await
    }

    pub async fn rollback(&self, domain: &str) -> Result<ModelArtifact> {
        if !self.config.knows_domain(domain) {
            return Err(CoreError::Configuration(format!("unknown domain '{domain}'")));
        }
        self.orchestrator.rollback(domain).await
    }

    pub fn stats(&self) -> StatsSnapshot {
        self.stats.snapshot()
    }
}
