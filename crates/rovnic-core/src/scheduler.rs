//! Cycle Scheduler: the periodic per-domain sweep.
//!
//! For each configured domain, in order: prediction step, then accuracy
//! and gate, then the orchestrator when the gate asks for it. A failure in
//! any step is recorded on that domain's report and the sweep moves on.

use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tokio::time::MissedTickBehavior;
use tracing::{info, Instrument};

use crate::config::RetrainConfig;
use crate::monitor::{AccuracySample, RetrainingGate};
use crate::obs;
use crate::orchestrator::{RetrainOrchestrator, RetrainOutcome};
use crate::predictor::{PredictionOutcome, PredictionStep};
use crate::stats::ServiceStats;

/// `total_domains` counts every configured domain, so
/// `successful + failed + not_started == total_domains`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CycleSummary {
    pub total_domains: usize,
    pub successful: usize,
    pub failed: usize,
    /// Domains left unprocessed because shutdown ended the cycle early.
    #[serde(default)]
    pub not_started: usize,
}

/// What happened to one domain during a cycle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DomainReport {
    pub domain: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prediction: Option<PredictionOutcome>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub accuracy: Option<AccuracySample>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub needs_retraining: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retrain: Option<RetrainOutcome>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<String>,
}

impl DomainReport {
    fn new(domain: &str) -> Self {
        Self {
            domain: domain.to_string(),
            prediction: None,
            accuracy: None,
            needs_retraining: None,
            retrain: None,
            errors: Vec::new(),
        }
    }

    /// No step errored and the retrain, if any, did not fail.
    pub fn is_successful(&self) -> bool {
        self.errors.is_empty() && !self.retrain.as_ref().is_some_and(RetrainOutcome::is_failed)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CycleReport {
    pub cycle: u64,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub domains: Vec<DomainReport>,
    pub summary: CycleSummary,
    /// True when shutdown stopped the sweep before every domain ran.
    #[serde(default)]
    pub interrupted: bool,
}

impl CycleReport {
    pub fn domain(&self, domain: &str) -> Option<&DomainReport> {
        self.domains.iter().find(|d| d.domain == domain)
    }
}

pub struct CycleScheduler {
    config: RetrainConfig,
    prediction: Option<Arc<dyn PredictionStep>>,
    gate: RetrainingGate,
    orchestrator: Arc<RetrainOrchestrator>,
    stats: Arc<ServiceStats>,
}

impl CycleScheduler {
    pub fn new(
        config: RetrainConfig,
        prediction: Option<Arc<dyn PredictionStep>>,
        gate: RetrainingGate,
        orchestrator: Arc<RetrainOrchestrator>,
        stats: Arc<ServiceStats>,
    ) -> Self {
        Self {
            config,
            prediction,
            gate,
            orchestrator,
            stats,
        }
    }

    /// Run one full sweep over every configured domain.
    pub async fn run_cycle(&self) -> CycleReport {
        self.sweep(None).await
    }

    /// Run one sweep, stopping before the next domain once `shutdown` is
    /// `true`. The report is marked `interrupted` when domains were left.
    pub async fn run_cycle_until(&self, shutdown: &watch::Receiver<bool>) -> CycleReport {
        self.sweep(Some(shutdown)).await
    }

    /// Run a cycle now, then every `cycle_interval_hours` until `shutdown`
    /// becomes `true` (or its sender is dropped). Returns the number of
    /// cycles run.
    ///
    /// Shutdown is observed while idle and between domains; a domain that
    /// has started is always finished first.
    pub async fn run_until(&self, mut shutdown: watch::Receiver<bool>) -> u64 {
        let mut ticker = tokio::time::interval(self.config.cycle_interval());
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let mut cycles = 0u64;

        info!(
            interval_hours = self.config.cycle_interval_hours,
            domains = self.config.domains.len(),
            "Scheduler started"
        );
        loop {
            if *shutdown.borrow() {
                break;
            }
            tokio::select! {
                _ = ticker.tick() => {
                    self.run_cycle_until(&shutdown).await;
                    cycles += 1;
                }
                changed = shutdown.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
            }
        }
        info!(cycles, "Scheduler stopped");
        cycles
    }

    async fn sweep(&self, shutdown: Option<&watch::Receiver<bool>>) -> CycleReport {
        let cycle = self.stats.record_cycle();
        self.sweep_domains(cycle, shutdown)
            .instrument(obs::cycle_span(cycle))
            .await
    }

    async fn sweep_domains(
        &self,
        cycle: u64,
        shutdown: Option<&watch::Receiver<bool>>,
    ) -> CycleReport {
        let started_at = Utc::now();
        let clock = Instant::now();
        let total = self.config.domains.len();
        obs::emit_cycle_started(cycle, total);

        let mut domains = Vec::with_capacity(total);
        let mut interrupted = false;
        for domain in &self.config.domains {
            if shutdown.is_some_and(|rx| *rx.borrow()) {
                interrupted = true;
                info!(remaining = total - domains.len(), "Shutdown requested, ending cycle early");
                break;
            }
            let report = self
                .process_domain(domain)
                .instrument(obs::domain_span(domain))
                .await;
            domains.push(report);
        }

        let successful = domains.iter().filter(|d| d.is_successful()).count();
        let summary = CycleSummary {
            total_domains: total,
            successful,
            failed: domains.len() - successful,
            not_started: total - domains.len(),
        };
        obs::emit_cycle_finished(
            cycle,
            clock.elapsed().as_millis() as u64,
            summary.successful,
            summary.failed,
        );
        self.stats.flush();

        CycleReport {
            cycle,
            started_at,
            finished_at: Utc::now(),
            domains,
            summary,
            interrupted,
        }
    }

    async fn process_domain(&self, domain: &str) -> DomainReport {
        let mut report = DomainReport::new(domain);

        match &self.prediction {
            None => report.prediction = Some(PredictionOutcome::Disabled),
            Some(step) => match step.run(domain).await {
                Ok(outcome) => report.prediction = Some(outcome),
                Err(e) => {
                    obs::emit_domain_failed(domain, "prediction", &e);
                    self.stats.record_error();
                    report.errors.push(format!("prediction: {e}"));
                }
            },
        }

        match self.gate.evaluate(domain).await {
            Ok(decision) => {
                report.needs_retraining = Some(decision.needs_retraining);
                report.accuracy = Some(decision.sample);
                if decision.needs_retraining {
                    let outcome = self.orchestrator.run(domain).await;
                    if outcome.is_failed() {
                        let reason = outcome.reason.as_deref().unwrap_or("unknown");
                        obs::emit_domain_failed(domain, "retrain", &reason);
                        self.stats.record_error();
                    }
                    report.retrain = Some(outcome);
                }
            }
            Err(e) => {
                obs::emit_domain_failed(domain, "accuracy", &e);
                self.stats.record_error();
                report.errors.push(format!("accuracy: {e}"));
            }
        }

        report
    }
}
