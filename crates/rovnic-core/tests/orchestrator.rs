use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{Duration, Utc};
use rovnic_core::{
    AccuracyValidator, CoreError, LogisticTrainer, RetrainConfig, RetrainOrchestrator,
    ServiceStats, Stores, Trainer, Validator,
};
use rovnic_state::fakes::{MemoryArtifactRegistry, MemoryAuditLog, MemoryOutcomeStore};
use rovnic_state::{
    ArtifactRegistry, AuditLog, AuditStatus, ModelArtifact, OutcomeRecord, OutcomeStore,
    StorageError, StorageResult,
};

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Wraps the real trainer and counts calls.
#[derive(Default)]
struct CountingTrainer {
    calls: AtomicUsize,
    inner: LogisticTrainer,
}

impl Trainer for CountingTrainer {
    fn train(
        &self,
        domain: &str,
        features: &[Vec<f64>],
        labels: &[bool],
    ) -> rovnic_core::Result<ModelArtifact> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.inner.train(domain, features, labels)
    }
}

struct FailingTrainer;

impl Trainer for FailingTrainer {
    fn train(&self, _: &str, _: &[Vec<f64>], _: &[bool]) -> rovnic_core::Result<ModelArtifact> {
        Err(CoreError::Training("singular matrix".to_string()))
    }
}

/// Produces an artifact whose normalizer half is missing.
struct HalfArtifactTrainer;

impl Trainer for HalfArtifactTrainer {
    fn train(&self, domain: &str, _: &[Vec<f64>], _: &[bool]) -> rovnic_core::Result<ModelArtifact> {
        Ok(ModelArtifact::new(domain, b"{\"weights\":[1.0],\"bias\":0.0}".to_vec(), Vec::new(), 1))
    }
}

/// Always reports the same accuracy without looking at the artifact.
struct FixedValidator(f64);

impl Validator for FixedValidator {
    fn validate(&self, _: &ModelArtifact, _: &[Vec<f64>], _: &[bool]) -> rovnic_core::Result<f64> {
        Ok(self.0)
    }
}

/// Registry that reads from an inner fake but refuses every write.
struct ReadOnlyRegistry(MemoryArtifactRegistry);

#[async_trait]
impl ArtifactRegistry for ReadOnlyRegistry {
    async fn current(&self, domain: &str) -> StorageResult<Option<ModelArtifact>> {
        self.0.current(domain).await
    }
    async fn promote(&self, _: ModelArtifact) -> StorageResult<ModelArtifact> {
        Err(StorageError::Backend("disk full".to_string()))
    }
    async fn rollback(&self, domain: &str) -> StorageResult<ModelArtifact> {
        self.0.rollback(domain).await
    }
    async fn history(&self, domain: &str) -> StorageResult<Vec<ModelArtifact>> {
        self.0.history(domain).await
    }
}

struct Harness {
    outcomes: Arc<MemoryOutcomeStore>,
    registry: Arc<MemoryArtifactRegistry>,
    audit: Arc<MemoryAuditLog>,
    stats: Arc<ServiceStats>,
}

impl Harness {
    fn new() -> Self {
        Self {
            outcomes: Arc::new(MemoryOutcomeStore::new()),
            registry: Arc::new(MemoryArtifactRegistry::new()),
            audit: Arc::new(MemoryAuditLog::new()),
            stats: Arc::new(ServiceStats::new()),
        }
    }

    fn stores(&self) -> Stores {
        Stores {
            outcomes: self.outcomes.clone(),
            registry: self.registry.clone(),
            audit: self.audit.clone(),
        }
    }

    fn orchestrator(
        &self,
        trainer: Arc<dyn Trainer>,
        validator: Arc<dyn Validator>,
        config: &RetrainConfig,
    ) -> RetrainOrchestrator {
        RetrainOrchestrator::new(&self.stores(), trainer, validator, self.stats.clone(), config)
    }

    /// `count` resolved outcomes, the first `correct` of them correct, with
    /// confidence tracking the correct/incorrect split so the data is
    /// learnable.
    async fn seed(&self, domain: &str, count: usize, correct: usize) {
        for i in 0..count {
            let ok = i < correct;
            let confidence = if ok { 0.75 } else { 0.35 };
            let record = OutcomeRecord::new(domain, "Win", confidence, Some(ok))
                .observed_at(Utc::now() - Duration::minutes(i as i64));
            self.outcomes.append(record).await.unwrap();
        }
    }

    async fn promote_baseline(&self, domain: &str) -> ModelArtifact {
        let artifact = LogisticTrainer::default()
            .train(domain, &[vec![0.2], vec![0.8]], &[false, true])
            .unwrap();
        self.registry.promote(artifact).await.unwrap()
    }
}

// ---------------------------------------------------------------------------
// SKIPPED
// ---------------------------------------------------------------------------

#[tokio::test]
async fn five_records_are_skipped_as_insufficient_data() {
    let h = Harness::new();
    h.seed("nba", 5, 5).await;
    let trainer = Arc::new(CountingTrainer::default());
    let orchestrator = h.orchestrator(trainer.clone(), Arc::new(AccuracyValidator), &RetrainConfig::default());

    let outcome = orchestrator.run("nba").await;
    assert_eq!(outcome.status, AuditStatus::Skipped);
    assert_eq!(outcome.reason.as_deref(), Some("Insufficient data"));
    assert_eq!(outcome.sample_count, 5);
    assert_eq!(trainer.calls.load(Ordering::SeqCst), 0);

    let json = serde_json::to_value(&outcome).unwrap();
    assert_eq!(json["status"], "skipped");
    assert_eq!(json["reason"], "Insufficient data");
}

#[tokio::test]
async fn unresolved_records_do_not_reach_min_predictions() {
    let h = Harness::new();
    h.seed("nfl", 9, 5).await;
    for _ in 0..20 {
        h.outcomes
            .append(OutcomeRecord::new("nfl", "Win", 0.6, None))
            .await
            .unwrap();
    }
    let trainer = Arc::new(CountingTrainer::default());
    let orchestrator = h.orchestrator(trainer.clone(), Arc::new(AccuracyValidator), &RetrainConfig::default());

    let outcome = orchestrator.run("nfl").await;
    assert_eq!(outcome.status, AuditStatus::Skipped);
    assert_eq!(trainer.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn skip_writes_one_audit_entry() {
    let h = Harness::new();
    let orchestrator = h.orchestrator(
        Arc::new(LogisticTrainer::default()),
        Arc::new(AccuracyValidator),
        &RetrainConfig::default(),
    );
    orchestrator.run("ufc").await;

    let entries = h.audit.audit_history(None, 10).await.unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].status, AuditStatus::Skipped);
    assert_eq!(h.stats.snapshot().retrains_skipped, 1);
}

// ---------------------------------------------------------------------------
// FAILED
// ---------------------------------------------------------------------------

#[tokio::test]
async fn trainer_failure_leaves_active_artifact_untouched() {
    let h = Harness::new();
    let baseline = h.promote_baseline("nba").await;
    h.seed("nba", 30, 12).await;
    let orchestrator = h.orchestrator(
        Arc::new(FailingTrainer),
        Arc::new(AccuracyValidator),
        &RetrainConfig::default(),
    );

    let outcome = orchestrator.run("nba").await;
    assert_eq!(outcome.status, AuditStatus::Failed);
    assert!(outcome.reason.as_deref().unwrap().contains("singular matrix"));
    assert_eq!(outcome.sample_count, 30);

    let current = h.registry.current("nba").await.unwrap().unwrap();
    assert_eq!(current, baseline);
    assert_eq!(h.registry.history("nba").await.unwrap().len(), 1);

    let entries = h.audit.audit_history(Some("nba"), 10).await.unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].status, AuditStatus::Failed);
    assert!(entries[0].artifact_version.is_none());
}

#[tokio::test]
async fn incomplete_artifact_is_refused_and_previous_stays_active() {
    let h = Harness::new();
    let baseline = h.promote_baseline("mlb").await;
    h.seed("mlb", 20, 10).await;
    let orchestrator = h.orchestrator(
        Arc::new(HalfArtifactTrainer),
        Arc::new(FixedValidator(0.9)),
        &RetrainConfig::default(),
    );

    let outcome = orchestrator.run("mlb").await;
    assert_eq!(outcome.status, AuditStatus::Failed);
    assert!(outcome.reason.unwrap().contains("normalizer_blob"));
    assert_eq!(h.registry.current("mlb").await.unwrap().unwrap(), baseline);
}

#[tokio::test]
async fn failed_promotion_write_leaves_previous_active() {
    let h = Harness::new();
    h.seed("nhl", 20, 10).await;

    let inner = MemoryArtifactRegistry::new();
    let baseline = LogisticTrainer::default()
        .train("nhl", &[vec![0.2], vec![0.8]], &[false, true])
        .unwrap();
    let baseline = inner.promote(baseline).await.unwrap();
    let registry = Arc::new(ReadOnlyRegistry(inner));
    let stores = Stores {
        outcomes: h.outcomes.clone(),
        registry: registry.clone(),
        audit: h.audit.clone(),
    };
    let orchestrator = RetrainOrchestrator::new(
        &stores,
        Arc::new(LogisticTrainer::default()),
        Arc::new(AccuracyValidator),
        h.stats.clone(),
        &RetrainConfig::default(),
    );

    let outcome = orchestrator.run("nhl").await;
    assert_eq!(outcome.status, AuditStatus::Failed);
    assert!(outcome.reason.unwrap().contains("disk full"));
    assert_eq!(
        registry.current("nhl").await.unwrap().unwrap().version,
        baseline.version
    );
    assert_eq!(h.stats.snapshot().retrains_failed, 1);
}

#[tokio::test]
async fn validation_below_promotion_floor_fails_without_promoting() {
    let h = Harness::new();
    h.seed("soccer", 20, 10).await;
    let config = RetrainConfig {
        min_validation_accuracy: 0.95,
        ..Default::default()
    };
    let orchestrator = h.orchestrator(
        Arc::new(LogisticTrainer::default()),
        Arc::new(FixedValidator(0.5)),
        &config,
    );

    let outcome = orchestrator.run("soccer").await;
    assert_eq!(outcome.status, AuditStatus::Failed);
    assert!(outcome.reason.unwrap().contains("promotion floor"));
    assert!(h.registry.current("soccer").await.unwrap().is_none());
}

#[tokio::test]
async fn out_of_range_validator_result_is_a_failure() {
    let h = Harness::new();
    h.seed("ncaab", 20, 10).await;
    let orchestrator = h.orchestrator(
        Arc::new(LogisticTrainer::default()),
        Arc::new(FixedValidator(1.5)),
        &RetrainConfig::default(),
    );
    let outcome = orchestrator.run("ncaab").await;
    assert_eq!(outcome.status, AuditStatus::Failed);
    assert!(h.registry.current("ncaab").await.unwrap().is_none());
}

// ---------------------------------------------------------------------------
// COMPLETED
// ---------------------------------------------------------------------------

#[tokio::test]
async fn hundred_records_train_and_complete_with_one_audit_entry() {
    let h = Harness::new();
    h.seed("nba", 100, 60).await;
    let orchestrator = h.orchestrator(
        Arc::new(LogisticTrainer::default()),
        Arc::new(AccuracyValidator),
        &RetrainConfig::default(),
    );

    let outcome = orchestrator.run("nba").await;
    assert_eq!(outcome.status, AuditStatus::Completed);
    let accuracy = outcome.resulting_accuracy.unwrap();
    assert!((0.0..=1.0).contains(&accuracy));
    assert_eq!(outcome.sample_count, 100);

    let entries = h.audit.audit_history(None, 10).await.unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].status, AuditStatus::Completed);
    assert_eq!(entries[0].resulting_accuracy, Some(accuracy));
    assert_eq!(entries[0].artifact_version, outcome.artifact_version);

    let active = h.registry.current("nba").await.unwrap().unwrap();
    assert_eq!(Some(active.version.clone()), outcome.artifact_version);
    assert_eq!(active.validation_accuracy, Some(accuracy));
    assert_eq!(active.revision, 1);
    active.verify().unwrap();
}

#[tokio::test]
async fn completed_run_keeps_previous_artifact_for_rollback() {
    let h = Harness::new();
    let baseline = h.promote_baseline("nfl").await;
    h.seed("nfl", 40, 20).await;
    let orchestrator = h.orchestrator(
        Arc::new(LogisticTrainer::default()),
        Arc::new(AccuracyValidator),
        &RetrainConfig::default(),
    );

    let outcome = orchestrator.run("nfl").await;
    assert_eq!(outcome.status, AuditStatus::Completed);
    assert_eq!(h.registry.history("nfl").await.unwrap().len(), 2);

    let restored = orchestrator.rollback("nfl").await.unwrap();
    assert_eq!(restored.version, baseline.version);
    assert_eq!(
        h.registry.current("nfl").await.unwrap().unwrap().version,
        baseline.version
    );
}

#[tokio::test]
async fn holdout_validation_scores_the_newest_rows() {
    let h = Harness::new();
    h.seed("ncaaf", 50, 25).await;
    let config = RetrainConfig {
        validation_holdout: 0.2,
        ..Default::default()
    };
    let trainer = Arc::new(CountingTrainer::default());
    let orchestrator = h.orchestrator(trainer.clone(), Arc::new(AccuracyValidator), &config);

    let outcome = orchestrator.run("ncaaf").await;
    assert_eq!(outcome.status, AuditStatus::Completed);
    // Ten newest rows held out.
    let active = h.registry.current("ncaaf").await.unwrap().unwrap();
    assert_eq!(active.sample_count, 40);
    assert_eq!(outcome.sample_count, 40);
    assert_eq!(trainer.calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn concurrent_runs_for_one_domain_are_serialised() {
    let h = Harness::new();
    h.seed("nba", 30, 15).await;
    let orchestrator = Arc::new(h.orchestrator(
        Arc::new(LogisticTrainer::default()),
        Arc::new(AccuracyValidator),
        &RetrainConfig::default(),
    ));

    let a = tokio::spawn({
        let o = orchestrator.clone();
        async move { o.run("nba").await }
    });
    let b = tokio::spawn({
        let o = orchestrator.clone();
        async move { o.run("nba").await }
    });
    let (a, b) = (a.await.unwrap(), b.await.unwrap());
    assert_eq!(a.status, AuditStatus::Completed);
    assert_eq!(b.status, AuditStatus::Completed);

    let revisions: Vec<u64> = h
        .registry
        .history("nba")
        .await
        .unwrap()
        .iter()
        .map(|a| a.revision)
        .collect();
    assert_eq!(revisions, vec![2, 1]);
    assert_eq!(h.audit.audit_history(Some("nba"), 10).await.unwrap().len(), 2);
}
