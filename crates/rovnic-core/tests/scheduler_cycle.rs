use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use rovnic_core::{
    AuditStatus, CoreError, CycleSummary, LogisticTrainer, PredictionOutcome, PredictionStep,
    RetrainConfig, ServiceBuilder, Stores, Trainer,
};
use rovnic_state::fakes::{MemoryArtifactRegistry, MemoryAuditLog, MemoryOutcomeStore};
use rovnic_state::{
    ArtifactRegistry, AuditLog, OutcomeQuery, OutcomeRecord, OutcomeStore, StorageResult,
};
use tokio::sync::watch;

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Outcome store whose queries for one domain never answer in time.
struct StallingOutcomeStore {
    inner: MemoryOutcomeStore,
    stalled_domain: &'static str,
}

#[async_trait]
impl OutcomeStore for StallingOutcomeStore {
    async fn append(&self, record: OutcomeRecord) -> StorageResult<()> {
        self.inner.append(record).await
    }

    async fn query(&self, query: &OutcomeQuery) -> StorageResult<Vec<OutcomeRecord>> {
        if query.domain == self.stalled_domain {
            tokio::time::sleep(Duration::from_secs(3600)).await;
        }
        self.inner.query(query).await
    }
}

/// Prediction step that errors for one domain and is idle for the rest.
struct FlakyPredictionStep {
    broken_domain: &'static str,
}

#[async_trait]
impl PredictionStep for FlakyPredictionStep {
    async fn run(&self, domain: &str) -> rovnic_core::Result<PredictionOutcome> {
        if domain == self.broken_domain {
            return Err(CoreError::unavailable("odds api", "HTTP 503"));
        }
        Ok(PredictionOutcome::NoGames)
    }
}

/// Prediction step that requests shutdown while handling one domain and
/// records every domain it was asked about.
struct ShutdownDuringStep {
    trigger_domain: &'static str,
    shutdown: watch::Sender<bool>,
    seen: Mutex<Vec<String>>,
}

#[async_trait]
impl PredictionStep for ShutdownDuringStep {
    async fn run(&self, domain: &str) -> rovnic_core::Result<PredictionOutcome> {
        self.seen.lock().unwrap().push(domain.to_string());
        if domain == self.trigger_domain {
            self.shutdown.send(true).unwrap();
        }
        Ok(PredictionOutcome::NoGames)
    }
}

async fn seed(store: &dyn OutcomeStore, domain: &str, count: usize, correct: usize) {
    for i in 0..count {
        let ok = i < correct;
        let confidence = if ok { 0.7 } else { 0.4 };
        let record = OutcomeRecord::new(domain, "Win", confidence, Some(ok))
            .observed_at(Utc::now() - chrono::Duration::minutes(i as i64));
        store.append(record).await.unwrap();
    }
}

struct Fixture {
    outcomes: Arc<MemoryOutcomeStore>,
    registry: Arc<MemoryArtifactRegistry>,
    audit: Arc<MemoryAuditLog>,
}

impl Fixture {
    fn new() -> Self {
        Self {
            outcomes: Arc::new(MemoryOutcomeStore::new()),
            registry: Arc::new(MemoryArtifactRegistry::new()),
            audit: Arc::new(MemoryAuditLog::new()),
        }
    }

    fn stores(&self) -> Stores {
        Stores {
            outcomes: self.outcomes.clone(),
            registry: self.registry.clone(),
            audit: self.audit.clone(),
        }
    }
}

// ---------------------------------------------------------------------------
// Single cycles
// ---------------------------------------------------------------------------

#[tokio::test]
async fn empty_history_skips_every_domain() {
    let fx = Fixture::new();
    let service = ServiceBuilder::new(RetrainConfig::default(), fx.stores())
        .build()
        .unwrap();

    let report = service.scheduler.run_cycle().await;
    assert_eq!(report.cycle, 1);
    assert!(!report.interrupted);
    assert_eq!(
        report.summary,
        CycleSummary {
            total_domains: 8,
            successful: 8,
            failed: 0,
            not_started: 0,
        }
    );
    for domain in &report.domains {
        assert_eq!(domain.prediction, Some(PredictionOutcome::Disabled));
        assert_eq!(domain.needs_retraining, Some(true));
        assert_eq!(domain.retrain.as_ref().unwrap().status, AuditStatus::Skipped);
    }

    let stats = service.stats.snapshot();
    assert_eq!(stats.cycles, 1);
    assert_eq!(stats.retrains_skipped, 8);
    assert_eq!(fx.audit.audit_history(None, 100).await.unwrap().len(), 8);
}

#[tokio::test]
async fn five_records_report_insufficient_data() {
    let fx = Fixture::new();
    seed(fx.outcomes.as_ref(), "nba", 5, 5).await;
    let service = ServiceBuilder::new(RetrainConfig::default(), fx.stores())
        .build()
        .unwrap();

    let report = service.scheduler.run_cycle().await;
    let nba = report.domain("nba").unwrap();
    // Five out of five correct is above threshold, so the gate does not fire.
    assert_eq!(nba.needs_retraining, Some(false));

    let outcome = service.ops.trigger_retrain("nba").await;
    assert_eq!(outcome.status, AuditStatus::Skipped);
    assert_eq!(outcome.reason.as_deref(), Some("Insufficient data"));
}

#[tokio::test]
async fn low_accuracy_domain_is_retrained_and_promoted() {
    let fx = Fixture::new();
    seed(fx.outcomes.as_ref(), "nba", 100, 60).await;
    let service = ServiceBuilder::new(RetrainConfig::default(), fx.stores())
        .build()
        .unwrap();

    let report = service.scheduler.run_cycle().await;
    let nba = report.domain("nba").unwrap();
    let sample = nba.accuracy.as_ref().unwrap();
    assert!((sample.accuracy - 0.60).abs() < 1e-12);
    assert_eq!(sample.sample_count, 100);
    assert_eq!(nba.needs_retraining, Some(true));

    let retrain = nba.retrain.as_ref().unwrap();
    assert_eq!(retrain.status, AuditStatus::Completed);
    assert!((0.0..=1.0).contains(&retrain.resulting_accuracy.unwrap()));

    let active = fx.registry.current("nba").await.unwrap().unwrap();
    assert_eq!(Some(active.version), retrain.artifact_version.clone());

    let entries = fx.audit.audit_history(Some("nba"), 10).await.unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].status, AuditStatus::Completed);
    assert_eq!(report.summary.failed, 0);
}

#[tokio::test(start_paused = true)]
async fn stalled_domain_fails_alone_and_keeps_its_artifact() {
    let fx = Fixture::new();
    let baseline = LogisticTrainer::default()
        .train("nhl", &[vec![0.3], vec![0.7]], &[false, true])
        .unwrap();
    let baseline = fx.registry.promote(baseline).await.unwrap();

    let outcomes = Arc::new(StallingOutcomeStore {
        inner: MemoryOutcomeStore::new(),
        stalled_domain: "nhl",
    });
    let stores = Stores {
        outcomes,
        registry: fx.registry.clone(),
        audit: fx.audit.clone(),
    };
    let config = RetrainConfig {
        request_timeout_secs: 2,
        ..Default::default()
    };
    let service = ServiceBuilder::new(config, stores).build().unwrap();

    let report = service.scheduler.run_cycle().await;
    assert_eq!(
        report.summary,
        CycleSummary {
            total_domains: 8,
            successful: 7,
            failed: 1,
            not_started: 0,
        }
    );

    let nhl = report.domain("nhl").unwrap();
    assert!(!nhl.is_successful());
    assert!(nhl.errors[0].contains("timed out"));
    assert!(nhl.retrain.is_none());

    let current = fx.registry.current("nhl").await.unwrap().unwrap();
    assert_eq!(current, baseline);
    assert_eq!(fx.audit.audit_history(Some("nhl"), 10).await.unwrap().len(), 0);
    assert_eq!(service.stats.snapshot().errors, 1);
}

#[tokio::test]
async fn prediction_failure_does_not_stop_the_domain_or_the_cycle() {
    let fx = Fixture::new();
    let service = ServiceBuilder::new(RetrainConfig::default(), fx.stores())
        .prediction_step(Arc::new(FlakyPredictionStep {
            broken_domain: "nfl",
        }))
        .build()
        .unwrap();

    let report = service.scheduler.run_cycle().await;
    assert_eq!(report.summary.failed, 1);
    assert_eq!(report.summary.successful, 7);

    let nfl = report.domain("nfl").unwrap();
    assert!(nfl.prediction.is_none());
    assert!(nfl.errors[0].starts_with("prediction:"));
    // The accuracy check still ran for the failed domain.
    assert!(nfl.accuracy.is_some());

    let nba = report.domain("nba").unwrap();
    assert_eq!(nba.prediction, Some(PredictionOutcome::NoGames));
}

#[tokio::test]
async fn domains_run_in_configured_order() {
    let config = RetrainConfig::default().with_domains(["ufc", "nba"]);
    let service = ServiceBuilder::new(config, Fixture::new().stores())
        .build()
        .unwrap();

    let report = service.scheduler.run_cycle().await;
    let order: Vec<&str> = report.domains.iter().map(|d| d.domain.as_str()).collect();
    assert_eq!(order, vec!["ufc", "nba"]);
    assert_eq!(report.summary.total_domains, 2);
}

#[tokio::test]
async fn shutdown_mid_cycle_finishes_the_current_domain_and_stops() {
    let fx = Fixture::new();
    let (tx, rx) = watch::channel(false);
    let step = Arc::new(ShutdownDuringStep {
        trigger_domain: "nfl",
        shutdown: tx,
        seen: Mutex::new(Vec::new()),
    });
    let config = RetrainConfig::default().with_domains(["nba", "nfl", "mlb", "nhl"]);
    let service = ServiceBuilder::new(config, fx.stores())
        .prediction_step(step.clone())
        .build()
        .unwrap();

    let report = service.scheduler.run_cycle_until(&rx).await;
    assert!(report.interrupted);
    assert_eq!(
        report.summary,
        CycleSummary {
            total_domains: 4,
            successful: 2,
            failed: 0,
            not_started: 2,
        }
    );

    // The domain that saw the shutdown still ran its accuracy check and
    // orchestrator attempt to the end.
    let nfl = report.domain("nfl").unwrap();
    assert_eq!(nfl.prediction, Some(PredictionOutcome::NoGames));
    assert!(nfl.accuracy.is_some());
    assert_eq!(nfl.retrain.as_ref().unwrap().status, AuditStatus::Skipped);

    assert!(report.domain("mlb").is_none());
    assert!(report.domain("nhl").is_none());
    assert_eq!(*step.seen.lock().unwrap(), vec!["nba", "nfl"]);
    assert_eq!(fx.audit.audit_history(None, 10).await.unwrap().len(), 2);
}

#[tokio::test]
async fn cycle_without_shutdown_request_is_not_interrupted() {
    let (_tx, rx) = watch::channel(false);
    let service = ServiceBuilder::new(RetrainConfig::default(), Fixture::new().stores())
        .build()
        .unwrap();

    let report = service.scheduler.run_cycle_until(&rx).await;
    assert!(!report.interrupted);
    assert_eq!(report.domains.len(), 8);
    assert_eq!(report.summary.not_started, 0);
}

// ---------------------------------------------------------------------------
// Long-running loop
// ---------------------------------------------------------------------------

#[tokio::test(start_paused = true)]
async fn run_until_ticks_on_the_interval_and_stops_on_shutdown() {
    let service = ServiceBuilder::new(RetrainConfig::default(), Fixture::new().stores())
        .build()
        .unwrap();
    let stats = service.stats.clone();
    let scheduler = Arc::new(service.scheduler);
    let (tx, rx) = watch::channel(false);

    let handle = tokio::spawn({
        let scheduler = scheduler.clone();
        async move { scheduler.run_until(rx).await }
    });

    // First sweep runs immediately, the second at the four hour mark.
    tokio::time::sleep(Duration::from_secs(4 * 3600 + 60)).await;
    tx.send(true).unwrap();

    let cycles = handle.await.unwrap();
    assert_eq!(cycles, 2);
    assert_eq!(stats.snapshot().cycles, 2);
}

#[tokio::test]
async fn run_until_returns_immediately_when_already_shut_down() {
    let service = ServiceBuilder::new(RetrainConfig::default(), Fixture::new().stores())
        .build()
        .unwrap();
    let (_tx, rx) = watch::channel(true);
    assert_eq!(service.scheduler.run_until(rx).await, 0);
}

#[tokio::test]
async fn dropped_shutdown_sender_stops_the_loop() {
    let service = ServiceBuilder::new(RetrainConfig::default(), Fixture::new().stores())
        .build()
        .unwrap();
    let (tx, rx) = watch::channel(false);
    drop(tx);
    // One immediate tick may win the select before the closed channel is seen.
    assert!(service.scheduler.run_until(rx).await <= 1);
}
