//! Rovnic Core Library
//!
//! Decides when a domain's model has drifted enough to retrain, and
//! retrains, validates and promotes a replacement without disturbing the
//! artifact currently being served.
//!
//! ## Components, leaves first
//!
//! - `monitor`: `AccuracyTracker` and `RetrainingGate`
//! - `ml`: `LogisticTrainer` and `AccuracyValidator` behind the `Trainer` /
//!   `Validator` seams
//! - `orchestrator`: `RetrainOrchestrator` (STARTED → SKIPPED | FAILED | COMPLETED)
//! - `scheduler`: `CycleScheduler`, the periodic per-domain sweep
//! - `features`, `odds`, `predictor`: the prediction step run ahead of the
//!   accuracy check in every cycle
//! - `ops`: the operational surface (summary, manual retrain, audit, rollback)

pub mod config;
pub mod error;
pub mod features;
pub mod ml;
pub mod monitor;
pub mod obs;
pub mod odds;
pub mod ops;
pub mod orchestrator;
pub mod predictor;
pub mod scheduler;
pub mod service;
pub mod stats;
pub mod stores;
pub mod telemetry;

pub use config::{RetrainConfig, DEFAULT_DOMAINS};
pub use error::{CoreError, Result};
pub use features::{FeatureExtractor, GameContext, OddsFeatureExtractor};
pub use ml::{AccuracyValidator, LogisticTrainer, Trainer, TrainingSet, Validator};
pub use monitor::{accuracy_of, AccuracySample, AccuracyTracker, GateDecision, RetrainingGate};
pub use obs::{
    cycle_span, domain_span, emit_accuracy_computed, emit_artifact_promoted, emit_cycle_finished,
    emit_cycle_started, emit_domain_failed, emit_gate_evaluated, emit_retrain_finished,
};
pub use odds::{GameContextSource, OddsApiClient};
pub use ops::{DomainAccuracy, OperationsApi, PerformanceSummary};
pub use orchestrator::{RetrainOrchestrator, RetrainOutcome, INSUFFICIENT_DATA_REASON};
pub use predictor::{ModelPredictionStep, ModelPredictor, Prediction, PredictionOutcome, PredictionStep};
pub use scheduler::{CycleReport, CycleScheduler, CycleSummary, DomainReport};
pub use service::{RetrainService, ServiceBuilder};
pub use stats::{ServiceStats, StatsSnapshot};
pub use stores::Stores;
pub use telemetry::init_tracing;

pub use rovnic_state::{AuditStatus, ModelArtifact, OutcomeRecord, RetrainingAuditEntry};
