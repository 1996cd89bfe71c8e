//! Service assembly.
//!
//! Components are built from a validated configuration and already-live
//! collaborators; an invalid configuration fails construction.

use std::sync::Arc;

use tracing::info;

use crate::config::RetrainConfig;
use crate::error::Result;
use crate::ml::{AccuracyValidator, LogisticTrainer, Trainer, Validator};
use crate::monitor::{AccuracyTracker, RetrainingGate};
use crate::ops::OperationsApi;
use crate::orchestrator::RetrainOrchestrator;
use crate::predictor::PredictionStep;
use crate::scheduler::CycleScheduler;
use crate::stats::ServiceStats;
use crate::stores::Stores;

/// A fully wired service: the scheduler and the operational surface share
/// one orchestrator (and so one set of per-domain guards) and one stats
/// object.
pub struct RetrainService {
    pub scheduler: CycleScheduler,
    pub ops: OperationsApi,
    pub stats: Arc<ServiceStats>,
}

pub struct ServiceBuilder {
    config: RetrainConfig,
    stores: Stores,
    prediction: Option<Arc<dyn PredictionStep>>,
    trainer: Arc<dyn Trainer>,
    validator: Arc<dyn Validator>,
    stats: Arc<ServiceStats>,
}

impl ServiceBuilder {
    pub fn new(config: RetrainConfig, stores: Stores) -> Self {
        Self {
            config,
            stores,
            prediction: None,
            trainer: Arc::new(LogisticTrainer::default()),
            validator: Arc::new(AccuracyValidator),
            stats: Arc::new(ServiceStats::new()),
        }
    }

    /// Without a prediction step every cycle reports `Disabled` for it.
    pub fn prediction_step(mut self, step: Arc<dyn PredictionStep>) -> Self {
        self.prediction = Some(step);
        self
    }

    pub fn trainer(mut self, trainer: Arc<dyn Trainer>) -> Self {
        self.trainer = trainer;
        self
    }

    pub fn validator(mut self, validator: Arc<dyn Validator>) -> Self {
        self.validator = validator;
        self
    }

    /// Share an existing stats object (e.g. one the prediction step counts
    /// into).
    pub fn stats(mut self, stats: Arc<ServiceStats>) -> Self {
        self.stats = stats;
        self
    }

    pub fn build(self) -> Result<RetrainService> {
        self.config.validate()?;
        let config = self.config;

        let tracker = AccuracyTracker::new(self.stores.outcomes.clone(), &config);
        let gate = RetrainingGate::new(tracker, &config);
        let orchestrator = Arc::new(RetrainOrchestrator::new(
            &self.stores,
            self.trainer,
            self.validator,
            self.stats.clone(),
            &config,
        ));

        info!(
            domains = ?config.domains,
            threshold = config.accuracy_threshold,
            window_days = config.rolling_window_days,
            min_predictions = config.min_predictions_for_retrain,
            prediction_enabled = self.prediction.is_some(),
            "Retraining service assembled"
        );

        let ops = OperationsApi::new(
            config.clone(),
            gate.clone(),
            orchestrator.clone(),
            self.stores.audit.clone(),
            self.stats.clone(),
        );
        let scheduler = CycleScheduler::new(
            config,
            self.prediction,
            gate,
            orchestrator,
            self.stats.clone(),
        );

        Ok(RetrainService {
            scheduler,
            ops,
            stats: self.stats,
        })
    }
}
