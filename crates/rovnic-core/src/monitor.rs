//! Accuracy Tracker and Retraining Gate.
//!
//! Both are read-only: they query the outcome store and compare, nothing
//! more. An empty history yields accuracy `0.0`, so the gate always asks for
//! retraining on a cold domain.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use rovnic_state::{OutcomeQuery, OutcomeRecord, OutcomeStore};
use serde::{Deserialize, Serialize};

use crate::config::RetrainConfig;
use crate::error::{call_store, Result};
use crate::obs;

/// Rolling accuracy for one domain at one instant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccuracySample {
    pub domain: String,
    pub window_days: u32,
    pub accuracy: f64,
    /// Records with known correctness that went into `accuracy`
    pub sample_count: usize,
    pub computed_at: DateTime<Utc>,
}

/// Fraction of resolved records that were correct, with the resolved count.
///
/// Unresolved records are ignored; no resolved records gives `(0.0, 0)`.
pub fn accuracy_of(records: &[OutcomeRecord]) -> (f64, usize) {
    let mut resolved = 0usize;
    let mut correct = 0usize;
    for record in records {
        if let Some(ok) = record.actual_correct {
            resolved += 1;
            if ok {
                correct += 1;
            }
        }
    }
    if resolved == 0 {
        return (0.0, 0);
    }
    (correct as f64 / resolved as f64, resolved)
}

/// Computes rolling accuracy over the most recent outcome records.
#[derive(Clone)]
pub struct AccuracyTracker {
    store: Arc<dyn OutcomeStore>,
    query_limit: usize,
    timeout: Duration,
}

impl AccuracyTracker {
    pub fn new(store: Arc<dyn OutcomeStore>, config: &RetrainConfig) -> Self {
        Self {
            store,
            query_limit: config.outcome_query_limit,
            timeout: config.request_timeout(),
        }
    }

    /// Accuracy over at most `query_limit` records observed in the trailing
    /// `window_days`.
    pub async fn sample(&self, domain: &str, window_days: u32) -> Result<AccuracySample> {
        let computed_at = Utc::now();
        let since = computed_at - chrono::Duration::days(i64::from(window_days));
        let query = OutcomeQuery::recent(domain, self.query_limit).since(since);
        let records = call_store("outcome store", self.timeout, self.store.query(&query)).await?;

        let (accuracy, sample_count) = accuracy_of(&records);
        obs::emit_accuracy_computed(domain, accuracy, sample_count);
        Ok(AccuracySample {
            domain: domain.to_string(),
            window_days,
            accuracy,
            sample_count,
            computed_at,
        })
    }

    pub async fn rolling_accuracy(&self, domain: &str, window_days: u32) -> Result<f64> {
        Ok(self.sample(domain, window_days).await?.accuracy)
    }
}

/// Result of one gate check.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GateDecision {
    pub sample: AccuracySample,
    pub threshold: f64,
    pub needs_retraining: bool,
}

/// Signals retraining when rolling accuracy is strictly below the threshold.
#[derive(Clone)]
pub struct RetrainingGate {
    tracker: AccuracyTracker,
    threshold: f64,
    window_days: u32,
}

impl RetrainingGate {
    pub fn new(tracker: AccuracyTracker, config: &RetrainConfig) -> Self {
        Self {
            tracker,
            threshold: config.accuracy_threshold,
            window_days: config.rolling_window_days,
        }
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    /// Pure comparison; `accuracy == threshold` does not retrain.
    pub fn decide(&self, accuracy: f64) -> bool {
        accuracy < self.threshold
    }

    pub async fn evaluate(&self, domain: &str) -> Result<GateDecision> {
        let sample = self.tracker.sample(domain, self.window_days).await?;
        let needs_retraining = self.decide(sample.accuracy);
        obs::emit_gate_evaluated(domain, sample.accuracy, self.threshold, needs_retraining);
        Ok(GateDecision {
            sample,
            threshold: self.threshold,
            needs_retraining,
        })
    }

    pub async fn needs_retraining(&self, domain: &str) -> Result<bool> {
        Ok(self.evaluate(domain).await?.needs_retraining)
    }
}
