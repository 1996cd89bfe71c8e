//! Training set derivation and the logistic-regression trainer.
//!
//! # Label policy
//!
//! Only outcomes with known correctness are used. The binary target is `1`
//! when the "Win" outcome actually happened:
//!
//! | predicted label | correct | target |
//! |-----------------|---------|--------|
//! | Win             | true    | 1      |
//! | Win             | false   | 0      |
//! | Loss (any other)| true    | 0      |
//! | Loss (any other)| false   | 1      |
//!
//! The label comparison is case-insensitive. The feature row is the captured
//! feature vector, or `[confidence]` when the record carries none.
//!
//! # Row width
//!
//! All rows of a set share one width. When any resolved record carries
//! captured features, the newest such record fixes the width and every row
//! of another width (confidence-only rows included) is dropped. Otherwise
//! the set is the confidence-only rows.

use rovnic_state::{ModelArtifact, OutcomeRecord};
use tracing::debug;

use super::classifier::{LogisticRegression, TrainingParams};
use super::model::FittedModel;
use super::normalizer::StandardNormalizer;
use super::Trainer;
use crate::error::{CoreError, Result};

pub const WIN_LABEL: &str = "Win";
pub const LOSS_LABEL: &str = "Loss";

/// Feature matrix and binary labels derived from outcome records.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TrainingSet {
    pub features: Vec<Vec<f64>>,
    pub labels: Vec<bool>,
}

impl TrainingSet {
    /// Apply the label policy to every resolved record, preserving order.
    pub fn from_outcomes(records: &[OutcomeRecord]) -> Self {
        let width = records
            .iter()
            .find(|r| r.is_resolved() && !r.features.is_empty())
            .map_or(1, |r| r.features.len());

        let mut set = Self::default();
        let mut dropped = 0usize;
        for record in records {
            let Some(correct) = record.actual_correct else {
                continue;
            };
            let row = if record.features.is_empty() {
                vec![record.confidence]
            } else {
                record.features.clone()
            };
            if row.len() != width {
                dropped += 1;
                continue;
            }
            let predicted_win = record.predicted_label.eq_ignore_ascii_case(WIN_LABEL);
            set.features.push(row);
            set.labels.push(predicted_win == correct);
        }
        if dropped > 0 {
            debug!(width, dropped, kept = set.len(), "Dropped rows of another width");
        }
        set
    }

    /// Number of features per row, or `None` for an empty set.
    pub fn width(&self) -> Option<usize> {
        self.features.first().map(Vec::len)
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    /// Split off the leading `fraction` of rows as a holdout set.
    ///
    /// Records arrive newest first, so the holdout is the most recent slice.
    /// At least one row always stays in the training half; a fraction that
    /// rounds to zero rows returns an empty holdout.
    pub fn split_holdout(self, fraction: f64) -> (TrainingSet, TrainingSet) {
        let n = self.len();
        let held = ((n as f64) * fraction).floor() as usize;
        let held = held.min(n.saturating_sub(1));
        if held == 0 {
            return (self, TrainingSet::default());
        }

        let mut features = self.features;
        let mut labels = self.labels;
        let train = TrainingSet {
            features: features.split_off(held),
            labels: labels.split_off(held),
        };
        (train, TrainingSet { features, labels })
    }
}

/// Fits a [`StandardNormalizer`] then a [`LogisticRegression`] behind it.
#[derive(Debug, Clone, Default)]
pub struct LogisticTrainer {
    params: TrainingParams,
}

impl LogisticTrainer {
    pub fn new(params: TrainingParams) -> Self {
        Self { params }
    }
}

impl Trainer for LogisticTrainer {
    fn train(
        &self,
        domain: &str,
        features: &[Vec<f64>],
        labels: &[bool],
    ) -> Result<ModelArtifact> {
        if features.is_empty() || labels.is_empty() {
            return Err(CoreError::InsufficientData {
                needed: 1,
                available: 0,
            });
        }
        if features.len() != labels.len() {
            return Err(CoreError::InsufficientData {
                needed: features.len(),
                available: labels.len(),
            });
        }

        let width = features[0].len();
        if width == 0 {
            return Err(CoreError::Training("feature rows are empty".to_string()));
        }
        if let Some((i, row)) = features.iter().enumerate().find(|(_, r)| r.len() != width) {
            return Err(CoreError::Training(format!(
                "row {i} has {} features, expected {width}",
                row.len()
            )));
        }
        if features.iter().flatten().any(|v| !v.is_finite()) {
            return Err(CoreError::Training(
                "feature matrix contains non-finite values".to_string(),
            ));
        }

        let normalizer = StandardNormalizer::fit(features);
        let normalized = features
            .iter()
            .map(|row| normalizer.transform(row))
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(|e| CoreError::Training(e.to_string()))?;
        let classifier = LogisticRegression::fit(&normalized, labels, &self.params)?;
        debug!(domain, samples = labels.len(), width, "Model fitted");

        FittedModel {
            classifier,
            normalizer,
        }
        .into_artifact(domain, labels.len())
    }
}
