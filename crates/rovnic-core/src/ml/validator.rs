use rovnic_state::ModelArtifact;

use super::model::FittedModel;
use super::Validator;
use crate::error::{CoreError, Result};

/// Classification accuracy at the 0.5 decision boundary.
///
/// Accepts the training set itself (self-validation) as well as a holdout.
#[derive(Debug, Clone, Copy, Default)]
pub struct AccuracyValidator;

impl Validator for AccuracyValidator {
    fn validate(
        &self,
        artifact: &ModelArtifact,
        features: &[Vec<f64>],
        labels: &[bool],
    ) -> Result<f64> {
        if features.is_empty() {
            return Err(CoreError::Validation("validation set is empty".to_string()));
        }
        if features.len() != labels.len() {
            return Err(CoreError::Validation(format!(
                "{} feature rows but {} labels",
                features.len(),
                labels.len()
            )));
        }

        let model = FittedModel::from_artifact(artifact)
            .map_err(|e| CoreError::Validation(format!("artifact unusable: {e}")))?;

        let mut correct = 0usize;
        for (row, &label) in features.iter().zip(labels) {
            let p = model
                .win_probability(row)
                .map_err(|e| CoreError::Validation(e.to_string()))?;
            if !p.is_finite() {
                return Err(CoreError::Validation("non-finite probability".to_string()));
            }
            if (p > 0.5) == label {
                correct += 1;
            }
        }
        Ok(correct as f64 / labels.len() as f64)
    }
}
