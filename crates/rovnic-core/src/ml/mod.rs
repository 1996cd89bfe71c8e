//! Model Trainer and Model Validator.
//!
//! The trainer owns the label/feature derivation policy
//! ([`TrainingSet::from_outcomes`]) and produces unpromoted
//! [`ModelArtifact`]s; the validator scores an artifact against a labelled
//! set. Neither touches any store.

pub mod classifier;
pub mod model;
pub mod normalizer;
pub mod trainer;
pub mod validator;

use rovnic_state::ModelArtifact;
use thiserror::Error;

use crate::error::Result;

pub use classifier::{LogisticRegression, TrainingParams};
pub use model::FittedModel;
pub use normalizer::StandardNormalizer;
pub use trainer::{LogisticTrainer, TrainingSet};
pub use validator::AccuracyValidator;

/// A feature row did not have the width the model was fitted on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("expected {expected} features, got {actual}")]
pub struct ShapeMismatch {
    pub expected: usize,
    pub actual: usize,
}

/// Fits a model on a labelled feature matrix.
pub trait Trainer: Send + Sync {
    /// Fails with `InsufficientData` when the inputs are empty or of unequal
    /// length, `Training` on numeric or shape failures.
    fn train(&self, domain: &str, features: &[Vec<f64>], labels: &[bool])
        -> Result<ModelArtifact>;
}

/// Scores an artifact against a labelled feature matrix.
pub trait Validator: Send + Sync {
    /// Fraction of rows classified correctly, in `[0, 1]`.
    fn validate(&self, artifact: &ModelArtifact, features: &[Vec<f64>], labels: &[bool])
        -> Result<f64>;
}
