//! Loading and packaging fitted models as `ModelArtifact` blob pairs.

use rovnic_state::ModelArtifact;

use super::classifier::LogisticRegression;
use super::normalizer::StandardNormalizer;
use super::ShapeMismatch;
use crate::error::Result;

/// A classifier together with the normaliser it was fitted behind.
///
/// `weights_blob` holds the JSON-serialised [`LogisticRegression`] and
/// `normalizer_blob` the JSON-serialised [`StandardNormalizer`].
#[derive(Debug, Clone, PartialEq)]
pub struct FittedModel {
    pub classifier: LogisticRegression,
    pub normalizer: StandardNormalizer,
}

impl FittedModel {
    /// Decode an artifact after checking both blobs are present and intact.
    pub fn from_artifact(artifact: &ModelArtifact) -> Result<Self> {
        artifact.verify()?;
        Ok(Self {
            classifier: serde_json::from_slice(&artifact.weights_blob)?,
            normalizer: serde_json::from_slice(&artifact.normalizer_blob)?,
        })
    }

    /// Serialise both halves into an unpromoted artifact.
    pub fn into_artifact(&self, domain: &str, sample_count: usize) -> Result<ModelArtifact> {
        let weights = serde_json::to_vec(&self.classifier)?;
        let normalizer = serde_json::to_vec(&self.normalizer)?;
        Ok(ModelArtifact::new(domain, weights, normalizer, sample_count))
    }

    /// Number of raw features the model expects.
    pub fn width(&self) -> usize {
        self.normalizer.width()
    }

    /// Probability of "Win" for a raw (un-normalised) feature row.
    pub fn win_probability(&self, row: &[f64]) -> std::result::Result<f64, ShapeMismatch> {
        let normalized = self.normalizer.transform(row)?;
        self.classifier.predict_proba(&normalized)
    }
}
