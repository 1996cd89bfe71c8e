//! Prediction generation: the first half of every domain's cycle step.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use rovnic_state::{ArtifactRegistry, ModelArtifact, OutcomeRecord, OutcomeStore};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::error::{call_store, CoreError, Result};
use crate::features::FeatureExtractor;
use crate::ml::trainer::{LOSS_LABEL, WIN_LABEL};
use crate::ml::FittedModel;
use crate::odds::GameContextSource;
use crate::stats::ServiceStats;

/// Model output for one feature vector.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Prediction {
    /// "Win" when `win_probability > 0.5`, else "Loss"
    pub label: String,
    /// Equal to `win_probability`
    pub confidence: f64,
    pub win_probability: f64,
    pub lose_probability: f64,
}

/// Scores feature vectors with one loaded artifact.
#[derive(Debug, Clone)]
pub struct ModelPredictor {
    model: FittedModel,
    version: String,
}

impl ModelPredictor {
    pub fn from_artifact(artifact: &ModelArtifact) -> Result<Self> {
        Ok(Self {
            model: FittedModel::from_artifact(artifact)?,
            version: artifact.version.clone(),
        })
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    pub fn width(&self) -> usize {
        self.model.width()
    }

    pub fn predict(&self, features: &[f64]) -> Result<Prediction> {
        let p = self
            .model
            .win_probability(features)
            .map_err(|e| CoreError::Validation(e.to_string()))?;
        let label = if p > 0.5 { WIN_LABEL } else { LOSS_LABEL };
        Ok(Prediction {
            label: label.to_string(),
            confidence: p,
            win_probability: p,
            lose_probability: 1.0 - p,
        })
    }
}

/// What the prediction step did for a domain.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum PredictionOutcome {
    Recorded { count: usize, mean_confidence: f64 },
    /// The provider had no upcoming games.
    NoGames,
    /// No artifact has been promoted for the domain yet.
    NoActiveModel,
    /// The active artifact was fitted on rows of another width than the
    /// extractor produces (e.g. confidence-only history). Nothing is recorded
    /// until a model of the extractor's width is promoted.
    IncompatibleModel {
        model_width: usize,
        feature_width: usize,
    },
    /// No prediction step is configured (e.g. missing odds API key).
    Disabled,
}

/// Generates and records predictions for one domain.
#[async_trait]
pub trait PredictionStep: Send + Sync {
    async fn run(&self, domain: &str) -> Result<PredictionOutcome>;
}

/// Fetch games → load active artifact → extract → predict → record.
///
/// Each prediction is appended as an unresolved `OutcomeRecord` carrying the
/// feature vector it was made from. Games whose features cannot be extracted
/// are skipped with a warning.
pub struct ModelPredictionStep {
    games: Arc<dyn GameContextSource>,
    extractor: Arc<dyn FeatureExtractor>,
    registry: Arc<dyn ArtifactRegistry>,
    outcomes: Arc<dyn OutcomeStore>,
    stats: Arc<ServiceStats>,
    timeout: Duration,
}

impl ModelPredictionStep {
    pub fn new(
        games: Arc<dyn GameContextSource>,
        extractor: Arc<dyn FeatureExtractor>,
        registry: Arc<dyn ArtifactRegistry>,
        outcomes: Arc<dyn OutcomeStore>,
        stats: Arc<ServiceStats>,
        timeout: Duration,
    ) -> Self {
        Self {
            games,
            extractor,
            registry,
            outcomes,
            stats,
            timeout,
        }
    }
}

#[async_trait]
impl PredictionStep for ModelPredictionStep {
    async fn run(&self, domain: &str) -> Result<PredictionOutcome> {
        let games = tokio::time::timeout(self.timeout, self.games.fetch(domain))
            .await
            .map_err(|_| CoreError::unavailable("odds api", "timed out"))??;
        if games.is_empty() {
            debug!(domain, "No upcoming games");
            return Ok(PredictionOutcome::NoGames);
        }

        let Some(artifact) =
            call_store("artifact registry", self.timeout, self.registry.current(domain)).await?
        else {
            return Ok(PredictionOutcome::NoActiveModel);
        };
        let predictor = ModelPredictor::from_artifact(&artifact)?;
        let feature_width = self.extractor.width();
        if predictor.width() != feature_width {
            warn!(
                domain,
                model_version = %predictor.version(),
                model_width = predictor.width(),
                feature_width,
                "Active model does not match extracted features"
            );
            return Ok(PredictionOutcome::IncompatibleModel {
                model_width: predictor.width(),
                feature_width,
            });
        }

        let mut count = 0usize;
        let mut confidence_sum = 0.0;
        for game in &games {
            let features = match self.extractor.extract(domain, game) {
                Ok(features) => features,
                Err(e) => {
                    warn!(domain, game = %game.id, error = %e, "Skipping game");
                    continue;
                }
            };
            let prediction = predictor.predict(&features)?;
            let record = OutcomeRecord::new(
                domain,
                prediction.label.clone(),
                prediction.confidence,
                None,
            )
            .with_features(features);
            call_store("outcome store", self.timeout, self.outcomes.append(record)).await?;

            self.stats.record_prediction(prediction.confidence);
            confidence_sum += prediction.confidence;
            count += 1;
            debug!(
                domain,
                matchup = %game.matchup(),
                label = %prediction.label,
                confidence = prediction.confidence,
                "Prediction recorded"
            );
        }

        if count == 0 {
            return Err(CoreError::FeatureExtraction(format!(
                "none of {} {domain} games yielded features",
                games.len()
            )));
        }
        let mean_confidence = confidence_sum / count as f64;
        info!(
            domain,
            count,
            mean_confidence,
            model_version = %predictor.version(),
            "Predictions recorded"
        );
        Ok(PredictionOutcome::Recorded {
            count,
            mean_confidence,
        })
    }
}
