//! Binary logistic regression fitted by full-batch gradient descent.
//!
//! # Formula
//!
//! ```text
//! p(x)  = σ(w·x + b)
//! grad  = mean((p - y) · x) + λ·w      (bias is not penalised)
//! ```
//!
//! Fitting is deterministic: weights start at zero and the learning rate and
//! epoch count are fixed.

use serde::{Deserialize, Serialize};

use super::ShapeMismatch;
use crate::error::{CoreError, Result};

/// Hyper-parameters for [`LogisticRegression::fit`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TrainingParams {
    pub learning_rate: f64,
    pub epochs: usize,
    /// L2 penalty on the weights
    pub l2: f64,
}

impl Default for TrainingParams {
    fn default() -> Self {
        Self {
            learning_rate: 0.1,
            epochs: 500,
            l2: 1e-3,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogisticRegression {
    pub weights: Vec<f64>,
    pub bias: f64,
}

/// Numerically stable sigmoid.
pub fn sigmoid(z: f64) -> f64 {
    if z >= 0.0 {
        1.0 / (1.0 + (-z).exp())
    } else {
        let e = z.exp();
        e / (1.0 + e)
    }
}

impl LogisticRegression {
    /// Fit on already-normalised rows. `rows` and `labels` must be the same
    /// non-empty length with equal row widths.
    pub fn fit(rows: &[Vec<f64>], labels: &[bool], params: &TrainingParams) -> Result<Self> {
        let width = rows.first().map(Vec::len).unwrap_or(0);
        let n = rows.len() as f64;
        let mut model = Self {
            weights: vec![0.0; width],
            bias: 0.0,
        };

        let mut grad_w = vec![0.0; width];
        for _ in 0..params.epochs {
            grad_w.iter_mut().for_each(|g| *g = 0.0);
            let mut grad_b = 0.0;

            for (row, &label) in rows.iter().zip(labels) {
                let target = if label { 1.0 } else { 0.0 };
                let err = sigmoid(model.logit(row)) - target;
                for (g, x) in grad_w.iter_mut().zip(row) {
                    *g += err * x;
                }
                grad_b += err;
            }

            for (w, g) in model.weights.iter_mut().zip(&grad_w) {
                *w -= params.learning_rate * (g / n + params.l2 * *w);
            }
            model.bias -= params.learning_rate * grad_b / n;
        }

        if !model.bias.is_finite() || model.weights.iter().any(|w| !w.is_finite()) {
            return Err(CoreError::Training(
                "gradient descent diverged to non-finite weights".to_string(),
            ));
        }
        Ok(model)
    }

    fn logit(&self, row: &[f64]) -> f64 {
        self.weights
            .iter()
            .zip(row)
            .map(|(w, x)| w * x)
            .sum::<f64>()
            + self.bias
    }

    /// Probability of the positive ("Win") class for a normalised row.
    pub fn predict_proba(&self, row: &[f64]) -> std::result::Result<f64, ShapeMismatch> {
        if row.len() != self.weights.len() {
            return Err(ShapeMismatch {
                expected: self.weights.len(),
                actual: row.len(),
            });
        }
        Ok(sigmoid(self.logit(row)))
    }
}
