//! Process-wide retraining configuration.

use std::collections::HashSet;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{CoreError, Result};

/// Domains processed when none are configured explicitly.
pub const DEFAULT_DOMAINS: [&str; 8] = [
    "nba", "nfl", "mlb", "nhl", "ncaaf", "ncaab", "soccer", "ufc",
];

/// Thresholds, windows and intervals shared by the tracker, gate,
/// orchestrator and scheduler.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct RetrainConfig {
    /// Retrain when rolling accuracy falls strictly below this (0.0–1.0).
    pub accuracy_threshold: f64,

    /// Trailing window for the rolling accuracy, in days.
    pub rolling_window_days: u32,

    /// Resolved outcomes required before a retrain is attempted.
    pub min_predictions_for_retrain: usize,

    /// Hours between scheduler cycles.
    pub cycle_interval_hours: u64,

    /// Fixed set of domains swept by every cycle.
    pub domains: Vec<String>,

    /// Upper bound on outcome records fetched per query.
    pub outcome_query_limit: usize,

    /// Timeout applied to every store and provider call.
    pub request_timeout_secs: u64,

    /// Fraction of the derived set held out for validation; 0 validates on
    /// the training set itself.
    pub validation_holdout: f64,

    /// Validated models scoring below this are not promoted.
    pub min_validation_accuracy: f64,
}

impl Default for RetrainConfig {
    fn default() -> Self {
        Self {
            accuracy_threshold: 0.80,
            rolling_window_days: 7,
            min_predictions_for_retrain: 10,
            cycle_interval_hours: 4,
            domains: DEFAULT_DOMAINS.iter().map(|d| d.to_string()).collect(),
            outcome_query_limit: 100,
            request_timeout_secs: 10,
            validation_holdout: 0.0,
            min_validation_accuracy: 0.0,
        }
    }
}

impl RetrainConfig {
    /// Check every option; any violation is a `Configuration` error.
    pub fn validate(&self) -> Result<()> {
        if !(0.0..=1.0).contains(&self.accuracy_threshold) {
            return Err(CoreError::Configuration(format!(
                "accuracy_threshold {} outside [0, 1]",
                self.accuracy_threshold
            )));
        }
        if self.rolling_window_days == 0 {
            return Err(CoreError::Configuration(
                "rolling_window_days must be at least 1".to_string(),
            ));
        }
        if self.cycle_interval_hours == 0 {
            return Err(CoreError::Configuration(
                "cycle_interval_hours must be at least 1".to_string(),
            ));
        }
        if self.request_timeout_secs == 0 {
            return Err(CoreError::Configuration(
                "request_timeout_secs must be at least 1".to_string(),
            ));
        }
        if self.outcome_query_limit == 0 {
            return Err(CoreError::Configuration(
                "outcome_query_limit must be at least 1".to_string(),
            ));
        }
        if self.domains.is_empty() {
            return Err(CoreError::Configuration("no domains configured".to_string()));
        }
        let mut seen = HashSet::new();
        for domain in &self.domains {
            if domain.trim().is_empty() {
                return Err(CoreError::Configuration("empty domain name".to_string()));
            }
            if !seen.insert(domain.as_str()) {
                return Err(CoreError::Configuration(format!(
                    "domain '{domain}' listed twice"
                )));
            }
        }
        if !(0.0..1.0).contains(&self.validation_holdout) {
            return Err(CoreError::Configuration(format!(
                "validation_holdout {} outside [0, 1)",
                self.validation_holdout
            )));
        }
        if !(0.0..=1.0).contains(&self.min_validation_accuracy) {
            return Err(CoreError::Configuration(format!(
                "min_validation_accuracy {} outside [0, 1]",
                self.min_validation_accuracy
            )));
        }
        Ok(())
    }

    pub fn with_domains<I, S>(mut self, domains: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.domains = domains.into_iter().map(Into::into).collect();
        self
    }

    pub fn knows_domain(&self, domain: &str) -> bool {
        self.domains.iter().any(|d| d == domain)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn cycle_interval(&self) -> Duration {
        Duration::from_secs(self.cycle_interval_hours * 3600)
    }
}
