//! Service-wide counters owned by one running service instance.
//!
//! A single `ServiceStats` is created when the service is assembled and
//! shared as `Arc<ServiceStats>` with the components that count things.
//! [`ServiceStats::flush`] emits the values as one `tracing::info!` event at
//! the end of every cycle; [`ServiceStats::reset`] starts a fresh window.

use std::sync::atomic::{AtomicU64, Ordering};

use rovnic_state::AuditStatus;
use serde::{Deserialize, Serialize};

/// Confidence sums are kept in millionths so they fit an atomic integer.
const CONFIDENCE_SCALE: f64 = 1_000_000.0;

#[derive(Debug, Default)]
pub struct ServiceStats {
    predictions: AtomicU64,
    confidence_micros: AtomicU64,
    errors: AtomicU64,
    cycles: AtomicU64,
    retrains_completed: AtomicU64,
    retrains_failed: AtomicU64,
    retrains_skipped: AtomicU64,
}

/// Point-in-time copy of [`ServiceStats`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StatsSnapshot {
    pub predictions_total: u64,
    pub avg_confidence: f64,
    pub errors: u64,
    pub cycles: u64,
    pub retrains_completed: u64,
    pub retrains_failed: u64,
    pub retrains_skipped: u64,
}

impl ServiceStats {
    pub fn new() -> Self {
        Self::default()
    }

    /// Count one recorded prediction and fold its confidence into the mean.
    pub fn record_prediction(&self, confidence: f64) {
        let micros = (confidence.clamp(0.0, 1.0) * CONFIDENCE_SCALE).round() as u64;
        self.predictions.fetch_add(1, Ordering::Relaxed);
        self.confidence_micros.fetch_add(micros, Ordering::Relaxed);
    }

    pub fn record_error(&self) {
        self.errors.fetch_add(1, Ordering::Relaxed);
        tracing::trace!(metric = "errors", "counter incremented");
    }

    /// Count a finished cycle; returns its 1-based ordinal.
    pub fn record_cycle(&self) -> u64 {
        self.cycles.fetch_add(1, Ordering::Relaxed) + 1
    }

    pub fn record_retrain(&self, status: AuditStatus) {
        let counter = match status {
            AuditStatus::Completed => &self.retrains_completed,
            AuditStatus::Failed => &self.retrains_failed,
            AuditStatus::Skipped => &self.retrains_skipped,
            AuditStatus::Started => return,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        let predictions = self.predictions.load(Ordering::Relaxed);
        let micros = self.confidence_micros.load(Ordering::Relaxed);
        let avg_confidence = if predictions == 0 {
            0.0
        } else {
            micros as f64 / CONFIDENCE_SCALE / predictions as f64
        };
        StatsSnapshot {
            predictions_total: predictions,
            avg_confidence,
            errors: self.errors.load(Ordering::Relaxed),
            cycles: self.cycles.load(Ordering::Relaxed),
            retrains_completed: self.retrains_completed.load(Ordering::Relaxed),
            retrains_failed: self.retrains_failed.load(Ordering::Relaxed),
            retrains_skipped: self.retrains_skipped.load(Ordering::Relaxed),
        }
    }

    /// Emit all current values as a single `info!` event.
    pub fn flush(&self) {
        let s = self.snapshot();
        tracing::info!(
            metric = "flush",
            predictions_total = s.predictions_total,
            avg_confidence = s.avg_confidence,
            errors = s.errors,
            cycles = s.cycles,
            retrains_completed = s.retrains_completed,
            retrains_failed = s.retrains_failed,
            retrains_skipped = s.retrains_skipped,
        );
    }

    pub fn reset(&self) {
        for counter in [
            &self.predictions,
            &self.confidence_micros,
            &self.errors,
            &self.cycles,
            &self.retrains_completed,
            &self.retrains_failed,
            &self.retrains_skipped,
        ] {
            counter.store(0, Ordering::Relaxed);
        }
    }
}
