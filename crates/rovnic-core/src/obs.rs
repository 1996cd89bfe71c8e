//! Structured observability hooks for the retraining cycle.
//!
//! This module provides:
//! - Cycle- and domain-scoped spans via [`cycle_span`] and [`domain_span`],
//!   attached to futures with `tracing::Instrument`
//! - Emission functions for key events: cycle start/finish, accuracy,
//!   gate verdict, retrain result, promotion and domain failure
//!
//! Events are emitted at `info!` level, failures at `warn!`. Filter with
//! `RUST_LOG`; JSON output is selected by the binary.

use tracing::{info, warn, Span};

/// Span covering one scheduler sweep.
///
/// # Example
///
/// ```ignore
/// scheduler.sweep().instrument(cycle_span(3)).await;
/// // every event inside is tagged with cycle = 3
/// ```
pub fn cycle_span(cycle: u64) -> Span {
    tracing::info_span!("rovnic.cycle", cycle = cycle)
}

/// Span covering one domain's step within the current cycle.
pub fn domain_span(domain: &str) -> Span {
    tracing::info_span!("rovnic.domain", domain = %domain)
}

/// Emit event: cycle started over `total_domains` domains.
pub fn emit_cycle_started(cycle: u64, total_domains: usize) {
    info!(event = "cycle.started", cycle = cycle, total_domains = total_domains);
}

/// Emit event: cycle finished with its summary counts.
pub fn emit_cycle_finished(cycle: u64, duration_ms: u64, successful: usize, failed: usize) {
    info!(
        event = "cycle.finished",
        cycle = cycle,
        duration_ms = duration_ms,
        successful = successful,
        failed = failed,
    );
}

/// Emit event: one step of a domain failed; the cycle carries on.
pub fn emit_domain_failed(domain: &str, step: &str, error: &dyn std::fmt::Display) {
    warn!(event = "domain.failed", domain = %domain, step = %step, error = %error);
}

pub fn emit_accuracy_computed(domain: &str, accuracy: f64, sample_count: usize) {
    info!(
        event = "accuracy.computed",
        domain = %domain,
        accuracy = accuracy,
        sample_count = sample_count,
    );
}

pub fn emit_gate_evaluated(domain: &str, accuracy: f64, threshold: f64, needs_retraining: bool) {
    info!(
        event = "gate.evaluated",
        domain = %domain,
        accuracy = accuracy,
        threshold = threshold,
        needs_retraining = needs_retraining,
    );
}

/// Emit event: an orchestration attempt reached a terminal status.
pub fn emit_retrain_finished(domain: &str, status: &str, reason: Option<&str>) {
    info!(
        event = "retrain.finished",
        domain = %domain,
        status = %status,
        reason = reason.unwrap_or(""),
    );
}

pub fn emit_artifact_promoted(domain: &str, version: &str, revision: u64, validation_accuracy: f64) {
    info!(
        event = "artifact.promoted",
        domain = %domain,
        version = %version,
        revision = revision,
        validation_accuracy = validation_accuracy,
    );
}
