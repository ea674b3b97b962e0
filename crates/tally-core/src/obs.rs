//! Structured observability hooks for evaluation lifecycle events.
//!
//! This module provides:
//! - Subject-scoped tracing spans via the `EvaluationSpan` RAII guard
//! - Emission functions for the events an evaluation goes through, including
//!   every recoverable condition that is reported instead of failing

use tracing::{info, warn};

use crate::domain::RaterKey;

/// RAII guard that enters a subject-scoped span for one evaluation.
///
/// ```ignore
/// let _span = EvaluationSpan::enter("pr-1234");
/// // all tracing calls now carry subject_id = "pr-1234"
/// ```
pub struct EvaluationSpan {
    _span: tracing::span::EnteredSpan,
}

impl EvaluationSpan {
    pub fn enter(subject_id: &str) -> Self {
        let span = tracing::info_span!("tally.evaluation", subject_id = %subject_id);
        Self {
            _span: span.entered(),
        }
    }
}

/// Emit event: evaluation started with the number of rater outputs received.
pub fn emit_evaluation_started(subject_id: &str, outputs: usize) {
    info!(event = "evaluation.started", subject_id = %subject_id, outputs = outputs);
}

/// Emit event: an unknown rater was weighted with an equal share.
pub fn emit_fallback_weight(rater: &RaterKey, dimension: &str, weight: f64) {
    warn!(
        event = "weights.fallback_equal_share",
        rater = %rater,
        dimension = %dimension,
        weight = weight,
        "unknown rater, using equal-share weight"
    );
}

/// Emit event: contributing weights summed to zero, unweighted mean used.
pub fn emit_consensus_fallback_mean(dimension: &str, round: u32, contributors: usize) {
    warn!(
        event = "consensus.unweighted_mean",
        dimension = %dimension,
        round = round,
        contributors = contributors,
        "zero total weight, falling back to unweighted mean"
    );
}

/// Emit event: how rounds were assigned for this evaluation.
pub fn emit_round_inference(source: &str, rounds: u32, partially_tagged: bool) {
    if partially_tagged {
        warn!(
            event = "rounds.partially_tagged",
            source = %source,
            rounds = rounds,
            "some outputs carry explicit rounds and some do not; inferring all by occurrence"
        );
    } else {
        info!(event = "rounds.assigned", source = %source, rounds = rounds);
    }
}

/// Emit event: a rater abstained on a dimension configured as non-nullable.
pub fn emit_abstention_on_required(rater: &RaterKey, dimension: &str, round: u32) {
    warn!(
        event = "consensus.required_abstention",
        rater = %rater,
        dimension = %dimension,
        round = round,
        "rater abstained on a required dimension"
    );
}

/// Emit event: a rater reported a dimension outside the configured set.
pub fn emit_unknown_dimension(rater: &RaterKey, dimension: &str) {
    warn!(
        event = "rater.unknown_dimension",
        rater = %rater,
        dimension = %dimension,
        "ignoring value for unconfigured dimension"
    );
}

/// Emit event: convergence scored for the final round.
pub fn emit_convergence_scored(reference_dimension: &str, raters: usize, score: f64) {
    info!(
        event = "convergence.scored",
        reference_dimension = %reference_dimension,
        raters = raters,
        score = score,
    );
}

/// Emit event: a history entry was appended for a subject.
pub fn emit_history_appended(subject_id: &str, evaluation_number: u32) {
    info!(
        event = "history.appended",
        subject_id = %subject_id,
        evaluation_number = evaluation_number,
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_evaluation_span_create() {
        let _span = EvaluationSpan::enter("test-subject");
        emit_evaluation_started("test-subject", 3);
        emit_round_inference("inferred", 2, true);
    }
}
