//! One subject's evaluation: rater outputs in, consensus and history out.
//!
//! ```text
//! outputs ─► canonicalize ─► rounds ─► consensus per round ─► evolution
//!                                  └─► final round ─► convergence
//! latest consensus ─► derived values ─► history snapshot ─► ledger
//! ```

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::instrument;

use tally_ledger::{EvaluationSnapshot, HistoryEntry, HistoryLedger, TokenSnapshot};

use crate::config::TallyConfig;
use crate::consensus::{ConsensusEntry, ConsensusMethod};
use crate::convergence::{convergence_score, ConvergenceConfig};
use crate::derived::{compose_all, DerivedMetric, DerivedValue};
use crate::domain::{DimensionSet, RaterKey, RaterOutput, Result};
use crate::evolution::{
    assign_rounds, evolve_rounds, group_by_round, EvolutionReport, RoundSource,
    DEFAULT_CHANGE_THRESHOLD,
};
use crate::metrics::METRICS;
use crate::obs::{self, EvaluationSpan};
use crate::weights::WeightRegistry;

/// Everything collected for one subject.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationInput {
    pub subject_id: String,
    /// Label of what produced the evaluation (e.g. "commit").
    #[serde(default)]
    pub source: String,
    /// Rater outputs in the order they were produced.
    pub outputs: Vec<RaterOutput>,
    /// Overrides the token totals summed from `outputs[].usage`.
    #[serde(default)]
    pub tokens: Option<TokenSnapshot>,
}

impl EvaluationInput {
    pub fn new(
        subject_id: impl Into<String>,
        source: impl Into<String>,
        outputs: Vec<RaterOutput>,
    ) -> Self {
        Self {
            subject_id: subject_id.into(),
            source: source.into(),
            outputs,
            tokens: None,
        }
    }

    pub fn with_tokens(mut self, tokens: TokenSnapshot) -> Self {
        self.tokens = Some(tokens);
        self
    }
}

/// Result of evaluating one subject. Plain data, no formatting.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationOutcome {
    pub subject_id: String,
    pub round_source: RoundSource,
    pub round_count: u32,
    /// Distinct raters across all rounds.
    pub rater_count: usize,
    /// Consensus per dimension at the latest round.
    pub latest: BTreeMap<String, ConsensusEntry>,
    pub evolution: EvolutionReport,
    pub convergence_score: f64,
    pub derived: Vec<DerivedValue>,
    pub tokens: TokenSnapshot,
}

impl EvaluationOutcome {
    /// Latest consensus value per dimension.
    pub fn consensus_values(&self) -> BTreeMap<String, Option<f64>> {
        self.latest
            .iter()
            .map(|(name, entry)| (name.clone(), entry.value))
            .collect()
    }

    pub fn value(&self, dimension: &str) -> Option<f64> {
        self.latest.get(dimension).and_then(|e| e.value)
    }

    pub fn derived_value(&self, name: &str) -> Option<&DerivedValue> {
        self.derived.iter().find(|d| d.name == name)
    }

    /// History snapshot of this outcome.
    pub fn to_snapshot(&self, source: &str, recorded_at: DateTime<Utc>) -> EvaluationSnapshot {
        EvaluationSnapshot {
            source: source.to_string(),
            consensus: self.consensus_values(),
            tokens: self.tokens,
            convergence_score: self.convergence_score,
            rounds: self.round_count,
            rater_count: self.rater_count,
            recorded_at,
        }
    }
}

/// An outcome together with the history entry it produced.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedEvaluation {
    pub outcome: EvaluationOutcome,
    pub entry: HistoryEntry,
}

/// Evaluation pipeline bound to one rubric, panel and set of thresholds.
#[derive(Debug, Clone)]
pub struct Evaluator {
    registry: WeightRegistry,
    dimensions: DimensionSet,
    derived: Vec<DerivedMetric>,
    convergence: ConvergenceConfig,
    change_threshold: f64,
}

impl Default for Evaluator {
    fn default() -> Self {
        Self {
            registry: WeightRegistry::code_change(),
            dimensions: DimensionSet::code_change(),
            derived: vec![DerivedMetric::net_debt()],
            convergence: ConvergenceConfig::default(),
            change_threshold: DEFAULT_CHANGE_THRESHOLD,
        }
    }
}

impl Evaluator {
    /// Evaluator over a custom rubric and panel, with no derived metrics.
    pub fn new(registry: WeightRegistry, dimensions: DimensionSet) -> Self {
        Self {
            registry,
            dimensions,
            derived: Vec::new(),
            convergence: ConvergenceConfig::default(),
            change_threshold: DEFAULT_CHANGE_THRESHOLD,
        }
    }

    pub fn from_config(config: &TallyConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            registry: config.weight_registry()?,
            dimensions: config.dimension_set(),
            derived: config.derived_metrics(),
            convergence: config.convergence.clone(),
            change_threshold: config.change_threshold,
        })
    }

    pub fn with_convergence(mut self, convergence: ConvergenceConfig) -> Self {
        self.convergence = convergence;
        self
    }

    pub fn with_derived(mut self, derived: Vec<DerivedMetric>) -> Self {
        self.derived = derived;
        self
    }

    pub fn with_change_threshold(mut self, threshold: f64) -> Self {
        self.change_threshold = threshold;
        self
    }

    pub fn registry(&self) -> &WeightRegistry {
        &self.registry
    }

    pub fn dimensions(&self) -> &DimensionSet {
        &self.dimensions
    }

    /// Map every rater to its canonical key and drop unconfigured dimensions.
    pub fn canonicalize_outputs(&self, outputs: &[RaterOutput]) -> Vec<RaterOutput> {
        outputs
            .iter()
            .map(|output| {
                let mut output = output.clone();
                output.rater = self.registry.canonicalize(output.rater.as_str());
                let rater = output.rater.clone();
                output.values.retain(|dimension, _| {
                    let known = self.dimensions.contains(dimension);
                    if !known {
                        obs::emit_unknown_dimension(&rater, dimension);
                    }
                    known
                });
                output
            })
            .collect()
    }

    /// Reduce rater outputs into consensus, evolution, convergence and derived values.
    pub fn evaluate(&self, input: &EvaluationInput) -> EvaluationOutcome {
        let _span = EvaluationSpan::enter(&input.subject_id);
        obs::emit_evaluation_started(&input.subject_id, input.outputs.len());

        let outputs = self.canonicalize_outputs(&input.outputs);
        let assignment = assign_rounds(&outputs);
        let by_round = group_by_round(&outputs, &assignment);
        let evolution = evolve_rounds(
            &self.registry,
            &self.dimensions,
            &assignment,
            &by_round,
            self.change_threshold,
        );

        let latest: BTreeMap<String, ConsensusEntry> = self
            .dimensions
            .names()
            .map(|name| {
                let entry = evolution
                    .series(name)
                    .and_then(|s| s.latest())
                    .cloned()
                    .unwrap_or_else(|| empty_entry(name));
                (name.to_string(), entry)
            })
            .collect();

        let raters: BTreeSet<&RaterKey> = outputs.iter().map(|o| &o.rater).collect();
        let final_round = by_round.values().next_back().cloned().unwrap_or_default();
        let convergence = convergence_score(&final_round, &self.convergence, raters.len());

        let consensus_values: BTreeMap<String, Option<f64>> = latest
            .iter()
            .map(|(name, entry)| (name.clone(), entry.value))
            .collect();
        let derived = compose_all(&self.derived, &consensus_values);

        let tokens = input.tokens.unwrap_or_else(|| {
            outputs
                .iter()
                .filter_map(|o| o.usage)
                .fold(TokenSnapshot::default(), TokenSnapshot::combine)
        });

        METRICS.inc_evaluations();

        EvaluationOutcome {
            subject_id: input.subject_id.clone(),
            round_source: evolution.source,
            round_count: evolution.round_count,
            rater_count: raters.len(),
            latest,
            evolution,
            convergence_score: convergence,
            derived,
            tokens,
        }
    }

    /// Evaluate and append the result to the subject's history.
    ///
    /// The only error is a failed history write; the outcome is lost with it,
    /// so callers can retry the whole evaluation.
    #[instrument(skip(self, ledger, input), fields(subject_id = %input.subject_id))]
    pub async fn evaluate_and_record(
        &self,
        ledger: &HistoryLedger,
        input: &EvaluationInput,
    ) -> Result<RecordedEvaluation> {
        let outcome = self.evaluate(input);
        let snapshot = outcome.to_snapshot(&input.source, Utc::now());
        let entry = ledger.append(&input.subject_id, snapshot).await?;

        METRICS.inc_history_appends();
        obs::emit_history_appended(&input.subject_id, entry.evaluation_number);
        Ok(RecordedEvaluation { outcome, entry })
    }
}

fn empty_entry(dimension: &str) -> ConsensusEntry {
    ConsensusEntry {
        dimension: dimension.to_string(),
        round: 0,
        value: None,
        method: ConsensusMethod::NoContributors,
        contributors: Vec::new(),
        abstained: Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::dimension::{CODE_QUALITY, DEBT_REDUCTION_HOURS, TECHNICAL_DEBT_HOURS};

    fn panel_round(quality: [f64; 5]) -> Vec<RaterOutput> {
        let names = [
            "Business Analyst",
            "Developer Author",
            "Developer Reviewer",
            "Senior Architect",
            "SDET",
        ];
        names
            .iter()
            .zip(quality)
            .map(|(name, q)| RaterOutput::new(*name).with_value(CODE_QUALITY, q))
            .collect()
    }

    #[test]
    fn display_names_are_canonicalized_before_weighting() {
        let evaluator = Evaluator::default();
        let input = EvaluationInput::new("pr-1", "pull-request", panel_round([7.0; 5]));
        let outcome = evaluator.evaluate(&input);

        let entry = &outcome.latest[CODE_QUALITY];
        assert!(!entry.used_fallback_weight());
        assert_eq!(outcome.rater_count, 5);
        assert!((outcome.value(CODE_QUALITY).unwrap() - 7.0).abs() < 1e-9);
        assert_eq!(outcome.convergence_score, 1.0);
    }

    #[test]
    fn latest_round_drives_consensus_and_convergence() {
        let mut outputs = panel_round([2.0, 9.0, 5.0, 7.0, 4.0]);
        outputs.extend(panel_round([6.0; 5]));
        let outcome = Evaluator::default().evaluate(&EvaluationInput::new("pr-2", "commit", outputs));

        assert_eq!(outcome.round_count, 2);
        assert_eq!(outcome.round_source, RoundSource::Inferred);
        assert!((outcome.value(CODE_QUALITY).unwrap() - 6.0).abs() < 1e-9);
        assert_eq!(outcome.convergence_score, 1.0);
        assert!(outcome.evolution.series(CODE_QUALITY).unwrap().changed);
    }

    #[test]
    fn unconfigured_dimensions_are_dropped() {
        let outputs = vec![RaterOutput::new("sdet")
            .with_value(CODE_QUALITY, 5.0)
            .with_value("velocity", 9.0)];
        let evaluator = Evaluator::default();
        let canonical = evaluator.canonicalize_outputs(&outputs);
        assert!(!canonical[0].values.contains_key("velocity"));
        assert!(!evaluator
            .evaluate(&EvaluationInput::new("s", "commit", outputs))
            .latest
            .contains_key("velocity"));
    }

    #[test]
    fn every_dimension_present_even_without_outputs() {
        let outcome = Evaluator::default().evaluate(&EvaluationInput::new("empty", "commit", vec![]));
        assert_eq!(outcome.latest.len(), 8);
        assert!(outcome.latest.values().all(|e| e.value.is_none()));
        assert_eq!(outcome.convergence_score, 0.0);
        assert_eq!(outcome.round_count, 0);
        let net = outcome.derived_value("net_debt_hours").unwrap();
        assert_eq!(net.value, 0.0);
        assert!(net.imputed_zero);
    }

    #[test]
    fn derived_net_debt_uses_consensus_values() {
        let outputs = vec![
            RaterOutput::new("senior-architect")
                .with_value(TECHNICAL_DEBT_HOURS, 4.0)
                .with_value(DEBT_REDUCTION_HOURS, 1.0),
            RaterOutput::new("developer-reviewer")
                .with_value(TECHNICAL_DEBT_HOURS, 2.0)
                .abstain(DEBT_REDUCTION_HOURS),
        ];
        let outcome = Evaluator::default().evaluate(&EvaluationInput::new("s", "commit", outputs));

        // debt: (4*0.5 + 2*0.2) / 0.7; reduction: architect alone.
        let debt = (4.0 * 0.5 + 2.0 * 0.2) / 0.7;
        let net = outcome.derived_value("net_debt_hours").unwrap();
        assert!((net.value - (debt - 1.0)).abs() < 1e-9);
        assert!(!net.imputed_zero);
    }

    #[test]
    fn token_usage_is_summed_unless_overridden() {
        let outputs = vec![
            RaterOutput::new("sdet").with_usage(TokenSnapshot::new(100, 10, 0.1)),
            RaterOutput::new("ba").with_usage(TokenSnapshot::new(50, 5, 0.05)),
        ];
        let input = EvaluationInput::new("s", "commit", outputs);
        let outcome = Evaluator::default().evaluate(&input);
        assert_eq!(outcome.tokens.total_tokens(), 165);

        let overridden = input.with_tokens(TokenSnapshot::new(1, 1, 0.0));
        assert_eq!(Evaluator::default().evaluate(&overridden).tokens.total_tokens(), 2);
    }

    #[test]
    fn snapshot_carries_outcome_fields() {
        let outcome = Evaluator::default()
            .evaluate(&EvaluationInput::new("s", "commit", panel_round([8.0; 5])));
        let snapshot = outcome.to_snapshot("commit", Utc::now());
        assert_eq!(snapshot.rounds, 1);
        assert_eq!(snapshot.rater_count, 5);
        assert_eq!(snapshot.consensus.len(), 8);
        assert_eq!(snapshot.convergence_score, outcome.convergence_score);
    }
}
