//! Round assignment and per-dimension evolution across rounds.
//!
//! Rounds come from one of two places:
//!
//! - **Explicit**: every output carries `round`. Taken verbatim.
//! - **Inferred**: the n-th output of a given rater in the flat sequence is
//!   assigned round n. This assumes every rater speaks once per round and
//!   none is skipped; if a rater misses a round, its later outputs land one
//!   round early. It is kept only for producers that cannot tag rounds.

use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};

use crate::consensus::{weighted_consensus, ConsensusEntry};
use crate::domain::{DimensionSet, RaterKey, RaterOutput};
use crate::metrics::METRICS;
use crate::obs;
use crate::weights::WeightRegistry;

/// Default absolute difference for a series to count as changed.
pub const DEFAULT_CHANGE_THRESHOLD: f64 = 0.01;

/// Where round numbers came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RoundSource {
    Explicit,
    Inferred,
}

impl RoundSource {
    pub fn as_str(self) -> &'static str {
        match self {
            RoundSource::Explicit => "explicit",
            RoundSource::Inferred => "inferred",
        }
    }
}

/// Round number per output, parallel to the input sequence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoundAssignment {
    pub rounds: Vec<u32>,
    pub source: RoundSource,
    /// Some, but not all, outputs carried an explicit round.
    pub partially_tagged: bool,
}

impl RoundAssignment {
    pub fn round_count(&self) -> u32 {
        self.rounds.iter().copied().max().unwrap_or(0)
    }
}

/// Assign round n to the n-th occurrence of each rater.
pub fn infer_rounds_by_occurrence(outputs: &[RaterOutput]) -> Vec<u32> {
    let mut seen: HashMap<&RaterKey, u32> = HashMap::new();
    outputs
        .iter()
        .map(|output| {
            let count = seen.entry(&output.rater).or_insert(0);
            *count += 1;
            *count
        })
        .collect()
}

/// Use explicit rounds when every output has a valid one, otherwise infer all.
pub fn assign_rounds(outputs: &[RaterOutput]) -> RoundAssignment {
    let explicit: Vec<Option<u32>> = outputs
        .iter()
        .map(|o| o.round.filter(|&r| r >= 1))
        .collect();
    let tagged = explicit.iter().filter(|r| r.is_some()).count();

    if !outputs.is_empty() && tagged == outputs.len() {
        return RoundAssignment {
            rounds: explicit.into_iter().flatten().collect(),
            source: RoundSource::Explicit,
            partially_tagged: false,
        };
    }

    RoundAssignment {
        rounds: infer_rounds_by_occurrence(outputs),
        source: RoundSource::Inferred,
        partially_tagged: tagged > 0,
    }
}

/// Group outputs by assigned round.
///
/// If a rater appears twice in the same round (possible only with explicit
/// tags), its later output replaces the earlier one.
pub fn group_by_round<'a>(
    outputs: &'a [RaterOutput],
    assignment: &RoundAssignment,
) -> RoundGroups<'a> {
    let mut rounds: RoundGroups<'a> = BTreeMap::new();
    for (output, &round) in outputs.iter().zip(&assignment.rounds) {
        let slot = rounds.entry(round).or_default();
        match slot.iter().position(|o| o.rater == output.rater) {
            Some(idx) => {
                tracing::warn!(
                    rater = %output.rater,
                    round,
                    "rater reported twice in one round, keeping the later output"
                );
                slot[idx] = output;
            }
            None => slot.push(output),
        }
    }
    rounds
}

/// Consensus of one dimension at every round.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricEvolutionSeries {
    pub dimension: String,
    pub rounds: BTreeMap<u32, ConsensusEntry>,
    /// Latest round differs from the first by more than the change threshold.
    pub changed: bool,
}

impl MetricEvolutionSeries {
    fn new(dimension: &str, rounds: BTreeMap<u32, ConsensusEntry>, threshold: f64) -> Self {
        let first = rounds.values().next().map(|e| e.value);
        let last = rounds.values().next_back().map(|e| e.value);
        let changed = match (first, last) {
            (Some(Some(a)), Some(Some(b))) => (b - a).abs() > threshold,
            // Gained or lost every contributor between first and last round.
            (Some(a), Some(b)) => a.is_some() != b.is_some(),
            _ => false,
        };
        Self {
            dimension: dimension.to_string(),
            rounds,
            changed,
        }
    }

    pub fn value_at(&self, round: u32) -> Option<f64> {
        self.rounds.get(&round).and_then(|e| e.value)
    }

    pub fn first(&self) -> Option<&ConsensusEntry> {
        self.rounds.values().next()
    }

    pub fn latest(&self) -> Option<&ConsensusEntry> {
        self.rounds.values().next_back()
    }

    /// Round -> value map, for presentation.
    pub fn values(&self) -> BTreeMap<u32, Option<f64>> {
        self.rounds.iter().map(|(r, e)| (*r, e.value)).collect()
    }
}

/// Evolution of every configured dimension over the rounds of one evaluation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvolutionReport {
    pub source: RoundSource,
    pub round_count: u32,
    pub series: BTreeMap<String, MetricEvolutionSeries>,
}

impl EvolutionReport {
    pub fn series(&self, dimension: &str) -> Option<&MetricEvolutionSeries> {
        self.series.get(dimension)
    }
}

/// Outputs grouped by round, as both evolution and convergence consume them.
pub type RoundGroups<'a> = BTreeMap<u32, Vec<&'a RaterOutput>>;

/// Rebuild the rater x round matrix and compute each dimension's consensus per round.
pub fn track_evolution(
    registry: &WeightRegistry,
    dimensions: &DimensionSet,
    outputs: &[RaterOutput],
    change_threshold: f64,
) -> EvolutionReport {
    let assignment = assign_rounds(outputs);
    let by_round = group_by_round(outputs, &assignment);
    evolve_rounds(registry, dimensions, &assignment, &by_round, change_threshold)
}

/// Per-round consensus over an existing grouping.
///
/// For callers that also need the grouping itself (the final round feeds
/// convergence), so rounds are assigned and grouped only once.
pub fn evolve_rounds(
    registry: &WeightRegistry,
    dimensions: &DimensionSet,
    assignment: &RoundAssignment,
    by_round: &RoundGroups<'_>,
    change_threshold: f64,
) -> EvolutionReport {
    let round_count = assignment.round_count();
    obs::emit_round_inference(
        assignment.source.as_str(),
        round_count,
        assignment.partially_tagged,
    );

    let series = dimensions
        .iter()
        .map(|dimension| {
            let rounds = by_round
                .iter()
                .map(|(&round, members)| {
                    let pairs: Vec<(RaterKey, Option<f64>)> = members
                        .iter()
                        .filter(|o| o.values.contains_key(&dimension.name))
                        .map(|o| (o.rater.clone(), o.value(&dimension.name)))
                        .collect();
                    if !dimension.nullable {
                        for (rater, _) in pairs.iter().filter(|(_, v)| v.is_none()) {
                            METRICS.inc_required_abstentions();
                            obs::emit_abstention_on_required(rater, &dimension.name, round);
                        }
                    }
                    (
                        round,
                        weighted_consensus(registry, &dimension.name, round, &pairs),
                    )
                })
                .collect();
            (
                dimension.name.clone(),
                MetricEvolutionSeries::new(&dimension.name, rounds, change_threshold),
            )
        })
        .collect();

    EvolutionReport {
        source: assignment.source,
        round_count,
        series,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Dimension, Polarity, ValueKind};
    use crate::weights::{RaterProfile, DEFAULT_WEIGHT_TOLERANCE};

    fn registry() -> WeightRegistry {
        WeightRegistry::from_profiles(
            vec![
                RaterProfile::new("a", "A").weight("quality", 0.6),
                RaterProfile::new("b", "B").weight("quality", 0.4),
            ],
            DEFAULT_WEIGHT_TOLERANCE,
        )
        .unwrap()
    }

    fn dims() -> DimensionSet {
        DimensionSet::new(vec![Dimension::new(
            "quality",
            Polarity::HigherIsBetter,
            ValueKind::Score,
        )])
    }

    fn out(rater: &str, quality: f64) -> RaterOutput {
        RaterOutput::new(rater).with_value("quality", quality)
    }

    #[test]
    fn occurrence_inference_numbers_each_rater_independently() {
        let outputs = vec![out("a", 1.0), out("b", 1.0), out("a", 1.0), out("b", 1.0)];
        assert_eq!(infer_rounds_by_occurrence(&outputs), vec![1, 1, 2, 2]);
    }

    #[test]
    fn occurrence_inference_is_idempotent() {
        let outputs = vec![out("a", 1.0), out("b", 2.0), out("a", 3.0), out("b", 4.0), out("a", 5.0)];
        let first = infer_rounds_by_occurrence(&outputs);
        let second = infer_rounds_by_occurrence(&outputs);
        assert_eq!(first, second);
        assert_eq!(assign_rounds(&outputs), assign_rounds(&outputs));
    }

    #[test]
    fn skipped_rater_shifts_inferred_rounds() {
        // b misses round 2; its round-3 output is inferred as round 2.
        let outputs = vec![
            out("a", 5.0).in_round(1),
            out("b", 5.0).in_round(1),
            out("a", 6.0).in_round(2),
            out("a", 7.0).in_round(3),
            out("b", 9.0).in_round(3),
        ];
        let mut untagged = outputs.clone();
        for o in &mut untagged {
            o.round = None;
        }

        assert_eq!(infer_rounds_by_occurrence(&untagged), vec![1, 1, 2, 3, 2]);

        let explicit = assign_rounds(&outputs);
        assert_eq!(explicit.source, RoundSource::Explicit);
        assert_eq!(explicit.rounds, vec![1, 1, 2, 3, 3]);
    }

    #[test]
    fn explicit_rounds_keep_skipped_rater_in_its_real_round() {
        let outputs = vec![
            out("a", 5.0).in_round(1),
            out("b", 5.0).in_round(1),
            out("a", 6.0).in_round(2),
            out("a", 7.0).in_round(3),
            out("b", 9.0).in_round(3),
        ];
        let report = track_evolution(&registry(), &dims(), &outputs, DEFAULT_CHANGE_THRESHOLD);
        let series = report.series("quality").unwrap();

        assert_eq!(report.source, RoundSource::Explicit);
        assert_eq!(series.value_at(2), Some(6.0));
        let round3 = 7.0 * 0.6 + 9.0 * 0.4;
        assert!((series.value_at(3).unwrap() - round3).abs() < 1e-9);
    }

    #[test]
    fn partial_tags_fall_back_to_inference() {
        let outputs = vec![out("a", 1.0).in_round(1), out("b", 1.0)];
        let assignment = assign_rounds(&outputs);
        assert_eq!(assignment.source, RoundSource::Inferred);
        assert!(assignment.partially_tagged);
        assert_eq!(assignment.rounds, vec![1, 1]);
    }

    #[test]
    fn round_zero_counts_as_untagged() {
        let outputs = vec![out("a", 1.0).in_round(0)];
        assert_eq!(assign_rounds(&outputs).source, RoundSource::Inferred);
    }

    #[test]
    fn duplicate_rater_in_explicit_round_keeps_later_output() {
        let outputs = vec![out("a", 2.0).in_round(1), out("a", 4.0).in_round(1)];
        let report = track_evolution(&registry(), &dims(), &outputs, DEFAULT_CHANGE_THRESHOLD);
        assert_eq!(report.series("quality").unwrap().value_at(1), Some(4.0));
    }

    #[test]
    fn changed_flag_compares_first_and_latest_round() {
        let moved = vec![out("a", 8.0), out("b", 6.0), out("a", 6.0), out("b", 6.0)];
        let report = track_evolution(&registry(), &dims(), &moved, DEFAULT_CHANGE_THRESHOLD);
        assert!(report.series("quality").unwrap().changed);
        assert_eq!(report.round_count, 2);

        let steady = vec![out("a", 7.0), out("b", 7.0), out("a", 7.005), out("b", 7.0)];
        let report = track_evolution(&registry(), &dims(), &steady, DEFAULT_CHANGE_THRESHOLD);
        assert!(!report.series("quality").unwrap().changed);
    }

    #[test]
    fn single_round_is_never_changed() {
        let outputs = vec![out("a", 8.0), out("b", 6.0)];
        let report = track_evolution(&registry(), &dims(), &outputs, DEFAULT_CHANGE_THRESHOLD);
        assert!(!report.series("quality").unwrap().changed);
    }

    #[test]
    fn null_consensus_propagates_through_series() {
        let outputs = vec![
            RaterOutput::new("a").abstain("quality"),
            RaterOutput::new("b").abstain("quality"),
            out("a", 5.0),
            RaterOutput::new("b").abstain("quality"),
        ];
        let report = track_evolution(&registry(), &dims(), &outputs, DEFAULT_CHANGE_THRESHOLD);
        let series = report.series("quality").unwrap();
        assert_eq!(series.value_at(1), None);
        assert_eq!(series.value_at(2), Some(5.0));
        assert!(series.changed);
        assert_eq!(series.values().len(), 2);
    }

    #[test]
    fn rater_missing_dimension_does_not_contribute() {
        let outputs = vec![out("a", 8.0), RaterOutput::new("b")];
        let report = track_evolution(&registry(), &dims(), &outputs, DEFAULT_CHANGE_THRESHOLD);
        let entry = report.series("quality").unwrap().latest().unwrap();
        assert_eq!(entry.value, Some(8.0));
        assert_eq!(entry.contributors.len(), 1);
        assert!(entry.abstained.is_empty());
    }

    #[test]
    fn no_outputs_yields_empty_series() {
        let report = track_evolution(&registry(), &dims(), &[], DEFAULT_CHANGE_THRESHOLD);
        assert_eq!(report.round_count, 0);
        assert!(report.series("quality").unwrap().rounds.is_empty());
    }
}
