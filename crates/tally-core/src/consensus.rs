//! Weighted consensus for one dimension in one round.
//!
//! Abstentions are dropped before anything is summed; if nobody is left the
//! consensus is `None`, never zero. Rounding happens only when a value is
//! presented, not before the weighted sum.

use serde::{Deserialize, Serialize};

use crate::domain::{RaterKey, ValueKind};
use crate::metrics::METRICS;
use crate::obs;
use crate::weights::{Weight, WeightRegistry};

/// How a consensus value was reduced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConsensusMethod {
    /// Σ(value × weight) / Σ(weight).
    Weighted,
    /// Exactly one contributor; its value is the consensus.
    SingleContributor,
    /// Contributing weights summed to zero; plain arithmetic mean.
    UnweightedMean,
    /// Every rater abstained.
    NoContributors,
}

/// One rater's part in a consensus.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Contribution {
    pub rater: RaterKey,
    pub value: f64,
    pub weight: Weight,
}

/// Consensus for one (dimension, round).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConsensusEntry {
    pub dimension: String,
    pub round: u32,
    pub value: Option<f64>,
    pub method: ConsensusMethod,
    pub contributors: Vec<Contribution>,
    pub abstained: Vec<RaterKey>,
}

impl ConsensusEntry {
    /// `value` rounded for display according to `kind`.
    pub fn presented(&self, kind: ValueKind) -> Option<f64> {
        self.value.map(|v| round_for(kind, v))
    }

    /// Whether any contributor was weighted with a fallback share.
    pub fn used_fallback_weight(&self) -> bool {
        self.contributors.iter().any(|c| c.weight.is_fallback())
    }
}

/// Round `value` to the presentation precision of `kind`.
pub fn round_for(kind: ValueKind, value: f64) -> f64 {
    round_to(value, kind.decimals())
}

pub(crate) fn round_to(value: f64, decimals: u32) -> f64 {
    let factor = 10f64.powi(decimals as i32);
    (value * factor).round() / factor
}

/// Reduce `(rater, value-or-abstain)` pairs for `dimension` into one consensus.
pub fn weighted_consensus(
    registry: &WeightRegistry,
    dimension: &str,
    round: u32,
    pairs: &[(RaterKey, Option<f64>)],
) -> ConsensusEntry {
    let mut abstained = Vec::new();
    let mut contributors = Vec::new();

    for (rater, value) in pairs {
        match value {
            Some(v) => contributors.push(Contribution {
                rater: rater.clone(),
                value: *v,
                weight: registry.weight_of(rater, dimension),
            }),
            None => abstained.push(rater.clone()),
        }
    }
    METRICS.add_abstentions(abstained.len() as u64);

    let (value, method) = match contributors.as_slice() {
        [] => (None, ConsensusMethod::NoContributors),
        [only] => (Some(only.value), ConsensusMethod::SingleContributor),
        many => {
            let denominator: f64 = many.iter().map(|c| c.weight.value()).sum();
            if denominator > 0.0 {
                let numerator: f64 = many.iter().map(|c| c.value * c.weight.value()).sum();
                (Some(numerator / denominator), ConsensusMethod::Weighted)
            } else {
                METRICS.inc_unweighted_fallbacks();
                obs::emit_consensus_fallback_mean(dimension, round, many.len());
                let mean = many.iter().map(|c| c.value).sum::<f64>() / many.len() as f64;
                (Some(mean), ConsensusMethod::UnweightedMean)
            }
        }
    };

    ConsensusEntry {
        dimension: dimension.to_string(),
        round,
        value,
        method,
        contributors,
        abstained,
    }
}
