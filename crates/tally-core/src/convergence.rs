//! Final-round agreement score.
//!
//! `max(0, 1 - σ/2)` over one reference dimension, where σ is the population
//! standard deviation of the final round's values. On a 0-10 scale σ = 0
//! scores 1.0 and σ >= 2 scores 0. It is a heuristic proxy for agreement.

use serde::{Deserialize, Serialize};

use crate::consensus::round_to;
use crate::domain::dimension::CODE_QUALITY;
use crate::domain::RaterOutput;
use crate::obs;

/// Fewer non-null values than this always score 0.
const MIN_VALUES: usize = 2;

/// Convergence settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConvergenceConfig {
    pub reference_dimension: String,
    /// Minimum distinct raters in the whole evaluation.
    pub min_raters: usize,
}

impl Default for ConvergenceConfig {
    fn default() -> Self {
        Self {
            reference_dimension: CODE_QUALITY.to_string(),
            min_raters: 2,
        }
    }
}

/// Population standard deviation; `None` for an empty slice.
pub fn population_std_dev(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
    Some(variance.sqrt())
}

/// Score agreement among `final_round` outputs on the reference dimension.
///
/// `total_raters` is the number of distinct raters across the evaluation.
/// Degenerate input (too few raters or values) scores 0.
pub fn convergence_score(
    final_round: &[&RaterOutput],
    config: &ConvergenceConfig,
    total_raters: usize,
) -> f64 {
    let values: Vec<f64> = final_round
        .iter()
        .filter_map(|o| o.value(&config.reference_dimension))
        .collect();

    let score = if total_raters < config.min_raters || values.len() < MIN_VALUES {
        0.0
    } else {
        let sigma = population_std_dev(&values).unwrap_or(0.0);
        round_to((1.0 - sigma / 2.0).max(0.0), 2)
    };

    obs::emit_convergence_scored(&config.reference_dimension, values.len(), score);
    score
}

#[cfg(test)]
mod tests {
    use super::*;

    fn quality(rater: &str, v: f64) -> RaterOutput {
        RaterOutput::new(rater).with_value(CODE_QUALITY, v)
    }

    fn score(outputs: &[RaterOutput], total: usize) -> f64 {
        let refs: Vec<&RaterOutput> = outputs.iter().collect();
        convergence_score(&refs, &ConvergenceConfig::default(), total)
    }

    #[test]
    fn identical_values_converge_fully() {
        let outputs = vec![quality("a", 7.0), quality("b", 7.0), quality("c", 7.0)];
        assert_eq!(score(&outputs, 3), 1.0);
    }

    #[test]
    fn zero_and_ten_do_not_converge() {
        let outputs = vec![quality("a", 0.0), quality("b", 10.0)];
        assert_eq!(population_std_dev(&[0.0, 10.0]), Some(5.0));
        assert_eq!(score(&outputs, 2), 0.0);
    }

    #[test]
    fn moderate_spread_is_rounded_to_two_decimals() {
        // values 6, 8 -> σ = 1 -> 0.5
        let outputs = vec![quality("a", 6.0), quality("b", 8.0)];
        assert_eq!(score(&outputs, 2), 0.5);

        // values 7, 7.5, 8 -> σ ≈ 0.408 -> 0.80
        let outputs = vec![quality("a", 7.0), quality("b", 7.5), quality("c", 8.0)];
        assert_eq!(score(&outputs, 3), 0.8);
    }

    #[test]
    fn single_value_scores_zero() {
        let outputs = vec![quality("a", 7.0), RaterOutput::new("b").abstain(CODE_QUALITY)];
        assert_eq!(score(&outputs, 2), 0.0);
    }

    #[test]
    fn too_few_raters_overall_scores_zero() {
        let outputs = vec![quality("a", 7.0), quality("b", 7.0)];
        let config = ConvergenceConfig {
            min_raters: 3,
            ..ConvergenceConfig::default()
        };
        let refs: Vec<&RaterOutput> = outputs.iter().collect();
        assert_eq!(convergence_score(&refs, &config, 2), 0.0);
    }

    #[test]
    fn empty_final_round_scores_zero() {
        assert_eq!(score(&[], 5), 0.0);
    }
}
