//! Trend and summary statistics over a subject's history.
//!
//! Old entries may predate a dimension, and any entry may hold a null
//! consensus. Both are filled with 0 once, in [`fill_defaults`], before any
//! statistic is computed.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tally_ledger::HistoryEntry;

use crate::convergence::population_std_dev;
use crate::domain::{DimensionSet, Polarity};

/// Value used for a dimension missing from (or null in) an old entry.
pub const MISSING_VALUE_DEFAULT: f64 = 0.0;

/// Direction of change between the first and last evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Trend {
    Improving,
    Declining,
    Stable,
}

impl Trend {
    fn classify(first: f64, last: f64, polarity: Polarity, threshold: f64) -> Self {
        let delta = last - first;
        if delta.abs() <= threshold {
            return Trend::Stable;
        }
        let up_is_good = polarity == Polarity::HigherIsBetter;
        if (delta > 0.0) == up_is_good {
            Trend::Improving
        } else {
            Trend::Declining
        }
    }
}

/// Summary of one dimension across every evaluation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DimensionStats {
    pub dimension: String,
    pub samples: usize,
    pub average: f64,
    pub median: f64,
    pub std_dev: f64,
    pub min: f64,
    pub max: f64,
    pub latest: f64,
    pub trend: Trend,
}

/// Summary of a subject's full history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryStats {
    pub evaluations: usize,
    pub dimensions: BTreeMap<String, DimensionStats>,
    pub average_convergence: f64,
    pub total_tokens: u64,
    pub total_cost_usd: f64,
}

/// Per-entry values for every configured dimension, absent or null -> 0.
pub fn fill_defaults(
    entries: &[HistoryEntry],
    dimensions: &DimensionSet,
) -> Vec<BTreeMap<String, f64>> {
    entries
        .iter()
        .map(|entry| {
            dimensions
                .names()
                .map(|name| {
                    let value = entry.value(name).unwrap_or(MISSING_VALUE_DEFAULT);
                    (name.to_string(), value)
                })
                .collect()
        })
        .collect()
}

fn median(values: &[f64]) -> f64 {
    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);
    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 0 {
        (sorted[mid - 1] + sorted[mid]) / 2.0
    } else {
        sorted[mid]
    }
}

impl HistoryStats {
    /// Statistics over `entries` (oldest first).
    ///
    /// `change_threshold` is the smallest first-to-last difference that
    /// counts as a trend.
    pub fn from_entries(
        entries: &[HistoryEntry],
        dimensions: &DimensionSet,
        change_threshold: f64,
    ) -> Self {
        let filled = fill_defaults(entries, dimensions);

        let mut per_dimension = BTreeMap::new();
        if !filled.is_empty() {
            for dimension in dimensions.iter() {
                let series: Vec<f64> = filled.iter().map(|row| row[&dimension.name]).collect();
                let first = series[0];
                let latest = series[series.len() - 1];
                per_dimension.insert(
                    dimension.name.clone(),
                    DimensionStats {
                        dimension: dimension.name.clone(),
                        samples: series.len(),
                        average: series.iter().sum::<f64>() / series.len() as f64,
                        median: median(&series),
                        std_dev: population_std_dev(&series).unwrap_or(0.0),
                        min: series.iter().copied().fold(f64::INFINITY, f64::min),
                        max: series.iter().copied().fold(f64::NEG_INFINITY, f64::max),
                        latest,
                        trend: Trend::classify(first, latest, dimension.polarity, change_threshold),
                    },
                );
            }
        }

        let average_convergence = if entries.is_empty() {
            0.0
        } else {
            entries.iter().map(|e| e.convergence_score).sum::<f64>() / entries.len() as f64
        };

        Self {
            evaluations: entries.len(),
            dimensions: per_dimension,
            average_convergence,
            total_tokens: entries.iter().map(|e| e.tokens.total_tokens()).sum(),
            total_cost_usd: entries.iter().map(|e| e.tokens.total_cost_usd).sum(),
        }
    }

    pub fn dimension(&self, name: &str) -> Option<&DimensionStats> {
        self.dimensions.get(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::dimension::{CODE_COMPLEXITY, CODE_QUALITY, TEST_COVERAGE};
    use chrono::Utc;
    use tally_ledger::TokenSnapshot;

    // Built from JSON, the same way stored documents reach us.
    fn entry(n: u32, values: &[(&str, Option<f64>)]) -> HistoryEntry {
        let consensus: serde_json::Map<String, serde_json::Value> = values
            .iter()
            .map(|(k, v)| (k.to_string(), serde_json::json!(v)))
            .collect();
        serde_json::from_value(serde_json::json!({
            "entry_id": format!("00000000-0000-0000-0000-{n:012}"),
            "evaluation_number": n,
            "recorded_at": Utc::now(),
            "consensus": consensus,
            "tokens": TokenSnapshot::new(100, 20, 0.01),
            "convergence_score": 0.5,
        }))
        .unwrap()
    }

    #[test]
    fn missing_dimension_defaults_to_zero() {
        let entries = vec![
            entry(1, &[(CODE_QUALITY, Some(6.0))]),
            entry(2, &[(CODE_QUALITY, Some(8.0)), (TEST_COVERAGE, Some(4.0))]),
        ];
        let filled = fill_defaults(&entries, &DimensionSet::code_change());
        assert_eq!(filled[0][TEST_COVERAGE], 0.0);
        assert_eq!(filled[1][TEST_COVERAGE], 4.0);
        assert_eq!(filled[0].len(), 8);
    }

    #[test]
    fn null_consensus_defaults_to_zero() {
        let entries = vec![entry(1, &[(CODE_QUALITY, None)])];
        let filled = fill_defaults(&entries, &DimensionSet::code_change());
        assert_eq!(filled[0][CODE_QUALITY], 0.0);
    }

    #[test]
    fn summary_statistics() {
        let entries = vec![
            entry(1, &[(CODE_QUALITY, Some(6.0))]),
            entry(2, &[(CODE_QUALITY, Some(8.0))]),
            entry(3, &[(CODE_QUALITY, Some(7.0))]),
            entry(4, &[(CODE_QUALITY, Some(9.0))]),
        ];
        let stats = HistoryStats::from_entries(&entries, &DimensionSet::code_change(), 0.01);
        let q = stats.dimension(CODE_QUALITY).unwrap();

        assert_eq!(stats.evaluations, 4);
        assert_eq!(q.samples, 4);
        assert_eq!(q.average, 7.5);
        assert_eq!(q.median, 7.5);
        assert_eq!(q.min, 6.0);
        assert_eq!(q.max, 9.0);
        assert_eq!(q.latest, 9.0);
        assert!((q.std_dev - 1.25f64.sqrt()).abs() < 1e-12);
        assert_eq!(q.trend, Trend::Improving);
        assert_eq!(stats.total_tokens, 480);
        assert_eq!(stats.average_convergence, 0.5);
    }

    #[test]
    fn trend_respects_polarity() {
        let entries = vec![
            entry(1, &[(CODE_COMPLEXITY, Some(3.0)), (CODE_QUALITY, Some(7.0))]),
            entry(2, &[(CODE_COMPLEXITY, Some(6.0)), (CODE_QUALITY, Some(7.005))]),
        ];
        let stats = HistoryStats::from_entries(&entries, &DimensionSet::code_change(), 0.01);
        assert_eq!(stats.dimension(CODE_COMPLEXITY).unwrap().trend, Trend::Declining);
        assert_eq!(stats.dimension(CODE_QUALITY).unwrap().trend, Trend::Stable);
    }

    #[test]
    fn odd_median_and_single_entry() {
        let entries = vec![entry(1, &[(CODE_QUALITY, Some(4.0))])];
        let stats = HistoryStats::from_entries(&entries, &DimensionSet::code_change(), 0.01);
        let q = stats.dimension(CODE_QUALITY).unwrap();
        assert_eq!(q.median, 4.0);
        assert_eq!(q.std_dev, 0.0);
        assert_eq!(q.trend, Trend::Stable);
    }

    #[test]
    fn empty_history_has_no_dimension_stats() {
        let stats = HistoryStats::from_entries(&[], &DimensionSet::code_change(), 0.01);
        assert_eq!(stats.evaluations, 0);
        assert!(stats.dimensions.is_empty());
        assert_eq!(stats.average_convergence, 0.0);
    }
}
