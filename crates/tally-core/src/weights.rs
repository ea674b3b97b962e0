//! Per-dimension rater weights.
//!
//! The registry is read-only configuration shared by every evaluation in the
//! process. For each dimension the weights of all registered raters are
//! expected to sum to 1.0; [`WeightRegistry::validate`] checks that, and is a
//! design-time self-check rather than part of normal evaluation.

use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};

use crate::domain::dimension::{
    ACTUAL_TIME_HOURS, CODE_COMPLEXITY, CODE_QUALITY, DEBT_REDUCTION_HOURS, FUNCTIONAL_IMPACT,
    IDEAL_TIME_HOURS, TECHNICAL_DEBT_HOURS, TEST_COVERAGE,
};
use crate::domain::{normalize_name, DimensionSet, RaterKey, Result, TallyError};
use crate::metrics::METRICS;
use crate::obs;

/// Default tolerance for a dimension's weight column summing to 1.0.
pub const DEFAULT_WEIGHT_TOLERANCE: f64 = 0.001;

/// A looked-up weight, tagged with how it was obtained.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "source", content = "value", rename_all = "snake_case")]
pub enum Weight {
    /// Configured weight of a registered rater.
    Known(f64),
    /// Equal share (1/N registered raters) given to an unregistered rater.
    FallbackEqualShare(f64),
}

impl Weight {
    pub fn value(self) -> f64 {
        match self {
            Weight::Known(w) | Weight::FallbackEqualShare(w) => w,
        }
    }

    pub fn is_fallback(self) -> bool {
        matches!(self, Weight::FallbackEqualShare(_))
    }
}

/// One registered rater with its display name, aliases and weight vector.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RaterProfile {
    pub key: RaterKey,
    pub display_name: String,
    #[serde(default)]
    pub aliases: Vec<String>,
    /// Dimension -> weight in [0, 1]. Missing dimensions weigh 0.
    pub weights: BTreeMap<String, f64>,
}

impl RaterProfile {
    pub fn new(key: &str, display_name: &str) -> Self {
        Self {
            key: RaterKey::new(key),
            display_name: display_name.to_string(),
            aliases: Vec::new(),
            weights: BTreeMap::new(),
        }
    }

    pub fn alias(mut self, alias: &str) -> Self {
        self.aliases.push(alias.to_string());
        self
    }

    pub fn weight(mut self, dimension: &str, weight: f64) -> Self {
        self.weights.insert(dimension.to_string(), weight);
        self
    }
}

/// A dimension whose weight column does not sum to 1.0.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeightViolation {
    pub dimension: String,
    pub observed_sum: f64,
}

/// Process-wide rater -> dimension -> weight table.
#[derive(Debug, Clone)]
pub struct WeightRegistry {
    profiles: Vec<RaterProfile>,
    by_key: HashMap<RaterKey, usize>,
    aliases: HashMap<String, RaterKey>,
    tolerance: f64,
}

impl WeightRegistry {
    /// Build a registry from profiles.
    ///
    /// Rejects duplicate keys, aliases claimed by two raters, and weights
    /// outside `[0, 1]`. Column sums are not checked here; see [`Self::validate`].
    pub fn from_profiles(profiles: Vec<RaterProfile>, tolerance: f64) -> Result<Self> {
        if !(tolerance.is_finite() && tolerance >= 0.0) {
            return Err(TallyError::InvalidConfig(format!(
                "weight tolerance must be a non-negative number, got {tolerance}"
            )));
        }

        let mut by_key = HashMap::new();
        let mut aliases: HashMap<String, RaterKey> = HashMap::new();

        for (idx, profile) in profiles.iter().enumerate() {
            if profile.key.as_str().is_empty() {
                return Err(TallyError::InvalidConfig("rater key must not be empty".into()));
            }
            if by_key.insert(profile.key.clone(), idx).is_some() {
                return Err(TallyError::InvalidConfig(format!(
                    "rater {} registered twice",
                    profile.key
                )));
            }
            for (dimension, weight) in &profile.weights {
                if !(weight.is_finite() && (0.0..=1.0).contains(weight)) {
                    return Err(TallyError::InvalidConfig(format!(
                        "weight {weight} for rater {} on {dimension} is outside [0, 1]",
                        profile.key
                    )));
                }
            }

            let names = std::iter::once(profile.display_name.as_str())
                .chain(profile.aliases.iter().map(String::as_str));
            for name in names {
                let alias = normalize_name(name);
                if alias.is_empty() || alias == profile.key.as_str() {
                    continue;
                }
                match aliases.get(&alias) {
                    Some(owner) if owner != &profile.key => {
                        return Err(TallyError::InvalidConfig(format!(
                            "alias {alias:?} claimed by both {owner} and {}",
                            profile.key
                        )));
                    }
                    _ => {
                        aliases.insert(alias, profile.key.clone());
                    }
                }
            }
        }

        Ok(Self {
            profiles,
            by_key,
            aliases,
            tolerance,
        })
    }

    /// The five-rater panel used for code changes.
    pub fn code_change() -> Self {
        let profiles = code_change_profiles();
        // The built-in table is covered by tests; construction cannot fail.
        match Self::from_profiles(profiles, DEFAULT_WEIGHT_TOLERANCE) {
            Ok(registry) => registry,
            Err(e) => unreachable!("built-in weight table is invalid: {e}"),
        }
    }

    /// Map any accepted display name, alias or key to the canonical rater key.
    ///
    /// Unregistered names come back normalized but otherwise unchanged, and
    /// will receive a fallback weight.
    pub fn canonicalize(&self, name: &str) -> RaterKey {
        let normalized = normalize_name(name);
        if let Some(key) = self.aliases.get(&normalized) {
            return key.clone();
        }
        RaterKey::new(&normalized)
    }

    pub fn is_registered(&self, rater: &RaterKey) -> bool {
        self.by_key.contains_key(rater)
    }

    pub fn profile(&self, rater: &RaterKey) -> Option<&RaterProfile> {
        self.by_key.get(rater).map(|&idx| &self.profiles[idx])
    }

    pub fn profiles(&self) -> &[RaterProfile] {
        &self.profiles
    }

    pub fn rater_count(&self) -> usize {
        self.profiles.len()
    }

    pub fn tolerance(&self) -> f64 {
        self.tolerance
    }

    /// Equal share given to unregistered raters.
    pub fn fallback_share(&self) -> f64 {
        1.0 / self.profiles.len().max(1) as f64
    }

    /// Weight of `rater` for `dimension`, without logging.
    pub fn lookup(&self, rater: &RaterKey, dimension: &str) -> Weight {
        match self.profile(rater) {
            Some(profile) => Weight::Known(profile.weights.get(dimension).copied().unwrap_or(0.0)),
            None => Weight::FallbackEqualShare(self.fallback_share()),
        }
    }

    /// Weight of `rater` for `dimension`.
    ///
    /// Unregistered raters get [`Weight::FallbackEqualShare`] and a warning;
    /// this never fails.
    pub fn weight_of(&self, rater: &RaterKey, dimension: &str) -> Weight {
        let weight = self.lookup(rater, dimension);
        if let Weight::FallbackEqualShare(w) = weight {
            METRICS.inc_fallback_weights();
            obs::emit_fallback_weight(rater, dimension, w);
        }
        weight
    }

    /// Dimensions whose weight column deviates from 1.0 by more than the tolerance.
    pub fn validate(&self, dimensions: &DimensionSet) -> Vec<WeightViolation> {
        dimensions
            .names()
            .filter_map(|dimension| {
                let observed_sum: f64 = self
                    .profiles
                    .iter()
                    .map(|p| p.weights.get(dimension).copied().unwrap_or(0.0))
                    .sum();
                ((observed_sum - 1.0).abs() > self.tolerance).then(|| WeightViolation {
                    dimension: dimension.to_string(),
                    observed_sum,
                })
            })
            .collect()
    }
}

impl Default for WeightRegistry {
    fn default() -> Self {
        Self::code_change()
    }
}

/// Weight table for the code-change panel. Each column sums to 1.0.
///
/// | dimension              | BA   | author | reviewer | architect | SDET |
/// |------------------------|------|--------|----------|-----------|------|
/// | functional_impact      | 0.40 | 0.10   | 0.15     | 0.15      | 0.20 |
/// | ideal_time_hours       | 0.35 | 0.15   | 0.15     | 0.25      | 0.10 |
/// | test_coverage          | 0.10 | 0.10   | 0.15     | 0.10      | 0.55 |
/// | code_quality           | 0.05 | 0.15   | 0.40     | 0.25      | 0.15 |
/// | code_complexity        | 0.05 | 0.15   | 0.20     | 0.45      | 0.15 |
/// | actual_time_hours      | 0.10 | 0.55   | 0.10     | 0.15      | 0.10 |
/// | technical_debt_hours   | 0.05 | 0.10   | 0.20     | 0.50      | 0.15 |
/// | debt_reduction_hours   | 0.05 | 0.15   | 0.20     | 0.45      | 0.15 |
pub fn code_change_profiles() -> Vec<RaterProfile> {
    let column = |p: RaterProfile, w: [f64; 8]| {
        p.weight(FUNCTIONAL_IMPACT, w[0])
            .weight(IDEAL_TIME_HOURS, w[1])
            .weight(TEST_COVERAGE, w[2])
            .weight(CODE_QUALITY, w[3])
            .weight(CODE_COMPLEXITY, w[4])
            .weight(ACTUAL_TIME_HOURS, w[5])
            .weight(TECHNICAL_DEBT_HOURS, w[6])
            .weight(DEBT_REDUCTION_HOURS, w[7])
    };

    vec![
        column(
            RaterProfile::new("business-analyst", "Business Analyst").alias("ba"),
            [0.40, 0.35, 0.10, 0.05, 0.05, 0.10, 0.05, 0.05],
        ),
        column(
            RaterProfile::new("developer-author", "Developer Author")
                .alias("author")
                .alias("developer"),
            [0.10, 0.15, 0.10, 0.15, 0.15, 0.55, 0.10, 0.15],
        ),
        column(
            RaterProfile::new("developer-reviewer", "Developer Reviewer").alias("reviewer"),
            [0.15, 0.15, 0.15, 0.40, 0.20, 0.10, 0.20, 0.20],
        ),
        column(
            RaterProfile::new("senior-architect", "Senior Architect").alias("architect"),
            [0.15, 0.25, 0.10, 0.25, 0.45, 0.15, 0.50, 0.45],
        ),
        column(
            RaterProfile::new("sdet", "SDET")
                .alias("qa")
                .alias("qa engineer")
                .alias("test engineer"),
            [0.20, 0.10, 0.55, 0.15, 0.15, 0.10, 0.15, 0.15],
        ),
    ]
}
