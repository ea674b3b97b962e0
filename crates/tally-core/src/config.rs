//! Evaluation configuration.
//!
//! A JSON document; every field is optional and falls back to the built-in
//! code-change rubric and panel.
//!
//! ```json
//! {
//!   "change_threshold": 0.01,
//!   "weight_tolerance": 0.001,
//!   "convergence": { "reference_dimension": "code_quality", "min_raters": 2 },
//!   "history_dir": ".tally/history"
//! }
//! ```

use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tally_ledger::{FsHistoryStore, HistoryLedger};

use crate::convergence::ConvergenceConfig;
use crate::derived::DerivedMetric;
use crate::domain::{Dimension, DimensionSet, Result, TallyError};
use crate::evolution::DEFAULT_CHANGE_THRESHOLD;
use crate::weights::{code_change_profiles, RaterProfile, WeightRegistry, DEFAULT_WEIGHT_TOLERANCE};

/// Default location of the file-backed history store.
pub const DEFAULT_HISTORY_DIR: &str = ".tally/history";

/// Top-level configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TallyConfig {
    /// Absolute difference for an evolution series to count as changed.
    pub change_threshold: f64,
    /// Allowed deviation of a weight column from 1.0.
    pub weight_tolerance: f64,
    pub convergence: ConvergenceConfig,
    pub history_dir: PathBuf,
    /// Replaces the built-in rubric when set.
    pub dimensions: Option<Vec<Dimension>>,
    /// Replaces the built-in panel when set.
    pub weights: Option<Vec<RaterProfile>>,
    /// Replaces the built-in derived metrics when set.
    pub derived: Option<Vec<DerivedMetric>>,
}

impl Default for TallyConfig {
    fn default() -> Self {
        Self {
            change_threshold: DEFAULT_CHANGE_THRESHOLD,
            weight_tolerance: DEFAULT_WEIGHT_TOLERANCE,
            convergence: ConvergenceConfig::default(),
            history_dir: PathBuf::from(DEFAULT_HISTORY_DIR),
            dimensions: None,
            weights: None,
            derived: None,
        }
    }
}

impl TallyConfig {
    /// Parse and validate a JSON config document.
    pub fn from_json_str(raw: &str) -> Result<Self> {
        let config: TallyConfig = serde_json::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a JSON config file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let raw = std::fs::read_to_string(path.as_ref())?;
        Self::from_json_str(&raw)
    }

    pub fn dimension_set(&self) -> DimensionSet {
        match &self.dimensions {
            Some(dims) => DimensionSet::new(dims.clone()),
            None => DimensionSet::code_change(),
        }
    }

    pub fn weight_registry(&self) -> Result<WeightRegistry> {
        let profiles = self.weights.clone().unwrap_or_else(code_change_profiles);
        WeightRegistry::from_profiles(profiles, self.weight_tolerance)
    }

    /// Ledger over a file store rooted at `history_dir`, created if missing.
    pub fn history_ledger(&self) -> Result<HistoryLedger> {
        let store = FsHistoryStore::new(&self.history_dir)?;
        Ok(HistoryLedger::new(Arc::new(store)))
    }

    /// Configured derived metrics; by default net debt, when both operands exist.
    pub fn derived_metrics(&self) -> Vec<DerivedMetric> {
        match &self.derived {
            Some(derived) => derived.clone(),
            None => {
                let dims = self.dimension_set();
                let net_debt = DerivedMetric::net_debt();
                if dims.contains(&net_debt.positive) && dims.contains(&net_debt.negative) {
                    vec![net_debt]
                } else {
                    Vec::new()
                }
            }
        }
    }

    /// Check internal consistency. Weight column sums are not checked here.
    pub fn validate(&self) -> Result<()> {
        if !(self.change_threshold.is_finite() && self.change_threshold >= 0.0) {
            return Err(TallyError::InvalidConfig(format!(
                "change_threshold must be a non-negative number, got {}",
                self.change_threshold
            )));
        }

        let dims = self.dimension_set();
        if dims.is_empty() {
            return Err(TallyError::InvalidConfig(
                "at least one dimension is required".to_string(),
            ));
        }
        if !dims.contains(&self.convergence.reference_dimension) {
            return Err(TallyError::UnknownDimension(
                self.convergence.reference_dimension.clone(),
            ));
        }
        for metric in self.derived_metrics() {
            for operand in [&metric.positive, &metric.negative] {
                if !dims.contains(operand) {
                    return Err(TallyError::UnknownDimension(operand.clone()));
                }
            }
        }

        self.weight_registry()?;
        Ok(())
    }
}
