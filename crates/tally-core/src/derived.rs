//! Dimensions derived as the difference of two consensus values.
//!
//! Always computed from consensus values, never by averaging per-rater
//! differences. A missing operand counts as zero and the derived value is
//! still reported; `imputed_zero` tells the caller when that happened.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::domain::dimension::{DEBT_REDUCTION_HOURS, TECHNICAL_DEBT_HOURS};
use crate::domain::ValueKind;

/// `name = positive - negative`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DerivedMetric {
    pub name: String,
    pub positive: String,
    pub negative: String,
    pub kind: ValueKind,
}

impl DerivedMetric {
    pub fn new(name: &str, positive: &str, negative: &str, kind: ValueKind) -> Self {
        Self {
            name: name.to_string(),
            positive: positive.to_string(),
            negative: negative.to_string(),
            kind,
        }
    }

    /// Net debt: hours of debt introduced minus hours of debt removed.
    pub fn net_debt() -> Self {
        Self::new(
            "net_debt_hours",
            TECHNICAL_DEBT_HOURS,
            DEBT_REDUCTION_HOURS,
            ValueKind::Hours,
        )
    }
}

/// Result of composing one derived metric.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DerivedValue {
    pub name: String,
    pub value: f64,
    pub positive: Option<f64>,
    pub negative: Option<f64>,
    /// At least one operand was null and counted as zero.
    pub imputed_zero: bool,
}

/// Compose `metric` from consensus values.
pub fn compose(metric: &DerivedMetric, consensus: &BTreeMap<String, Option<f64>>) -> DerivedValue {
    let positive = consensus.get(&metric.positive).copied().flatten();
    let negative = consensus.get(&metric.negative).copied().flatten();
    DerivedValue {
        name: metric.name.clone(),
        value: positive.unwrap_or(0.0) - negative.unwrap_or(0.0),
        positive,
        negative,
        imputed_zero: positive.is_none() || negative.is_none(),
    }
}

pub fn compose_all(
    metrics: &[DerivedMetric],
    consensus: &BTreeMap<String, Option<f64>>,
) -> Vec<DerivedValue> {
    metrics.iter().map(|m| compose(m, consensus)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn consensus(debt: Option<f64>, reduction: Option<f64>) -> BTreeMap<String, Option<f64>> {
        let mut map = BTreeMap::new();
        map.insert(TECHNICAL_DEBT_HOURS.to_string(), debt);
        map.insert(DEBT_REDUCTION_HOURS.to_string(), reduction);
        map
    }

    #[test]
    fn net_value_is_difference_of_consensus() {
        let v = compose(&DerivedMetric::net_debt(), &consensus(Some(3.5), Some(1.25)));
        assert_eq!(v.value, 2.25);
        assert!(!v.imputed_zero);
    }

    #[test]
    fn null_operand_counts_as_zero() {
        let v = compose(&DerivedMetric::net_debt(), &consensus(None, Some(2.0)));
        assert_eq!(v.value, -2.0);
        assert!(v.imputed_zero);
        assert_eq!(v.positive, None);
    }

    #[test]
    fn both_null_is_zero_not_null() {
        let v = compose(&DerivedMetric::net_debt(), &consensus(None, None));
        assert_eq!(v.value, 0.0);
        assert!(v.imputed_zero);
    }

    #[test]
    fn absent_dimension_counts_as_zero() {
        let v = compose(&DerivedMetric::net_debt(), &BTreeMap::new());
        assert_eq!(v.value, 0.0);
        assert!(v.imputed_zero);
    }

    #[test]
    fn derived_from_consensus_not_from_per_rater_nets() {
        // Consensus debt 4.0 and reduction 1.0 come from weighted sums over
        // different rater sets; the net is taken afterwards.
        let values = compose_all(&[DerivedMetric::net_debt()], &consensus(Some(4.0), Some(1.0)));
        assert_eq!(values.len(), 1);
        assert_eq!(values[0].value, 3.0);
    }
}
