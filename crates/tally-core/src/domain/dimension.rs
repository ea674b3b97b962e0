//! Scored dimensions and the built-in code-change rubric.

use serde::{Deserialize, Serialize};

/// Which direction of change is an improvement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Polarity {
    HigherIsBetter,
    LowerIsBetter,
}

/// Scale a dimension is measured on; drives presentation rounding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValueKind {
    /// 0-10 rating, presented with one decimal.
    Score,
    /// Duration in hours, presented with two decimals.
    Hours,
}

impl ValueKind {
    pub fn decimals(self) -> u32 {
        match self {
            ValueKind::Score => 1,
            ValueKind::Hours => 2,
        }
    }
}

/// A named, independently scored aspect of the evaluated subject.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dimension {
    pub name: String,
    pub polarity: Polarity,
    /// Whether raters may abstain on this dimension.
    #[serde(default = "default_nullable")]
    pub nullable: bool,
    pub kind: ValueKind,
}

fn default_nullable() -> bool {
    true
}

impl Dimension {
    pub fn new(name: impl Into<String>, polarity: Polarity, kind: ValueKind) -> Self {
        Self {
            name: name.into(),
            polarity,
            nullable: true,
            kind,
        }
    }

    pub fn required(mut self) -> Self {
        self.nullable = false;
        self
    }
}

pub const FUNCTIONAL_IMPACT: &str = "functional_impact";
pub const IDEAL_TIME_HOURS: &str = "ideal_time_hours";
pub const TEST_COVERAGE: &str = "test_coverage";
pub const CODE_QUALITY: &str = "code_quality";
pub const CODE_COMPLEXITY: &str = "code_complexity";
pub const ACTUAL_TIME_HOURS: &str = "actual_time_hours";
pub const TECHNICAL_DEBT_HOURS: &str = "technical_debt_hours";
pub const DEBT_REDUCTION_HOURS: &str = "debt_reduction_hours";

/// Ordered, fixed set of dimensions every rater is scored on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DimensionSet {
    dimensions: Vec<Dimension>,
}

impl DimensionSet {
    /// Build a set, keeping the first definition of any repeated name.
    pub fn new(dimensions: Vec<Dimension>) -> Self {
        let mut unique: Vec<Dimension> = Vec::with_capacity(dimensions.len());
        for d in dimensions {
            if !unique.iter().any(|u| u.name == d.name) {
                unique.push(d);
            }
        }
        Self { dimensions: unique }
    }

    /// The eight-dimension rubric used for code changes.
    pub fn code_change() -> Self {
        use Polarity::*;
        use ValueKind::*;
        Self::new(vec![
            Dimension::new(FUNCTIONAL_IMPACT, HigherIsBetter, Score).required(),
            Dimension::new(IDEAL_TIME_HOURS, LowerIsBetter, Hours),
            Dimension::new(TEST_COVERAGE, HigherIsBetter, Score),
            Dimension::new(CODE_QUALITY, HigherIsBetter, Score).required(),
            Dimension::new(CODE_COMPLEXITY, LowerIsBetter, Score),
            Dimension::new(ACTUAL_TIME_HOURS, LowerIsBetter, Hours),
            Dimension::new(TECHNICAL_DEBT_HOURS, LowerIsBetter, Hours),
            Dimension::new(DEBT_REDUCTION_HOURS, HigherIsBetter, Hours),
        ])
    }

    pub fn get(&self, name: &str) -> Option<&Dimension> {
        self.dimensions.iter().find(|d| d.name == name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Dimension> {
        self.dimensions.iter()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.dimensions.iter().map(|d| d.name.as_str())
    }

    pub fn len(&self) -> usize {
        self.dimensions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.dimensions.is_empty()
    }
}

impl Default for DimensionSet {
    fn default() -> Self {
        Self::code_change()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn code_change_rubric_has_eight_dimensions() {
        let set = DimensionSet::code_change();
        assert_eq!(set.len(), 8);
        assert_eq!(set.get(CODE_QUALITY).unwrap().kind, ValueKind::Score);
        assert_eq!(set.get(ACTUAL_TIME_HOURS).unwrap().kind, ValueKind::Hours);
        assert!(!set.get(CODE_QUALITY).unwrap().nullable);
        assert!(set.get(TEST_COVERAGE).unwrap().nullable);
    }

    #[test]
    fn duplicate_names_keep_first_definition() {
        let set = DimensionSet::new(vec![
            Dimension::new("quality", Polarity::HigherIsBetter, ValueKind::Score),
            Dimension::new("quality", Polarity::LowerIsBetter, ValueKind::Hours),
        ]);
        assert_eq!(set.len(), 1);
        assert_eq!(
            set.get("quality").unwrap().polarity,
            Polarity::HigherIsBetter
        );
    }

    #[test]
    fn dimension_deserializes_with_default_nullability() {
        let d: Dimension = serde_json::from_str(
            r#"{"name":"quality","polarity":"higher_is_better","kind":"score"}"#,
        )
        .unwrap();
        assert!(d.nullable);
    }

    #[test]
    fn names_preserve_configuration_order() {
        let set = DimensionSet::code_change();
        let names: Vec<&str> = set.names().collect();
        assert_eq!(names.first(), Some(&FUNCTIONAL_IMPACT));
        assert_eq!(names.last(), Some(&DEBT_REDUCTION_HOURS));
    }
}
