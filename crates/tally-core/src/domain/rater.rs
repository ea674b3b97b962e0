//! Raters and the outputs they contribute.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Deserializer, Serialize};
use tally_ledger::TokenSnapshot;

/// Canonical rater identifier.
///
/// Always lowercase, with whitespace and underscores folded into single
/// hyphens. Alias resolution ("ba" -> "business-analyst") is done by
/// [`crate::weights::WeightRegistry::canonicalize`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub struct RaterKey(String);

impl RaterKey {
    pub fn new(name: &str) -> Self {
        Self(normalize_name(name))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for RaterKey {
    fn from(name: String) -> Self {
        Self::new(&name)
    }
}

impl From<&str> for RaterKey {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

impl From<RaterKey> for String {
    fn from(key: RaterKey) -> Self {
        key.0
    }
}

impl fmt::Display for RaterKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Lowercase, trim, fold runs of whitespace/underscores/hyphens into one hyphen.
pub fn normalize_name(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    let mut pending_sep = false;
    for c in name.trim().chars() {
        if c.is_whitespace() || c == '_' || c == '-' {
            pending_sep = true;
            continue;
        }
        if pending_sep && !out.is_empty() {
            out.push('-');
        }
        pending_sep = false;
        out.extend(c.to_lowercase());
    }
    out
}

/// Strings a rater may send instead of a number to abstain.
const ABSTAIN_MARKERS: &[&str] = &["unknown", "n/a", "na", "null", "none", "-", ""];

/// Interpret one raw value from a rater's dimension map.
///
/// Numbers and numeric strings are values; `null` and the abstain markers
/// are abstentions. Anything else is treated as an abstention too.
pub fn parse_metric_value(raw: &serde_json::Value) -> Option<f64> {
    let value = match raw {
        serde_json::Value::Number(n) => n.as_f64(),
        serde_json::Value::String(s) => {
            let s = s.trim();
            if ABSTAIN_MARKERS.contains(&s.to_ascii_lowercase().as_str()) {
                None
            } else {
                s.parse::<f64>().ok()
            }
        }
        _ => None,
    };
    value.filter(|v| v.is_finite())
}

fn deserialize_values<'de, D>(deserializer: D) -> Result<BTreeMap<String, Option<f64>>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: BTreeMap<String, serde_json::Value> = BTreeMap::deserialize(deserializer)?;
    Ok(raw
        .into_iter()
        .map(|(k, v)| (k, parse_metric_value(&v)))
        .collect())
}

/// One rater's contribution at one point in the discussion.
///
/// `summary` and `concerns` are carried for the caller; aggregation never
/// reads them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RaterOutput {
    pub rater: RaterKey,
    /// Explicit round, when the producer tagged one (1-based).
    #[serde(default)]
    pub round: Option<u32>,
    /// Dimension -> value; `None` means the rater abstained.
    #[serde(default, deserialize_with = "deserialize_values")]
    pub values: BTreeMap<String, Option<f64>>,
    #[serde(default)]
    pub summary: String,
    #[serde(default)]
    pub concerns: Vec<String>,
    #[serde(default)]
    pub usage: Option<TokenSnapshot>,
}

impl RaterOutput {
    pub fn new(rater: impl Into<RaterKey>) -> Self {
        Self {
            rater: rater.into(),
            round: None,
            values: BTreeMap::new(),
            summary: String::new(),
            concerns: Vec::new(),
            usage: None,
        }
    }

    pub fn with_value(mut self, dimension: &str, value: f64) -> Self {
        self.values.insert(dimension.to_string(), Some(value));
        self
    }

    pub fn abstain(mut self, dimension: &str) -> Self {
        self.values.insert(dimension.to_string(), None);
        self
    }

    pub fn in_round(mut self, round: u32) -> Self {
        self.round = Some(round);
        self
    }

    pub fn with_usage(mut self, usage: TokenSnapshot) -> Self {
        self.usage = Some(usage);
        self
    }

    pub fn with_summary(mut self, summary: impl Into<String>) -> Self {
        self.summary = summary.into();
        self
    }

    /// Value for `dimension`; `None` when abstained or not reported.
    pub fn value(&self, dimension: &str) -> Option<f64> {
        self.values.get(dimension).copied().flatten()
    }
}
