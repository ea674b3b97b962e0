//! Persisted history record format.
//!
//! One [`HistoryDocument`] per subject holds every evaluation snapshot in
//! append order. All fields added after the first schema version carry
//! `#[serde(default)]` so older documents keep loading.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Current on-disk schema version.
pub const HISTORY_SCHEMA_VERSION: u32 = 1;

/// Token volume and cost spent producing one evaluation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct TokenSnapshot {
    #[serde(default)]
    pub input_tokens: u64,
    #[serde(default)]
    pub output_tokens: u64,
    #[serde(default)]
    pub total_cost_usd: f64,
}

impl TokenSnapshot {
    pub fn new(input_tokens: u64, output_tokens: u64, total_cost_usd: f64) -> Self {
        Self {
            input_tokens,
            output_tokens,
            total_cost_usd,
        }
    }

    pub fn total_tokens(&self) -> u64 {
        self.input_tokens.saturating_add(self.output_tokens)
    }

    /// Sum two snapshots (used when aggregating per-rater usage).
    pub fn combine(self, other: TokenSnapshot) -> TokenSnapshot {
        TokenSnapshot {
            input_tokens: self.input_tokens.saturating_add(other.input_tokens),
            output_tokens: self.output_tokens.saturating_add(other.output_tokens),
            total_cost_usd: self.total_cost_usd + other.total_cost_usd,
        }
    }
}

/// What the caller hands to [`crate::HistoryLedger::append`].
///
/// The ledger assigns the entry id and evaluation number.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationSnapshot {
    /// Free-form label of what produced the evaluation (e.g. "commit", "pull-request").
    pub source: String,
    /// Consensus per dimension; `None` when every rater abstained.
    pub consensus: BTreeMap<String, Option<f64>>,
    pub tokens: TokenSnapshot,
    pub convergence_score: f64,
    pub rounds: u32,
    pub rater_count: usize,
    pub recorded_at: DateTime<Utc>,
}

impl EvaluationSnapshot {
    /// First float field that would not survive a JSON round trip.
    ///
    /// `serde_json` writes NaN and infinities as `null`, which an `f64`
    /// field then refuses to read back.
    pub fn non_finite_field(&self) -> Option<String> {
        if !self.tokens.total_cost_usd.is_finite() {
            return Some("tokens.total_cost_usd".to_string());
        }
        if !self.convergence_score.is_finite() {
            return Some("convergence_score".to_string());
        }
        self.consensus
            .iter()
            .find(|(_, v)| v.is_some_and(|v| !v.is_finite()))
            .map(|(dimension, _)| format!("consensus.{dimension}"))
    }
}

/// One immutable evaluation snapshot for a subject.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub entry_id: Uuid,
    /// 1-based position in the subject's history.
    pub evaluation_number: u32,
    pub recorded_at: DateTime<Utc>,
    #[serde(default)]
    pub source: String,
    #[serde(default)]
    pub consensus: BTreeMap<String, Option<f64>>,
    #[serde(default)]
    pub tokens: TokenSnapshot,
    #[serde(default)]
    pub convergence_score: f64,
    #[serde(default)]
    pub rounds: u32,
    #[serde(default)]
    pub rater_count: usize,
}

impl HistoryEntry {
    pub(crate) fn from_snapshot(evaluation_number: u32, snapshot: EvaluationSnapshot) -> Self {
        Self {
            entry_id: Uuid::new_v4(),
            evaluation_number,
            recorded_at: snapshot.recorded_at,
            source: snapshot.source,
            consensus: snapshot.consensus,
            tokens: snapshot.tokens,
            convergence_score: snapshot.convergence_score,
            rounds: snapshot.rounds,
            rater_count: snapshot.rater_count,
        }
    }

    /// Stored consensus for `dimension`; `None` when absent or abstained.
    pub fn value(&self, dimension: &str) -> Option<f64> {
        self.consensus.get(dimension).copied().flatten()
    }
}

/// Full per-subject history document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryDocument {
    #[serde(default = "default_schema_version")]
    pub schema_version: u32,
    pub subject_id: String,
    #[serde(default)]
    pub entries: Vec<HistoryEntry>,
}

fn default_schema_version() -> u32 {
    HISTORY_SCHEMA_VERSION
}

impl HistoryDocument {
    pub fn empty(subject_id: impl Into<String>) -> Self {
        Self {
            schema_version: HISTORY_SCHEMA_VERSION,
            subject_id: subject_id.into(),
            entries: Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
