//! Tally Core Library
//!
//! Weighted multi-rater consensus for evaluations produced by several
//! independent raters over several rounds.
//!
//! An [`Evaluator`] takes the raw rater outputs for one subject and returns
//! the per-dimension consensus, how it evolved round by round, how much the
//! raters agreed, and the derived values. [`Evaluator::evaluate_and_record`]
//! also appends the result to the subject's history through a
//! [`HistoryLedger`].

pub mod batch;
pub mod config;
pub mod consensus;
pub mod convergence;
pub mod derived;
pub mod domain;
pub mod evaluation;
pub mod evolution;
pub mod history_stats;
pub mod metrics;
pub mod obs;
pub mod telemetry;
pub mod weights;

pub use batch::{evaluate_batch, BatchConfig, BatchItemResult};
pub use config::{TallyConfig, DEFAULT_HISTORY_DIR};
pub use consensus::{
    round_for, weighted_consensus, ConsensusEntry, ConsensusMethod, Contribution,
};
pub use convergence::{convergence_score, population_std_dev, ConvergenceConfig};
pub use derived::{compose, compose_all, DerivedMetric, DerivedValue};
pub use domain::{
    Dimension, DimensionSet, Polarity, RaterKey, RaterOutput, Result, TallyError, ValueKind,
};
pub use evaluation::{EvaluationInput, EvaluationOutcome, Evaluator, RecordedEvaluation};
pub use evolution::{
    assign_rounds, evolve_rounds, group_by_round, infer_rounds_by_occurrence, track_evolution,
    EvolutionReport, MetricEvolutionSeries, RoundAssignment, RoundGroups, RoundSource,
    DEFAULT_CHANGE_THRESHOLD,
};
pub use history_stats::{fill_defaults, DimensionStats, HistoryStats, Trend};
pub use weights::{
    code_change_profiles, RaterProfile, Weight, WeightRegistry, WeightViolation,
    DEFAULT_WEIGHT_TOLERANCE,
};

pub use tally_ledger::{
    EvaluationSnapshot, FsHistoryStore, HistoryDocument, HistoryEntry, HistoryLedger,
    HistoryStore, LedgerError, TokenSnapshot,
};

/// Crate version, as recorded in the workspace manifest.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
