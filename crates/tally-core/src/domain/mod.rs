//! Domain models for Tally.
//!
//! Canonical definitions for the core entities:
//! - `Dimension` / `DimensionSet`: what gets scored
//! - `RaterKey` / `RaterOutput`: who scored it and what they said

pub mod dimension;
pub mod error;
pub mod rater;

// Re-export main types and errors
pub use dimension::{Dimension, DimensionSet, Polarity, ValueKind};
pub use error::{Result, TallyError};
pub use rater::{normalize_name, parse_metric_value, RaterKey, RaterOutput};
