//! Error types for tally-ledger

use thiserror::Error;

/// Errors that can occur in the history persistence layer
#[derive(Error, Debug)]
pub enum LedgerError {
    /// Subject identifiers must be non-empty after trimming
    #[error("Invalid subject id: {0:?}")]
    InvalidSubjectId(String),

    /// Stored document exists but cannot be decoded
    #[error("History for {subject_id} is unreadable: {reason}")]
    Corrupt { subject_id: String, reason: String },

    /// Snapshot holds a float JSON cannot represent (NaN or infinite)
    #[error("History entry for {subject_id} has a non-finite {field}")]
    NonFinite { subject_id: String, field: String },

    /// Updated history could not be persisted
    #[error("History write failed for {subject_id}: {reason}")]
    WriteFailed { subject_id: String, reason: String },

    /// Serialization error
    #[error("Serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Filesystem error
    #[error("I/O failed: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for ledger operations
pub type LedgerResult<T> = std::result::Result<T, LedgerError>;
