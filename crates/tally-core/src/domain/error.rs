//! Domain-level error taxonomy for Tally.
//!
//! Aggregation itself never fails: missing data, unknown raters and zero
//! weights are all recoverable and only logged. What reaches this enum is
//! bad configuration and failed persistence.

/// Tally domain errors.
#[derive(Debug, thiserror::Error)]
pub enum TallyError {
    #[error("invalid config: {0}")]
    InvalidConfig(String),

    #[error("unknown dimension: {0}")]
    UnknownDimension(String),

    #[error("ledger error: {0}")]
    Ledger(#[from] tally_ledger::LedgerError),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("batch task for {subject_id} failed: {detail}")]
    BatchTask { subject_id: String, detail: String },
}

/// Result type for Tally domain operations.
pub type Result<T> = std::result::Result<T, TallyError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tally_error_display() {
        let err = TallyError::InvalidConfig("change_threshold must be >= 0".to_string());
        assert!(err.to_string().contains("invalid config"));

        let err = TallyError::UnknownDimension("velocity".to_string());
        assert!(err.to_string().contains("velocity"));
    }

    #[test]
    fn test_ledger_error_converts() {
        let ledger = tally_ledger::LedgerError::WriteFailed {
            subject_id: "pr-1".to_string(),
            reason: "read-only filesystem".to_string(),
        };
        let err: TallyError = ledger.into();
        assert!(err.to_string().contains("ledger error"));
        assert!(err.to_string().contains("pr-1"));
    }

    #[test]
    fn test_batch_task_error() {
        let err = TallyError::BatchTask {
            subject_id: "abc".to_string(),
            detail: "task panicked".to_string(),
        };
        let msg = err.to_string();
        assert!(msg.contains("abc"));
        assert!(msg.contains("task panicked"));
    }
}
