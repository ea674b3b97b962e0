//! Storage trait definitions for Tally history
//!
//! `HistoryStore` is the only persistence seam: it loads and saves one
//! [`HistoryDocument`] per subject. It knows nothing about numbering or
//! append semantics; those live in [`crate::HistoryLedger`].
//!
//! Implementations are async and backend-agnostic. An in-memory fake is
//! provided for testing via the `fakes` module.

use async_trait::async_trait;
use sha2::{Digest, Sha256};

use crate::error::{LedgerError, LedgerResult};
use crate::schema::HistoryDocument;

/// Durable per-subject history storage.
///
/// A store does not serialize concurrent writers. Callers that may evaluate
/// the same subject twice at once must order those writes themselves.
#[async_trait]
pub trait HistoryStore: Send + Sync {
    /// Load the stored document for `subject_id`.
    ///
    /// Returns `Ok(None)` when nothing has been stored yet and
    /// `Err(LedgerError::Corrupt)` when something is stored but cannot be decoded.
    async fn load(&self, subject_id: &str) -> LedgerResult<Option<HistoryDocument>>;

    /// Replace the stored document for `document.subject_id`.
    async fn save(&self, document: &HistoryDocument) -> LedgerResult<()>;
}

/// Reject empty or whitespace-only subject identifiers.
pub fn validate_subject_id(subject_id: &str) -> LedgerResult<()> {
    if subject_id.trim().is_empty() {
        return Err(LedgerError::InvalidSubjectId(subject_id.to_string()));
    }
    Ok(())
}

/// Stable SHA-256 hex key for a subject id, safe to use as a file name.
pub fn subject_key(subject_id: &str) -> String {
    hex::encode(Sha256::digest(subject_id.as_bytes()))
}
