//! Append-only history ledger on top of a [`HistoryStore`].

use std::sync::Arc;

use tracing::{debug, instrument, warn};

use crate::error::{LedgerError, LedgerResult};
use crate::schema::{EvaluationSnapshot, HistoryDocument, HistoryEntry};
use crate::storage_traits::{validate_subject_id, HistoryStore};

/// Per-subject, append-only sequence of evaluation snapshots.
///
/// `append` is a read-modify-write of the whole subject document and is not
/// atomic across processes: at most one writer per subject at a time.
#[derive(Clone)]
pub struct HistoryLedger {
    store: Arc<dyn HistoryStore>,
}

impl std::fmt::Debug for HistoryLedger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HistoryLedger").finish_non_exhaustive()
    }
}

impl HistoryLedger {
    pub fn new(store: Arc<dyn HistoryStore>) -> Self {
        Self { store }
    }

    /// Read the subject's document, treating anything unreadable as empty.
    async fn read_document(&self, subject_id: &str) -> HistoryDocument {
        match self.store.load(subject_id).await {
            Ok(Some(document)) => document,
            Ok(None) => HistoryDocument::empty(subject_id),
            Err(e) => {
                warn!(
                    event = "history.unreadable",
                    subject_id = %subject_id,
                    error = %e,
                    "treating unreadable history as empty"
                );
                HistoryDocument::empty(subject_id)
            }
        }
    }

    /// All entries for `subject_id`, oldest first. Never fails.
    pub async fn entries(&self, subject_id: &str) -> Vec<HistoryEntry> {
        self.read_document(subject_id).await.entries
    }

    /// Most recent entry, if any.
    pub async fn latest(&self, subject_id: &str) -> Option<HistoryEntry> {
        self.entries(subject_id).await.pop()
    }

    /// Append `snapshot` as the next evaluation of `subject_id`.
    ///
    /// The new entry's `evaluation_number` is the prior length + 1. Existing
    /// entries are written back untouched. A failed write is returned to the
    /// caller: the evaluation's durable record is then incomplete. A snapshot
    /// with a NaN or infinite float is rejected before anything is read or
    /// written, since the stored document could not be loaded again.
    #[instrument(skip(self, snapshot), fields(subject_id = %subject_id))]
    pub async fn append(
        &self,
        subject_id: &str,
        snapshot: EvaluationSnapshot,
    ) -> LedgerResult<HistoryEntry> {
        validate_subject_id(subject_id)?;
        if let Some(field) = snapshot.non_finite_field() {
            return Err(LedgerError::NonFinite {
                subject_id: subject_id.to_string(),
                field,
            });
        }

        let mut document = self.read_document(subject_id).await;
        let evaluation_number = u32::try_from(document.len())
            .unwrap_or(u32::MAX - 1)
            .saturating_add(1);
        let entry = HistoryEntry::from_snapshot(evaluation_number, snapshot);
        document.entries.push(entry.clone());

        self.store.save(&document).await?;
        debug!(evaluation_number, total = document.len(), "history entry appended");
        Ok(entry)
    }
}
