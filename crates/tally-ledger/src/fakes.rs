//! In-memory fakes for storage traits (testing only)
//!
//! `MemoryHistoryStore` satisfies the [`HistoryStore`] contract without
//! touching the filesystem, and can be told to misbehave so callers can
//! exercise the corrupt-read and failed-write paths.

use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

use async_trait::async_trait;

use crate::error::{LedgerError, LedgerResult};
use crate::schema::HistoryDocument;
use crate::storage_traits::{validate_subject_id, HistoryStore};

/// In-memory history store backed by a `HashMap<subject_id, document>`.
#[derive(Debug, Default)]
pub struct MemoryHistoryStore {
    documents: Mutex<HashMap<String, HistoryDocument>>,
    corrupt: Mutex<HashSet<String>>,
    fail_writes: Mutex<bool>,
}

impl MemoryHistoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent `load` of `subject_id` report a corrupt document.
    pub fn mark_corrupt(&self, subject_id: &str) {
        self.corrupt.lock().unwrap().insert(subject_id.to_string());
    }

    /// Make every subsequent `save` fail.
    pub fn fail_writes(&self, fail: bool) {
        *self.fail_writes.lock().unwrap() = fail;
    }

    /// Number of subjects with a stored document.
    pub fn subject_count(&self) -> usize {
        self.documents.lock().unwrap().len()
    }
}

#[async_trait]
impl HistoryStore for MemoryHistoryStore {
    async fn load(&self, subject_id: &str) -> LedgerResult<Option<HistoryDocument>> {
        validate_subject_id(subject_id)?;
        if self.corrupt.lock().unwrap().contains(subject_id) {
            return Err(LedgerError::Corrupt {
                subject_id: subject_id.to_string(),
                reason: "marked corrupt".to_string(),
            });
        }
        Ok(self.documents.lock().unwrap().get(subject_id).cloned())
    }

    async fn save(&self, document: &HistoryDocument) -> LedgerResult<()> {
        validate_subject_id(&document.subject_id)?;
        if *self.fail_writes.lock().unwrap() {
            return Err(LedgerError::WriteFailed {
                subject_id: document.subject_id.clone(),
                reason: "writes disabled".to_string(),
            });
        }
        // A successful write replaces whatever was unreadable before.
        self.corrupt.lock().unwrap().remove(&document.subject_id);
        self.documents
            .lock()
            .unwrap()
            .insert(document.subject_id.clone(), document.clone());
        Ok(())
    }
}
