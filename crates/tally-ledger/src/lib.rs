//! Tally-Ledger: evaluation history persistence for Tally
//!
//! This crate keeps the durable, append-only record of every evaluation a
//! subject has been through, one document per subject.
//!
//! ## Layer 0 - Data/Persistence
//!
//! Focus: never losing or rewriting a past evaluation, and tolerating
//! unreadable history by starting over instead of failing.
//!
//! ## Key Components
//!
//! - `HistoryLedger`: append / entries / latest over any store
//! - `HistoryStore`: backend seam (`FsHistoryStore` on disk, `MemoryHistoryStore` for tests)
//! - `HistoryEntry` / `HistoryDocument`: the persisted schema

mod error;
pub mod fakes;
mod fs_store;
mod ledger;
mod schema;
pub mod storage_traits;

pub use error::{LedgerError, LedgerResult};
pub use fs_store::FsHistoryStore;
pub use ledger::HistoryLedger;
pub use schema::{
    EvaluationSnapshot, HistoryDocument, HistoryEntry, TokenSnapshot, HISTORY_SCHEMA_VERSION,
};
pub use storage_traits::{subject_key, validate_subject_id, HistoryStore};
