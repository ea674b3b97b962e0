use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::Utc;
use tempfile::NamedTempFile;
use tracing::warn;

use crate::error::{LedgerError, LedgerResult};
use crate::schema::HistoryDocument;
use crate::storage_traits::{subject_key, validate_subject_id, HistoryStore};

/// Filesystem-backed history store with git-style 2-char sharding.
///
/// Layout: `<root>/<first 2 hex chars>/<sha256(subject_id) hex>.json`
///
/// A document that exists but cannot be loaded is renamed to
/// `<sha256>.json.unreadable-<timestamp>` before the error is returned, so
/// the next save starts a fresh document without destroying the old bytes.
#[derive(Debug, Clone)]
pub struct FsHistoryStore {
    root: PathBuf,
}

impl FsHistoryStore {
    /// Create a store rooted at `root`, creating the directory if needed.
    pub fn new(root: impl AsRef<Path>) -> LedgerResult<Self> {
        let root = root.as_ref().to_path_buf();
        fs::create_dir_all(&root)?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Path of the document holding `subject_id`'s history.
    pub fn document_path(&self, subject_id: &str) -> PathBuf {
        let key = subject_key(subject_id);
        self.root.join(&key[..2]).join(format!("{key}.json"))
    }
}

fn read_document(path: &Path, subject_id: &str) -> LedgerResult<Option<HistoryDocument>> {
    let bytes = match fs::read(path) {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(LedgerError::Io(e)),
    };

    let document: HistoryDocument =
        serde_json::from_slice(&bytes).map_err(|e| LedgerError::Corrupt {
            subject_id: subject_id.to_string(),
            reason: e.to_string(),
        })?;

    if document.subject_id != subject_id {
        return Err(LedgerError::Corrupt {
            subject_id: subject_id.to_string(),
            reason: format!("document belongs to {:?}", document.subject_id),
        });
    }
    Ok(Some(document))
}

/// Move an unreadable document out of the way, keeping its bytes.
fn quarantine(path: &Path) -> std::io::Result<PathBuf> {
    let stamp = Utc::now().format("%Y%m%dT%H%M%S%.3fZ");
    let mut name = path
        .file_name()
        .ok_or_else(|| std::io::Error::other("document path has no file name"))?
        .to_os_string();
    name.push(format!(".unreadable-{stamp}"));
    let target = path.with_file_name(name);
    fs::rename(path, &target)?;
    Ok(target)
}

fn load_document(path: &Path, subject_id: &str) -> LedgerResult<Option<HistoryDocument>> {
    let err = match read_document(path, subject_id) {
        Ok(document) => return Ok(document),
        Err(e) => e,
    };
    match quarantine(path) {
        Ok(moved) => warn!(
            subject_id = %subject_id,
            moved_to = %moved.display(),
            "unreadable history document moved aside"
        ),
        Err(e) => warn!(
            subject_id = %subject_id,
            error = %e,
            "could not move unreadable history document aside"
        ),
    }
    Err(err)
}

fn write_document(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    let shard_dir = path
        .parent()
        .ok_or_else(|| std::io::Error::other("document path has no parent"))?;
    fs::create_dir_all(shard_dir)?;

    // Atomic write: temp file in the same directory, then rename over the old document.
    let mut tmp = NamedTempFile::new_in(shard_dir)?;
    tmp.write_all(bytes)?;
    tmp.as_file().sync_all()?;
    tmp.persist(path).map_err(|e| e.error)?;
    Ok(())
}

#[async_trait]
impl HistoryStore for FsHistoryStore {
    async fn load(&self, subject_id: &str) -> LedgerResult<Option<HistoryDocument>> {
        validate_subject_id(subject_id)?;
        let path = self.document_path(subject_id);
        let subject = subject_id.to_string();

        tokio::task::spawn_blocking(move || load_document(&path, &subject))
            .await
            .map_err(|e| LedgerError::Io(std::io::Error::other(e.to_string())))?
    }

    async fn save(&self, document: &HistoryDocument) -> LedgerResult<()> {
        validate_subject_id(&document.subject_id)?;
        let path = self.document_path(&document.subject_id);
        let bytes = serde_json::to_vec_pretty(document)?;

        let written = tokio::task::spawn_blocking(move || write_document(&path, &bytes))
            .await
            .map_err(|e| std::io::Error::other(e.to_string()))
            .and_then(|r| r);

        written.map_err(|e| LedgerError::WriteFailed {
            subject_id: document.subject_id.clone(),
            reason: e.to_string(),
        })
    }
}
