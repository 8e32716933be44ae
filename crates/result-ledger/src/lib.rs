//! Persisted ledger of healing attempts.
//!
//! A single JSON array file under the project's scratch directory. Appends
//! are read-modify-write against the full sequence (no log format), durable
//! per call. Concurrent writers are not supported: two workers appending
//! near-simultaneously can lose an update. The ledger is advisory, so this
//! is accepted; a redesign for parallel workers would switch to one JSON
//! record per line or a lock-protected write.

use std::io;
use std::path::{Path, PathBuf};

use healer_core_types::LedgerEntry;
use thiserror::Error;
use tracing::{debug, warn};

/// Scratch location of the ledger file, relative to the project root.
pub const LEDGER_DIR: &str = ".selector-healer/temp";
pub const LEDGER_FILE: &str = "healing-results.json";

#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("ledger io failed: {0}")]
    Io(#[from] io::Error),

    #[error("ledger serialization failed: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Append-style record of every healing attempt in a run.
#[derive(Clone, Debug)]
pub struct ResultLedger {
    path: PathBuf,
}

impl ResultLedger {
    /// Ledger at the standard scratch path under `project_root`.
    pub fn new(project_root: impl AsRef<Path>) -> Self {
        Self {
            path: project_root.as_ref().join(LEDGER_DIR).join(LEDGER_FILE),
        }
    }

    /// Ledger at an explicit file path.
    pub fn at_path(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append one entry: load the existing sequence, push, rewrite. A
    /// missing or unreadable file starts a fresh sequence rather than
    /// failing the append.
    pub async fn append(&self, entry: LedgerEntry) -> Result<(), LedgerError> {
        let mut entries = self.read_tolerant().await;
        entries.push(entry);

        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let payload = serde_json::to_vec_pretty(&entries)?;
        let tmp = self.path.with_extension("tmp");
        tokio::fs::write(&tmp, &payload).await?;
        tokio::fs::rename(&tmp, &self.path).await?;
        debug!(path = %self.path.display(), total = entries.len(), "ledger entry appended");
        Ok(())
    }

    /// Read the full sequence. A missing file is an empty ledger.
    pub async fn read_all(&self) -> Result<Vec<LedgerEntry>, LedgerError> {
        match tokio::fs::read(&self.path).await {
            Ok(bytes) => Ok(serde_json::from_slice(&bytes)?),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(Vec::new()),
            Err(err) => Err(err.into()),
        }
    }

    /// Read the full sequence, then remove the file so the next run starts
    /// clean. Used once per run by reporting.
    pub async fn consume(&self) -> Result<Vec<LedgerEntry>, LedgerError> {
        let entries = self.read_all().await?;
        match tokio::fs::remove_file(&self.path).await {
            Ok(()) => {}
            Err(err) if err.kind() == io::ErrorKind::NotFound => {}
            Err(err) => return Err(err.into()),
        }
        Ok(entries)
    }

    async fn read_tolerant(&self) -> Vec<LedgerEntry> {
        match tokio::fs::read(&self.path).await {
            Ok(bytes) => match serde_json::from_slice(&bytes) {
                Ok(entries) => entries,
                Err(err) => {
                    warn!(%err, path = %self.path.display(), "ledger file corrupt; starting fresh");
                    Vec::new()
                }
            },
            Err(err) if err.kind() == io::ErrorKind::NotFound => Vec::new(),
            Err(err) => {
                warn!(%err, path = %self.path.display(), "ledger file unreadable; starting fresh");
                Vec::new()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use healer_core_types::{HealStatus, HealingOutcome};

    fn entry(selector: &str, status: HealStatus) -> LedgerEntry {
        let outcome = match status {
            HealStatus::Healed => HealingOutcome::healed(selector, "#fixed"),
            HealStatus::Failed => HealingOutcome::failed(selector, "no dice"),
        };
        LedgerEntry::from_outcome(&outcome, status, "auto-detected", 0)
    }

    #[tokio::test]
    async fn test_append_then_read_all() {
        let dir = tempfile::tempdir().unwrap();
        let ledger = ResultLedger::new(dir.path());

        ledger
            .append(entry("#a", HealStatus::Healed))
            .await
            .unwrap();
        ledger
            .append(entry("#b", HealStatus::Failed))
            .await
            .unwrap();

        let entries = ledger.read_all().await.unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].original_selector, "#a");
        assert_eq!(entries[1].original_selector, "#b");
        assert_eq!(entries[1].status, HealStatus::Failed);
    }

    #[tokio::test]
    async fn test_read_all_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let ledger = ResultLedger::new(dir.path());
        ledger
            .append(entry("#a", HealStatus::Healed))
            .await
            .unwrap();

        let first = ledger.read_all().await.unwrap();
        let second = ledger.read_all().await.unwrap();
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn test_read_missing_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let ledger = ResultLedger::new(dir.path());
        assert!(ledger.read_all().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_consume_clears_file() {
        let dir = tempfile::tempdir().unwrap();
        let ledger = ResultLedger::new(dir.path());
        ledger
            .append(entry("#a", HealStatus::Healed))
            .await
            .unwrap();

        let consumed = ledger.consume().await.unwrap();
        assert_eq!(consumed.len(), 1);
        assert!(ledger.read_all().await.unwrap().is_empty());

        // Consuming an already-clean ledger is fine.
        assert!(ledger.consume().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_append_recovers_from_corrupt_file() {
        let dir = tempfile::tempdir().unwrap();
        let ledger = ResultLedger::new(dir.path());
        std::fs::create_dir_all(ledger.path().parent().unwrap()).unwrap();
        std::fs::write(ledger.path(), b"{ not json").unwrap();

        ledger
            .append(entry("#a", HealStatus::Healed))
            .await
            .unwrap();
        let entries = ledger.read_all().await.unwrap();
        assert_eq!(entries.len(), 1);
    }
}
