//! Per-selector DOM snapshot persistence.
//!
//! One file per known-healed selector under a project-scoped logs
//! directory, filename derived deterministically from the selector string.
//! Snapshots are saved only after a heal validates, so the store never
//! holds markup for a selector that has never healed successfully.

use std::io;
use std::path::{Path, PathBuf};

use healer_core_types::DomSnapshot;
use thiserror::Error;
use tracing::debug;

/// Directory under the project root where snapshots live.
pub const LOGS_DIR: &str = "healer-logs";

/// Maximum length of the sanitized selector portion of a filename.
const MAX_KEY_LEN: usize = 50;

#[derive(Debug, Error)]
pub enum SnapshotError {
    #[error("snapshot io failed: {0}")]
    Io(#[from] io::Error),
}

/// Filesystem-backed store of last-known-good DOM captures.
#[derive(Clone, Debug)]
pub struct DomSnapshotStore {
    root: PathBuf,
}

impl DomSnapshotStore {
    /// Create a store rooted at `<project_root>/healer-logs`.
    pub fn new(project_root: impl AsRef<Path>) -> Self {
        Self {
            root: project_root.as_ref().join(LOGS_DIR),
        }
    }

    /// Create a store rooted at an explicit directory.
    pub fn at_root(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Persist `snapshot` keyed by `selector`, overwriting any prior
    /// capture for that selector. Write-then-rename so a crashed write
    /// never leaves a half-written snapshot behind.
    pub async fn save(
        &self,
        selector: &str,
        snapshot: &DomSnapshot,
    ) -> Result<PathBuf, SnapshotError> {
        tokio::fs::create_dir_all(&self.root).await?;
        let path = self.snapshot_path(selector);
        let tmp = path.with_extension("tmp");
        tokio::fs::write(&tmp, &snapshot.html).await?;
        tokio::fs::rename(&tmp, &path).await?;
        debug!(selector, path = %path.display(), "saved DOM snapshot");
        Ok(path)
    }

    /// Load the snapshot last saved for `selector`. Returns `None` when no
    /// snapshot was ever saved; that is the expected state for a
    /// selector's first-ever failure, not an error.
    pub async fn load(&self, selector: &str) -> Result<Option<DomSnapshot>, SnapshotError> {
        let path = self.snapshot_path(selector);
        match tokio::fs::read_to_string(&path).await {
            Ok(html) => Ok(Some(DomSnapshot::new(html))),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(err) => Err(err.into()),
        }
    }

    fn snapshot_path(&self, selector: &str) -> PathBuf {
        self.root.join(format!("{}_dom.html", safe_key(selector)))
    }
}

/// Filesystem-safe encoding of a selector: non-alphanumeric characters
/// become `_`, length bounded.
fn safe_key(selector: &str) -> String {
    selector
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .take(MAX_KEY_LEN)
        .collect()
}
