//! Temporary workspace allocation, release and orphan recovery.
//!
//! Every workspace lives directly under the temp root and its directory name
//! starts with a fixed prefix. That naming convention is what makes
//! [`WorkspaceManager::sweep_orphans`] possible: after a crash, anything
//! under the root carrying the prefix is known to be abandoned.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::error::WorkspaceError;

/// Default directory-name prefix for workspaces.
pub const DEFAULT_WORKSPACE_PREFIX: &str = "docs-forge-";

/// Longest request-id fragment embedded in a directory name.
const MAX_ID_FRAGMENT: usize = 64;

/// An allocated workspace directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Workspace {
    /// Absolute path of the directory.
    pub path: PathBuf,
    /// Request that owns the workspace.
    pub owner: String,
    /// Allocation time.
    pub created_at: DateTime<Utc>,
}

impl Workspace {
    /// Path of a child inside the workspace.
    pub fn join(&self, child: impl AsRef<Path>) -> PathBuf {
        self.path.join(child)
    }
}

/// Exclusive ownership of a live [`Workspace`].
///
/// [`WorkspaceLease::release`] consumes the lease, so a workspace can be
/// released at most once. A lease dropped without being released (panic,
/// cancelled future) removes its directory synchronously in `Drop`.
#[derive(Debug)]
pub struct WorkspaceLease {
    workspace: Workspace,
    released: bool,
}

impl WorkspaceLease {
    fn new(workspace: Workspace) -> Self {
        Self {
            workspace,
            released: false,
        }
    }

    /// The leased workspace.
    pub fn workspace(&self) -> &Workspace {
        &self.workspace
    }

    /// Path of the leased workspace.
    pub fn path(&self) -> &Path {
        &self.workspace.path
    }

    /// Recursively removes the workspace directory.
    ///
    /// Removal errors are logged, never returned: cleanup must not mask the
    /// pipeline's own outcome. A directory that is already gone is fine.
    pub async fn release(mut self) {
        let path = self.workspace.path.clone();
        match tokio::fs::remove_dir_all(&path).await {
            Ok(()) => debug!(path = %path.display(), owner = %self.workspace.owner, "Released workspace"),
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!(path = %path.display(), "Workspace already removed")
            }
            Err(e) => warn!(
                path = %path.display(),
                owner = %self.workspace.owner,
                error = %e,
                "Failed to remove workspace"
            ),
        }
        self.released = true;
    }
}

impl Drop for WorkspaceLease {
    fn drop(&mut self) {
        if self.released {
            return;
        }
        warn!(
            path = %self.workspace.path.display(),
            owner = %self.workspace.owner,
            "Workspace lease dropped without release; removing directory"
        );
        if let Err(e) = std::fs::remove_dir_all(&self.workspace.path) {
            if e.kind() != ErrorKind::NotFound {
                warn!(path = %self.workspace.path.display(), error = %e, "Failed to remove workspace");
            }
        }
    }
}

/// Outcome of an orphan sweep.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SweepReport {
    /// Entries removed.
    pub removed: Vec<PathBuf>,
    /// Entries that could not be removed.
    pub failed: Vec<PathBuf>,
}

impl SweepReport {
    /// Number of removed entries.
    pub fn removed_count(&self) -> usize {
        self.removed.len()
    }

    /// Number of entries that could not be removed.
    pub fn failed_count(&self) -> usize {
        self.failed.len()
    }
}

/// Allocates and destroys per-request workspaces under a temp root.
#[derive(Debug, Clone)]
pub struct WorkspaceManager {
    temp_root: PathBuf,
    prefix: String,
}

impl WorkspaceManager {
    /// Creates a manager rooted at `temp_root` using `prefix` for names.
    pub fn new(temp_root: impl Into<PathBuf>, prefix: impl Into<String>) -> Self {
        Self {
            temp_root: temp_root.into(),
            prefix: prefix.into(),
        }
    }

    /// Creates a manager under the system temp directory with the default prefix.
    pub fn with_defaults() -> Self {
        Self::new(std::env::temp_dir(), DEFAULT_WORKSPACE_PREFIX)
    }

    /// The temp root.
    pub fn temp_root(&self) -> &Path {
        &self.temp_root
    }

    /// The directory-name prefix.
    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Creates a fresh, uniquely named workspace for `request_id`.
    ///
    /// The name is `<prefix><request id>-<random suffix>`; the suffix comes
    /// from `tempfile`, which retries on collision, so concurrent calls with
    /// the same request id still get distinct directories.
    pub fn acquire(&self, request_id: &str) -> Result<WorkspaceLease, WorkspaceError> {
        let create_err = |source| WorkspaceError::Create {
            root: self.temp_root.clone(),
            source,
        };

        std::fs::create_dir_all(&self.temp_root).map_err(create_err)?;
        let root = std::path::absolute(&self.temp_root).map_err(create_err)?;

        let name_prefix = format!("{}{}-", self.prefix, sanitize_id(request_id));
        let path = tempfile::Builder::new()
            .prefix(&name_prefix)
            .tempdir_in(&root)
            .map_err(create_err)?
            .keep();

        info!(path = %path.display(), request_id = %request_id, "Acquired workspace");

        Ok(WorkspaceLease::new(Workspace {
            path,
            owner: request_id.to_string(),
            created_at: Utc::now(),
        }))
    }

    /// Releases a workspace. See [`WorkspaceLease::release`].
    pub async fn release(&self, lease: WorkspaceLease) {
        lease.release().await;
    }

    /// Removes every entry under the temp root whose name carries the prefix.
    ///
    /// Meant to run once at process startup, before any request is accepted:
    /// at that point every prefixed entry belongs to a previous process.
    /// Individual failures are logged and reported, never fatal.
    pub async fn sweep_orphans(&self) -> Result<SweepReport, WorkspaceError> {
        let mut report = SweepReport::default();

        let mut entries = match tokio::fs::read_dir(&self.temp_root).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!(root = %self.temp_root.display(), "Temp root missing; nothing to sweep");
                return Ok(report);
            }
            Err(e) => {
                return Err(WorkspaceError::ListRoot {
                    root: self.temp_root.clone(),
                    source: e,
                })
            }
        };

        while let Some(entry) = listing_entry(entries.next_entry().await, &self.temp_root) {
            if !entry.file_name().to_string_lossy().starts_with(&self.prefix) {
                continue;
            }

            let path = entry.path();
            let is_dir = entry
                .file_type()
                .await
                .map(|t| t.is_dir())
                .unwrap_or(false);
            let removal = if is_dir {
                tokio::fs::remove_dir_all(&path).await
            } else {
                tokio::fs::remove_file(&path).await
            };

            match removal {
                Ok(()) => {
                    debug!(path = %path.display(), "Removed orphaned workspace");
                    report.removed.push(path);
                }
                Err(e) if e.kind() == ErrorKind::NotFound => {}
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "Failed to remove orphaned workspace");
                    report.failed.push(path);
                }
            }
        }

        info!(
            root = %self.temp_root.display(),
            removed = report.removed_count(),
            failed = report.failed_count(),
            "Orphan sweep finished"
        );

        Ok(report)
    }
}

impl Default for WorkspaceManager {
    fn default() -> Self {
        Self::with_defaults()
    }
}

/// Unwraps one step of a directory listing. A read error ends the listing:
/// it can repeat on every retry.
fn listing_entry<T>(next: std::io::Result<Option<T>>, root: &Path) -> Option<T> {
    match next {
        Ok(entry) => entry,
        Err(e) => {
            warn!(root = %root.display(), error = %e, "Failed to read temp root entry; stopping sweep");
            None
        }
    }
}

/// Reduces an opaque request id to a safe directory-name fragment.
fn sanitize_id(request_id: &str) -> String {
    let cleaned: String = request_id
        .chars()
        .map(|ch| {
            if ch.is_ascii_alphanumeric() || ch == '-' || ch == '_' {
                ch
            } else {
                '_'
            }
        })
        .take(MAX_ID_FRAGMENT)
        .collect();

    if cleaned.is_empty() {
        "request".to_string()
    } else {
        cleaned
    }
}
