//! Per-request workspace management.
//!
//! Each pipeline run gets its own scratch directory under a shared temp
//! root. Workspaces are handed out as [`WorkspaceLease`] values that are
//! released exactly once, and anything a crashed process left behind is
//! removed by [`WorkspaceManager::sweep_orphans`] at the next startup.
//!
//! # Example
//!
//! ```ignore
//! use docs_forge::workspace::WorkspaceManager;
//!
//! let manager = WorkspaceManager::with_defaults();
//! let report = manager.sweep_orphans().await?;
//!
//! let lease = manager.acquire("req-42")?;
//! std::fs::write(lease.workspace().join("marker"), "x")?;
//! manager.release(lease).await;
//! ```

pub mod manager;

pub use manager::{
    SweepReport, Workspace, WorkspaceLease, WorkspaceManager, DEFAULT_WORKSPACE_PREFIX,
};
