//! Error types for docs-forge operations.
//!
//! Each stage of the documentation pipeline has its own error type:
//! - Request validation
//! - Workspace allocation and cleanup
//! - Template rendering
//! - External build stages
//! - Artifact publishing
//!
//! The coordinator wraps these in [`crate::pipeline::PipelineError`].

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

/// Errors raised while parsing or validating an inbound generation request.
#[derive(Debug, Error)]
pub enum RequestError {
    #[error("Missing required field '{0}'")]
    MissingField(&'static str),

    #[error("Invalid package name '{0}'")]
    InvalidPackageName(String),

    #[error("Invalid version '{version}' for package '{package}': {message}")]
    InvalidVersion {
        package: String,
        version: String,
        message: String,
    },

    #[error("Invalid component name '{0}': only letters, digits, '-' and '_' are allowed")]
    InvalidComponentName(String),

    #[error("Failed to parse request: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Failed to read request file '{path}': {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Errors that can occur while allocating a workspace.
#[derive(Debug, Error)]
pub enum WorkspaceError {
    #[error("Failed to create workspace under '{root}': {source}")]
    Create {
        root: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to list temp root '{root}': {source}")]
    ListRoot {
        root: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Errors that can occur while rendering a template tree.
#[derive(Debug, Error)]
pub enum TemplateError {
    #[error("Template root '{0}' does not exist or is not a directory")]
    MissingRoot(PathBuf),

    #[error("Failed to read '{path}': {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to write '{path}': {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to copy '{from}' to '{to}': {source}")]
    Copy {
        from: PathBuf,
        to: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to compile template '{path}': {message}")]
    Compile { path: PathBuf, message: String },

    #[error("Failed to walk template tree at '{path}': {message}")]
    Walk { path: PathBuf, message: String },

    #[error("Template rendering timed out after {0:?}")]
    Timeout(Duration),

    #[error("Template rendering task failed: {0}")]
    Task(String),
}

/// A failed build stage.
///
/// All three external stages (install, extras install, compile) surface this
/// same error; `diagnostics` carries the captured stdout/stderr of the stage.
#[derive(Debug, Error)]
#[error("Build stage '{stage}' failed: {message}")]
pub struct BuildError {
    /// Name of the stage that failed.
    pub stage: String,
    /// Short description of the failure.
    pub message: String,
    /// Captured subprocess output, possibly empty.
    pub diagnostics: String,
}

impl BuildError {
    /// Creates a build error for the given stage.
    pub fn new(stage: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            stage: stage.into(),
            message: message.into(),
            diagnostics: String::new(),
        }
    }

    /// Attaches captured subprocess output.
    pub fn with_diagnostics(mut self, diagnostics: impl Into<String>) -> Self {
        self.diagnostics = diagnostics.into();
        self
    }
}

/// Errors that can occur while publishing build artifacts.
#[derive(Debug, Error)]
pub enum PublishError {
    #[error("Build output '{0}' does not exist or is not a directory")]
    MissingOutput(PathBuf),

    #[error("Invalid remote key '{0}'")]
    InvalidKey(String),

    #[error("Sync to '{location}' failed: {message}")]
    SyncFailed {
        location: String,
        message: String,
        diagnostics: String,
    },

    #[error("Mirror I/O error at '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Publish timed out after {timeout:?}")]
    Timeout {
        timeout: Duration,
        diagnostics: String,
    },
}

impl PublishError {
    /// Returns captured diagnostic output, if any.
    pub fn diagnostics(&self) -> Option<&str> {
        match self {
            PublishError::SyncFailed { diagnostics, .. }
            | PublishError::Timeout { diagnostics, .. }
                if !diagnostics.is_empty() =>
            {
                Some(diagnostics)
            }
            _ => None,
        }
    }
}
