//! Build stages as data.
//!
//! The external build is a fixed, ordered list of [`BuildStage`] values. Each
//! one describes a single installer or builder invocation; the orchestrator
//! runs them all through the same code path.

use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::execution::{CommandSpec, DEFAULT_MAX_OUTPUT_BYTES};

/// Dependency install from the project's lockfile.
pub const STAGE_INSTALL: &str = "install";

/// Install of the pinned design-system and theme packages.
pub const STAGE_INSTALL_EXTRAS: &str = "install-extras";

/// Site compilation.
pub const STAGE_COMPILE: &str = "compile";

/// Default timeout for the dependency install (10 minutes).
pub const DEFAULT_INSTALL_TIMEOUT: Duration = Duration::from_secs(600);

/// Default timeout for the extras install (10 minutes).
pub const DEFAULT_EXTRAS_TIMEOUT: Duration = Duration::from_secs(600);

/// Default timeout for the site build (20 minutes).
pub const DEFAULT_COMPILE_TIMEOUT: Duration = Duration::from_secs(1200);

/// Directory the site builder writes to, relative to the project.
pub const DEFAULT_OUTPUT_DIR: &str = "build";

/// A package pinned to an exact version, installed on top of the lockfile.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtraPackage {
    pub name: String,
    pub version: String,
}

impl ExtraPackage {
    pub fn new(name: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
        }
    }
}

impl fmt::Display for ExtraPackage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.name, self.version)
    }
}

/// Settings shared by all build stages.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildConfig {
    /// Package manager executable.
    pub npm_program: String,
    /// Shared package cache. Relative paths resolve against the process
    /// working directory, not the project.
    pub cache_dir: PathBuf,
    pub install_timeout: Duration,
    pub extras_timeout: Duration,
    pub compile_timeout: Duration,
    /// Build output directory, relative to the project.
    pub output_dir: PathBuf,
    /// Per-stream capture ceiling.
    pub max_output_bytes: usize,
}

impl Default for BuildConfig {
    fn default() -> Self {
        Self {
            npm_program: "npm".to_string(),
            cache_dir: PathBuf::from("./.npm-cache"),
            install_timeout: DEFAULT_INSTALL_TIMEOUT,
            extras_timeout: DEFAULT_EXTRAS_TIMEOUT,
            compile_timeout: DEFAULT_COMPILE_TIMEOUT,
            output_dir: PathBuf::from(DEFAULT_OUTPUT_DIR),
            max_output_bytes: DEFAULT_MAX_OUTPUT_BYTES,
        }
    }
}

impl BuildConfig {
    /// Cache directory as an absolute path.
    ///
    /// Stages run inside the project directory, so a relative cache path
    /// would otherwise land in every workspace.
    pub fn resolved_cache_dir(&self) -> PathBuf {
        std::path::absolute(&self.cache_dir).unwrap_or_else(|_| self.cache_dir.clone())
    }

    /// Lays out the standard stage list.
    ///
    /// The extras stage is omitted when there is nothing to install.
    pub fn stages(&self, extras: &[ExtraPackage]) -> Vec<BuildStage> {
        let cache = self.resolved_cache_dir().to_string_lossy().into_owned();
        let mut stages = Vec::with_capacity(3);

        stages.push(BuildStage::new(
            STAGE_INSTALL,
            &self.npm_program,
            [
                "ci",
                "--prefer-offline",
                "--no-audit",
                "--no-fund",
                "--cache",
                cache.as_str(),
            ],
            self.install_timeout,
        ));

        if !extras.is_empty() {
            let mut args: Vec<String> = [
                "install",
                "--no-save",
                "--prefer-offline",
                "--no-audit",
                "--no-fund",
                "--cache",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect();
            args.push(cache.clone());
            args.extend(extras.iter().map(ToString::to_string));

            stages.push(BuildStage::new(
                STAGE_INSTALL_EXTRAS,
                &self.npm_program,
                args,
                self.extras_timeout,
            ));
        }

        stages.push(BuildStage::new(
            STAGE_COMPILE,
            &self.npm_program,
            ["run", "build"],
            self.compile_timeout,
        ));

        stages
    }
}

/// One external build step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildStage {
    pub name: String,
    pub program: String,
    pub args: Vec<String>,
    pub timeout: Duration,
}

impl BuildStage {
    pub fn new<I, S>(
        name: impl Into<String>,
        program: impl Into<String>,
        args: I,
        timeout: Duration,
    ) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            name: name.into(),
            program: program.into(),
            args: args.into_iter().map(Into::into).collect(),
            timeout,
        }
    }

    /// Command spec for running this stage inside `project_dir`.
    pub fn command(&self, project_dir: &Path, max_output_bytes: usize) -> CommandSpec {
        CommandSpec::new(&self.program)
            .args(self.args.iter().cloned())
            .current_dir(project_dir)
            .with_timeout(self.timeout)
            .with_max_output_bytes(max_output_bytes)
    }
}

/// Output of a successful stage. Logged, not persisted.
#[derive(Debug, Clone)]
pub struct BuildStageResult {
    pub stage_name: String,
    pub stdout: String,
    pub stderr: String,
    pub duration: Duration,
}
