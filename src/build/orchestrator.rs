//! Runs the external build stages for a rendered project.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use tracing::{debug, error, info, instrument};

use super::stage::{BuildConfig, BuildStage, BuildStageResult, ExtraPackage, STAGE_COMPILE};
use crate::error::BuildError;
use crate::execution::{CommandError, CommandRunner};
use crate::metrics::MetricsCollector;

/// Drives install, extras install and compile against a project directory.
///
/// Stages are fail-fast: the first failing stage aborts the build and no
/// later stage is started.
pub struct BuildOrchestrator {
    config: BuildConfig,
    runner: Arc<dyn CommandRunner>,
    metrics: MetricsCollector,
}

impl BuildOrchestrator {
    pub fn new(config: BuildConfig, runner: Arc<dyn CommandRunner>) -> Self {
        Self {
            config,
            runner,
            metrics: MetricsCollector::new(),
        }
    }

    pub fn config(&self) -> &BuildConfig {
        &self.config
    }

    /// Builds the project and returns its build output directory.
    ///
    /// # Errors
    ///
    /// Returns [`BuildError`] tagged with the failing stage on non-zero exit,
    /// spawn failure or timeout, or on stage `compile` when the site builder
    /// exited cleanly without producing its output directory.
    #[instrument(skip(self, project_dir, extras), fields(project = %project_dir.display()))]
    pub async fn build(
        &self,
        project_dir: &Path,
        extras: &[ExtraPackage],
    ) -> Result<PathBuf, BuildError> {
        let stages = self.config.stages(extras);
        info!(stages = stages.len(), "Starting build");

        for stage in &stages {
            let result = self.run_stage(stage, project_dir).await?;
            info!(
                stage = %result.stage_name,
                duration_ms = result.duration.as_millis() as u64,
                "Build stage completed"
            );
            debug!(stage = %result.stage_name, stdout = %result.stdout, "Build stage output");
        }

        let output_dir = project_dir.join(&self.config.output_dir);
        let produced = tokio::fs::metadata(&output_dir)
            .await
            .map(|meta| meta.is_dir())
            .unwrap_or(false);
        if !produced {
            error!(path = %output_dir.display(), "Build output directory not produced");
            return Err(BuildError::new(
                STAGE_COMPILE,
                format!("output directory '{}' not produced", output_dir.display()),
            ));
        }

        Ok(output_dir)
    }

    /// Runs one stage inside `project_dir`.
    ///
    /// Every stage goes through here, so exit-code, timeout and spawn
    /// failures are reported identically.
    pub async fn run_stage(
        &self,
        stage: &BuildStage,
        project_dir: &Path,
    ) -> Result<BuildStageResult, BuildError> {
        let spec = stage.command(project_dir, self.config.max_output_bytes);
        debug!(stage = %stage.name, command = %spec, "Running build stage");

        let start = Instant::now();
        let outcome = self.runner.run(&spec).await;
        let elapsed = start.elapsed();

        let result = match outcome {
            Ok(output) if output.success() => Ok(BuildStageResult {
                stage_name: stage.name.clone(),
                stdout: output.stdout,
                stderr: output.stderr,
                duration: elapsed,
            }),
            Ok(output) => Err(BuildError::new(
                &stage.name,
                format!("'{}' exited with code {}", spec, output.exit_code),
            )
            .with_diagnostics(output.diagnostics())),
            Err(CommandError::Timeout {
                timeout, partial, ..
            }) => Err(BuildError::new(
                &stage.name,
                format!("'{}' timed out after {:?}", spec, timeout),
            )
            .with_diagnostics(partial.diagnostics())),
            Err(e) => Err(BuildError::new(&stage.name, e.to_string())),
        };

        self.metrics
            .record_stage(&stage.name, result.is_ok(), elapsed.as_secs_f64());

        if let Err(e) = &result {
            error!(
                stage = %stage.name,
                error = %e,
                diagnostics = %e.diagnostics,
                "Build stage failed"
            );
        }

        result
    }
}
