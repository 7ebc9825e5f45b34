//! Long-lived entry point owning the coordinator.

use std::sync::Arc;

use futures::future::join_all;
use thiserror::Error;
use tracing::{info, warn};

use super::config::{ConfigError, ForgeConfig};
use super::coordinator::{PipelineCoordinator, PipelineError, PipelineResult};
use crate::error::WorkspaceError;
use crate::execution::{CommandRunner, ProcessRunner};
use crate::metrics::{init_metrics, MetricsCollector};
use crate::request::GenerationRequest;
use crate::workspace::SweepReport;

/// Errors that can occur while bringing the service up.
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Orphan sweep failed: {0}")]
    Sweep(#[from] WorkspaceError),

    #[error("Metrics initialization failed: {0}")]
    Metrics(#[from] prometheus::Error),
}

/// Documentation generation service.
///
/// Construct it once per process with [`DocsService::initialize`]; that
/// call also removes workspaces orphaned by a previous crash.
pub struct DocsService {
    config: ForgeConfig,
    coordinator: PipelineCoordinator,
    last_sweep: SweepReport,
}

impl DocsService {
    /// Initializes the service with the real process runner.
    pub async fn initialize(config: ForgeConfig) -> Result<Self, ServiceError> {
        Self::initialize_with_runner(config, Arc::new(ProcessRunner::new())).await
    }

    /// Initializes the service with a custom command runner.
    ///
    /// Validates the configuration, sets up metrics if enabled and sweeps
    /// orphaned workspaces under the temp root.
    pub async fn initialize_with_runner(
        config: ForgeConfig,
        runner: Arc<dyn CommandRunner>,
    ) -> Result<Self, ServiceError> {
        config.validate()?;

        if config.metrics_enabled {
            init_metrics()?;
        }

        let coordinator = PipelineCoordinator::new(&config, runner)?;
        let last_sweep = coordinator.workspaces().sweep_orphans().await?;
        MetricsCollector::new().record_sweep(last_sweep.removed_count(), last_sweep.failed_count());

        if last_sweep.failed_count() > 0 {
            warn!(
                removed = last_sweep.removed_count(),
                failed = last_sweep.failed_count(),
                "Some orphaned workspaces could not be removed"
            );
        }

        info!(
            temp_root = %coordinator.workspaces().temp_root().display(),
            swept = last_sweep.removed_count(),
            "Documentation service initialized"
        );

        Ok(Self {
            config,
            coordinator,
            last_sweep,
        })
    }

    pub fn config(&self) -> &ForgeConfig {
        &self.config
    }

    /// Result of the startup orphan sweep.
    pub fn last_sweep(&self) -> &SweepReport {
        &self.last_sweep
    }

    /// Generates and publishes documentation for one request.
    pub async fn generate(
        &self,
        request: &GenerationRequest,
    ) -> Result<PipelineResult, PipelineError> {
        self.coordinator.run(request).await
    }

    /// Runs several requests concurrently. Results keep the input order.
    pub async fn generate_all(
        &self,
        requests: &[GenerationRequest],
    ) -> Vec<Result<PipelineResult, PipelineError>> {
        join_all(requests.iter().map(|request| self.generate(request))).await
    }

    /// Logs shutdown. In-flight pipelines are not cancelled here; anything
    /// they leave behind is swept at the next startup.
    pub fn shutdown(&self) {
        info!("Documentation service shutting down");
    }
}
