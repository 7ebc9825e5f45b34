//! Drives one generation request through the whole pipeline.
//!
//! The coordinator validates the request, acquires a workspace, renders the
//! template tree into it, builds the site, publishes it and always releases
//! the workspace, whatever happened in between.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{error, info, instrument};
use uuid::Uuid;

use super::config::{ConfigError, ForgeConfig};
use super::state::{PipelineState, StateTracker};
use crate::build::BuildOrchestrator;
use crate::error::{BuildError, PublishError, RequestError, TemplateError, WorkspaceError};
use crate::execution::CommandRunner;
use crate::metrics::MetricsCollector;
use crate::publish::ArtifactPublisher;
use crate::request::GenerationRequest;
use crate::template::{RenderContext, TemplateRenderer, BASE_PATH};
use crate::workspace::WorkspaceManager;

/// Directory inside a workspace that the template tree is rendered into.
pub const PROJECT_DIR: &str = "project";

/// Metrics stage label for rendering.
const STAGE_RENDER: &str = "render";

/// Errors that can abort a pipeline run.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// The request failed validation; no workspace was acquired.
    #[error("Invalid request: {0}")]
    InvalidRequest(#[from] RequestError),

    /// Workspace allocation failed.
    #[error("Workspace error: {0}")]
    Workspace(#[from] WorkspaceError),

    /// Rendering the template tree failed.
    #[error("Template error: {0}")]
    Template(#[from] TemplateError),

    /// An external build stage failed.
    #[error("Build error: {0}")]
    Build(#[from] BuildError),

    /// Publishing the build output failed.
    #[error("Publish error: {0}")]
    Publish(#[from] PublishError),
}

impl PipelineError {
    /// Short machine-readable error kind, used as the metrics outcome label.
    pub fn kind(&self) -> &'static str {
        match self {
            PipelineError::InvalidRequest(_) => "invalid_request",
            PipelineError::Workspace(_) => "workspace_error",
            PipelineError::Template(_) => "template_error",
            PipelineError::Build(_) => "build_error",
            PipelineError::Publish(_) => "publish_error",
        }
    }

    /// One-line message safe to hand back to callers.
    ///
    /// Unlike `Display` it carries no paths or subprocess output.
    pub fn summary(&self) -> String {
        match self {
            PipelineError::InvalidRequest(e) => format!("Invalid request: {}", e),
            PipelineError::Workspace(_) => "Failed to allocate a workspace".to_string(),
            PipelineError::Template(TemplateError::Timeout(timeout)) => {
                format!("Template rendering timed out after {}s", timeout.as_secs())
            }
            PipelineError::Template(_) => "Failed to render documentation templates".to_string(),
            PipelineError::Build(e) => format!("Build stage '{}' failed", e.stage),
            PipelineError::Publish(PublishError::Timeout { timeout, .. }) => {
                format!("Publishing timed out after {}s", timeout.as_secs())
            }
            PipelineError::Publish(_) => "Failed to publish documentation".to_string(),
        }
    }

    /// Captured subprocess output attached to the error, if any.
    pub fn diagnostics(&self) -> Option<&str> {
        match self {
            PipelineError::Build(e) if !e.diagnostics.is_empty() => Some(&e.diagnostics),
            PipelineError::Publish(e) => e.diagnostics(),
            _ => None,
        }
    }
}

/// Outcome of a successful run, in the outbound JSON shape.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PipelineResult {
    /// Build output directory the site was published from. The workspace
    /// holding it is gone by the time the result is returned.
    pub output_path: PathBuf,
    #[serde(rename = "projectId")]
    pub request_id: String,
    pub generated_at: DateTime<Utc>,
    pub components_count: usize,
    pub documentation_link: String,
}

/// Runs the pipeline for individual requests.
///
/// Cheap to share behind an `Arc`; concurrent runs never share a workspace.
pub struct PipelineCoordinator {
    template_root: PathBuf,
    render_timeout: Duration,
    workspaces: WorkspaceManager,
    renderer: TemplateRenderer,
    builder: BuildOrchestrator,
    publisher: ArtifactPublisher,
    metrics: MetricsCollector,
}

impl PipelineCoordinator {
    /// Wires every stage from `config`, spawning subprocesses through `runner`.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if no storage target can be derived.
    pub fn new(config: &ForgeConfig, runner: Arc<dyn CommandRunner>) -> Result<Self, ConfigError> {
        Ok(Self {
            template_root: config.template_root.clone(),
            render_timeout: config.render_timeout,
            workspaces: config.workspace_manager(),
            renderer: TemplateRenderer::new(config.render_config()),
            builder: BuildOrchestrator::new(config.build_config(), Arc::clone(&runner)),
            publisher: ArtifactPublisher::new(config.publish_config()?, runner),
            metrics: MetricsCollector::new(),
        })
    }

    pub fn workspaces(&self) -> &WorkspaceManager {
        &self.workspaces
    }

    /// Runs the full pipeline for one request.
    ///
    /// The workspace, once acquired, is released exactly once on every exit
    /// path before this returns.
    #[instrument(
        skip(self, request),
        fields(request_id = %request.id, run_id = %Uuid::new_v4())
    )]
    pub async fn run(&self, request: &GenerationRequest) -> Result<PipelineResult, PipelineError> {
        let start = Instant::now();
        self.metrics.pipeline_started();
        let mut tracker = StateTracker::new(&request.id);

        let result = self.run_request(request, &mut tracker).await;

        let outcome = match &result {
            Ok(generated) => {
                tracker.advance();
                info!(
                    documentation_link = %generated.documentation_link,
                    components = generated.components_count,
                    duration_ms = start.elapsed().as_millis() as u64,
                    "Documentation generated"
                );
                "success"
            }
            Err(e) => {
                let failed_in = tracker.current();
                tracker.abort();
                error!(
                    state = %failed_in,
                    error = %e,
                    diagnostics = e.diagnostics().unwrap_or(""),
                    "Pipeline aborted"
                );
                e.kind()
            }
        };

        self.metrics.pipeline_finished();
        self.metrics
            .record_pipeline(outcome, start.elapsed().as_secs_f64());

        debug_assert!(tracker.current().is_terminal());
        result
    }

    async fn run_request(
        &self,
        request: &GenerationRequest,
        tracker: &mut StateTracker,
    ) -> Result<PipelineResult, PipelineError> {
        request.validate()?;
        let site_path = self
            .publisher
            .config()
            .target
            .site_path(&request.remote_key());
        let context = RenderContext::from_request(request).with(BASE_PATH, site_path);

        let lease = self.workspaces.acquire(&request.id)?;
        tracker.advance();

        let outcome = self
            .run_in_workspace(request, context, lease.path(), tracker)
            .await;

        self.workspaces.release(lease).await;
        outcome
    }

    async fn run_in_workspace(
        &self,
        request: &GenerationRequest,
        context: RenderContext,
        workspace: &Path,
        tracker: &mut StateTracker,
    ) -> Result<PipelineResult, PipelineError> {
        let project_dir = workspace.join(PROJECT_DIR);

        let render_start = Instant::now();
        let rendered = self
            .renderer
            .render_with_timeout(
                self.template_root.clone(),
                project_dir.clone(),
                context,
                request.components.clone(),
                self.render_timeout,
            )
            .await;
        self.metrics.record_stage(
            STAGE_RENDER,
            rendered.is_ok(),
            render_start.elapsed().as_secs_f64(),
        );
        let summary = rendered?;
        info!(
            component_pages = ?summary.component_pages,
            skipped_pages = summary.skipped_pages.len(),
            "Rendered project"
        );
        tracker.advance();

        let build_dir = self
            .builder
            .build(&project_dir, &request.extra_packages())
            .await?;
        tracker.advance();

        let report = self
            .publisher
            .publish(&build_dir, &request.remote_key())
            .await?;
        tracker.advance();
        debug_assert_eq!(tracker.current(), PipelineState::Published);

        Ok(PipelineResult {
            output_path: build_dir,
            request_id: request.id.clone(),
            generated_at: Utc::now(),
            components_count: request.components.len(),
            documentation_link: report.documentation_link,
        })
    }
}
