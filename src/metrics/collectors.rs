//! High-level recording interface over the raw Prometheus metrics.
//!
//! Every method is a no-op until [`super::init_metrics`] has run, so library
//! users that never initialize metrics pay nothing and see no errors.

use super::prometheus::{
    ACTIVE_PIPELINES, PIPELINE_DURATION, PIPELINE_RUNS_TOTAL, STAGE_DURATION,
    WORKSPACES_SWEPT_TOTAL,
};

/// Records docs-forge operational metrics.
///
/// # Example
///
/// ```ignore
/// use docs_forge::metrics::{init_metrics, MetricsCollector};
///
/// init_metrics().expect("Failed to init metrics");
/// let collector = MetricsCollector::new();
/// collector.record_stage("install", true, 42.0);
/// collector.record_pipeline("success", 180.0);
/// ```
#[derive(Debug, Clone, Copy, Default)]
pub struct MetricsCollector;

impl MetricsCollector {
    /// Create a new MetricsCollector instance.
    pub fn new() -> Self {
        Self
    }

    /// Record a finished pipeline run.
    ///
    /// # Arguments
    ///
    /// * `outcome` - `success` or the error kind that aborted the run
    /// * `duration_secs` - End-to-end duration in seconds
    pub fn record_pipeline(&self, outcome: &str, duration_secs: f64) {
        if let Some(runs) = PIPELINE_RUNS_TOTAL.get() {
            runs.with_label_values(&[outcome]).inc();
        }
        if let Some(duration) = PIPELINE_DURATION.get() {
            duration.observe(duration_secs);
        }

        tracing::trace!(outcome, duration_secs, "Recorded pipeline metric");
    }

    /// Record one pipeline or build stage.
    pub fn record_stage(&self, stage: &str, success: bool, duration_secs: f64) {
        let status = if success { "success" } else { "failure" };
        if let Some(stages) = STAGE_DURATION.get() {
            stages
                .with_label_values(&[stage, status])
                .observe(duration_secs);
        }

        tracing::trace!(stage, status, duration_secs, "Recorded stage metric");
    }

    /// Mark a pipeline as started.
    pub fn pipeline_started(&self) {
        if let Some(active) = ACTIVE_PIPELINES.get() {
            active.inc();
        }
    }

    /// Mark a pipeline as finished.
    pub fn pipeline_finished(&self) {
        if let Some(active) = ACTIVE_PIPELINES.get() {
            active.dec();
        }
    }

    /// Record the result of an orphan sweep.
    pub fn record_sweep(&self, removed: usize, failed: usize) {
        if let Some(swept) = WORKSPACES_SWEPT_TOTAL.get() {
            swept
                .with_label_values(&["removed"])
                .inc_by(removed as f64);
            swept.with_label_values(&["failed"]).inc_by(failed as f64);
        }
    }
}
