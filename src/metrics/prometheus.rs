//! Prometheus metrics registration and export.
//!
//! This module defines all Prometheus metrics used by docs-forge and provides
//! functions for initializing, registering, and exporting metrics.

use prometheus::{
    CounterVec, Encoder, Gauge, Histogram, HistogramOpts, HistogramVec, Opts, Registry,
    TextEncoder,
};
use std::sync::OnceLock;

/// Global Prometheus registry for all docs-forge metrics.
pub static REGISTRY: OnceLock<Registry> = OnceLock::new();

/// Total pipeline runs, labeled by outcome (`success`, `workspace_error`, ...).
pub static PIPELINE_RUNS_TOTAL: OnceLock<CounterVec> = OnceLock::new();

/// End-to-end pipeline duration in seconds.
pub static PIPELINE_DURATION: OnceLock<Histogram> = OnceLock::new();

/// Per-stage duration in seconds, labeled by stage and status.
pub static STAGE_DURATION: OnceLock<HistogramVec> = OnceLock::new();

/// Pipelines currently running.
pub static ACTIVE_PIPELINES: OnceLock<Gauge> = OnceLock::new();

/// Orphaned workspaces handled by startup sweeps, labeled by result.
pub static WORKSPACES_SWEPT_TOTAL: OnceLock<CounterVec> = OnceLock::new();

/// Initialize all metrics and register them with the registry.
///
/// Call once at startup. Later calls leave the first registration in place.
///
/// # Errors
///
/// Returns a `prometheus::Error` if metric registration fails.
pub fn init_metrics() -> Result<(), prometheus::Error> {
    let registry = Registry::new();

    let pipeline_runs_total = CounterVec::new(
        Opts::new("docs_forge_pipeline_runs_total", "Total documentation pipeline runs"),
        &["outcome"],
    )?;

    let pipeline_duration = Histogram::with_opts(
        HistogramOpts::new(
            "docs_forge_pipeline_duration_seconds",
            "End-to-end pipeline duration in seconds",
        )
        .buckets(vec![5.0, 30.0, 60.0, 120.0, 300.0, 600.0, 1200.0, 2400.0]),
    )?;

    let stage_duration = HistogramVec::new(
        HistogramOpts::new(
            "docs_forge_stage_duration_seconds",
            "Pipeline stage duration in seconds",
        )
        .buckets(vec![0.5, 1.0, 5.0, 15.0, 30.0, 60.0, 120.0, 300.0, 600.0, 1200.0]),
        &["stage", "status"],
    )?;

    let active_pipelines = Gauge::new(
        "docs_forge_active_pipelines",
        "Number of pipelines currently running",
    )?;

    let workspaces_swept_total = CounterVec::new(
        Opts::new(
            "docs_forge_workspaces_swept_total",
            "Orphaned workspaces handled by startup sweeps",
        ),
        &["result"],
    )?;

    registry.register(Box::new(pipeline_runs_total.clone()))?;
    registry.register(Box::new(pipeline_duration.clone()))?;
    registry.register(Box::new(stage_duration.clone()))?;
    registry.register(Box::new(active_pipelines.clone()))?;
    registry.register(Box::new(workspaces_swept_total.clone()))?;

    // If any of these fail, metrics were already initialized (idempotent)
    let _ = REGISTRY.set(registry);
    let _ = PIPELINE_RUNS_TOTAL.set(pipeline_runs_total);
    let _ = PIPELINE_DURATION.set(pipeline_duration);
    let _ = STAGE_DURATION.set(stage_duration);
    let _ = ACTIVE_PIPELINES.set(active_pipelines);
    let _ = WORKSPACES_SWEPT_TOTAL.set(workspaces_swept_total);

    tracing::info!("Prometheus metrics initialized successfully");

    Ok(())
}

/// Export all registered metrics in Prometheus text format.
///
/// Returns a comment line instead when the registry has not been initialized
/// or encoding fails.
pub fn export_metrics() -> String {
    let Some(registry) = REGISTRY.get() else {
        return "# Metrics not initialized. Call init_metrics() first.\n".to_string();
    };

    let encoder = TextEncoder::new();
    let metric_families = registry.gather();

    let mut buffer = Vec::new();
    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        return format!("# Error encoding metrics: {}\n", e);
    }

    String::from_utf8(buffer)
        .unwrap_or_else(|e| format!("# Error converting metrics to UTF-8: {}\n", e))
}
