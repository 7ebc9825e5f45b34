//! Metrics module for Prometheus-based monitoring.
//!
//! Tracks pipeline runs, per-stage durations, concurrently running pipelines
//! and the startup orphan sweep.
//!
//! # Example
//!
//! ```ignore
//! use docs_forge::metrics::{init_metrics, export_metrics, MetricsCollector};
//!
//! init_metrics().expect("Failed to initialize metrics");
//! let collector = MetricsCollector::new();
//! collector.record_pipeline("success", 95.2);
//! let metrics_text = export_metrics();
//! ```

pub mod collectors;
pub mod prometheus;

pub use collectors::MetricsCollector;
pub use self::prometheus::{export_metrics, init_metrics};

pub use self::prometheus::{
    ACTIVE_PIPELINES, PIPELINE_DURATION, PIPELINE_RUNS_TOTAL, REGISTRY, STAGE_DURATION,
    WORKSPACES_SWEPT_TOTAL,
};
