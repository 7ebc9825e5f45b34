//! CLI command definitions for docs-forge.
//!
//! Configuration comes from `DOCS_FORGE_*` environment variables; a few
//! flags override the most commonly changed ones.

use crate::metrics::export_metrics;
use crate::pipeline::{DocsService, ForgeConfig, PipelineResult};
use crate::request::GenerationRequest;
use clap::Parser;
use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing::{error, info};

/// Design-system documentation generator.
#[derive(Parser)]
#[command(name = "docs-forge")]
#[command(about = "Render, build and publish design-system documentation sites")]
#[command(version)]
#[command(
    long_about = "docs-forge turns a generation request into a published documentation site.\n\nEach request is rendered from the template tree into a fresh workspace, built with npm and mirrored to storage.\n\nExample usage:\n  DOCS_FORGE_BUCKET=acme-docs docs-forge generate --request request.json"
)]
pub struct Cli {
    /// The subcommand to execute.
    #[command(subcommand)]
    pub command: Commands,

    /// Log level (trace, debug, info, warn, error).
    #[arg(short, long, default_value = "info", global = true)]
    pub log_level: String,
}

/// Available CLI subcommands.
#[derive(clap::Subcommand)]
pub enum Commands {
    /// Generate and publish documentation for one or more requests.
    #[command(alias = "gen")]
    Generate(GenerateArgs),

    /// Remove workspaces left behind by a crashed process.
    Sweep(SweepArgs),

    /// Load and validate configuration, then print the effective values.
    CheckConfig(CheckConfigArgs),
}

/// Flags that override environment configuration.
#[derive(clap::Args, Debug, Clone, Default)]
pub struct ConfigOverrides {
    /// Template tree root (overrides DOCS_FORGE_TEMPLATE_ROOT).
    #[arg(long)]
    pub template_root: Option<PathBuf>,

    /// Workspace root (overrides DOCS_FORGE_TEMP_ROOT).
    #[arg(long)]
    pub temp_root: Option<PathBuf>,

    /// Publish into this local directory instead of S3.
    #[arg(long)]
    pub local_storage: Option<PathBuf>,
}

/// Arguments for `docs-forge generate`.
#[derive(Parser, Debug)]
pub struct GenerateArgs {
    /// Request JSON files. All requests run concurrently.
    #[arg(short, long = "request", required = true, num_args = 1..)]
    pub requests: Vec<PathBuf>,

    /// Print Prometheus metrics to stderr after the run.
    #[arg(long)]
    pub metrics: bool,

    #[command(flatten)]
    pub overrides: ConfigOverrides,
}

/// Arguments for `docs-forge sweep`.
#[derive(Parser, Debug)]
pub struct SweepArgs {
    #[command(flatten)]
    pub overrides: ConfigOverrides,
}

/// Arguments for `docs-forge check-config`.
#[derive(Parser, Debug)]
pub struct CheckConfigArgs {
    #[command(flatten)]
    pub overrides: ConfigOverrides,
}

/// Per-request line of `generate` output.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateEntry {
    request_file: String,
    status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    result: Option<PipelineResult>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

impl GenerateEntry {
    fn success(path: &Path, result: PipelineResult) -> Self {
        Self {
            request_file: path.display().to_string(),
            status: "success",
            result: Some(result),
            error: None,
        }
    }

    fn failure(path: &Path, error: impl Into<String>) -> Self {
        Self {
            request_file: path.display().to_string(),
            status: "failed",
            result: None,
            error: Some(error.into()),
        }
    }
}

/// Parse CLI arguments and return the Cli struct.
///
/// This allows main.rs to access CLI arguments (like log_level) before running commands.
pub fn parse_cli() -> Cli {
    Cli::parse()
}

/// Run the CLI by parsing arguments and executing the command.
///
/// For more control over logging initialization, use `parse_cli()` and `run_with_cli()`.
pub async fn run() -> anyhow::Result<()> {
    run_with_cli(parse_cli()).await
}

/// Run the CLI with the parsed arguments.
pub async fn run_with_cli(cli: Cli) -> anyhow::Result<()> {
    match cli.command {
        Commands::Generate(args) => run_generate_command(args).await,
        Commands::Sweep(args) => run_sweep_command(args).await,
        Commands::CheckConfig(args) => run_check_config_command(args),
    }
}

/// Loads configuration from the environment with CLI overrides layered on top.
fn load_config(overrides: &ConfigOverrides, extra: &[(&str, &str)]) -> anyhow::Result<ForgeConfig> {
    let config = ForgeConfig::from_lookup(|key| {
        if let Some((_, value)) = extra.iter().find(|(k, _)| *k == key) {
            return Some(value.to_string());
        }
        let overridden = match key {
            "DOCS_FORGE_TEMPLATE_ROOT" => overrides.template_root.as_ref(),
            "DOCS_FORGE_TEMP_ROOT" => overrides.temp_root.as_ref(),
            "DOCS_FORGE_LOCAL_STORAGE_ROOT" => overrides.local_storage.as_ref(),
            "DOCS_FORGE_STORAGE" if overrides.local_storage.is_some() => {
                return Some("local".to_string())
            }
            _ => None,
        };
        overridden
            .map(|path| path.display().to_string())
            .or_else(|| std::env::var(key).ok())
    })
    .map_err(|e| anyhow::anyhow!("Invalid configuration: {}", e))?;

    Ok(config)
}

// ============================================================================
// Command Implementations
// ============================================================================

async fn run_generate_command(args: GenerateArgs) -> anyhow::Result<()> {
    let extra: &[(&str, &str)] = if args.metrics {
        &[("DOCS_FORGE_METRICS", "true")]
    } else {
        &[]
    };
    let config = load_config(&args.overrides, extra)?;
    let service = DocsService::initialize(config).await?;

    let mut entries: Vec<Option<GenerateEntry>> = Vec::with_capacity(args.requests.len());
    let mut requests = Vec::new();
    let mut request_paths = Vec::new();

    for path in &args.requests {
        match GenerationRequest::from_file(path) {
            Ok(request) => {
                requests.push(request);
                request_paths.push((entries.len(), path.clone()));
                entries.push(None);
            }
            Err(e) => {
                error!(path = %path.display(), error = %e, "Failed to load request");
                entries.push(Some(GenerateEntry::failure(path, e.to_string())));
            }
        }
    }

    info!(requests = requests.len(), "Running documentation pipelines");
    let results = service.generate_all(&requests).await;

    for ((index, path), result) in request_paths.into_iter().zip(results) {
        entries[index] = Some(match result {
            Ok(result) => GenerateEntry::success(&path, result),
            Err(e) => GenerateEntry::failure(&path, e.summary()),
        });
    }

    let entries: Vec<GenerateEntry> = entries.into_iter().flatten().collect();
    let failed = entries.iter().filter(|e| e.status != "success").count();

    println!("{}", serde_json::to_string_pretty(&entries)?);

    if args.metrics {
        eprintln!("{}", export_metrics());
    }

    service.shutdown();

    if failed > 0 {
        return Err(anyhow::anyhow!(
            "{} of {} requests failed",
            failed,
            entries.len()
        ));
    }
    Ok(())
}

async fn run_sweep_command(args: SweepArgs) -> anyhow::Result<()> {
    // Storage settings play no part in the sweep.
    let config = load_config(&args.overrides, &[("DOCS_FORGE_STORAGE", "local")])?;
    let manager = config.workspace_manager();

    let report = manager.sweep_orphans().await?;
    println!("{}", serde_json::to_string_pretty(&report)?);

    if report.failed_count() > 0 {
        return Err(anyhow::anyhow!(
            "{} orphaned workspaces could not be removed",
            report.failed_count()
        ));
    }
    Ok(())
}

fn run_check_config_command(args: CheckConfigArgs) -> anyhow::Result<()> {
    let config = load_config(&args.overrides, &[])?;
    println!("{:#?}", config);
    println!("Configuration is valid.");
    Ok(())
}
