//! Configuration for the documentation pipeline.
//!
//! This module provides configuration for every pipeline stage: the template
//! tree, workspace allocation, the external build, publishing and metrics.

use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

use crate::build::{
    BuildConfig, DEFAULT_COMPILE_TIMEOUT, DEFAULT_EXTRAS_TIMEOUT, DEFAULT_INSTALL_TIMEOUT,
    DEFAULT_OUTPUT_DIR,
};
use crate::execution::DEFAULT_MAX_OUTPUT_BYTES;
use crate::publish::{PublishConfig, StorageTarget, DEFAULT_PUBLISH_TIMEOUT, DEFAULT_STORAGE_PREFIX};
use crate::template::{RenderConfig, DEFAULT_COMPONENTS_DIR, DEFAULT_TEMPLATE_SUFFIX};
use crate::workspace::{WorkspaceManager, DEFAULT_WORKSPACE_PREFIX};

/// Default render timeout (2 minutes).
pub const DEFAULT_RENDER_TIMEOUT: Duration = Duration::from_secs(120);

/// Errors that can occur during configuration operations.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A required environment variable is missing.
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),

    /// An environment variable has an invalid value.
    #[error("Invalid value for {key}: {message}")]
    InvalidValue { key: String, message: String },

    /// Configuration validation failed.
    #[error("Configuration validation failed: {0}")]
    ValidationFailed(String),
}

/// Which storage backend published sites go to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageKind {
    S3,
    Local,
}

impl std::str::FromStr for StorageKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "s3" => Ok(Self::S3),
            "local" => Ok(Self::Local),
            other => Err(format!("expected 's3' or 'local', got '{}'", other)),
        }
    }
}

impl std::fmt::Display for StorageKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::S3 => write!(f, "s3"),
            Self::Local => write!(f, "local"),
        }
    }
}

/// Configuration for the documentation pipeline.
#[derive(Debug, Clone)]
pub struct ForgeConfig {
    // Template settings
    /// Root of the template tree.
    pub template_root: PathBuf,
    /// File-name suffix marking a template.
    pub template_suffix: String,
    /// Per-component pages subtree, relative to the template root.
    pub components_dir: PathBuf,
    /// Render timeout.
    pub render_timeout: Duration,

    // Workspace settings
    /// Directory workspaces are created under.
    pub temp_root: PathBuf,
    /// Name prefix identifying workspaces owned by this service.
    pub workspace_prefix: String,

    // Build settings
    /// Package manager executable.
    pub npm_program: String,
    /// Shared package cache directory.
    pub npm_cache: PathBuf,
    pub install_timeout: Duration,
    pub extras_timeout: Duration,
    pub compile_timeout: Duration,
    /// Per-stream subprocess output ceiling in bytes.
    pub max_output_bytes: usize,
    /// Site builder output directory, relative to the project.
    pub build_output_dir: PathBuf,

    // Publish settings
    pub storage: StorageKind,
    /// Bucket name, required for S3 storage.
    pub bucket: Option<String>,
    /// Key prefix under the bucket or local root.
    pub storage_prefix: String,
    /// Root directory for local storage.
    pub local_storage_root: PathBuf,
    /// Sync utility executable.
    pub aws_program: String,
    /// Overrides the storage target's base URL in documentation links.
    pub docs_base_url: Option<String>,
    pub publish_timeout: Duration,

    /// Whether Prometheus metrics are initialized.
    pub metrics_enabled: bool,
}

impl Default for ForgeConfig {
    fn default() -> Self {
        Self {
            // Template defaults
            template_root: PathBuf::from("./templates"),
            template_suffix: DEFAULT_TEMPLATE_SUFFIX.to_string(),
            components_dir: PathBuf::from(DEFAULT_COMPONENTS_DIR),
            render_timeout: DEFAULT_RENDER_TIMEOUT,

            // Workspace defaults
            temp_root: std::env::temp_dir(),
            workspace_prefix: DEFAULT_WORKSPACE_PREFIX.to_string(),

            // Build defaults
            npm_program: "npm".to_string(),
            npm_cache: PathBuf::from("./.npm-cache"),
            install_timeout: DEFAULT_INSTALL_TIMEOUT, // 10 minutes
            extras_timeout: DEFAULT_EXTRAS_TIMEOUT,   // 10 minutes
            compile_timeout: DEFAULT_COMPILE_TIMEOUT, // 20 minutes
            max_output_bytes: DEFAULT_MAX_OUTPUT_BYTES,
            build_output_dir: PathBuf::from(DEFAULT_OUTPUT_DIR),

            // Publish defaults
            storage: StorageKind::S3,
            bucket: None,
            storage_prefix: DEFAULT_STORAGE_PREFIX.to_string(),
            local_storage_root: PathBuf::from("./published"),
            aws_program: "aws".to_string(),
            docs_base_url: None,
            publish_timeout: DEFAULT_PUBLISH_TIMEOUT,

            metrics_enabled: false,
        }
    }
}

impl ForgeConfig {
    /// Creates a new configuration with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates configuration from environment variables.
    ///
    /// # Environment Variables
    ///
    /// - `DOCS_FORGE_TEMPLATE_ROOT`: Template tree (default: ./templates)
    /// - `DOCS_FORGE_TEMPLATE_SUFFIX`: Template marker suffix (default: .tera)
    /// - `DOCS_FORGE_COMPONENTS_DIR`: Component pages subtree (default: docs/components)
    /// - `DOCS_FORGE_RENDER_TIMEOUT_SECS`: Render timeout (default: 120)
    /// - `DOCS_FORGE_TEMP_ROOT`: Workspace root (default: system temp dir)
    /// - `DOCS_FORGE_WORKSPACE_PREFIX`: Workspace name prefix (default: docs-forge-)
    /// - `DOCS_FORGE_NPM_PROGRAM`: Package manager (default: npm)
    /// - `DOCS_FORGE_NPM_CACHE`: Package cache (default: ./.npm-cache)
    /// - `DOCS_FORGE_INSTALL_TIMEOUT_SECS`: Install timeout (default: 600)
    /// - `DOCS_FORGE_EXTRAS_TIMEOUT_SECS`: Extras install timeout (default: 600)
    /// - `DOCS_FORGE_COMPILE_TIMEOUT_SECS`: Site build timeout (default: 1200)
    /// - `DOCS_FORGE_MAX_OUTPUT_BYTES`: Output capture ceiling (default: 10485760)
    /// - `DOCS_FORGE_BUILD_OUTPUT_DIR`: Site builder output (default: build)
    /// - `DOCS_FORGE_STORAGE`: `s3` or `local` (default: s3)
    /// - `DOCS_FORGE_BUCKET`: Bucket name (required for s3)
    /// - `DOCS_FORGE_STORAGE_PREFIX`: Key prefix (default: docs)
    /// - `DOCS_FORGE_LOCAL_STORAGE_ROOT`: Local storage root (default: ./published)
    /// - `DOCS_FORGE_AWS_PROGRAM`: Sync utility (default: aws)
    /// - `DOCS_FORGE_DOCS_BASE_URL`: Documentation link base URL
    /// - `DOCS_FORGE_PUBLISH_TIMEOUT_SECS`: Publish timeout (default: 600)
    /// - `DOCS_FORGE_METRICS`: Enable Prometheus metrics (default: false)
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if required variables are missing or have invalid values.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds configuration from an arbitrary key lookup.
    ///
    /// `from_env` is this over the process environment; tests pass a map.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        // Template settings
        if let Some(val) = lookup("DOCS_FORGE_TEMPLATE_ROOT") {
            config.template_root = PathBuf::from(val);
        }

        if let Some(val) = lookup("DOCS_FORGE_TEMPLATE_SUFFIX") {
            config.template_suffix = val;
        }

        if let Some(val) = lookup("DOCS_FORGE_COMPONENTS_DIR") {
            config.components_dir = PathBuf::from(val);
        }

        if let Some(val) = lookup("DOCS_FORGE_RENDER_TIMEOUT_SECS") {
            config.render_timeout = parse_env_secs(&val, "DOCS_FORGE_RENDER_TIMEOUT_SECS")?;
        }

        // Workspace settings
        if let Some(val) = lookup("DOCS_FORGE_TEMP_ROOT") {
            config.temp_root = PathBuf::from(val);
        }

        if let Some(val) = lookup("DOCS_FORGE_WORKSPACE_PREFIX") {
            config.workspace_prefix = val;
        }

        // Build settings
        if let Some(val) = lookup("DOCS_FORGE_NPM_PROGRAM") {
            config.npm_program = val;
        }

        if let Some(val) = lookup("DOCS_FORGE_NPM_CACHE") {
            config.npm_cache = PathBuf::from(val);
        }

        if let Some(val) = lookup("DOCS_FORGE_INSTALL_TIMEOUT_SECS") {
            config.install_timeout = parse_env_secs(&val, "DOCS_FORGE_INSTALL_TIMEOUT_SECS")?;
        }

        if let Some(val) = lookup("DOCS_FORGE_EXTRAS_TIMEOUT_SECS") {
            config.extras_timeout = parse_env_secs(&val, "DOCS_FORGE_EXTRAS_TIMEOUT_SECS")?;
        }

        if let Some(val) = lookup("DOCS_FORGE_COMPILE_TIMEOUT_SECS") {
            config.compile_timeout = parse_env_secs(&val, "DOCS_FORGE_COMPILE_TIMEOUT_SECS")?;
        }

        if let Some(val) = lookup("DOCS_FORGE_MAX_OUTPUT_BYTES") {
            config.max_output_bytes = parse_env_value(&val, "DOCS_FORGE_MAX_OUTPUT_BYTES")?;
        }

        if let Some(val) = lookup("DOCS_FORGE_BUILD_OUTPUT_DIR") {
            config.build_output_dir = PathBuf::from(val);
        }

        // Publish settings
        if let Some(val) = lookup("DOCS_FORGE_STORAGE") {
            config.storage = parse_env_value(&val, "DOCS_FORGE_STORAGE")?;
        }

        // DOCS_FORGE_BUCKET is required for s3 storage
        config.bucket = lookup("DOCS_FORGE_BUCKET").filter(|b| !b.trim().is_empty());
        if config.storage == StorageKind::S3 && config.bucket.is_none() {
            return Err(ConfigError::MissingEnvVar("DOCS_FORGE_BUCKET".to_string()));
        }

        if let Some(val) = lookup("DOCS_FORGE_STORAGE_PREFIX") {
            config.storage_prefix = val;
        }

        if let Some(val) = lookup("DOCS_FORGE_LOCAL_STORAGE_ROOT") {
            config.local_storage_root = PathBuf::from(val);
        }

        if let Some(val) = lookup("DOCS_FORGE_AWS_PROGRAM") {
            config.aws_program = val;
        }

        config.docs_base_url = lookup("DOCS_FORGE_DOCS_BASE_URL").filter(|u| !u.trim().is_empty());

        if let Some(val) = lookup("DOCS_FORGE_PUBLISH_TIMEOUT_SECS") {
            config.publish_timeout = parse_env_secs(&val, "DOCS_FORGE_PUBLISH_TIMEOUT_SECS")?;
        }

        if let Some(val) = lookup("DOCS_FORGE_METRICS") {
            config.metrics_enabled = parse_env_bool(&val, "DOCS_FORGE_METRICS")?;
        }

        config.validate()?;
        Ok(config)
    }

    /// Validates the configuration values.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::ValidationFailed` if any values are invalid.
    pub fn validate(&self) -> Result<(), ConfigError> {
        // Template validation
        if self.template_suffix.is_empty() {
            return Err(ConfigError::ValidationFailed(
                "template_suffix cannot be empty".to_string(),
            ));
        }

        if self.components_dir.is_absolute() {
            return Err(ConfigError::ValidationFailed(
                "components_dir must be relative to the template root".to_string(),
            ));
        }

        // Workspace validation
        if self.workspace_prefix.is_empty() {
            return Err(ConfigError::ValidationFailed(
                "workspace_prefix cannot be empty".to_string(),
            ));
        }

        if self.workspace_prefix.contains('/') || self.workspace_prefix.contains('\\') {
            return Err(ConfigError::ValidationFailed(
                "workspace_prefix cannot contain path separators".to_string(),
            ));
        }

        // Build validation
        if self.npm_program.is_empty() {
            return Err(ConfigError::ValidationFailed(
                "npm_program cannot be empty".to_string(),
            ));
        }

        for (name, timeout) in [
            ("render_timeout", self.render_timeout),
            ("install_timeout", self.install_timeout),
            ("extras_timeout", self.extras_timeout),
            ("compile_timeout", self.compile_timeout),
            ("publish_timeout", self.publish_timeout),
        ] {
            if timeout.is_zero() {
                return Err(ConfigError::ValidationFailed(format!(
                    "{} must be greater than 0",
                    name
                )));
            }
        }

        if self.max_output_bytes == 0 {
            return Err(ConfigError::ValidationFailed(
                "max_output_bytes must be greater than 0".to_string(),
            ));
        }

        if self.build_output_dir.as_os_str().is_empty() || self.build_output_dir.is_absolute() {
            return Err(ConfigError::ValidationFailed(
                "build_output_dir must be a non-empty relative path".to_string(),
            ));
        }

        // Publish validation
        match self.storage {
            StorageKind::S3 => {
                if self.bucket.as_deref().map_or(true, |b| b.trim().is_empty()) {
                    return Err(ConfigError::ValidationFailed(
                        "bucket is required for s3 storage".to_string(),
                    ));
                }
                if self.aws_program.is_empty() {
                    return Err(ConfigError::ValidationFailed(
                        "aws_program cannot be empty".to_string(),
                    ));
                }
            }
            StorageKind::Local => {
                if self.local_storage_root.as_os_str().is_empty() {
                    return Err(ConfigError::ValidationFailed(
                        "local_storage_root cannot be empty".to_string(),
                    ));
                }
            }
        }

        Ok(())
    }

    /// Renderer settings derived from this configuration.
    pub fn render_config(&self) -> RenderConfig {
        RenderConfig::new()
            .with_template_suffix(&self.template_suffix)
            .with_components_dir(&self.components_dir)
    }

    /// Workspace manager rooted at the configured temp root.
    pub fn workspace_manager(&self) -> WorkspaceManager {
        WorkspaceManager::new(&self.temp_root, &self.workspace_prefix)
    }

    /// Build settings derived from this configuration.
    pub fn build_config(&self) -> BuildConfig {
        BuildConfig {
            npm_program: self.npm_program.clone(),
            cache_dir: self.npm_cache.clone(),
            install_timeout: self.install_timeout,
            extras_timeout: self.extras_timeout,
            compile_timeout: self.compile_timeout,
            output_dir: self.build_output_dir.clone(),
            max_output_bytes: self.max_output_bytes,
        }
    }

    /// Storage target selected by `storage`.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::ValidationFailed` for S3 storage without a bucket.
    pub fn storage_target(&self) -> Result<StorageTarget, ConfigError> {
        match self.storage {
            StorageKind::S3 => {
                let bucket = self.bucket.clone().ok_or_else(|| {
                    ConfigError::ValidationFailed("bucket is required for s3 storage".to_string())
                })?;
                Ok(StorageTarget::s3(bucket, &self.storage_prefix))
            }
            StorageKind::Local => Ok(StorageTarget::local(
                &self.local_storage_root,
                &self.storage_prefix,
            )),
        }
    }

    /// Publisher settings derived from this configuration.
    pub fn publish_config(&self) -> Result<PublishConfig, ConfigError> {
        let mut config = PublishConfig::new(self.storage_target()?).with_timeout(self.publish_timeout);
        config.aws_program = self.aws_program.clone();
        config.max_output_bytes = self.max_output_bytes;
        config.docs_base_url = self.docs_base_url.clone();
        Ok(config)
    }

    /// Builder method to set the template root.
    pub fn with_template_root(mut self, path: impl Into<PathBuf>) -> Self {
        self.template_root = path.into();
        self
    }

    /// Builder method to set the template suffix.
    pub fn with_template_suffix(mut self, suffix: impl Into<String>) -> Self {
        self.template_suffix = suffix.into();
        self
    }

    /// Builder method to set the component pages subtree.
    pub fn with_components_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.components_dir = dir.into();
        self
    }

    /// Builder method to set the render timeout.
    pub fn with_render_timeout(mut self, timeout: Duration) -> Self {
        self.render_timeout = timeout;
        self
    }

    /// Builder method to set the workspace root.
    pub fn with_temp_root(mut self, path: impl Into<PathBuf>) -> Self {
        self.temp_root = path.into();
        self
    }

    /// Builder method to set the workspace prefix.
    pub fn with_workspace_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.workspace_prefix = prefix.into();
        self
    }

    /// Builder method to set the package manager.
    pub fn with_npm_program(mut self, program: impl Into<String>) -> Self {
        self.npm_program = program.into();
        self
    }

    /// Builder method to set the package cache.
    pub fn with_npm_cache(mut self, path: impl Into<PathBuf>) -> Self {
        self.npm_cache = path.into();
        self
    }

    /// Builder method to set the install timeout.
    pub fn with_install_timeout(mut self, timeout: Duration) -> Self {
        self.install_timeout = timeout;
        self
    }

    /// Builder method to set the extras install timeout.
    pub fn with_extras_timeout(mut self, timeout: Duration) -> Self {
        self.extras_timeout = timeout;
        self
    }

    /// Builder method to set the site build timeout.
    pub fn with_compile_timeout(mut self, timeout: Duration) -> Self {
        self.compile_timeout = timeout;
        self
    }

    /// Builder method to set the output capture ceiling.
    pub fn with_max_output_bytes(mut self, bytes: usize) -> Self {
        self.max_output_bytes = bytes;
        self
    }

    /// Builder method to publish to an S3 bucket.
    pub fn with_s3_bucket(mut self, bucket: impl Into<String>) -> Self {
        self.storage = StorageKind::S3;
        self.bucket = Some(bucket.into());
        self
    }

    /// Builder method to publish into a local directory.
    pub fn with_local_storage(mut self, root: impl Into<PathBuf>) -> Self {
        self.storage = StorageKind::Local;
        self.local_storage_root = root.into();
        self
    }

    /// Builder method to set the storage prefix.
    pub fn with_storage_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.storage_prefix = prefix.into();
        self
    }

    /// Builder method to set the documentation base URL.
    pub fn with_docs_base_url(mut self, url: impl Into<String>) -> Self {
        self.docs_base_url = Some(url.into());
        self
    }

    /// Builder method to set the publish timeout.
    pub fn with_publish_timeout(mut self, timeout: Duration) -> Self {
        self.publish_timeout = timeout;
        self
    }

    /// Builder method to enable or disable metrics.
    pub fn with_metrics(mut self, enabled: bool) -> Self {
        self.metrics_enabled = enabled;
        self
    }
}

/// Parse an environment variable value into a type.
fn parse_env_value<T>(value: &str, key: &str) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
{
    value.trim().parse().map_err(|_| ConfigError::InvalidValue {
        key: key.to_string(),
        message: format!("could not parse '{}'", value),
    })
}

/// Parse an environment variable holding whole seconds.
fn parse_env_secs(value: &str, key: &str) -> Result<Duration, ConfigError> {
    let secs: u64 = parse_env_value(value, key)?;
    Ok(Duration::from_secs(secs))
}

/// Parse an environment variable as a boolean.
fn parse_env_bool(value: &str, key: &str) -> Result<bool, ConfigError> {
    match value.to_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Ok(true),
        "false" | "0" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::InvalidValue {
            key: key.to_string(),
            message: format!("expected boolean value, got '{}'", value),
        }),
    }
}
