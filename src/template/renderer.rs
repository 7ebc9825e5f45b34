//! Template tree rendering.
//!
//! Mirrors a template directory into a project directory:
//! - directories are recreated,
//! - files ending in the template suffix are compiled with Tera and written
//!   without the suffix,
//! - everything else is copied byte-for-byte,
//! - inside the component pages subtree, templates for components the
//!   request did not ask for are skipped.
//!
//! The walk is sorted and the output contains nothing time- or
//! randomness-dependent, so identical inputs give identical trees.

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info, warn};
use walkdir::WalkDir;

use crate::error::TemplateError;

use super::context::RenderContext;

/// Default suffix marking a file as a template.
pub const DEFAULT_TEMPLATE_SUFFIX: &str = ".tera";

/// Default location of per-component pages, relative to the template root.
pub const DEFAULT_COMPONENTS_DIR: &str = "docs/components";

/// Renderer settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderConfig {
    /// File-name suffix that marks a template.
    pub template_suffix: String,
    /// Subtree holding one template per component, relative to the root.
    pub components_dir: PathBuf,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            template_suffix: DEFAULT_TEMPLATE_SUFFIX.to_string(),
            components_dir: PathBuf::from(DEFAULT_COMPONENTS_DIR),
        }
    }
}

impl RenderConfig {
    /// Creates the default configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the template suffix.
    pub fn with_template_suffix(mut self, suffix: impl Into<String>) -> Self {
        self.template_suffix = suffix.into();
        self
    }

    /// Sets the component pages subtree.
    pub fn with_components_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.components_dir = dir.into();
        self
    }
}

/// What a render produced.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RenderSummary {
    /// Templates compiled and written.
    pub rendered: usize,
    /// Files copied verbatim.
    pub copied: usize,
    /// Directories created.
    pub directories: usize,
    /// Component pages rendered, in walk order.
    pub component_pages: Vec<String>,
    /// Component templates skipped by the filter.
    pub skipped_pages: Vec<PathBuf>,
}

/// Renders template trees into project directories.
#[derive(Debug, Clone, Default)]
pub struct TemplateRenderer {
    config: RenderConfig,
}

impl TemplateRenderer {
    /// Creates a renderer.
    pub fn new(config: RenderConfig) -> Self {
        Self { config }
    }

    /// The renderer settings.
    pub fn config(&self) -> &RenderConfig {
        &self.config
    }

    /// Renders `template_root` into `output_root`.
    ///
    /// Any I/O or compile error aborts the render; whatever was already
    /// written stays in `output_root` for the caller to clean up.
    pub fn render(
        &self,
        template_root: &Path,
        output_root: &Path,
        context: &RenderContext,
        allowed_components: &[String],
    ) -> Result<RenderSummary, TemplateError> {
        let never = AtomicBool::new(false);
        self.render_inner(template_root, output_root, context, allowed_components, &never)
    }

    /// Renders on the blocking pool, giving up after `timeout`.
    ///
    /// On timeout the walk is told to stop and is awaited before returning,
    /// so nothing writes into `output_root` after this resolves.
    pub async fn render_with_timeout(
        &self,
        template_root: PathBuf,
        output_root: PathBuf,
        context: RenderContext,
        allowed_components: Vec<String>,
        timeout: Duration,
    ) -> Result<RenderSummary, TemplateError> {
        let renderer = self.clone();
        let cancel = Arc::new(AtomicBool::new(false));
        let task_cancel = Arc::clone(&cancel);

        let mut task = tokio::task::spawn_blocking(move || {
            renderer.render_inner(
                &template_root,
                &output_root,
                &context,
                &allowed_components,
                &task_cancel,
            )
        });

        match tokio::time::timeout(timeout, &mut task).await {
            Ok(Ok(result)) => result,
            Ok(Err(e)) => Err(TemplateError::Task(e.to_string())),
            Err(_) => {
                cancel.store(true, Ordering::SeqCst);
                let _ = task.await;
                Err(TemplateError::Timeout(timeout))
            }
        }
    }

    fn render_inner(
        &self,
        template_root: &Path,
        output_root: &Path,
        context: &RenderContext,
        allowed_components: &[String],
        cancel: &AtomicBool,
    ) -> Result<RenderSummary, TemplateError> {
        if !template_root.is_dir() {
            return Err(TemplateError::MissingRoot(template_root.to_path_buf()));
        }

        let allowed: HashSet<&str> = allowed_components.iter().map(String::as_str).collect();
        let tera_context = context.to_tera();
        let mut summary = RenderSummary::default();

        fs::create_dir_all(output_root).map_err(|e| TemplateError::Write {
            path: output_root.to_path_buf(),
            source: e,
        })?;

        let walker = WalkDir::new(template_root)
            .follow_links(false)
            .sort_by_file_name()
            .min_depth(1);

        for entry in walker {
            if cancel.load(Ordering::SeqCst) {
                return Err(TemplateError::Task("render cancelled".to_string()));
            }

            let entry = entry.map_err(|e| TemplateError::Walk {
                path: e
                    .path()
                    .map(Path::to_path_buf)
                    .unwrap_or_else(|| template_root.to_path_buf()),
                message: e.to_string(),
            })?;
            let relative = entry
                .path()
                .strip_prefix(template_root)
                .unwrap_or(entry.path());
            let target = output_root.join(relative);
            let file_type = entry.file_type();

            if file_type.is_dir() {
                fs::create_dir_all(&target).map_err(|e| TemplateError::Write {
                    path: target.clone(),
                    source: e,
                })?;
                summary.directories += 1;
            } else if file_type.is_file() {
                self.render_file(entry.path(), relative, &target, &tera_context, &allowed, &mut summary)?;
            } else {
                warn!(path = %entry.path().display(), "Skipping non-regular file in template tree");
            }
        }

        info!(
            rendered = summary.rendered,
            copied = summary.copied,
            component_pages = summary.component_pages.len(),
            skipped_pages = summary.skipped_pages.len(),
            "Rendered template tree"
        );

        Ok(summary)
    }

    fn render_file(
        &self,
        source: &Path,
        relative: &Path,
        target: &Path,
        tera_context: &tera::Context,
        allowed: &HashSet<&str>,
        summary: &mut RenderSummary,
    ) -> Result<(), TemplateError> {
        let file_name = relative
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();

        let stripped = match file_name.strip_suffix(self.config.template_suffix.as_str()) {
            Some(stripped) if !stripped.is_empty() => stripped,
            _ => {
                fs::copy(source, target).map_err(|e| TemplateError::Copy {
                    from: source.to_path_buf(),
                    to: target.to_path_buf(),
                    source: e,
                })?;
                summary.copied += 1;
                return Ok(());
            }
        };

        if relative.starts_with(&self.config.components_dir) {
            let component = component_name(stripped);
            if !allowed.contains(component) {
                debug!(path = %relative.display(), component, "Skipping unrequested component page");
                summary.skipped_pages.push(relative.to_path_buf());
                return Ok(());
            }
            summary.component_pages.push(component.to_string());
        }

        let template = fs::read_to_string(source).map_err(|e| TemplateError::Read {
            path: source.to_path_buf(),
            source: e,
        })?;
        let rendered = tera::Tera::one_off(&template, tera_context, false).map_err(|e| {
            TemplateError::Compile {
                path: source.to_path_buf(),
                message: describe_tera_error(&e),
            }
        })?;

        let target = target.with_file_name(stripped);
        fs::write(&target, rendered).map_err(|e| TemplateError::Write {
            path: target.clone(),
            source: e,
        })?;
        summary.rendered += 1;

        Ok(())
    }
}

/// Component name embedded in a page's file name: everything before the
/// first `.` (`Button.mdx` is the page for `Button`).
fn component_name(file_name: &str) -> &str {
    file_name.split('.').next().unwrap_or(file_name)
}

/// Flattens a Tera error and its causes into one line.
fn describe_tera_error(err: &tera::Error) -> String {
    let mut message = err.to_string();
    let mut source = std::error::Error::source(err);
    while let Some(cause) = source {
        message.push_str(": ");
        message.push_str(&cause.to_string());
        source = std::error::Error::source(cause);
    }
    message
}
