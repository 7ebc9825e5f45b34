//! Template rendering engine.
//!
//! Turns a template tree (an opaque directory supplied by the deployment)
//! into a concrete documentation project for one request.
//!
//! # Template tree contract
//!
//! - Files ending in the template suffix (`.tera` by default) are compiled
//!   against the [`RenderContext`] using `{{ key }}` substitution and written
//!   without the suffix.
//! - Every other file is copied unchanged.
//! - The component pages subtree (`docs/components` by default) holds one
//!   template per component, named after it (`Button.mdx.tera`). Only pages
//!   for requested components are produced.
//!
//! # Example
//!
//! ```ignore
//! use docs_forge::template::{RenderContext, RenderConfig, TemplateRenderer};
//!
//! let renderer = TemplateRenderer::new(RenderConfig::default());
//! let context = RenderContext::from_request(&request);
//! let summary = renderer.render(
//!     Path::new("templates/"),
//!     workspace.join("project").as_path(),
//!     &context,
//!     &request.components,
//! )?;
//! println!("rendered {} component pages", summary.component_pages.len());
//! ```

pub mod context;
pub mod renderer;

pub use context::{RenderContext, BASE_PATH};
pub use renderer::{
    RenderConfig, RenderSummary, TemplateRenderer, DEFAULT_COMPONENTS_DIR, DEFAULT_TEMPLATE_SUFFIX,
};
