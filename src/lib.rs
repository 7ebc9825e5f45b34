//! docs-forge: design-system documentation generator.
//!
//! This library turns a generation request (a design-system package, its
//! theme package and a list of components) into a published static
//! documentation site: it renders a template tree into a scratch workspace,
//! builds it with npm, mirrors the output to storage and always cleans up.

// Core modules
pub mod build;
pub mod cli;
pub mod error;
pub mod execution;
pub mod metrics;
pub mod pipeline;
pub mod publish;
pub mod request;
pub mod template;
pub mod workspace;

// Re-export commonly used error types
pub use error::{BuildError, PublishError, RequestError, TemplateError, WorkspaceError};
pub use pipeline::{
    ConfigError, DocsService, ForgeConfig, PipelineCoordinator, PipelineError, PipelineResult,
};
pub use request::GenerationRequest;
