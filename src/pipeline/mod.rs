//! Pipeline coordination for documentation generation.
//!
//! This module ties the stages together and owns the per-request lifecycle.
//!
//! # Architecture
//!
//! - **Config** (`config`): `ForgeConfig`, loaded from `DOCS_FORGE_*` variables
//! - **State** (`state`): the linear state machine a run moves through
//! - **Coordinator** (`coordinator`): runs one request end to end
//! - **Service** (`service`): process-wide entry point with the startup sweep
//!
//! # Pipeline Flow
//!
//! 1. **Validation**: The request is checked before any resource is taken
//! 2. **Workspace**: A fresh directory is acquired under the temp root
//! 3. **Render**: The template tree is rendered into `<workspace>/project`
//! 4. **Build**: install, extras install and compile run in order
//! 5. **Publish**: The build output is mirrored to storage
//! 6. **Release**: The workspace is removed, on success and on failure
//!
//! # Example
//!
//! ```rust,ignore
//! use docs_forge::pipeline::{DocsService, ForgeConfig};
//! use docs_forge::request::GenerationRequest;
//!
//! let config = ForgeConfig::from_env()?;
//! let service = DocsService::initialize(config).await?;
//!
//! let request = GenerationRequest::from_file(Path::new("request.json"))?;
//! match service.generate(&request).await {
//!     Ok(result) => println!("{}", result.documentation_link),
//!     Err(e) => eprintln!("{}", e.summary()),
//! }
//!
//! service.shutdown();
//! ```

pub mod config;
pub mod coordinator;
pub mod service;
pub mod state;

pub use config::{ConfigError, ForgeConfig, StorageKind, DEFAULT_RENDER_TIMEOUT};
pub use coordinator::{PipelineCoordinator, PipelineError, PipelineResult, PROJECT_DIR};
pub use service::{DocsService, ServiceError};
pub use state::{PipelineState, StateTracker};
