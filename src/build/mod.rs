//! External build orchestration.
//!
//! A rendered project is turned into a static site by three subprocess
//! stages, run in order inside the project directory:
//!
//! 1. `install` - `npm ci` from the project's lockfile
//! 2. `install-extras` - `npm install --no-save` of the pinned design-system
//!    and theme packages
//! 3. `compile` - `npm run build`
//!
//! # Example
//!
//! ```ignore
//! use docs_forge::build::{BuildConfig, BuildOrchestrator};
//! use docs_forge::execution::ProcessRunner;
//!
//! let orchestrator = BuildOrchestrator::new(BuildConfig::default(), Arc::new(ProcessRunner::new()));
//! let site = orchestrator.build(&project_dir, &request.extra_packages()).await?;
//! ```

pub mod orchestrator;
pub mod stage;

pub use orchestrator::BuildOrchestrator;
pub use stage::{
    BuildConfig, BuildStage, BuildStageResult, ExtraPackage, DEFAULT_COMPILE_TIMEOUT,
    DEFAULT_EXTRAS_TIMEOUT, DEFAULT_INSTALL_TIMEOUT, DEFAULT_OUTPUT_DIR, STAGE_COMPILE,
    STAGE_INSTALL, STAGE_INSTALL_EXTRAS,
};
