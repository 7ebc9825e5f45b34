//! Process execution layer for docs-forge.
//!
//! All external tools are black boxes with an exit-code contract. This module
//! provides the one place where they are spawned, timed out, and have their
//! output captured.
//!
//! # Example
//!
//! ```ignore
//! use docs_forge::execution::{CommandRunner, CommandSpec, ProcessRunner};
//! use std::time::Duration;
//!
//! let spec = CommandSpec::new("npm")
//!     .args(["run", "build"])
//!     .current_dir("/tmp/docs-forge-abc/project")
//!     .with_timeout(Duration::from_secs(1200));
//!
//! let output = ProcessRunner::new().run(&spec).await?;
//! if !output.success() {
//!     eprintln!("{}", output.diagnostics());
//! }
//! ```

pub mod command;

pub use command::{
    CommandError, CommandOutput, CommandRunner, CommandSpec, ProcessRunner,
    DEFAULT_MAX_OUTPUT_BYTES,
};
