//! Command-line interface for docs-forge.
//!
//! Provides commands for generating documentation, sweeping orphaned
//! workspaces and checking configuration.

mod commands;

pub use commands::{parse_cli, run, run_with_cli, Cli, Commands};
