//! CLI module for restless
//!
//! Provides command-line interface for:
//! - serve: Expose a schema's models over HTTP
//! - check: Validate a schema file and list its routes

mod args;
mod commands;
mod errors;

pub use args::{Cli, Command};
pub use commands::{build_registry, check, load_catalog, run, run_command, serve};
pub use errors::{CliError, CliErrorCode, CliResult};
