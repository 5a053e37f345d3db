//! CLI argument definitions using clap
//!
//! Commands:
//! - restless serve --schema <path> [--config <path>] [--port <n>]
//! - restless check --schema <path>

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// restless - ReSTful JSON APIs generated from data model definitions
#[derive(Parser, Debug)]
#[command(name = "restless")]
#[command(version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Serve every schema model over HTTP, backed by in-memory storage
    Serve {
        /// Path to schema file
        #[arg(long, default_value = "./schema.json")]
        schema: PathBuf,

        /// Path to configuration file
        #[arg(long)]
        config: Option<PathBuf>,

        /// Override the configured port
        #[arg(long)]
        port: Option<u16>,

        /// Allow PATCH and DELETE on whole collections
        #[arg(long)]
        allow_patch_many: bool,
    },

    /// Validate a schema file and list the routes it would expose
    Check {
        /// Path to schema file
        #[arg(long, default_value = "./schema.json")]
        schema: PathBuf,
    },
}

impl Cli {
    /// Parse command line arguments
    pub fn parse_args() -> Self {
        Cli::parse()
    }
}
