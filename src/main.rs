//! restless CLI entry point
//!
//! Installs the tracing subscriber, then delegates everything to the CLI
//! module. Errors go to stderr with a non-zero exit code.

use restless::cli;
use tracing_subscriber::EnvFilter;

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("restless=info")),
        )
        .init();

    if let Err(e) = cli::run() {
        eprintln!("{}", e);
        std::process::exit(1);
    }
}
