//! CLI command implementations
//!
//! `serve` exposes every model of a schema file with all methods over an
//! in-memory backend. `check` validates a schema file and prints the routes.

use std::path::Path;
use std::sync::Arc;

use tracing::info;

use crate::api::{ApiConfig, ApiRegistry, RestServer};
use crate::config::{ApiDefaults, RestlessConfig};
use crate::model::{ModelCatalog, SchemaFile};
use crate::processor::Processor;
use crate::storage::MemoryStorage;

use super::args::{Cli, Command};
use super::errors::{CliError, CliResult};

/// Parse arguments and run the selected command
pub fn run() -> CliResult<()> {
    let cli = Cli::parse_args();
    run_command(cli.command)
}

pub fn run_command(command: Command) -> CliResult<()> {
    match command {
        Command::Serve {
            schema,
            config,
            port,
            allow_patch_many,
        } => serve(&schema, config.as_deref(), port, allow_patch_many),
        Command::Check { schema } => {
            for route in check(&schema)? {
                println!("{}", route);
            }
            Ok(())
        }
    }
}

/// Load and validate a schema file
pub fn load_catalog(schema: &Path) -> CliResult<Arc<ModelCatalog>> {
    let catalog = ModelCatalog::from_schema(SchemaFile::load(schema)?)?;
    if catalog.is_empty() {
        return Err(CliError::schema_error(format!(
            "{} defines no models",
            schema.display()
        )));
    }
    Ok(Arc::new(catalog))
}

/// Register every catalog model with all methods enabled
pub fn build_registry(
    catalog: Arc<ModelCatalog>,
    defaults: ApiDefaults,
    allow_patch_many: bool,
) -> CliResult<ApiRegistry> {
    let names: Vec<String> = catalog.names().map(str::to_string).collect();
    let mut registry = ApiRegistry::new(catalog, defaults);
    for name in names {
        registry.create_api(
            &name,
            ApiConfig::new()
                .all_methods()
                .allow_patch_many(allow_patch_many),
        )?;
    }
    Ok(registry)
}

pub fn serve(
    schema: &Path,
    config: Option<&Path>,
    port: Option<u16>,
    allow_patch_many: bool,
) -> CliResult<()> {
    let mut config = match config {
        Some(path) => RestlessConfig::load(path)?,
        None => RestlessConfig::default(),
    };
    if let Some(port) = port {
        config.server.port = port;
    }

    let catalog = load_catalog(schema)?;
    info!(models = catalog.len(), schema = %schema.display(), "Loaded schema");
    let registry = build_registry(catalog.clone(), config.api.clone(), allow_patch_many)?;
    let storage = Arc::new(MemoryStorage::new(catalog));
    let processor = Arc::new(Processor::new(Arc::new(registry), storage));
    let server = RestServer::new(processor, config.server);

    let runtime = tokio::runtime::Runtime::new()?;
    runtime.block_on(server.start())?;
    Ok(())
}

/// Routes the schema would expose, one `METHODS path` line per route
pub fn check(schema: &Path) -> CliResult<Vec<String>> {
    let catalog = load_catalog(schema)?;
    let registry = build_registry(catalog, ApiDefaults::default(), false)?;
    let prefix = registry.url_prefix();

    Ok(registry
        .collections()
        .flat_map(|collection| {
            [
                format!("GET, POST {}/{}", prefix, collection),
                format!("GET, PATCH, PUT, DELETE {}/{}/<id[,id...]>", prefix, collection),
            ]
        })
        .collect())
}
