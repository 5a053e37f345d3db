//! # API Registry
//!
//! Maps collection names to registered model endpoints. Built once at
//! startup and shared read-only with the transport.

use std::collections::BTreeMap;
use std::sync::Arc;

use tracing::info;

use crate::config::ApiDefaults;
use crate::model::{ModelCatalog, ModelDescriptor};
use crate::processor::Hooks;
use crate::shape::{ColumnSelection, ResultShaper};

use super::config::ApiConfig;
use super::errors::{RegistryError, RegistryResult};

/// One model exposed under one collection name, with its options resolved
#[derive(Debug, Clone)]
pub struct Endpoint {
    pub collection: String,
    pub descriptor: Arc<ModelDescriptor>,
    pub config: ApiConfig,
    pub hooks: Hooks,
    pub include: Option<ColumnSelection>,
    pub exclude: Option<ColumnSelection>,
    pub results_per_page: u64,
    pub max_results_per_page: u64,
    pub max_depth: usize,
}

impl Endpoint {
    pub fn shaper(&self) -> ResultShaper {
        ResultShaper::new(self.max_depth)
            .with_include(self.include.clone())
            .with_exclude(self.exclude.clone())
    }
}

#[derive(Debug)]
pub struct ApiRegistry {
    catalog: Arc<ModelCatalog>,
    defaults: ApiDefaults,
    endpoints: BTreeMap<String, Arc<Endpoint>>,
}

impl ApiRegistry {
    pub fn new(catalog: Arc<ModelCatalog>, defaults: ApiDefaults) -> Self {
        Self {
            catalog,
            defaults,
            endpoints: BTreeMap::new(),
        }
    }

    /// Expose `model` with no hooks
    pub fn create_api(&mut self, model: &str, config: ApiConfig) -> RegistryResult<Arc<Endpoint>> {
        self.create_api_with_hooks(model, config, Hooks::new())
    }

    pub fn create_api_with_hooks(
        &mut self,
        model: &str,
        config: ApiConfig,
        hooks: Hooks,
    ) -> RegistryResult<Arc<Endpoint>> {
        let descriptor = self.catalog.get(model)?;
        let collection = config
            .collection_name
            .clone()
            .unwrap_or_else(|| descriptor.name().to_string());

        if self.endpoints.contains_key(&collection) {
            return Err(RegistryError::DuplicateCollection(collection));
        }
        if config.include_columns.is_some() && config.exclude_columns.is_some() {
            return Err(RegistryError::IncludeAndExclude(collection));
        }

        let results_per_page = config
            .results_per_page
            .unwrap_or(self.defaults.results_per_page);
        let max_results_per_page = config
            .max_results_per_page
            .unwrap_or(self.defaults.max_results_per_page);
        if results_per_page == 0 || results_per_page > max_results_per_page {
            return Err(RegistryError::InvalidPagination {
                collection,
                reason: format!(
                    "results_per_page {} must be between 1 and {}",
                    results_per_page, max_results_per_page
                ),
            });
        }

        let endpoint = Arc::new(Endpoint {
            include: config.include_columns.as_deref().map(ColumnSelection::parse),
            exclude: config.exclude_columns.as_deref().map(ColumnSelection::parse),
            max_depth: config.max_depth.unwrap_or(self.defaults.max_depth),
            collection: collection.clone(),
            descriptor,
            hooks,
            results_per_page,
            max_results_per_page,
            config,
        });

        info!(
            model = %model,
            route = %format!("{}/{}", self.url_prefix(), collection),
            methods = ?endpoint.config.methods.iter().collect::<Vec<_>>(),
            "Registered API"
        );
        self.endpoints.insert(collection, endpoint.clone());
        Ok(endpoint)
    }

    pub fn endpoint(&self, collection: &str) -> Option<Arc<Endpoint>> {
        self.endpoints.get(collection).cloned()
    }

    pub fn catalog(&self) -> &ModelCatalog {
        &self.catalog
    }

    pub fn url_prefix(&self) -> &str {
        self.defaults.url_prefix.trim_end_matches('/')
    }

    pub fn collections(&self) -> impl Iterator<Item = &str> {
        self.endpoints.keys().map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{ColumnDef, FieldType, ModelDef};

    fn registry() -> ApiRegistry {
        let mut catalog = ModelCatalog::new();
        catalog
            .register(
                ModelDef::new("person")
                    .column(ColumnDef::new("id", FieldType::Integer).primary())
                    .column(ColumnDef::new("name", FieldType::String)),
            )
            .unwrap();
        ApiRegistry::new(Arc::new(catalog), ApiDefaults::default())
    }

    #[test]
    fn test_create_api_resolves_defaults() {
        let mut registry = registry();
        let endpoint = registry
            .create_api("person", ApiConfig::new().max_depth(3))
            .unwrap();
        assert_eq!(endpoint.collection, "person");
        assert_eq!(endpoint.results_per_page, 10);
        assert_eq!(endpoint.max_results_per_page, 100);
        assert_eq!(endpoint.max_depth, 3);
        assert!(registry.endpoint("person").is_some());
        assert_eq!(registry.url_prefix(), "/api");
    }

    #[test]
    fn test_collection_names_are_unique() {
        let mut registry = registry();
        registry.create_api("person", ApiConfig::new()).unwrap();
        let err = registry.create_api("person", ApiConfig::new()).unwrap_err();
        assert_eq!(err, RegistryError::DuplicateCollection("person".into()));

        registry
            .create_api("person", ApiConfig::new().collection_name("people"))
            .unwrap();
        assert_eq!(registry.collections().collect::<Vec<_>>(), vec!["people", "person"]);
    }

    #[test]
    fn test_configuration_errors() {
        let mut registry = registry();
        assert!(matches!(
            registry.create_api("ghost", ApiConfig::new()),
            Err(RegistryError::Model(_))
        ));
        assert!(matches!(
            registry.create_api(
                "person",
                ApiConfig::new().include_columns(["name"]).exclude_columns(["id"])
            ),
            Err(RegistryError::IncludeAndExclude(_))
        ));
        assert!(matches!(
            registry.create_api("person", ApiConfig::new().results_per_page(500)),
            Err(RegistryError::InvalidPagination { .. })
        ));
    }
}
