//! # Model Catalog
//!
//! Name → descriptor registry shared read-only by every request.

use std::collections::BTreeMap;
use std::sync::Arc;

use super::descriptor::ModelDescriptor;
use super::errors::{ModelError, ModelResult};
use super::schema::{Cardinality, ModelDef, SchemaFile};

/// All registered models
#[derive(Debug, Clone, Default)]
pub struct ModelCatalog {
    models: BTreeMap<String, Arc<ModelDescriptor>>,
}

impl ModelCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register every model of a schema document and validate cross references
    pub fn from_schema(schema: SchemaFile) -> ModelResult<Self> {
        let mut catalog = Self::new();
        for def in schema.models {
            catalog.register(def)?;
        }
        catalog.validate()?;
        Ok(catalog)
    }

    /// Register one model
    pub fn register(&mut self, def: ModelDef) -> ModelResult<Arc<ModelDescriptor>> {
        if self.models.contains_key(&def.name) {
            return Err(ModelError::invalid(&def.name, "model is already registered"));
        }
        let descriptor = Arc::new(ModelDescriptor::from_def(def)?);
        self.models
            .insert(descriptor.name().to_string(), Arc::clone(&descriptor));
        Ok(descriptor)
    }

    /// Check that every relation and foreign key points at a registered model
    pub fn validate(&self) -> ModelResult<()> {
        for model in self.models.values() {
            for relation in model.relations().values() {
                let target = self.models.get(&relation.target).ok_or_else(|| {
                    ModelError::invalid(
                        model.name(),
                        format!(
                            "relation '{}' targets unknown model '{}'",
                            relation.name, relation.target
                        ),
                    )
                })?;

                // Relations join a single foreign key column to a single primary key.
                let joined_pk = match relation.cardinality {
                    Cardinality::ToOne => target.primary_keys(),
                    Cardinality::ToMany => model.primary_keys(),
                };
                if joined_pk.len() != 1 {
                    return Err(ModelError::invalid(
                        model.name(),
                        format!(
                            "relation '{}' joins a model with a composite primary key",
                            relation.name
                        ),
                    ));
                }

                if relation.cardinality == Cardinality::ToMany
                    && target.column(&relation.foreign_key).is_none()
                {
                    return Err(ModelError::invalid(
                        model.name(),
                        format!(
                            "to-many relation '{}' uses unknown column '{}.{}'",
                            relation.name, relation.target, relation.foreign_key
                        ),
                    ));
                }
            }

            for (column, target) in model.foreign_keys() {
                if !self.models.contains_key(target) {
                    return Err(ModelError::invalid(
                        model.name(),
                        format!("column '{}' references unknown model '{}'", column, target),
                    ));
                }
            }
        }
        Ok(())
    }

    /// Look up a model, failing with `UnknownModel`
    pub fn get(&self, name: &str) -> ModelResult<Arc<ModelDescriptor>> {
        self.models
            .get(name)
            .cloned()
            .ok_or_else(|| ModelError::UnknownModel(name.to_string()))
    }

    pub fn lookup(&self, name: &str) -> Option<&Arc<ModelDescriptor>> {
        self.models.get(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.models.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.models.len()
    }

    pub fn is_empty(&self) -> bool {
        self.models.is_empty()
    }
}
