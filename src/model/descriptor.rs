//! # Model Descriptor
//!
//! Precomputed introspection view over one model. Every lookup answers from
//! maps built at registration time.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use super::errors::{ModelError, ModelResult};
use super::schema::{Cardinality, ColumnDef, ModelDef, ProxyDef, RelationDef};

/// What an attribute name resolves to on a model
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AttributeKind {
    Column,
    Relation,
    Hybrid,
    Proxy,
}

/// Read-only description of one model
#[derive(Debug, Clone)]
pub struct ModelDescriptor {
    name: String,
    columns: Vec<ColumnDef>,
    column_index: HashMap<String, usize>,
    primary_keys: Vec<String>,
    unique_keys: BTreeSet<String>,
    foreign_keys: BTreeMap<String, String>,
    relations: BTreeMap<String, RelationDef>,
    hybrids: BTreeSet<String>,
    proxies: BTreeMap<String, ProxyDef>,
    attributes: BTreeSet<String>,
    kinds: HashMap<String, AttributeKind>,
}

impl ModelDescriptor {
    /// Build a descriptor, validating the definition's internal consistency.
    ///
    /// Cross-model checks (relation targets) are done by the catalog.
    pub fn from_def(def: ModelDef) -> ModelResult<Self> {
        let ModelDef {
            name,
            columns,
            relations,
            proxies,
            hybrids,
        } = def;

        if name.is_empty() {
            return Err(ModelError::invalid("<unnamed>", "model name is empty"));
        }

        let mut kinds: HashMap<String, AttributeKind> = HashMap::new();
        let mut claim = |attr: &str, kind: AttributeKind| -> ModelResult<()> {
            if kinds.insert(attr.to_string(), kind).is_some() {
                return Err(ModelError::invalid(
                    &name,
                    format!("attribute '{}' is declared more than once", attr),
                ));
            }
            Ok(())
        };

        for column in &columns {
            claim(&column.name, AttributeKind::Column)?;
        }
        for relation in &relations {
            claim(&relation.name, AttributeKind::Relation)?;
        }
        for hybrid in &hybrids {
            claim(hybrid, AttributeKind::Hybrid)?;
        }
        for proxy in &proxies {
            claim(&proxy.name, AttributeKind::Proxy)?;
        }

        let column_index: HashMap<String, usize> = columns
            .iter()
            .enumerate()
            .map(|(i, c)| (c.name.clone(), i))
            .collect();

        let primary_keys: Vec<String> = columns
            .iter()
            .filter(|c| c.primary)
            .map(|c| c.name.clone())
            .collect();
        if primary_keys.is_empty() {
            return Err(ModelError::invalid(&name, "no primary key column"));
        }

        let unique_keys = columns
            .iter()
            .filter(|c| c.unique)
            .map(|c| c.name.clone())
            .collect();

        let foreign_keys = columns
            .iter()
            .filter_map(|c| c.foreign_key.as_ref().map(|t| (c.name.clone(), t.clone())))
            .collect();

        for relation in &relations {
            if relation.cardinality == Cardinality::ToOne
                && !column_index.contains_key(&relation.foreign_key)
            {
                return Err(ModelError::invalid(
                    &name,
                    format!(
                        "to-one relation '{}' uses unknown local column '{}'",
                        relation.name, relation.foreign_key
                    ),
                ));
            }
        }
        let relations: BTreeMap<String, RelationDef> = relations
            .into_iter()
            .map(|r| (r.name.clone(), r))
            .collect();

        for proxy in &proxies {
            if !relations.contains_key(&proxy.relation) {
                return Err(ModelError::invalid(
                    &name,
                    format!(
                        "proxy '{}' goes through unknown relation '{}'",
                        proxy.name, proxy.relation
                    ),
                ));
            }
        }
        let proxies = proxies.into_iter().map(|p| (p.name.clone(), p)).collect();

        let hybrids = hybrids.into_iter().collect();

        // Relations are addressable by path but are not plain attributes.
        let attributes = kinds
            .iter()
            .filter(|(_, kind)| **kind != AttributeKind::Relation)
            .map(|(attr, _)| attr.clone())
            .collect();

        Ok(Self {
            name,
            columns,
            column_index,
            primary_keys,
            unique_keys,
            foreign_keys,
            relations,
            hybrids,
            proxies,
            attributes,
            kinds,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Primary key column names in declaration order
    pub fn primary_keys(&self) -> &[String] {
        &self.primary_keys
    }

    pub fn unique_keys(&self) -> &BTreeSet<String> {
        &self.unique_keys
    }

    /// Foreign key column → referenced model
    pub fn foreign_keys(&self) -> &BTreeMap<String, String> {
        &self.foreign_keys
    }

    /// Columns, hybrids and proxies
    pub fn attributes(&self) -> &BTreeSet<String> {
        &self.attributes
    }

    pub fn columns(&self) -> &[ColumnDef] {
        &self.columns
    }

    pub fn column(&self, name: &str) -> Option<&ColumnDef> {
        self.column_index.get(name).map(|i| &self.columns[*i])
    }

    pub fn relations(&self) -> &BTreeMap<String, RelationDef> {
        &self.relations
    }

    pub fn relation(&self, name: &str) -> Option<&RelationDef> {
        self.relations.get(name)
    }

    pub fn hybrids(&self) -> &BTreeSet<String> {
        &self.hybrids
    }

    pub fn proxies(&self) -> &BTreeMap<String, ProxyDef> {
        &self.proxies
    }

    pub fn proxy(&self, name: &str) -> Option<&ProxyDef> {
        self.proxies.get(name)
    }

    /// Classify a name declared on this model
    pub fn kind_of(&self, name: &str) -> Option<AttributeKind> {
        self.kinds.get(name).copied()
    }
}
