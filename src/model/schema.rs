//! # Schema Definitions
//!
//! Serializable model definitions. A schema file is a JSON document of the
//! form `{"models": [...]}` and is turned into descriptors by the catalog.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::errors::{ModelError, ModelResult};

/// Column types supported by the schema
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldType {
    Integer,
    Number,
    String,
    Boolean,
    Datetime,
    Uuid,
    Json,
}

impl FieldType {
    /// Validate a JSON value against this field type
    pub fn validate(&self, value: &Value) -> bool {
        match self {
            FieldType::Integer => value.is_i64() || value.is_u64(),
            FieldType::Number => value.is_number(),
            FieldType::String => value.is_string(),
            FieldType::Boolean => value.is_boolean(),
            FieldType::Datetime => value
                .as_str()
                .map(|s| chrono::DateTime::parse_from_rfc3339(s).is_ok())
                .unwrap_or(false),
            FieldType::Uuid => value
                .as_str()
                .map(|s| uuid::Uuid::parse_str(s).is_ok())
                .unwrap_or(false),
            FieldType::Json => value.is_object() || value.is_array(),
        }
    }

    /// Convert a URL path segment into a key value of this type.
    ///
    /// Segments that do not parse are kept as strings; the storage layer
    /// rejects them when they are compared against typed keys.
    pub fn coerce_segment(&self, segment: &str) -> Value {
        match self {
            FieldType::Integer => segment
                .parse::<i64>()
                .map(Value::from)
                .unwrap_or_else(|_| Value::String(segment.to_string())),
            FieldType::Number => segment
                .parse::<f64>()
                .ok()
                .and_then(serde_json::Number::from_f64)
                .map(Value::Number)
                .unwrap_or_else(|| Value::String(segment.to_string())),
            FieldType::Boolean => match segment {
                "true" => Value::Bool(true),
                "false" => Value::Bool(false),
                _ => Value::String(segment.to_string()),
            },
            _ => Value::String(segment.to_string()),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            FieldType::Integer => "integer",
            FieldType::Number => "number",
            FieldType::String => "string",
            FieldType::Boolean => "boolean",
            FieldType::Datetime => "datetime",
            FieldType::Uuid => "uuid",
            FieldType::Json => "json",
        }
    }
}

/// Column definition
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnDef {
    /// Column name
    pub name: String,

    /// Column type
    #[serde(rename = "type")]
    pub field_type: FieldType,

    /// Part of the primary key
    #[serde(default)]
    pub primary: bool,

    /// Values must be unique across rows
    #[serde(default)]
    pub unique: bool,

    /// Whether null is accepted
    #[serde(default = "default_nullable")]
    pub nullable: bool,

    /// Name of the model this column references
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub foreign_key: Option<String>,
}

fn default_nullable() -> bool {
    true
}

impl ColumnDef {
    pub fn new(name: impl Into<String>, field_type: FieldType) -> Self {
        Self {
            name: name.into(),
            field_type,
            primary: false,
            unique: false,
            nullable: true,
            foreign_key: None,
        }
    }

    /// Mark as (part of) the primary key; primary keys are never nullable
    pub fn primary(mut self) -> Self {
        self.primary = true;
        self.nullable = false;
        self
    }

    pub fn unique(mut self) -> Self {
        self.unique = true;
        self
    }

    pub fn not_null(mut self) -> Self {
        self.nullable = false;
        self
    }

    /// Declare a foreign key to another model's primary key
    pub fn references(mut self, model: impl Into<String>) -> Self {
        self.foreign_key = Some(model.into());
        self
    }
}

/// Which side of a relation holds many rows
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Cardinality {
    ToOne,
    ToMany,
}

/// Relation definition
///
/// A to-one relation joins `self.foreign_key` to the target's primary key.
/// A to-many relation joins the target's `foreign_key` to this model's
/// primary key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelationDef {
    pub name: String,
    pub target: String,
    pub cardinality: Cardinality,
    pub foreign_key: String,
}

impl RelationDef {
    pub fn to_one(
        name: impl Into<String>,
        target: impl Into<String>,
        foreign_key: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            target: target.into(),
            cardinality: Cardinality::ToOne,
            foreign_key: foreign_key.into(),
        }
    }

    pub fn to_many(
        name: impl Into<String>,
        target: impl Into<String>,
        foreign_key: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            target: target.into(),
            cardinality: Cardinality::ToMany,
            foreign_key: foreign_key.into(),
        }
    }
}

/// Association proxy: exposes `relation.attribute` as an attribute of this model
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProxyDef {
    pub name: String,
    pub relation: String,
    pub attribute: String,
}

/// Definition of one model
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelDef {
    /// Model name
    pub name: String,

    #[serde(default)]
    pub columns: Vec<ColumnDef>,

    #[serde(default)]
    pub relations: Vec<RelationDef>,

    #[serde(default)]
    pub proxies: Vec<ProxyDef>,

    /// Computed attributes; their values are produced by the storage backend
    #[serde(default)]
    pub hybrids: Vec<String>,
}

impl ModelDef {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            columns: Vec::new(),
            relations: Vec::new(),
            proxies: Vec::new(),
            hybrids: Vec::new(),
        }
    }

    pub fn column(mut self, column: ColumnDef) -> Self {
        self.columns.push(column);
        self
    }

    pub fn relation(mut self, relation: RelationDef) -> Self {
        self.relations.push(relation);
        self
    }

    pub fn proxy(
        mut self,
        name: impl Into<String>,
        relation: impl Into<String>,
        attribute: impl Into<String>,
    ) -> Self {
        self.proxies.push(ProxyDef {
            name: name.into(),
            relation: relation.into(),
            attribute: attribute.into(),
        });
        self
    }

    pub fn hybrid(mut self, name: impl Into<String>) -> Self {
        self.hybrids.push(name.into());
        self
    }
}

/// A schema document listing every model
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchemaFile {
    pub models: Vec<ModelDef>,
}

impl SchemaFile {
    /// Parse a schema document from JSON text
    pub fn from_json(text: &str) -> ModelResult<Self> {
        serde_json::from_str(text).map_err(|e| ModelError::SchemaFile {
            path: "<inline>".to_string(),
            reason: e.to_string(),
        })
    }

    /// Load a schema document from disk
    pub fn load(path: &Path) -> ModelResult<Self> {
        let text = fs::read_to_string(path).map_err(|e| ModelError::SchemaFile {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;
        serde_json::from_str(&text).map_err(|e| ModelError::SchemaFile {
            path: path.display().to_string(),
            reason: e.to_string(),
        })
    }
}
