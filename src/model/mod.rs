//! # Model Descriptors
//!
//! Read-only introspection over the data models exposed through the API.
//! Descriptors are built once from a schema definition and shared by every
//! request; nothing here is mutated after registration.

mod catalog;
mod descriptor;
mod errors;
mod schema;

pub use catalog::ModelCatalog;
pub use descriptor::{AttributeKind, ModelDescriptor};
pub use errors::{ModelError, ModelResult};
pub use schema::{Cardinality, ColumnDef, FieldType, ModelDef, ProxyDef, RelationDef, SchemaFile};
