//! # Registry Errors
//!
//! Configuration mistakes caught while registering model APIs. These are
//! startup failures, never request failures.

use thiserror::Error;

use crate::model::ModelError;

/// Result type for API registration
pub type RegistryResult<T> = Result<T, RegistryError>;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    #[error(transparent)]
    Model(#[from] ModelError),

    #[error("Collection '{0}' is already registered")]
    DuplicateCollection(String),

    #[error("Cannot simultaneously specify both include columns and exclude columns for '{0}'")]
    IncludeAndExclude(String),

    #[error("Invalid pagination for '{collection}': {reason}")]
    InvalidPagination { collection: String, reason: String },
}
