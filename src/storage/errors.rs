//! # Storage Errors
//!
//! Rejections raised by a storage backend. Everything except `Internal`
//! is a client mistake that the storage layer was the first to notice.

use thiserror::Error;

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StorageError {
    #[error("Unknown column '{column}' on model '{model}'")]
    UnknownColumn { model: String, column: String },

    #[error("Unknown relation '{relation}' on model '{model}'")]
    UnknownRelation { model: String, relation: String },

    #[error("Invalid value for '{model}.{column}': expected {expected}")]
    InvalidValue {
        model: String,
        column: String,
        expected: String,
    },

    #[error("Missing value for non-nullable column '{model}.{column}'")]
    MissingValue { model: String, column: String },

    #[error("Duplicate value for unique column '{model}.{column}'")]
    UniqueViolation { model: String, column: String },

    #[error("'{model}.{column}' references a missing '{target}' row")]
    ForeignKeyViolation {
        model: String,
        column: String,
        target: String,
    },

    #[error("Cannot compare {left} with {right}")]
    TypeMismatch { left: String, right: String },

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Invalid pattern '{0}'")]
    InvalidPattern(String),

    #[error("Invalid relation traversal: {0}")]
    InvalidTraversal(String),

    #[error("Invalid ordering: {0}")]
    InvalidOrdering(String),

    #[error("No result found")]
    NoResult,

    #[error("Multiple results found")]
    MultipleResults,

    #[error("No instance of '{model}' with key {key}")]
    NoSuchInstance { model: String, key: String },

    #[error("Internal storage error: {0}")]
    Internal(String),
}
