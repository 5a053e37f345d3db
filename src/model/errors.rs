//! # Model Errors

use thiserror::Error;

/// Result type for model registration and lookup
pub type ModelResult<T> = Result<T, ModelError>;

/// Errors raised while registering or looking up models
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ModelError {
    /// A model name that was never registered
    #[error("Unknown model: {0}")]
    UnknownModel(String),

    /// A model definition that cannot be turned into a descriptor
    #[error("Invalid model '{model}': {reason}")]
    InvalidDefinition { model: String, reason: String },

    /// A schema file that could not be read or parsed
    #[error("Failed to load schema file {path}: {reason}")]
    SchemaFile { path: String, reason: String },
}

impl ModelError {
    /// Create an invalid definition error
    pub fn invalid(model: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidDefinition {
            model: model.into(),
            reason: reason.into(),
        }
    }
}
