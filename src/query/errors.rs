//! # Query Errors
//!
//! Everything the filter compiler rejects. All of these surface to clients as
//! "Restless: Bad Arguments".

use thiserror::Error;

/// Result type for query compilation
pub type QueryResult<T> = Result<T, QueryError>;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum QueryError {
    /// The query document itself has the wrong shape
    #[error("Malformed query: {0}")]
    Malformed(String),

    #[error("Missing fieldname attribute 'name'")]
    MissingName,

    #[error("Missing operator for field '{0}'")]
    MissingOperator(String),

    #[error("Unknown operator: {0}")]
    UnknownOperator(String),

    #[error("Unknown field '{field}' on model '{model}'")]
    UnknownField { model: String, field: String },

    #[error("'{field}' on model '{model}' is not a relation")]
    NotARelation { model: String, field: String },

    #[error("'{field}' on model '{model}' is a relation, not an attribute")]
    RelationNotAttribute { model: String, field: String },

    #[error("Invalid operand for '{field}' {op}: {reason}")]
    InvalidOperand {
        field: String,
        op: String,
        reason: String,
    },

    #[error("Direction unknown: {0}")]
    UnknownDirection(String),

    #[error("Invalid parameter '{key}': {reason}")]
    InvalidParameter { key: String, reason: String },
}

impl QueryError {
    pub fn operand(field: impl Into<String>, op: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidOperand {
            field: field.into(),
            op: op.into(),
            reason: reason.into(),
        }
    }

    pub fn parameter(key: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidParameter {
            key: key.into(),
            reason: reason.into(),
        }
    }
}
