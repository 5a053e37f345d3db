//! # API Errors
//!
//! The pipeline's error taxonomy and its mapping to HTTP responses.
//!
//! The status code and body shape depend only on the taxonomy kind, so a
//! client can always tell which layer rejected its request.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use thiserror::Error;

use crate::model::ModelError;
use crate::query::QueryError;
use crate::storage::StorageError;

use super::hooks::HookAbort;

/// Result type for pipeline operations
pub type ApiResult<T> = Result<T, ApiError>;

/// Body key for request problems found before storage is touched
pub const BAD_ARGUMENTS_TAG: &str = "Restless: Bad Arguments";

/// Body key for request problems only the storage backend noticed
pub const STORAGE_BAD_ARGUMENTS_TAG: &str = "Storage: Bad Arguments";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    BadArguments,
    StorageBadArguments,
    UnknownModel,
    HookAbort,
    UnsupportedContentType,
    MethodNotAllowed,
    Forbidden,
    InstanceNotFound,
    Cancelled,
    Internal,
}

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    BadArguments(String),

    #[error("{0}")]
    StorageBadArguments(String),

    #[error("Unknown model or collection: {0}")]
    UnknownModel(String),

    #[error(transparent)]
    HookAbort(#[from] HookAbort),

    #[error("Unsupported content type: {0}")]
    UnsupportedContentType(String),

    #[error("Method {0} not allowed")]
    MethodNotAllowed(String),

    #[error("{0}")]
    Forbidden(String),

    #[error("{0}")]
    InstanceNotFound(String),

    #[error("Request cancelled")]
    Cancelled,

    #[error("Internal error: {0}")]
    Internal(String),
}

impl ApiError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::BadArguments(_) => ErrorKind::BadArguments,
            Self::StorageBadArguments(_) => ErrorKind::StorageBadArguments,
            Self::UnknownModel(_) => ErrorKind::UnknownModel,
            Self::HookAbort(_) => ErrorKind::HookAbort,
            Self::UnsupportedContentType(_) => ErrorKind::UnsupportedContentType,
            Self::MethodNotAllowed(_) => ErrorKind::MethodNotAllowed,
            Self::Forbidden(_) => ErrorKind::Forbidden,
            Self::InstanceNotFound(_) => ErrorKind::InstanceNotFound,
            Self::Cancelled => ErrorKind::Cancelled,
            Self::Internal(_) => ErrorKind::Internal,
        }
    }

    /// Get HTTP status code for this error
    pub fn status_code(&self) -> u16 {
        match self {
            Self::BadArguments(_) | Self::StorageBadArguments(_) => 404,
            Self::UnknownModel(_) => 404,
            Self::HookAbort(abort) => abort.status,
            Self::UnsupportedContentType(_) => 415,
            Self::MethodNotAllowed(_) => 405,
            Self::Forbidden(_) => 403,
            Self::InstanceNotFound(_) => 404,
            // Client closed request
            Self::Cancelled => 499,
            Self::Internal(_) => 500,
        }
    }

    /// JSON body sent to the client
    pub fn body(&self) -> Value {
        match self {
            Self::BadArguments(message) => json!({ BAD_ARGUMENTS_TAG: message }),
            Self::StorageBadArguments(message) => json!({ STORAGE_BAD_ARGUMENTS_TAG: message }),
            Self::HookAbort(abort) => abort
                .body
                .clone()
                .unwrap_or_else(|| json!({ "message": abort.message })),
            other => serde_json::to_value(ErrorResponse {
                error: other.to_string(),
                code: other.status_code(),
            })
            .unwrap_or(Value::Null),
        }
    }
}

impl From<QueryError> for ApiError {
    fn from(err: QueryError) -> Self {
        Self::BadArguments(err.to_string())
    }
}

impl From<StorageError> for ApiError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::NoSuchInstance { .. } => Self::InstanceNotFound(err.to_string()),
            StorageError::Internal(message) => Self::Internal(message),
            other => Self::StorageBadArguments(other.to_string()),
        }
    }
}

impl From<ModelError> for ApiError {
    fn from(err: ModelError) -> Self {
        match err {
            ModelError::UnknownModel(name) => Self::UnknownModel(name),
            other => Self::Internal(other.to_string()),
        }
    }
}

/// Error response body
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: u16,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status =
            StatusCode::from_u16(self.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        (status, Json(self.body())).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bad_arguments_are_tagged_by_layer() {
        let compiler: ApiError = QueryError::UnknownOperator("~=".into()).into();
        assert_eq!(compiler.kind(), ErrorKind::BadArguments);
        assert_eq!(compiler.status_code(), 404);
        assert_eq!(
            compiler.body(),
            json!({"Restless: Bad Arguments": "Unknown operator: ~="})
        );

        let storage: ApiError = StorageError::TypeMismatch {
            left: "number".into(),
            right: "string".into(),
        }
        .into();
        assert_eq!(storage.kind(), ErrorKind::StorageBadArguments);
        assert_eq!(storage.status_code(), 404);
        assert!(storage.body().get(STORAGE_BAD_ARGUMENTS_TAG).is_some());
    }

    #[test]
    fn test_hook_abort_passes_through() {
        let err: ApiError = HookAbort::new(401, "Not authorized").into();
        assert_eq!(err.status_code(), 401);
        assert_eq!(err.body(), json!({"message": "Not authorized"}));

        let err: ApiError = HookAbort::new(418, "teapot")
            .with_body(json!({"brew": false}))
            .into();
        assert_eq!(err.status_code(), 418);
        assert_eq!(err.body(), json!({"brew": false}));
    }

    #[test]
    fn test_storage_error_classification() {
        let missing: ApiError = StorageError::NoSuchInstance {
            model: "person".into(),
            key: "[1]".into(),
        }
        .into();
        assert_eq!(missing.kind(), ErrorKind::InstanceNotFound);

        let internal: ApiError = StorageError::Internal("poisoned".into()).into();
        assert_eq!(internal.status_code(), 500);
        assert_eq!(internal.body()["code"], json!(500));
    }

    #[test]
    fn test_unknown_model() {
        let err: ApiError = ModelError::UnknownModel("ghost".into()).into();
        assert_eq!(err.kind(), ErrorKind::UnknownModel);
        assert_eq!(err.status_code(), 404);
    }
}
