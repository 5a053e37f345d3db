//! # Request and Response
//!
//! Transport-independent request/response values. The axum adapter fills an
//! `ApiRequest` from the HTTP request; tests build them directly.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::Value;

/// One API call as received from the transport
#[derive(Debug, Clone, Default)]
pub struct ApiRequest {
    pub method: String,
    pub collection: String,
    /// Raw instance id segment, e.g. `"1,2"`
    pub ids: Option<String>,
    /// Decoded query string pairs in arrival order
    pub query: Vec<(String, String)>,
    pub content_type: Option<String>,
    /// Value of `X-HTTP-Method-Override`
    pub method_override: Option<String>,
    pub body: Vec<u8>,
}

impl ApiRequest {
    pub fn new(method: impl Into<String>, collection: impl Into<String>) -> Self {
        Self {
            method: method.into(),
            collection: collection.into(),
            ..Default::default()
        }
    }

    pub fn with_ids(mut self, ids: impl Into<String>) -> Self {
        self.ids = Some(ids.into());
        self
    }

    pub fn with_query(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push((key.into(), value.into()));
        self
    }

    /// Set the `q` query argument from a JSON value
    pub fn with_q(self, q: &Value) -> Self {
        self.with_query("q", q.to_string())
    }

    pub fn with_json(mut self, body: &Value) -> Self {
        self.content_type = Some("application/json".to_string());
        self.body = body.to_string().into_bytes();
        self
    }

    pub fn with_body(mut self, content_type: impl Into<String>, body: impl Into<Vec<u8>>) -> Self {
        self.content_type = Some(content_type.into());
        self.body = body.into();
        self
    }

    pub fn with_method_override(mut self, method: impl Into<String>) -> Self {
        self.method_override = Some(method.into());
        self
    }

    /// Last value for a query string key
    pub fn query_arg(&self, key: &str) -> Option<&str> {
        self.query
            .iter()
            .rev()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }
}

/// Status and optional JSON body produced by the pipeline
#[derive(Debug, Clone, PartialEq)]
pub struct ApiResponse {
    pub status: u16,
    pub body: Option<Value>,
}

impl ApiResponse {
    pub fn ok(body: Value) -> Self {
        Self {
            status: 200,
            body: Some(body),
        }
    }

    pub fn created(body: Value) -> Self {
        Self {
            status: 201,
            body: Some(body),
        }
    }

    pub fn no_content() -> Self {
        Self {
            status: 204,
            body: None,
        }
    }
}

impl IntoResponse for ApiResponse {
    fn into_response(self) -> Response {
        let status = StatusCode::from_u16(self.status).unwrap_or(StatusCode::OK);
        match self.body {
            Some(body) => (status, Json(body)).into_response(),
            None => status.into_response(),
        }
    }
}
