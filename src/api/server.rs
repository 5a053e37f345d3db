//! # REST Server
//!
//! axum adapter for the processor. Two routes cover every registered model:
//!
//! ```text
//! {prefix}/{collection}        GET (search), POST, PATCH/PUT/DELETE (many)
//! {prefix}/{collection}/{ids}  GET, PATCH/PUT, DELETE (single)
//! ```
//!
//! The processor is synchronous and runs on the blocking pool. Dropping the
//! handler future (client gone) cancels the request before its storage call.

use std::io;
use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::{Path, RawQuery, State},
    http::{header, HeaderMap, Method},
    response::{IntoResponse, Response},
    routing::any,
    Router,
};
use tokio::net::TcpListener;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::config::ServerConfig;
use crate::processor::{ApiError, ApiRequest, CancelFlag, Processor};

const METHOD_OVERRIDE_HEADER: &str = "x-http-method-override";

/// HTTP server exposing every registered model API
pub struct RestServer {
    processor: Arc<Processor>,
    config: ServerConfig,
}

impl RestServer {
    pub fn new(processor: Arc<Processor>, config: ServerConfig) -> Self {
        Self { processor, config }
    }

    /// Build the router (also used by tests)
    pub fn router(&self) -> Router {
        let prefix = self.processor.registry().url_prefix().to_string();

        let cors = if self.config.cors_origins.is_empty() {
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any)
        } else {
            let origins: Vec<_> = self
                .config
                .cors_origins
                .iter()
                .filter_map(|s| s.parse().ok())
                .collect();

            CorsLayer::new()
                .allow_origin(AllowOrigin::list(origins))
                .allow_methods(Any)
                .allow_headers(Any)
        };

        Router::new()
            .route(&format!("{}/:collection", prefix), any(collection_handler))
            .route(&format!("{}/:collection/:ids", prefix), any(instance_handler))
            .layer(TraceLayer::new_for_http())
            .layer(cors)
            .with_state(self.processor.clone())
    }

    pub fn socket_addr(&self) -> String {
        self.config.socket_addr()
    }

    /// Bind and serve until the listener fails
    pub async fn start(self) -> io::Result<()> {
        let addr: SocketAddr = self
            .config
            .socket_addr()
            .parse()
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, e))?;

        let listener = TcpListener::bind(addr).await?;
        info!(%addr, "Starting restless HTTP server");
        let registry = self.processor.registry();
        for collection in registry.collections() {
            info!(route = %format!("{}/{}", registry.url_prefix(), collection), "Serving");
        }

        axum::serve(listener, self.router()).await
    }
}

async fn collection_handler(
    State(processor): State<Arc<Processor>>,
    method: Method,
    Path(collection): Path<String>,
    RawQuery(query): RawQuery,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let request = build_request(method, collection, None, query, &headers, body);
    dispatch(processor, request).await
}

async fn instance_handler(
    State(processor): State<Arc<Processor>>,
    method: Method,
    Path((collection, ids)): Path<(String, String)>,
    RawQuery(query): RawQuery,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let request = build_request(method, collection, Some(ids), query, &headers, body);
    dispatch(processor, request).await
}

fn build_request(
    method: Method,
    collection: String,
    ids: Option<String>,
    query: Option<String>,
    headers: &HeaderMap,
    body: Bytes,
) -> ApiRequest {
    let header_str = |name: &str| {
        headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
    };

    ApiRequest {
        method: method.as_str().to_string(),
        collection,
        ids,
        query: query
            .map(|raw| {
                url::form_urlencoded::parse(raw.as_bytes())
                    .into_owned()
                    .collect()
            })
            .unwrap_or_default(),
        content_type: header_str(header::CONTENT_TYPE.as_str()),
        method_override: header_str(METHOD_OVERRIDE_HEADER),
        body: body.to_vec(),
    }
}

async fn dispatch(processor: Arc<Processor>, request: ApiRequest) -> Response {
    let cancel = CancelFlag::new();
    let guard = cancel.guard();

    let outcome =
        tokio::task::spawn_blocking(move || processor.handle(request, cancel)).await;
    guard.disarm();

    match outcome {
        Ok(Ok(response)) => response.into_response(),
        Ok(Err(err)) => err.into_response(),
        Err(join) => ApiError::Internal(join.to_string()).into_response(),
    }
}
