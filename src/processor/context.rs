//! # Processor Context
//!
//! Per-request state threaded through every stage and handed to hooks by
//! mutable reference. Nothing in here is shared between requests.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use serde_json::{json, Map, Value};
use uuid::Uuid;

use crate::model::ModelDescriptor;
use crate::query::QueryPlan;
use crate::storage::Row;

use super::errors::ApiError;
use super::hooks::{Scope, Verb};

/// Pipeline stage reached by a request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Received,
    Prepared,
    Filtered,
    Executed,
    Shaped,
    Responded,
    Failed,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Received => "received",
            Self::Prepared => "prepared",
            Self::Filtered => "filtered",
            Self::Executed => "executed",
            Self::Shaped => "shaped",
            Self::Responded => "responded",
            Self::Failed => "failed",
        }
    }
}

/// Cancellation signal shared between the transport and the pipeline
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    /// Guard that cancels the flag when dropped unless disarmed first.
    /// The transport holds one for as long as the client is waiting.
    pub fn guard(&self) -> CancelOnDrop {
        CancelOnDrop {
            flag: self.clone(),
            armed: true,
        }
    }
}

pub struct CancelOnDrop {
    flag: CancelFlag,
    armed: bool,
}

impl CancelOnDrop {
    pub fn disarm(mut self) {
        self.armed = false;
    }
}

impl Drop for CancelOnDrop {
    fn drop(&mut self) {
        if self.armed {
            self.flag.cancel();
        }
    }
}

/// Request state visible to hooks
#[derive(Debug, Clone)]
pub struct ProcessorContext {
    pub request_id: Uuid,
    pub model: Arc<ModelDescriptor>,
    pub verb: Verb,
    pub scope: Scope,
    pub stage: Stage,

    /// Scratch space for hooks to pass values to later hooks
    pub handler_state: Map<String, Value>,

    /// Raw query description (`q`) before compilation
    pub search_params: Value,

    /// Compiled query, set once the request passes the filter stage
    pub filters: Option<QueryPlan>,

    /// Primary key tuples addressed by a single-instance request
    pub instance_ids: Vec<Vec<Value>>,

    /// Incoming values for POST and PATCH
    pub data: Row,

    /// Shaped response body, available to post hooks
    pub result: Option<Value>,

    pub cancel: CancelFlag,
    started_at: Instant,
}

impl ProcessorContext {
    pub fn new(model: Arc<ModelDescriptor>, verb: Verb, scope: Scope) -> Self {
        Self {
            request_id: Uuid::new_v4(),
            model,
            verb,
            scope,
            stage: Stage::Received,
            handler_state: Map::new(),
            search_params: Value::Null,
            filters: None,
            instance_ids: Vec::new(),
            data: Row::new(),
            result: None,
            cancel: CancelFlag::new(),
            started_at: Instant::now(),
        }
    }

    pub fn with_cancel(mut self, cancel: CancelFlag) -> Self {
        self.cancel = cancel;
        self
    }

    /// Append a filter object to the raw query so it is compiled together
    /// with the client's filters
    pub fn push_filter(&mut self, filter: Value) {
        match &mut self.search_params {
            Value::Array(filters) => filters.push(filter),
            Value::Object(query) => {
                match query.get_mut("filters") {
                    Some(Value::Array(filters)) => filters.push(filter),
                    _ => {
                        query.insert("filters".to_string(), json!([filter]));
                    }
                }
            }
            other => *other = json!({ "filters": [filter] }),
        }
    }

    /// Fails once the transport has given up on this request
    pub fn ensure_active(&self) -> Result<(), ApiError> {
        if self.cancel.is_cancelled() {
            Err(ApiError::Cancelled)
        } else {
            Ok(())
        }
    }

    pub fn elapsed_ms(&self) -> u64 {
        self.started_at.elapsed().as_millis() as u64
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{ColumnDef, FieldType, ModelDef};

    fn context() -> ProcessorContext {
        let model = ModelDescriptor::from_def(
            ModelDef::new("person").column(ColumnDef::new("id", FieldType::Integer).primary()),
        )
        .unwrap();
        ProcessorContext::new(Arc::new(model), Verb::Get, Scope::Many)
    }

    #[test]
    fn test_push_filter_into_each_query_form() {
        let extra = json!({"name": "id", "op": "gt", "val": 1});

        let mut ctx = context();
        ctx.push_filter(extra.clone());
        assert_eq!(ctx.search_params, json!({"filters": [extra]}));

        let mut ctx = context();
        ctx.search_params = json!([{"name": "id", "op": "lt", "val": 9}]);
        ctx.push_filter(extra.clone());
        assert_eq!(ctx.search_params.as_array().unwrap().len(), 2);

        let mut ctx = context();
        ctx.search_params = json!({"order_by": [{"field": "id"}], "limit": 3});
        ctx.push_filter(extra.clone());
        assert_eq!(ctx.search_params["filters"], json!([extra]));
        assert_eq!(ctx.search_params["limit"], json!(3));
    }

    #[test]
    fn test_cancel_guard() {
        let flag = CancelFlag::new();
        flag.guard().disarm();
        assert!(!flag.is_cancelled());

        {
            let _guard = flag.guard();
        }
        assert!(flag.is_cancelled());

        let ctx = context().with_cancel(flag);
        assert!(matches!(ctx.ensure_active(), Err(ApiError::Cancelled)));
    }
}
