//! # Processor Pipeline
//!
//! Runs one API request through its stages:
//!
//! ```text
//! RECEIVED ─prepare→ PREPARED ─pre hooks, compile→ FILTERED ─storage→ EXECUTED
//!     ─shape→ SHAPED ─post hooks, on_finish→ RESPONDED
//! ```
//!
//! Any failure moves the context to FAILED and is returned with its
//! taxonomy kind intact. Storage is called at most once per request, and
//! never after the transport has cancelled.

use std::sync::Arc;

use serde_json::{json, Value};
use tracing::{debug, warn};

use crate::api::{ApiRegistry, Endpoint};
use crate::model::{AttributeKind, ModelDescriptor};
use crate::query::{FilterCompiler, PredicateEvaluator, QueryPlan};
use crate::storage::{Row, StorageBackend, StorageError};

use super::body::decode_body;
use super::context::{CancelFlag, ProcessorContext, Stage};
use super::errors::{ApiError, ApiResult};
use super::hooks::{Scope, Verb};
use super::request::{ApiRequest, ApiResponse};

/// Executes API requests against a registry and a storage backend
pub struct Processor {
    registry: Arc<ApiRegistry>,
    storage: Arc<dyn StorageBackend>,
}

impl Processor {
    pub fn new(registry: Arc<ApiRegistry>, storage: Arc<dyn StorageBackend>) -> Self {
        Self { registry, storage }
    }

    pub fn registry(&self) -> &ApiRegistry {
        &self.registry
    }

    /// Process one request to completion
    pub fn handle(&self, request: ApiRequest, cancel: CancelFlag) -> ApiResult<ApiResponse> {
        let endpoint = self
            .registry
            .endpoint(&request.collection)
            .ok_or_else(|| ApiError::UnknownModel(request.collection.clone()))?;

        let method = effective_method(&endpoint, &request);
        if !endpoint.config.methods.allows(&method) {
            return Err(ApiError::MethodNotAllowed(method));
        }
        let verb =
            Verb::from_method(&method).ok_or_else(|| ApiError::MethodNotAllowed(method.clone()))?;

        let scope = match (verb, request.ids.is_some()) {
            (Verb::Post, true) => return Err(ApiError::MethodNotAllowed(method)),
            (Verb::Post, false) | (_, true) => Scope::Single,
            (_, false) => Scope::Many,
        };
        if scope == Scope::Many
            && matches!(verb, Verb::Patch | Verb::Delete)
            && !endpoint.config.allow_patch_many
        {
            return Err(ApiError::Forbidden(format!(
                "{} on the '{}' collection requires allow_patch_many",
                method, endpoint.collection
            )));
        }

        let mut ctx =
            ProcessorContext::new(endpoint.descriptor.clone(), verb, scope).with_cancel(cancel);
        debug!(
            request_id = %ctx.request_id,
            collection = %endpoint.collection,
            verb = verb.as_str(),
            scope = scope.as_str(),
            "Request received"
        );

        match self.run(&endpoint, &request, &mut ctx) {
            Ok(response) => {
                debug!(
                    request_id = %ctx.request_id,
                    status = response.status,
                    elapsed_ms = ctx.elapsed_ms(),
                    "Request completed"
                );
                Ok(response)
            }
            Err(err) => {
                let failed_at = ctx.stage;
                ctx.stage = Stage::Failed;
                warn!(
                    request_id = %ctx.request_id,
                    stage = failed_at.as_str(),
                    kind = ?err.kind(),
                    status = err.status_code(),
                    error = %err,
                    "Request failed"
                );
                Err(err)
            }
        }
    }

    fn run(
        &self,
        endpoint: &Endpoint,
        request: &ApiRequest,
        ctx: &mut ProcessorContext,
    ) -> ApiResult<ApiResponse> {
        let mut data = decode_body(request.content_type.as_deref(), &request.body)?;
        ctx.search_params = search_params(request, ctx.verb, &mut data)?;
        ctx.data = data;
        if let Some(ids) = &request.ids {
            ctx.instance_ids = parse_instance_ids(&endpoint.descriptor, ids)?;
        }

        endpoint.hooks.run_prepare(ctx)?;
        advance(ctx, Stage::Prepared);

        endpoint.hooks.run_pre(ctx)?;
        if ctx.scope == Scope::Many {
            let compiler = FilterCompiler::new(self.registry.catalog());
            ctx.filters = Some(compiler.compile(&endpoint.descriptor, &ctx.search_params)?);
        }
        advance(ctx, Stage::Filtered);

        ctx.ensure_active()?;
        let status = self.execute(endpoint, request, ctx)?;

        endpoint.hooks.run_post(ctx)?;
        endpoint.hooks.run_on_finish(ctx)?;
        advance(ctx, Stage::Responded);

        let body = ctx.result.take();
        let status = match (status, &body) {
            // A post hook that fills in a result turns "no content" into "ok"
            (204, Some(_)) => 200,
            (status, _) => status,
        };
        Ok(ApiResponse { status, body })
    }

    /// The storage call and shaping. Leaves the shaped body in `ctx.result`.
    fn execute(
        &self,
        endpoint: &Endpoint,
        request: &ApiRequest,
        ctx: &mut ProcessorContext,
    ) -> ApiResult<u16> {
        let model = endpoint.descriptor.name();
        let shaper = endpoint.shaper();
        let depth = shaper.load_depth();

        let (status, result) = match (ctx.verb, ctx.scope) {
            (Verb::Get, Scope::Single) => {
                let entities = self.storage.get(model, &ctx.instance_ids, depth)?;
                advance(ctx, Stage::Executed);
                (200, Some(one_or_many(shaper.shape_all(&entities))))
            }
            (Verb::Get, Scope::Many) => {
                let plan = ctx.filters.take().unwrap_or_default();
                let result = self.search(endpoint, request, ctx, plan)?;
                (200, Some(result))
            }
            (Verb::Post, _) => {
                let values = incoming_values(endpoint, &ctx.data);
                let entity = self.storage.insert(model, &values, depth)?;
                advance(ctx, Stage::Executed);
                (201, Some(shaper.shape(&entity)))
            }
            (Verb::Patch, Scope::Single) => {
                let values = incoming_values(endpoint, &ctx.data);
                let entities = self
                    .storage
                    .update(model, &ctx.instance_ids, &values, depth)?;
                advance(ctx, Stage::Executed);
                (200, Some(one_or_many(shaper.shape_all(&entities))))
            }
            (Verb::Patch, Scope::Many) => {
                let values = incoming_values(endpoint, &ctx.data);
                let plan = ctx.filters.clone().unwrap_or_default();
                let mut query = self.storage.query(model)?;
                PredicateEvaluator::apply(&plan, query.as_mut())?;
                let modified = if plan.single {
                    query.update_one(&values)?
                } else {
                    query.update_all(&values)?
                };
                advance(ctx, Stage::Executed);
                (200, Some(json!({ "num_modified": modified })))
            }
            (Verb::Delete, Scope::Single) => {
                self.storage.delete(model, &ctx.instance_ids)?;
                advance(ctx, Stage::Executed);
                (204, None)
            }
            (Verb::Delete, Scope::Many) => {
                let plan = ctx.filters.clone().unwrap_or_default();
                let mut query = self.storage.query(model)?;
                PredicateEvaluator::apply(&plan, query.as_mut())?;
                let removed = if plan.single {
                    query.delete_one()?
                } else {
                    query.delete_all()?
                };
                advance(ctx, Stage::Executed);
                (200, Some(json!({ "num_removed": removed })))
            }
        };

        ctx.result = result;
        advance(ctx, Stage::Shaped);
        Ok(status)
    }

    /// Paginated search. With `single` set, exactly one match must remain
    /// after the offset; it is returned as the only entry of `objects`.
    fn search(
        &self,
        endpoint: &Endpoint,
        request: &ApiRequest,
        ctx: &mut ProcessorContext,
        mut plan: QueryPlan,
    ) -> ApiResult<Value> {
        let shaper = endpoint.shaper();
        let mut query = self.storage.query(endpoint.descriptor.name())?;
        query.load_depth(shaper.load_depth());

        let per_page = results_per_page(endpoint, request, &ctx.search_params)?;
        if per_page == 0 || per_page > endpoint.max_results_per_page {
            return Err(ApiError::BadArguments(format!(
                "Results per page must be between 1 and {}",
                endpoint.max_results_per_page
            )));
        }
        let page = page_number(request)?;
        let offset = plan
            .offset
            .unwrap_or(0)
            .saturating_add((page - 1).saturating_mul(per_page));
        plan.offset = Some(offset);
        // A q limit replaces the page size, capped rather than rejected
        plan.limit = match (plan.single, plan.limit) {
            (true, _) => None,
            (false, Some(limit)) => Some(limit.min(endpoint.max_results_per_page)),
            (false, None) => Some(per_page),
        };

        PredicateEvaluator::apply(&plan, query.as_mut())?;
        let found = query.fetch()?;
        advance(ctx, Stage::Executed);
        let single = plan.single;
        ctx.filters = Some(plan);

        if single {
            match found.entities.len() {
                0 => return Err(StorageError::NoResult.into()),
                1 => {}
                _ => return Err(StorageError::MultipleResults.into()),
            }
        }

        Ok(json!({
            "num_results": found.total,
            "total_pages": found.total.div_ceil(per_page),
            "page": page,
            "objects": shaper.shape_all(&found.entities),
        }))
    }
}

fn advance(ctx: &mut ProcessorContext, stage: Stage) {
    ctx.stage = stage;
    debug!(request_id = %ctx.request_id, stage = stage.as_str(), "Stage reached");
}

fn effective_method(endpoint: &Endpoint, request: &ApiRequest) -> String {
    match &request.method_override {
        Some(method) if endpoint.config.allow_method_override => method.to_ascii_uppercase(),
        _ => request.method.to_ascii_uppercase(),
    }
}

/// The raw query description. Read from the `q` query argument, or for
/// PATCH/PUT from a `q` entry in the body. `q` never reaches the values.
fn search_params(request: &ApiRequest, verb: Verb, data: &mut Row) -> ApiResult<Value> {
    let from_body = data.remove("q");
    if let Some(raw) = request.query_arg("q") {
        return parse_q(raw);
    }
    match (verb, from_body) {
        (Verb::Patch, Some(Value::String(raw))) => parse_q(&raw),
        (Verb::Patch, Some(value)) => Ok(value),
        _ => Ok(Value::Null),
    }
}

fn parse_q(raw: &str) -> ApiResult<Value> {
    if raw.trim().is_empty() {
        return Ok(Value::Null);
    }
    serde_json::from_str(raw)
        .map_err(|e| ApiError::BadArguments(format!("Unable to decode data: {}", e)))
}

/// Split an id segment into primary key tuples. A model with a k-column
/// primary key takes k segments per instance.
fn parse_instance_ids(model: &ModelDescriptor, raw: &str) -> ApiResult<Vec<Vec<Value>>> {
    let keys = model.primary_keys();
    let segments: Vec<&str> = raw.split(',').map(str::trim).collect();

    if segments.iter().any(|s| s.is_empty()) {
        return Err(ApiError::BadArguments(format!("Empty instance id in '{}'", raw)));
    }
    if keys.is_empty() || segments.len() % keys.len() != 0 {
        return Err(ApiError::BadArguments(format!(
            "'{}' does not split into {}-part keys for '{}'",
            raw,
            keys.len(),
            model.name()
        )));
    }

    Ok(segments
        .chunks(keys.len())
        .map(|chunk| {
            chunk
                .iter()
                .zip(keys)
                .map(|(segment, key)| match model.column(key) {
                    Some(column) => column.field_type.coerce_segment(segment),
                    None => Value::String(segment.to_string()),
                })
                .collect()
        })
        .collect())
}

/// Values a client may write: include/exclude applied, non-column
/// attributes dropped
fn incoming_values(endpoint: &Endpoint, data: &Row) -> Row {
    let model = &endpoint.descriptor;
    let mut values = Row::new();

    for (name, value) in data {
        if let Some(include) = &endpoint.include {
            if !include.has_column(name) {
                continue;
            }
        }
        if let Some(exclude) = &endpoint.exclude {
            if exclude.has_column(name) {
                continue;
            }
        }
        match model.kind_of(name) {
            Some(AttributeKind::Relation | AttributeKind::Hybrid | AttributeKind::Proxy) => {
                debug!(model = model.name(), attribute = %name, "Dropping non-column value");
            }
            // Unknown names are left for storage to reject
            Some(AttributeKind::Column) | None => {
                values.insert(name.clone(), value.clone());
            }
        }
    }
    values
}

fn results_per_page(endpoint: &Endpoint, request: &ApiRequest, q: &Value) -> ApiResult<u64> {
    let requested = match q.get("results_per_page") {
        Some(value) => Some(value.as_u64().ok_or_else(|| {
            ApiError::BadArguments(format!("Invalid results_per_page: {}", value))
        })?),
        None => request
            .query_arg("results_per_page")
            .map(|raw| {
                raw.parse::<u64>().map_err(|_| {
                    ApiError::BadArguments(format!("Invalid results_per_page: {}", raw))
                })
            })
            .transpose()?,
    };
    Ok(requested.unwrap_or(endpoint.results_per_page))
}

fn page_number(request: &ApiRequest) -> ApiResult<u64> {
    match request.query_arg("page") {
        None => Ok(1),
        Some(raw) => match raw.parse::<u64>() {
            Ok(page) if page >= 1 => Ok(page),
            _ => Err(ApiError::BadArguments(format!("Invalid page number: {}", raw))),
        },
    }
}

/// One id tuple gives one object, several give an array
fn one_or_many(shaped: Value) -> Value {
    match shaped {
        Value::Array(mut items) if items.len() == 1 => items.remove(0),
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::ApiConfig;
    use crate::config::ApiDefaults;
    use crate::model::{ColumnDef, FieldType, ModelCatalog, ModelDef, RelationDef};
    use crate::processor::{Hook, HookAbort, HookKey, Hooks};
    use crate::storage::MemoryStorage;
    use std::sync::Mutex;

    fn catalog() -> Arc<ModelCatalog> {
        let mut catalog = ModelCatalog::new();
        catalog
            .register(
                ModelDef::new("person")
                    .column(ColumnDef::new("id", FieldType::Integer).primary())
                    .column(ColumnDef::new("name", FieldType::String).unique())
                    .column(ColumnDef::new("age", FieldType::Integer))
                    .relation(RelationDef::to_many("pets", "pet", "owner_id")),
            )
            .unwrap();
        catalog
            .register(
                ModelDef::new("pet")
                    .column(ColumnDef::new("id", FieldType::Integer).primary())
                    .column(ColumnDef::new("kind", FieldType::String))
                    .column(ColumnDef::new("owner_id", FieldType::Integer).references("person")),
            )
            .unwrap();
        catalog
            .register(
                ModelDef::new("seat")
                    .column(ColumnDef::new("row", FieldType::Integer).primary())
                    .column(ColumnDef::new("number", FieldType::Integer).primary()),
            )
            .unwrap();
        catalog.validate().unwrap();
        Arc::new(catalog)
    }

    fn processor(config: ApiConfig, hooks: Hooks) -> Processor {
        let catalog = catalog();
        let mut registry = ApiRegistry::new(catalog.clone(), ApiDefaults::default());
        registry.create_api_with_hooks("person", config, hooks).unwrap();
        registry.create_api("seat", ApiConfig::new()).unwrap();
        let processor = Processor::new(Arc::new(registry), Arc::new(MemoryStorage::new(catalog)));

        for (name, age) in [("Ann", 30), ("Bob", 17), ("Cid", 45)] {
            processor
                .handle(
                    ApiRequest::new("POST", "person")
                        .with_json(&json!({"name": name, "age": age})),
                    CancelFlag::new(),
                )
                .unwrap();
        }
        processor
    }

    fn writable() -> ApiConfig {
        ApiConfig::new().all_methods().allow_patch_many(true)
    }

    fn send(processor: &Processor, request: ApiRequest) -> ApiResult<ApiResponse> {
        processor.handle(request, CancelFlag::new())
    }

    #[test]
    fn test_search_with_pagination() {
        let processor = processor(writable().results_per_page(2), Hooks::new());
        let q = json!({"order_by": [{"field": "age", "direction": "desc"}]});

        let first = send(&processor, ApiRequest::new("GET", "person").with_q(&q)).unwrap();
        let body = first.body.unwrap();
        assert_eq!(body["num_results"], json!(3));
        assert_eq!(body["total_pages"], json!(2));
        assert_eq!(body["objects"][0]["name"], json!("Cid"));

        let second = send(
            &processor,
            ApiRequest::new("GET", "person").with_q(&q).with_query("page", "2"),
        )
        .unwrap();
        let body = second.body.unwrap();
        assert_eq!(body["page"], json!(2));
        assert_eq!(body["objects"], json!([{"id": 2, "name": "Bob", "age": 17, "pets": []}]));
    }

    #[test]
    fn test_single_result() {
        let processor = processor(writable(), Hooks::new());
        let q = json!({"filters": [{"name": "age", "op": "<", "val": 18}], "single": true});
        let response = send(&processor, ApiRequest::new("GET", "person").with_q(&q)).unwrap();
        let body = response.body.unwrap();
        assert_eq!(body["num_results"], json!(1));
        assert_eq!(body["objects"].as_array().unwrap().len(), 1);
        assert_eq!(body["objects"][0]["name"], json!("Bob"));

        let q = json!({"filters": [{"name": "age", "op": ">", "val": 18}], "single": true});
        let err = send(&processor, ApiRequest::new("GET", "person").with_q(&q)).unwrap_err();
        assert!(matches!(err, ApiError::StorageBadArguments(_)));
    }

    #[test]
    fn test_offset_keeps_full_count() {
        let processor = processor(writable(), Hooks::new());
        let q = json!({"order_by": [{"field": "id"}], "offset": 2});
        let body = send(&processor, ApiRequest::new("GET", "person").with_q(&q))
            .unwrap()
            .body
            .unwrap();
        assert_eq!(body["num_results"], json!(3));
        assert_eq!(body["total_pages"], json!(1));
        assert_eq!(body["objects"], json!([{"id": 3, "name": "Cid", "age": 45, "pets": []}]));
    }

    #[test]
    fn test_limit_is_capped_not_rejected() {
        let processor = processor(writable().results_per_page(2).max_results_per_page(2), Hooks::new());
        let q = json!({"limit": 50});
        let body = send(&processor, ApiRequest::new("GET", "person").with_q(&q))
            .unwrap()
            .body
            .unwrap();
        assert_eq!(body["num_results"], json!(3));
        assert_eq!(body["objects"].as_array().unwrap().len(), 2);

        let q = json!({"limit": 1});
        let body = send(&processor, ApiRequest::new("GET", "person").with_q(&q))
            .unwrap()
            .body
            .unwrap();
        assert_eq!(body["objects"].as_array().unwrap().len(), 1);
    }

    #[test]
    fn test_delete_many_honours_limit() {
        let processor = processor(writable(), Hooks::new());
        let q = json!({
            "filters": [{"name": "age", "op": "gt", "val": 0}],
            "order_by": [{"field": "age", "direction": "desc"}],
            "limit": 1
        });
        let response = send(&processor, ApiRequest::new("DELETE", "person").with_q(&q)).unwrap();
        assert_eq!(response.body, Some(json!({"num_removed": 1})));

        let body = send(&processor, ApiRequest::new("GET", "person"))
            .unwrap()
            .body
            .unwrap();
        assert_eq!(body["num_results"], json!(2));
        let names: Vec<&Value> = body["objects"]
            .as_array()
            .unwrap()
            .iter()
            .map(|o| &o["name"])
            .collect();
        assert_eq!(names, vec![&json!("Ann"), &json!("Bob")]);
    }

    #[test]
    fn test_single_bulk_writes_touch_one_row() {
        let processor = processor(writable(), Hooks::new());

        let q = json!({"filters": [{"name": "age", "op": "gt", "val": 0}], "single": true});
        let err = send(&processor, ApiRequest::new("DELETE", "person").with_q(&q)).unwrap_err();
        assert!(matches!(err, ApiError::StorageBadArguments(_)));
        let err = send(
            &processor,
            ApiRequest::new("PATCH", "person").with_q(&q).with_json(&json!({"age": 1})),
        )
        .unwrap_err();
        assert!(matches!(err, ApiError::StorageBadArguments(_)));

        let q = json!({"filters": [{"name": "name", "op": "eq", "val": "Bob"}], "single": true});
        let response = send(
            &processor,
            ApiRequest::new("PATCH", "person").with_q(&q).with_json(&json!({"age": 18})),
        )
        .unwrap();
        assert_eq!(response.body, Some(json!({"num_modified": 1})));

        let response = send(&processor, ApiRequest::new("DELETE", "person").with_q(&q)).unwrap();
        assert_eq!(response.body, Some(json!({"num_removed": 1})));

        let body = send(&processor, ApiRequest::new("GET", "person"))
            .unwrap()
            .body
            .unwrap();
        assert_eq!(body["num_results"], json!(2));
    }

    #[test]
    fn test_patch_many_with_body_q() {
        let processor = processor(writable(), Hooks::new());
        let response = send(
            &processor,
            ApiRequest::new("PUT", "person").with_json(&json!({
                "age": 50,
                "q": {"filters": [{"name": "age", "op": "ge", "val": 30}]}
            })),
        )
        .unwrap();
        assert_eq!(response.body, Some(json!({"num_modified": 2})));
    }

    #[test]
    fn test_many_writes_need_permission() {
        let processor = processor(ApiConfig::new().all_methods(), Hooks::new());
        let err = send(&processor, ApiRequest::new("DELETE", "person")).unwrap_err();
        assert_eq!(err.status_code(), 403);
    }

    #[test]
    fn test_method_override() {
        let processor = processor(writable().allow_method_override(true), Hooks::new());
        let response = send(
            &processor,
            ApiRequest::new("POST", "person")
                .with_ids("2")
                .with_method_override("DELETE"),
        )
        .unwrap();
        assert_eq!(response.status, 204);
        assert!(response.body.is_none());
    }

    #[test]
    fn test_cancelled_before_storage() {
        let hooks = Hooks::new().pre(
            HookKey::verb(Verb::Delete),
            |ctx: &mut ProcessorContext| -> Result<(), HookAbort> {
                ctx.cancel.cancel();
                Ok(())
            },
        );
        let processor = processor(writable(), hooks);
        let err = send(&processor, ApiRequest::new("DELETE", "person").with_ids("1")).unwrap_err();
        assert!(matches!(err, ApiError::Cancelled));

        let still_there = send(&processor, ApiRequest::new("GET", "person").with_ids("1")).unwrap();
        assert_eq!(still_there.body.unwrap()["name"], json!("Ann"));
    }

    #[test]
    fn test_post_hook_sees_result() {
        let hooks = Hooks::new().post(
            HookKey::new(Verb::Get, Scope::Single),
            |ctx: &mut ProcessorContext| -> Result<(), HookAbort> {
                if let Some(Value::Object(result)) = ctx.result.as_mut() {
                    result.remove("age");
                    result.insert("checked".into(), json!(true));
                }
                Ok(())
            },
        );
        let processor = processor(writable(), hooks);
        let response = send(&processor, ApiRequest::new("GET", "person").with_ids("1")).unwrap();
        let body = response.body.unwrap();
        assert_eq!(body["checked"], json!(true));
        assert!(body.get("age").is_none());
    }

    fn record(log: &Arc<Mutex<Vec<String>>>, label: &'static str) -> impl Hook {
        let log = Arc::clone(log);
        move |ctx: &mut ProcessorContext| -> Result<(), HookAbort> {
            let seen = ctx.handler_state.entry("seen").or_insert_with(|| json!([]));
            if let Some(list) = seen.as_array_mut() {
                list.push(json!(label));
            }
            log.lock().unwrap().push(label.to_string());
            Ok(())
        }
    }

    #[test]
    fn test_hook_order_on_get_many() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let hooks = Hooks::new()
            .on_finish(record(&log, "on_finish"))
            .post(HookKey::new(Verb::Get, Scope::Many), record(&log, "post_get_many"))
            .post(HookKey::verb(Verb::Get), record(&log, "post_get"))
            .pre(HookKey::new(Verb::Get, Scope::Many), record(&log, "pre_get_many"))
            .pre(HookKey::verb(Verb::Get), record(&log, "pre_get"))
            .prepare(record(&log, "prepare"))
            .on_finish(|ctx: &mut ProcessorContext| -> Result<(), HookAbort> {
                ctx.result = ctx.handler_state.get("seen").cloned();
                Ok(())
            });
        let processor = processor(writable(), hooks);
        log.lock().unwrap().clear();

        let response = send(&processor, ApiRequest::new("GET", "person")).unwrap();
        let expected = [
            "prepare",
            "pre_get",
            "pre_get_many",
            "post_get",
            "post_get_many",
            "on_finish",
        ];
        assert_eq!(*log.lock().unwrap(), expected);
        assert_eq!(response.body, Some(json!(expected)));
    }

    #[test]
    fn test_abort_skips_on_finish() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let hooks = Hooks::new()
            .prepare(record(&log, "prepare"))
            .pre(
                HookKey::verb(Verb::Get),
                |_: &mut ProcessorContext| -> Result<(), HookAbort> {
                    Err(HookAbort::new(403, "Denied"))
                },
            )
            .post(HookKey::verb(Verb::Get), record(&log, "post_get"))
            .on_finish(record(&log, "on_finish"));
        let processor = processor(writable(), hooks);
        log.lock().unwrap().clear();

        let err = send(&processor, ApiRequest::new("GET", "person")).unwrap_err();
        assert_eq!(err.status_code(), 403);
        assert_eq!(*log.lock().unwrap(), ["prepare"]);
    }

    #[test]
    fn test_values_drop_relations_and_q() {
        let processor = processor(writable(), Hooks::new());
        let response = send(
            &processor,
            ApiRequest::new("POST", "person")
                .with_json(&json!({"name": "Dee", "age": 9, "pets": [{"kind": "cat"}]})),
        )
        .unwrap();
        assert_eq!(response.status, 201);
        assert_eq!(response.body.unwrap()["pets"], json!([]));
    }

    #[test]
    fn test_instance_ids() {
        let catalog = catalog();
        let seat = catalog.get("seat").unwrap();
        assert_eq!(
            parse_instance_ids(&seat, "1,2,3,4").unwrap(),
            vec![vec![json!(1), json!(2)], vec![json!(3), json!(4)]]
        );
        assert!(parse_instance_ids(&seat, "1,2,3").is_err());
        assert!(parse_instance_ids(&seat, "1,,3,4").is_err());

        let person = catalog.get("person").unwrap();
        assert_eq!(
            parse_instance_ids(&person, "7").unwrap(),
            vec![vec![json!(7)]]
        );
    }

    #[test]
    fn test_invalid_paging() {
        let processor = processor(writable(), Hooks::new());
        for (key, value) in [("page", "0"), ("page", "x"), ("results_per_page", "1000")] {
            let err = send(&processor, ApiRequest::new("GET", "person").with_query(key, value))
                .unwrap_err();
            assert!(matches!(err, ApiError::BadArguments(_)), "{}={}", key, value);
        }
    }
}
