//! # Hooks
//!
//! Pre- and post-processing callbacks keyed by verb and instance scope.
//!
//! ```text
//! prepare* → pre[verb] → pre[verb_scope] → storage → post[verb] → post[verb_scope] → on_finish*
//! ```
//!
//! Hooks for the same key run in registration order. A hook aborts the
//! request by returning `HookAbort`; its status and message reach the client
//! unchanged.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use serde_json::Value;
use thiserror::Error;

use super::context::ProcessorContext;

/// Request verb as seen by the pipeline. PUT is folded into `Patch`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Verb {
    Get,
    Post,
    Patch,
    Delete,
}

impl Verb {
    pub fn from_method(method: &str) -> Option<Self> {
        match method.to_ascii_uppercase().as_str() {
            "GET" => Some(Self::Get),
            "POST" => Some(Self::Post),
            "PATCH" | "PUT" => Some(Self::Patch),
            "DELETE" => Some(Self::Delete),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Get => "get",
            Self::Post => "post",
            Self::Patch => "patch",
            Self::Delete => "delete",
        }
    }
}

/// Whether a request addresses instances by id or by query
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Scope {
    Single,
    Many,
}

impl Scope {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Single => "single",
            Self::Many => "many",
        }
    }
}

/// Hook registration key: a verb, optionally narrowed to one scope
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct HookKey {
    pub verb: Verb,
    pub scope: Option<Scope>,
}

impl HookKey {
    pub fn new(verb: Verb, scope: Scope) -> Self {
        Self {
            verb,
            scope: Some(scope),
        }
    }

    /// Key matching every request with this verb
    pub fn verb(verb: Verb) -> Self {
        Self { verb, scope: None }
    }
}

impl fmt::Display for HookKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.scope {
            Some(scope) => write!(f, "{}_{}", self.verb.as_str(), scope.as_str()),
            None => f.write_str(self.verb.as_str()),
        }
    }
}

/// Error for an unrecognised hook key name
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Unknown hook key: {0}")]
pub struct UnknownHookKey(pub String);

impl FromStr for HookKey {
    type Err = UnknownHookKey;

    /// Parses `get`, `get_single`, `get_many`, `post`, `post_single`,
    /// `patch`, `put`, `delete` and their scoped forms
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (verb, scope) = match s.split_once('_') {
            Some((verb, "single")) => (verb, Some(Scope::Single)),
            Some((verb, "many")) => (verb, Some(Scope::Many)),
            Some(_) => return Err(UnknownHookKey(s.to_string())),
            None => (s, None),
        };
        let verb = Verb::from_method(verb).ok_or_else(|| UnknownHookKey(s.to_string()))?;
        if verb == Verb::Post && scope == Some(Scope::Many) {
            return Err(UnknownHookKey(s.to_string()));
        }
        Ok(Self { verb, scope })
    }
}

/// A hook's refusal to let the request continue
#[derive(Debug, Clone, PartialEq, Error)]
#[error("{message}")]
pub struct HookAbort {
    pub status: u16,
    pub message: String,
    /// Replaces the default `{"message": ...}` response body
    pub body: Option<Value>,
}

impl HookAbort {
    pub fn new(status: u16, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
            body: None,
        }
    }

    pub fn with_body(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }
}

/// A callback run at a fixed pipeline point with the request context
pub trait Hook: Send + Sync {
    fn call(&self, ctx: &mut ProcessorContext) -> Result<(), HookAbort>;
}

impl<F> Hook for F
where
    F: Fn(&mut ProcessorContext) -> Result<(), HookAbort> + Send + Sync,
{
    fn call(&self, ctx: &mut ProcessorContext) -> Result<(), HookAbort> {
        self(ctx)
    }
}

type HookList = Vec<Arc<dyn Hook>>;

/// Every hook registered for one model API
#[derive(Clone, Default)]
pub struct Hooks {
    prepare: HookList,
    pre: BTreeMap<HookKey, HookList>,
    post: BTreeMap<HookKey, HookList>,
    on_finish: HookList,
}

impl Hooks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Run before anything else on every request
    pub fn prepare(mut self, hook: impl Hook + 'static) -> Self {
        self.prepare.push(Arc::new(hook));
        self
    }

    /// Run before storage for requests matching `key`
    pub fn pre(mut self, key: HookKey, hook: impl Hook + 'static) -> Self {
        self.pre.entry(key).or_default().push(Arc::new(hook));
        self
    }

    /// Run after shaping for requests matching `key`
    pub fn post(mut self, key: HookKey, hook: impl Hook + 'static) -> Self {
        self.post.entry(key).or_default().push(Arc::new(hook));
        self
    }

    /// Run last on every successful request
    pub fn on_finish(mut self, hook: impl Hook + 'static) -> Self {
        self.on_finish.push(Arc::new(hook));
        self
    }

    pub fn run_prepare(&self, ctx: &mut ProcessorContext) -> Result<(), HookAbort> {
        run_all(&self.prepare, ctx)
    }

    pub fn run_pre(&self, ctx: &mut ProcessorContext) -> Result<(), HookAbort> {
        run_keyed(&self.pre, ctx)
    }

    pub fn run_post(&self, ctx: &mut ProcessorContext) -> Result<(), HookAbort> {
        run_keyed(&self.post, ctx)
    }

    pub fn run_on_finish(&self, ctx: &mut ProcessorContext) -> Result<(), HookAbort> {
        run_all(&self.on_finish, ctx)
    }

    pub fn is_empty(&self) -> bool {
        self.prepare.is_empty()
            && self.pre.is_empty()
            && self.post.is_empty()
            && self.on_finish.is_empty()
    }
}

impl fmt::Debug for Hooks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let counts = |map: &BTreeMap<HookKey, HookList>| {
            map.iter()
                .map(|(k, v)| (k.to_string(), v.len()))
                .collect::<BTreeMap<_, _>>()
        };
        f.debug_struct("Hooks")
            .field("prepare", &self.prepare.len())
            .field("pre", &counts(&self.pre))
            .field("post", &counts(&self.post))
            .field("on_finish", &self.on_finish.len())
            .finish()
    }
}

fn run_all(hooks: &HookList, ctx: &mut ProcessorContext) -> Result<(), HookAbort> {
    for hook in hooks {
        hook.call(ctx)?;
    }
    Ok(())
}

/// Verb-wide hooks first, then the scope-specific ones
fn run_keyed(map: &BTreeMap<HookKey, HookList>, ctx: &mut ProcessorContext) -> Result<(), HookAbort> {
    let keys = [HookKey::verb(ctx.verb), HookKey::new(ctx.verb, ctx.scope)];
    for key in keys {
        if let Some(hooks) = map.get(&key) {
            run_all(hooks, ctx)?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{ColumnDef, FieldType, ModelDef, ModelDescriptor};
    use serde_json::json;

    fn context(verb: Verb, scope: Scope) -> ProcessorContext {
        let model = ModelDescriptor::from_def(
            ModelDef::new("person").column(ColumnDef::new("id", FieldType::Integer).primary()),
        )
        .unwrap();
        ProcessorContext::new(Arc::new(model), verb, scope)
    }

    fn tag(label: &'static str) -> impl Hook {
        move |ctx: &mut ProcessorContext| -> Result<(), HookAbort> {
            let seen = ctx
                .handler_state
                .entry("seen")
                .or_insert_with(|| json!([]));
            if let Some(list) = seen.as_array_mut() {
                list.push(json!(label));
            }
            Ok(())
        }
    }

    #[test]
    fn test_parse_keys() {
        assert_eq!("get".parse::<HookKey>().unwrap(), HookKey::verb(Verb::Get));
        assert_eq!(
            "get_many".parse::<HookKey>().unwrap(),
            HookKey::new(Verb::Get, Scope::Many)
        );
        assert_eq!(
            "put_single".parse::<HookKey>().unwrap(),
            HookKey::new(Verb::Patch, Scope::Single)
        );
        assert!("post_many".parse::<HookKey>().is_err());
        assert!("get_all".parse::<HookKey>().is_err());
        assert!("options".parse::<HookKey>().is_err());
    }

    #[test]
    fn test_registration_order() {
        let hooks = Hooks::new()
            .pre(HookKey::new(Verb::Get, Scope::Many), tag("many-1"))
            .pre(HookKey::verb(Verb::Get), tag("get"))
            .pre(HookKey::new(Verb::Get, Scope::Many), tag("many-2"))
            .pre(HookKey::new(Verb::Get, Scope::Single), tag("single"));

        let mut ctx = context(Verb::Get, Scope::Many);
        hooks.run_pre(&mut ctx).unwrap();
        assert_eq!(ctx.handler_state["seen"], json!(["get", "many-1", "many-2"]));
    }

    #[test]
    fn test_abort_stops_the_chain() {
        let hooks = Hooks::new()
            .prepare(|_: &mut ProcessorContext| -> Result<(), HookAbort> {
                Err(HookAbort::new(401, "Not authorized"))
            })
            .prepare(tag("after"));

        let mut ctx = context(Verb::Delete, Scope::Single);
        let abort = hooks.run_prepare(&mut ctx).unwrap_err();
        assert_eq!(abort.status, 401);
        assert_eq!(abort.message, "Not authorized");
        assert!(ctx.handler_state.get("seen").is_none());
    }
}
