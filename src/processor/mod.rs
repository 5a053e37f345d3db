//! # Request Processor
//!
//! The per-request pipeline: decoding, hooks, filter compilation, the
//! storage call, shaping and error classification. Transport independent;
//! `api::RestServer` adapts it to HTTP.

mod body;
mod context;
mod errors;
mod hooks;
mod pipeline;
mod request;

pub use body::decode_body;
pub use context::{CancelFlag, CancelOnDrop, ProcessorContext, Stage};
pub use errors::{
    ApiError, ApiResult, ErrorKind, ErrorResponse, BAD_ARGUMENTS_TAG, STORAGE_BAD_ARGUMENTS_TAG,
};
pub use hooks::{Hook, HookAbort, HookKey, Hooks, Scope, UnknownHookKey, Verb};
pub use pipeline::Processor;
pub use request::{ApiRequest, ApiResponse};
