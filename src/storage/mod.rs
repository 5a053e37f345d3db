//! # Storage
//!
//! The storage collaborator contract and the in-memory reference backend.
//!
//! The request pipeline talks to storage only through `StorageBackend` and
//! `QueryBuilder`. Every rejection is a `StorageError`, which the pipeline
//! reports as "Storage: Bad Arguments" unless it is an internal failure.

mod backend;
mod errors;
mod memory;
mod predicate;

pub use backend::{Entity, Page, QueryBuilder, Related, Row, StorageBackend};
pub use errors::{StorageError, StorageResult};
pub use memory::{HybridFn, MemoryQuery, MemoryStorage};
pub use predicate::{Argument, Comparison, NullPlacement, Predicate, Quantifier, SortKey};
