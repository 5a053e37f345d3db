//! # Storage Backend Contract
//!
//! What the request pipeline needs from a data store. Implementations own
//! persistence, isolation and query execution; the pipeline only hands them
//! compiled predicates and plain JSON values.

use std::collections::BTreeMap;

use serde_json::{Map, Value};

use super::errors::StorageResult;
use super::predicate::{Predicate, SortKey};

/// Attribute name → value for one row
pub type Row = Map<String, Value>;

/// A persisted instance together with its eagerly loaded relations
#[derive(Debug, Clone, PartialEq)]
pub struct Entity {
    pub model: String,
    /// Columns, hybrids and proxies
    pub values: Row,
    pub relations: BTreeMap<String, Related>,
}

impl Entity {
    pub fn new(model: impl Into<String>, values: Row) -> Self {
        Self {
            model: model.into(),
            values,
            relations: BTreeMap::new(),
        }
    }

    pub fn get(&self, attribute: &str) -> Option<&Value> {
        self.values.get(attribute)
    }
}

/// Loaded side of a relation
#[derive(Debug, Clone, PartialEq)]
pub enum Related {
    One(Option<Box<Entity>>),
    Many(Vec<Entity>),
}

/// One page of a search, with the count before limit/offset
#[derive(Debug, Clone, PartialEq)]
pub struct Page {
    pub total: u64,
    pub entities: Vec<Entity>,
}

/// Incrementally built query against one model.
///
/// `filter` calls are combined with AND. Terminal calls consume the builder.
pub trait QueryBuilder: Send {
    fn filter(&mut self, predicate: Predicate) -> StorageResult<()>;

    fn order_by(&mut self, key: SortKey) -> StorageResult<()>;

    fn limit(&mut self, limit: u64);

    fn offset(&mut self, offset: u64);

    /// How many relation levels to load on returned entities
    fn load_depth(&mut self, depth: usize);

    /// Matching entities after ordering, offset and limit
    fn fetch(self: Box<Self>) -> StorageResult<Page>;

    /// Exactly one matching entity
    fn fetch_one(self: Box<Self>) -> StorageResult<Entity>;

    /// Apply `values` to every matching row inside the offset/limit window;
    /// returns the number of rows changed
    fn update_all(self: Box<Self>, values: &Row) -> StorageResult<u64>;

    /// Apply `values` to exactly one matching row
    fn update_one(self: Box<Self>, values: &Row) -> StorageResult<u64>;

    /// Remove every matching row inside the offset/limit window; returns the
    /// number of rows removed
    fn delete_all(self: Box<Self>) -> StorageResult<u64>;

    /// Remove exactly one matching row
    fn delete_one(self: Box<Self>) -> StorageResult<u64>;
}

/// A data store the pipeline can read from and write to.
///
/// Key tuples list primary key values in `primary_keys()` order. Multi-key
/// operations are all-or-nothing: one missing key fails the whole call with
/// `NoSuchInstance` and changes nothing.
pub trait StorageBackend: Send + Sync {
    fn query(&self, model: &str) -> StorageResult<Box<dyn QueryBuilder + '_>>;

    fn get(&self, model: &str, keys: &[Vec<Value>], depth: usize) -> StorageResult<Vec<Entity>>;

    fn insert(&self, model: &str, values: &Row, depth: usize) -> StorageResult<Entity>;

    fn update(
        &self,
        model: &str,
        keys: &[Vec<Value>],
        values: &Row,
        depth: usize,
    ) -> StorageResult<Vec<Entity>>;

    fn delete(&self, model: &str, keys: &[Vec<Value>]) -> StorageResult<u64>;
}
