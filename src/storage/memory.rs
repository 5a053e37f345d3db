//! # In-Memory Storage
//!
//! Reference backend keeping one row table per model behind a `RwLock`.
//!
//! - Single integer primary keys auto-increment
//! - Writes check column types, nullability, uniqueness and foreign keys
//! - Null comparisons follow SQL: a null attribute matches only null tests
//! - Default null placement: last when ascending, first when descending

use std::cmp::Ordering;
use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::{Arc, RwLock};

use regex::{Regex, RegexBuilder};
use serde_json::Value;
use tracing::debug;

use crate::model::{
    AttributeKind, Cardinality, ColumnDef, FieldType, ModelCatalog, ModelDescriptor, RelationDef,
};

use super::backend::{Entity, Page, QueryBuilder, Related, Row, StorageBackend};
use super::errors::{StorageError, StorageResult};
use super::predicate::{Argument, Comparison, NullPlacement, Predicate, Quantifier, SortKey};

/// Computes a hybrid attribute from the stored row
pub type HybridFn = Arc<dyn Fn(&Row) -> Value + Send + Sync>;

#[derive(Debug, Clone)]
struct Table {
    rows: Vec<Row>,
    next_id: i64,
}

impl Default for Table {
    fn default() -> Self {
        Self {
            rows: Vec::new(),
            next_id: 1,
        }
    }
}

type Tables = HashMap<String, Table>;

/// Storage backend holding every row in memory
pub struct MemoryStorage {
    catalog: Arc<ModelCatalog>,
    tables: RwLock<Tables>,
    hybrids: HashMap<(String, String), HybridFn>,
}

impl MemoryStorage {
    pub fn new(catalog: Arc<ModelCatalog>) -> Self {
        let tables = catalog
            .names()
            .map(|name| (name.to_string(), Table::default()))
            .collect();
        Self {
            catalog,
            tables: RwLock::new(tables),
            hybrids: HashMap::new(),
        }
    }

    /// Register the function computing `model.name`
    pub fn with_hybrid<F>(mut self, model: &str, name: &str, f: F) -> Self
    where
        F: Fn(&Row) -> Value + Send + Sync + 'static,
    {
        self.hybrids
            .insert((model.to_string(), name.to_string()), Arc::new(f));
        self
    }

    /// Number of stored rows for a model
    pub fn count(&self, model: &str) -> StorageResult<usize> {
        let tables = self.read()?;
        Ok(tables.get(model).map(|t| t.rows.len()).unwrap_or(0))
    }

    fn read(&self) -> StorageResult<std::sync::RwLockReadGuard<'_, Tables>> {
        self.tables
            .read()
            .map_err(|_| StorageError::Internal("table lock poisoned".to_string()))
    }

    fn write(&self) -> StorageResult<std::sync::RwLockWriteGuard<'_, Tables>> {
        self.tables
            .write()
            .map_err(|_| StorageError::Internal("table lock poisoned".to_string()))
    }

    fn descriptor(&self, model: &str) -> StorageResult<&Arc<ModelDescriptor>> {
        self.catalog
            .lookup(model)
            .ok_or_else(|| StorageError::InvalidArgument(format!("unknown model '{}'", model)))
    }

    fn view<'s>(&'s self, tables: &'s Tables) -> View<'s> {
        View {
            storage: self,
            tables,
        }
    }

    /// Check that a predicate only names attributes and relations that exist
    fn validate_predicate(&self, model: &ModelDescriptor, predicate: &Predicate) -> StorageResult<()> {
        match predicate {
            Predicate::Compare {
                attribute,
                comparison,
                argument,
            } => {
                self.validate_attribute(model, attribute)?;
                validate_argument(*comparison, argument)
            }
            Predicate::CompareField {
                attribute, other, ..
            } => {
                self.validate_attribute(model, attribute)?;
                self.validate_attribute(model, other)
            }
            Predicate::Related {
                relation,
                quantifier,
                inner,
            } => {
                let rel = model
                    .relation(relation)
                    .ok_or_else(|| StorageError::UnknownRelation {
                        model: model.name().to_string(),
                        relation: relation.clone(),
                    })?;
                match (quantifier, rel.cardinality) {
                    (Quantifier::Has, Cardinality::ToOne) | (Quantifier::Any, Cardinality::ToMany) => {}
                    _ => {
                        return Err(StorageError::InvalidTraversal(format!(
                            "{:?} cannot traverse {:?} relation '{}.{}'",
                            quantifier,
                            rel.cardinality,
                            model.name(),
                            relation
                        )))
                    }
                }
                match inner {
                    Some(inner) => {
                        let target = self.descriptor(&rel.target)?;
                        self.validate_predicate(target, inner)
                    }
                    None => Ok(()),
                }
            }
            Predicate::And(children) | Predicate::Or(children) => children
                .iter()
                .try_for_each(|child| self.validate_predicate(model, child)),
            Predicate::Not(inner) => self.validate_predicate(model, inner),
        }
    }

    fn validate_attribute(&self, model: &ModelDescriptor, attribute: &str) -> StorageResult<()> {
        match model.kind_of(attribute) {
            Some(AttributeKind::Relation) | None => Err(StorageError::UnknownColumn {
                model: model.name().to_string(),
                column: attribute.to_string(),
            }),
            Some(_) => Ok(()),
        }
    }

    fn validate_sort(&self, model: &ModelDescriptor, path: &[String]) -> StorageResult<()> {
        let Some((last, hops)) = path.split_last() else {
            return Err(StorageError::InvalidOrdering("empty sort path".to_string()));
        };
        let mut current = model;
        for hop in hops {
            let rel = current
                .relation(hop)
                .ok_or_else(|| StorageError::UnknownRelation {
                    model: current.name().to_string(),
                    relation: hop.clone(),
                })?;
            if rel.cardinality == Cardinality::ToMany {
                return Err(StorageError::InvalidOrdering(format!(
                    "cannot sort through to-many relation '{}.{}'",
                    current.name(),
                    hop
                )));
            }
            current = self.descriptor(&rel.target)?;
        }
        self.validate_attribute(current, last)
    }

    /// Replace `positions` of `model` with `values` applied, enforcing constraints
    fn apply_update(
        &self,
        tables: &mut Tables,
        model: &ModelDescriptor,
        positions: &[usize],
        values: &Row,
    ) -> StorageResult<()> {
        check_known_columns(model, values)?;
        let new_rows = {
            let view = self.view(tables);
            let table = view.table(model.name())?;
            let mut rows = table.rows.clone();
            for &position in positions {
                let row = &mut rows[position];
                for (name, value) in values {
                    if let Some(column) = model.column(name) {
                        validate_column(model, column, value)?;
                    }
                    row.insert(name.clone(), value.clone());
                }
                view.check_foreign_keys(model, row)?;
            }
            check_unique(model, &rows)?;
            rows
        };

        if let Some(table) = tables.get_mut(model.name()) {
            table.rows = new_rows;
        }
        debug!(model = model.name(), rows = positions.len(), "updated rows");
        Ok(())
    }

    fn remove_rows(&self, tables: &mut Tables, model: &ModelDescriptor, positions: BTreeSet<usize>) -> u64 {
        let removed = positions.len() as u64;
        if let Some(table) = tables.get_mut(model.name()) {
            for position in positions.into_iter().rev() {
                table.rows.remove(position);
            }
        }
        debug!(model = model.name(), rows = removed, "removed rows");
        removed
    }
}

impl StorageBackend for MemoryStorage {
    fn query(&self, model: &str) -> StorageResult<Box<dyn QueryBuilder + '_>> {
        let model = Arc::clone(self.descriptor(model)?);
        Ok(Box::new(MemoryQuery {
            storage: self,
            model,
            predicates: Vec::new(),
            sorts: Vec::new(),
            limit: None,
            offset: None,
            depth: 0,
        }))
    }

    fn get(&self, model: &str, keys: &[Vec<Value>], depth: usize) -> StorageResult<Vec<Entity>> {
        let desc = self.descriptor(model)?;
        let tables = self.read()?;
        let view = self.view(&tables);
        let table = view.table(model)?;
        find_positions(desc, table, keys)?
            .into_iter()
            .map(|position| view.entity(desc, &table.rows[position], depth))
            .collect()
    }

    fn insert(&self, model: &str, values: &Row, depth: usize) -> StorageResult<Entity> {
        let desc = self.descriptor(model)?;
        check_known_columns(desc, values)?;

        let mut tables = self.write()?;
        let (rows, next_id) = {
            let view = self.view(&tables);
            let table = view.table(model)?;
            let (row, next_id) = view.prepare_insert(desc, table, values)?;
            let mut rows = table.rows.clone();
            rows.push(row);
            check_unique(desc, &rows)?;
            (rows, next_id)
        };

        let position = rows.len() - 1;
        if let Some(table) = tables.get_mut(model) {
            table.rows = rows;
            table.next_id = next_id;
        }
        debug!(model, "inserted row");

        let view = self.view(&tables);
        let table = view.table(model)?;
        view.entity(desc, &table.rows[position], depth)
    }

    fn update(
        &self,
        model: &str,
        keys: &[Vec<Value>],
        values: &Row,
        depth: usize,
    ) -> StorageResult<Vec<Entity>> {
        let desc = self.descriptor(model)?;
        let mut tables = self.write()?;
        let positions = {
            let view = self.view(&tables);
            find_positions(desc, view.table(model)?, keys)?
        };
        self.apply_update(&mut tables, desc, &positions, values)?;

        let view = self.view(&tables);
        let table = view.table(model)?;
        positions
            .into_iter()
            .map(|position| view.entity(desc, &table.rows[position], depth))
            .collect()
    }

    fn delete(&self, model: &str, keys: &[Vec<Value>]) -> StorageResult<u64> {
        let desc = self.descriptor(model)?;
        let mut tables = self.write()?;
        let positions: BTreeSet<usize> = {
            let view = self.view(&tables);
            find_positions(desc, view.table(model)?, keys)?
                .into_iter()
                .collect()
        };
        Ok(self.remove_rows(&mut tables, desc, positions))
    }
}

/// Query under construction against a `MemoryStorage`
pub struct MemoryQuery<'s> {
    storage: &'s MemoryStorage,
    model: Arc<ModelDescriptor>,
    predicates: Vec<Predicate>,
    sorts: Vec<SortKey>,
    limit: Option<u64>,
    offset: Option<u64>,
    depth: usize,
}

impl<'s> MemoryQuery<'s> {
    /// Positions of matching rows, sorted
    fn select(&self, view: &View<'_>) -> StorageResult<Vec<usize>> {
        view.select(&self.model, &self.predicates, &self.sorts)
    }

    fn window(&self, positions: Vec<usize>) -> Vec<usize> {
        let offset = self.offset.unwrap_or(0) as usize;
        let limit = self.limit.map(|l| l as usize).unwrap_or(usize::MAX);
        positions.into_iter().skip(offset).take(limit).collect()
    }
}

impl<'s> QueryBuilder for MemoryQuery<'s> {
    fn filter(&mut self, predicate: Predicate) -> StorageResult<()> {
        self.storage.validate_predicate(&self.model, &predicate)?;
        self.predicates.push(predicate);
        Ok(())
    }

    fn order_by(&mut self, key: SortKey) -> StorageResult<()> {
        self.storage.validate_sort(&self.model, &key.path)?;
        self.sorts.push(key);
        Ok(())
    }

    fn limit(&mut self, limit: u64) {
        self.limit = Some(limit);
    }

    fn offset(&mut self, offset: u64) {
        self.offset = Some(offset);
    }

    fn load_depth(&mut self, depth: usize) {
        self.depth = depth;
    }

    fn fetch(self: Box<Self>) -> StorageResult<Page> {
        let tables = self.storage.read()?;
        let view = self.storage.view(&tables);
        let matched = self.select(&view)?;
        let total = matched.len() as u64;
        let table = view.table(self.model.name())?;
        let entities = self
            .window(matched)
            .into_iter()
            .map(|position| view.entity(&self.model, &table.rows[position], self.depth))
            .collect::<StorageResult<Vec<_>>>()?;
        Ok(Page { total, entities })
    }

    fn fetch_one(self: Box<Self>) -> StorageResult<Entity> {
        let tables = self.storage.read()?;
        let view = self.storage.view(&tables);
        let position = only(self.window(self.select(&view)?))?;
        let table = view.table(self.model.name())?;
        view.entity(&self.model, &table.rows[position], self.depth)
    }

    fn update_all(self: Box<Self>, values: &Row) -> StorageResult<u64> {
        let mut tables = self.storage.write()?;
        let positions = {
            let view = self.storage.view(&tables);
            self.window(self.select(&view)?)
        };
        self.storage
            .apply_update(&mut tables, &self.model, &positions, values)?;
        Ok(positions.len() as u64)
    }

    fn update_one(self: Box<Self>, values: &Row) -> StorageResult<u64> {
        let mut tables = self.storage.write()?;
        let position = {
            let view = self.storage.view(&tables);
            only(self.window(self.select(&view)?))?
        };
        self.storage
            .apply_update(&mut tables, &self.model, &[position], values)?;
        Ok(1)
    }

    fn delete_all(self: Box<Self>) -> StorageResult<u64> {
        let mut tables = self.storage.write()?;
        let positions = {
            let view = self.storage.view(&tables);
            self.window(self.select(&view)?)
        };
        Ok(self
            .storage
            .remove_rows(&mut tables, &self.model, positions.into_iter().collect()))
    }

    fn delete_one(self: Box<Self>) -> StorageResult<u64> {
        let mut tables = self.storage.write()?;
        let position = {
            let view = self.storage.view(&tables);
            only(self.window(self.select(&view)?))?
        };
        Ok(self
            .storage
            .remove_rows(&mut tables, &self.model, BTreeSet::from([position])))
    }
}

/// The single position of a one-row result
fn only(positions: Vec<usize>) -> StorageResult<usize> {
    match positions.as_slice() {
        [] => Err(StorageError::NoResult),
        [position] => Ok(*position),
        _ => Err(StorageError::MultipleResults),
    }
}

/// Read access to every table at once
struct View<'s> {
    storage: &'s MemoryStorage,
    tables: &'s Tables,
}

impl<'s> View<'s> {
    fn table(&self, model: &str) -> StorageResult<&'s Table> {
        self.tables
            .get(model)
            .ok_or_else(|| StorageError::Internal(format!("no table for model '{}'", model)))
    }

    fn select(
        &self,
        model: &ModelDescriptor,
        predicates: &[Predicate],
        sorts: &[SortKey],
    ) -> StorageResult<Vec<usize>> {
        let table = self.table(model.name())?;

        let mut matched = Vec::new();
        for (position, row) in table.rows.iter().enumerate() {
            let results = predicates
                .iter()
                .map(|p| self.matches(model, row, p))
                .collect::<StorageResult<Vec<bool>>>()?;
            if results.into_iter().all(|r| r) {
                matched.push(position);
            }
        }

        if sorts.is_empty() {
            return Ok(matched);
        }

        let mut keyed = matched
            .into_iter()
            .map(|position| {
                let row = &table.rows[position];
                sorts
                    .iter()
                    .map(|key| self.sort_value(model, row, &key.path))
                    .collect::<StorageResult<Vec<Value>>>()
                    .map(|values| (position, values))
            })
            .collect::<StorageResult<Vec<_>>>()?;

        // Every non-null key in a column must be comparable before sorting
        for index in 0..sorts.len() {
            let mut present = keyed.iter().map(|(_, k)| &k[index]).filter(|v| !v.is_null());
            if let Some(first) = present.next() {
                for other in present {
                    compare_values(first, other)?;
                }
            }
        }

        keyed.sort_by(|(_, a), (_, b)| order_keys(a, b, sorts));
        Ok(keyed.into_iter().map(|(position, _)| position).collect())
    }

    fn matches(&self, model: &ModelDescriptor, row: &Row, predicate: &Predicate) -> StorageResult<bool> {
        match predicate {
            Predicate::Compare {
                attribute,
                comparison,
                argument,
            } => {
                let value = self.attribute(model, row, attribute)?;
                compare(&value, *comparison, argument)
            }
            Predicate::CompareField {
                attribute,
                comparison,
                other,
            } => {
                let left = self.attribute(model, row, attribute)?;
                let right = self.attribute(model, row, other)?;
                if left.is_null() || right.is_null() {
                    return Ok(false);
                }
                compare(&left, *comparison, &Argument::Value(right))
            }
            Predicate::Related {
                relation,
                quantifier: _,
                inner,
            } => {
                let rel = relation_def(model, relation)?;
                let related = self.related_rows(model, row, rel)?;
                match inner {
                    None => Ok(!related.is_empty()),
                    Some(inner) => {
                        let target = self.storage.descriptor(&rel.target)?;
                        let results = related
                            .into_iter()
                            .map(|r| self.matches(target, r, inner))
                            .collect::<StorageResult<Vec<bool>>>()?;
                        Ok(results.into_iter().any(|r| r))
                    }
                }
            }
            Predicate::And(children) => {
                let results = children
                    .iter()
                    .map(|c| self.matches(model, row, c))
                    .collect::<StorageResult<Vec<bool>>>()?;
                Ok(results.into_iter().all(|r| r))
            }
            Predicate::Or(children) => {
                let results = children
                    .iter()
                    .map(|c| self.matches(model, row, c))
                    .collect::<StorageResult<Vec<bool>>>()?;
                Ok(results.into_iter().any(|r| r))
            }
            Predicate::Not(inner) => Ok(!self.matches(model, row, inner)?),
        }
    }

    /// Value of a column, hybrid or proxy on `row`
    fn attribute(&self, model: &ModelDescriptor, row: &Row, name: &str) -> StorageResult<Value> {
        match model.kind_of(name) {
            Some(AttributeKind::Column) => Ok(row.get(name).cloned().unwrap_or(Value::Null)),
            Some(AttributeKind::Hybrid) => Ok(self
                .storage
                .hybrids
                .get(&(model.name().to_string(), name.to_string()))
                .map(|f| f(row))
                .unwrap_or(Value::Null)),
            Some(AttributeKind::Proxy) => {
                let proxy = model.proxy(name).ok_or_else(|| StorageError::UnknownColumn {
                    model: model.name().to_string(),
                    column: name.to_string(),
                })?;
                let rel = relation_def(model, &proxy.relation)?;
                let target = self.storage.descriptor(&rel.target)?;
                let related = self.related_rows(model, row, rel)?;
                match rel.cardinality {
                    Cardinality::ToOne => match related.first() {
                        Some(r) => self.attribute(target, r, &proxy.attribute),
                        None => Ok(Value::Null),
                    },
                    Cardinality::ToMany => related
                        .into_iter()
                        .map(|r| self.attribute(target, r, &proxy.attribute))
                        .collect::<StorageResult<Vec<_>>>()
                        .map(Value::Array),
                }
            }
            Some(AttributeKind::Relation) | None => Err(StorageError::UnknownColumn {
                model: model.name().to_string(),
                column: name.to_string(),
            }),
        }
    }

    fn related_rows(
        &self,
        model: &ModelDescriptor,
        row: &Row,
        relation: &RelationDef,
    ) -> StorageResult<Vec<&'s Row>> {
        let target = self.storage.descriptor(&relation.target)?;
        let table = self.table(&relation.target)?;
        match relation.cardinality {
            Cardinality::ToOne => {
                let fk = row.get(&relation.foreign_key).unwrap_or(&Value::Null);
                if fk.is_null() {
                    return Ok(Vec::new());
                }
                let Some(pk) = target.primary_keys().first() else {
                    return Ok(Vec::new());
                };
                Ok(table
                    .rows
                    .iter()
                    .filter(|r| same_value(r.get(pk).unwrap_or(&Value::Null), fk))
                    .take(1)
                    .collect())
            }
            Cardinality::ToMany => {
                let Some(pk) = model.primary_keys().first() else {
                    return Ok(Vec::new());
                };
                let own = row.get(pk).unwrap_or(&Value::Null);
                Ok(table
                    .rows
                    .iter()
                    .filter(|r| same_value(r.get(&relation.foreign_key).unwrap_or(&Value::Null), own))
                    .collect())
            }
        }
    }

    fn sort_value(&self, model: &ModelDescriptor, row: &Row, path: &[String]) -> StorageResult<Value> {
        let Some((last, hops)) = path.split_last() else {
            return Ok(Value::Null);
        };
        let mut current_model = model;
        let mut current_row = row;
        for hop in hops {
            let rel = relation_def(current_model, hop)?;
            match self.related_rows(current_model, current_row, rel)?.first() {
                Some(next) => current_row = *next,
                None => return Ok(Value::Null),
            }
            current_model = self.storage.descriptor(&rel.target)?;
        }
        self.attribute(current_model, current_row, last)
    }

    fn entity(&self, model: &ModelDescriptor, row: &Row, depth: usize) -> StorageResult<Entity> {
        let mut values = Row::new();
        for column in model.columns() {
            values.insert(
                column.name.clone(),
                row.get(&column.name).cloned().unwrap_or(Value::Null),
            );
        }
        for name in model.hybrids().iter().chain(model.proxies().keys()) {
            values.insert(name.clone(), self.attribute(model, row, name)?);
        }

        let mut entity = Entity::new(model.name(), values);
        if depth == 0 {
            return Ok(entity);
        }

        for (name, rel) in model.relations() {
            let target = self.storage.descriptor(&rel.target)?;
            let rows = self.related_rows(model, row, rel)?;
            let related = match rel.cardinality {
                Cardinality::ToOne => Related::One(match rows.first() {
                    Some(r) => Some(Box::new(self.entity(target, r, depth - 1)?)),
                    None => None,
                }),
                Cardinality::ToMany => Related::Many(
                    rows.into_iter()
                        .map(|r| self.entity(target, r, depth - 1))
                        .collect::<StorageResult<Vec<_>>>()?,
                ),
            };
            entity.relations.insert(name.clone(), related);
        }
        Ok(entity)
    }

    fn prepare_insert(
        &self,
        model: &ModelDescriptor,
        table: &Table,
        values: &Row,
    ) -> StorageResult<(Row, i64)> {
        let auto_increment = match model.primary_keys() {
            [pk] => model
                .column(pk)
                .map(|c| c.field_type == FieldType::Integer)
                .unwrap_or(false),
            _ => false,
        };

        let mut next_id = table.next_id;
        let mut row = Row::new();
        for column in model.columns() {
            let mut value = values.get(&column.name).cloned().unwrap_or(Value::Null);
            if column.primary && auto_increment {
                if value.is_null() {
                    value = Value::from(next_id);
                }
                if let Some(id) = value.as_i64() {
                    next_id = next_id.max(id + 1);
                }
            }
            validate_column(model, column, &value)?;
            row.insert(column.name.clone(), value);
        }
        self.check_foreign_keys(model, &row)?;
        Ok((row, next_id))
    }

    fn check_foreign_keys(&self, model: &ModelDescriptor, row: &Row) -> StorageResult<()> {
        for (column, target_name) in model.foreign_keys() {
            let value = row.get(column).unwrap_or(&Value::Null);
            if value.is_null() {
                continue;
            }
            let target = self.storage.descriptor(target_name)?;
            let Some(pk) = target.primary_keys().first() else {
                continue;
            };
            let exists = self
                .table(target_name)?
                .rows
                .iter()
                .any(|r| same_value(r.get(pk).unwrap_or(&Value::Null), value));
            if !exists {
                return Err(StorageError::ForeignKeyViolation {
                    model: model.name().to_string(),
                    column: column.clone(),
                    target: target_name.clone(),
                });
            }
        }
        Ok(())
    }
}

fn relation_def<'m>(model: &'m ModelDescriptor, name: &str) -> StorageResult<&'m RelationDef> {
    model
        .relation(name)
        .ok_or_else(|| StorageError::UnknownRelation {
            model: model.name().to_string(),
            relation: name.to_string(),
        })
}

fn check_known_columns(model: &ModelDescriptor, values: &Row) -> StorageResult<()> {
    match values.keys().find(|name| model.column(name).is_none()) {
        Some(name) => Err(StorageError::UnknownColumn {
            model: model.name().to_string(),
            column: name.clone(),
        }),
        None => Ok(()),
    }
}

fn validate_column(model: &ModelDescriptor, column: &ColumnDef, value: &Value) -> StorageResult<()> {
    if value.is_null() {
        if column.nullable {
            return Ok(());
        }
        return Err(StorageError::MissingValue {
            model: model.name().to_string(),
            column: column.name.clone(),
        });
    }
    if !column.field_type.validate(value) {
        return Err(StorageError::InvalidValue {
            model: model.name().to_string(),
            column: column.name.clone(),
            expected: column.field_type.as_str().to_string(),
        });
    }
    Ok(())
}

/// Primary key tuples and unique columns must not repeat
fn check_unique(model: &ModelDescriptor, rows: &[Row]) -> StorageResult<()> {
    let mut seen = HashSet::new();
    for row in rows {
        let key: Vec<Value> = model
            .primary_keys()
            .iter()
            .map(|pk| row.get(pk).cloned().unwrap_or(Value::Null))
            .collect();
        if !seen.insert(Value::Array(key).to_string()) {
            return Err(StorageError::UniqueViolation {
                model: model.name().to_string(),
                column: model.primary_keys().join(","),
            });
        }
    }

    for column in model.unique_keys() {
        let mut seen = HashSet::new();
        for value in rows.iter().filter_map(|r| r.get(column)) {
            if !value.is_null() && !seen.insert(value.to_string()) {
                return Err(StorageError::UniqueViolation {
                    model: model.name().to_string(),
                    column: column.clone(),
                });
            }
        }
    }
    Ok(())
}

fn find_positions(model: &ModelDescriptor, table: &Table, keys: &[Vec<Value>]) -> StorageResult<Vec<usize>> {
    let pks = model.primary_keys();
    keys.iter()
        .map(|key| {
            if key.len() != pks.len() {
                return Err(StorageError::InvalidArgument(format!(
                    "'{}' keys have {} values, got {}",
                    model.name(),
                    pks.len(),
                    key.len()
                )));
            }
            table
                .rows
                .iter()
                .position(|row| {
                    pks.iter()
                        .zip(key)
                        .all(|(pk, v)| same_value(row.get(pk).unwrap_or(&Value::Null), v))
                })
                .ok_or_else(|| StorageError::NoSuchInstance {
                    model: model.name().to_string(),
                    key: key
                        .iter()
                        .map(|v| match v {
                            Value::String(s) => s.clone(),
                            other => other.to_string(),
                        })
                        .collect::<Vec<_>>()
                        .join(","),
                })
        })
        .collect()
}

fn validate_argument(comparison: Comparison, argument: &Argument) -> StorageResult<()> {
    match comparison {
        Comparison::Like | Comparison::NotLike | Comparison::ILike | Comparison::NotILike => {
            match argument {
                Argument::Value(Value::String(pattern)) => {
                    like_regex(pattern, false).map(|_| ())
                }
                _ => Err(StorageError::InvalidArgument("pattern must be a string".to_string())),
            }
        }
        _ => Ok(()),
    }
}

fn single(argument: &Argument) -> StorageResult<&Value> {
    match argument {
        Argument::Value(value) => Ok(value),
        other => Err(StorageError::InvalidArgument(format!(
            "expected a single value, got {:?}",
            other
        ))),
    }
}

fn text<'v>(value: &'v Value, argument: &'v Value) -> StorageResult<(&'v str, &'v str)> {
    match (value, argument) {
        (Value::String(v), Value::String(a)) => Ok((v, a)),
        _ => Err(StorageError::TypeMismatch {
            left: kind_name(value).to_string(),
            right: kind_name(argument).to_string(),
        }),
    }
}

/// Evaluate one comparison with SQL null semantics
fn compare(value: &Value, comparison: Comparison, argument: &Argument) -> StorageResult<bool> {
    match comparison {
        Comparison::IsNull => return Ok(value.is_null()),
        Comparison::IsNotNull => return Ok(!value.is_null()),
        Comparison::Is | Comparison::IsNot => {
            let same = match single(argument)? {
                Value::Null => value.is_null(),
                Value::Bool(b) => match value {
                    Value::Null => false,
                    Value::Bool(v) => v == b,
                    other => {
                        return Err(StorageError::TypeMismatch {
                            left: kind_name(other).to_string(),
                            right: "boolean".to_string(),
                        })
                    }
                },
                other => {
                    return Err(StorageError::InvalidArgument(format!(
                        "identity test against {}",
                        kind_name(other)
                    )))
                }
            };
            return Ok(if comparison == Comparison::Is { same } else { !same });
        }
        Comparison::Eq => {
            let arg = single(argument)?;
            if arg.is_null() {
                return Ok(value.is_null());
            }
        }
        Comparison::Ne => {
            let arg = single(argument)?;
            if arg.is_null() {
                return Ok(!value.is_null());
            }
        }
        _ => {}
    }

    if value.is_null() {
        return Ok(false);
    }

    match comparison {
        Comparison::Eq => values_equal(value, single(argument)?),
        Comparison::Ne => values_equal(value, single(argument)?).map(|eq| !eq),
        Comparison::Gt => Ok(compare_values(value, single(argument)?)? == Ordering::Greater),
        Comparison::Lt => Ok(compare_values(value, single(argument)?)? == Ordering::Less),
        Comparison::Ge => Ok(compare_values(value, single(argument)?)? != Ordering::Less),
        Comparison::Le => Ok(compare_values(value, single(argument)?)? != Ordering::Greater),
        Comparison::In | Comparison::NotIn => {
            let Argument::List(items) = argument else {
                return Err(StorageError::InvalidArgument("expected a list".to_string()));
            };
            let mut found = false;
            for item in items.iter().filter(|i| !i.is_null()) {
                found |= values_equal(value, item)?;
            }
            Ok(if comparison == Comparison::In { found } else { !found })
        }
        Comparison::Between => {
            let Argument::Range(low, high) = argument else {
                return Err(StorageError::InvalidArgument("expected a range".to_string()));
            };
            if low.is_null() || high.is_null() {
                return Ok(false);
            }
            Ok(compare_values(value, low)? != Ordering::Less
                && compare_values(value, high)? != Ordering::Greater)
        }
        Comparison::Like | Comparison::NotLike | Comparison::ILike | Comparison::NotILike => {
            let (value, pattern) = text(value, single(argument)?)?;
            let insensitive = matches!(comparison, Comparison::ILike | Comparison::NotILike);
            let matched = like_regex(pattern, insensitive)?.is_match(value);
            Ok(match comparison {
                Comparison::Like | Comparison::ILike => matched,
                _ => !matched,
            })
        }
        Comparison::Match => {
            let (value, query) = text(value, single(argument)?)?;
            let haystack = value.to_lowercase();
            Ok(query
                .split_whitespace()
                .all(|term| haystack.contains(&term.to_lowercase())))
        }
        Comparison::Contains => {
            let arg = single(argument)?;
            match (value, arg) {
                (Value::String(v), Value::String(a)) => Ok(v.contains(a.as_str())),
                (Value::Array(items), _) => Ok(items.iter().any(|i| same_value(i, arg))),
                _ => Err(StorageError::TypeMismatch {
                    left: kind_name(value).to_string(),
                    right: kind_name(arg).to_string(),
                }),
            }
        }
        Comparison::StartsWith => {
            let (value, prefix) = text(value, single(argument)?)?;
            Ok(value.starts_with(prefix))
        }
        Comparison::EndsWith => {
            let (value, suffix) = text(value, single(argument)?)?;
            Ok(value.ends_with(suffix))
        }
        Comparison::IsNull | Comparison::IsNotNull | Comparison::Is | Comparison::IsNot => {
            Ok(false)
        }
    }
}

/// Translate a SQL LIKE pattern (`%`, `_`) into an anchored regex
fn like_regex(pattern: &str, case_insensitive: bool) -> StorageResult<Regex> {
    let mut expr = String::with_capacity(pattern.len() + 2);
    expr.push('^');
    let mut buf = [0u8; 4];
    for c in pattern.chars() {
        match c {
            '%' => expr.push_str(".*"),
            '_' => expr.push('.'),
            other => expr.push_str(&regex::escape(other.encode_utf8(&mut buf))),
        }
    }
    expr.push('$');
    RegexBuilder::new(&expr)
        .case_insensitive(case_insensitive)
        .dot_matches_new_line(true)
        .build()
        .map_err(|_| StorageError::InvalidPattern(pattern.to_string()))
}

fn kind_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

fn values_equal(a: &Value, b: &Value) -> StorageResult<bool> {
    match (a, b) {
        (Value::Number(_), Value::Number(_)) | (Value::String(_), Value::String(_)) => {
            Ok(compare_values(a, b)? == Ordering::Equal)
        }
        _ if kind_name(a) == kind_name(b) => Ok(a == b),
        _ => Err(StorageError::TypeMismatch {
            left: kind_name(a).to_string(),
            right: kind_name(b).to_string(),
        }),
    }
}

/// Loose equality used for key lookups and joins
fn same_value(a: &Value, b: &Value) -> bool {
    !a.is_null() && values_equal(a, b).unwrap_or(false)
}

fn compare_values(a: &Value, b: &Value) -> StorageResult<Ordering> {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => Ok(match (x.as_i64(), y.as_i64()) {
            (Some(x), Some(y)) => x.cmp(&y),
            _ => {
                let x = x.as_f64().unwrap_or(0.0);
                let y = y.as_f64().unwrap_or(0.0);
                x.partial_cmp(&y).unwrap_or(Ordering::Equal)
            }
        }),
        (Value::String(x), Value::String(y)) => {
            // Timestamps compare by instant, not by spelling
            match (
                chrono::DateTime::parse_from_rfc3339(x),
                chrono::DateTime::parse_from_rfc3339(y),
            ) {
                (Ok(x), Ok(y)) => Ok(x.cmp(&y)),
                _ => Ok(x.cmp(y)),
            }
        }
        (Value::Bool(x), Value::Bool(y)) => Ok(x.cmp(y)),
        _ => Err(StorageError::TypeMismatch {
            left: kind_name(a).to_string(),
            right: kind_name(b).to_string(),
        }),
    }
}

fn order_keys(a: &[Value], b: &[Value], sorts: &[SortKey]) -> Ordering {
    for (index, key) in sorts.iter().enumerate() {
        let nulls_first = match key.nulls {
            NullPlacement::First => true,
            NullPlacement::Last => false,
            NullPlacement::Default => key.descending,
        };
        let ordering = match (a[index].is_null(), b[index].is_null()) {
            (true, true) => Ordering::Equal,
            (true, false) if nulls_first => Ordering::Less,
            (true, false) => Ordering::Greater,
            (false, true) if nulls_first => Ordering::Greater,
            (false, true) => Ordering::Less,
            (false, false) => {
                let ordering = compare_values(&a[index], &b[index]).unwrap_or(Ordering::Equal);
                if key.descending {
                    ordering.reverse()
                } else {
                    ordering
                }
            }
        };
        if ordering != Ordering::Equal {
            return ordering;
        }
    }
    Ordering::Equal
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{ColumnDef, FieldType, ModelDef, RelationDef};
    use serde_json::json;

    fn storage() -> MemoryStorage {
        let mut catalog = ModelCatalog::new();
        catalog
            .register(
                ModelDef::new("person")
                    .column(ColumnDef::new("id", FieldType::Integer).primary())
                    .column(ColumnDef::new("name", FieldType::String).unique().not_null())
                    .column(ColumnDef::new("age", FieldType::Integer))
                    .column(ColumnDef::new("address_id", FieldType::Integer).references("address"))
                    .relation(RelationDef::to_one("address", "address", "address_id"))
                    .relation(RelationDef::to_many("pets", "pet", "owner_id"))
                    .proxy("city", "address", "city")
                    .hybrid("is_adult"),
            )
            .unwrap();
        catalog
            .register(
                ModelDef::new("address")
                    .column(ColumnDef::new("id", FieldType::Integer).primary())
                    .column(ColumnDef::new("city", FieldType::String)),
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
        catalog.validate().unwrap();

        MemoryStorage::new(Arc::new(catalog)).with_hybrid("person", "is_adult", |row| {
            match row.get("age").and_then(Value::as_i64) {
                Some(age) => Value::Bool(age >= 18),
                None => Value::Null,
            }
        })
    }

    fn row(value: Value) -> Row {
        value.as_object().cloned().unwrap()
    }

    fn seed(storage: &MemoryStorage) {
        storage.insert("address", &row(json!({"city": "Berlin"})), 0).unwrap();
        storage.insert("address", &row(json!({"city": "Paris"})), 0).unwrap();
        storage
            .insert("person", &row(json!({"name": "Ann", "age": 30, "address_id": 1})), 0)
            .unwrap();
        storage
            .insert("person", &row(json!({"name": "Bob", "age": 12, "address_id": 2})), 0)
            .unwrap();
        storage.insert("person", &row(json!({"name": "Cid"})), 0).unwrap();
        storage
            .insert("pet", &row(json!({"kind": "cat", "owner_id": 1})), 0)
            .unwrap();
    }

    fn names(page: &Page) -> Vec<&str> {
        page.entities
            .iter()
            .map(|e| e.get("name").and_then(Value::as_str).unwrap())
            .collect()
    }

    #[test]
    fn test_insert_assigns_ids() {
        let storage = storage();
        seed(&storage);
        let entity = storage.insert("person", &row(json!({"name": "Dee"})), 0).unwrap();
        assert_eq!(entity.get("id"), Some(&json!(4)));
        assert_eq!(entity.get("is_adult"), Some(&Value::Null));
        assert_eq!(storage.count("person").unwrap(), 4);
    }

    #[test]
    fn test_write_constraints() {
        let storage = storage();
        seed(&storage);
        assert!(matches!(
            storage.insert("person", &row(json!({"name": "Ann"})), 0),
            Err(StorageError::UniqueViolation { .. })
        ));
        assert!(matches!(
            storage.insert("person", &row(json!({"age": 3})), 0),
            Err(StorageError::MissingValue { .. })
        ));
        assert!(matches!(
            storage.insert("person", &row(json!({"name": "Eve", "age": "old"})), 0),
            Err(StorageError::InvalidValue { .. })
        ));
        assert!(matches!(
            storage.insert("person", &row(json!({"name": "Eve", "address_id": 9})), 0),
            Err(StorageError::ForeignKeyViolation { .. })
        ));
        assert!(matches!(
            storage.insert("person", &row(json!({"name": "Eve", "shoe": 9})), 0),
            Err(StorageError::UnknownColumn { .. })
        ));
        assert_eq!(storage.count("person").unwrap(), 3);
    }

    #[test]
    fn test_filter_and_sort() {
        let storage = storage();
        seed(&storage);

        let mut query = storage.query("person").unwrap();
        query
            .filter(Predicate::compare("name", Comparison::Like, Argument::Value(json!("%b"))))
            .unwrap();
        assert_eq!(names(&query.fetch().unwrap()), vec!["Bob"]);

        let mut query = storage.query("person").unwrap();
        query
            .filter(Predicate::compare("name", Comparison::ILike, Argument::Value(json!("a%"))))
            .unwrap();
        assert_eq!(names(&query.fetch().unwrap()), vec!["Ann"]);

        let mut query = storage.query("person").unwrap();
        query
            .order_by(SortKey {
                path: vec!["age".into()],
                descending: false,
                nulls: NullPlacement::Default,
            })
            .unwrap();
        assert_eq!(names(&query.fetch().unwrap()), vec!["Bob", "Ann", "Cid"]);

        let mut query = storage.query("person").unwrap();
        query
            .order_by(SortKey {
                path: vec!["age".into()],
                descending: true,
                nulls: NullPlacement::Last,
            })
            .unwrap();
        query.limit(2);
        let page = query.fetch().unwrap();
        assert_eq!(page.total, 3);
        assert_eq!(names(&page), vec!["Ann", "Bob"]);
    }

    #[test]
    fn test_null_semantics() {
        let storage = storage();
        seed(&storage);

        let mut query = storage.query("person").unwrap();
        query
            .filter(Predicate::compare("age", Comparison::Ne, Argument::Value(json!(30))))
            .unwrap();
        assert_eq!(names(&query.fetch().unwrap()), vec!["Bob"]);

        let mut query = storage.query("person").unwrap();
        query
            .filter(Predicate::compare("age", Comparison::Eq, Argument::Value(Value::Null)))
            .unwrap();
        assert_eq!(names(&query.fetch().unwrap()), vec!["Cid"]);
    }

    #[test]
    fn test_relations_hybrids_proxies() {
        let storage = storage();
        seed(&storage);

        let mut query = storage.query("person").unwrap();
        query
            .filter(Predicate::Related {
                relation: "address".into(),
                quantifier: Quantifier::Has,
                inner: Some(Box::new(Predicate::compare(
                    "city",
                    Comparison::Eq,
                    Argument::Value(json!("Paris")),
                ))),
            })
            .unwrap();
        assert_eq!(names(&query.fetch().unwrap()), vec!["Bob"]);

        let mut query = storage.query("person").unwrap();
        query
            .filter(Predicate::Related {
                relation: "pets".into(),
                quantifier: Quantifier::Any,
                inner: None,
            })
            .unwrap();
        assert_eq!(names(&query.fetch().unwrap()), vec!["Ann"]);

        let mut query = storage.query("person").unwrap();
        query
            .filter(Predicate::compare("is_adult", Comparison::Is, Argument::Value(json!(true))))
            .unwrap();
        query
            .filter(Predicate::compare("city", Comparison::Eq, Argument::Value(json!("Berlin"))))
            .unwrap();
        let entity = query.fetch_one().unwrap();
        assert_eq!(entity.get("name"), Some(&json!("Ann")));
        assert_eq!(entity.get("city"), Some(&json!("Berlin")));
    }

    #[test]
    fn test_storage_rejections() {
        let storage = storage();
        seed(&storage);

        let mut query = storage.query("person").unwrap();
        assert!(matches!(
            query.filter(Predicate::compare("shoe", Comparison::Eq, Argument::Value(json!(1)))),
            Err(StorageError::UnknownColumn { .. })
        ));
        assert!(matches!(
            query.filter(Predicate::Related {
                relation: "pets".into(),
                quantifier: Quantifier::Has,
                inner: None,
            }),
            Err(StorageError::InvalidTraversal(_))
        ));
        assert!(matches!(
            query.order_by(SortKey {
                path: vec!["pets".into(), "kind".into()],
                descending: false,
                nulls: NullPlacement::Default,
            }),
            Err(StorageError::InvalidOrdering(_))
        ));

        query
            .filter(Predicate::compare("age", Comparison::Gt, Argument::Value(json!("ten"))))
            .unwrap();
        assert!(matches!(
            query.fetch(),
            Err(StorageError::TypeMismatch { .. })
        ));
    }

    #[test]
    fn test_eager_loading() {
        let storage = storage();
        seed(&storage);
        let people = storage.get("person", &[vec![json!(1)]], 1).unwrap();
        let ann = &people[0];
        match ann.relations.get("address") {
            Some(Related::One(Some(address))) => {
                assert_eq!(address.get("city"), Some(&json!("Berlin")));
                assert!(address.relations.is_empty());
            }
            other => panic!("unexpected relation {:?}", other),
        }
        match ann.relations.get("pets") {
            Some(Related::Many(pets)) => assert_eq!(pets.len(), 1),
            other => panic!("unexpected relation {:?}", other),
        }
    }

    #[test]
    fn test_multi_key_operations_are_all_or_nothing() {
        let storage = storage();
        seed(&storage);

        assert!(matches!(
            storage.delete("person", &[vec![json!(1)], vec![json!(42)]]),
            Err(StorageError::NoSuchInstance { .. })
        ));
        assert_eq!(storage.count("person").unwrap(), 3);

        assert!(storage
            .update("person", &[vec![json!(2)], vec![json!(3)]], &row(json!({"name": "Zed"})), 0)
            .is_err());

        let updated = storage
            .update("person", &[vec![json!(2)], vec![json!(3)]], &row(json!({"age": 40})), 0)
            .unwrap();
        assert_eq!(updated.len(), 2);

        assert_eq!(storage.delete("person", &[vec![json!(2)], vec![json!(3)]]).unwrap(), 2);
        assert_eq!(storage.count("person").unwrap(), 1);
    }

    #[test]
    fn test_bulk_update_and_delete() {
        let storage = storage();
        seed(&storage);

        let mut query = storage.query("person").unwrap();
        query
            .filter(Predicate::compare("age", Comparison::IsNull, Argument::None))
            .unwrap();
        assert_eq!(query.update_all(&row(json!({"age": 5}))).unwrap(), 1);

        let mut query = storage.query("person").unwrap();
        query
            .filter(Predicate::compare("age", Comparison::Lt, Argument::Value(json!(18))))
            .unwrap();
        assert_eq!(query.delete_all().unwrap(), 2);
        assert_eq!(storage.count("person").unwrap(), 1);
    }

    #[test]
    fn test_bulk_writes_respect_window() {
        let storage = storage();
        seed(&storage);
        let with_age = || {
            let mut query = storage.query("person").unwrap();
            query
                .filter(Predicate::compare("age", Comparison::IsNotNull, Argument::None))
                .unwrap();
            query
        };

        let mut query = with_age();
        query.limit(1);
        assert_eq!(query.update_all(&row(json!({"age": 99}))).unwrap(), 1);

        let err = with_age().update_one(&row(json!({"age": 1}))).unwrap_err();
        assert!(matches!(err, StorageError::MultipleResults));

        let mut query = with_age();
        query.offset(1);
        query.limit(1);
        assert_eq!(query.delete_one().unwrap(), 1);
        assert_eq!(storage.count("person").unwrap(), 2);

        let mut query = storage.query("person").unwrap();
        query
            .filter(Predicate::compare("age", Comparison::Gt, Argument::Value(json!(500))))
            .unwrap();
        assert!(matches!(query.delete_one().unwrap_err(), StorageError::NoResult));
    }

    #[test]
    fn test_like_translation() {
        assert!(like_regex("a_c%", false).unwrap().is_match("abcdef"));
        assert!(!like_regex("a_c%", false).unwrap().is_match("ac"));
        assert!(like_regex("1+1%", false).unwrap().is_match("1+1=2"));
        assert!(like_regex("ABC", true).unwrap().is_match("abc"));
    }
}
