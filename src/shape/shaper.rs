//! # Result Shaper
//!
//! Flattens entities into JSON objects. Shaping is a pure function of the
//! entity, so shaping the same entity twice gives equal output.

use serde_json::{Map, Value};

use crate::storage::{Entity, Related};

use super::selection::ColumnSelection;

/// Flattens entities according to include/exclude lists and a depth limit
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResultShaper {
    include: Option<ColumnSelection>,
    exclude: Option<ColumnSelection>,
    max_depth: usize,
}

impl ResultShaper {
    pub fn new(max_depth: usize) -> Self {
        Self {
            include: None,
            exclude: None,
            max_depth,
        }
    }

    /// Emit only the listed attributes and relations
    pub fn with_include(mut self, include: Option<ColumnSelection>) -> Self {
        self.include = include;
        self
    }

    /// Emit everything except the listed attributes and relations
    pub fn with_exclude(mut self, exclude: Option<ColumnSelection>) -> Self {
        self.exclude = exclude;
        self
    }

    /// Relation levels storage must load for this shaper
    pub fn load_depth(&self) -> usize {
        let included = self.include.as_ref().map(ColumnSelection::depth).unwrap_or(0);
        self.max_depth.max(included)
    }

    pub fn shape(&self, entity: &Entity) -> Value {
        shape_entity(
            entity,
            self.include.as_ref(),
            self.exclude.as_ref(),
            self.load_depth(),
        )
    }

    pub fn shape_all(&self, entities: &[Entity]) -> Value {
        Value::Array(entities.iter().map(|e| self.shape(e)).collect())
    }
}

fn shape_entity(
    entity: &Entity,
    include: Option<&ColumnSelection>,
    exclude: Option<&ColumnSelection>,
    depth: usize,
) -> Value {
    let mut out = Map::new();

    for (name, value) in &entity.values {
        let keep = match (include, exclude) {
            (Some(include), _) => include.has_column(name),
            (None, Some(exclude)) => !exclude.has_column(name),
            (None, None) => true,
        };
        if keep {
            out.insert(name.clone(), value.clone());
        }
    }

    if depth > 0 {
        for (name, related) in &entity.relations {
            let shaped = match (include, exclude) {
                (Some(include), _) => {
                    if let Some(nested) = include.relation(name) {
                        shape_related(related, Some(nested), None, depth - 1)
                    } else if include.has_column(name) {
                        // Named without nested columns: attributes only
                        shape_related(related, None, None, 0)
                    } else {
                        continue;
                    }
                }
                (None, Some(exclude)) => {
                    if exclude.has_column(name) {
                        continue;
                    }
                    shape_related(related, None, exclude.relation(name), depth - 1)
                }
                (None, None) => shape_related(related, None, None, depth - 1),
            };
            out.insert(name.clone(), shaped);
        }
    }

    Value::Object(out)
}

fn shape_related(
    related: &Related,
    include: Option<&ColumnSelection>,
    exclude: Option<&ColumnSelection>,
    depth: usize,
) -> Value {
    match related {
        Related::One(None) => Value::Null,
        Related::One(Some(entity)) => shape_entity(entity, include, exclude, depth),
        Related::Many(entities) => Value::Array(
            entities
                .iter()
                .map(|e| shape_entity(e, include, exclude, depth))
                .collect(),
        ),
    }
}
