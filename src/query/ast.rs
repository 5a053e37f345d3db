//! # Compiled Query AST
//!
//! The storage-independent form of one request's filters, orders and
//! pagination. Built by the compiler, mutated only by hooks, consumed by the
//! predicate evaluator.

use std::fmt;

use serde_json::{json, Map, Value};

use crate::model::{AttributeKind, Cardinality};

use super::operator::{Direction, NullsOrder, OperatorKind};

/// One relation traversed by a field path
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelationHop {
    pub name: String,
    pub target: String,
    pub cardinality: Cardinality,
}

/// What the final segment of a path resolved to
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PathTarget {
    Attribute(AttributeKind),
    Relation {
        target: String,
        cardinality: Cardinality,
    },
}

/// A resolved, possibly dotted, reference to an attribute
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldPath {
    /// Relations walked before reaching `name`
    pub hops: Vec<RelationHop>,
    pub name: String,
    pub target: PathTarget,
}

impl FieldPath {
    /// A column on the queried model itself
    pub fn column(name: impl Into<String>) -> Self {
        Self {
            hops: Vec::new(),
            name: name.into(),
            target: PathTarget::Attribute(AttributeKind::Column),
        }
    }

    pub fn is_relation(&self) -> bool {
        matches!(self.target, PathTarget::Relation { .. })
    }

    /// Relation names followed by the final attribute
    pub fn segments(&self) -> Vec<String> {
        self.hops
            .iter()
            .map(|h| h.name.clone())
            .chain(std::iter::once(self.name.clone()))
            .collect()
    }
}

impl fmt::Display for FieldPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for hop in &self.hops {
            write!(f, "{}.", hop.name)?;
        }
        f.write_str(&self.name)
    }
}

/// Right-hand side of a comparison
#[derive(Debug, Clone, PartialEq)]
pub enum Operand {
    /// No operand (null tests, bare `has`/`any`)
    Absent,
    Value(Value),
    List(Vec<Value>),
    Range(Value, Value),
    /// Another attribute of the same model
    Field(FieldPath),
    /// Filters evaluated against the related model
    Nested(Box<FilterTree>),
}

/// A single comparison
#[derive(Debug, Clone, PartialEq)]
pub struct FilterNode {
    pub field: FieldPath,
    pub operator: OperatorKind,
    pub operand: Operand,
    pub negate: bool,
}

impl FilterNode {
    pub fn new(field: FieldPath, operator: OperatorKind, operand: Operand) -> Self {
        Self {
            field,
            operator,
            operand,
            negate: false,
        }
    }

    /// Equality against a column of the queried model
    pub fn eq(column: impl Into<String>, value: Value) -> Self {
        Self::new(FieldPath::column(column), OperatorKind::Eq, Operand::Value(value))
    }

    /// Canonical wire form
    pub fn to_value(&self) -> Value {
        let mut out = Map::new();
        out.insert("name".into(), Value::String(self.field.to_string()));
        out.insert("op".into(), Value::String(self.operator.as_str().into()));
        match &self.operand {
            Operand::Absent => {}
            Operand::Value(v) => {
                out.insert("val".into(), v.clone());
            }
            Operand::List(items) => {
                out.insert("val".into(), Value::Array(items.clone()));
            }
            Operand::Range(low, high) => {
                out.insert("val".into(), json!([low, high]));
            }
            Operand::Field(path) => {
                out.insert("field".into(), Value::String(path.to_string()));
            }
            Operand::Nested(tree) => {
                let nested = match tree.as_ref() {
                    FilterTree::Junction(j) if j.kind == JunctionKind::And => {
                        j.children.iter().map(FilterTree::to_value).collect()
                    }
                    other => vec![other.to_value()],
                };
                out.insert("val".into(), Value::Array(nested));
            }
        }
        if self.negate {
            out.insert("negate".into(), Value::Bool(true));
        }
        Value::Object(out)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JunctionKind {
    And,
    Or,
}

impl JunctionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            JunctionKind::And => "and",
            JunctionKind::Or => "or",
        }
    }
}

/// Boolean combinator over child filters
#[derive(Debug, Clone, PartialEq)]
pub struct JunctionNode {
    pub kind: JunctionKind,
    pub children: Vec<FilterTree>,
}

impl JunctionNode {
    pub fn and(children: Vec<FilterTree>) -> Self {
        Self {
            kind: JunctionKind::And,
            children,
        }
    }

    pub fn or(children: Vec<FilterTree>) -> Self {
        Self {
            kind: JunctionKind::Or,
            children,
        }
    }

    pub fn to_value(&self) -> Value {
        let children: Vec<Value> = self.children.iter().map(FilterTree::to_value).collect();
        let mut out = Map::new();
        out.insert(self.kind.as_str().into(), Value::Array(children));
        Value::Object(out)
    }
}

/// Node of the filter tree
#[derive(Debug, Clone, PartialEq)]
pub enum FilterTree {
    Leaf(FilterNode),
    Junction(JunctionNode),
}

impl FilterTree {
    pub fn to_value(&self) -> Value {
        match self {
            FilterTree::Leaf(node) => node.to_value(),
            FilterTree::Junction(junction) => junction.to_value(),
        }
    }
}

impl From<FilterNode> for FilterTree {
    fn from(node: FilterNode) -> Self {
        FilterTree::Leaf(node)
    }
}

/// One sort key
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderNode {
    pub field: FieldPath,
    pub direction: Direction,
    pub nulls: NullsOrder,
}

impl OrderNode {
    pub fn to_value(&self) -> Value {
        let mut out = Map::new();
        out.insert("field".into(), Value::String(self.field.to_string()));
        out.insert(
            "direction".into(),
            Value::String(self.direction.as_str().into()),
        );
        if self.nulls != NullsOrder::Default {
            out.insert("nulls".into(), Value::String(self.nulls.as_str().into()));
        }
        Value::Object(out)
    }
}

/// A compiled query
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueryPlan {
    /// Root of the filter tree, always an AND junction when present
    pub filter_tree: Option<JunctionNode>,
    pub orders: Vec<OrderNode>,
    pub limit: Option<u64>,
    pub offset: Option<u64>,
    pub single: bool,
}

impl QueryPlan {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a filter to the root conjunction
    pub fn push_filter(&mut self, filter: impl Into<FilterTree>) {
        self.filter_tree
            .get_or_insert_with(|| JunctionNode::and(Vec::new()))
            .children
            .push(filter.into());
    }

    /// Number of top-level filters
    pub fn filter_count(&self) -> usize {
        self.filter_tree
            .as_ref()
            .map(|root| root.children.len())
            .unwrap_or(0)
    }

    /// Canonical wire form; compiling it again yields an equal plan
    pub fn to_value(&self) -> Value {
        let mut out = Map::new();
        let filters: Vec<Value> = self
            .filter_tree
            .iter()
            .flat_map(|root| root.children.iter().map(FilterTree::to_value))
            .collect();
        out.insert("filters".into(), Value::Array(filters));
        out.insert(
            "order_by".into(),
            Value::Array(self.orders.iter().map(OrderNode::to_value).collect()),
        );
        if let Some(limit) = self.limit {
            out.insert("limit".into(), Value::from(limit));
        }
        if let Some(offset) = self.offset {
            out.insert("offset".into(), Value::from(offset));
        }
        if self.single {
            out.insert("single".into(), Value::Bool(true));
        }
        Value::Object(out)
    }
}
