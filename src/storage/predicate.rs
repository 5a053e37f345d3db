//! # Storage Predicates
//!
//! The executable predicate language understood by storage backends. Paths
//! here are plain attribute names; relation traversal is explicit through
//! `Related`.

use serde_json::Value;

/// Comparison applied to one attribute
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Comparison {
    Eq,
    Ne,
    Gt,
    Lt,
    Ge,
    Le,
    In,
    NotIn,
    IsNull,
    IsNotNull,
    Is,
    IsNot,
    Like,
    ILike,
    NotLike,
    NotILike,
    Match,
    Between,
    Contains,
    StartsWith,
    EndsWith,
}

/// Right-hand side of a comparison
#[derive(Debug, Clone, PartialEq)]
pub enum Argument {
    None,
    Value(Value),
    List(Vec<Value>),
    Range(Value, Value),
}

/// How a relation must be satisfied
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Quantifier {
    /// The single related row exists (and matches)
    Has,
    /// At least one related row exists (and matches)
    Any,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Predicate {
    Compare {
        attribute: String,
        comparison: Comparison,
        argument: Argument,
    },
    /// Compare two attributes of the same row
    CompareField {
        attribute: String,
        comparison: Comparison,
        other: String,
    },
    /// Evaluate `inner` against the rows reached through `relation`
    Related {
        relation: String,
        quantifier: Quantifier,
        inner: Option<Box<Predicate>>,
    },
    And(Vec<Predicate>),
    Or(Vec<Predicate>),
    Not(Box<Predicate>),
}

impl Predicate {
    pub fn compare(attribute: impl Into<String>, comparison: Comparison, argument: Argument) -> Self {
        Predicate::Compare {
            attribute: attribute.into(),
            comparison,
            argument,
        }
    }

    pub fn negate(self) -> Self {
        Predicate::Not(Box::new(self))
    }
}

/// Placement of nulls in a sort
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum NullPlacement {
    First,
    Last,
    /// Backend default
    #[default]
    Default,
}

/// One sort directive; `path` walks to-one relations before the attribute
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SortKey {
    pub path: Vec<String>,
    pub descending: bool,
    pub nulls: NullPlacement,
}
