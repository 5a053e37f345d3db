//! # Filter Operators
//!
//! Operator tokens accepted in client filters. Every alias normalizes to one
//! `OperatorKind`; nothing downstream sees the original spelling.

use serde::{Deserialize, Serialize};

/// Canonical comparison operators
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperatorKind {
    /// Equals
    Eq,
    /// Not equals
    Ne,
    Gt,
    Lt,
    Ge,
    Le,
    /// Value in list
    In,
    /// Value not in list
    NotIn,
    IsNull,
    IsNotNull,
    /// Identity test against null/true/false
    Is,
    IsNot,
    /// Pattern match (LIKE)
    Like,
    /// Case-insensitive pattern match
    ILike,
    NotLike,
    NotILike,
    /// To-one relation satisfies a nested filter
    Has,
    /// Some member of a to-many relation satisfies a nested filter
    Any,
    /// Full-text style match
    Match,
    Between,
    Contains,
    StartsWith,
    EndsWith,
}

/// Operand shape an operator requires
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Arity {
    /// No operand key at all
    None,
    /// Any single JSON value
    Scalar,
    /// null or a boolean
    Identity,
    /// A string
    Pattern,
    /// A JSON array
    Sequence,
    /// A two element array `[low, high]`
    Pair,
    /// A nested filter object or list of filter objects, or nothing
    Nested,
}

impl OperatorKind {
    /// Normalize an operator token
    pub fn parse(token: &str) -> Option<Self> {
        let kind = match token {
            "==" | "eq" | "equals" | "equals_to" => OperatorKind::Eq,
            "!=" | "ne" | "neq" | "does_not_equal" | "not_equal_to" => OperatorKind::Ne,
            ">" | "gt" => OperatorKind::Gt,
            "<" | "lt" => OperatorKind::Lt,
            ">=" | "ge" | "gte" | "geq" => OperatorKind::Ge,
            "<=" | "le" | "lte" | "leq" => OperatorKind::Le,
            "in" => OperatorKind::In,
            "not_in" => OperatorKind::NotIn,
            "is_null" => OperatorKind::IsNull,
            "is_not_null" => OperatorKind::IsNotNull,
            "is" => OperatorKind::Is,
            "is_not" => OperatorKind::IsNot,
            "like" => OperatorKind::Like,
            "ilike" => OperatorKind::ILike,
            "not_like" => OperatorKind::NotLike,
            "not_ilike" => OperatorKind::NotILike,
            "has" => OperatorKind::Has,
            "any" => OperatorKind::Any,
            "match" => OperatorKind::Match,
            "between" => OperatorKind::Between,
            "contains" => OperatorKind::Contains,
            "startswith" => OperatorKind::StartsWith,
            "endswith" => OperatorKind::EndsWith,
            _ => return None,
        };
        Some(kind)
    }

    /// Canonical token
    pub fn as_str(&self) -> &'static str {
        match self {
            OperatorKind::Eq => "eq",
            OperatorKind::Ne => "neq",
            OperatorKind::Gt => "gt",
            OperatorKind::Lt => "lt",
            OperatorKind::Ge => "gte",
            OperatorKind::Le => "lte",
            OperatorKind::In => "in",
            OperatorKind::NotIn => "not_in",
            OperatorKind::IsNull => "is_null",
            OperatorKind::IsNotNull => "is_not_null",
            OperatorKind::Is => "is",
            OperatorKind::IsNot => "is_not",
            OperatorKind::Like => "like",
            OperatorKind::ILike => "ilike",
            OperatorKind::NotLike => "not_like",
            OperatorKind::NotILike => "not_ilike",
            OperatorKind::Has => "has",
            OperatorKind::Any => "any",
            OperatorKind::Match => "match",
            OperatorKind::Between => "between",
            OperatorKind::Contains => "contains",
            OperatorKind::StartsWith => "startswith",
            OperatorKind::EndsWith => "endswith",
        }
    }

    pub fn arity(&self) -> Arity {
        match self {
            OperatorKind::IsNull | OperatorKind::IsNotNull => Arity::None,
            OperatorKind::Is | OperatorKind::IsNot => Arity::Identity,
            OperatorKind::Like
            | OperatorKind::ILike
            | OperatorKind::NotLike
            | OperatorKind::NotILike
            | OperatorKind::Match
            | OperatorKind::StartsWith
            | OperatorKind::EndsWith => Arity::Pattern,
            OperatorKind::In | OperatorKind::NotIn => Arity::Sequence,
            OperatorKind::Between => Arity::Pair,
            OperatorKind::Has | OperatorKind::Any => Arity::Nested,
            OperatorKind::Eq
            | OperatorKind::Ne
            | OperatorKind::Gt
            | OperatorKind::Lt
            | OperatorKind::Ge
            | OperatorKind::Le
            | OperatorKind::Contains => Arity::Scalar,
        }
    }

    /// Whether the operator may compare against another attribute
    pub fn accepts_field_operand(&self) -> bool {
        matches!(
            self,
            OperatorKind::Eq
                | OperatorKind::Ne
                | OperatorKind::Gt
                | OperatorKind::Lt
                | OperatorKind::Ge
                | OperatorKind::Le
        )
    }
}

impl std::fmt::Display for OperatorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Sort direction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Asc,
    Desc,
}

impl Direction {
    pub fn parse(token: &str) -> Option<Self> {
        match token {
            "asc" => Some(Direction::Asc),
            "desc" => Some(Direction::Desc),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Direction::Asc => "asc",
            Direction::Desc => "desc",
        }
    }
}

/// Placement of nulls within a sort
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NullsOrder {
    First,
    Last,
    /// Whatever the storage engine does
    #[default]
    Default,
}

impl NullsOrder {
    pub fn parse(token: &str) -> Option<Self> {
        match token {
            "first" | "nullsfirst" => Some(NullsOrder::First),
            "last" | "nullslast" => Some(NullsOrder::Last),
            "default" => Some(NullsOrder::Default),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            NullsOrder::First => "first",
            NullsOrder::Last => "last",
            NullsOrder::Default => "default",
        }
    }
}
