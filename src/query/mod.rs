//! # Query Filter Language
//!
//! Compiles client-supplied JSON query descriptions into a storage
//! independent `QueryPlan` and lowers plans onto a storage query builder.
//!
//! ```text
//! {"filters": [...], "order_by": [...], "limit": n, "offset": n}
//!        │
//!        ▼  FilterCompiler (pure, resolves paths against the catalog)
//!   QueryPlan
//!        │
//!        ▼  PredicateEvaluator
//!   QueryBuilder (storage)
//! ```

mod ast;
mod compiler;
mod errors;
mod evaluator;
mod operator;

pub use ast::{
    FieldPath, FilterNode, FilterTree, JunctionKind, JunctionNode, Operand, OrderNode, PathTarget,
    QueryPlan, RelationHop,
};
pub use compiler::FilterCompiler;
pub use errors::{QueryError, QueryResult};
pub use evaluator::PredicateEvaluator;
pub use operator::{Arity, Direction, NullsOrder, OperatorKind};
