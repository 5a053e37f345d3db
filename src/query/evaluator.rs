//! # Predicate Evaluator
//!
//! Lowers a `QueryPlan` onto a storage `QueryBuilder`.
//!
//! Each root filter becomes one `filter` call, dotted paths become nested
//! relation predicates, orders are applied in plan order and limit/offset
//! come last. Storage rejections are returned unchanged for the pipeline to
//! classify.

use crate::model::Cardinality;
use crate::storage::{
    Argument, Comparison, NullPlacement, Predicate, Quantifier, QueryBuilder, SortKey,
    StorageResult,
};

use super::ast::{FilterNode, FilterTree, JunctionKind, JunctionNode, Operand, OrderNode, QueryPlan};
use super::operator::{Direction, NullsOrder, OperatorKind};

pub struct PredicateEvaluator;

impl PredicateEvaluator {
    /// Apply filters, orders, offset and limit
    pub fn apply(plan: &QueryPlan, builder: &mut dyn QueryBuilder) -> StorageResult<()> {
        Self::apply_filters(plan, builder)?;
        for order in &plan.orders {
            builder.order_by(Self::sort_key(order))?;
        }
        if let Some(offset) = plan.offset {
            builder.offset(offset);
        }
        if let Some(limit) = plan.limit {
            builder.limit(limit);
        }
        Ok(())
    }

    /// Apply only the filter tree
    pub fn apply_filters(plan: &QueryPlan, builder: &mut dyn QueryBuilder) -> StorageResult<()> {
        if let Some(root) = &plan.filter_tree {
            for child in &root.children {
                builder.filter(Self::predicate(child))?;
            }
        }
        Ok(())
    }

    pub fn predicate(tree: &FilterTree) -> Predicate {
        match tree {
            FilterTree::Leaf(node) => Self::leaf(node),
            FilterTree::Junction(junction) => Self::junction(junction),
        }
    }

    fn junction(junction: &JunctionNode) -> Predicate {
        let children = junction.children.iter().map(Self::predicate).collect();
        match junction.kind {
            JunctionKind::And => Predicate::And(children),
            JunctionKind::Or => Predicate::Or(children),
        }
    }

    fn leaf(node: &FilterNode) -> Predicate {
        let name = node.field.name.clone();

        let mut predicate = match node.operator {
            OperatorKind::Has | OperatorKind::Any => Predicate::Related {
                relation: name,
                quantifier: if node.operator == OperatorKind::Has {
                    Quantifier::Has
                } else {
                    Quantifier::Any
                },
                inner: match &node.operand {
                    Operand::Nested(tree) => Some(Box::new(Self::predicate(tree))),
                    _ => None,
                },
            },
            operator => {
                let comparison = comparison(operator);
                match &node.operand {
                    Operand::Field(other) => Predicate::CompareField {
                        attribute: name,
                        comparison,
                        other: other.name.clone(),
                    },
                    operand => Predicate::Compare {
                        attribute: name,
                        comparison,
                        argument: argument(operand),
                    },
                }
            }
        };

        for hop in node.field.hops.iter().rev() {
            predicate = Predicate::Related {
                relation: hop.name.clone(),
                quantifier: match hop.cardinality {
                    Cardinality::ToOne => Quantifier::Has,
                    Cardinality::ToMany => Quantifier::Any,
                },
                inner: Some(Box::new(predicate)),
            };
        }

        if node.negate {
            predicate = predicate.negate();
        }
        predicate
    }

    pub fn sort_key(order: &OrderNode) -> SortKey {
        SortKey {
            path: order.field.segments(),
            descending: order.direction == Direction::Desc,
            nulls: match order.nulls {
                NullsOrder::First => NullPlacement::First,
                NullsOrder::Last => NullPlacement::Last,
                NullsOrder::Default => NullPlacement::Default,
            },
        }
    }
}

fn comparison(operator: OperatorKind) -> Comparison {
    match operator {
        OperatorKind::Eq => Comparison::Eq,
        OperatorKind::Ne => Comparison::Ne,
        OperatorKind::Gt => Comparison::Gt,
        OperatorKind::Lt => Comparison::Lt,
        OperatorKind::Ge => Comparison::Ge,
        OperatorKind::Le => Comparison::Le,
        OperatorKind::In => Comparison::In,
        OperatorKind::NotIn => Comparison::NotIn,
        OperatorKind::IsNull => Comparison::IsNull,
        OperatorKind::IsNotNull => Comparison::IsNotNull,
        OperatorKind::Is => Comparison::Is,
        OperatorKind::IsNot => Comparison::IsNot,
        OperatorKind::Like => Comparison::Like,
        OperatorKind::ILike => Comparison::ILike,
        OperatorKind::NotLike => Comparison::NotLike,
        OperatorKind::NotILike => Comparison::NotILike,
        OperatorKind::Match => Comparison::Match,
        OperatorKind::Between => Comparison::Between,
        OperatorKind::Contains => Comparison::Contains,
        OperatorKind::StartsWith => Comparison::StartsWith,
        OperatorKind::EndsWith => Comparison::EndsWith,
        // Relation operators are lowered to `Predicate::Related` by the caller
        OperatorKind::Has | OperatorKind::Any => Comparison::IsNotNull,
    }
}

fn argument(operand: &Operand) -> Argument {
    match operand {
        Operand::Value(value) => Argument::Value(value.clone()),
        Operand::List(items) => Argument::List(items.clone()),
        Operand::Range(low, high) => Argument::Range(low.clone(), high.clone()),
        Operand::Absent | Operand::Field(_) | Operand::Nested(_) => Argument::None,
    }
}
