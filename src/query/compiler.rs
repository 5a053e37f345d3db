//! # Filter Compiler
//!
//! Translates a client query description into a `QueryPlan`.
//!
//! Accepted shapes:
//!
//! - `null`: no filters
//! - `[filter, ...]`: implicit AND over the filters
//! - `{"filters": [...], "order_by": [...], "limit": n, "offset": n, "single": b}`
//!
//! A filter element is one of
//!
//! - a junction: `{"and": [...]}` or `{"or": [...]}`
//! - a leaf: `{"name": "a.b", "op": "eq", "val": 1}` (`value` and `field` are
//!   alternative operand keys, `negate` inverts the comparison)
//! - an ordering: `{"name": "a", "op": "asc"}` or `{"field": "a", "direction": "desc"}`
//!
//! Compilation never touches storage.

use serde_json::{Map, Value};

use crate::model::{AttributeKind, Cardinality, ModelCatalog, ModelDescriptor};

use super::ast::{
    FieldPath, FilterNode, FilterTree, JunctionKind, JunctionNode, Operand, OrderNode, PathTarget,
    QueryPlan, RelationHop,
};
use super::errors::{QueryError, QueryResult};
use super::operator::{Arity, Direction, NullsOrder, OperatorKind};

/// A filter list element after classification
enum Element {
    Filter(FilterTree),
    Order(OrderNode),
}

/// Raw right-hand side of a leaf, before arity checks
enum RawOperand<'v> {
    Absent,
    Field(&'v str),
    Value(&'v Value),
}

/// Compiles query descriptions against the models of one catalog
pub struct FilterCompiler<'a> {
    catalog: &'a ModelCatalog,
}

impl<'a> FilterCompiler<'a> {
    pub fn new(catalog: &'a ModelCatalog) -> Self {
        Self { catalog }
    }

    /// Compile a query description for `model`
    pub fn compile(&self, model: &ModelDescriptor, query: &Value) -> QueryResult<QueryPlan> {
        let mut plan = QueryPlan::new();
        let mut filters = Vec::new();

        match query {
            Value::Null => {}
            Value::Array(items) => {
                self.compile_list(model, items, &mut filters, &mut plan.orders)?;
            }
            Value::Object(map) => {
                match map.get("filters") {
                    None | Some(Value::Null) => {}
                    Some(Value::Array(items)) => {
                        self.compile_list(model, items, &mut filters, &mut plan.orders)?;
                    }
                    Some(_) => {
                        return Err(QueryError::Malformed(
                            "'filters' must be a list".to_string(),
                        ))
                    }
                }

                match map.get("order_by") {
                    None | Some(Value::Null) => {}
                    Some(Value::Array(items)) => {
                        for item in items {
                            let obj = item.as_object().ok_or_else(|| {
                                QueryError::Malformed(
                                    "'order_by' entries must be objects".to_string(),
                                )
                            })?;
                            plan.orders.push(self.compile_order_by(model, obj)?);
                        }
                    }
                    Some(_) => {
                        return Err(QueryError::Malformed(
                            "'order_by' must be a list".to_string(),
                        ))
                    }
                }

                plan.limit = unsigned_param(map, "limit")?;
                plan.offset = unsigned_param(map, "offset")?;
                plan.single = match map.get("single") {
                    None | Some(Value::Null) => false,
                    Some(Value::Bool(b)) => *b,
                    Some(_) => return Err(QueryError::parameter("single", "must be a boolean")),
                };
            }
            _ => {
                return Err(QueryError::Malformed(
                    "query must be an object or a list of filters".to_string(),
                ))
            }
        }

        if !filters.is_empty() {
            plan.filter_tree = Some(JunctionNode::and(filters));
        }
        Ok(plan)
    }

    /// Compile a top-level filter list, where orderings are allowed
    fn compile_list(
        &self,
        model: &ModelDescriptor,
        items: &[Value],
        filters: &mut Vec<FilterTree>,
        orders: &mut Vec<OrderNode>,
    ) -> QueryResult<()> {
        for item in items {
            match self.compile_element(model, item)? {
                Element::Filter(tree) => filters.push(tree),
                Element::Order(order) => orders.push(order),
            }
        }
        Ok(())
    }

    /// Compile a list where every element must be a filter
    fn compile_filters(
        &self,
        model: &ModelDescriptor,
        items: &[Value],
    ) -> QueryResult<Vec<FilterTree>> {
        items
            .iter()
            .map(|item| match self.compile_element(model, item)? {
                Element::Filter(tree) => Ok(tree),
                Element::Order(order) => Err(QueryError::Malformed(format!(
                    "ordering on '{}' is only allowed at the top level",
                    order.field
                ))),
            })
            .collect()
    }

    fn compile_element(&self, model: &ModelDescriptor, item: &Value) -> QueryResult<Element> {
        let obj = item
            .as_object()
            .ok_or_else(|| QueryError::Malformed("filters must be objects".to_string()))?;

        let and = obj.get("and");
        let or = obj.get("or");
        match (and, or) {
            (Some(_), Some(_)) => {
                return Err(QueryError::Malformed(
                    "a junction takes either 'and' or 'or', not both".to_string(),
                ))
            }
            (Some(children), None) => {
                return self.compile_junction(model, JunctionKind::And, children)
            }
            (None, Some(children)) => return self.compile_junction(model, JunctionKind::Or, children),
            (None, None) => {}
        }

        // {"field": .., "direction": ..} without an operator is an ordering
        if !obj.contains_key("op") && obj.contains_key("direction") {
            return Ok(Element::Order(self.compile_order_by(model, obj)?));
        }

        if let Some(direction) = obj.get("op").and_then(Value::as_str).and_then(Direction::parse) {
            return self.compile_order_leaf(model, obj, direction).map(Element::Order);
        }

        self.compile_leaf(model, obj)
            .map(|node| Element::Filter(FilterTree::Leaf(node)))
    }

    fn compile_junction(
        &self,
        model: &ModelDescriptor,
        kind: JunctionKind,
        children: &Value,
    ) -> QueryResult<Element> {
        let items = children.as_array().ok_or_else(|| {
            QueryError::Malformed(format!("'{}' must map to a list of filters", kind.as_str()))
        })?;
        if items.is_empty() {
            return Err(QueryError::Malformed(format!(
                "'{}' needs at least one filter",
                kind.as_str()
            )));
        }
        let children = self.compile_filters(model, items)?;
        Ok(Element::Filter(FilterTree::Junction(JunctionNode {
            kind,
            children,
        })))
    }

    /// `{"name": .., "op": "asc"|"desc"}`
    fn compile_order_leaf(
        &self,
        model: &ModelDescriptor,
        obj: &Map<String, Value>,
        direction: Direction,
    ) -> QueryResult<OrderNode> {
        let name = required_name(obj)?;
        if ["val", "value", "field"].iter().any(|k| obj.contains_key(*k)) {
            return Err(QueryError::operand(
                name,
                direction.as_str(),
                "ordering takes no operand",
            ));
        }
        let field = self.resolve_attribute(model, name)?;
        Ok(OrderNode {
            field,
            direction,
            nulls: nulls_order(obj)?,
        })
    }

    /// `{"field": .., "direction": .., "nulls": ..}`
    fn compile_order_by(
        &self,
        model: &ModelDescriptor,
        obj: &Map<String, Value>,
    ) -> QueryResult<OrderNode> {
        let name = match obj.get("field") {
            Some(Value::String(name)) => name,
            _ => {
                return Err(QueryError::Malformed(
                    "ordering needs a 'field' name".to_string(),
                ))
            }
        };

        let direction = match obj.get("direction") {
            None | Some(Value::Null) => Direction::Asc,
            Some(Value::String(token)) => Direction::parse(token)
                .ok_or_else(|| QueryError::UnknownDirection(token.clone()))?,
            Some(other) => return Err(QueryError::UnknownDirection(other.to_string())),
        };

        let field = self.resolve_attribute(model, name)?;
        Ok(OrderNode {
            field,
            direction,
            nulls: nulls_order(obj)?,
        })
    }

    fn compile_leaf(&self, model: &ModelDescriptor, obj: &Map<String, Value>) -> QueryResult<FilterNode> {
        let name = required_name(obj)?;
        let token = match obj.get("op") {
            Some(Value::String(token)) => token,
            Some(_) => return Err(QueryError::UnknownOperator(obj["op"].to_string())),
            None => return Err(QueryError::MissingOperator(name.to_string())),
        };
        let operator =
            OperatorKind::parse(token).ok_or_else(|| QueryError::UnknownOperator(token.clone()))?;

        let negate = match obj.get("negate") {
            None | Some(Value::Null) => false,
            Some(Value::Bool(b)) => *b,
            Some(_) => return Err(QueryError::parameter("negate", "must be a boolean")),
        };

        let raw = if let Some(field) = obj.get("field") {
            match field.as_str() {
                Some(field) => RawOperand::Field(field),
                None => {
                    return Err(QueryError::operand(
                        name,
                        operator.as_str(),
                        "'field' must name an attribute",
                    ))
                }
            }
        } else if let Some(val) = obj.get("val") {
            RawOperand::Value(val)
        } else if let Some(val) = obj.get("value") {
            RawOperand::Value(val)
        } else {
            RawOperand::Absent
        };

        let path = self.resolve_path(model, name)?;
        let operand = if operator.arity() == Arity::Nested {
            self.nested_operand(&path, operator, raw)?
        } else {
            if path.is_relation() {
                return Err(QueryError::RelationNotAttribute {
                    model: self.owner_of(model, &path)?.name().to_string(),
                    field: path.name.clone(),
                });
            }
            self.plain_operand(model, &path, operator, raw)?
        };

        Ok(FilterNode {
            field: path,
            operator,
            operand,
            negate,
        })
    }

    fn plain_operand(
        &self,
        model: &ModelDescriptor,
        path: &FieldPath,
        operator: OperatorKind,
        raw: RawOperand<'_>,
    ) -> QueryResult<Operand> {
        let fail = |reason: &str| QueryError::operand(path.to_string(), operator.as_str(), reason);

        let value = match raw {
            RawOperand::Field(other) => {
                if !operator.accepts_field_operand() {
                    return Err(fail("cannot compare against another field"));
                }
                let owner = self.owner_of(model, path)?;
                return self.local_attribute(owner, other).map(Operand::Field);
            }
            RawOperand::Absent => {
                return match operator.arity() {
                    Arity::None => Ok(Operand::Absent),
                    _ => Err(fail("requires an operand")),
                }
            }
            RawOperand::Value(value) => value,
        };

        match operator.arity() {
            Arity::None => Err(fail("takes no operand")),
            Arity::Scalar => Ok(Operand::Value(value.clone())),
            Arity::Identity => match value {
                Value::Null | Value::Bool(_) => Ok(Operand::Value(value.clone())),
                _ => Err(fail("must be null, true or false")),
            },
            Arity::Pattern => match value {
                Value::String(_) => Ok(Operand::Value(value.clone())),
                _ => Err(fail("must be a string")),
            },
            Arity::Sequence => match value {
                Value::Array(items) => Ok(Operand::List(items.clone())),
                _ => Err(fail("must be a list")),
            },
            Arity::Pair => match value.as_array().map(Vec::as_slice) {
                Some([low, high]) => Ok(Operand::Range(low.clone(), high.clone())),
                _ => Err(fail("must be a list of two values")),
            },
            Arity::Nested => Err(fail("requires a relation")),
        }
    }

    /// Operand of `has`/`any`: nothing, one nested filter, or a list of them
    fn nested_operand(
        &self,
        path: &FieldPath,
        operator: OperatorKind,
        raw: RawOperand<'_>,
    ) -> QueryResult<Operand> {
        let fail = |reason: &str| QueryError::operand(path.to_string(), operator.as_str(), reason);

        let (target, cardinality) = match &path.target {
            PathTarget::Relation {
                target,
                cardinality,
            } => (target, *cardinality),
            PathTarget::Attribute(_) => {
                return Err(QueryError::NotARelation {
                    model: path
                        .hops
                        .last()
                        .map(|h| h.target.clone())
                        .unwrap_or_default(),
                    field: path.name.clone(),
                })
            }
        };

        match (operator, cardinality) {
            (OperatorKind::Has, Cardinality::ToMany) => {
                return Err(fail("'has' needs a to-one relation, use 'any'"))
            }
            (OperatorKind::Any, Cardinality::ToOne) => {
                return Err(fail("'any' needs a to-many relation, use 'has'"))
            }
            _ => {}
        }

        let related = self.model(target)?;
        let children = match raw {
            RawOperand::Absent | RawOperand::Value(Value::Null) => return Ok(Operand::Absent),
            RawOperand::Value(Value::Array(items)) if items.is_empty() => {
                return Ok(Operand::Absent)
            }
            RawOperand::Value(Value::Array(items)) => self.compile_filters(related, items)?,
            RawOperand::Value(item @ Value::Object(_)) => {
                self.compile_filters(related, std::slice::from_ref(item))?
            }
            RawOperand::Value(_) | RawOperand::Field(_) => {
                return Err(fail("must be a filter or a list of filters"))
            }
        };

        Ok(Operand::Nested(Box::new(FilterTree::Junction(
            JunctionNode::and(children),
        ))))
    }

    /// Resolve a dotted (or `__` separated) path; the last segment may be a relation
    fn resolve_path(&self, model: &ModelDescriptor, raw: &str) -> QueryResult<FieldPath> {
        let normalized = raw.replace("__", ".");
        let segments: Vec<&str> = normalized.split('.').collect();
        let Some((last, walk)) = segments.split_last() else {
            return Err(QueryError::MissingName);
        };

        let mut current = model;
        let mut hops = Vec::with_capacity(walk.len());
        for segment in walk {
            let relation = current.relation(segment).ok_or_else(|| {
                if current.kind_of(segment).is_some() {
                    QueryError::NotARelation {
                        model: current.name().to_string(),
                        field: segment.to_string(),
                    }
                } else {
                    QueryError::UnknownField {
                        model: current.name().to_string(),
                        field: segment.to_string(),
                    }
                }
            })?;
            hops.push(RelationHop {
                name: relation.name.clone(),
                target: relation.target.clone(),
                cardinality: relation.cardinality,
            });
            current = self.model(&relation.target)?;
        }

        let target = match current.kind_of(last) {
            Some(AttributeKind::Relation) => {
                let relation = current.relation(last).ok_or_else(|| QueryError::UnknownField {
                    model: current.name().to_string(),
                    field: last.to_string(),
                })?;
                PathTarget::Relation {
                    target: relation.target.clone(),
                    cardinality: relation.cardinality,
                }
            }
            Some(kind) => PathTarget::Attribute(kind),
            None => {
                return Err(QueryError::UnknownField {
                    model: current.name().to_string(),
                    field: last.to_string(),
                })
            }
        };

        Ok(FieldPath {
            hops,
            name: last.to_string(),
            target,
        })
    }

    /// Resolve a path that must end on an attribute
    fn resolve_attribute(&self, model: &ModelDescriptor, raw: &str) -> QueryResult<FieldPath> {
        let path = self.resolve_path(model, raw)?;
        if path.is_relation() {
            return Err(QueryError::RelationNotAttribute {
                model: self.owner_of(model, &path)?.name().to_string(),
                field: path.name,
            });
        }
        Ok(path)
    }

    /// Attribute of `owner` addressed by a plain name, used for field operands
    fn local_attribute(&self, owner: &ModelDescriptor, name: &str) -> QueryResult<FieldPath> {
        match owner.kind_of(name) {
            Some(AttributeKind::Relation) => Err(QueryError::RelationNotAttribute {
                model: owner.name().to_string(),
                field: name.to_string(),
            }),
            Some(kind) => Ok(FieldPath {
                hops: Vec::new(),
                name: name.to_string(),
                target: PathTarget::Attribute(kind),
            }),
            None => Err(QueryError::UnknownField {
                model: owner.name().to_string(),
                field: name.to_string(),
            }),
        }
    }

    /// Model that declares the final segment of `path`
    fn owner_of<'m>(
        &'m self,
        model: &'m ModelDescriptor,
        path: &FieldPath,
    ) -> QueryResult<&'m ModelDescriptor> {
        match path.hops.last() {
            Some(hop) => self.model(&hop.target),
            None => Ok(model),
        }
    }

    fn model(&self, name: &str) -> QueryResult<&'a ModelDescriptor> {
        self.catalog
            .lookup(name)
            .map(|m| m.as_ref())
            .ok_or_else(|| QueryError::Malformed(format!("relation targets unknown model '{}'", name)))
    }
}

fn required_name(obj: &Map<String, Value>) -> QueryResult<&str> {
    match obj.get("name") {
        Some(Value::String(name)) if !name.is_empty() => Ok(name),
        _ => Err(QueryError::MissingName),
    }
}

fn nulls_order(obj: &Map<String, Value>) -> QueryResult<NullsOrder> {
    if let Some(nulls) = obj.get("nulls") {
        return match nulls {
            Value::Null => Ok(NullsOrder::Default),
            Value::String(token) => NullsOrder::parse(token)
                .ok_or_else(|| QueryError::parameter("nulls", format!("unknown placement '{}'", token))),
            _ => Err(QueryError::parameter("nulls", "must be 'first' or 'last'")),
        };
    }

    let flag = |key: &str| -> QueryResult<bool> {
        match obj.get(key) {
            None | Some(Value::Null) => Ok(false),
            Some(Value::Bool(b)) => Ok(*b),
            Some(_) => Err(QueryError::parameter(key, "must be a boolean")),
        }
    };

    if flag("nullsfirst")? {
        Ok(NullsOrder::First)
    } else if flag("nullslast")? {
        Ok(NullsOrder::Last)
    } else {
        Ok(NullsOrder::Default)
    }
}

fn unsigned_param(map: &Map<String, Value>, key: &str) -> QueryResult<Option<u64>> {
    match map.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(value) => value
            .as_u64()
            .map(Some)
            .ok_or_else(|| QueryError::parameter(key, "must be a non-negative integer")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{ColumnDef, FieldType, ModelDef, RelationDef};
    use serde_json::json;

    fn catalog() -> ModelCatalog {
        let mut catalog = ModelCatalog::new();
        catalog
            .register(
                ModelDef::new("person")
                    .column(ColumnDef::new("id", FieldType::Integer).primary())
                    .column(ColumnDef::new("name", FieldType::String).unique())
                    .column(ColumnDef::new("age", FieldType::Integer))
                    .column(ColumnDef::new("height", FieldType::Integer))
                    .column(ColumnDef::new("address_id", FieldType::Integer).references("address"))
                    .relation(RelationDef::to_one("address", "address", "address_id"))
                    .relation(RelationDef::to_many("pets", "pet", "owner_id"))
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
        catalog
    }

    fn compile(query: Value) -> QueryResult<QueryPlan> {
        let catalog = catalog();
        let person = catalog.get("person").unwrap();
        FilterCompiler::new(&catalog).compile(&person, &query)
    }

    fn first_leaf(plan: &QueryPlan) -> &FilterNode {
        match &plan.filter_tree.as_ref().unwrap().children[0] {
            FilterTree::Leaf(node) => node,
            other => panic!("expected leaf, got {:?}", other),
        }
    }

    #[test]
    fn test_null_query_is_empty() {
        let plan = compile(Value::Null).unwrap();
        assert_eq!(plan, QueryPlan::new());
    }

    #[test]
    fn test_filter_and_order_by_disambiguation() {
        let plan = compile(json!({
            "filters": [{"name": "age", "op": "gt", "val": 18}],
            "order_by": [{"field": "age", "direction": "desc"}]
        }))
        .unwrap();

        assert_eq!(plan.filter_count(), 1);
        assert_eq!(plan.orders.len(), 1);
        assert_eq!(plan.orders[0].direction, Direction::Desc);
        assert_eq!(first_leaf(&plan).operator, OperatorKind::Gt);
    }

    #[test]
    fn test_order_leaf_inside_filters() {
        let plan = compile(json!([
            {"name": "age", "op": "desc", "nullslast": true},
            {"name": "name", "op": "eq", "val": "Bob"}
        ]))
        .unwrap();
        assert_eq!(plan.filter_count(), 1);
        assert_eq!(plan.orders[0].nulls, NullsOrder::Last);
    }

    #[test]
    fn test_orders_from_filters_come_first() {
        let plan = compile(json!({
            "filters": [{"name": "height", "op": "asc"}],
            "order_by": [{"field": "age"}]
        }))
        .unwrap();
        let names: Vec<String> = plan.orders.iter().map(|o| o.field.to_string()).collect();
        assert_eq!(names, vec!["height", "age"]);
        assert_eq!(plan.orders[1].direction, Direction::Asc);
    }

    #[test]
    fn test_unknown_direction() {
        let err = compile(json!({"order_by": [{"field": "age", "direction": "up"}]})).unwrap_err();
        assert_eq!(err, QueryError::UnknownDirection("up".to_string()));
    }

    #[test]
    fn test_ordering_with_operand_fails() {
        let err = compile(json!([{"name": "age", "op": "asc", "val": 3}])).unwrap_err();
        assert!(matches!(err, QueryError::InvalidOperand { .. }));
    }

    #[test]
    fn test_junctions() {
        let plan = compile(json!({"filters": [
            {"name": "age", "op": "gt", "val": 18},
            {"or": [
                {"name": "name", "op": "eq", "val": "Ann"},
                {"and": [
                    {"name": "age", "op": "lt", "val": 3},
                    {"name": "height", "op": "is_null"}
                ]}
            ]}
        ]}))
        .unwrap();

        let root = plan.filter_tree.unwrap();
        assert_eq!(root.children.len(), 2);
        match &root.children[1] {
            FilterTree::Junction(j) => {
                assert_eq!(j.kind, JunctionKind::Or);
                assert!(matches!(&j.children[1], FilterTree::Junction(inner) if inner.kind == JunctionKind::And));
            }
            other => panic!("expected junction, got {:?}", other),
        }
    }

    #[test]
    fn test_malformed_junctions() {
        assert!(compile(json!([{"or": []}])).is_err());
        assert!(compile(json!([{"or": {"name": "age"}}])).is_err());
        assert!(compile(json!([{"and": [], "or": []}])).is_err());
        assert!(compile(json!([{"or": [{"name": "age", "op": "asc"}]}])).is_err());
    }

    #[test]
    fn test_dotted_path_resolution() {
        let plan = compile(json!([{"name": "address.city", "op": "eq", "val": "Berlin"}])).unwrap();
        let node = first_leaf(&plan);
        assert_eq!(node.field.hops.len(), 1);
        assert_eq!(node.field.hops[0].target, "address");
        assert_eq!(node.field.name, "city");

        let plan = compile(json!([{"name": "address__city", "op": "eq", "val": "Berlin"}])).unwrap();
        assert_eq!(first_leaf(&plan).field.to_string(), "address.city");
    }

    #[test]
    fn test_unresolvable_paths() {
        assert_eq!(
            compile(json!([{"name": "unknownfield", "op": "eq", "val": 1}])).unwrap_err(),
            QueryError::UnknownField {
                model: "person".into(),
                field: "unknownfield".into()
            }
        );
        assert!(matches!(
            compile(json!([{"name": "age.city", "op": "eq", "val": 1}])).unwrap_err(),
            QueryError::NotARelation { .. }
        ));
        assert!(matches!(
            compile(json!([{"name": "address", "op": "eq", "val": 1}])).unwrap_err(),
            QueryError::RelationNotAttribute { .. }
        ));
        assert!(matches!(
            compile(json!([{"name": "address.zip", "op": "eq", "val": 1}])).unwrap_err(),
            QueryError::UnknownField { .. }
        ));
    }

    #[test]
    fn test_missing_keys_and_unknown_operator() {
        assert_eq!(
            compile(json!([{"op": "eq", "val": 1}])).unwrap_err(),
            QueryError::MissingName
        );
        assert!(matches!(
            compile(json!([{"name": "age", "val": 1}])).unwrap_err(),
            QueryError::MissingOperator(_)
        ));
        assert_eq!(
            compile(json!([{"name": "age", "op": "near", "val": 1}])).unwrap_err(),
            QueryError::UnknownOperator("near".into())
        );
    }

    #[test]
    fn test_arity_checks() {
        assert!(compile(json!([{"name": "age", "op": "is_null", "val": 1}])).is_err());
        assert!(compile(json!([{"name": "age", "op": "is_null", "val": null}])).is_err());
        assert!(compile(json!([{"name": "age", "op": "in", "val": 1}])).is_err());
        assert!(compile(json!([{"name": "age", "op": "not_in", "val": "1,2"}])).is_err());
        assert!(compile(json!([{"name": "age", "op": "between", "val": [1]}])).is_err());
        assert!(compile(json!([{"name": "name", "op": "like", "val": 3}])).is_err());
        assert!(compile(json!([{"name": "age", "op": "is", "val": 3}])).is_err());
        assert!(compile(json!([{"name": "age", "op": "eq"}])).is_err());

        let plan = compile(json!([{"name": "age", "op": "between", "val": [1, 9]}])).unwrap();
        assert_eq!(first_leaf(&plan).operand, Operand::Range(json!(1), json!(9)));
    }

    #[test]
    fn test_value_alias_and_field_operand() {
        let plan = compile(json!([{"name": "age", "op": "eq", "value": 4}])).unwrap();
        assert_eq!(first_leaf(&plan).operand, Operand::Value(json!(4)));

        let plan = compile(json!([{"name": "age", "op": "lt", "field": "height"}])).unwrap();
        assert_eq!(
            first_leaf(&plan).operand,
            Operand::Field(FieldPath::column("height"))
        );

        assert!(compile(json!([{"name": "age", "op": "like", "field": "name"}])).is_err());
        assert!(compile(json!([{"name": "age", "op": "eq", "field": "ghost"}])).is_err());
    }

    #[test]
    fn test_has_and_any() {
        let plan = compile(json!([
            {"name": "address", "op": "has", "val": {"name": "city", "op": "eq", "val": "Paris"}},
            {"name": "pets", "op": "any", "val": [{"name": "kind", "op": "eq", "val": "cat"}]},
            {"name": "pets", "op": "any"}
        ]))
        .unwrap();
        let root = plan.filter_tree.unwrap();
        assert_eq!(root.children.len(), 3);
        match &root.children[2] {
            FilterTree::Leaf(node) => assert_eq!(node.operand, Operand::Absent),
            other => panic!("expected leaf, got {:?}", other),
        }

        assert!(compile(json!([{"name": "pets", "op": "has"}])).is_err());
        assert!(compile(json!([{"name": "address", "op": "any"}])).is_err());
        assert!(compile(json!([{"name": "age", "op": "has"}])).is_err());
        assert!(compile(json!([{"name": "address", "op": "has", "val": 3}])).is_err());
        assert!(compile(json!([
            {"name": "address", "op": "has", "val": {"name": "ghost", "op": "eq", "val": 1}}
        ]))
        .is_err());
    }

    #[test]
    fn test_pagination_parameters() {
        let plan = compile(json!({"limit": 5, "offset": 10, "single": true})).unwrap();
        assert_eq!(plan.limit, Some(5));
        assert_eq!(plan.offset, Some(10));
        assert!(plan.single);

        assert!(compile(json!({"limit": -1})).is_err());
        assert!(compile(json!({"offset": "3"})).is_err());
        assert!(compile(json!({"single": 1})).is_err());
        assert!(compile(json!("age > 3")).is_err());
    }

    #[test]
    fn test_negate_flag() {
        let plan = compile(json!([{"name": "age", "op": "eq", "val": 3, "negate": true}])).unwrap();
        assert!(first_leaf(&plan).negate);
        assert!(compile(json!([{"name": "age", "op": "eq", "val": 3, "negate": "yes"}])).is_err());
    }
}
