//! Default and merge of state values.
//!
//! The resolver reconciles *schemas*; state values are handled by a
//! [`StateOps`] collaborator. [`Catalog`] provides the reference
//! implementation, driven by each variant's [`DefaultRule`] and [`Shape`].
//!
//! # Examples
//!
//! ```
//! use schema_resolve_core::{Catalog, Node, Schema, StateOps};
//! use serde_json::json;
//!
//! let catalog = Catalog::builtin();
//! let counts: Schema = Node::map(Node::integer()).into();
//!
//! assert_eq!(catalog.default_state(&counts), json!({}));
//! assert_eq!(
//!     catalog.merge_state(&counts, &json!({"a": 1}), &json!({"b": 2})),
//!     json!({"a": 1, "b": 2})
//! );
//! ```

use serde_json::{Map, Value};

use crate::catalog::{Catalog, DefaultRule, LEAF_FIELD, OVERWRITE, Shape, VALUE_FIELD, VALUES_FIELD};
use crate::types::{FieldValue, Node, Override, Schema};

/// State-level collaborator consumed by the resolver.
pub trait StateOps: Sync {
    /// The state a schema yields when nothing more specific is supplied.
    fn default_state(&self, schema: &Schema) -> Value;

    /// Combines two states that both conform to `schema`.
    fn merge_state(&self, schema: &Schema, current: &Value, update: &Value) -> Value;
}

impl StateOps for Catalog {
    fn default_state(&self, schema: &Schema) -> Value {
        match schema {
            Schema::Literal(value) => value.clone(),
            Schema::Override(patch) => match &patch.default {
                Some(default) => default.clone(),
                None => Value::Object(
                    patch
                        .entries
                        .iter()
                        .map(|(key, entry)| (key.clone(), self.default_state(entry)))
                        .collect(),
                ),
            },
            Schema::Node(node) if !node.default.is_null() => node.default.clone(),
            Schema::Node(node) => match self.get(&node.kind) {
                Some(variant) => self.rule_default(variant.default_rule(), node),
                None => Value::Null,
            },
        }
    }

    fn merge_state(&self, schema: &Schema, current: &Value, update: &Value) -> Value {
        if update.is_null() {
            return current.clone();
        }
        if current.is_null() {
            return update.clone();
        }

        match schema {
            Schema::Literal(_) => update.clone(),
            Schema::Override(patch) => self.merge_override(patch, current, update),
            Schema::Node(node) => self.merge_node(node, current, update),
        }
    }
}

impl Catalog {
    fn rule_default(&self, rule: &DefaultRule, node: &Node) -> Value {
        match rule {
            DefaultRule::Null => Value::Null,
            DefaultRule::Value(value) => value.clone(),
            DefaultRule::FirstParam(field) => match node.field(field) {
                Some(FieldValue::Param(Value::Array(items))) => {
                    items.first().cloned().unwrap_or(Value::Null)
                }
                _ => Value::Null,
            },
            DefaultRule::Members(field) => match node.field(field) {
                Some(FieldValue::Schemas(members)) => {
                    Value::Array(members.iter().map(|m| self.default_state(m)).collect())
                }
                _ => Value::Null,
            },
            DefaultRule::FirstMember(field) => match node.field(field) {
                Some(FieldValue::Schemas(members)) => members
                    .first()
                    .map(|m| self.default_state(m))
                    .unwrap_or(Value::Null),
                _ => Value::Null,
            },
            DefaultRule::Inner(field) => node
                .schema_field(field)
                .map(|inner| self.default_state(inner))
                .unwrap_or(Value::Null),
            DefaultRule::Zeros(field) => match node.field(field) {
                Some(FieldValue::Param(Value::Array(dims))) => {
                    let dims: Option<Vec<usize>> = dims
                        .iter()
                        .map(|d| d.as_u64().and_then(|d| usize::try_from(d).ok()))
                        .collect();
                    match dims {
                        Some(dims) if zeros_fit(&dims) => zeros(&dims),
                        _ => Value::Null,
                    }
                }
                _ => Value::Null,
            },
        }
    }

    fn merge_node(&self, node: &Node, current: &Value, update: &Value) -> Value {
        let Some(variant) = self.get(&node.kind) else {
            return update.clone();
        };

        match variant.shape() {
            Shape::Wrapper if variant.derives_from(OVERWRITE) => update.clone(),
            Shape::Wrapper => match node.schema_field(VALUE_FIELD) {
                Some(inner) => self.merge_state(inner, current, update),
                None => update.clone(),
            },
            Shape::Map => match (node.schema_field(VALUE_FIELD), current, update) {
                (Some(value), Value::Object(a), Value::Object(b)) => {
                    merge_objects(a, b, |_, x, y| self.merge_state(value, x, y))
                }
                _ => update.clone(),
            },
            Shape::Tree => self.merge_tree(node, current, update),
            Shape::Plain => match (node.field(VALUES_FIELD), current, update) {
                (Some(FieldValue::Schemas(members)), Value::Array(a), Value::Array(b))
                    if members.len() == a.len() && a.len() == b.len() =>
                {
                    Value::Array(
                        members
                            .iter()
                            .zip(a.iter().zip(b))
                            .map(|(member, (x, y))| self.merge_state(member, x, y))
                            .collect(),
                    )
                }
                _ => update.clone(),
            },
        }
    }

    fn merge_tree(&self, tree: &Node, current: &Value, update: &Value) -> Value {
        match (current, update) {
            (Value::Object(a), Value::Object(b)) => merge_objects(a, b, |_, x, y| {
                if x.is_object() && y.is_object() {
                    self.merge_tree(tree, x, y)
                } else {
                    self.merge_leaf(tree, x, y)
                }
            }),
            _ => self.merge_leaf(tree, current, update),
        }
    }

    fn merge_leaf(&self, tree: &Node, current: &Value, update: &Value) -> Value {
        match tree.schema_field(LEAF_FIELD) {
            Some(leaf) => self.merge_state(leaf, current, update),
            None => update.clone(),
        }
    }

    fn merge_override(&self, patch: &Override, current: &Value, update: &Value) -> Value {
        match (current, update) {
            (Value::Object(a), Value::Object(b)) => merge_objects(a, b, |key, x, y| {
                match patch.get(key) {
                    Some(entry) => self.merge_state(entry, x, y),
                    None => y.clone(),
                }
            }),
            _ => update.clone(),
        }
    }
}

/// Key-wise union; keys present on both sides are combined with `both`.
fn merge_objects(
    current: &Map<String, Value>,
    update: &Map<String, Value>,
    both: impl Fn(&str, &Value, &Value) -> Value,
) -> Value {
    let mut merged = current.clone();
    for (key, value) in update {
        let combined = match current.get(key) {
            Some(existing) => both(key, existing, value),
            None => value.clone(),
        };
        merged.insert(key.clone(), combined);
    }
    Value::Object(merged)
}

/// Most array slots a zero-filled default may allocate, over all levels.
const MAX_ZERO_SLOTS: usize = 1 << 20;

/// Deepest zero-filled default.
const MAX_ZERO_RANK: usize = 32;

fn zeros_fit(dims: &[usize]) -> bool {
    if dims.len() > MAX_ZERO_RANK {
        return false;
    }
    let mut level = 1usize;
    let mut slots = 0usize;
    for &len in dims {
        match level.checked_mul(len) {
            Some(next) => level = next,
            None => return false,
        }
        slots = slots.saturating_add(level);
        if slots > MAX_ZERO_SLOTS {
            return false;
        }
    }
    true
}

fn zeros(dims: &[usize]) -> Value {
    match dims.split_first() {
        None => Value::from(0),
        Some((&len, rest)) => Value::Array((0..len).map(|_| zeros(rest)).collect()),
    }
}
