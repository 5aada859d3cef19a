//! Schema type definitions for resolution.
//!
//! This module defines the data model the resolver operates on. A [`Schema`]
//! is one of three operand shapes: a typed [`Node`], an untyped [`Override`]
//! patch, or a raw state [`Literal`](Schema::Literal) appearing inside an
//! override. The types are designed for serialization with [`serde`] and are
//! never mutated by resolution; every step builds new values.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::catalog::{
    ARRAY, BOOLEAN, DATA_FIELD, EDGE, ELEMENT_FIELD, ENUM, FLOAT, INPUTS_FIELD, INTEGER, LEAF_FIELD,
    LIST, MAP, MAYBE, NODE, NUMBER, OPTIONS_FIELD, OUTPUTS_FIELD, SHAPE_FIELD, STRING, TREE, TUPLE,
    UNION, VALUE_FIELD, VALUES_FIELD, WRAP,
};

/// Returns `true` for state values that carry no information.
///
/// `null`, `""`, `[]` and `{}` are empty. `false` and `0` are real values.
///
/// # Examples
///
/// ```
/// use schema_resolve_core::is_empty_state;
/// use serde_json::json;
///
/// assert!(is_empty_state(&json!({})));
/// assert!(is_empty_state(&json!(null)));
/// assert!(!is_empty_state(&json!(0)));
/// ```
pub fn is_empty_state(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.is_empty(),
        Value::Array(items) => items.is_empty(),
        Value::Object(map) => map.is_empty(),
        Value::Bool(_) | Value::Number(_) => false,
    }
}

/// One resolution operand.
///
/// # Examples
///
/// ```
/// use schema_resolve_core::{Node, Override, Schema};
///
/// let node: Schema = Node::integer().into();
/// assert_eq!(node.kind(), Some("integer"));
///
/// let patch: Schema = Override::new().with_literal("x", 1).into();
/// assert!(patch.as_override().is_some());
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Schema {
    /// A typed schema node of a registered variant.
    Node(Node),
    /// An untyped partial patch keyed by field or entry name.
    Override(Override),
    /// A raw state value supplied inside an override.
    Literal(Value),
}

impl Schema {
    /// Wraps a raw value as a literal operand.
    pub fn literal(value: impl Into<Value>) -> Self {
        Schema::Literal(value.into())
    }

    /// Returns the node if this operand is one.
    pub fn as_node(&self) -> Option<&Node> {
        match self {
            Schema::Node(node) => Some(node),
            _ => None,
        }
    }

    /// Returns the override if this operand is one.
    pub fn as_override(&self) -> Option<&Override> {
        match self {
            Schema::Override(patch) => Some(patch),
            _ => None,
        }
    }

    /// Returns the variant name of a node operand.
    pub fn kind(&self) -> Option<&str> {
        self.as_node().map(|node| node.kind.as_str())
    }

    /// Short human-readable description used in error messages.
    pub fn describe(&self) -> String {
        match self {
            Schema::Node(node) => node.kind.clone(),
            Schema::Override(patch) => {
                let keys: Vec<&str> = patch.entries.keys().map(String::as_str).collect();
                format!("{{{}}}", keys.join(", "))
            }
            Schema::Literal(value) => value.to_string(),
        }
    }
}

impl From<Node> for Schema {
    fn from(node: Node) -> Self {
        Schema::Node(node)
    }
}

impl From<Override> for Schema {
    fn from(patch: Override) -> Self {
        Schema::Override(patch)
    }
}

/// Value of one declared field on a [`Node`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum FieldValue {
    /// A single sub-schema (`_value`, `_leaf`, `_element`, ...).
    Schema(Schema),
    /// An ordered list of sub-schemas (tuple members, union options).
    Schemas(Vec<Schema>),
    /// A non-schema parameter (enum values, array shape, dtype).
    Param(Value),
}

impl FieldValue {
    /// Short human-readable description used in error messages.
    pub fn describe(&self) -> String {
        match self {
            FieldValue::Schema(schema) => schema.describe(),
            FieldValue::Schemas(schemas) => {
                let parts: Vec<String> = schemas.iter().map(Schema::describe).collect();
                format!("[{}]", parts.join(", "))
            }
            FieldValue::Param(value) => value.to_string(),
        }
    }
}

impl From<Schema> for FieldValue {
    fn from(schema: Schema) -> Self {
        FieldValue::Schema(schema)
    }
}

/// A typed schema node.
///
/// `kind` names a variant registered in a [`Catalog`](crate::Catalog);
/// `fields` holds the values of that variant's declared fields; `default`
/// is the state assigned when nothing more specific is known (`null` when
/// undeclared).
///
/// Nodes for the built-in variants have shorthand constructors:
///
/// ```
/// use schema_resolve_core::Node;
/// use serde_json::json;
///
/// let counts = Node::map(Node::integer()).with_default(json!({"a": 1}));
/// assert_eq!(counts.kind, "map");
/// assert!(counts.schema_field("_value").is_some());
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
    /// Registered variant name.
    pub kind: String,
    /// Declared field values, keyed by field name.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub fields: BTreeMap<String, FieldValue>,
    /// Default state (`null` when undeclared).
    #[serde(default, skip_serializing_if = "Value::is_null")]
    pub default: Value,
}

impl Node {
    /// Creates a node of `kind` with no fields and no default.
    pub fn new(kind: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            fields: BTreeMap::new(),
            default: Value::Null,
        }
    }

    /// Sets a field value.
    pub fn with_field(mut self, name: impl Into<String>, value: FieldValue) -> Self {
        self.fields.insert(name.into(), value);
        self
    }

    /// Sets a sub-schema field.
    pub fn with_schema(self, name: impl Into<String>, schema: impl Into<Schema>) -> Self {
        self.with_field(name, FieldValue::Schema(schema.into()))
    }

    /// Sets a parameter field.
    pub fn with_param(self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.with_field(name, FieldValue::Param(value.into()))
    }

    /// Sets the default state.
    pub fn with_default(mut self, default: impl Into<Value>) -> Self {
        self.default = default.into();
        self
    }

    /// Returns a declared field value.
    pub fn field(&self, name: &str) -> Option<&FieldValue> {
        self.fields.get(name)
    }

    /// Returns a sub-schema field, if present and schema-valued.
    pub fn schema_field(&self, name: &str) -> Option<&Schema> {
        match self.fields.get(name) {
            Some(FieldValue::Schema(schema)) => Some(schema),
            _ => None,
        }
    }

    /// Generic `node` schema: any shape, no default.
    pub fn any() -> Self {
        Self::new(NODE)
    }

    /// Boolean scalar.
    pub fn boolean() -> Self {
        Self::new(BOOLEAN)
    }

    /// Number scalar, the parent of the numeric variants.
    pub fn number() -> Self {
        Self::new(NUMBER)
    }

    /// Integer scalar.
    pub fn integer() -> Self {
        Self::new(INTEGER)
    }

    /// Float scalar.
    pub fn float() -> Self {
        Self::new(FLOAT)
    }

    /// String scalar.
    pub fn string() -> Self {
        Self::new(STRING)
    }

    /// String restricted to a fixed set of values.
    pub fn enumeration<I, S>(values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let values: Vec<Value> = values.into_iter().map(|v| Value::String(v.into())).collect();
        Self::new(ENUM).with_param(VALUES_FIELD, Value::Array(values))
    }

    /// Fixed-length heterogeneous sequence.
    pub fn tuple(values: Vec<Schema>) -> Self {
        Self::new(TUPLE).with_field(VALUES_FIELD, FieldValue::Schemas(values))
    }

    /// One of several alternative schemas.
    pub fn union(options: Vec<Schema>) -> Self {
        Self::new(UNION).with_field(OPTIONS_FIELD, FieldValue::Schemas(options))
    }

    /// Homogeneous list of `element`.
    pub fn list(element: impl Into<Schema>) -> Self {
        Self::new(LIST).with_schema(ELEMENT_FIELD, element)
    }

    /// Homogeneous mapping whose entries all conform to `value`.
    pub fn map(value: impl Into<Schema>) -> Self {
        Self::new(MAP).with_schema(VALUE_FIELD, value)
    }

    /// Self-similar tree whose leaves conform to `leaf`.
    pub fn tree(leaf: impl Into<Schema>) -> Self {
        Self::new(TREE).with_schema(LEAF_FIELD, leaf)
    }

    /// N-dimensional array of `data` elements with the given shape.
    pub fn array(shape: Vec<u64>, data: impl Into<String>) -> Self {
        Self::new(ARRAY)
            .with_param(SHAPE_FIELD, Value::from(shape))
            .with_param(DATA_FIELD, Value::String(data.into()))
    }

    /// Interface node with input and output port schemas.
    pub fn edge(inputs: impl Into<Schema>, outputs: impl Into<Schema>) -> Self {
        Self::new(EDGE)
            .with_schema(INPUTS_FIELD, inputs)
            .with_schema(OUTPUTS_FIELD, outputs)
    }

    /// Generic wrapper around `inner`.
    pub fn wrap(inner: impl Into<Schema>) -> Self {
        Self::wrapper(WRAP, inner)
    }

    /// Nullable wrapper around `inner`.
    pub fn maybe(inner: impl Into<Schema>) -> Self {
        Self::wrapper(MAYBE, inner)
    }

    /// Wrapper of an arbitrary registered wrapper variant.
    pub fn wrapper(kind: impl Into<String>, inner: impl Into<Schema>) -> Self {
        Self::new(kind).with_schema(VALUE_FIELD, inner)
    }
}

/// An untyped partial patch supplied in place of a full schema node.
///
/// Entries map a key to a node, a nested override, or a literal state
/// value. The `_default` key of the notation is held separately in
/// [`default`](Override::default).
///
/// # Examples
///
/// ```
/// use schema_resolve_core::{Node, Override};
///
/// let patch = Override::new()
///     .with_entry("count", Node::integer())
///     .with_literal("label", "hello");
/// assert_eq!(patch.len(), 2);
/// assert!(patch.get("count").is_some());
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Override {
    /// Patch entries keyed by field or entry name.
    #[serde(default)]
    pub entries: BTreeMap<String, Schema>,
    /// Explicit default state for the patch.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<Value>,
}

impl Override {
    /// Creates an empty override.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds an entry.
    pub fn with_entry(mut self, key: impl Into<String>, value: impl Into<Schema>) -> Self {
        self.entries.insert(key.into(), value.into());
        self
    }

    /// Adds a literal state entry.
    pub fn with_literal(self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.with_entry(key, Schema::Literal(value.into()))
    }

    /// Sets the explicit default state.
    pub fn with_default(mut self, default: impl Into<Value>) -> Self {
        self.default = Some(default.into());
        self
    }

    /// Returns the entry for `key`.
    pub fn get(&self, key: &str) -> Option<&Schema> {
        self.entries.get(key)
    }

    /// Iterates over entry keys in order.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` when the override has no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl FromIterator<(String, Schema)> for Override {
    fn from_iter<T: IntoIterator<Item = (String, Schema)>>(iter: T) -> Self {
        Self {
            entries: iter.into_iter().collect(),
            default: None,
        }
    }
}
