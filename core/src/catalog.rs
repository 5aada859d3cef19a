//! Registry of schema variants.
//!
//! The resolver never inspects a variant's Rust representation. Everything
//! it needs to know about a variant comes from its [`VariantDescriptor`]:
//! the ordered declared fields, the structural shape that selects a
//! dispatch rule, the parent it derives from (which defines the structural
//! subtype relation), and the rule that computes its default state.
//!
//! New variants can be registered at runtime without touching the
//! resolver:
//!
//! ```
//! use schema_resolve_core::{Catalog, FieldKind, Node, VariantDescriptor};
//!
//! let mut catalog = Catalog::builtin();
//! catalog
//!     .register(VariantDescriptor::new("counter").parent("integer"))
//!     .unwrap();
//! catalog
//!     .register(VariantDescriptor::new("labelled").field("_label", FieldKind::Param))
//!     .unwrap();
//!
//! assert!(catalog.is_subtype("counter", "number"));
//! assert!(catalog.declares("labelled", "_label"));
//! ```

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use crate::error::CatalogError;
use crate::types::{FieldValue, Node};

/// Name of the default-state field every variant declares.
pub const DEFAULT_FIELD: &str = "_default";
/// Notation key holding a node's variant name.
pub const TYPE_KEY: &str = "_type";

pub const VALUE_FIELD: &str = "_value";
pub const LEAF_FIELD: &str = "_leaf";
pub const ELEMENT_FIELD: &str = "_element";
pub const VALUES_FIELD: &str = "_values";
pub const OPTIONS_FIELD: &str = "_options";
pub const SHAPE_FIELD: &str = "_shape";
pub const DATA_FIELD: &str = "_data";
pub const INPUTS_FIELD: &str = "_inputs";
pub const OUTPUTS_FIELD: &str = "_outputs";

pub const NODE: &str = "node";
pub const EMPTY: &str = "empty";
pub const BOOLEAN: &str = "boolean";
pub const NUMBER: &str = "number";
pub const INTEGER: &str = "integer";
pub const FLOAT: &str = "float";
pub const DELTA: &str = "delta";
pub const NONNEGATIVE: &str = "nonnegative";
pub const STRING: &str = "string";
pub const ENUM: &str = "enum";
pub const PATH: &str = "path";
pub const TUPLE: &str = "tuple";
pub const UNION: &str = "union";
pub const LIST: &str = "list";
pub const MAP: &str = "map";
pub const TREE: &str = "tree";
pub const WIRES: &str = "wires";
pub const ARRAY: &str = "array";
pub const EDGE: &str = "edge";
pub const WRAP: &str = "wrap";
pub const MAYBE: &str = "maybe";
pub const OVERWRITE: &str = "overwrite";

/// What a declared field holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldKind {
    /// A single sub-schema.
    Schema,
    /// An ordered list of sub-schemas.
    Schemas,
    /// A raw parameter value.
    Param,
}

impl FieldKind {
    /// Returns `true` if `value` has this kind.
    pub fn admits(self, value: &FieldValue) -> bool {
        matches!(
            (self, value),
            (FieldKind::Schema, FieldValue::Schema(_))
                | (FieldKind::Schemas, FieldValue::Schemas(_))
                | (FieldKind::Param, FieldValue::Param(_))
        )
    }
}

/// Structural shape that selects the resolver's composite rules.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Shape {
    /// No composite-specific rule; resolved field by field.
    #[default]
    Plain,
    /// Holds one inner schema in `_value` and adds no structure.
    Wrapper,
    /// Homogeneous mapping described by `_value`.
    Map,
    /// Self-similar tree with leaves described by `_leaf`.
    Tree,
}

/// How a variant computes its default state when no default is declared.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DefaultRule {
    /// No default state.
    Null,
    /// A constant state.
    Value(Value),
    /// First element of an array parameter field.
    FirstParam(String),
    /// Defaults of every member of a schema-list field, as an array.
    Members(String),
    /// Default of the first member of a schema-list field.
    FirstMember(String),
    /// Default of a sub-schema field.
    Inner(String),
    /// Zero-filled nested array following a shape parameter field.
    Zeros(String),
}

/// A declared field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldDescriptor {
    pub name: String,
    pub kind: FieldKind,
}

/// Registration record for one variant.
///
/// `shape` and `default` are inherited from the parent when left unset.
///
/// # Examples
///
/// ```
/// use schema_resolve_core::{DefaultRule, Shape, VariantDescriptor};
/// use serde_json::json;
///
/// let descriptor = VariantDescriptor::new("percent")
///     .parent("float")
///     .default_rule(DefaultRule::Value(json!(0.0)));
/// assert_eq!(descriptor.parent.as_deref(), Some("float"));
/// assert_eq!(descriptor.shape, None::<Shape>);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VariantDescriptor {
    /// Variant name.
    pub name: String,
    /// Variant this one derives from (`node` when unset).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent: Option<String>,
    /// Fields declared by this variant, in order, excluding inherited ones.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub fields: Vec<FieldDescriptor>,
    /// Structural shape.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub shape: Option<Shape>,
    /// Default-state rule.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<DefaultRule>,
}

impl VariantDescriptor {
    /// Creates a descriptor with no parent, fields, shape or default rule.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            parent: None,
            fields: Vec::new(),
            shape: None,
            default: None,
        }
    }

    /// Sets the parent variant.
    pub fn parent(mut self, parent: impl Into<String>) -> Self {
        self.parent = Some(parent.into());
        self
    }

    /// Declares a field.
    pub fn field(mut self, name: impl Into<String>, kind: FieldKind) -> Self {
        self.fields.push(FieldDescriptor {
            name: name.into(),
            kind,
        });
        self
    }

    /// Sets the structural shape.
    pub fn shape(mut self, shape: Shape) -> Self {
        self.shape = Some(shape);
        self
    }

    /// Sets the default-state rule.
    pub fn default_rule(mut self, rule: DefaultRule) -> Self {
        self.default = Some(rule);
        self
    }
}

/// A registered variant with inherited properties resolved.
#[derive(Debug, Clone, PartialEq)]
pub struct Variant {
    name: String,
    // self first, root last
    lineage: Vec<String>,
    fields: Vec<FieldDescriptor>,
    shape: Shape,
    default_rule: DefaultRule,
}

impl Variant {
    /// Variant name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Direct parent, if any.
    pub fn parent(&self) -> Option<&str> {
        self.lineage.get(1).map(String::as_str)
    }

    /// Every declared field, inherited ones first.
    pub fn fields(&self) -> &[FieldDescriptor] {
        &self.fields
    }

    /// Structural shape.
    pub fn shape(&self) -> Shape {
        self.shape
    }

    /// Default-state rule.
    pub fn default_rule(&self) -> &DefaultRule {
        &self.default_rule
    }

    /// Looks up a declared field.
    pub fn field(&self, name: &str) -> Option<&FieldDescriptor> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// Returns `true` if `name` is the default-state field or a declared field.
    pub fn declares(&self, name: &str) -> bool {
        name == DEFAULT_FIELD || self.field(name).is_some()
    }

    /// Returns `true` if this variant is `other` or derives from it.
    pub fn derives_from(&self, other: &str) -> bool {
        self.lineage.iter().any(|v| v == other)
    }
}

/// Variant registry.
#[derive(Debug, Clone, Default)]
pub struct Catalog {
    variants: BTreeMap<String, Variant>,
}

impl Catalog {
    /// Creates a catalog with no variants.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Creates a catalog holding the built-in variants.
    ///
    /// # Examples
    ///
    /// ```
    /// use schema_resolve_core::{Catalog, Shape};
    ///
    /// let catalog = Catalog::builtin();
    /// assert!(catalog.is_subtype("integer", "number"));
    /// assert!(!catalog.is_subtype("number", "integer"));
    /// assert_eq!(catalog.shape("wires").unwrap(), Shape::Tree);
    /// ```
    pub fn builtin() -> Self {
        let mut catalog = Self::empty();
        for descriptor in builtin_descriptors() {
            let registered = catalog.register(descriptor);
            debug_assert!(registered.is_ok(), "built-in variant rejected: {registered:?}");
        }
        catalog
    }

    /// Registers a new variant.
    ///
    /// # Errors
    ///
    /// Fails if the name is taken, the parent is unknown, or a field is
    /// declared twice along the lineage.
    pub fn register(&mut self, descriptor: VariantDescriptor) -> Result<(), CatalogError> {
        if self.variants.contains_key(&descriptor.name) {
            return Err(CatalogError::DuplicateVariant(descriptor.name));
        }

        let parent_name = match &descriptor.parent {
            Some(parent) => Some(parent.clone()),
            None if descriptor.name != NODE && self.variants.contains_key(NODE) => {
                Some(NODE.to_string())
            }
            None => None,
        };
        let parent = match &parent_name {
            Some(name) => Some(self.variants.get(name).ok_or_else(|| {
                CatalogError::UnknownParent {
                    variant: descriptor.name.clone(),
                    parent: name.clone(),
                }
            })?),
            None => None,
        };

        let mut fields = parent.map(|p| p.fields.clone()).unwrap_or_default();
        for field in &descriptor.fields {
            if field.name == DEFAULT_FIELD || fields.iter().any(|f| f.name == field.name) {
                return Err(CatalogError::FieldClash {
                    variant: descriptor.name.clone(),
                    field: field.name.clone(),
                });
            }
            fields.push(field.clone());
        }

        let mut lineage = vec![descriptor.name.clone()];
        if let Some(parent) = parent {
            lineage.extend(parent.lineage.iter().cloned());
        }

        let shape = descriptor
            .shape
            .or_else(|| parent.map(|p| p.shape))
            .unwrap_or_default();
        let default_rule = descriptor
            .default
            .clone()
            .or_else(|| parent.map(|p| p.default_rule.clone()))
            .unwrap_or(DefaultRule::Null);

        debug!(variant = %descriptor.name, parent = ?parent_name, ?shape, "Registered schema variant");
        self.variants.insert(
            descriptor.name.clone(),
            Variant {
                name: descriptor.name,
                lineage,
                fields,
                shape,
                default_rule,
            },
        );
        Ok(())
    }

    /// Looks up a variant.
    pub fn get(&self, kind: &str) -> Option<&Variant> {
        self.variants.get(kind)
    }

    /// Looks up a variant, failing if it is not registered.
    pub fn variant(&self, kind: &str) -> Result<&Variant, CatalogError> {
        self.get(kind)
            .ok_or_else(|| CatalogError::UnknownVariant(kind.to_string()))
    }

    /// Returns `true` if `kind` is registered.
    pub fn contains(&self, kind: &str) -> bool {
        self.variants.contains_key(kind)
    }

    /// Iterates over registered variants in name order.
    pub fn variants(&self) -> impl Iterator<Item = &Variant> {
        self.variants.values()
    }

    /// Declared fields of `kind`, inherited ones first.
    pub fn fields(&self, kind: &str) -> Result<&[FieldDescriptor], CatalogError> {
        self.variant(kind).map(Variant::fields)
    }

    /// Returns `true` if `kind` declares `field`. Unknown kinds declare nothing.
    pub fn declares(&self, kind: &str, field: &str) -> bool {
        self.get(kind).is_some_and(|v| v.declares(field))
    }

    /// Structural subtype test: `sub` is `sup` or derives from it.
    pub fn is_subtype(&self, sub: &str, sup: &str) -> bool {
        self.get(sub).is_some_and(|v| v.derives_from(sup))
    }

    /// Structural shape of `kind`.
    pub fn shape(&self, kind: &str) -> Result<Shape, CatalogError> {
        self.variant(kind).map(Variant::shape)
    }

    /// Builds a node of `kind` from a complete field set.
    ///
    /// # Errors
    ///
    /// Fails if `kind` is unknown, a declared field is missing, a field is
    /// not declared, or a field value has the wrong kind.
    pub fn construct(
        &self,
        kind: &str,
        fields: BTreeMap<String, FieldValue>,
        default: Value,
    ) -> Result<Node, CatalogError> {
        let variant = self.variant(kind)?;
        for descriptor in variant.fields() {
            match fields.get(&descriptor.name) {
                Some(value) if descriptor.kind.admits(value) => {}
                Some(_) => {
                    return Err(CatalogError::FieldKindMismatch {
                        variant: kind.to_string(),
                        field: descriptor.name.clone(),
                    });
                }
                None => {
                    return Err(CatalogError::MissingField {
                        variant: kind.to_string(),
                        field: descriptor.name.clone(),
                    });
                }
            }
        }
        if let Some(extra) = fields.keys().find(|name| variant.field(name).is_none()) {
            return Err(CatalogError::UndeclaredField {
                variant: kind.to_string(),
                field: extra.clone(),
            });
        }

        Ok(Node {
            kind: kind.to_string(),
            fields,
            default,
        })
    }
}

fn builtin_descriptors() -> Vec<VariantDescriptor> {
    use serde_json::json;

    vec![
        VariantDescriptor::new(NODE).default_rule(DefaultRule::Null),
        VariantDescriptor::new(EMPTY),
        VariantDescriptor::new(BOOLEAN).default_rule(DefaultRule::Value(json!(false))),
        VariantDescriptor::new(NUMBER).default_rule(DefaultRule::Value(json!(0))),
        VariantDescriptor::new(INTEGER).parent(NUMBER),
        VariantDescriptor::new(FLOAT)
            .parent(NUMBER)
            .default_rule(DefaultRule::Value(json!(0.0))),
        VariantDescriptor::new(DELTA).parent(NUMBER),
        VariantDescriptor::new(NONNEGATIVE).parent(NUMBER),
        VariantDescriptor::new(STRING).default_rule(DefaultRule::Value(json!(""))),
        VariantDescriptor::new(ENUM)
            .parent(STRING)
            .field(VALUES_FIELD, FieldKind::Param)
            .default_rule(DefaultRule::FirstParam(VALUES_FIELD.into())),
        VariantDescriptor::new(PATH).default_rule(DefaultRule::Value(json!([]))),
        VariantDescriptor::new(TUPLE)
            .field(VALUES_FIELD, FieldKind::Schemas)
            .default_rule(DefaultRule::Members(VALUES_FIELD.into())),
        VariantDescriptor::new(UNION)
            .field(OPTIONS_FIELD, FieldKind::Schemas)
            .default_rule(DefaultRule::FirstMember(OPTIONS_FIELD.into())),
        VariantDescriptor::new(LIST)
            .field(ELEMENT_FIELD, FieldKind::Schema)
            .default_rule(DefaultRule::Value(json!([]))),
        VariantDescriptor::new(MAP)
            .field(VALUE_FIELD, FieldKind::Schema)
            .shape(Shape::Map)
            .default_rule(DefaultRule::Value(json!({}))),
        VariantDescriptor::new(TREE)
            .field(LEAF_FIELD, FieldKind::Schema)
            .shape(Shape::Tree)
            .default_rule(DefaultRule::Value(json!({}))),
        VariantDescriptor::new(WIRES).parent(TREE),
        VariantDescriptor::new(ARRAY)
            .field(SHAPE_FIELD, FieldKind::Param)
            .field(DATA_FIELD, FieldKind::Param)
            .default_rule(DefaultRule::Zeros(SHAPE_FIELD.into())),
        VariantDescriptor::new(EDGE)
            .field(INPUTS_FIELD, FieldKind::Schema)
            .field(OUTPUTS_FIELD, FieldKind::Schema)
            .default_rule(DefaultRule::Value(json!({}))),
        VariantDescriptor::new(WRAP)
            .field(VALUE_FIELD, FieldKind::Schema)
            .shape(Shape::Wrapper)
            .default_rule(DefaultRule::Inner(VALUE_FIELD.into())),
        VariantDescriptor::new(MAYBE)
            .parent(WRAP)
            .default_rule(DefaultRule::Null),
        VariantDescriptor::new(OVERWRITE).parent(WRAP),
    ]
}
