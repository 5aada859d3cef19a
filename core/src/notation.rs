//! JSON notation for schemas.
//!
//! Nodes are objects carrying a `_type` key naming their variant; their
//! declared fields and `_default` sit alongside it. Objects without `_type`
//! are overrides. A string naming a field-less variant is shorthand for a
//! bare node of that variant; every other value is a literal.
//!
//! ```
//! use schema_resolve_core::{Catalog, Node, Schema};
//! use serde_json::json;
//!
//! let catalog = Catalog::builtin();
//! let schema = catalog
//!     .decode(&json!({"_type": "map", "_value": "integer", "_default": {}}))
//!     .unwrap();
//! assert_eq!(schema, Schema::Node(Node::map(Node::integer()).with_default(json!({}))));
//!
//! assert_eq!(catalog.encode(&schema), json!({"_type": "map", "_value": "integer", "_default": {}}));
//! ```

use std::collections::BTreeMap;

use serde_json::{Map, Value};

use crate::catalog::{Catalog, DEFAULT_FIELD, FieldKind, TYPE_KEY};
use crate::error::NotationError;
use crate::types::{FieldValue, Node, Override, Schema};

impl Catalog {
    /// Decodes a schema from JSON text.
    pub fn decode_str(&self, text: &str) -> Result<Schema, NotationError> {
        let value: Value = serde_json::from_str(text)?;
        self.decode(&value)
    }

    /// Decodes a schema from a JSON value.
    ///
    /// # Errors
    ///
    /// Fails if `_type` is not a string, names an unknown variant, or a
    /// field is missing, undeclared or of the wrong JSON shape.
    pub fn decode(&self, value: &Value) -> Result<Schema, NotationError> {
        match value {
            Value::Object(map) => match map.get(TYPE_KEY) {
                Some(Value::String(kind)) => self.decode_node(kind, map).map(Schema::Node),
                Some(other) => Err(NotationError::InvalidType(other.clone())),
                None => self.decode_override(map).map(Schema::Override),
            },
            Value::String(name) if self.is_bare(name) => Ok(Schema::Node(Node::new(name.clone()))),
            other => Ok(Schema::Literal(other.clone())),
        }
    }

    /// Encodes a schema as a JSON value.
    pub fn encode(&self, schema: &Schema) -> Value {
        match schema {
            Schema::Literal(value) => value.clone(),
            Schema::Override(patch) => {
                let mut map: Map<String, Value> = patch
                    .entries
                    .iter()
                    .map(|(key, entry)| (key.clone(), self.encode(entry)))
                    .collect();
                if let Some(default) = &patch.default {
                    map.insert(DEFAULT_FIELD.to_string(), default.clone());
                }
                Value::Object(map)
            }
            Schema::Node(node) if node.fields.is_empty() && node.default.is_null() => {
                Value::String(node.kind.clone())
            }
            Schema::Node(node) => {
                let mut map = Map::new();
                map.insert(TYPE_KEY.to_string(), Value::String(node.kind.clone()));
                for (name, field) in &node.fields {
                    let encoded = match field {
                        FieldValue::Schema(schema) => self.encode(schema),
                        FieldValue::Schemas(schemas) => {
                            Value::Array(schemas.iter().map(|s| self.encode(s)).collect())
                        }
                        FieldValue::Param(value) => value.clone(),
                    };
                    map.insert(name.clone(), encoded);
                }
                if !node.default.is_null() {
                    map.insert(DEFAULT_FIELD.to_string(), node.default.clone());
                }
                Value::Object(map)
            }
        }
    }

    fn is_bare(&self, name: &str) -> bool {
        self.get(name).is_some_and(|v| v.fields().is_empty())
    }

    fn decode_node(&self, kind: &str, map: &Map<String, Value>) -> Result<Node, NotationError> {
        let variant = self.variant(kind)?;

        let mut fields = BTreeMap::new();
        for (name, raw) in map {
            if name == TYPE_KEY || name == DEFAULT_FIELD {
                continue;
            }
            // undeclared fields are rejected by `construct`
            let field_kind = variant.field(name).map(|f| f.kind).unwrap_or(FieldKind::Param);
            let value = match field_kind {
                FieldKind::Schema => FieldValue::Schema(self.decode(raw)?),
                FieldKind::Schemas => match raw {
                    Value::Array(items) => FieldValue::Schemas(
                        items
                            .iter()
                            .map(|item| self.decode(item))
                            .collect::<Result<_, _>>()?,
                    ),
                    _ => {
                        return Err(NotationError::InvalidField {
                            field: name.clone(),
                            reason: "expected an array of schemas".to_string(),
                        });
                    }
                },
                FieldKind::Param => FieldValue::Param(raw.clone()),
            };
            fields.insert(name.clone(), value);
        }

        let default = map.get(DEFAULT_FIELD).cloned().unwrap_or(Value::Null);
        Ok(self.construct(kind, fields, default)?)
    }

    fn decode_override(&self, map: &Map<String, Value>) -> Result<Override, NotationError> {
        let mut patch = Override::new();
        for (key, raw) in map {
            if key == DEFAULT_FIELD {
                patch.default = Some(raw.clone());
            } else {
                patch.entries.insert(key.clone(), self.decode(raw)?);
            }
        }
        Ok(patch)
    }
}
