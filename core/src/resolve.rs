//! Schema resolution.
//!
//! [`Resolver::resolve`] reconciles a `current` schema (the base) with an
//! `update` schema (the override) and returns a schema consistent with
//! both. Resolution is strictly asymmetric: `current` is the base and
//! `update` patches it, except where a rule says otherwise (subtype
//! preference, key union).
//!
//! The pair of operand shapes selects the rule:
//!
//! | current | update | rule |
//! |---|---|---|
//! | absent | any | the other operand |
//! | wrapper | wrapper | resolve inner values, rewrap in the more specific kind |
//! | wrapper | node | resolve inner against node, rewrap in current's kind |
//! | node | wrapper | resolve node against inner, rewrap in update's kind |
//! | node | node | field resolution on the more specific variant |
//! | map | override | fold entries into `_value`, else upgrade to a record |
//! | override | map | fold entries into `_value` |
//! | tree | map / tree / node | resolve the leaf |
//! | tree | override | refine the leaf per entry, else nest the entry |
//! | override | override | key union |
//! | node | override | replace the node if the override adds keys |
//!
//! Composite map and tree rules finish with default propagation: the
//! default states of both operands are combined through [`StateOps`] and
//! attached to the result.
//!
//! # Examples
//!
//! ```
//! use schema_resolve_core::{Catalog, Node, Resolver, Schema};
//!
//! let catalog = Catalog::builtin();
//! let resolver = Resolver::new(&catalog);
//!
//! let resolved = resolver
//!     .resolve_schemas(&Node::number().into(), &Node::integer().into())
//!     .unwrap();
//! assert_eq!(resolved.kind(), Some("integer"));
//! ```

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, trace};

use crate::catalog::{Catalog, LEAF_FIELD, Shape, VALUE_FIELD};
use crate::error::{CatalogError, ResolveError, Result};
use crate::state::StateOps;
use crate::types::{FieldValue, Node, Override, Schema, is_empty_state};

/// Switches for the two fallback strategies.
///
/// Both are on by default. Turning one off makes the conflict that would
/// have triggered it propagate to the caller instead.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResolveOptions {
    /// Reinterpret a map as a record when override entries do not fit `_value`.
    pub struct_upgrade: bool,
    /// Treat override entries that do not fit a tree's leaf as nested levels.
    pub nest_tree_entries: bool,
}

impl Default for ResolveOptions {
    fn default() -> Self {
        Self {
            struct_upgrade: true,
            nest_tree_entries: true,
        }
    }
}

/// Resolves `current` against `update` with the catalog's own state rules.
///
/// # Examples
///
/// ```
/// use schema_resolve_core::{Catalog, Override, Schema, resolve};
///
/// let catalog = Catalog::builtin();
/// let patch: Schema = Override::new().with_literal("x", 1).into();
///
/// assert_eq!(resolve(&catalog, None, Some(&patch)).unwrap(), Some(patch.clone()));
/// assert_eq!(resolve(&catalog, Some(&patch), None).unwrap(), Some(patch));
/// ```
pub fn resolve(
    catalog: &Catalog,
    current: Option<&Schema>,
    update: Option<&Schema>,
) -> Result<Option<Schema>> {
    Resolver::new(catalog).resolve(current, update)
}

/// The runtime shape of one present operand.
#[derive(Debug, Clone, Copy)]
enum Operand<'s> {
    Wrapper(&'s Node),
    Map(&'s Node),
    Tree(&'s Node),
    Plain(&'s Node),
    Override(&'s Override),
    Literal(&'s Value),
}

/// Both operands of one resolution step, as supplied.
#[derive(Debug, Clone, Copy)]
struct Pair<'s> {
    current: &'s Schema,
    update: &'s Schema,
}

/// Outcome of applying an override to a node.
enum Patched {
    /// Every override key is a declared field; the node stands.
    Kept,
    /// The override adds keys and replaces the node.
    Replaced,
}

/// Schema resolver bound to a catalog.
pub struct Resolver<'a> {
    catalog: &'a Catalog,
    states: &'a dyn StateOps,
    options: ResolveOptions,
}

impl<'a> Resolver<'a> {
    /// Creates a resolver that uses `catalog` for both variants and states.
    pub fn new(catalog: &'a Catalog) -> Self {
        Self {
            catalog,
            states: catalog,
            options: ResolveOptions::default(),
        }
    }

    /// Replaces the fallback switches.
    pub fn with_options(mut self, options: ResolveOptions) -> Self {
        self.options = options;
        self
    }

    /// Replaces the state collaborator.
    pub fn with_states(mut self, states: &'a dyn StateOps) -> Self {
        self.states = states;
        self
    }

    /// Active fallback switches.
    pub fn options(&self) -> ResolveOptions {
        self.options
    }

    /// Resolves two possibly absent operands.
    ///
    /// Absence imposes no constraint: if either side is `None` the other is
    /// returned unchanged.
    pub fn resolve(
        &self,
        current: Option<&Schema>,
        update: Option<&Schema>,
    ) -> Result<Option<Schema>> {
        match (current, update) {
            (None, None) => Ok(None),
            (None, Some(update)) => Ok(Some(update.clone())),
            (Some(current), None) => Ok(Some(current.clone())),
            (Some(current), Some(update)) => self.resolve_schemas(current, update).map(Some),
        }
    }

    /// Resolves two present operands.
    pub fn resolve_schemas(&self, current: &Schema, update: &Schema) -> Result<Schema> {
        use Operand as Op;

        let pair = Pair { current, update };
        let shapes = (self.classify(current)?, self.classify(update)?);
        trace!(current = %current.describe(), update = %update.describe(), "Resolving schemas");

        match shapes {
            (Op::Literal(a), Op::Literal(b)) if a == b => Ok(current.clone()),
            (Op::Literal(_), Op::Literal(_)) => Err(ResolveError::unsupported(current, update)),
            (Op::Literal(_), _) | (_, Op::Literal(_)) => Err(ResolveError::conflict(current, update)),

            (Op::Override(c), Op::Override(u)) => self.resolve_overrides(c, u).map(Schema::Override),
            (Op::Override(c), Op::Map(u)) => self.resolve_override_map(pair, c, u),
            (Op::Override(_), _) => Err(ResolveError::unsupported(current, update)),
            (Op::Map(c), Op::Override(u)) => self.resolve_map_override(pair, c, u),
            (Op::Tree(c), Op::Override(u)) => {
                self.resolve_tree_override(pair, c, u).map(Schema::Node)
            }
            (Op::Wrapper(c) | Op::Plain(c), Op::Override(u)) => match self.patch(c, u)? {
                Patched::Kept => Ok(current.clone()),
                Patched::Replaced => Ok(update.clone()),
            },

            (Op::Wrapper(c), Op::Wrapper(u)) => self.resolve_wrappers(c, u).map(Schema::Node),
            (Op::Wrapper(c), _) => self.rewrap(c, inner_of(c)?, update),
            (_, Op::Wrapper(u)) => self.rewrap(u, current, inner_of(u)?),

            (Op::Tree(c), Op::Tree(u)) => self.resolve_trees(pair, c, u).map(Schema::Node),
            (Op::Tree(c), Op::Map(u)) => self.resolve_tree_map(pair, c, u).map(Schema::Node),
            (Op::Tree(c), Op::Plain(_)) => self.resolve_tree_node(c, update).map(Schema::Node),
            (Op::Map(c) | Op::Plain(c), Op::Map(u) | Op::Tree(u) | Op::Plain(u)) => {
                self.resolve_nodes(c, u).map(Schema::Node)
            }
        }
    }

    fn classify<'s>(&self, schema: &'s Schema) -> Result<Operand<'s>> {
        Ok(match schema {
            Schema::Override(patch) => Operand::Override(patch),
            Schema::Literal(value) => Operand::Literal(value),
            Schema::Node(node) => match self.catalog.shape(&node.kind)? {
                Shape::Wrapper => Operand::Wrapper(node),
                Shape::Map => Operand::Map(node),
                Shape::Tree => Operand::Tree(node),
                Shape::Plain => Operand::Plain(node),
            },
        })
    }

    /// Orders two nodes as (specific, general), or fails if unrelated.
    fn order<'n>(&self, current: &'n Node, update: &'n Node) -> Result<(&'n Node, &'n Node)> {
        if current.kind == update.kind || self.catalog.is_subtype(&current.kind, &update.kind) {
            Ok((current, update))
        } else if self.catalog.is_subtype(&update.kind, &current.kind) {
            Ok((update, current))
        } else {
            Err(ResolveError::conflict(
                &Schema::Node(current.clone()),
                &Schema::Node(update.clone()),
            ))
        }
    }

    fn resolve_nodes(&self, current: &Node, update: &Node) -> Result<Node> {
        let (specific, general) = self.order(current, update)?;
        self.resolve_subclass(specific, general)
    }

    /// Rebuilds `specific` with every field reconciled against `general`.
    fn resolve_subclass(&self, specific: &Node, general: &Node) -> Result<Node> {
        let variant = self.catalog.variant(&specific.kind)?;
        let general_variant = self.catalog.variant(&general.kind)?;

        let mut fields = BTreeMap::new();
        for descriptor in variant.fields() {
            let name = descriptor.name.as_str();
            let theirs = general_variant
                .field(name)
                .and_then(|_| general.fields.get(name));
            let value = match (specific.fields.get(name), theirs) {
                (Some(ours), Some(theirs)) => self.resolve_field(name, ours, theirs)?,
                (Some(ours), None) => ours.clone(),
                (None, Some(theirs)) => theirs.clone(),
                (None, None) => continue,
            };
            fields.insert(name.to_string(), value);
        }

        let default = if is_empty_state(&specific.default) {
            general.default.clone()
        } else {
            specific.default.clone()
        };

        Ok(self.catalog.construct(&specific.kind, fields, default)?)
    }

    fn resolve_field(&self, name: &str, ours: &FieldValue, theirs: &FieldValue) -> Result<FieldValue> {
        let outcome = match (ours, theirs) {
            (FieldValue::Schema(a), FieldValue::Schema(b)) => {
                self.resolve_schemas(a, b).map(FieldValue::Schema)
            }
            (FieldValue::Schemas(a), FieldValue::Schemas(b)) if a.len() == b.len() => a
                .iter()
                .zip(b)
                .enumerate()
                .map(|(index, (x, y))| {
                    self.resolve_schemas(x, y)
                        .map_err(|err| err.in_key(index.to_string(), Some(x), Some(y)))
                })
                .collect::<Result<Vec<_>>>()
                .map(FieldValue::Schemas),
            (FieldValue::Param(a), FieldValue::Param(b)) if a == b => Ok(ours.clone()),
            _ => Err(ResolveError::field_conflict(ours, theirs)),
        };
        outcome.map_err(|err| err.in_field(name, Some(ours), Some(theirs)))
    }

    fn resolve_wrappers(&self, current: &Node, update: &Node) -> Result<Node> {
        let (specific, general) = self.order(current, update)?;
        let ours = inner_of(current)?;
        let theirs = inner_of(update)?;
        let inner = self.resolve_schemas(ours, theirs).map_err(|err| {
            err.in_key(VALUE_FIELD, Some(ours), Some(theirs))
        })?;

        let mut wrapped = with_schema_field(specific, VALUE_FIELD, inner);
        if is_empty_state(&wrapped.default) {
            wrapped.default = general.default.clone();
        }
        Ok(wrapped)
    }

    /// Resolves `ours` against `theirs` and puts the result inside `wrapper`.
    fn rewrap(&self, wrapper: &Node, ours: &Schema, theirs: &Schema) -> Result<Schema> {
        let inner = self
            .resolve_schemas(ours, theirs)
            .map_err(|err| err.in_key(VALUE_FIELD, Some(ours), Some(theirs)))?;
        Ok(Schema::Node(with_schema_field(wrapper, VALUE_FIELD, inner)))
    }

    /// Applies an override to a non-composite node.
    fn patch(&self, node: &Node, patch: &Override) -> Result<Patched> {
        let variant = self.catalog.variant(&node.kind)?;
        if patch.keys().any(|key| !variant.declares(key)) {
            Ok(Patched::Replaced)
        } else {
            Ok(Patched::Kept)
        }
    }

    fn resolve_overrides(&self, current: &Override, update: &Override) -> Result<Override> {
        let keys: BTreeSet<&String> = current.entries.keys().chain(update.entries.keys()).collect();

        let mut entries = BTreeMap::new();
        for key in keys {
            let (ours, theirs) = (current.entries.get(key), update.entries.get(key));
            let resolved = self
                .resolve(ours, theirs)
                .map_err(|err| err.in_key(key.as_str(), ours, theirs))?;
            if let Some(resolved) = resolved {
                entries.insert(key.clone(), resolved);
            }
        }

        let mut resolved = Override {
            entries,
            default: None,
        };
        resolved.default = match (&current.default, &update.default) {
            (Some(ours), Some(theirs)) => {
                let schema = Schema::Override(resolved.clone());
                Some(self.states.merge_state(&schema, ours, theirs))
            }
            (ours, theirs) => theirs.clone().or_else(|| ours.clone()),
        };
        Ok(resolved)
    }

    /// Folds every override entry into `element`, left to right.
    fn fold_entries(&self, element: &Schema, patch: &Override) -> Result<Schema> {
        patch
            .entries
            .iter()
            .try_fold(element.clone(), |folded, (key, value)| {
                self.resolve_schemas(&folded, value)
                    .map_err(|err| err.in_key(key.as_str(), Some(&folded), Some(value)))
            })
    }

    fn resolve_map_override(&self, pair: Pair<'_>, map: &Node, patch: &Override) -> Result<Schema> {
        let element = schema_field(map, VALUE_FIELD)?;

        let resolved = match self.fold_entries(element, patch) {
            Ok(folded) => Schema::Node(with_schema_field(map, VALUE_FIELD, folded)),
            Err(err) if self.options.struct_upgrade && err.is_fallback_eligible() => {
                debug!(map = %map.kind, keys = ?patch.keys().collect::<Vec<_>>(), error = %err, "Upgrading map schema to record");
                Schema::Override(self.upgrade_to_record(pair.current, element, patch))
            }
            Err(err) => return Err(err),
        };

        self.propagate_defaults(resolved, pair)
    }

    /// Reinterprets a map as a record whose fields are the observed keys.
    ///
    /// Keys of the map's default state are seeded with the element schema;
    /// override entries are laid over them.
    fn upgrade_to_record(&self, map: &Schema, element: &Schema, patch: &Override) -> Override {
        let mut entries = BTreeMap::new();
        if let Value::Object(seed) = self.states.default_state(map) {
            for key in seed.keys() {
                entries.insert(key.clone(), element.clone());
            }
        }
        for (key, value) in &patch.entries {
            entries.insert(key.clone(), value.clone());
        }
        Override {
            entries,
            default: None,
        }
    }

    fn resolve_override_map(&self, pair: Pair<'_>, patch: &Override, map: &Node) -> Result<Schema> {
        let element = schema_field(map, VALUE_FIELD)?;
        let folded = self.fold_entries(element, patch)?;
        let folded = with_default_of(folded, element);
        let resolved = Schema::Node(with_schema_field(map, VALUE_FIELD, folded));
        self.propagate_defaults(resolved, pair)
    }

    fn resolve_trees(&self, pair: Pair<'_>, current: &Node, update: &Node) -> Result<Node> {
        let (specific, _) = self.order(current, update)?;
        let leaf = self.resolve_leaves(current, schema_field(update, LEAF_FIELD)?)?;
        self.propagate_node(with_schema_field(specific, LEAF_FIELD, leaf), pair)
    }

    fn resolve_tree_map(&self, pair: Pair<'_>, tree: &Node, map: &Node) -> Result<Node> {
        let leaf = self.resolve_leaves(tree, schema_field(map, VALUE_FIELD)?)?;
        self.propagate_node(with_schema_field(tree, LEAF_FIELD, leaf), pair)
    }

    /// A plain node update must fit the leaf; there is no other place for it.
    ///
    /// The node's default is a leaf state, so it travels with the resolved
    /// leaf and the tree keeps its own default.
    fn resolve_tree_node(&self, tree: &Node, node: &Schema) -> Result<Node> {
        let leaf = self.resolve_leaves(tree, node)?;
        Ok(with_schema_field(tree, LEAF_FIELD, leaf))
    }

    fn resolve_leaves(&self, tree: &Node, other: &Schema) -> Result<Schema> {
        let leaf = schema_field(tree, LEAF_FIELD)?;
        self.resolve_schemas(leaf, other)
            .map_err(|err| err.in_key(LEAF_FIELD, Some(leaf), Some(other)))
    }

    fn resolve_tree_override(&self, pair: Pair<'_>, tree: &Node, patch: &Override) -> Result<Node> {
        let mut result = tree.clone();
        let mut leaf = schema_field(tree, LEAF_FIELD)?.clone();

        for (key, value) in &patch.entries {
            match self.refine_leaf(&leaf, value) {
                Ok(refined) => leaf = refined,
                Err(err) if self.options.nest_tree_entries && err.is_fallback_eligible() => {
                    debug!(tree = %tree.kind, key = %key, "Nesting override entry as tree level");
                    result = self
                        .nest_entry(&result, value)
                        .map_err(|err| err.in_key(key.as_str(), None, Some(value)))?;
                }
                Err(err) => return Err(err.in_key(key.as_str(), Some(&leaf), Some(value))),
            }
        }

        self.propagate_node(with_schema_field(&result, LEAF_FIELD, leaf), pair)
    }

    /// Resolves an override entry against a tree leaf.
    ///
    /// For a plain or wrapper leaf, a mapping that adds keys the leaf does
    /// not declare is a nested tree level, never a replacement of the leaf.
    /// Map and tree leaves take the mapping through their own override rules.
    fn refine_leaf(&self, leaf: &Schema, value: &Schema) -> Result<Schema> {
        if let (Schema::Node(node), Schema::Override(patch)) = (leaf, value) {
            let composite = matches!(self.catalog.shape(&node.kind)?, Shape::Map | Shape::Tree);
            if !composite {
                if let Patched::Replaced = self.patch(node, patch)? {
                    return Err(ResolveError::conflict(leaf, value));
                }
            }
        }
        self.resolve_schemas(leaf, value)
    }

    /// Resolves the whole tree against one entry treated as a nested level.
    fn nest_entry(&self, tree: &Node, value: &Schema) -> Result<Node> {
        let current = Schema::Node(tree.clone());
        match value {
            // a leaf state one level down; its validity is a state concern
            Schema::Literal(_) => Ok(tree.clone()),
            Schema::Override(patch) => self.resolve_tree_override(
                Pair {
                    current: &current,
                    update: value,
                },
                tree,
                patch,
            ),
            Schema::Node(_) => match self.resolve_schemas(&current, value)? {
                Schema::Node(node) if matches!(self.catalog.shape(&node.kind), Ok(Shape::Tree)) => {
                    Ok(node)
                }
                _ => Err(ResolveError::conflict(&current, value)),
            },
        }
    }

    fn propagate_node(&self, node: Node, pair: Pair<'_>) -> Result<Node> {
        match self.propagate_defaults(Schema::Node(node), pair)? {
            Schema::Node(node) => Ok(node),
            other => Err(ResolveError::UnattachableDefault {
                schema: Box::new(other),
                state: Value::Null,
            }),
        }
    }

    /// Folds both operands' default states into the resolved schema.
    fn propagate_defaults(&self, resolved: Schema, pair: Pair<'_>) -> Result<Schema> {
        let current_state = self.states.default_state(pair.current);
        let update_state = self.states.default_state(pair.update);

        let state = if is_empty_state(&update_state) {
            current_state
        } else if is_empty_state(&current_state) {
            update_state
        } else {
            self.states
                .merge_state(&resolved, &current_state, &update_state)
        };

        attach_default(resolved, state)
    }
}

/// Sets the default attribute of a node or override; empty states leave it alone.
fn attach_default(resolved: Schema, state: Value) -> Result<Schema> {
    match resolved {
        Schema::Node(mut node) => {
            if !is_empty_state(&state) {
                node.default = state;
            }
            Ok(Schema::Node(node))
        }
        Schema::Override(mut patch) => {
            if !is_empty_state(&state) {
                patch.default = Some(state);
            }
            Ok(Schema::Override(patch))
        }
        literal @ Schema::Literal(_) => Err(ResolveError::UnattachableDefault {
            schema: Box::new(literal),
            state,
        }),
    }
}

/// Gives `folded` the default attribute carried by `like`.
fn with_default_of(folded: Schema, like: &Schema) -> Schema {
    match folded {
        Schema::Node(mut node) => {
            node.default = like.as_node().map(|n| n.default.clone()).unwrap_or(Value::Null);
            Schema::Node(node)
        }
        Schema::Override(mut patch) => {
            patch.default = like.as_override().and_then(|o| o.default.clone());
            Schema::Override(patch)
        }
        literal @ Schema::Literal(_) => literal,
    }
}

fn schema_field<'n>(node: &'n Node, name: &str) -> std::result::Result<&'n Schema, CatalogError> {
    match node.fields.get(name) {
        Some(FieldValue::Schema(schema)) => Ok(schema),
        Some(_) => Err(CatalogError::FieldKindMismatch {
            variant: node.kind.clone(),
            field: name.to_string(),
        }),
        None => Err(CatalogError::MissingField {
            variant: node.kind.clone(),
            field: name.to_string(),
        }),
    }
}

fn inner_of(wrapper: &Node) -> std::result::Result<&Schema, CatalogError> {
    schema_field(wrapper, VALUE_FIELD)
}

fn with_schema_field(node: &Node, name: &str, schema: Schema) -> Node {
    let mut rebuilt = node.clone();
    rebuilt
        .fields
        .insert(name.to_string(), FieldValue::Schema(schema));
    rebuilt
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use crate::catalog::{MAYBE, OVERWRITE, WIRES, WRAP};

    use super::*;

    fn resolve_ok(current: impl Into<Schema>, update: impl Into<Schema>) -> Schema {
        let catalog = Catalog::builtin();
        Resolver::new(&catalog)
            .resolve_schemas(&current.into(), &update.into())
            .unwrap()
    }

    fn resolve_err(current: impl Into<Schema>, update: impl Into<Schema>) -> ResolveError {
        let catalog = Catalog::builtin();
        Resolver::new(&catalog)
            .resolve_schemas(&current.into(), &update.into())
            .unwrap_err()
    }

    #[test]
    fn test_absent_operands_impose_no_constraint() {
        let catalog = Catalog::builtin();
        let resolver = Resolver::new(&catalog);
        let schema: Schema = Node::integer().into();
        assert_eq!(resolver.resolve(None, None).unwrap(), None);
        assert_eq!(resolver.resolve(None, Some(&schema)).unwrap(), Some(schema.clone()));
        assert_eq!(resolver.resolve(Some(&schema), None).unwrap(), Some(schema));
    }

    #[test]
    fn test_subclass_prefers_specific_default() {
        let resolved = resolve_ok(Node::integer(), Node::number().with_default(3));
        assert_eq!(resolved, Schema::Node(Node::integer().with_default(3)));

        let resolved = resolve_ok(Node::integer().with_default(1), Node::number().with_default(3));
        assert_eq!(resolved, Schema::Node(Node::integer().with_default(1)));
    }

    #[test]
    fn test_unrelated_scalars_conflict() {
        let err = resolve_err(Node::integer(), Node::float());
        assert!(matches!(err, ResolveError::SchemaConflict { .. }));
    }

    #[test]
    fn test_field_conflict_names_field() {
        let err = resolve_err(Node::map(Node::string()), Node::map(Node::boolean()));
        assert_eq!(err.path(), vec![VALUE_FIELD]);
        assert!(err.is_fallback_eligible());
    }

    #[test]
    fn test_param_fields_must_agree() {
        assert_eq!(
            resolve_ok(Node::enumeration(["a", "b"]), Node::enumeration(["a", "b"])),
            Schema::Node(Node::enumeration(["a", "b"]))
        );
        let err = resolve_err(Node::enumeration(["a"]), Node::enumeration(["b"]));
        assert_eq!(err.path(), vec!["_values"]);
    }

    #[test]
    fn test_enum_refines_string() {
        let resolved = resolve_ok(Node::string().with_default("x"), Node::enumeration(["x", "y"]));
        assert_eq!(
            resolved,
            Schema::Node(Node::enumeration(["x", "y"]).with_default("x"))
        );
    }

    #[test]
    fn test_tuple_members_resolve_pairwise() {
        let resolved = resolve_ok(
            Node::tuple(vec![Node::number().into(), Node::string().into()]),
            Node::tuple(vec![Node::integer().into(), Node::string().into()]),
        );
        assert_eq!(
            resolved,
            Schema::Node(Node::tuple(vec![Node::integer().into(), Node::string().into()]))
        );

        let err = resolve_err(
            Node::tuple(vec![Node::integer().into()]),
            Node::tuple(vec![Node::integer().into(), Node::string().into()]),
        );
        assert_eq!(err.path(), vec!["_values"]);
    }

    #[test]
    fn test_wrapper_rules_rewrap_in_expected_kind() {
        let resolved = resolve_ok(Node::maybe(Node::number()), Node::maybe(Node::integer()));
        assert_eq!(resolved, Schema::Node(Node::maybe(Node::integer())));

        let resolved = resolve_ok(Node::maybe(Node::number()), Node::integer());
        assert_eq!(resolved, Schema::Node(Node::maybe(Node::integer())));

        let resolved = resolve_ok(Node::number(), Node::wrapper(OVERWRITE, Node::integer()));
        assert_eq!(
            resolved,
            Schema::Node(Node::wrapper(OVERWRITE, Node::integer()))
        );

        let resolved = resolve_ok(Node::wrap(Node::integer()), Node::maybe(Node::integer()));
        assert_eq!(resolved.kind(), Some(MAYBE));

        let err = resolve_err(Node::maybe(Node::integer()), Node::wrapper(OVERWRITE, Node::integer()));
        assert!(matches!(err, ResolveError::SchemaConflict { .. }));
    }

    #[test]
    fn test_wrapper_inner_conflict_names_value() {
        let err = resolve_err(Node::wrapper(WRAP, Node::string()), Node::boolean());
        assert_eq!(err.path(), vec![VALUE_FIELD]);
    }

    #[test]
    fn test_node_override_replaces_only_on_new_keys() {
        let edge = Node::edge(Override::new(), Override::new());
        let patch = Override::new().with_entry("_inputs", Override::new());
        assert_eq!(resolve_ok(edge.clone(), patch), Schema::Node(edge.clone()));

        let literal = Override::new().with_literal("speed", 3);
        assert_eq!(resolve_ok(edge, literal.clone()), Schema::Override(literal));
    }

    #[test]
    fn test_literal_pairs() {
        assert_eq!(resolve_ok(Schema::literal(1), Schema::literal(1)), Schema::literal(1));
        let err = resolve_err(Schema::literal(1), Schema::literal(2));
        assert!(matches!(err, ResolveError::UnsupportedOperand { .. }));

        let err = resolve_err(Node::integer(), Schema::literal(1));
        assert!(matches!(err, ResolveError::SchemaConflict { .. }));
    }

    #[test]
    fn test_override_against_plain_node_is_unsupported() {
        let err = resolve_err(Override::new().with_literal("x", 1), Node::integer());
        assert!(matches!(err, ResolveError::UnsupportedOperand { .. }));
        assert!(!err.is_fallback_eligible());
    }

    #[test]
    fn test_override_union_merges_defaults() {
        let resolved = resolve_ok(
            Override::new().with_entry("a", Node::integer()).with_default(json!({"a": 1})),
            Override::new().with_entry("b", Node::string()).with_default(json!({"b": "x"})),
        );
        let patch = resolved.as_override().unwrap();
        assert_eq!(patch.keys().collect::<Vec<_>>(), vec!["a", "b"]);
        assert_eq!(patch.default, Some(json!({"a": 1, "b": "x"})));
    }

    #[test]
    fn test_map_override_folds_entry_schemas() {
        let resolved = resolve_ok(
            Node::map(Node::number()),
            Override::new().with_entry("a", Node::integer()),
        );
        assert_eq!(resolved, Schema::Node(Node::map(Node::integer())));
    }

    #[test]
    fn test_struct_upgrade_seeds_keys_from_map_default() {
        let map = Node::map(Node::integer()).with_default(json!({"seed": 4}));
        let resolved = resolve_ok(map, Override::new().with_literal("a", 1));
        let record = resolved.as_override().unwrap();
        assert_eq!(record.get("seed"), Some(&Schema::Node(Node::integer())));
        assert_eq!(record.get("a"), Some(&Schema::literal(1)));
        assert_eq!(record.default, Some(json!({"seed": 4, "a": 1})));
    }

    #[test]
    fn test_struct_upgrade_can_be_disabled() {
        let catalog = Catalog::builtin();
        let resolver = Resolver::new(&catalog).with_options(ResolveOptions {
            struct_upgrade: false,
            ..ResolveOptions::default()
        });
        let err = resolver
            .resolve_schemas(
                &Node::map(Node::integer()).into(),
                &Override::new().with_literal("a", 1).into(),
            )
            .unwrap_err();
        assert_eq!(err.path(), vec!["a"]);
    }

    #[test]
    fn test_override_map_keeps_element_default() {
        let element = Node::number().with_default(9);
        let resolved = resolve_ok(
            Override::new().with_entry("a", Node::integer().with_default(2)),
            Node::map(element),
        );
        let map = resolved.as_node().unwrap();
        assert_eq!(
            map.schema_field(VALUE_FIELD),
            Some(&Schema::Node(Node::integer().with_default(9)))
        );
        assert_eq!(map.default, json!({"a": 2}));
    }

    #[test]
    fn test_tree_map_resolves_leaf() {
        let resolved = resolve_ok(
            Node::tree(Node::number()),
            Node::map(Node::integer()).with_default(json!({"k": 1})),
        );
        assert_eq!(
            resolved,
            Schema::Node(Node::tree(Node::integer()).with_default(json!({"k": 1})))
        );
    }

    #[test]
    fn test_tree_subtype_wins() {
        let wires = Node::new(WIRES).with_schema(LEAF_FIELD, Node::integer());
        let resolved = resolve_ok(Node::tree(Node::number()), wires.clone());
        assert_eq!(resolved, Schema::Node(wires));
    }

    #[test]
    fn test_tree_against_unfit_node_fails_at_leaf() {
        let err = resolve_err(Node::tree(Node::integer()), Node::string());
        assert_eq!(err.path(), vec![LEAF_FIELD]);
        assert!(matches!(err.root_cause(), ResolveError::SchemaConflict { .. }));
    }

    #[test]
    fn test_tree_against_fitting_node_updates_leaf_only() {
        let resolved = resolve_ok(
            Node::tree(Node::number()).with_default(json!({"a": 1})),
            Node::integer().with_default(5),
        );
        assert_eq!(
            resolved,
            Schema::Node(
                Node::tree(Node::integer().with_default(5)).with_default(json!({"a": 1}))
            )
        );
    }

    #[test]
    fn test_tree_override_folds_into_map_leaf() {
        let resolved = resolve_ok(
            Node::tree(Node::map(Node::number())),
            Override::new().with_entry("x", Override::new().with_entry("a", Node::integer())),
        );
        let tree = resolved.as_node().unwrap();
        assert_eq!(
            tree.schema_field(LEAF_FIELD),
            Some(&Schema::Node(Node::map(Node::integer()).with_default(json!({"a": 0}))))
        );
        assert_eq!(tree.default, json!({"x": {"a": 0}}));
    }

    #[test]
    fn test_tree_override_refines_leaf_with_schema_entries() {
        let resolved = resolve_ok(
            Node::tree(Node::number()),
            Override::new().with_entry("x", Node::integer()),
        );
        let tree = resolved.as_node().unwrap();
        assert_eq!(tree.schema_field(LEAF_FIELD), Some(&Schema::Node(Node::integer())));
        assert_eq!(tree.default, json!({"x": 0}));
    }

    #[test]
    fn test_tree_nesting_can_be_disabled() {
        let catalog = Catalog::builtin();
        let resolver = Resolver::new(&catalog).with_options(ResolveOptions {
            nest_tree_entries: false,
            ..ResolveOptions::default()
        });
        let err = resolver
            .resolve_schemas(
                &Node::tree(Node::integer()).into(),
                &Override::new().with_literal("x", 5).into(),
            )
            .unwrap_err();
        assert_eq!(err.path(), vec!["x"]);
    }

    #[test]
    fn test_unknown_variant_is_not_absorbed() {
        let err = resolve_err(
            Node::map(Node::integer()),
            Override::new().with_entry("a", Node::new("ghost")),
        );
        assert!(matches!(
            err.root_cause(),
            ResolveError::Catalog(CatalogError::UnknownVariant(_))
        ));
    }
}
