//! Schema resolution for hierarchically-typed data schemas.
//!
//! This crate reconciles two descriptions of a schema, a `current` base and
//! an `update` override, into one schema consistent with both:
//!
//! - [`Schema`]: one operand, either a typed [`Node`], an untyped [`Override`]
//!   patch, or a literal state value.
//! - [`Catalog`]: the registry of schema variants with their declared fields,
//!   structural subtype relation, shape, construction.
//! - [`Resolver`]: the resolution engine, configured by
//!   [`ResolveOptions`].
//! - [`StateOps`]: default and merge of state values, implemented by
//!   [`Catalog`].
//!
//! Resolution never mutates its inputs; every step builds new values, so a
//! catalog and its schemas can be shared across threads and reused.
//!
//! # Example
//!
//! ```
//! use schema_resolve_core::*;
//! use serde_json::json;
//!
//! let catalog = Catalog::builtin();
//! let resolver = Resolver::new(&catalog);
//!
//! // A map of integers meets sparse data it cannot describe: the map is
//! // upgraded to a record with one field per key.
//! let counts: Schema = Node::map(Node::integer()).into();
//! let data: Schema = Override::new().with_literal("a", 1).with_literal("b", 2).into();
//!
//! let record = resolver.resolve_schemas(&counts, &data).unwrap();
//! let record = record.as_override().unwrap();
//! assert_eq!(record.keys().collect::<Vec<_>>(), vec!["a", "b"]);
//! assert_eq!(record.default, Some(json!({"a": 1, "b": 2})));
//! ```

pub mod catalog;
mod error;
mod notation;
mod resolve;
mod state;
mod types;

pub use catalog::{Catalog, DefaultRule, FieldDescriptor, FieldKind, Shape, Variant, VariantDescriptor};
pub use error::{CatalogError, NotationError, ResolveError, Result};
pub use resolve::{ResolveOptions, Resolver, resolve};
pub use state::StateOps;
pub use types::*;
