//! Error types for catalog, notation and resolution failures.
//!
//! Resolution errors accumulate context as they bubble up: every failed
//! field or key wraps the underlying cause in a
//! [`FieldResolution`](ResolveError::FieldResolution), so the caller can
//! recover the full path to the failure with [`ResolveError::path`].

use serde_json::Value;
use thiserror::Error;

use crate::types::{FieldValue, Schema};

/// Variant registry failures.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CatalogError {
    /// No variant with this name is registered.
    #[error("unknown schema variant: {0}")]
    UnknownVariant(String),
    /// A variant with this name is already registered.
    #[error("duplicate schema variant: {0}")]
    DuplicateVariant(String),
    /// The declared parent is not registered.
    #[error("variant `{variant}` derives from unknown parent `{parent}`")]
    UnknownParent { variant: String, parent: String },
    /// A declared field name is already used by the variant or an ancestor.
    #[error("variant `{variant}` redeclares field `{field}`")]
    FieldClash { variant: String, field: String },
    /// A node lacks a field its variant declares.
    #[error("variant `{variant}` is missing field `{field}`")]
    MissingField { variant: String, field: String },
    /// A node carries a field its variant does not declare.
    #[error("variant `{variant}` does not declare field `{field}`")]
    UndeclaredField { variant: String, field: String },
    /// A field value does not match the declared field kind.
    #[error("field `{field}` of variant `{variant}` has the wrong kind")]
    FieldKindMismatch { variant: String, field: String },
}

/// Resolution failures.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ResolveError {
    /// Neither operand is a structural subtype of the other.
    #[error("cannot resolve {} against {}", .current.describe(), .update.describe())]
    SchemaConflict {
        current: Box<FieldValue>,
        update: Box<FieldValue>,
    },

    /// A declared field or mapping key failed to resolve.
    #[error("cannot resolve `{segment}`: {source}")]
    FieldResolution {
        segment: String,
        current: Option<Box<FieldValue>>,
        update: Option<Box<FieldValue>>,
        source: Box<ResolveError>,
    },

    /// Neither operand is something this resolver can reconcile.
    #[error("unsupported operands: {} and {}", .current.describe(), .update.describe())]
    UnsupportedOperand {
        current: Box<Schema>,
        update: Box<Schema>,
    },

    /// A resolved result could not carry a default state.
    #[error("cannot attach default {state} to {}", .schema.describe())]
    UnattachableDefault { schema: Box<Schema>, state: Value },

    /// The catalog rejected a variant lookup or construction.
    #[error(transparent)]
    Catalog(#[from] CatalogError),
}

impl ResolveError {
    pub(crate) fn conflict(current: &Schema, update: &Schema) -> Self {
        Self::field_conflict(
            &FieldValue::Schema(current.clone()),
            &FieldValue::Schema(update.clone()),
        )
    }

    pub(crate) fn field_conflict(current: &FieldValue, update: &FieldValue) -> Self {
        ResolveError::SchemaConflict {
            current: Box::new(current.clone()),
            update: Box::new(update.clone()),
        }
    }

    pub(crate) fn unsupported(current: &Schema, update: &Schema) -> Self {
        ResolveError::UnsupportedOperand {
            current: Box::new(current.clone()),
            update: Box::new(update.clone()),
        }
    }

    /// Wraps `self` as the failure of field `segment`.
    pub(crate) fn in_field(
        self,
        segment: impl Into<String>,
        current: Option<&FieldValue>,
        update: Option<&FieldValue>,
    ) -> Self {
        ResolveError::FieldResolution {
            segment: segment.into(),
            current: current.map(|v| Box::new(v.clone())),
            update: update.map(|v| Box::new(v.clone())),
            source: Box::new(self),
        }
    }

    /// Wraps `self` as the failure of mapping key `key`.
    pub(crate) fn in_key(
        self,
        key: impl Into<String>,
        current: Option<&Schema>,
        update: Option<&Schema>,
    ) -> Self {
        ResolveError::FieldResolution {
            segment: key.into(),
            current: current.map(|s| Box::new(FieldValue::Schema(s.clone()))),
            update: update.map(|s| Box::new(FieldValue::Schema(s.clone()))),
            source: Box::new(self),
        }
    }

    /// Field and key segments from the outermost failure inward.
    ///
    /// # Examples
    ///
    /// ```
    /// use schema_resolve_core::{Catalog, Node, Override, Resolver};
    ///
    /// let catalog = Catalog::builtin();
    /// let current = Override::new().with_entry("p", Override::new().with_entry("q", Node::string()));
    /// let update = Override::new().with_entry("p", Override::new().with_entry("q", Node::boolean()));
    ///
    /// let err = Resolver::new(&catalog)
    ///     .resolve_schemas(&current.into(), &update.into())
    ///     .unwrap_err();
    /// assert_eq!(err.path(), vec!["p", "q"]);
    /// ```
    pub fn path(&self) -> Vec<&str> {
        let mut segments = Vec::new();
        let mut error = self;
        while let ResolveError::FieldResolution {
            segment, source, ..
        } = error
        {
            segments.push(segment.as_str());
            error = source;
        }
        segments
    }

    /// The innermost error beneath any field/key wrappers.
    pub fn root_cause(&self) -> &ResolveError {
        let mut error = self;
        while let ResolveError::FieldResolution { source, .. } = error {
            error = source;
        }
        error
    }

    /// Whether a fallback strategy may absorb this failure.
    ///
    /// Only structural conflicts qualify. Unsupported operands, catalog
    /// failures and internal inconsistencies always propagate.
    pub fn is_fallback_eligible(&self) -> bool {
        matches!(self.root_cause(), ResolveError::SchemaConflict { .. })
    }
}

/// Notation decoding failures.
#[derive(Debug, Error)]
pub enum NotationError {
    /// JSON parsing failure.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// The `_type` key is not a string.
    #[error("invalid `_type`: {0}")]
    InvalidType(Value),

    /// A field value has the wrong JSON shape for its declared kind.
    #[error("invalid value for field `{field}`: {reason}")]
    InvalidField { field: String, reason: String },

    /// The catalog rejected the decoded node.
    #[error(transparent)]
    Catalog(#[from] CatalogError),
}

/// Convenience alias for results with [`ResolveError`].
pub type Result<T> = std::result::Result<T, ResolveError>;
