//! Resolver configuration loaded from YAML.
//!
//! Controls the fallback switches of the resolver and registers extra
//! schema variants on top of the built-in catalog.
//!
//! # Example YAML
//!
//! ```yaml
//! options:
//!   struct_upgrade: true
//!   nest_tree_entries: false
//! variants:
//!   - name: counter
//!     parent: integer
//!   - name: labelled
//!     fields:
//!       - { name: _label, kind: param }
//! ```

use std::io::{BufReader, BufWriter};
use std::path::Path;

use schema_resolve_core::{Catalog, CatalogError, ResolveOptions, VariantDescriptor};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Config file picked up from the working directory when `--config` is absent.
pub const DEFAULT_CONFIG_FILE: &str = ".schema-resolve.yml";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("invalid variant: {0}")]
    Catalog(#[from] CatalogError),
}

/// Top-level resolver configuration.
///
/// Every section is optional; an empty document yields the defaults.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResolveConfig {
    /// Fallback switches handed to the resolver.
    pub options: ResolveOptions,
    /// Variants registered after the built-in ones, in order.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub variants: Vec<VariantDescriptor>,
}

impl ResolveConfig {
    /// Loads configuration from a YAML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let file = std::fs::File::open(path)?;
        let reader = BufReader::new(file);
        let config = serde_yaml::from_reader(reader)?;
        Ok(config)
    }

    /// Saves the configuration as YAML.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), ConfigError> {
        let file = std::fs::File::create(path)?;
        let writer = BufWriter::new(file);
        serde_yaml::to_writer(writer, self)?;
        Ok(())
    }

    /// Builds the built-in catalog extended with the configured variants.
    ///
    /// # Errors
    ///
    /// Fails on the first variant the catalog refuses, e.g. an unknown
    /// parent or a name that is already taken.
    pub fn catalog(&self) -> Result<Catalog, ConfigError> {
        let mut catalog = Catalog::builtin();
        for descriptor in &self.variants {
            catalog.register(descriptor.clone())?;
        }
        Ok(catalog)
    }
}

#[cfg(test)]
mod tests {
    use schema_resolve_core::{FieldKind, Shape};

    use super::*;

    fn sample_yaml() -> &'static str {
        r#"
options:
  struct_upgrade: false
  nest_tree_entries: true
variants:
  - name: counter
    parent: integer
  - name: labelled
    fields:
      - name: _label
        kind: param
  - name: forest
    parent: tree
"#
    }

    #[test]
    fn test_deserialize_complete() {
        let config: ResolveConfig = serde_yaml::from_str(sample_yaml()).unwrap();
        assert!(!config.options.struct_upgrade);
        assert!(config.options.nest_tree_entries);
        assert_eq!(config.variants.len(), 3);
        assert_eq!(config.variants[0].parent.as_deref(), Some("integer"));
        assert_eq!(config.variants[1].fields[0].kind, FieldKind::Param);
    }

    #[test]
    fn test_deserialize_minimal() {
        let config: ResolveConfig = serde_yaml::from_str("{}").unwrap();
        assert_eq!(config, ResolveConfig::default());
        assert!(config.options.struct_upgrade);
        assert!(config.options.nest_tree_entries);

        let partial: ResolveConfig =
            serde_yaml::from_str("options:\n  nest_tree_entries: false\n").unwrap();
        assert!(partial.options.struct_upgrade);
        assert!(!partial.options.nest_tree_entries);
    }

    #[test]
    fn test_catalog_registers_configured_variants() {
        let config: ResolveConfig = serde_yaml::from_str(sample_yaml()).unwrap();
        let catalog = config.catalog().unwrap();
        assert!(catalog.is_subtype("counter", "number"));
        assert!(catalog.declares("labelled", "_label"));
        assert_eq!(catalog.shape("forest").unwrap(), Shape::Tree);
    }

    #[test]
    fn test_catalog_rejects_unknown_parent() {
        let config: ResolveConfig =
            serde_yaml::from_str("variants:\n  - name: orphan\n    parent: ghost\n").unwrap();
        assert!(matches!(
            config.catalog(),
            Err(ConfigError::Catalog(CatalogError::UnknownParent { .. }))
        ));
    }

    #[test]
    fn test_save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(DEFAULT_CONFIG_FILE);
        let config: ResolveConfig = serde_yaml::from_str(sample_yaml()).unwrap();

        config.save(&path).unwrap();
        assert_eq!(ResolveConfig::load(&path).unwrap(), config);
    }

    #[test]
    fn test_load_missing_file_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            ResolveConfig::load(dir.path().join("absent.yml")),
            Err(ConfigError::Io(_))
        ));
    }
}
