//! Read-only package catalog
//!
//! The catalog describes everything the installation media offers: the
//! packages with their dependency tags, and the selection groups that bundle
//! them. It is loaded once per environment and never mutated afterwards.
//!
//! ## Catalog Format
//!
//! ```toml
//! [[packages]]
//! name = "bash"
//! version = "5.2-1"
//! summary = "The GNU Bourne Again shell"
//! size_kb = 1206
//! medium = 1
//! requires = ["glibc"]
//! provides = ["sh"]
//!
//! [[selections]]
//! name = "Minimal"
//! kind = "baseconf"
//! suggests = ["Tools"]
//! packages = ["bash", "vim:vim-small"]
//! ```
//!
//! Lookups that miss return `None` or an empty list. A missing catalog entry
//! means "no metadata available", never an error.

use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{Result, SelectError};

/// Package entry in the catalog
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CatalogPackage {
    /// Package name
    pub name: String,
    /// Package version
    pub version: String,
    /// One-line description
    #[serde(default)]
    pub summary: String,
    /// Installed size in KiB
    #[serde(default)]
    pub size_kb: u64,
    /// Installation medium number
    #[serde(default = "default_medium")]
    pub medium: u32,
    /// Part of the base system
    #[serde(default)]
    pub base: bool,
    /// Source package, installed only with source installation enabled
    #[serde(default)]
    pub source: bool,
    /// Required tags
    #[serde(default)]
    pub requires: Vec<String>,
    /// Additional tags this package provides
    #[serde(default)]
    pub provides: Vec<String>,
    /// Tags this package conflicts with
    #[serde(default)]
    pub conflicts: Vec<String>,
    /// Tags this package obsoletes
    #[serde(default)]
    pub obsoletes: Vec<String>,
}

fn default_medium() -> u32 {
    1
}

fn default_true() -> bool {
    true
}

/// Selection group entry in the catalog
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CatalogSelection {
    /// Group name
    pub name: String,
    /// Group kind (`baseconf` for base configurations)
    #[serde(default)]
    pub kind: String,
    /// Shown in the selection dialog
    #[serde(default = "default_true")]
    pub visible: bool,
    /// Human-readable description
    #[serde(default)]
    pub summary: String,
    /// Required tags
    #[serde(default)]
    pub requires: Vec<String>,
    /// Additional tags this group provides
    #[serde(default)]
    pub provides: Vec<String>,
    /// Tags this group conflicts with
    #[serde(default)]
    pub conflicts: Vec<String>,
    /// Groups recommended alongside this one
    #[serde(default)]
    pub suggests: Vec<String>,
    /// Packages of this group, `old:new` replaces `old` by `new`
    #[serde(default)]
    pub packages: Vec<String>,
}

/// On-disk layout of a catalog file
#[derive(Debug, Default, Serialize, Deserialize)]
struct CatalogFile {
    #[serde(default)]
    packages: Vec<CatalogPackage>,
    #[serde(default)]
    selections: Vec<CatalogSelection>,
}

/// Catalog lookup service
#[derive(Debug, Clone, Default)]
pub struct Catalog {
    packages: BTreeMap<String, CatalogPackage>,
    selections: BTreeMap<String, CatalogSelection>,
}

impl Catalog {
    /// Build a catalog from entries; later duplicates replace earlier ones
    pub fn new(packages: Vec<CatalogPackage>, selections: Vec<CatalogSelection>) -> Self {
        Self {
            packages: packages.into_iter().map(|p| (p.name.clone(), p)).collect(),
            selections: selections.into_iter().map(|s| (s.name.clone(), s)).collect(),
        }
    }

    /// Parse a catalog from TOML text
    pub fn from_toml(content: &str) -> Result<Self> {
        let file: CatalogFile =
            toml::from_str(content).map_err(|e| SelectError::Catalog(e.to_string()))?;
        Ok(Self::new(file.packages, file.selections))
    }

    /// Load a catalog file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            SelectError::Catalog(format!("Failed to read {}: {}", path.display(), e))
        })?;
        let catalog = Self::from_toml(&content)?;
        tracing::info!(
            "Loaded catalog {}: {} packages, {} selections",
            path.display(),
            catalog.packages.len(),
            catalog.selections.len()
        );
        Ok(catalog)
    }

    pub fn package(&self, name: &str) -> Option<&CatalogPackage> {
        self.packages.get(name)
    }

    pub fn selection(&self, name: &str) -> Option<&CatalogSelection> {
        self.selections.get(name)
    }

    /// All packages, ordered by name
    pub fn packages(&self) -> impl Iterator<Item = &CatalogPackage> {
        self.packages.values()
    }

    /// All selection groups, ordered by name
    pub fn selections(&self) -> impl Iterator<Item = &CatalogSelection> {
        self.selections.values()
    }

    /// Catalog version of a package, empty when unknown
    pub fn version(&self, name: &str) -> String {
        self.packages
            .get(name)
            .map(|p| p.version.clone())
            .unwrap_or_default()
    }

    /// Groups suggested by a selection group
    pub fn suggests(&self, selection: &str) -> &[String] {
        self.selections
            .get(selection)
            .map(|s| s.suggests.as_slice())
            .unwrap_or(&[])
    }

    /// Names of all source packages
    pub fn source_packages(&self) -> BTreeSet<&str> {
        self.packages
            .values()
            .filter(|p| p.source)
            .map(|p| p.name.as_str())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CATALOG: &str = r#"
        [[packages]]
        name = "bash"
        version = "5.2-1"
        summary = "The GNU Bourne Again shell"
        requires = ["glibc"]
        provides = ["sh"]

        [[packages]]
        name = "glibc"
        version = "2.39-1"

        [[packages]]
        name = "bash-src"
        version = "5.2-1"
        source = true

        [[selections]]
        name = "Minimal"
        kind = "baseconf"
        suggests = ["Tools"]
        packages = ["bash", "glibc"]

        [[selections]]
        name = "Tools"
        visible = false
    "#;

    #[test]
    fn test_catalog_parse_and_lookup() {
        let catalog = Catalog::from_toml(CATALOG).unwrap();

        assert_eq!(catalog.packages().count(), 3);
        assert_eq!(catalog.version("bash"), "5.2-1");
        assert_eq!(catalog.version("zsh"), "");
        assert_eq!(catalog.package("bash").unwrap().medium, 1);
        assert_eq!(catalog.suggests("Minimal"), ["Tools".to_string()]);
        assert!(catalog.suggests("Unknown").is_empty());
        assert!(!catalog.selection("Tools").unwrap().visible);
        assert!(catalog.selection("Minimal").unwrap().visible);

        let sources = catalog.source_packages();
        assert_eq!(sources.len(), 1);
        assert!(sources.contains("bash-src"));
    }

    #[test]
    fn test_catalog_rejects_malformed_toml() {
        let err = Catalog::from_toml("[[packages]]\nname = 3").unwrap_err();
        assert!(matches!(err, SelectError::Catalog(_)));
    }
}
