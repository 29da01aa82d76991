//! Dependency solver contract
//!
//! The selection controllers never look inside a solver. They feed it a
//! confirmed set, either incrementally or as a full list, and replace their
//! [`DependencyMaps`] wholesale with whatever comes back.

use std::collections::BTreeMap;

use crate::package::ItemKey;

mod graph;

pub use graph::{GraphSolver, SolverItem};

/// One obsolete relationship found by the solver
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObsoleteEntry {
    /// The obsoleting item
    pub obsoletes: ItemKey,
    /// Items that depend on the obsoleting item
    pub obsoletes_dependents: Vec<ItemKey>,
    /// The obsoleted item
    pub obsoleted: ItemKey,
    /// Items that depend on the obsoleted item
    pub obsoleted_dependents: Vec<ItemKey>,
}

/// The four derived outputs of a solver run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DependencyMaps {
    /// Items added automatically to satisfy requirements
    pub additional: Vec<ItemKey>,
    /// Requirement tag to the candidates the user must choose from
    pub unsolved: BTreeMap<String, Vec<ItemKey>>,
    /// Item to the items it conflicts with
    pub conflicts: BTreeMap<ItemKey, Vec<ItemKey>>,
    /// Obsolete relationships
    pub obsoletes: Vec<ObsoleteEntry>,
}

impl DependencyMaps {
    pub fn is_additional(&self, name: &str) -> bool {
        self.additional.iter().any(|k| k.name == name)
    }

    /// No open requirement, conflict or obsolete finding
    pub fn is_clean(&self) -> bool {
        self.unsolved.is_empty() && self.conflicts.is_empty() && self.obsoletes.is_empty()
    }
}

/// Operations the selection core needs from a dependency solver
///
/// Every mutating call returns the freshly computed maps for the resulting
/// confirmed set. Implementations must be deterministic for a given confirmed
/// set and ignore-directive set, and `Clone` must be a full deep copy.
pub trait DependencySolver: Clone {
    /// Add one item to the confirmed set; a no-op if it is already present
    fn add_item(&mut self, key: ItemKey) -> DependencyMaps;

    /// Remove one item from the confirmed set; a no-op if it is absent
    fn remove_item(&mut self, key: &ItemKey) -> DependencyMaps;

    /// Add several items to the confirmed set
    fn add_item_list(&mut self, keys: Vec<ItemKey>) -> DependencyMaps;

    /// Replace the confirmed set and recompute from scratch
    fn solve_dependencies(&mut self, confirmed: Vec<ItemKey>) -> DependencyMaps;

    /// Recompute from scratch over the unchanged confirmed set
    fn resolve(&mut self) -> DependencyMaps;

    /// Never report a conflict between these two items again
    fn ignore_conflict(&mut self, a: &str, b: &str);

    /// Never report this requirement tag as unsolved again
    fn ignore_unsolved_requirement(&mut self, tag: &str);

    /// Never add an item automatically for this requirement tag again
    fn ignore_additional(&mut self, tag: &str);

    /// Confirmed or added items that would lose a satisfied requirement if
    /// `key` were removed
    fn breaking_items(&self, key: &ItemKey) -> Vec<ItemKey>;

    /// The current confirmed set
    fn confirmed(&self) -> Vec<ItemKey>;
}
