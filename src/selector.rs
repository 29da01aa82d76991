//! Generic selectable-item controller
//!
//! Packages and selection groups run the same machine: a record per item, a
//! confirmed set derived from those records, a solver fed with that set and
//! the dependency maps it returned last. [`Selector`] owns all four and is the
//! only place where the maps are replaced, so a mutation can never leave them
//! stale. The universe-specific controllers in `packages` and `groups` decide
//! *which* records change and then call back in here.

use std::collections::BTreeMap;
use std::fmt::Debug;

use crate::package::{ItemKey, PackageRecord, SelectionRecord, SingleSelect};
use crate::snapshot::Snapshot;
use crate::solver::{DependencyMaps, DependencySolver};

/// Per-item state the generic controller needs to understand
pub trait ItemRecord: Clone + Debug + PartialEq {
    fn single_select(&self) -> SingleSelect;

    fn set_single_select(&mut self, marker: SingleSelect);

    /// Key identifying this item to the solver
    fn key(&self, name: &str) -> ItemKey;

    /// Key to feed the solver, `None` when the item is not confirmed
    fn confirmed_key(&self, name: &str) -> Option<ItemKey>;
}

impl ItemRecord for PackageRecord {
    fn single_select(&self) -> SingleSelect {
        self.single_select
    }

    fn set_single_select(&mut self, marker: SingleSelect) {
        self.single_select = marker;
    }

    fn key(&self, name: &str) -> ItemKey {
        ItemKey::new(name, &self.version)
    }

    fn confirmed_key(&self, name: &str) -> Option<ItemKey> {
        if self.action.targets_catalog() {
            return Some(ItemKey::new(name, &self.version));
        }
        if self.is_kept() {
            let version = self.installed_version.as_deref().unwrap_or(&self.version);
            return Some(ItemKey::new(name, version));
        }
        None
    }
}

impl ItemRecord for SelectionRecord {
    fn single_select(&self) -> SingleSelect {
        self.single_select
    }

    fn set_single_select(&mut self, marker: SingleSelect) {
        self.single_select = marker;
    }

    fn key(&self, name: &str) -> ItemKey {
        ItemKey::unversioned(name)
    }

    fn confirmed_key(&self, name: &str) -> Option<ItemKey> {
        self.is_wanted().then(|| ItemKey::unversioned(name))
    }
}

/// Records, solver, derived maps and the checkpoint of one universe
#[derive(Debug, Clone)]
pub struct Selector<R, S> {
    records: BTreeMap<String, R>,
    solver: S,
    maps: DependencyMaps,
    snapshot: Option<Snapshot<R, S>>,
}

impl<R: ItemRecord, S: DependencySolver> Selector<R, S> {
    /// Create the controller and run an initial full solve
    pub fn new(records: BTreeMap<String, R>, solver: S) -> Self {
        let mut selector = Self {
            records,
            solver,
            maps: DependencyMaps::default(),
            snapshot: None,
        };
        selector.solve();
        selector
    }

    pub fn record(&self, name: &str) -> Option<&R> {
        self.records.get(name)
    }

    /// Mutable access to a record
    ///
    /// The caller must follow up with [`Selector::sync`], [`Selector::solve`]
    /// or [`Selector::solve_with`] before returning to its own caller.
    pub fn record_mut(&mut self, name: &str) -> Option<&mut R> {
        self.records.get_mut(name)
    }

    pub fn records(&self) -> &BTreeMap<String, R> {
        &self.records
    }

    pub fn records_mut(&mut self) -> impl Iterator<Item = (&String, &mut R)> {
        self.records.iter_mut()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.records.contains_key(name)
    }

    pub fn maps(&self) -> &DependencyMaps {
        &self.maps
    }

    pub fn solver(&self) -> &S {
        &self.solver
    }

    /// The confirmed set implied by the current records
    pub fn confirmed_list(&self) -> Vec<ItemKey> {
        self.records
            .iter()
            .filter_map(|(name, record)| record.confirmed_key(name))
            .collect()
    }

    /// Bring one item's solver membership in line with its record
    pub fn sync(&mut self, name: &str) {
        let Some(record) = self.records.get(name) else {
            return;
        };
        self.maps = match record.confirmed_key(name) {
            Some(key) => self.solver.add_item(key),
            None => self.solver.remove_item(&record.key(name)),
        };
    }

    /// Incrementally add every listed item whose record is confirmed
    pub fn add_list(&mut self, names: &[String]) {
        let keys: Vec<ItemKey> = names
            .iter()
            .filter_map(|name| self.records.get(name)?.confirmed_key(name))
            .collect();
        self.maps = self.solver.add_item_list(keys);
    }

    /// Full recomputation from the records
    pub fn solve(&mut self) {
        let list = self.confirmed_list();
        self.solve_with(list);
    }

    /// Full recomputation from an explicit confirmed set
    pub fn solve_with(&mut self, confirmed: Vec<ItemKey>) {
        tracing::debug!("Solving dependencies for {} items", confirmed.len());
        self.maps = self.solver.solve_dependencies(confirmed);
    }

    pub fn ignore_conflict(&mut self, a: &str, b: &str) {
        self.solver.ignore_conflict(a, b);
        self.maps = self.solver.resolve();
    }

    pub fn ignore_unsolved(&mut self, tag: &str) {
        self.solver.ignore_unsolved_requirement(tag);
        self.maps = self.solver.resolve();
    }

    pub fn ignore_additional(&mut self, tag: &str) {
        self.solver.ignore_additional(tag);
        self.maps = self.solver.resolve();
    }

    /// Items that would lose a satisfied requirement without `name`
    pub fn breaking(&self, name: &str) -> Vec<ItemKey> {
        match self.records.get(name) {
            Some(record) => self.solver.breaking_items(&record.key(name)),
            None => Vec::new(),
        }
    }

    pub fn is_additional(&self, name: &str) -> bool {
        self.maps.is_additional(name)
    }

    /// Replace any held checkpoint with the current state
    pub fn save_state(&mut self) {
        self.snapshot = Some(Snapshot::capture(&self.records, &self.solver, &self.maps));
    }

    /// Reinstate the held checkpoint; false when there is none
    pub fn restore_state(&mut self) -> bool {
        let Some(snapshot) = &self.snapshot else {
            return false;
        };
        let (records, solver, maps) = snapshot.parts();
        self.records = records;
        self.solver = solver;
        self.maps = maps;
        true
    }

    /// Drop the held checkpoint; false when there is none
    pub fn discard_state(&mut self) -> bool {
        self.snapshot.take().is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::package::Action;
    use crate::solver::{GraphSolver, SolverItem};

    fn selector() -> Selector<PackageRecord, GraphSolver> {
        let mut solver = GraphSolver::new();
        let mut b = SolverItem::new(ItemKey::new("b", "2.0"));
        b.requires = vec!["c".to_string()];
        solver.add_universe_item(SolverItem::new(ItemKey::new("a", "1.1")));
        solver.add_universe_item(b);
        solver.add_universe_item(SolverItem::new(ItemKey::new("c", "3.0")));

        let mut records = BTreeMap::new();
        records.insert("a".to_string(), PackageRecord::available("1.1", Some("1.0")));
        records.insert("b".to_string(), PackageRecord::available("2.0", None));
        records.insert("c".to_string(), PackageRecord::available("3.0", None));
        Selector::new(records, solver)
    }

    #[test]
    fn test_confirmed_list_uses_installed_version() {
        let selector = selector();
        assert_eq!(selector.confirmed_list(), vec![ItemKey::new("a", "1.0")]);
    }

    #[test]
    fn test_sync_adds_and_removes() {
        let mut selector = selector();

        selector.record_mut("b").unwrap().action = Action::Install;
        selector.sync("b");
        assert!(selector.is_additional("c"));

        selector.record_mut("b").unwrap().action = Action::None;
        selector.sync("b");
        assert!(!selector.is_additional("c"));
        assert_eq!(selector.solver().confirmed(), selector.confirmed_list());
    }

    #[test]
    fn test_restore_without_save_is_noop() {
        let mut selector = selector();
        assert!(!selector.restore_state());
        assert!(!selector.discard_state());

        selector.save_state();
        selector.record_mut("b").unwrap().action = Action::Install;
        selector.sync("b");
        assert!(selector.restore_state());
        assert_eq!(selector.record("b").unwrap().action, Action::None);
        assert!(selector.maps().additional.is_empty());
        assert!(selector.discard_state());
        assert!(!selector.restore_state());
    }
}
