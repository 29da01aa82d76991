//! Package selection controller
//!
//! Translates install/delete/update intents into [`PackageRecord`] changes.
//! Bulk `set_*_selection` calls rebuild the confirmed set and run a full
//! solve. Single-item calls only resynchronise the one item they touch.
//!
//! Every call that takes names applies all valid entries first and then
//! reports the rejected ones as `NotFound`/`MissingItems`.

use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use crate::catalog::Catalog;
use crate::database::InstalledPackage;
use crate::error::{Result, SelectError};
use crate::package::{Action, ItemKey, PackageRecord, SingleSelect};
use crate::selector::Selector;
use crate::solver::{DependencyMaps, DependencySolver};

/// Installed packages unknown to the catalog
pub fn foreign_packages(catalog: &Catalog, installed: &[InstalledPackage]) -> Vec<InstalledPackage> {
    installed
        .iter()
        .filter(|pkg| catalog.package(&pkg.name).is_none())
        .cloned()
        .collect()
}

fn missing(mut names: Vec<String>) -> Result<()> {
    match names.len() {
        0 => Ok(()),
        1 => Err(SelectError::NotFound(names.swap_remove(0))),
        _ => Err(SelectError::MissingItems(names)),
    }
}

/// Compare two version strings
///
/// Semantic versions compare by semver rules. Anything else is split into
/// numeric and alphabetic runs, numbers comparing numerically.
pub fn compare_versions(a: &str, b: &str) -> Ordering {
    if let (Ok(va), Ok(vb)) = (semver::Version::parse(a), semver::Version::parse(b)) {
        return va.cmp(&vb);
    }

    let segments = |s: &str| -> Vec<String> {
        let mut out: Vec<String> = Vec::new();
        let mut current = String::new();
        for c in s.chars() {
            if !c.is_ascii_alphanumeric() {
                if !current.is_empty() {
                    out.push(std::mem::take(&mut current));
                }
                continue;
            }
            let switch = current
                .chars()
                .last()
                .is_some_and(|last| last.is_ascii_digit() != c.is_ascii_digit());
            if switch {
                out.push(std::mem::take(&mut current));
            }
            current.push(c);
        }
        if !current.is_empty() {
            out.push(current);
        }
        out
    };

    let (sa, sb) = (segments(a), segments(b));
    for (x, y) in sa.iter().zip(sb.iter()) {
        let ord = match (x.parse::<u64>(), y.parse::<u64>()) {
            (Ok(nx), Ok(ny)) => nx.cmp(&ny),
            _ => x.cmp(y),
        };
        if ord != Ordering::Equal {
            return ord;
        }
    }
    sa.len().cmp(&sb.len())
}

/// Selection state of every package in the session
#[derive(Debug, Clone)]
pub struct PackageSelector<S> {
    catalog: Arc<Catalog>,
    core: Selector<PackageRecord, S>,
    install_sources: bool,
    saved_install_sources: Option<bool>,
}

impl<S: DependencySolver> PackageSelector<S> {
    /// One record per catalog package plus one per foreign package
    pub fn new(catalog: Arc<Catalog>, installed: &[InstalledPackage], solver: S) -> Self {
        let installed_versions: BTreeMap<&str, &str> = installed
            .iter()
            .map(|pkg| (pkg.name.as_str(), pkg.version.as_str()))
            .collect();

        let mut records: BTreeMap<String, PackageRecord> = catalog
            .packages()
            .map(|pkg| {
                let record = PackageRecord::available(
                    &pkg.version,
                    installed_versions.get(pkg.name.as_str()).copied(),
                );
                (pkg.name.clone(), record)
            })
            .collect();

        let foreign = foreign_packages(&catalog, installed);
        for pkg in &foreign {
            records.insert(pkg.name.clone(), PackageRecord::foreign(&pkg.version));
        }

        tracing::info!(
            "Initialized {} package records ({} installed, {} foreign)",
            records.len(),
            installed.len(),
            foreign.len()
        );

        Self {
            catalog,
            core: Selector::new(records, solver),
            install_sources: false,
            saved_install_sources: None,
        }
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    pub fn record(&self, name: &str) -> Option<&PackageRecord> {
        self.core.record(name)
    }

    pub fn records(&self) -> &BTreeMap<String, PackageRecord> {
        self.core.records()
    }

    pub fn maps(&self) -> &DependencyMaps {
        self.core.maps()
    }

    pub fn solver(&self) -> &S {
        self.core.solver()
    }

    /// The confirmed set a full solve would use right now
    pub fn confirmed_list(&self) -> Vec<ItemKey> {
        self.core.confirmed_list()
    }

    /// A catalog package that may carry an install or update action
    fn catalog_record_mut(&mut self, name: &str) -> Option<&mut PackageRecord> {
        self.core.record_mut(name).filter(|r| !r.foreign_package)
    }

    /// Replace the install set
    ///
    /// Without `keep_single` every action and every non-veto marker is
    /// cleared. With it, explicitly selected packages keep their install and
    /// every other install/update action is dropped. Listed packages carrying
    /// an install veto stay untouched.
    pub fn set_install_selection(&mut self, names: &[String], keep_single: bool) -> Result<()> {
        tracing::debug!(
            "set_install_selection: {} packages, keep_single={}",
            names.len(),
            keep_single
        );
        self.install_sources = false;

        for (_, record) in self.core.records_mut() {
            if keep_single {
                if record.single_select == SingleSelect::InstallSelected {
                    record.action = Action::Install;
                } else if record.action.targets_catalog() {
                    record.action = Action::None;
                }
            } else {
                record.action = Action::None;
                if !record.single_select.is_veto() {
                    record.single_select = SingleSelect::No;
                }
            }
        }

        let mut not_found = Vec::new();
        for name in names {
            match self.catalog_record_mut(name) {
                Some(record) if record.single_select == SingleSelect::InstallDeselected => {
                    tracing::debug!("{} was deselected, not selecting", name);
                }
                Some(record) => record.action = Action::Install,
                None => {
                    tracing::warn!("Package {} not found", name);
                    not_found.push(name.clone());
                }
            }
        }

        self.core.solve();
        missing(not_found)
    }

    /// Replace the delete set
    ///
    /// Only installed packages can be deleted. The targets are removed from
    /// the confirmed set by key before the full solve.
    pub fn set_delete_selection(&mut self, names: &[String]) -> Result<()> {
        tracing::debug!("set_delete_selection: {} packages", names.len());

        for (_, record) in self.core.records_mut() {
            if record.action == Action::Delete {
                record.action = Action::None;
            }
            if record.single_select == SingleSelect::DeleteSelected {
                record.single_select = SingleSelect::No;
            }
        }

        let mut confirmed = self.core.confirmed_list();
        let mut not_found = Vec::new();
        for name in names {
            match self.core.record_mut(name) {
                Some(record) if !record.is_installed => {
                    tracing::warn!("Package {} is not installed", name);
                    not_found.push(name.clone());
                }
                Some(record) if record.single_select == SingleSelect::DeleteDeselected => {
                    tracing::debug!("{} was kept explicitly, not deleting", name);
                }
                Some(record) => {
                    record.action = Action::Delete;
                    confirmed.retain(|key| key.name != *name);
                }
                None => {
                    tracing::warn!("Package {} not found", name);
                    not_found.push(name.clone());
                }
            }
        }

        self.core.solve_with(confirmed);
        missing(not_found)
    }

    /// Replace the update set
    pub fn set_update_selection(&mut self, names: &[String]) -> Result<()> {
        tracing::debug!("set_update_selection: {} packages", names.len());

        for (_, record) in self.core.records_mut() {
            if record.action == Action::Update {
                record.action = Action::None;
            }
            if record.single_select == SingleSelect::UpdateSelected {
                record.single_select = SingleSelect::No;
            }
        }

        let mut not_found = Vec::new();
        for name in names {
            match self.catalog_record_mut(name) {
                Some(record) if record.single_select == SingleSelect::UpdateDeselected => {
                    tracing::debug!("{} was deselected for update, skipping", name);
                }
                Some(record) => record.action = Action::Update,
                None => {
                    tracing::warn!("Package {} not found", name);
                    not_found.push(name.clone());
                }
            }
        }

        self.core.solve();
        missing(not_found)
    }

    /// Mark one package for installation
    ///
    /// `automatic` selections leave no sticky marker behind.
    pub fn select_install(&mut self, name: &str, automatic: bool) -> Result<()> {
        tracing::debug!("select_install: {} automatic={}", name, automatic);
        let Some(record) = self.catalog_record_mut(name) else {
            tracing::warn!("Package {} not found", name);
            return Err(SelectError::NotFound(name.to_string()));
        };
        record.action = Action::Install;
        if !automatic {
            record.single_select = SingleSelect::InstallSelected;
        }
        self.core.sync(name);
        Ok(())
    }

    /// Mark several packages for installation with one incremental solve
    pub fn select_install_list(&mut self, names: &[String], automatic: bool) -> Result<()> {
        tracing::debug!("select_install_list: {} packages", names.len());
        let mut selected = Vec::new();
        let mut not_found = Vec::new();
        for name in names {
            match self.catalog_record_mut(name) {
                Some(record) => {
                    record.action = Action::Install;
                    if !automatic {
                        record.single_select = SingleSelect::InstallSelected;
                    }
                    selected.push(name.clone());
                }
                None => {
                    tracing::warn!("Package {} not found", name);
                    not_found.push(name.clone());
                }
            }
        }
        self.core.add_list(&selected);
        missing(not_found)
    }

    pub fn select_update(&mut self, name: &str) -> Result<()> {
        tracing::debug!("select_update: {}", name);
        let Some(record) = self.catalog_record_mut(name) else {
            tracing::warn!("Package {} not found", name);
            return Err(SelectError::NotFound(name.to_string()));
        };
        record.action = Action::Update;
        record.single_select = SingleSelect::UpdateSelected;
        self.core.sync(name);
        Ok(())
    }

    pub fn select_update_list(&mut self, names: &[String]) -> Result<()> {
        tracing::debug!("select_update_list: {} packages", names.len());
        let mut selected = Vec::new();
        let mut not_found = Vec::new();
        for name in names {
            match self.catalog_record_mut(name) {
                Some(record) => {
                    record.action = Action::Update;
                    record.single_select = SingleSelect::UpdateSelected;
                    selected.push(name.clone());
                }
                None => {
                    tracing::warn!("Package {} not found", name);
                    not_found.push(name.clone());
                }
            }
        }
        self.core.add_list(&selected);
        missing(not_found)
    }

    /// Mark one installed package for deletion
    pub fn select_delete(&mut self, name: &str) -> Result<()> {
        tracing::debug!("select_delete: {}", name);
        let Some(record) = self.core.record_mut(name).filter(|r| r.is_installed) else {
            tracing::warn!("Package {} is not installed", name);
            return Err(SelectError::NotFound(name.to_string()));
        };
        record.action = Action::Delete;
        record.single_select = SingleSelect::DeleteSelected;
        self.core.sync(name);
        Ok(())
    }

    /// Drop a pending install and veto later bulk installs
    pub fn deselect_install(&mut self, name: &str) -> Result<()> {
        self.deselect(name, Action::Install, SingleSelect::InstallDeselected)
    }

    /// Keep an installed package and veto later bulk deletes
    pub fn deselect_delete(&mut self, name: &str) -> Result<()> {
        self.deselect(name, Action::Delete, SingleSelect::DeleteDeselected)
    }

    pub fn deselect_update(&mut self, name: &str) -> Result<()> {
        self.deselect(name, Action::Update, SingleSelect::UpdateDeselected)
    }

    fn deselect(&mut self, name: &str, action: Action, veto: SingleSelect) -> Result<()> {
        tracing::debug!("deselect {:?}: {}", action, name);
        let Some(record) = self.core.record_mut(name) else {
            tracing::warn!("Package {} not found", name);
            return Err(SelectError::NotFound(name.to_string()));
        };
        if record.action == action {
            record.action = Action::None;
        }
        record.single_select = veto;
        self.core.sync(name);
        Ok(())
    }

    pub fn ignore_conflict(&mut self, a: &str, b: &str) {
        tracing::debug!("Ignoring conflict {} <-> {}", a, b);
        self.core.ignore_conflict(a, b);
    }

    pub fn ignore_unsolved_requirement(&mut self, tag: &str) {
        tracing::debug!("Ignoring unsolved requirement {}", tag);
        self.core.ignore_unsolved(tag);
    }

    pub fn ignore_additional(&mut self, tag: &str) {
        tracing::debug!("Ignoring additional packages for {}", tag);
        self.core.ignore_additional(tag);
    }

    /// Packages that would lose a satisfied requirement if `name` went away
    pub fn breaking_packages(&self, name: &str) -> Vec<String> {
        self.core
            .breaking(name)
            .into_iter()
            .map(|key| key.name)
            .collect()
    }

    pub fn set_source_installation(&mut self, install: bool) {
        tracing::debug!("set_source_installation: {}", install);
        self.install_sources = install;
    }

    pub fn install_sources(&self) -> bool {
        self.install_sources
    }

    /// Clear every action, marker and the source flag
    pub fn reset(&mut self) {
        tracing::debug!("Resetting package selection");
        for (_, record) in self.core.records_mut() {
            record.action = Action::None;
            record.single_select = SingleSelect::No;
        }
        self.install_sources = false;
        self.core.solve();
    }

    /// Source package pulled in by the source flag
    pub fn is_source_selected(&self, name: &str, record: &PackageRecord) -> bool {
        self.install_sources
            && self.catalog.package(name).is_some_and(|p| p.source)
            && !matches!(
                record.single_select,
                SingleSelect::InstallDeselected
                    | SingleSelect::DeleteSelected
                    | SingleSelect::UpdateSelected
            )
    }

    /// One-letter status: `X` install, `d` delete, `u` update, `i` installed,
    /// `a` auto-added, empty otherwise
    pub fn package_status(&self, name: &str) -> &'static str {
        let Some(record) = self.core.record(name) else {
            return "";
        };
        match record.action {
            Action::Install => "X",
            Action::Delete => "d",
            Action::Update => "u",
            Action::None if record.is_installed => "i",
            Action::None if self.core.is_additional(name) => "a",
            Action::None if self.is_source_selected(name, record) => "X",
            Action::None => "",
        }
    }

    /// Everything that will be installed: selected, auto-added and source
    /// packages
    pub fn install_set(&self) -> Vec<String> {
        let mut set: BTreeSet<String> = self.names_with_action(Action::Install).into_iter().collect();
        if self.install_sources {
            for name in self.catalog.source_packages() {
                if self
                    .core
                    .record(name)
                    .is_some_and(|record| self.is_source_selected(name, record))
                {
                    set.insert(name.to_string());
                }
            }
        }
        for key in &self.core.maps().additional {
            if self.core.record(&key.name).is_some_and(|r| !r.is_installed) {
                set.insert(key.name.clone());
            }
        }
        set.into_iter().collect()
    }

    pub fn delete_set(&self) -> Vec<String> {
        self.names_with_action(Action::Delete)
    }

    pub fn update_set(&self) -> Vec<String> {
        self.names_with_action(Action::Update)
    }

    fn names_with_action(&self, action: Action) -> Vec<String> {
        self.core
            .records()
            .iter()
            .filter(|(_, record)| record.action == action)
            .map(|(name, _)| name.clone())
            .collect()
    }

    /// Any package carries an explicit single-item marker
    pub fn is_single_selected(&self) -> bool {
        self.core
            .records()
            .values()
            .any(|record| record.single_select != SingleSelect::No)
    }

    /// Anything at all is going to be installed
    pub fn is_install_selected(&self) -> bool {
        !self.install_set().is_empty()
    }

    /// Installed packages for which the catalog has a newer version
    pub fn update_candidates(&self) -> Vec<String> {
        self.core
            .records()
            .iter()
            .filter(|(_, record)| !record.foreign_package)
            .filter_map(|(name, record)| {
                let installed = record.installed_version.as_deref()?;
                (compare_versions(&record.version, installed) == Ordering::Greater)
                    .then(|| name.clone())
            })
            .collect()
    }

    pub fn save_state(&mut self) {
        tracing::debug!("Saving package state");
        self.core.save_state();
        self.saved_install_sources = Some(self.install_sources);
    }

    pub fn restore_state(&mut self) -> bool {
        if !self.core.restore_state() {
            return false;
        }
        tracing::debug!("Restored package state");
        if let Some(saved) = self.saved_install_sources {
            self.install_sources = saved;
        }
        true
    }

    pub fn discard_state(&mut self) -> bool {
        self.saved_install_sources = None;
        self.core.discard_state()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::CatalogPackage;
    use crate::solver::GraphSolver;

    fn pkg(name: &str, version: &str, requires: &[&str]) -> CatalogPackage {
        CatalogPackage {
            name: name.to_string(),
            version: version.to_string(),
            requires: requires.iter().map(|s| s.to_string()).collect(),
            ..CatalogPackage::default()
        }
    }

    fn selector() -> PackageSelector<GraphSolver> {
        let mut src = pkg("a-src", "1.0", &[]);
        src.source = true;
        let catalog = Arc::new(Catalog::new(
            vec![
                pkg("a", "1.1", &[]),
                pkg("b", "1.0", &["c"]),
                pkg("c", "1.0", &[]),
                src,
            ],
            vec![],
        ));
        let installed = vec![
            InstalledPackage::new("a", "1.0"),
            InstalledPackage::new("legacy", "0.3"),
        ];
        let solver = GraphSolver::for_packages(&catalog, &foreign_packages(&catalog, &installed));
        PackageSelector::new(catalog, &installed, solver)
    }

    fn names(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_foreign_package_is_tracked() {
        let selector = selector();
        let legacy = selector.record("legacy").unwrap();
        assert!(legacy.foreign_package);
        assert!(legacy.is_installed);
        assert!(selector
            .confirmed_list()
            .contains(&ItemKey::new("legacy", "0.3")));
        assert_eq!(selector.package_status("legacy"), "i");
    }

    #[test]
    fn test_select_install_unknown_package() {
        let mut selector = selector();
        let before = selector.maps().clone();
        let err = selector.select_install("zsh", false).unwrap_err();
        assert!(matches!(err, SelectError::NotFound(_)));
        assert_eq!(selector.maps(), &before);
        assert!(selector.select_install("legacy", false).is_err());
    }

    #[test]
    fn test_bulk_install_reports_missing_but_applies_rest() {
        let mut selector = selector();
        let err = selector
            .set_install_selection(&names(&["b", "nope", "gone"]), false)
            .unwrap_err();
        assert!(matches!(err, SelectError::MissingItems(ref m) if m.len() == 2));
        assert_eq!(selector.record("b").unwrap().action, Action::Install);
        assert!(selector.maps().is_additional("c"));
    }

    #[test]
    fn test_keep_single_overrides() {
        let mut selector = selector();
        selector.select_install("c", false).unwrap();
        selector.set_update_selection(&names(&["a"])).unwrap();

        selector.set_install_selection(&names(&["b"]), true).unwrap();
        assert_eq!(selector.record("c").unwrap().action, Action::Install);
        assert_eq!(selector.record("a").unwrap().action, Action::None);
        assert_eq!(selector.record("b").unwrap().action, Action::Install);

        selector.set_install_selection(&[], false).unwrap();
        assert_eq!(selector.record("c").unwrap().action, Action::None);
        assert_eq!(selector.record("c").unwrap().single_select, SingleSelect::No);
    }

    #[test]
    fn test_delete_requires_installed_package() {
        let mut selector = selector();
        assert!(selector.select_delete("b").is_err());
        assert_eq!(selector.record("b").unwrap().action, Action::None);

        selector.select_delete("a").unwrap();
        assert_eq!(selector.package_status("a"), "d");
        assert!(!selector.solver().confirmed().iter().any(|k| k.name == "a"));

        selector.deselect_delete("a").unwrap();
        assert_eq!(selector.record("a").unwrap().action, Action::None);
        assert!(selector.solver().confirmed().iter().any(|k| k.name == "a"));

        // The explicit keep survives a bulk delete
        selector.set_delete_selection(&names(&["a", "legacy"])).unwrap();
        assert_eq!(selector.record("a").unwrap().action, Action::None);
        assert_eq!(selector.record("legacy").unwrap().action, Action::Delete);
        assert!(!selector.confirmed_list().iter().any(|k| k.name == "legacy"));
    }

    #[test]
    fn test_deselect_update_resyncs_solver() {
        let mut selector = selector();
        selector.select_update("b").unwrap();
        assert!(selector.maps().is_additional("c"));

        selector.deselect_update("b").unwrap();
        assert_eq!(selector.record("b").unwrap().action, Action::None);
        assert!(!selector.maps().is_additional("c"));

        // Veto survives the bulk call
        selector.set_update_selection(&names(&["b"])).unwrap();
        assert_eq!(selector.record("b").unwrap().action, Action::None);
    }

    #[test]
    fn test_select_install_list() {
        let mut selector = selector();
        selector
            .select_install_list(&names(&["b", "c"]), true)
            .unwrap();
        assert_eq!(selector.install_set(), names(&["b", "c"]));
        assert!(!selector.is_single_selected());
        assert!(selector.maps().additional.is_empty());
    }

    #[test]
    fn test_source_installation() {
        let mut selector = selector();
        assert_eq!(selector.package_status("a-src"), "");
        selector.set_source_installation(true);
        assert_eq!(selector.package_status("a-src"), "X");
        assert_eq!(selector.install_set(), names(&["a-src"]));
        assert!(selector.is_install_selected());

        selector.deselect_install("a-src").unwrap();
        assert!(selector.install_set().is_empty());
        selector.select_install("a-src", false).unwrap();
        selector.set_source_installation(true);
        assert_eq!(selector.install_set(), names(&["a-src"]));

        // A bulk install resets the flag
        selector.set_install_selection(&[], false).unwrap();
        assert!(!selector.install_sources());
    }

    #[test]
    fn test_status_letters() {
        let mut selector = selector();
        selector.select_install("b", false).unwrap();
        assert_eq!(selector.package_status("a"), "i");
        assert_eq!(selector.package_status("b"), "X");
        assert_eq!(selector.package_status("c"), "a");
        assert_eq!(selector.package_status("missing"), "");
        assert_eq!(selector.install_set(), names(&["b", "c"]));
    }

    #[test]
    fn test_breaking_packages() {
        let mut selector = selector();
        selector.select_install("b", false).unwrap();
        assert_eq!(selector.breaking_packages("c"), names(&["b"]));
        assert!(selector.breaking_packages("b").is_empty());
    }

    #[test]
    fn test_update_candidates() {
        let selector = selector();
        assert_eq!(selector.update_candidates(), names(&["a"]));
    }

    #[test]
    fn test_missing_names_error_kind() {
        assert!(missing(Vec::new()).is_ok());
        assert!(matches!(
            missing(names(&["zsh"])),
            Err(SelectError::NotFound(name)) if name == "zsh"
        ));
        assert!(matches!(
            missing(names(&["zsh", "fish"])),
            Err(SelectError::MissingItems(list)) if list == names(&["zsh", "fish"])
        ));
    }

    #[test]
    fn test_compare_versions() {
        assert_eq!(compare_versions("1.2.3", "1.10.0"), Ordering::Less);
        assert_eq!(compare_versions("5.2-1", "5.2-10"), Ordering::Less);
        assert_eq!(compare_versions("2.39-1", "2.4-1"), Ordering::Greater);
        assert_eq!(compare_versions("1.0", "1.0"), Ordering::Equal);
        assert_eq!(compare_versions("1.0", "1.0.1"), Ordering::Less);
    }

    #[test]
    fn test_state_round_trip_includes_source_flag() {
        let mut selector = selector();
        selector.save_state();
        selector.set_source_installation(true);
        selector.select_install("b", false).unwrap();
        selector.ignore_conflict("a", "b");

        assert!(selector.restore_state());
        assert!(!selector.install_sources());
        assert_eq!(selector.record("b").unwrap().action, Action::None);
        assert!(selector.maps().additional.is_empty());
        assert!(selector.discard_state());
        assert!(!selector.restore_state());
    }

    #[test]
    fn test_reset_clears_vetoes() {
        let mut selector = selector();
        selector.deselect_install("b").unwrap();
        selector.set_install_selection(&names(&["b"]), false).unwrap();
        assert_eq!(selector.record("b").unwrap().action, Action::None);

        selector.reset();
        assert_eq!(selector.record("b").unwrap().single_select, SingleSelect::No);
        selector.set_install_selection(&names(&["b"]), false).unwrap();
        assert_eq!(selector.record("b").unwrap().action, Action::Install);
    }
}
