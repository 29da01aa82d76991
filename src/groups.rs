//! Selection-group controller
//!
//! Groups only know the install family of transitions. What they add over
//! packages is suggestion tracking: `suggest` counts how many explicitly
//! selected groups currently recommend a group, and a group sitting at `No`
//! is pulled in as `InstallSuggested` while that count is positive.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use crate::catalog::Catalog;
use crate::error::{Result, SelectError};
use crate::package::{SelectionRecord, SingleSelect};
use crate::selector::Selector;
use crate::solver::{DependencyMaps, DependencySolver};

#[derive(Debug, Clone)]
pub struct GroupSelector<S> {
    catalog: Arc<Catalog>,
    core: Selector<SelectionRecord, S>,
}

impl<S: DependencySolver> GroupSelector<S> {
    pub fn new(catalog: Arc<Catalog>, solver: S) -> Self {
        let records: BTreeMap<String, SelectionRecord> = catalog
            .selections()
            .map(|sel| (sel.name.clone(), SelectionRecord::new(&sel.kind, sel.visible)))
            .collect();
        tracing::info!("Initialized {} selection records", records.len());

        Self {
            core: Selector::new(records, solver),
            catalog,
        }
    }

    pub fn record(&self, name: &str) -> Option<&SelectionRecord> {
        self.core.record(name)
    }

    pub fn records(&self) -> &BTreeMap<String, SelectionRecord> {
        self.core.records()
    }

    pub fn maps(&self) -> &DependencyMaps {
        self.core.maps()
    }

    pub fn solver(&self) -> &S {
        self.core.solver()
    }

    fn clear_records(&mut self) {
        for (_, record) in self.core.records_mut() {
            record.single_select = SingleSelect::No;
            record.suggest = 0;
        }
    }

    /// Clear every group marker and suggestion count, then solve the empty set
    pub fn reset(&mut self) {
        tracing::debug!("Resetting group selection");
        self.clear_records();
        self.core.solve();
    }

    /// Select a group explicitly
    ///
    /// With `reset` every group is cleared first. An empty `name` with
    /// `reset` only clears.
    pub fn select_install(&mut self, name: &str, reset: bool) -> Result<()> {
        tracing::debug!("select_sel_install: {:?} reset={}", name, reset);
        if reset {
            self.reset();
        }
        if name.is_empty() {
            return Ok(());
        }

        let Some(record) = self.core.record_mut(name) else {
            tracing::warn!("Selection {} not found", name);
            return Err(SelectError::NotFound(name.to_string()));
        };
        let already_selected = record.single_select == SingleSelect::InstallSelected;
        record.single_select = SingleSelect::InstallSelected;
        self.core.sync(name);

        if !already_selected {
            self.add_suggestions(name);
        }
        Ok(())
    }

    /// Deselect a group and veto it until it is selected again
    pub fn deselect_install(&mut self, name: &str) -> Result<()> {
        tracing::debug!("deselect_sel_install: {}", name);
        let Some(record) = self.core.record_mut(name) else {
            tracing::warn!("Selection {} not found", name);
            return Err(SelectError::NotFound(name.to_string()));
        };
        let was_selected = record.single_select == SingleSelect::InstallSelected;
        record.single_select = SingleSelect::InstallDeselected;
        self.core.sync(name);

        if was_selected {
            self.drop_suggestions(name);
        }
        Ok(())
    }

    fn suggestions_of(&self, name: &str) -> Vec<String> {
        self.catalog
            .suggests(name)
            .iter()
            .filter(|s| s.as_str() != name)
            .cloned()
            .collect()
    }

    fn add_suggestions(&mut self, name: &str) {
        for suggested in self.suggestions_of(name) {
            let Some(record) = self.core.record_mut(&suggested) else {
                tracing::warn!("Selection {} suggested by {} not found", suggested, name);
                continue;
            };
            record.suggest += 1;
            if record.single_select == SingleSelect::No {
                record.single_select = SingleSelect::InstallSuggested;
                tracing::debug!("Suggested selection {} added", suggested);
                self.core.sync(&suggested);
            }
        }
    }

    fn drop_suggestions(&mut self, name: &str) {
        for suggested in self.suggestions_of(name) {
            let Some(record) = self.core.record_mut(&suggested) else {
                continue;
            };
            record.suggest = record.suggest.saturating_sub(1);
            if record.suggest == 0 && record.single_select == SingleSelect::InstallSuggested {
                record.single_select = SingleSelect::No;
                tracing::debug!("Suggested selection {} dropped", suggested);
                self.core.sync(&suggested);
            }
        }
    }

    pub fn ignore_conflict(&mut self, a: &str, b: &str) {
        tracing::debug!("Ignoring selection conflict {} <-> {}", a, b);
        self.core.ignore_conflict(a, b);
    }

    pub fn ignore_unsolved_requirement(&mut self, tag: &str) {
        tracing::debug!("Ignoring unsolved selection requirement {}", tag);
        self.core.ignore_unsolved(tag);
    }

    /// Selected, suggested or auto-added
    fn is_installed(&self, name: &str, record: &SelectionRecord) -> bool {
        record.is_wanted() || self.core.is_additional(name)
    }

    /// Groups that will be installed
    pub fn install_set(&self) -> Vec<String> {
        self.core
            .records()
            .iter()
            .filter(|(name, record)| self.is_installed(name, record))
            .map(|(name, _)| name.clone())
            .collect()
    }

    /// Packages implied by the installed groups
    ///
    /// Base configurations are expanded first, so an `old:new` entry in an
    /// ordinary group can replace a package a base configuration brought in.
    pub fn sel_packages(&self) -> Vec<String> {
        let installed: Vec<(&String, &SelectionRecord)> = self
            .core
            .records()
            .iter()
            .filter(|(name, record)| self.is_installed(name, record))
            .collect();

        let mut packages = BTreeSet::new();
        let base = installed.iter().filter(|(_, r)| r.is_base_configuration());
        let others = installed.iter().filter(|(_, r)| !r.is_base_configuration());

        for (name, record) in base.chain(others) {
            let Some(selection) = self.catalog.selection(name) else {
                continue;
            };
            for entry in &selection.packages {
                match entry.split_once(':') {
                    Some((old, new)) => {
                        if !record.is_base_configuration() {
                            packages.remove(old);
                        }
                        packages.insert(new.to_string());
                    }
                    None => {
                        packages.insert(entry.clone());
                    }
                }
            }
        }
        packages.into_iter().collect()
    }

    /// Any ordinary group carries an explicit marker
    pub fn is_single_selected(&self) -> bool {
        self.core.records().values().any(|record| {
            !matches!(
                record.single_select,
                SingleSelect::No | SingleSelect::InstallSuggested
            ) && !record.is_base_configuration()
        })
    }

    pub fn save_state(&mut self) {
        tracing::debug!("Saving selection state");
        self.core.save_state();
    }

    pub fn restore_state(&mut self) -> bool {
        let restored = self.core.restore_state();
        if restored {
            tracing::debug!("Restored selection state");
        }
        restored
    }

    pub fn discard_state(&mut self) -> bool {
        self.core.discard_state()
    }
}
