//! Tag-based dependency graph solver
//!
//! Items require, provide, conflict with and obsolete *tags*. An item always
//! provides its own name. A required tag that no active item provides is
//! satisfied by auto-adding its only provider, or reported as unsolved with
//! every candidate when there is no unique choice.

use std::collections::{BTreeMap, BTreeSet, VecDeque};

use super::{DependencyMaps, DependencySolver, ObsoleteEntry};
use crate::catalog::Catalog;
use crate::database::InstalledPackage;
use crate::package::ItemKey;

/// A node of the solver universe
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SolverItem {
    pub key: ItemKey,
    pub requires: Vec<String>,
    pub provides: Vec<String>,
    pub conflicts: Vec<String>,
    pub obsoletes: Vec<String>,
}

impl SolverItem {
    pub fn new(key: ItemKey) -> Self {
        Self {
            key,
            ..Self::default()
        }
    }
}

/// Result of closing the confirmed set under its requirements
struct Closure {
    active: BTreeMap<String, ItemKey>,
    additional: BTreeMap<String, ItemKey>,
    unsolved: BTreeMap<String, Vec<ItemKey>>,
}

/// Reference solver over requires/provides/conflicts/obsoletes tags
#[derive(Debug, Clone, Default)]
pub struct GraphSolver {
    items: BTreeMap<String, SolverItem>,
    /// Tag to the names of all items providing it
    providers: BTreeMap<String, BTreeSet<String>>,
    confirmed: BTreeMap<String, ItemKey>,
    /// Stored with the smaller name first
    ignored_conflicts: BTreeSet<(String, String)>,
    ignored_unsolved: BTreeSet<String>,
    ignored_additional: BTreeSet<String>,
}

impl GraphSolver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an item to the universe
    pub fn add_universe_item(&mut self, item: SolverItem) {
        let name = item.key.name.clone();
        self.providers
            .entry(name.clone())
            .or_default()
            .insert(name.clone());
        for tag in &item.provides {
            self.providers
                .entry(tag.clone())
                .or_default()
                .insert(name.clone());
        }
        self.items.insert(name, item);
    }

    /// Package universe: every catalog package plus installed packages the
    /// catalog does not know, which only provide their own name
    pub fn for_packages(catalog: &Catalog, foreign: &[InstalledPackage]) -> Self {
        let mut solver = Self::new();
        for pkg in catalog.packages() {
            solver.add_universe_item(SolverItem {
                key: ItemKey::new(&pkg.name, &pkg.version),
                requires: pkg.requires.clone(),
                provides: pkg.provides.clone(),
                conflicts: pkg.conflicts.clone(),
                obsoletes: pkg.obsoletes.clone(),
            });
        }
        for pkg in foreign {
            solver.add_universe_item(SolverItem::new(ItemKey::new(&pkg.name, &pkg.version)));
        }
        solver
    }

    /// Selection universe: every catalog selection group
    pub fn for_selections(catalog: &Catalog) -> Self {
        let mut solver = Self::new();
        for sel in catalog.selections() {
            solver.add_universe_item(SolverItem {
                key: ItemKey::unversioned(&sel.name),
                requires: sel.requires.clone(),
                provides: sel.provides.clone(),
                conflicts: sel.conflicts.clone(),
                obsoletes: Vec::new(),
            });
        }
        solver
    }

    /// Active items matching a tag, excluding `skip`
    fn matching<'a>(
        &'a self,
        tag: &'a str,
        active: &'a BTreeMap<String, ItemKey>,
        skip: &'a str,
    ) -> impl Iterator<Item = &'a ItemKey> + 'a {
        let provided = self
            .providers
            .get(tag)
            .into_iter()
            .flatten()
            .filter_map(move |name| active.get(name));
        // Confirmed items outside the universe still provide their own name
        let unknown = active
            .get(tag)
            .filter(|_| !self.items.contains_key(tag));
        provided
            .chain(unknown)
            .filter(move |key| key.name != skip)
    }

    fn is_provided(&self, tag: &str, active: &BTreeMap<String, ItemKey>) -> bool {
        self.matching(tag, active, "").next().is_some()
    }

    fn provides_tag(&self, name: &str, tag: &str) -> bool {
        name == tag
            || self
                .providers
                .get(tag)
                .is_some_and(|names| names.contains(name))
    }

    fn conflict_ignored(&self, a: &str, b: &str) -> bool {
        let pair = if a <= b {
            (a.to_string(), b.to_string())
        } else {
            (b.to_string(), a.to_string())
        };
        self.ignored_conflicts.contains(&pair)
    }

    fn close(&self) -> Closure {
        let mut active = self.confirmed.clone();
        let mut additional = BTreeMap::new();
        let mut unsolved = BTreeMap::new();
        let mut queue: VecDeque<String> = active.keys().cloned().collect();

        while let Some(name) = queue.pop_front() {
            let Some(item) = self.items.get(&name) else {
                continue;
            };
            for tag in &item.requires {
                if self.ignored_unsolved.contains(tag) || self.is_provided(tag, &active) {
                    continue;
                }
                let candidates: Vec<&SolverItem> = self
                    .providers
                    .get(tag)
                    .into_iter()
                    .flatten()
                    .filter_map(|n| self.items.get(n))
                    .collect();
                match candidates.as_slice() {
                    [_] if self.ignored_additional.contains(tag) => {}
                    [only] => {
                        tracing::debug!("{} requires {}: adding {}", name, tag, only.key);
                        active.insert(only.key.name.clone(), only.key.clone());
                        additional.insert(only.key.name.clone(), only.key.clone());
                        queue.push_back(only.key.name.clone());
                    }
                    _ => {
                        unsolved.insert(
                            tag.clone(),
                            candidates.iter().map(|c| c.key.clone()).collect(),
                        );
                    }
                }
            }
        }

        // Items added later in the walk may satisfy tags recorded earlier
        unsolved.retain(|tag, _| !self.is_provided(tag, &active));

        Closure {
            active,
            additional,
            unsolved,
        }
    }

    /// Active items requiring a tag that `name` provides
    fn dependents(&self, name: &str, active: &BTreeMap<String, ItemKey>) -> Vec<ItemKey> {
        active
            .iter()
            .filter(|(other, _)| other.as_str() != name)
            .filter(|(other, _)| {
                self.items.get(*other).is_some_and(|item| {
                    item.requires.iter().any(|tag| self.provides_tag(name, tag))
                })
            })
            .map(|(_, key)| key.clone())
            .collect()
    }

    fn compute(&self) -> DependencyMaps {
        let closure = self.close();
        let active = &closure.active;

        let mut conflicts: BTreeMap<ItemKey, Vec<ItemKey>> = BTreeMap::new();
        let mut obsoletes = Vec::new();

        for (name, key) in active {
            let Some(item) = self.items.get(name) else {
                continue;
            };

            let mut found: Vec<ItemKey> = Vec::new();
            for tag in &item.conflicts {
                for other in self.matching(tag, active, name) {
                    if !self.conflict_ignored(name, &other.name) && !found.contains(other) {
                        found.push(other.clone());
                    }
                }
            }
            if !found.is_empty() {
                found.sort();
                conflicts.insert(key.clone(), found);
            }

            for tag in &item.obsoletes {
                for other in self.matching(tag, active, name) {
                    obsoletes.push(ObsoleteEntry {
                        obsoletes: key.clone(),
                        obsoletes_dependents: self.dependents(name, active),
                        obsoleted: other.clone(),
                        obsoleted_dependents: self.dependents(&other.name, active),
                    });
                }
            }
        }

        DependencyMaps {
            additional: closure.additional.into_values().collect(),
            unsolved: closure.unsolved,
            conflicts,
            obsoletes,
        }
    }
}

impl DependencySolver for GraphSolver {
    fn add_item(&mut self, key: ItemKey) -> DependencyMaps {
        self.confirmed.insert(key.name.clone(), key);
        self.compute()
    }

    fn remove_item(&mut self, key: &ItemKey) -> DependencyMaps {
        self.confirmed.remove(&key.name);
        self.compute()
    }

    fn add_item_list(&mut self, keys: Vec<ItemKey>) -> DependencyMaps {
        for key in keys {
            self.confirmed.insert(key.name.clone(), key);
        }
        self.compute()
    }

    fn solve_dependencies(&mut self, confirmed: Vec<ItemKey>) -> DependencyMaps {
        self.confirmed = confirmed
            .into_iter()
            .map(|key| (key.name.clone(), key))
            .collect();
        self.compute()
    }

    fn resolve(&mut self) -> DependencyMaps {
        self.compute()
    }

    fn ignore_conflict(&mut self, a: &str, b: &str) {
        let pair = if a <= b {
            (a.to_string(), b.to_string())
        } else {
            (b.to_string(), a.to_string())
        };
        self.ignored_conflicts.insert(pair);
    }

    fn ignore_unsolved_requirement(&mut self, tag: &str) {
        self.ignored_unsolved.insert(tag.to_string());
    }

    fn ignore_additional(&mut self, tag: &str) {
        self.ignored_additional.insert(tag.to_string());
    }

    fn breaking_items(&self, key: &ItemKey) -> Vec<ItemKey> {
        let active = self.close().active;
        active
            .iter()
            .filter(|(name, _)| name.as_str() != key.name)
            .filter(|(name, _)| {
                self.items.get(*name).is_some_and(|item| {
                    item.requires.iter().any(|tag| {
                        !self.ignored_unsolved.contains(tag)
                            && self.provides_tag(&key.name, tag)
                            && self.matching(tag, &active, &key.name).next().is_none()
                    })
                })
            })
            .map(|(_, k)| k.clone())
            .collect()
    }

    fn confirmed(&self) -> Vec<ItemKey> {
        self.confirmed.values().cloned().collect()
    }
}
