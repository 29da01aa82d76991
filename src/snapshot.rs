//! Checkpoints of one selection universe
//!
//! A snapshot owns deep copies of the item records, the solver and the
//! dependency maps held at capture time. Mutating the live state afterwards is
//! never visible through it.

use std::collections::BTreeMap;

use crate::solver::DependencyMaps;

#[derive(Debug, Clone)]
pub struct Snapshot<R, S> {
    records: BTreeMap<String, R>,
    solver: S,
    maps: DependencyMaps,
}

impl<R: Clone, S: Clone> Snapshot<R, S> {
    pub fn capture(records: &BTreeMap<String, R>, solver: &S, maps: &DependencyMaps) -> Self {
        Self {
            records: records.clone(),
            solver: solver.clone(),
            maps: maps.clone(),
        }
    }

    /// Copies of the captured state; the snapshot stays usable
    pub fn parts(&self) -> (BTreeMap<String, R>, S, DependencyMaps) {
        (self.records.clone(), self.solver.clone(), self.maps.clone())
    }

    pub fn records(&self) -> &BTreeMap<String, R> {
        &self.records
    }

    pub fn maps(&self) -> &DependencyMaps {
        &self.maps
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::package::ItemKey;

    #[test]
    fn test_snapshot_is_independent_of_live_state() {
        let mut records = BTreeMap::new();
        records.insert("a".to_string(), 1u32);
        let mut maps = DependencyMaps::default();
        maps.additional.push(ItemKey::new("b", "1.0"));

        let snapshot = Snapshot::capture(&records, &vec!["solver"], &maps);

        records.insert("a".to_string(), 2);
        maps.additional.clear();

        assert_eq!(snapshot.records()["a"], 1);
        assert_eq!(snapshot.maps().additional, vec![ItemKey::new("b", "1.0")]);

        let (restored, solver, _) = snapshot.parts();
        assert_eq!(restored["a"], 1);
        assert_eq!(solver, vec!["solver"]);
    }
}
