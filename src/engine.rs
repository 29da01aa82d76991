//! Session ownership and environment (re)configuration
//!
//! The engine holds at most one session: the catalog and installed-package
//! facts of the current environment plus one controller per universe. Every
//! selection call goes through [`Engine::packages_mut`] or
//! [`Engine::groups_mut`] and fails with `NotInitialized` until
//! [`Engine::reconfigure`] has loaded an environment.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::catalog::Catalog;
use crate::database::{InstalledDb, InstalledPackage};
use crate::error::{Result, SelectError};
use crate::groups::GroupSelector;
use crate::package::{Action, SingleSelect};
use crate::packages::{foreign_packages, PackageSelector};
use crate::selection_file::{Marker, SavedSelection};
use crate::solver::GraphSolver;

/// Where the catalog and installed-package facts come from
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Environment {
    /// Catalog file
    pub catalog: PathBuf,

    /// Installed-package database
    pub installed_db: Option<PathBuf>,

    /// Consult the installed-package database (update mode)
    pub update: bool,

    /// Reload even when nothing changed
    pub force_init: bool,
}

impl Environment {
    /// Fresh installation from a catalog, nothing installed yet
    pub fn new(catalog: impl Into<PathBuf>) -> Self {
        Self {
            catalog: catalog.into(),
            installed_db: None,
            update: false,
            force_init: false,
        }
    }

    fn installed_packages(&self) -> Result<Vec<InstalledPackage>> {
        match (&self.installed_db, self.update) {
            (Some(path), true) => InstalledDb::open_read_only(path)?.list_packages(),
            _ => Ok(Vec::new()),
        }
    }
}

/// Everything loaded for one environment
#[derive(Debug, Clone)]
pub struct Session {
    pub catalog: Arc<Catalog>,
    pub packages: PackageSelector<GraphSolver>,
    pub groups: GroupSelector<GraphSolver>,
}

impl Session {
    pub fn new(catalog: Catalog, installed: &[InstalledPackage]) -> Self {
        let catalog = Arc::new(catalog);
        let foreign = foreign_packages(&catalog, installed);

        let packages = PackageSelector::new(
            Arc::clone(&catalog),
            installed,
            GraphSolver::for_packages(&catalog, &foreign),
        );
        let groups = GroupSelector::new(Arc::clone(&catalog), GraphSolver::for_selections(&catalog));

        Self {
            catalog,
            packages,
            groups,
        }
    }
}

/// The selection engine
#[derive(Debug, Default)]
pub struct Engine {
    environment: Option<Environment>,
    session: Option<Session>,
}

impl Engine {
    /// An engine with no environment loaded
    pub fn new() -> Self {
        Self::default()
    }

    /// An engine over in-memory sources
    pub fn with_sources(catalog: Catalog, installed: &[InstalledPackage]) -> Self {
        Self {
            environment: None,
            session: Some(Session::new(catalog, installed)),
        }
    }

    /// Load `env` unless it is already the active environment
    ///
    /// Returns whether the session was rebuilt. On failure the previous
    /// session stays in place.
    pub fn reconfigure(&mut self, env: Environment) -> Result<bool> {
        if !env.force_init && self.session.is_some() && self.environment.as_ref() == Some(&env) {
            tracing::debug!("Environment unchanged, keeping session");
            return Ok(false);
        }

        tracing::info!("Initializing environment from {}", env.catalog.display());
        let catalog = Catalog::load(&env.catalog)?;
        let installed = env.installed_packages()?;

        self.session = Some(Session::new(catalog, &installed));
        self.environment = Some(env);
        Ok(true)
    }

    pub fn environment(&self) -> Option<&Environment> {
        self.environment.as_ref()
    }

    pub fn is_initialized(&self) -> bool {
        self.session.is_some()
    }

    pub fn session(&self) -> Result<&Session> {
        self.session.as_ref().ok_or(SelectError::NotInitialized)
    }

    pub fn session_mut(&mut self) -> Result<&mut Session> {
        self.session.as_mut().ok_or(SelectError::NotInitialized)
    }

    pub fn packages(&self) -> Result<&PackageSelector<GraphSolver>> {
        Ok(&self.session()?.packages)
    }

    pub fn packages_mut(&mut self) -> Result<&mut PackageSelector<GraphSolver>> {
        Ok(&mut self.session_mut()?.packages)
    }

    pub fn groups(&self) -> Result<&GroupSelector<GraphSolver>> {
        Ok(&self.session()?.groups)
    }

    pub fn groups_mut(&mut self) -> Result<&mut GroupSelector<GraphSolver>> {
        Ok(&mut self.session_mut()?.groups)
    }

    /// Checkpoint both universes
    pub fn save_state(&mut self) -> Result<()> {
        let session = self.session_mut()?;
        session.packages.save_state();
        session.groups.save_state();
        Ok(())
    }

    /// Roll both universes back to the checkpoint, if one was taken
    pub fn restore_state(&mut self) -> Result<()> {
        let session = self.session_mut()?;
        session.packages.restore_state();
        session.groups.restore_state();
        Ok(())
    }

    /// Forget the checkpoint of both universes
    pub fn delete_old_state(&mut self) -> Result<()> {
        let session = self.session_mut()?;
        session.packages.discard_state();
        session.groups.discard_state();
        Ok(())
    }

    /// Any explicit single-item marker in either universe
    pub fn is_single_selected(&self) -> Result<bool> {
        let session = self.session()?;
        Ok(session.packages.is_single_selected() || session.groups.is_single_selected())
    }

    /// Current selection in its persisted form
    pub fn saved_selection(&self) -> Result<SavedSelection> {
        let session = self.session()?;
        let mut saved = SavedSelection {
            source_install: session.packages.install_sources(),
            ..SavedSelection::default()
        };

        for (name, record) in session.packages.records() {
            if record.is_installed {
                if record.single_select != SingleSelect::DeleteSelected {
                    saved.all_packages.push(name.clone());
                    saved.packages.push((name.clone(), Marker::Selected));
                }
                continue;
            }
            if record.action == Action::Install || session.packages.is_source_selected(name, record) {
                saved.all_packages.push(name.clone());
            }
            match record.single_select {
                SingleSelect::InstallSelected => saved.packages.push((name.clone(), Marker::Selected)),
                SingleSelect::InstallDeselected => {
                    saved.packages.push((name.clone(), Marker::Deselected))
                }
                _ => {}
            }
        }

        for (name, record) in session.groups.records() {
            match record.single_select {
                SingleSelect::InstallSelected => saved.selections.push((name.clone(), Marker::Selected)),
                SingleSelect::InstallDeselected => {
                    saved.selections.push((name.clone(), Marker::Deselected))
                }
                _ => {}
            }
        }
        Ok(saved)
    }

    pub fn save_selections(&self, path: &Path) -> Result<()> {
        let saved = self.saved_selection()?;
        saved.write(path)?;
        tracing::info!(
            "Saved selection of {} packages to {}",
            saved.all_packages.len(),
            path.display()
        );
        Ok(())
    }

    pub fn load_selections(&mut self, path: &Path) -> Result<()> {
        self.session()?;
        let saved = SavedSelection::read(path)?;
        tracing::info!("Loading selection from {}", path.display());
        self.apply_selection(&saved)
    }

    /// Replay a saved selection over a fully reset session
    ///
    /// Groups go first (base configurations before the rest), then the
    /// package list they imply, then the individual package overrides so the
    /// group-derived bulk selection cannot clobber them.
    pub fn apply_selection(&mut self, saved: &SavedSelection) -> Result<()> {
        let session = self.session_mut()?;
        let mut not_found = Vec::new();

        session.packages.reset();
        session.groups.reset();

        let is_base = |name: &str| {
            session
                .catalog
                .selection(name)
                .is_some_and(|s| s.kind == crate::package::BASE_CONFIGURATION)
        };
        let (base, others): (Vec<_>, Vec<_>) =
            saved.selections.iter().partition(|(name, _)| is_base(name));

        for (name, marker) in base.into_iter().chain(others) {
            let result = match marker {
                Marker::Selected => session.groups.select_install(name, false),
                Marker::Deselected => session.groups.deselect_install(name),
            };
            if result.is_err() {
                not_found.push(name.clone());
            }
        }

        let implied = session.groups.sel_packages();
        if let Err(err) = session.packages.set_install_selection(&implied, true) {
            tracing::warn!("Selected groups reference unknown packages: {}", err);
            match err {
                SelectError::NotFound(name) => not_found.push(name),
                SelectError::MissingItems(names) => not_found.extend(names),
                other => return Err(other),
            }
        }
        session.packages.set_source_installation(saved.source_install);

        for (name, marker) in &saved.packages {
            let installed = session
                .packages
                .record(name)
                .is_some_and(|record| record.is_installed);
            let result = match marker {
                Marker::Selected if installed => Ok(()),
                Marker::Selected => session.packages.select_install(name, false),
                Marker::Deselected => session.packages.deselect_install(name),
            };
            if result.is_err() {
                not_found.push(name.clone());
            }
        }

        match not_found.len() {
            0 => Ok(()),
            _ => {
                tracing::warn!("Selection references unknown items: {}", not_found.join(", "));
                Err(SelectError::MissingItems(not_found))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CATALOG: &str = r#"
        [[packages]]
        name = "bash"
        version = "5.2-1"

        [[packages]]
        name = "vim"
        version = "9.1-1"

        [[selections]]
        name = "Minimal"
        kind = "baseconf"
        packages = ["bash", "vim"]
    "#;

    #[test]
    fn test_calls_before_init() {
        let mut engine = Engine::new();
        assert!(!engine.is_initialized());
        assert!(matches!(engine.packages(), Err(SelectError::NotInitialized)));
        assert!(matches!(engine.save_state(), Err(SelectError::NotInitialized)));
        assert!(matches!(
            engine.load_selections(Path::new("/nonexistent")),
            Err(SelectError::NotInitialized)
        ));
    }

    #[test]
    fn test_reconfigure_detects_changes() {
        let dir = tempfile::tempdir().unwrap();
        let catalog = dir.path().join("catalog.toml");
        std::fs::write(&catalog, CATALOG).unwrap();

        let db_path = dir.path().join("installed.sqlite");
        let db = InstalledDb::open(&db_path).unwrap();
        db.add_package(&InstalledPackage::new("bash", "5.1-3")).unwrap();
        drop(db);

        let mut engine = Engine::new();
        let mut env = Environment::new(&catalog);
        env.installed_db = Some(db_path);

        assert!(engine.reconfigure(env.clone()).unwrap());
        assert!(!engine.reconfigure(env.clone()).unwrap());
        assert!(!engine.packages().unwrap().record("bash").unwrap().is_installed);

        // Update mode reads the installed-package database
        env.update = true;
        assert!(engine.reconfigure(env.clone()).unwrap());
        assert!(engine.packages().unwrap().record("bash").unwrap().is_installed);

        env.force_init = true;
        assert!(engine.reconfigure(env.clone()).unwrap());
        assert!(engine.reconfigure(env).unwrap());
    }

    #[test]
    fn test_failed_reconfigure_keeps_session() {
        let mut engine = Engine::with_sources(Catalog::from_toml(CATALOG).unwrap(), &[]);
        let err = engine
            .reconfigure(Environment::new("/nonexistent/catalog.toml"))
            .unwrap_err();
        assert!(matches!(err, SelectError::Catalog(_)));
        assert!(engine.packages().unwrap().record("vim").is_some());
    }

    #[test]
    fn test_update_mode_requires_existing_database() {
        let dir = tempfile::tempdir().unwrap();
        let catalog = dir.path().join("catalog.toml");
        std::fs::write(&catalog, CATALOG).unwrap();
        let db_path = dir.path().join("no-such-dir").join("installed.sqlite");

        let mut engine = Engine::with_sources(Catalog::from_toml(CATALOG).unwrap(), &[]);
        let mut env = Environment::new(&catalog);
        env.installed_db = Some(db_path.clone());
        env.update = true;

        let err = engine.reconfigure(env).unwrap_err();
        assert!(matches!(err, SelectError::Database(_)));
        assert!(!db_path.exists());
        assert!(engine.environment().is_none());
        assert!(engine.packages().unwrap().record("vim").is_some());
    }

    #[test]
    fn test_saved_selection_contents() {
        let installed = vec![InstalledPackage::new("bash", "5.1-3")];
        let mut engine = Engine::with_sources(Catalog::from_toml(CATALOG).unwrap(), &installed);
        engine.groups_mut().unwrap().select_install("Minimal", true).unwrap();
        engine.packages_mut().unwrap().deselect_install("vim").unwrap();

        let saved = engine.saved_selection().unwrap();
        assert_eq!(saved.all_packages, vec!["bash"]);
        assert_eq!(
            saved.packages,
            vec![
                ("bash".to_string(), Marker::Selected),
                ("vim".to_string(), Marker::Deselected)
            ]
        );
        assert_eq!(saved.selections, vec![("Minimal".to_string(), Marker::Selected)]);
    }
}
