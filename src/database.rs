//! SQLite database of packages installed on the target system
//!
//! This is the installed-package source: the engine reads it once per
//! environment to seed the `is_installed` facts and to discover foreign
//! packages. Nothing in the selection core writes to it.

use std::path::Path;

use rusqlite::{params, Connection, OpenFlags};
use serde::{Deserialize, Serialize};

use crate::error::{Result, SelectError};

/// A package present on the target system
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstalledPackage {
    /// Package name
    pub name: String,

    /// Installed version string
    pub version: String,

    /// Build timestamp (Unix epoch)
    pub build_time: i64,

    /// Installation timestamp (Unix epoch)
    pub install_time: i64,
}

impl InstalledPackage {
    pub fn new(name: &str, version: &str) -> Self {
        Self {
            name: name.to_string(),
            version: version.to_string(),
            build_time: 0,
            install_time: chrono::Utc::now().timestamp(),
        }
    }
}

/// Installed-package database
pub struct InstalledDb {
    conn: Connection,
}

impl InstalledDb {
    /// Open or create the database
    pub fn open(path: &Path) -> Result<Self> {
        // Create parent directory if needed
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let conn = Connection::open(path)?;
        tracing::debug!("Opened installed-package database {}", path.display());

        let db = Self { conn };
        db.initialize()?;
        Ok(db)
    }

    /// Open an existing database without creating or modifying it
    pub fn open_read_only(path: &Path) -> Result<Self> {
        let conn = Connection::open_with_flags(path, OpenFlags::SQLITE_OPEN_READ_ONLY)
            .map_err(|e| {
                SelectError::Database(format!("Failed to open {}: {}", path.display(), e))
            })?;
        tracing::debug!("Opened installed-package database {} read-only", path.display());
        Ok(Self { conn })
    }

    /// Open an in-memory database (for testing)
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        let db = Self { conn };
        db.initialize()?;
        Ok(db)
    }

    /// Initialize the database schema
    fn initialize(&self) -> Result<()> {
        self.conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS installed (
                name TEXT PRIMARY KEY,
                version TEXT NOT NULL,
                build_time INTEGER NOT NULL DEFAULT 0,
                install_time INTEGER NOT NULL DEFAULT 0
            );
            "#,
        )?;

        Ok(())
    }

    /// Record an installed package, replacing an older entry of the same name
    pub fn add_package(&self, pkg: &InstalledPackage) -> Result<()> {
        self.conn.execute(
            r#"
            INSERT OR REPLACE INTO installed (name, version, build_time, install_time)
            VALUES (?1, ?2, ?3, ?4)
            "#,
            params![pkg.name, pkg.version, pkg.build_time, pkg.install_time],
        )?;

        Ok(())
    }

    /// List all installed packages
    pub fn list_packages(&self) -> Result<Vec<InstalledPackage>> {
        let mut stmt = self.conn.prepare(
            "SELECT name, version, build_time, install_time FROM installed ORDER BY name",
        )?;

        let rows = stmt.query_map([], |row| {
            Ok(InstalledPackage {
                name: row.get(0)?,
                version: row.get(1)?,
                build_time: row.get(2)?,
                install_time: row.get(3)?,
            })
        })?;

        Ok(rows.collect::<std::result::Result<Vec<_>, _>>()?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_database_create() {
        let db = InstalledDb::open_in_memory().unwrap();
        assert!(db.list_packages().unwrap().is_empty());
    }

    #[test]
    fn test_add_package_replaces_same_name() {
        let dir = tempfile::tempdir().unwrap();
        let db = InstalledDb::open(&dir.path().join("var/installed.sqlite")).unwrap();

        let pkg = InstalledPackage {
            name: "bash".to_string(),
            version: "5.1-3".to_string(),
            build_time: 1234567890,
            install_time: 1234567999,
        };
        db.add_package(&pkg).unwrap();
        db.add_package(&InstalledPackage::new("bash", "5.2-1")).unwrap();
        db.add_package(&InstalledPackage::new("attr", "2.5-1")).unwrap();

        let all = db.list_packages().unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].name, "attr");
        assert_eq!(all[1].version, "5.2-1");
    }

    #[test]
    fn test_read_only_open_sees_existing_rows() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("installed.sqlite");
        InstalledDb::open(&path)
            .unwrap()
            .add_package(&InstalledPackage::new("bash", "5.2-1"))
            .unwrap();

        let db = InstalledDb::open_read_only(&path).unwrap();
        let all = db.list_packages().unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].name, "bash");
    }

    #[test]
    fn test_read_only_open_never_creates_a_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing").join("installed.sqlite");

        let err = InstalledDb::open_read_only(&path).err().unwrap();
        assert!(matches!(err, SelectError::Database(_)));
        assert!(!path.exists());
        assert!(!path.parent().unwrap().exists());
    }
}
