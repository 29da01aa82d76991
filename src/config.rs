//! Configuration management for pkgselect

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::engine::Environment;

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Package sources
    #[serde(default)]
    pub environment: EnvironmentConfig,

    /// Persisted selection
    #[serde(default)]
    pub state: StateConfig,

    /// Log output
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EnvironmentConfig {
    /// Catalog of available packages and selections
    pub catalog: PathBuf,

    /// SQLite database of installed packages
    pub installed_db: PathBuf,

    /// Read the installed-package database (update an existing system)
    pub update: bool,

    /// Rebuild the session even when the environment did not change
    pub force_init: bool,
}

impl Default for EnvironmentConfig {
    fn default() -> Self {
        Self {
            catalog: PathBuf::from("/var/lib/pkgselect/catalog.toml"),
            installed_db: PathBuf::from("/var/lib/pkgselect/installed.sqlite"),
            update: false,
            force_init: false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StateConfig {
    /// Default selection file for `show` and `status`
    pub selection_file: PathBuf,
}

impl Default for StateConfig {
    fn default() -> Self {
        Self {
            selection_file: PathBuf::from("/var/lib/pkgselect/selection.conf"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Default filter when `RUST_LOG` is unset
    #[serde(default = "default_level")]
    pub level: String,
}

fn default_level() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_level(),
        }
    }
}

impl Config {
    /// Load configuration from file, or use defaults
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let config_path = path.map(PathBuf::from).or_else(|| {
            // Try system config
            let system_config = PathBuf::from("/etc/pkgselect/pkgselect.conf");
            if system_config.exists() {
                return Some(system_config);
            }

            // Try user config
            directories::ProjectDirs::from("org", "rookery", "pkgselect")
                .map(|d| d.config_dir().join("pkgselect.conf"))
                .filter(|p| p.exists())
        });

        match config_path {
            Some(path) => Self::from_file(&path),
            None => Ok(Config::default()),
        }
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config: {}", path.display()))?;
        toml::from_str(&content)
            .with_context(|| format!("Failed to parse config: {}", path.display()))
    }

    /// The engine environment described by this configuration
    pub fn environment(&self) -> Environment {
        Environment {
            catalog: self.environment.catalog.clone(),
            installed_db: Some(self.environment.installed_db.clone()),
            update: self.environment.update,
            force_init: self.environment.force_init,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.logging.level, "info");
        assert!(!config.environment.update);
        assert_eq!(config.environment().installed_db, Some(config.environment.installed_db.clone()));
    }

    #[test]
    fn test_partial_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pkgselect.conf");
        std::fs::write(
            &path,
            r#"
            [environment]
            catalog = "/srv/media/catalog.toml"
            installed_db = "/mnt/var/lib/pkgselect/installed.sqlite"
            update = true

            [logging]
            level = "debug"
            "#,
        )
        .unwrap();

        let config = Config::load(Some(&path)).unwrap();
        let env = config.environment();
        assert_eq!(env.catalog, PathBuf::from("/srv/media/catalog.toml"));
        assert!(env.update);
        assert!(!env.force_init);
        assert_eq!(config.logging.level, "debug");
        assert_eq!(
            config.state.selection_file,
            PathBuf::from("/var/lib/pkgselect/selection.conf")
        );
    }

    #[test]
    fn test_unreadable_file() {
        let err = Config::load(Some(Path::new("/nonexistent/pkgselect.conf"))).unwrap_err();
        assert!(err.to_string().contains("Failed to read config"));
    }
}
