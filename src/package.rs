//! Selection state types shared by the package and group universes

use serde::{Deserialize, Serialize};

/// A catalog item at a specific version
///
/// Names are unique within their universe. The version is informational for
/// packages and empty for selection groups.
#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ItemKey {
    /// Item name
    pub name: String,

    /// Version string (empty for groups)
    pub version: String,
}

impl ItemKey {
    pub fn new(name: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
        }
    }

    /// Key for an unversioned item such as a selection group
    pub fn unversioned(name: impl Into<String>) -> Self {
        Self::new(name, "")
    }
}

impl std::fmt::Display for ItemKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.version.is_empty() {
            write!(f, "{}", self.name)
        } else {
            write!(f, "{}-{}", self.name, self.version)
        }
    }
}

/// The single authoritative intended action for a package
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Action {
    #[default]
    None,
    Delete,
    Install,
    Update,
}

impl Action {
    /// Install or update both put the catalog version on the system
    pub fn targets_catalog(self) -> bool {
        matches!(self, Action::Install | Action::Update)
    }
}

/// Why an item is in its current state
///
/// The `*Selected` values record an explicit single-item choice. The
/// `*Deselected` values are sticky vetoes that bulk calls must not override.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum SingleSelect {
    #[default]
    No,
    InstallSelected,
    InstallDeselected,
    DeleteSelected,
    DeleteDeselected,
    UpdateSelected,
    UpdateDeselected,
    InstallSuggested,
}

impl SingleSelect {
    pub fn is_veto(self) -> bool {
        matches!(
            self,
            SingleSelect::InstallDeselected
                | SingleSelect::DeleteDeselected
                | SingleSelect::UpdateDeselected
        )
    }
}

impl std::fmt::Display for SingleSelect {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            SingleSelect::No => "no",
            SingleSelect::InstallSelected => "install-selected",
            SingleSelect::InstallDeselected => "install-deselected",
            SingleSelect::DeleteSelected => "delete-selected",
            SingleSelect::DeleteDeselected => "delete-deselected",
            SingleSelect::UpdateSelected => "update-selected",
            SingleSelect::UpdateDeselected => "update-deselected",
            SingleSelect::InstallSuggested => "install-suggested",
        };
        write!(f, "{}", s)
    }
}

/// Selection state of one package
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackageRecord {
    /// Present on the target system (set once at initialization)
    pub is_installed: bool,

    /// Intended action
    pub action: Action,

    /// Reason for the current state
    pub single_select: SingleSelect,

    /// Installed but absent from the catalog
    pub foreign_package: bool,

    /// Catalog version (installed version for foreign packages)
    pub version: String,

    /// Version found on the system, if installed
    pub installed_version: Option<String>,
}

impl PackageRecord {
    /// A catalog package, optionally already present on the system
    pub fn available(version: &str, installed_version: Option<&str>) -> Self {
        Self {
            is_installed: installed_version.is_some(),
            action: Action::None,
            single_select: SingleSelect::No,
            foreign_package: false,
            version: version.to_string(),
            installed_version: installed_version.map(str::to_string),
        }
    }

    /// An installed package the catalog no longer knows about
    pub fn foreign(installed_version: &str) -> Self {
        Self {
            is_installed: true,
            action: Action::None,
            single_select: SingleSelect::No,
            foreign_package: true,
            version: installed_version.to_string(),
            installed_version: Some(installed_version.to_string()),
        }
    }

    /// Stays on (or comes onto) the system after the planned actions
    pub fn is_kept(&self) -> bool {
        self.action.targets_catalog() || (self.is_installed && self.action != Action::Delete)
    }
}

/// Selection state of one named group
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SelectionRecord {
    pub visible: bool,

    /// Group kind, `baseconf` for base configurations
    pub kind: String,

    /// Install-family marker
    pub single_select: SingleSelect,

    /// Number of selected groups currently suggesting this one
    pub suggest: u32,
}

/// Kind marker for base configuration groups
pub const BASE_CONFIGURATION: &str = "baseconf";

impl SelectionRecord {
    pub fn new(kind: &str, visible: bool) -> Self {
        Self {
            visible,
            kind: kind.to_string(),
            single_select: SingleSelect::No,
            suggest: 0,
        }
    }

    pub fn is_base_configuration(&self) -> bool {
        self.kind == BASE_CONFIGURATION
    }

    /// Explicitly selected or pulled in by a suggestion
    pub fn is_wanted(&self) -> bool {
        matches!(
            self.single_select,
            SingleSelect::InstallSelected | SingleSelect::InstallSuggested
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_item_key_display() {
        assert_eq!(ItemKey::new("bash", "5.2-1").to_string(), "bash-5.2-1");
        assert_eq!(ItemKey::unversioned("Minimal").to_string(), "Minimal");
    }

    #[test]
    fn test_single_select_vetoes() {
        assert!(SingleSelect::InstallDeselected.is_veto());
        assert!(SingleSelect::DeleteDeselected.is_veto());
        assert!(!SingleSelect::InstallSuggested.is_veto());
        assert_eq!(SingleSelect::UpdateDeselected.to_string(), "update-deselected");
    }

    #[test]
    fn test_item_key_default_is_empty() {
        let key = ItemKey::default();
        assert!(key.name.is_empty());
        assert!(key.version.is_empty());
        assert_eq!(key, ItemKey::unversioned(""));
    }

    #[test]
    fn test_package_record_is_kept() {
        let mut record = PackageRecord::available("1.0", Some("0.9"));
        assert!(record.is_kept());

        record.action = Action::Delete;
        assert!(!record.is_kept());

        let mut fresh = PackageRecord::available("1.0", None);
        assert!(!fresh.is_kept());
        fresh.action = Action::Update;
        assert!(fresh.is_kept());
    }
}
