//! Persisted package selection
//!
//! Line-oriented key file. `+key:` opens a multi-line section and `-key:`
//! closes it, `key: value` is a single value, `#` starts a comment line.
//!
//! ```text
//! ## pkgselect package selection, written 2026-10-14T12:00:00Z
//! +allPackages:
//! a
//! -allPackages:
//! +packages:
//! a SELECTED
//! x DESELECTED
//! -packages:
//! +selections:
//! G1 SELECTED
//! -selections:
//! sourceInstall: false
//! ```

use std::collections::BTreeMap;
use std::path::Path;

use chrono::{DateTime, Utc};

use crate::error::{Result, SelectError};

const ALL_PACKAGES: &str = "allPackages";
const PACKAGES: &str = "packages";
const SELECTIONS: &str = "selections";
const SOURCE_INSTALL: &str = "sourceInstall";

const SELECTED: &str = "SELECTED";
const DESELECTED: &str = "DESELECTED";

/// Explicit override recorded for one item
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Marker {
    Selected,
    Deselected,
}

impl Marker {
    fn as_str(self) -> &'static str {
        match self {
            Marker::Selected => SELECTED,
            Marker::Deselected => DESELECTED,
        }
    }
}

/// Contents of a selection file
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SavedSelection {
    /// Every package slated to be on the system
    pub all_packages: Vec<String>,
    /// Single-item package overrides
    pub packages: Vec<(String, Marker)>,
    /// Group overrides
    pub selections: Vec<(String, Marker)>,
    /// Install source packages
    pub source_install: bool,
}

fn error(line: usize, message: impl Into<String>) -> SelectError {
    SelectError::SelectionFile {
        line,
        message: message.into(),
    }
}

type Section = Vec<(usize, String)>;

/// Split the file into sections and single values
fn parse_entries(content: &str) -> Result<(BTreeMap<String, Section>, BTreeMap<String, (usize, String)>)> {
    let mut sections: BTreeMap<String, Section> = BTreeMap::new();
    let mut values = BTreeMap::new();
    let mut open: Option<(usize, String)> = None;

    for (index, raw) in content.lines().enumerate() {
        let number = index + 1;
        let line = raw.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        if let Some(key) = line.strip_prefix('+').and_then(|l| l.strip_suffix(':')) {
            if let Some((_, current)) = &open {
                return Err(error(number, format!("section {} opened inside {}", key, current)));
            }
            sections.entry(key.to_string()).or_default();
            open = Some((number, key.to_string()));
            continue;
        }

        if let Some(key) = line.strip_prefix('-').and_then(|l| l.strip_suffix(':')) {
            match open.take() {
                Some((_, current)) if current == key => {}
                Some((_, current)) => {
                    return Err(error(number, format!("closing {} while {} is open", key, current)))
                }
                None => return Err(error(number, format!("closing {} which was never opened", key))),
            }
            continue;
        }

        match &open {
            Some((_, current)) => {
                sections
                    .entry(current.clone())
                    .or_default()
                    .push((number, line.to_string()));
            }
            None => {
                let Some((key, value)) = line.split_once(':') else {
                    return Err(error(number, "value outside of a section"));
                };
                values.insert(key.trim().to_string(), (number, value.trim().to_string()));
            }
        }
    }

    if let Some((number, key)) = open {
        return Err(error(number, format!("section {} is never closed", key)));
    }
    Ok((sections, values))
}

fn parse_markers(section: Option<&Section>) -> Result<Vec<(String, Marker)>> {
    let mut markers = Vec::new();
    for (number, line) in section.into_iter().flatten() {
        let mut fields = line.split_whitespace();
        let (Some(name), Some(marker), None) = (fields.next(), fields.next(), fields.next()) else {
            return Err(error(*number, format!("expected `name {}|{}`", SELECTED, DESELECTED)));
        };
        let marker = match marker {
            SELECTED => Marker::Selected,
            DESELECTED => Marker::Deselected,
            other => return Err(error(*number, format!("unknown marker {}", other))),
        };
        markers.push((name.to_string(), marker));
    }
    Ok(markers)
}

impl SavedSelection {
    pub fn parse(content: &str) -> Result<Self> {
        let (sections, values) = parse_entries(content)?;

        let all_packages = sections
            .get(ALL_PACKAGES)
            .into_iter()
            .flatten()
            .map(|(_, name)| name.clone())
            .collect();

        let source_install = match values.get(SOURCE_INSTALL) {
            None => false,
            Some((_, value)) if value == "true" => true,
            Some((_, value)) if value == "false" => false,
            Some((number, value)) => {
                return Err(error(*number, format!("invalid {} value {}", SOURCE_INSTALL, value)))
            }
        };

        Ok(Self {
            all_packages,
            packages: parse_markers(sections.get(PACKAGES))?,
            selections: parse_markers(sections.get(SELECTIONS))?,
            source_install,
        })
    }

    /// Render the file, stamping the header with `written`
    pub fn to_text(&self, written: DateTime<Utc>) -> String {
        let mut out = format!(
            "## pkgselect package selection, written {}\n",
            written.format("%Y-%m-%dT%H:%M:%SZ")
        );

        let section = |out: &mut String, key: &str, lines: Vec<String>| {
            out.push_str(&format!("+{}:\n", key));
            for line in lines {
                out.push_str(&line);
                out.push('\n');
            }
            out.push_str(&format!("-{}:\n", key));
        };
        let markers = |items: &[(String, Marker)]| {
            items
                .iter()
                .map(|(name, marker)| format!("{} {}", name, marker.as_str()))
                .collect::<Vec<_>>()
        };

        section(&mut out, ALL_PACKAGES, self.all_packages.clone());
        section(&mut out, PACKAGES, markers(&self.packages));
        section(&mut out, SELECTIONS, markers(&self.selections));
        out.push_str(&format!("{}: {}\n", SOURCE_INSTALL, self.source_install));
        out
    }

    pub fn read(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::parse(&content)
    }

    /// Write the file, creating parent directories
    pub fn write(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, self.to_text(Utc::now()))?;
        Ok(())
    }
}
