//! Command-dispatch boundary
//!
//! A host drives the engine with one JSON command at a time and gets one JSON
//! response back:
//!
//! ```json
//! {"cmd": "selectInstall", "name": "b", "automatic": false}
//! {"ok": true, "result": null}
//! ```
//!
//! Warnings (unknown names, malformed list entries) come back with
//! `"ok": false` and an `"error"` message after the valid part of the input
//! has been applied.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::engine::{Engine, Environment};
use crate::error::{Result, SelectError};
use crate::solver::DependencyMaps;

/// One engine call
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "cmd", rename_all = "camelCase")]
pub enum Command {
    SetEnvironment {
        catalog: PathBuf,
        #[serde(default, rename = "installedDb")]
        installed_db: Option<PathBuf>,
        #[serde(default)]
        update: bool,
        #[serde(default, rename = "forceInit")]
        force_init: bool,
    },
    SetInstallSelection {
        packages: Value,
        #[serde(default, rename = "keepSingle")]
        keep_single: bool,
    },
    SetDeleteSelection {
        packages: Value,
    },
    SetUpdateSelection {
        packages: Value,
    },
    SelectInstall {
        name: String,
        #[serde(default)]
        automatic: bool,
    },
    SelectInstallList {
        packages: Value,
        #[serde(default)]
        automatic: bool,
    },
    SelectUpdate {
        name: String,
    },
    SelectUpdateList {
        packages: Value,
    },
    SelectDelete {
        name: String,
    },
    DeselectInstall {
        name: String,
    },
    DeselectDelete {
        name: String,
    },
    DeselectUpdate {
        name: String,
    },
    SelectSelInstall {
        #[serde(default)]
        name: String,
        #[serde(default)]
        reset: bool,
    },
    DeselectSelInstall {
        name: String,
    },
    IgnoreConflict {
        a: String,
        b: String,
    },
    IgnoreUnsolvedRequirement {
        tag: String,
    },
    IgnoreAdditional {
        tag: String,
    },
    IgnoreSelConflict {
        a: String,
        b: String,
    },
    IgnoreSelUnsolvedRequirement {
        tag: String,
    },
    SetSourceInstallation {
        install: bool,
    },
    GetDependencies,
    GetSelDependencies,
    GetBreakingPackageList {
        name: String,
    },
    GetPackageStatus {
        name: String,
    },
    GetInstallSet,
    GetDeleteSet,
    GetUpdateSet,
    GetUpdateCandidates,
    GetSelInstallSet,
    GetSelPackages,
    IsSingleSelected,
    IsInstallSelected,
    SaveState,
    RestoreState,
    DeleteOldState,
    SavePackageSelections {
        path: PathBuf,
    },
    LoadPackageSelections {
        path: PathBuf,
    },
}

/// Reply to one command
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Response {
    pub ok: bool,
    pub result: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl Response {
    fn success(result: Value) -> Self {
        Self {
            ok: true,
            result,
            error: None,
        }
    }

    fn failure(err: &SelectError) -> Self {
        Self {
            ok: false,
            result: Value::Null,
            error: Some(err.to_string()),
        }
    }
}

/// String entries of a JSON list and whether anything else was in it
///
/// A value that is not a list at all is rejected outright.
fn string_list(value: &Value) -> Result<(Vec<String>, bool)> {
    let Value::Array(items) = value else {
        tracing::warn!("Expected a list, got {}", value);
        return Err(SelectError::Validation("expected a list of names".to_string()));
    };
    let names: Vec<String> = items
        .iter()
        .filter_map(|item| item.as_str().map(str::to_string))
        .collect();
    let malformed = names.len() != items.len();
    Ok((names, malformed))
}

/// Apply `op` to the string entries of `value`, then report malformed ones
fn with_list<F>(value: &Value, op: F) -> Result<Value>
where
    F: FnOnce(&[String]) -> Result<()>,
{
    let (names, malformed) = string_list(value)?;
    op(&names)?;
    if malformed {
        tracing::warn!("List has non-string values");
        return Err(SelectError::Validation("list has non-string values".to_string()));
    }
    Ok(Value::Null)
}

fn names(keys: &[crate::package::ItemKey]) -> Vec<&str> {
    keys.iter().map(|k| k.name.as_str()).collect()
}

/// `REQUIRE`/`ADD`/`CONFLICT`/`OBSOLETE` view of dependency maps
///
/// `items` names the member list of each group (`packages` or `selections`).
pub fn dependency_report(maps: &DependencyMaps, items: &str, obsoletes: bool) -> Value {
    let require: Vec<Value> = maps
        .unsolved
        .iter()
        .map(|(tag, candidates)| json!({ "tag": tag, items: names(candidates) }))
        .collect();
    let conflict: Vec<Value> = maps
        .conflicts
        .iter()
        .map(|(key, others)| json!({ "name": key.name, items: names(others) }))
        .collect();

    let mut report = json!({
        "REQUIRE": require,
        "ADD": names(&maps.additional),
        "CONFLICT": conflict,
    });
    if obsoletes {
        let rows: Vec<Value> = maps
            .obsoletes
            .iter()
            .map(|entry| {
                json!([
                    entry.obsoletes.name,
                    entry.obsoletes.version,
                    names(&entry.obsoletes_dependents),
                    entry.obsoleted.name,
                    entry.obsoleted.version,
                    names(&entry.obsoleted_dependents),
                ])
            })
            .collect();
        report["OBSOLETE"] = Value::from(rows);
    }
    report
}

impl Engine {
    /// Run one command
    pub fn dispatch(&mut self, command: Command) -> Response {
        tracing::debug!("dispatch: {:?}", command);
        match self.execute(command) {
            Ok(result) => Response::success(result),
            Err(err) => {
                if err.is_warning() {
                    tracing::warn!("{}", err);
                } else {
                    tracing::error!("{}", err);
                }
                Response::failure(&err)
            }
        }
    }

    /// Parse and run one JSON command line
    pub fn dispatch_json(&mut self, line: &str) -> Response {
        match serde_json::from_str::<Command>(line) {
            Ok(command) => self.dispatch(command),
            Err(e) => Response::failure(&SelectError::Validation(e.to_string())),
        }
    }

    fn execute(&mut self, command: Command) -> Result<Value> {
        let done = |_: ()| Value::Null;
        match command {
            Command::SetEnvironment {
                catalog,
                installed_db,
                update,
                force_init,
            } => {
                let changed = self.reconfigure(Environment {
                    catalog,
                    installed_db,
                    update,
                    force_init,
                })?;
                Ok(json!(changed))
            }
            Command::SetInstallSelection {
                packages,
                keep_single,
            } => {
                let selector = self.packages_mut()?;
                with_list(&packages, |names| {
                    selector.set_install_selection(names, keep_single)
                })
            }
            Command::SetDeleteSelection { packages } => {
                let selector = self.packages_mut()?;
                with_list(&packages, |names| selector.set_delete_selection(names))
            }
            Command::SetUpdateSelection { packages } => {
                let selector = self.packages_mut()?;
                with_list(&packages, |names| selector.set_update_selection(names))
            }
            Command::SelectInstall { name, automatic } => self
                .packages_mut()?
                .select_install(&name, automatic)
                .map(done),
            Command::SelectInstallList {
                packages,
                automatic,
            } => {
                let selector = self.packages_mut()?;
                with_list(&packages, |names| {
                    selector.select_install_list(names, automatic)
                })
            }
            Command::SelectUpdate { name } => self.packages_mut()?.select_update(&name).map(done),
            Command::SelectUpdateList { packages } => {
                let selector = self.packages_mut()?;
                with_list(&packages, |names| selector.select_update_list(names))
            }
            Command::SelectDelete { name } => self.packages_mut()?.select_delete(&name).map(done),
            Command::DeselectInstall { name } => {
                self.packages_mut()?.deselect_install(&name).map(done)
            }
            Command::DeselectDelete { name } => {
                self.packages_mut()?.deselect_delete(&name).map(done)
            }
            Command::DeselectUpdate { name } => {
                self.packages_mut()?.deselect_update(&name).map(done)
            }
            Command::SelectSelInstall { name, reset } => {
                self.groups_mut()?.select_install(&name, reset).map(done)
            }
            Command::DeselectSelInstall { name } => {
                self.groups_mut()?.deselect_install(&name).map(done)
            }
            Command::IgnoreConflict { a, b } => {
                self.packages_mut()?.ignore_conflict(&a, &b);
                Ok(Value::Null)
            }
            Command::IgnoreUnsolvedRequirement { tag } => {
                self.packages_mut()?.ignore_unsolved_requirement(&tag);
                Ok(Value::Null)
            }
            Command::IgnoreAdditional { tag } => {
                self.packages_mut()?.ignore_additional(&tag);
                Ok(Value::Null)
            }
            Command::IgnoreSelConflict { a, b } => {
                self.groups_mut()?.ignore_conflict(&a, &b);
                Ok(Value::Null)
            }
            Command::IgnoreSelUnsolvedRequirement { tag } => {
                self.groups_mut()?.ignore_unsolved_requirement(&tag);
                Ok(Value::Null)
            }
            Command::SetSourceInstallation { install } => {
                self.packages_mut()?.set_source_installation(install);
                Ok(Value::Null)
            }
            Command::GetDependencies => Ok(dependency_report(
                self.packages()?.maps(),
                "packages",
                true,
            )),
            Command::GetSelDependencies => Ok(dependency_report(
                self.groups()?.maps(),
                "selections",
                false,
            )),
            Command::GetBreakingPackageList { name } => {
                Ok(json!(self.packages()?.breaking_packages(&name)))
            }
            Command::GetPackageStatus { name } => Ok(json!(self.packages()?.package_status(&name))),
            Command::GetInstallSet => Ok(json!(self.packages()?.install_set())),
            Command::GetDeleteSet => Ok(json!(self.packages()?.delete_set())),
            Command::GetUpdateSet => Ok(json!(self.packages()?.update_set())),
            Command::GetUpdateCandidates => Ok(json!(self.packages()?.update_candidates())),
            Command::GetSelInstallSet => Ok(json!(self.groups()?.install_set())),
            Command::GetSelPackages => Ok(json!(self.groups()?.sel_packages())),
            Command::IsSingleSelected => Ok(json!(self.is_single_selected()?)),
            Command::IsInstallSelected => Ok(json!(self.packages()?.is_install_selected())),
            Command::SaveState => self.save_state().map(done),
            Command::RestoreState => self.restore_state().map(done),
            Command::DeleteOldState => self.delete_old_state().map(done),
            Command::SavePackageSelections { path } => self.save_selections(&path).map(done),
            Command::LoadPackageSelections { path } => self.load_selections(&path).map(done),
        }
    }
}
