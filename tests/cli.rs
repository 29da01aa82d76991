//! Command-line behaviour of the pkgselect binary

use std::fs;
use std::path::Path;

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

const CATALOG: &str = r#"
[[packages]]
name = "b"
version = "1.0-1"
requires = ["c"]

[[packages]]
name = "c"
version = "1.0-1"

[[packages]]
name = "d"
version = "1.0-1"
requires = ["missing-lib"]

[[selections]]
name = "Minimal"
kind = "baseconf"
packages = ["b"]
"#;

/// Temp directory holding a catalog and a config pointing at it
fn setup() -> TempDir {
    let dir = TempDir::new().unwrap();
    let catalog = dir.path().join("catalog.toml");
    let selection = dir.path().join("selection.conf");
    fs::write(&catalog, CATALOG).unwrap();

    let config = format!(
        "[environment]\ncatalog = {:?}\n\n[state]\nselection_file = {:?}\n",
        catalog.display().to_string(),
        selection.display().to_string()
    );
    fs::write(dir.path().join("pkgselect.conf"), config).unwrap();
    dir
}

fn pkgselect(dir: &Path) -> Command {
    let mut cmd = Command::cargo_bin("pkgselect").unwrap();
    cmd.arg("--config")
        .arg(dir.join("pkgselect.conf"))
        .env("NO_COLOR", "1")
        .env_remove("RUST_LOG");
    cmd
}

#[test]
fn test_run_script_prints_one_response_per_command() {
    let dir = setup();
    let script = dir.path().join("script.jsonl");
    fs::write(
        &script,
        concat!(
            "# select b and look at the result\n",
            "{\"cmd\": \"selectInstall\", \"name\": \"b\"}\n",
            "\n",
            "{\"cmd\": \"getInstallSet\"}\n",
            "{\"cmd\": \"getPackageStatus\", \"name\": \"c\"}\n",
            "{\"cmd\": \"selectInstall\", \"name\": \"nope\"}\n",
        ),
    )
    .unwrap();

    let output = pkgselect(dir.path())
        .arg("run")
        .arg(&script)
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();
    let lines: Vec<&str> = std::str::from_utf8(&output).unwrap().lines().collect();
    assert_eq!(
        lines,
        vec![
            r#"{"ok":true,"result":null}"#,
            r#"{"ok":true,"result":["b","c"]}"#,
            r#"{"ok":true,"result":"a"}"#,
            r#"{"ok":false,"result":null,"error":"Not found: nope"}"#,
        ]
    );
}

#[test]
fn test_run_reads_stdin() {
    let dir = setup();
    pkgselect(dir.path())
        .arg("run")
        .write_stdin("{\"cmd\": \"getSelPackages\"}\n{\"cmd\": \"bogus\"}\n")
        .assert()
        .success()
        .stdout(predicate::str::contains(r#"{"ok":true,"result":[]}"#))
        .stdout(predicate::str::contains(r#""ok":false"#));
}

#[test]
fn test_status_uses_saved_selection() {
    let dir = setup();
    let selection = dir.path().join("selection.conf");
    let script = format!(
        "{{\"cmd\": \"selectInstall\", \"name\": \"b\"}}\n{{\"cmd\": \"savePackageSelections\", \"path\": {:?}}}\n",
        selection.display().to_string()
    );
    pkgselect(dir.path())
        .arg("run")
        .write_stdin(script)
        .assert()
        .success();
    assert!(selection.exists());

    pkgselect(dir.path())
        .args(["status", "b", "c", "zzz"])
        .assert()
        .success()
        .stdout(predicate::str::contains("[X] b (install-selected)"))
        .stdout(predicate::str::contains("[a] c"))
        .stdout(predicate::str::contains("zzz not found"));
}

#[test]
fn test_show_reports_unsolved_requirement() {
    let dir = setup();
    let selection = dir.path().join("other.conf");
    fs::write(
        &selection,
        "+packages:\nd SELECTED\nghost SELECTED\n-packages:\n+selections:\nMinimal SELECTED\n-selections:\n",
    )
    .unwrap();

    pkgselect(dir.path())
        .arg("show")
        .arg("--selection")
        .arg(&selection)
        .assert()
        .success()
        .stdout(predicate::str::contains("Not found: ghost"))
        .stdout(predicate::str::contains("Packages to install: 3"))
        .stdout(predicate::str::contains("Unsolved requirements:"))
        .stdout(predicate::str::contains("missing-lib"));
}

#[test]
fn test_show_fails_without_catalog() {
    let dir = TempDir::new().unwrap();
    fs::write(
        dir.path().join("pkgselect.conf"),
        "[environment]\ncatalog = \"/nonexistent/catalog.toml\"\n",
    )
    .unwrap();

    pkgselect(dir.path())
        .arg("show")
        .assert()
        .failure()
        .stderr(predicate::str::contains("Failed to load environment"));
}
