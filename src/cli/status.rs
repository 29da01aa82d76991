//! Status command implementation

use anyhow::Result;
use colored::Colorize;

use crate::config::Config;
use crate::package::SingleSelect;

pub fn run(packages: &[String], config: &Config) -> Result<()> {
    let mut engine = super::open_engine(config)?;

    let path = config.state.selection_file.clone();
    if path.exists() {
        super::load_selection(&mut engine, &path)?;
    }

    let selector = engine.packages()?;
    for name in packages {
        let Some(record) = selector.record(name) else {
            println!("  {} {}", name.bold(), "not found".red());
            continue;
        };

        let letter = match selector.package_status(name) {
            "" => " ".normal(),
            "X" => "X".green(),
            "a" => "a".cyan(),
            "d" => "d".red(),
            "u" => "u".yellow(),
            other => other.normal(),
        };
        let note = if record.single_select != SingleSelect::No {
            format!("({})", record.single_select).dimmed().to_string()
        } else {
            String::new()
        };
        println!("  [{}] {} {}", letter, name.bold(), note);
    }

    Ok(())
}
