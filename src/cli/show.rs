//! Show command implementation

use std::path::Path;

use anyhow::Result;
use colored::Colorize;

use crate::config::Config;
use crate::solver::DependencyMaps;

pub fn run(selection: Option<&Path>, config: &Config) -> Result<()> {
    let mut engine = super::open_engine(config)?;
    let path = selection.unwrap_or(config.state.selection_file.as_path());

    println!("{} {}", "Selection:".bold(), path.display().to_string().cyan());
    super::load_selection(&mut engine, path)?;
    println!();

    let session = engine.session()?;

    let groups = session.groups.install_set();
    println!("{}", "Selections:".bold());
    if groups.is_empty() {
        println!("  (none)");
    }
    for name in &groups {
        println!("  {} {}", "✓".green(), name);
    }
    println!();

    let packages = &session.packages;
    let install = packages.install_set();
    println!("{} {}", "Packages to install:".bold(), install.len());
    for name in &install {
        let version = session.catalog.version(name);
        let marker = if packages.maps().is_additional(name) {
            "(auto)".dimmed().to_string()
        } else {
            String::new()
        };
        println!("  {} {} {}", name, version.dimmed(), marker);
    }

    let delete = packages.delete_set();
    if !delete.is_empty() {
        println!();
        println!("{} {}", "Packages to delete:".bold(), delete.len());
        for name in &delete {
            println!("  {} {}", "-".red(), name);
        }
    }

    let update = packages.update_set();
    if !update.is_empty() {
        println!();
        println!("{} {}", "Packages to update:".bold(), update.len());
        for name in &update {
            println!("  {} {}", "↑".cyan(), name);
        }
    }

    print_findings(packages.maps());

    Ok(())
}

fn print_findings(maps: &DependencyMaps) {
    if maps.is_clean() {
        println!();
        println!("{} No dependency problems", "✓".green());
        return;
    }

    if !maps.unsolved.is_empty() {
        println!();
        println!("{}", "Unsolved requirements:".yellow().bold());
        for (tag, candidates) in &maps.unsolved {
            let names: Vec<&str> = candidates.iter().map(|k| k.name.as_str()).collect();
            if names.is_empty() {
                println!("  {} {}", tag.bold(), "(no provider)".red());
            } else {
                println!("  {} one of: {}", tag.bold(), names.join(", "));
            }
        }
    }

    if !maps.conflicts.is_empty() {
        println!();
        println!("{}", "Conflicts:".red().bold());
        for (key, others) in &maps.conflicts {
            for other in others {
                println!("  {} {} {}", key.to_string().bold(), "conflicts with".red(), other);
            }
        }
    }

    if !maps.obsoletes.is_empty() {
        println!();
        println!("{}", "Obsoletes:".yellow().bold());
        for entry in &maps.obsoletes {
            println!(
                "  {} {} {}",
                entry.obsoletes.to_string().bold(),
                "obsoletes".yellow(),
                entry.obsoleted
            );
        }
    }
}
