//! Command-line interface for pkgselect

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Subcommand;
use colored::Colorize;

use crate::config::Config;
use crate::engine::Engine;

mod run;
mod show;
mod status;

#[derive(Subcommand)]
pub enum Commands {
    /// Execute JSON commands, one per line
    Run {
        /// Script file (reads stdin when omitted)
        script: Option<PathBuf>,
    },

    /// Show the install set and dependency findings of a selection file
    Show {
        /// Selection file (default from configuration)
        #[arg(long)]
        selection: Option<PathBuf>,
    },

    /// Show the selection status of packages
    Status {
        /// Package name(s)
        #[arg(required = true)]
        packages: Vec<String>,
    },
}

/// Execute a CLI command
pub fn execute(command: Commands, config: &Config) -> Result<()> {
    match command {
        Commands::Run { script } => run::run(script.as_deref(), config),
        Commands::Show { selection } => show::run(selection.as_deref(), config),
        Commands::Status { packages } => status::run(&packages, config),
    }
}

/// Engine with the configured environment loaded
fn open_engine(config: &Config) -> Result<Engine> {
    let mut engine = Engine::new();
    engine.reconfigure(config.environment()).with_context(|| {
        format!(
            "Failed to load environment from {}",
            config.environment.catalog.display()
        )
    })?;
    Ok(engine)
}

/// Load a selection file, printing warnings about unknown items
fn load_selection(engine: &mut Engine, path: &std::path::Path) -> Result<()> {
    match engine.load_selections(path) {
        Ok(()) => Ok(()),
        Err(err) if err.is_warning() => {
            println!("  {} {}", "!".yellow(), err.to_string().yellow());
            Ok(())
        }
        Err(err) => {
            Err(err).with_context(|| format!("Failed to load selection: {}", path.display()))
        }
    }
}
