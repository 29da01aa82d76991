use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use pkgselect::cli::{self, Commands};
use pkgselect::config::Config;

#[derive(Parser)]
#[command(name = "pkgselect")]
#[command(author, version, about = "Installer package selection engine", long_about = None)]
struct Cli {
    /// Configuration file
    #[arg(short, long, global = true, env = "PKGSELECT_CONFIG")]
    config: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = Config::load(cli.config.as_deref())?;

    // Logs go to stderr so `run` output stays machine-readable
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.logging.level))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    cli::execute(cli.command, &config)
}
