//! Run command implementation

use std::fs::File;
use std::io::{self, BufRead, BufReader, Write};
use std::path::Path;

use anyhow::{Context, Result};

use crate::config::Config;
use crate::engine::Engine;

/// Feed every non-empty, non-comment line to the dispatcher
pub fn run(script: Option<&Path>, config: &Config) -> Result<()> {
    let mut engine = Engine::new();

    // Scripts may bring their own setEnvironment
    if config.environment.catalog.exists() {
        engine.reconfigure(config.environment()).with_context(|| {
            format!(
                "Failed to load environment from {}",
                config.environment.catalog.display()
            )
        })?;
    }

    let reader: Box<dyn BufRead> = match script {
        Some(path) => Box::new(BufReader::new(
            File::open(path).with_context(|| format!("Failed to open script: {}", path.display()))?,
        )),
        None => Box::new(io::stdin().lock()),
    };

    let stdout = io::stdout();
    let mut out = stdout.lock();
    for (number, line) in reader.lines().enumerate() {
        let line = line.with_context(|| format!("Failed to read line {}", number + 1))?;
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        let response = engine.dispatch_json(line);
        serde_json::to_writer(&mut out, &response)?;
        writeln!(out)?;
    }
    out.flush()?;

    Ok(())
}
