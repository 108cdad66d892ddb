//! Runs the statement demonstration against a fresh in-memory database.
//!
//! Usage: `sqlite_statements [config.toml]`

use std::{io, path::PathBuf};

use anyhow::{Context, Result};

use sqlite_statements::{config, logging, DemoConfig, DemoRunner};

fn main() -> Result<()> {
    logging::log_to_stderr();

    let config = match std::env::args_os().nth(1).map(PathBuf::from) {
        Some(path) => config::load(&path)
            .with_context(|| format!("loading config from {}", path.display()))?,
        None => DemoConfig::default(),
    };

    let stdout = io::stdout();
    DemoRunner::new(config).run_and_report(&mut stdout.lock());
    Ok(())
}
