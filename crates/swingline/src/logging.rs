//! Logging setup
//!
//! Console output honours `RUST_LOG` when set, otherwise the level chosen on
//! the command line. A log file always records at debug level.

use anyhow::{Context, Result};
use std::fs::OpenOptions;
use std::path::Path;
use std::sync::Mutex;
use tracing_subscriber::EnvFilter;

/// Console verbosity picked from the command line flags
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verbosity {
    Silent,
    Quiet,
    Normal,
    Debug,
}

impl Verbosity {
    /// `silent` wins over `debug`, which wins over `quiet`
    pub fn from_flags(debug: bool, quiet: bool, silent: bool) -> Self {
        if silent {
            Verbosity::Silent
        } else if debug {
            Verbosity::Debug
        } else if quiet {
            Verbosity::Quiet
        } else {
            Verbosity::Normal
        }
    }

    pub fn directive(&self) -> &'static str {
        match self {
            Verbosity::Silent => "off",
            Verbosity::Quiet => "warn",
            Verbosity::Normal => "info",
            Verbosity::Debug => "debug",
        }
    }
}

/// Install the global subscriber
pub fn init(verbosity: Verbosity, log_file: Option<&Path>) -> Result<()> {
    if let Some(path) = log_file {
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .with_context(|| format!("Failed to open log file {}", path.display()))?;

        tracing_subscriber::fmt()
            .with_env_filter(EnvFilter::new("debug"))
            .with_ansi(false)
            .with_writer(Mutex::new(file))
            .init();
        return Ok(());
    }

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(verbosity.directive())),
        )
        .with_target(false)
        .init();
    Ok(())
}
