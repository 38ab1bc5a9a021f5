//! Swingline - storage fault events from ESXi vm-support bundles

use anyhow::Result;
use clap::Parser;
use std::process::ExitCode;
use tracing::error;

use swingline::cli::Cli;
use swingline::logging::{self, Verbosity};

fn main() -> Result<ExitCode> {
    let cli = Cli::parse();

    logging::init(
        Verbosity::from_flags(cli.debug, cli.quiet, cli.silent),
        cli.log_file.as_deref(),
    )?;

    match swingline::run(&cli) {
        Ok(outcome) if outcome.status.is_empty() => Ok(ExitCode::FAILURE),
        Ok(_) => Ok(ExitCode::SUCCESS),
        Err(e) => {
            error!("{:#}", e);
            Ok(ExitCode::FAILURE)
        }
    }
}
