//! Swingline - storage fault mining for ESXi vm-support bundles
//!
//! Command line front end: argument parsing, logging, the dataset check and
//! report export around the `swingline_common` walker.

pub mod check;
pub mod cli;
pub mod logging;
pub mod report;

use anyhow::Result;
use std::path::PathBuf;
use swingline_common::{resolve_roots, BundleWalker, Config, EventStore};
use tracing::info;

use crate::check::{check_dataset, DatasetStatus};
use crate::cli::Cli;
use crate::report::Reporter;

/// Result of one command line run
#[derive(Debug)]
pub struct RunOutcome {
    pub status: DatasetStatus,
    pub reports: Vec<PathBuf>,
}

/// Walk the bundles named on the command line and export the reports.
///
/// Fails only when no bundle directory exists or a report cannot be written.
/// Reports are skipped for an empty dataset.
pub fn run(cli: &Cli) -> Result<RunOutcome> {
    let mut config = Config::load(cli.config.as_deref());
    cli.apply_overrides(&mut config);

    let roots = resolve_roots(&cli.bundle_dirs)?;
    info!(
        "Swingline v{} - scanning {} bundle director{}",
        env!("SWINGLINE_VERSION"),
        roots.len(),
        if roots.len() == 1 { "y" } else { "ies" }
    );

    let walker = BundleWalker::new(config.scan.clone());
    let mut store = EventStore::new();
    walker.walk_into(&roots, &mut store);

    let status = check_dataset(&store);
    if status.is_empty() {
        return Ok(RunOutcome {
            status,
            reports: Vec::new(),
        });
    }

    let output_dir = config
        .report
        .output_dir
        .clone()
        .unwrap_or_else(|| PathBuf::from("."));
    let reporter = Reporter::new(output_dir, config.report.top_n);
    let reports = reporter.export(&store, &cli.export_formats(&config))?;

    Ok(RunOutcome { status, reports })
}
