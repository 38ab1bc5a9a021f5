//! CLI - Command-line argument parsing
//!
//! Keeps argument parsing separate from execution logic.

use clap::{Parser, ValueEnum};
use std::path::PathBuf;
use swingline_common::{Config, ExportFormat};

/// Swingline - storage fault mining for ESXi vm-support bundles
#[derive(Parser, Debug)]
#[command(name = "swingline")]
#[command(about = "Swingline - storage fault events from ESXi vm-support bundles", long_about = None)]
#[command(version = env!("SWINGLINE_VERSION"))]
pub struct Cli {
    /// Extracted vm-support bundle directories (or directories holding them)
    #[arg(value_name = "BUNDLE_DIR", default_value = ".")]
    pub bundle_dirs: Vec<PathBuf>,

    /// Export report(s) in the given format
    #[arg(short, long, value_enum, default_value_t = ExportArg::Default)]
    pub export: ExportArg,

    /// Directory for exported reports (defaults to the current directory)
    #[arg(short, long = "rpt-dir", value_name = "DIR")]
    pub rpt_dir: Option<PathBuf>,

    /// Config file (defaults to /etc/swingline/config.toml when present)
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Log to this file instead of the console
    #[arg(short, long = "log-file", value_name = "FILE")]
    pub log_file: Option<PathBuf>,

    /// Console logging level is debug
    #[arg(short = 'v', long)]
    pub debug: bool,

    /// Console logging level is warning and higher
    #[arg(short, long, conflicts_with = "debug")]
    pub quiet: bool,

    /// No console logging
    #[arg(short, long)]
    pub silent: bool,

    /// Process bundle files strictly in traversal order
    #[arg(long)]
    pub single_pass: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ExportArg {
    /// CSV, JSON and summary
    All,
    /// Formats from the config file (CSV and summary unless configured)
    Default,
    /// No report files
    None,
    Csv,
    Json,
    Summary,
}

impl Cli {
    /// Report formats to write, resolved against the config file
    pub fn export_formats(&self, config: &Config) -> Vec<ExportFormat> {
        match self.export {
            ExportArg::All => vec![ExportFormat::Csv, ExportFormat::Json, ExportFormat::Summary],
            ExportArg::Default => config.report.formats.clone(),
            ExportArg::None => Vec::new(),
            ExportArg::Csv => vec![ExportFormat::Csv],
            ExportArg::Json => vec![ExportFormat::Json],
            ExportArg::Summary => vec![ExportFormat::Summary],
        }
    }

    /// Command line overrides applied on top of the loaded config
    pub fn apply_overrides(&self, config: &mut Config) {
        if self.single_pass {
            config.scan.metadata_first = false;
        }
        if let Some(dir) = &self.rpt_dir {
            config.report.output_dir = Some(dir.clone());
        }
    }
}
