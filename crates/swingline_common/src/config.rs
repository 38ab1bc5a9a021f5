//! Configuration management for swingline.
//!
//! Loads settings from an explicit path, else /etc/swingline/config.toml,
//! else built-in defaults.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use crate::error::{Result, SwinglineError};

/// Config file path
pub const CONFIG_PATH: &str = "/etc/swingline/config.toml";

/// Bundle walk configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanConfig {
    /// Deepest directory level below each root that is still read; its
    /// subdirectories are skipped
    #[serde(default = "default_max_depth")]
    pub max_depth: usize,

    /// Directory name prefix that marks a vm-support bundle root
    #[serde(default = "default_bundle_prefix")]
    pub bundle_prefix: String,

    /// Read each bundle's uname and extent list before its logs
    #[serde(default = "default_metadata_first")]
    pub metadata_first: bool,
}

fn default_max_depth() -> usize {
    32
}

fn default_bundle_prefix() -> String {
    "esx-".to_string()
}

fn default_metadata_first() -> bool {
    true
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            max_depth: default_max_depth(),
            bundle_prefix: default_bundle_prefix(),
            metadata_first: default_metadata_first(),
        }
    }
}

/// Report output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExportFormat {
    Csv,
    Json,
    Summary,
}

impl ExportFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            ExportFormat::Csv => "csv",
            ExportFormat::Json => "json",
            ExportFormat::Summary => "txt",
        }
    }
}

/// Report configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportConfig {
    #[serde(default = "default_formats")]
    pub formats: Vec<ExportFormat>,

    /// Values listed per field in the summary
    #[serde(default = "default_top_n")]
    pub top_n: usize,

    /// Directory for report files (current directory when unset)
    #[serde(default)]
    pub output_dir: Option<PathBuf>,
}

fn default_formats() -> Vec<ExportFormat> {
    vec![ExportFormat::Csv, ExportFormat::Summary]
}

fn default_top_n() -> usize {
    10
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            formats: default_formats(),
            top_n: default_top_n(),
            output_dir: None,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub scan: ScanConfig,

    #[serde(default)]
    pub report: ReportConfig,
}

impl Config {
    /// Load config from `path`, else the system path, else defaults
    pub fn load(path: Option<&Path>) -> Self {
        if let Some(path) = path {
            return Self::load_from_path(path).unwrap_or_else(|e| {
                warn!("{} - using defaults", e);
                Config::default()
            });
        }

        let system = Path::new(CONFIG_PATH);
        if !system.exists() {
            return Config::default();
        }
        Self::load_from_path(system).unwrap_or_else(|e| {
            warn!("{} - using defaults", e);
            Config::default()
        })
    }

    /// Load config from specific path
    pub fn load_from_path(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|e| SwinglineError::io(path, e))?;
        let config: Config = toml::from_str(&content).map_err(|source| SwinglineError::Config {
            path: path.to_path_buf(),
            source,
        })?;
        info!("Loaded config from {}", path.display());
        Ok(config)
    }
}
