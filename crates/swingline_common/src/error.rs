//! Error types for Swingline.
//!
//! Discovery and read failures (`SwinglineError::Io`) are recoverable at the
//! walk boundary. Record construction failures (`ExtractError`) are logged and
//! the line is dropped. Lookup misses are not errors at all; the translators
//! and the datastore lookup return sentinels instead.

use std::path::PathBuf;
use thiserror::Error;

use crate::event::Category;

#[derive(Error, Debug)]
pub enum SwinglineError {
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("No vm-support bundle directory exists among: {0}")]
    NoBundleRoots(String),

    #[error("Invalid config file {path}: {source}")]
    Config {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
}

impl SwinglineError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        SwinglineError::Io {
            path: path.into(),
            source,
        }
    }
}

/// Malformed input found while building an event from a matched line
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ExtractError {
    #[error("{category} signature matched but fields could not be extracted")]
    Unparsed { category: Category },

    #[error("field {field} has invalid numeric value \"{value}\"")]
    InvalidNumber { field: &'static str, value: String },
}

pub type Result<T> = std::result::Result<T, SwinglineError>;
