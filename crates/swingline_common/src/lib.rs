//! Swingline Common - storage fault mining for ESXi vm-support bundles.
//!
//! Walks bundle directories, resolves each bundle's host identity and
//! device-to-datastore mapping, and classifies vmkernel/vobd log lines into
//! typed storage events.

pub mod classifier;
pub mod codes;
pub mod config;
pub mod context;
pub mod error;
pub mod event;
pub mod patterns;
pub mod store;
pub mod walker;

pub use classifier::{IngestStats, LineClassifier};
pub use codes::{translate_command, translate_sense};
pub use config::{Config, ExportFormat, ReportConfig, ScanConfig};
pub use context::HostContext;
pub use error::{ExtractError, SwinglineError};
pub use event::{Category, Event, EventId, Field, World};
pub use store::EventStore;
pub use walker::{resolve_roots, BundleWalker, Compression, LogSource, WalkSummary};
