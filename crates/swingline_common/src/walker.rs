//! vm-support bundle traversal
//!
//! Walks one or more root directories, groups the interesting files by the
//! bundle they belong to, and feeds them through the classifier. A file is
//! picked up only when:
//! - its name is a uname, extent list, or vmkernel/vobd log name,
//! - its resolved path passes through a `var/` or `commands/` directory,
//!   which must lie inside the owning bundle when there is one,
//! - the path itself is not a symlink.
//!
//! Directory symlinks are followed. Entries are visited in file name order.
//! Directories at `max_depth` have their files read but are not descended.
//! By default each bundle's uname and extent list are read before its logs
//! so every event sees the fully resolved host context, whatever the
//! directory layout.

use flate2::read::GzDecoder;
use std::collections::{HashMap, HashSet};
use std::fs::{self, File};
use std::io::{self, BufRead, BufReader};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};
use walkdir::WalkDir;

use crate::classifier::{IngestStats, LineClassifier};
use crate::config::ScanConfig;
use crate::context::HostContext;
use crate::error::{Result, SwinglineError};
use crate::patterns::{patterns, FileKind};
use crate::store::EventStore;

/// Bundle subdirectories that hold real command output and logs
const BUNDLE_SUBDIRS: [&str; 2] = ["var", "commands"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Compression {
    Plain,
    Gzip,
}

/// One log file of a bundle, opened on demand
#[derive(Debug, Clone)]
pub struct LogSource {
    pub path: PathBuf,
    pub compression: Compression,
    /// Root directory of the owning bundle
    pub bundle_root: PathBuf,
}

impl LogSource {
    pub fn new(path: impl Into<PathBuf>, compression: Compression, bundle_root: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            compression,
            bundle_root: bundle_root.into(),
        }
    }

    /// Source for a discovered file, `None` for metadata files
    pub fn from_kind(path: &Path, kind: FileKind, bundle_root: &Path) -> Option<Self> {
        let compression = match kind {
            FileKind::PlainLog => Compression::Plain,
            FileKind::GzipLog => Compression::Gzip,
            FileKind::Hostname | FileKind::ExtentList => return None,
        };
        Some(Self::new(path, compression, bundle_root))
    }

    pub fn file_name(&self) -> String {
        self.path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default()
    }

    /// Line reader, transparently decompressing gzip
    pub fn open(&self) -> io::Result<Box<dyn BufRead>> {
        let file = File::open(&self.path)?;
        Ok(match self.compression {
            Compression::Plain => Box::new(BufReader::new(file)),
            Compression::Gzip => Box::new(BufReader::new(GzDecoder::new(file))),
        })
    }
}

/// Outcome of a walk, for logging and for the report layer
#[derive(Debug, Default)]
pub struct WalkSummary {
    /// Host context of every bundle seen, in discovery order
    pub bundles: Vec<HostContext>,
    /// Eligible files discovered
    pub files: usize,
    /// Eligible files that could not be opened or read
    pub unreadable: usize,
    /// Directories not descended because of the depth cap
    pub depth_limited: usize,
    pub ingest: IngestStats,
}

#[derive(Debug)]
struct DiscoveredFile {
    path: PathBuf,
    kind: FileKind,
}

#[derive(Debug)]
struct PendingBundle {
    context: HostContext,
    files: Vec<DiscoveredFile>,
}

/// Bundles keyed by root path, kept in discovery order
#[derive(Debug, Default)]
struct BundleCatalog {
    bundles: Vec<PendingBundle>,
    index: HashMap<PathBuf, usize>,
    seen_files: HashSet<PathBuf>,
}

impl BundleCatalog {
    fn open(&mut self, root: &Path) -> usize {
        if let Some(&idx) = self.index.get(root) {
            return idx;
        }
        debug!("Found vm-support bundle \"{}\"", root.display());
        self.bundles.push(PendingBundle {
            context: HostContext::new(root),
            files: Vec::new(),
        });
        let idx = self.bundles.len() - 1;
        self.index.insert(root.to_path_buf(), idx);
        idx
    }

    /// Returns false when the same path was already queued
    fn add_file(&mut self, bundle_root: &Path, file: DiscoveredFile) -> bool {
        if !self.seen_files.insert(file.path.clone()) {
            return false;
        }
        let idx = self.open(bundle_root);
        self.bundles[idx].files.push(file);
        true
    }
}

/// Resolve the walk roots, failing only when none of them exists
pub fn resolve_roots<P: AsRef<Path>>(roots: &[P]) -> Result<Vec<PathBuf>> {
    let mut resolved = Vec::new();
    for root in roots {
        let root = root.as_ref();
        match fs::canonicalize(root) {
            Ok(path) => resolved.push(path),
            Err(e) => warn!("Invalid vm-support bundle directory \"{}\": {}", root.display(), e),
        }
    }

    if resolved.is_empty() {
        let names: Vec<String> = roots
            .iter()
            .map(|r| r.as_ref().display().to_string())
            .collect();
        return Err(SwinglineError::NoBundleRoots(names.join(", ")));
    }
    Ok(resolved)
}

pub struct BundleWalker {
    config: ScanConfig,
    classifier: LineClassifier,
}

impl Default for BundleWalker {
    fn default() -> Self {
        Self::new(ScanConfig::default())
    }
}

impl BundleWalker {
    pub fn new(config: ScanConfig) -> Self {
        Self {
            config,
            classifier: LineClassifier::new(),
        }
    }

    pub fn config(&self) -> &ScanConfig {
        &self.config
    }

    /// Walk `roots` into a fresh store
    pub fn walk<P: AsRef<Path>>(&self, roots: &[P]) -> EventStore {
        let mut store = EventStore::new();
        self.walk_into(roots, &mut store);
        store
    }

    /// Walk `roots`, appending every event to `store`.
    ///
    /// Missing or unreadable roots and files are skipped.
    pub fn walk_into<P: AsRef<Path>>(&self, roots: &[P], store: &mut EventStore) -> WalkSummary {
        let mut summary = WalkSummary::default();
        let mut catalog = BundleCatalog::default();

        for root in roots {
            let root = root.as_ref();
            match fs::canonicalize(root) {
                Ok(root) => self.discover(&root, &mut catalog, &mut summary),
                Err(e) => debug!("Skipping root \"{}\": {}", root.display(), e),
            }
        }

        for pending in catalog.bundles {
            let context = self.process_bundle(pending, store, &mut summary);
            summary.bundles.push(context);
        }

        info!(
            "Walked {} bundle(s) - files {}, events {}, malformed {}",
            summary.bundles.len(),
            summary.files,
            summary.ingest.events,
            summary.ingest.malformed
        );
        summary
    }

    /// Classify every line of one log into `store` against `ctx`
    pub fn ingest_log(&self, source: &LogSource, ctx: &HostContext, store: &mut EventStore) -> Result<IngestStats> {
        let reader = source
            .open()
            .map_err(|e| SwinglineError::io(&source.path, e))?;

        self.classifier
            .ingest(reader, ctx, &source.file_name(), store)
            .map_err(|e| {
                warn!(
                    "Read error in \"{}\" - keeping events read so far: {}",
                    source.path.display(),
                    e
                );
                SwinglineError::io(&source.path, e)
            })
    }

    fn is_bundle_dir(&self, path: &Path) -> bool {
        let prefix = self.config.bundle_prefix.to_lowercase();
        path.file_name()
            .map(|name| name.to_string_lossy().to_lowercase().starts_with(&prefix))
            .unwrap_or(false)
    }

    /// Deepest enclosing bundle directory, else the walk root itself.
    ///
    /// Bundle directories above the walk root count, so a walk started
    /// inside a bundle still attributes its files to that bundle.
    fn owning_bundle(&self, path: &Path, root: &Path) -> PathBuf {
        path.ancestors()
            .skip(1)
            .find(|dir| self.is_bundle_dir(dir))
            .unwrap_or(root)
            .to_path_buf()
    }

    /// The resolved path must pass through a `var/` or `commands/`
    /// directory; inside a bundle that directory must belong to the bundle.
    fn is_eligible_path(&self, path: &Path, bundle_root: &Path) -> bool {
        if !has_bundle_subdir(path.parent()) {
            return false;
        }
        if !self.is_bundle_dir(bundle_root) {
            return true;
        }
        path.strip_prefix(bundle_root)
            .map(|relative| has_bundle_subdir(relative.parent()))
            .unwrap_or(false)
    }

    fn discover(&self, root: &Path, catalog: &mut BundleCatalog, summary: &mut WalkSummary) {
        let max_depth = self.config.max_depth;
        // Files inside a capped directory are still read, its subdirectories are not
        let entries = WalkDir::new(root)
            .follow_links(true)
            .max_depth(max_depth.saturating_add(1))
            .sort_by_file_name();
        let mut last_capped: Option<PathBuf> = None;

        for entry in entries {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    debug!("Error walking directory: {}", e);
                    continue;
                }
            };
            let path = entry.path();

            if entry.file_type().is_dir() {
                if entry.depth() > max_depth {
                    let capped = path.parent().map(Path::to_path_buf);
                    if capped != last_capped {
                        warn!(
                            "Reached maximum directory depth - depth {} at \"{}\"",
                            max_depth,
                            path.parent().unwrap_or(path).display()
                        );
                        summary.depth_limited += 1;
                        last_capped = capped;
                    }
                    // walkdir never descends past its own max_depth
                    continue;
                }
                if self.is_bundle_dir(path) {
                    catalog.open(path);
                }
                continue;
            }

            if entry.path_is_symlink() || !entry.file_type().is_file() {
                continue;
            }

            let Some(kind) = entry
                .file_name()
                .to_str()
                .and_then(|name| patterns().file_kind(name))
            else {
                continue;
            };

            let bundle_root = self.owning_bundle(path, root);
            if !self.is_eligible_path(path, &bundle_root) {
                debug!("Ignoring stray copy \"{}\"", path.display());
                continue;
            }

            let file = DiscoveredFile {
                path: path.to_path_buf(),
                kind,
            };
            if catalog.add_file(&bundle_root, file) {
                summary.files += 1;
            }
        }
    }

    fn process_bundle(&self, pending: PendingBundle, store: &mut EventStore, summary: &mut WalkSummary) -> HostContext {
        let PendingBundle { mut context, mut files } = pending;

        if self.config.metadata_first {
            // Stable: logs keep their traversal order
            files.sort_by_key(|file| file.kind.is_log());
        }

        // Collected per bundle, merged once the bundle is done
        let mut collected = EventStore::new();
        for file in &files {
            debug!(
                "Processing vm-support \"{}\" - file \"{}\"",
                context.bundle_id(),
                file.path.display()
            );

            match file.kind {
                FileKind::Hostname => match read_lines(&file.path) {
                    Ok(lines) => {
                        context.absorb_uname(&lines);
                    }
                    Err(e) => {
                        debug!("Skipping \"{}\": {}", file.path.display(), e);
                        summary.unreadable += 1;
                    }
                },
                FileKind::ExtentList => match read_lines(&file.path) {
                    Ok(lines) => {
                        context.absorb_extent_list(&lines);
                    }
                    Err(e) => {
                        debug!("Skipping \"{}\": {}", file.path.display(), e);
                        summary.unreadable += 1;
                    }
                },
                FileKind::PlainLog | FileKind::GzipLog => {
                    let Some(source) = LogSource::from_kind(&file.path, file.kind, context.root()) else {
                        continue;
                    };
                    match self.ingest_log(&source, &context, &mut collected) {
                        Ok(stats) => summary.ingest.add(&stats),
                        Err(e) => {
                            debug!("Skipping \"{}\": {}", file.path.display(), e);
                            summary.unreadable += 1;
                        }
                    }
                }
            }
        }

        info!(
            "Processed vm-support \"{}\" - host \"{}\", datastores {}, events {}",
            context.bundle_id(),
            context.host(),
            context.datastores().len(),
            collected.len()
        );
        store.merge(collected);
        context
    }
}

/// True when `dir` has a `var` or `commands` component
fn has_bundle_subdir(dir: Option<&Path>) -> bool {
    dir.map(|dir| {
        dir.components()
            .any(|c| BUNDLE_SUBDIRS.iter().any(|sub| c.as_os_str() == *sub))
    })
    .unwrap_or(false)
}

fn read_lines(path: &Path) -> io::Result<Vec<String>> {
    let bytes = fs::read(path)?;
    Ok(String::from_utf8_lossy(&bytes)
        .lines()
        .map(str::to_string)
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_eligible_path_inside_bundle() {
        let walker = BundleWalker::default();
        let root = Path::new("/b/esx-h-2016-05-02--10.11");
        let eligible = |p: &str| walker.is_eligible_path(Path::new(p), root);

        assert!(eligible("/b/esx-h-2016-05-02--10.11/var/run/log/vmkernel.log"));
        assert!(eligible("/b/esx-h-2016-05-02--10.11/commands/uname_-a.txt"));
        assert!(!eligible("/b/esx-h-2016-05-02--10.11/vmkernel.log"));
        assert!(!eligible("/b/esx-h-2016-05-02--10.11/variants/vmkernel.log"));
        assert!(!eligible("/elsewhere/var/vmkernel.log"));

        // A var/ above the bundle does not admit stray top-level copies
        let nested = Path::new("/var/tmp/esx-h-2016-05-02--10.11");
        assert!(!walker.is_eligible_path(Path::new("/var/tmp/esx-h-2016-05-02--10.11/vmkernel.log"), nested));
    }

    #[test]
    fn test_eligible_path_outside_any_bundle() {
        let walker = BundleWalker::default();
        let root = Path::new("/data/var/run/log");
        assert!(walker.is_eligible_path(Path::new("/data/var/run/log/vmkernel.log"), root));
        assert!(!walker.is_eligible_path(Path::new("/data/logs/vmkernel.log"), Path::new("/data")));
    }

    #[test]
    fn test_owning_bundle_prefers_deepest() {
        let walker = BundleWalker::default();
        let root = Path::new("/data");
        assert_eq!(
            walker.owning_bundle(Path::new("/data/esx-a/esx-b/var/log/vmkernel.log"), root),
            PathBuf::from("/data/esx-a/esx-b")
        );
        assert_eq!(
            walker.owning_bundle(Path::new("/data/loose/var/log/vmkernel.log"), root),
            PathBuf::from("/data")
        );
        // A walk started inside a bundle still belongs to that bundle
        assert_eq!(
            walker.owning_bundle(Path::new("/esx-up/var/run/log/vmkernel.log"), Path::new("/esx-up/var/run/log")),
            PathBuf::from("/esx-up")
        );
    }

    #[test]
    fn test_bundle_prefix_is_case_insensitive() {
        let walker = BundleWalker::default();
        assert!(walker.is_bundle_dir(Path::new("/x/ESX-host-2016-05-02--10.11")));
        assert!(!walker.is_bundle_dir(Path::new("/x/vm-support")));
    }

    #[test]
    fn test_log_source_from_kind() {
        let root = Path::new("/b");
        let gz = LogSource::from_kind(Path::new("/b/var/vmkernel.1.gz"), FileKind::GzipLog, root).unwrap();
        assert_eq!(gz.compression, Compression::Gzip);
        assert_eq!(gz.file_name(), "vmkernel.1.gz");
        assert!(LogSource::from_kind(Path::new("/b/commands/uname_-a.txt"), FileKind::Hostname, root).is_none());
    }

    #[test]
    fn test_resolve_roots() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("nope");

        let roots = resolve_roots(&[dir.path().to_path_buf(), missing.clone()]).unwrap();
        assert_eq!(roots.len(), 1);

        assert!(matches!(
            resolve_roots(&[missing]),
            Err(SwinglineError::NoBundleRoots(_))
        ));
    }
}
