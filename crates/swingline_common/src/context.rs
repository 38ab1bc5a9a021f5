//! Per-bundle host context
//!
//! A `HostContext` is opened for every vm-support bundle directory the walker
//! meets and is filled in as the bundle's `uname_-a.txt` and VMFS extent
//! listing are read. Log lines from the same bundle are enriched from it.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::event::DATASTORE_UNKNOWN;
use crate::patterns::patterns;

/// Host used when neither uname nor the bundle path yields anything
const UNKNOWN_HOST: &str = "unknown";

#[derive(Debug, Clone)]
pub struct HostContext {
    root: PathBuf,
    bundle_id: String,
    fallback_host: String,
    hostname: String,
    datastores: HashMap<String, String>,
}

impl HostContext {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        let bundle_id = root
            .file_name()
            .map(|name| name.to_string_lossy().to_lowercase())
            .filter(|name| !name.is_empty())
            .unwrap_or_else(|| root.to_string_lossy().to_lowercase());

        // esx-<product>-<date>--<time> names carry the host; otherwise the
        // directory name itself is the best identity available
        let fallback_host = patterns()
            .bundle_name
            .captures(&bundle_id)
            .map(|caps| caps["product"].to_string())
            .unwrap_or_else(|| bundle_id.clone());

        let fallback_host = if fallback_host.trim().is_empty() {
            UNKNOWN_HOST.to_string()
        } else {
            fallback_host
        };

        Self {
            root,
            bundle_id,
            fallback_host,
            hostname: String::new(),
            datastores: HashMap::new(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Lower-cased bundle directory name, e.g. `esx-esx01-2016-05-02--10.11`
    pub fn bundle_id(&self) -> &str {
        &self.bundle_id
    }

    /// Hostname parsed from uname output, empty until resolved
    pub fn hostname(&self) -> &str {
        &self.hostname
    }

    pub fn has_hostname(&self) -> bool {
        !self.hostname.is_empty()
    }

    /// Host recorded on events: the uname hostname, else the path-derived id
    pub fn host(&self) -> &str {
        if self.hostname.is_empty() {
            &self.fallback_host
        } else {
            &self.hostname
        }
    }

    pub fn fallback_host(&self) -> &str {
        &self.fallback_host
    }

    /// Scan `uname -a` output for the `VMkernel <hostname>` marker.
    ///
    /// Returns true when a hostname was found. The last matching line wins.
    pub fn absorb_uname<I, S>(&mut self, lines: I) -> bool
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut found = false;
        for line in lines {
            if let Some(caps) = patterns().uname_marker.captures(line.as_ref().trim()) {
                self.hostname = caps["host"].to_lowercase();
                found = true;
            }
        }

        if !found {
            debug!(
                "Missing vm-support bundle \"{}\" uname hostname - using hostname \"{}\"",
                self.bundle_id, self.fallback_host
            );
        }
        found
    }

    /// Read `localcli storage vmfs extent list` output into the device map.
    ///
    /// Header and separator lines are skipped. Later rows for the same
    /// extent overwrite earlier ones. Returns the number of rows recorded.
    pub fn absorb_extent_list<I, S>(&mut self, lines: I) -> usize
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut recorded = 0;
        for line in lines {
            let line = line.as_ref().trim_end();
            if line.is_empty() || patterns().extent_header.is_match(line) {
                continue;
            }

            match patterns().extent_row.captures(line) {
                Some(caps) => {
                    let extent = caps["extent"].trim();
                    let datastore = caps["dsname"].trim();
                    if !extent.is_empty() && !datastore.is_empty() {
                        self.insert_datastore(extent, datastore);
                        recorded += 1;
                    }
                }
                None => {
                    debug!(
                        "Missing information from vm-support \"{}\" - vmfs extent row \"{}\"",
                        self.bundle_id, line
                    );
                }
            }
        }
        recorded
    }

    pub fn insert_datastore(&mut self, extent: impl Into<String>, datastore: impl Into<String>) {
        self.datastores.insert(extent.into(), datastore.into());
    }

    /// Datastore backed by `dev`, or `N/A`
    pub fn datastore_for(&self, dev: &str) -> &str {
        self.datastores
            .get(dev)
            .map(String::as_str)
            .unwrap_or(DATASTORE_UNKNOWN)
    }

    pub fn datastores(&self) -> &HashMap<String, String> {
        &self.datastores
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const UNAME: &str = "VMkernel ESX01.Lab.Local 6.0.0 #1 SMP Release build-3620759 Mar  3 2016 18:41:52 x86_64 x86_64 x86_64 ESXi";

    const EXTENT_LIST: &str = "\
Volume Name  VMFS UUID                            Extent Number  Device Name                           Partition
-----------  -----------------------------------  -------------  ------------------------------------  ---------
datastore1   56f1a2b3-4c5d6e7f-8a9b-001122334455              0  naa.600508b1001c3a4f5e6d7c8b9a0f1e2d          3
My Data Store (2)  56f1a2b3-11111111-2222-aabbccddeeff        0  naa.deadbeef                                  1
";

    #[test]
    fn test_fallback_host_from_bundle_name() {
        let ctx = HostContext::new("/tmp/bundles/esx-ESX01.lab.local-2016-05-02--10.11-4312");
        assert_eq!(ctx.bundle_id(), "esx-esx01.lab.local-2016-05-02--10.11-4312");
        assert_eq!(ctx.fallback_host(), "esx01.lab.local");
        assert_eq!(ctx.host(), "esx01.lab.local");
        assert!(!ctx.has_hostname());
    }

    #[test]
    fn test_fallback_host_plain_name() {
        let ctx = HostContext::new("/tmp/bundles/esx-oddly-named");
        assert_eq!(ctx.host(), "esx-oddly-named");
    }

    #[test]
    fn test_uname_sets_lowercase_hostname() {
        let mut ctx = HostContext::new("/tmp/esx-x-2016-05-02--10.11");
        assert!(ctx.absorb_uname(UNAME.lines()));
        assert_eq!(ctx.hostname(), "esx01.lab.local");
        assert_eq!(ctx.host(), "esx01.lab.local");
    }

    #[test]
    fn test_uname_without_marker_keeps_fallback() {
        let mut ctx = HostContext::new("/tmp/esx-x-2016-05-02--10.11");
        assert!(!ctx.absorb_uname(["Linux box 5.10.0"]));
        assert_eq!(ctx.hostname(), "");
        assert_eq!(ctx.host(), "x");
    }

    #[test]
    fn test_extent_list_parsing() {
        let mut ctx = HostContext::new("/tmp/esx-x");
        let recorded = ctx.absorb_extent_list(EXTENT_LIST.lines());
        assert_eq!(recorded, 2);
        assert_eq!(
            ctx.datastore_for("naa.600508b1001c3a4f5e6d7c8b9a0f1e2d"),
            "datastore1"
        );
        assert_eq!(ctx.datastore_for("naa.deadbeef"), "My Data Store (2)");
        assert_eq!(ctx.datastore_for("naa.missing"), "N/A");
        assert_eq!(ctx.datastores().len(), 2);
    }

    #[test]
    fn test_extent_list_later_rows_overwrite() {
        let mut ctx = HostContext::new("/tmp/esx-x");
        ctx.absorb_extent_list([
            "old_ds  56f1a2b3-4c5d6e7f-8a9b-001122334455  0  naa.deadbeef  1",
            "new_ds  56f1a2b3-4c5d6e7f-8a9b-001122334466  0  naa.deadbeef  1",
        ]);
        assert_eq!(ctx.datastore_for("naa.deadbeef"), "new_ds");
    }

    #[test]
    fn test_datastore_lookup() {
        let mut ctx = HostContext::new("/tmp/esx-x");
        ctx.insert_datastore("naa.deadbeef", "MyDatastore");
        assert_eq!(ctx.datastore_for("naa.deadbeef"), "MyDatastore");
        assert_eq!(ctx.datastore_for("naa.cafef00d"), "N/A");
    }
}
