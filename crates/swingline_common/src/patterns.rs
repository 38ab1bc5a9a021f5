//! Recognition and exclusion patterns
//!
//! Every regular expression used to select bundle files, resolve host
//! context, and classify vmkernel/vobd lines lives here. Signatures decide
//! whether a line belongs to a category; parsers pull the fields out with
//! named capture groups. A line can match a signature and still fail its
//! parser, which is reported as a malformed record rather than dropped
//! silently.
//!
//! Message formats follow vmkernel/storage/device/scsi_device_io.c output
//! as seen in ESXi 5.x/6.x vm-support bundles.

use regex::Regex;
use std::sync::LazyLock;

static PATTERNS: LazyLock<PatternSet> = LazyLock::new(PatternSet::new);

/// Shared compiled pattern set
pub fn patterns() -> &'static PatternSet {
    &PATTERNS
}

/// Bundle files the walker cares about
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FileKind {
    /// `commands/uname_-a.txt`
    Hostname,
    /// `commands/localcli_storage-vmfs-extent-list.txt`
    ExtentList,
    /// `vmkernel.log`, `vobd.log`, `vmkernel.N`
    PlainLog,
    /// `vmkernel.N.gz`, `vobd.N.gz`
    GzipLog,
}

impl FileKind {
    pub fn is_metadata(&self) -> bool {
        matches!(self, FileKind::Hostname | FileKind::ExtentList)
    }

    pub fn is_log(&self) -> bool {
        !self.is_metadata()
    }
}

pub struct PatternSet {
    // Bundle file names
    pub uname_file: Regex,
    pub extent_file: Regex,
    pub plain_log_file: Regex,
    pub gzip_log_file: Regex,

    /// `esx-<product>-<YYYY-MM-DD>--<HH.MM>` bundle directory naming
    pub bundle_name: Regex,

    // Host context files
    pub uname_marker: Regex,
    pub extent_header: Regex,
    pub extent_row: Regex,

    /// `YYYY-MM-DDTHH:MM:SS.mmmZ` at the start of a line
    pub timestamp: Regex,

    pub apd_pdl: Regex,
    pub apd_pdl_fields: Regex,

    pub io_failure: Regex,
    /// ATA pass-through and S.M.A.R.T. polling (0x1a, 0x4d, 0x85), noise
    pub io_failure_smart: Regex,
    pub io_failure_fields: Regex,

    pub latency: Regex,
    /// Same condition reported again through vobd
    pub latency_vobd_dup: Regex,
    pub latency_fields: Regex,

    pub sioc_throttle: Regex,
    pub sioc_throttle_fields: Regex,
}

impl PatternSet {
    fn new() -> Self {
        Self {
            uname_file: Regex::new(r"^uname_-a\.txt$").unwrap(),
            extent_file: Regex::new(r"^localcli_storage-vmfs-extent-list\.txt$").unwrap(),
            plain_log_file: Regex::new(r"^(vmkernel|vobd)(\.log|\.[0-9]+)$").unwrap(),
            gzip_log_file: Regex::new(r"^(vmkernel|vobd)\.[0-9]+\.gz$").unwrap(),

            bundle_name: Regex::new(
                r"^esx-(?P<product>.+)-[0-9]{4}-[0-9]{2}-[0-9]{2}--[0-9]{2}\.[0-9]{2}",
            )
            .unwrap(),

            uname_marker: Regex::new(r"VMkernel\s+(?P<host>\S+)").unwrap(),
            extent_header: Regex::new(r"^(Volume Name.*|-[-\s]*)$").unwrap(),
            extent_row: Regex::new(
                r"^\s*(?P<dsname>\S.*?)\s+[0-9a-fA-F]+-[0-9a-fA-F]+-[0-9a-fA-F]+-[0-9a-fA-F]+\s+[0-9]+\s+(?P<extent>\S+)\s+[0-9]+\s*$",
            )
            .unwrap(),

            timestamp: Regex::new(
                r"^(?P<date>[0-9]{4}-[0-9]{2}-[0-9]{2})T(?P<time>(?P<hour>[0-9]{2}):[0-9]{2}:[0-9]{2}\.[0-9]{3})Z",
            )
            .unwrap(),

            apd_pdl: Regex::new(r"ScsiDevice.* Device .* APD Notify PERM LOSS; token num:[0-9]+")
                .unwrap(),
            apd_pdl_fields: Regex::new(r#".* Device "?(?P<dev>[^"\s]+)"? APD Notify PERM LOSS"#)
                .unwrap(),

            io_failure: Regex::new(
                r"ScsiDeviceIO: [0-9]+: Cmd\(0x[0-9a-fA-F]+\) 0x[0-9a-fA-F]{2}, CmdSN 0x[0-9a-fA-F]+ from world [0-9]+ to dev .* failed ",
            )
            .unwrap(),
            io_failure_smart: Regex::new(r" Cmd\(0x[0-9a-fA-F]+\) 0x(?i:1a|4d|85), ").unwrap(),
            io_failure_fields: Regex::new(
                r#"Cmd\(0x[0-9a-fA-F]+\) (?P<cmd>0x[0-9a-fA-F]{2}), CmdSN 0x[0-9a-fA-F]+ from world (?P<world>[0-9]+) to dev "?(?P<dev>[^"\s]+)"? failed (?P<sense>.*?)\.?\s*$"#,
            )
            .unwrap(),

            latency: Regex::new(r"performance has deteriorated").unwrap(),
            latency_vobd_dup: Regex::new(r"vob\.scsi\.device\.io\.latency\.high").unwrap(),
            latency_fields: Regex::new(
                r#" Device "?(?P<dev>[^"\s]+)"? performance has deteriorated.*? value of (?P<lavg>[0-9]+) microseconds to (?P<latency>[0-9]+)"#,
            )
            .unwrap(),

            sioc_throttle: Regex::new(
                r"ScsiDeviceIO.* Restricting cmd .* from WID [0-9]+ to quiesced dev",
            )
            .unwrap(),
            sioc_throttle_fields: Regex::new(
                r#" Restricting cmd (?P<cmd>\S+) .*?from WID (?P<world>[0-9]+) to quiesced dev "?(?P<dev>[^"\s]+?)"?(?::[0-9]+)?(?:\s|$)"#,
            )
            .unwrap(),
        }
    }

    /// Classify a bundle file by its name alone
    pub fn file_kind(&self, file_name: &str) -> Option<FileKind> {
        if self.uname_file.is_match(file_name) {
            Some(FileKind::Hostname)
        } else if self.extent_file.is_match(file_name) {
            Some(FileKind::ExtentList)
        } else if self.plain_log_file.is_match(file_name) {
            Some(FileKind::PlainLog)
        } else if self.gzip_log_file.is_match(file_name) {
            Some(FileKind::GzipLog)
        } else {
            None
        }
    }
}
