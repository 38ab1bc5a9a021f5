//! SCSI code translation
//!
//! Static lookup of T10 command opcodes and H/D/P sense codes to readable
//! names. Lookups never fail: an unknown opcode becomes `T10_UNSPECIFIED`
//! and an untranslatable sense string is handed back unchanged.
//!
//! References: www.t10.org/lists/op-num.htm, VMware KB 289902.

use regex::Regex;
use std::sync::LazyLock;

/// Name returned for opcodes outside the command table
pub const T10_UNSPECIFIED: &str = "T10_UNSPECIFIED";

/// T10 opcode table, sorted by opcode.
///
/// Several opcodes are shared between device classes, so names list every
/// meaning separated by `/` with the owning standard in brackets.
pub const COMMAND_CODES: &[(&str, &str)] = &[
    ("0x00", "TEST_UNIT_READY"),
    ("0x01", "REWIND/REZERO_UNIT_[SBC]"),
    ("0x02", "T10_UNSPECIFIED"),
    ("0x03", "REQUEST_SENSE"),
    ("0x04", "FORMAT_MEDIUM/FORMAT_UNIT/FORMAT"),
    ("0x05", "READ_BLOCK_LIMITS"),
    ("0x06", "T10_UNSPECIFIED"),
    ("0x07", "INITIALIZE_ELEMENT_STATUS/REASSIGN_BLOCKS"),
    ("0x08", "GET_MESSAGE/READ/RECEIVE"),
    ("0x09", "T10_UNSPECIFIED"),
    ("0x0a", "PRINT/SEND_MESSAGE/SEND/WRITE"),
    ("0x0b", "SEEK_[SBC]/SET_CAPACITY/SLEW_AND_PRINT"),
    ("0x0c", "T10_UNSPECIFIED"),
    ("0x0d", "T10_UNSPECIFIED"),
    ("0x0e", "T10_UNSPECIFIED"),
    ("0x0f", "READ_REVERSE"),
    ("0x10", "SYNCHRONIZE_BUFFER/WRITE_FILEMARKS"),
    ("0x11", "SPACE"),
    ("0x12", "INQUIRY"),
    ("0x13", "VERIFY"),
    ("0x14", "RECOVER_BUFFERED_DATA"),
    ("0x15", "MODE_SELECT"),
    ("0x16", "RESERVE_ELEMENT_[SMC]/RESERVE_[SPC-2]"),
    ("0x17", "RELEASE_ELEMENT_[SMC]/RELEASE_[SPC-2]"),
    ("0x18", "COPY_[SPC]"),
    ("0x19", "ERASE"),
    ("0x1a", "MODE_SENSE/[ignore_S.M.A.R.T.]"),
    ("0x1b", "LOAD_UNLOAD/OPEN/CLOSE_IMPORT/EXPORT_ELEMENT/SCAN/START_STOP_UNIT/STOP_PRINT"),
    ("0x1c", "RECEIVE_DIAGNOSTIC_RESULTS"),
    ("0x1d", "SEND_DIAGNOSTIC"),
    ("0x1e", "PREVENT_ALLOW_MEDIUM_REMOVAL"),
    ("0x1f", "T10_UNSPECIFIED"),
    ("0x20", "T10_UNSPECIFIED"),
    ("0x21", "T10_UNSPECIFIED"),
    ("0x22", "T10_UNSPECIFIED"),
    ("0x23", "READ_FORMAT_CAPACITIES"),
    ("0x24", "SET_WINDOW"),
    ("0x25", "GET_WINDOW/READ_CAPACITY/READ_CAPACITY/READ_CARD_CAPACITY"),
    ("0x26", "T10_UNSPECIFIED"),
    ("0x27", "T10_UNSPECIFIED"),
    ("0x28", "GET_MESSAGE/READ"),
    ("0x29", "READ_GENERATION"),
    ("0x2a", "SEND_MESSAGE/SEND/WRITE"),
    ("0x2b", "LOCATE/POSITION_TO_ELEMENT/SEEK_[SBC]"),
    ("0x2c", "ERASE"),
    ("0x2d", "READ_UPDATED_BLOCK"),
    ("0x2e", "WRITE_AND_VERIFY"),
    ("0x2f", "VERIFY"),
    ("0x30", "SEARCH_DATA_HIGH_[SBC]"),
    ("0x31", "OBJECT_POSITION/SEARCH_DATA_EQUAL_[SBC]"),
    ("0x32", "SEARCH_DATA_LOW_[SBC]"),
    ("0x33", "SET_LIMITS_[SBC]"),
    ("0x34", "GET_DATA_BUFFER_STATUS/PRE-FETCH/READ_POSITION"),
    ("0x35", "SYNCHRONIZE_CACHE"),
    ("0x36", "LOCK_UNLOCK_CACHE_[SBC]"),
    ("0x37", "INITIALIZE_ELEMENT_STATUS_WITH_RANGE/READ_DEFECT_DATA"),
    ("0x38", "MEDIUM_SCAN"),
    ("0x39", "COMPARE_[SPC]"),
    ("0x3a", "COPY_AND_VERIFY_[SPC]"),
    ("0x3b", "WRITE_BUFFER"),
    ("0x3c", "READ_BUFFER"),
    ("0x3d", "UPDATE_BLOCK"),
    ("0x3e", "READ_LONG"),
    ("0x3f", "WRITE_LONG"),
    ("0x40", "CHANGE_DEFINITION_[SPC]"),
    ("0x41", "WRITE_SAME"),
    ("0x42", "READ_SUB-CHANNEL/UNMAP_(VAAI)"),
    ("0x43", "READ_TOC/PMA/ATIP"),
    ("0x44", "READ_HEADER/REPORT_DENSITY_SUPPORT"),
    ("0x45", "PLAY_AUDIO"),
    ("0x46", "GET_CONFIGURATION"),
    ("0x47", "PLAY_AUDIO_MSF"),
    ("0x48", "SANITIZE"),
    ("0x49", "T10_UNSPECIFIED"),
    ("0x4a", "GET_EVENT_STATUS_NOTIFICATION"),
    ("0x4b", "PAUSE/RESUME"),
    ("0x4c", "LOG_SELECT"),
    ("0x4d", "LOG_SENSE/[ignore_S.M.A.R.T.]"),
    ("0x4e", "STOP_PLAY/SCAN"),
    ("0x4f", "T10_UNSPECIFIED"),
    ("0x50", "XDWRITE_[SBC-2]"),
    ("0x51", "READ_DISC_INFORMATION/XPWRITE"),
    ("0x52", "READ_TRACK_INFORMATION/XDREAD_[SBC-2]"),
    ("0x53", "RESERVE_TRACK/XDWRITEREAD"),
    ("0x54", "SEND_OPC_INFORMATION"),
    ("0x55", "MODE_SELECT"),
    ("0x56", "RESERVE_ELEMENT_[SMC]/RESERVE_[SPC-2]"),
    ("0x57", "RELEASE_ELEMENT_[SMC]/RELEASE_[SPC-2]"),
    ("0x58", "REPAIR_TRACK"),
    ("0x59", "T10_UNSPECIFIED"),
    ("0x5a", "MODE_SENSE"),
    ("0x5b", "CLOSE_TRACK/SESSION"),
    ("0x5c", "READ_BUFFER_CAPACITY"),
    ("0x5d", "SEND_CUE_SHEET"),
    ("0x5e", "PERSISTENT_RESERVE_IN"),
    ("0x5f", "PERSISTENT_RESERVE_OUT"),
    ("0x7e", "extended_CDB"),
    ("0x7f", "variable_length_CDB_(more_than_16_bytes)"),
    ("0x80", "WRITE_FILEMARKS/XDWRITE_EXTENDED_[SBC]"),
    ("0x81", "READ_REVERSE/REBUILD_[SBC]"),
    ("0x82", "ALLOW_OVERWRITE/REGENERATE_[SBC]"),
    ("0x83", "Third-party_Copy_OUT_(VAAI_XCopy)"),
    ("0x84", "Third-party_Copy_IN"),
    ("0x85", "ATA_PASS-THROUGH/[ignore_S.M.A.R.T.]"),
    ("0x86", "ACCESS_CONTROL_IN"),
    ("0x87", "ACCESS_CONTROL_OUT"),
    ("0x88", "READ"),
    ("0x89", "COMPARE_AND_WRITE_(VAAI_ATS)"),
    ("0x8a", "WRITE"),
    ("0x8b", "ORWRITE"),
    ("0x8c", "READ_ATTRIBUTE"),
    ("0x8d", "WRITE_ATTRIBUTE"),
    ("0x8e", "WRITE_AND_VERIFY"),
    ("0x8f", "VERIFY"),
    ("0x90", "PRE-FETCH"),
    ("0x91", "SPACE/SYNCHRONIZE_CACHE"),
    ("0x92", "LOCATE/LOCK_UNLOCK_CACHE_[SBC]"),
    ("0x93", "ERASE/WRITE_SAME_(VAAI_Zero)"),
    ("0x94", "SCSI_Socket_Services_project"),
    ("0x95", "SCSI_Socket_Services_project"),
    ("0x96", "SCSI_Socket_Services_project"),
    ("0x97", "SCSI_Socket_Services_project"),
    ("0x98", "T10_UNSPECIFIED"),
    ("0x99", "T10_UNSPECIFIED"),
    ("0x9a", "T10_UNSPECIFIED"),
    ("0x9b", "T10_UNSPECIFIED"),
    ("0x9c", "WRITE_ATOMIC"),
    ("0x9d", "SERVICE_ACTION_BIDIRECTIONAL"),
    ("0x9e", "SERVICE_ACTION_IN"),
    ("0x9f", "SERVICE_ACTION_OUT"),
    ("0xa0", "REPORT_LUNS"),
    ("0xa1", "ATA_PASS-THROUGH/BLANK"),
    ("0xa2", "SECURITY_PROTOCOL_IN"),
    ("0xa3", "MAINTENANCE_IN/SEND_KEY"),
    ("0xa4", "MAINTENANCE_OUT/REPORT_KEY"),
    ("0xa5", "MOVE_MEDIUM_[SMC-2]/PLAY_AUDIO"),
    ("0xa6", "EXCHANGE_MEDIUM/LOAD/UNLOAD_C/DVD"),
    ("0xa7", "MOVE_MEDIUM_ATTACHED_[SMC-2]/SET_READ_AHEAD"),
    ("0xa8", "GET_MESSAGE/READ"),
    ("0xa9", "SERVICE_ACTION_OUT"),
    ("0xaa", "SEND_MESSAGE/WRITE"),
    ("0xab", "SERVICE_ACTION_IN"),
    ("0xac", "ERASE/GET_PERFORMANCE"),
    ("0xad", "READ_DVD_STRUCTURE"),
    ("0xae", "WRITE_AND_VERIFY"),
    ("0xaf", "VERIFY"),
    ("0xb0", "SEARCH_DATA_HIGH_[SBC]"),
    ("0xb1", "SEARCH_DATA_EQUAL_[SBC]"),
    ("0xb2", "SEARCH_DATA_LOW_[SBC]"),
    ("0xb3", "SET_LIMITS_[SBC]"),
    ("0xb4", "READ_ELEMENT_STATUS_ATTACHED_[SMC-2]"),
    ("0xb5", "REQUEST_VOLUME_ELEMENT_ADDRESS/SECURITY_PROTOCOL_OUT"),
    ("0xb6", "SEND_VOLUME_TAG/SET_STREAMING"),
    ("0xb7", "READ_DEFECT_DATA"),
    ("0xb8", "READ_ELEMENT_STATUS_[SMC-2]"),
    ("0xb9", "READ_CD_MSF"),
    ("0xba", "REDUNDANCY_GROUP_(IN)/SCAN"),
    ("0xbb", "REDUNDANCY_GROUP_(OUT)/SET_CD_SPEED"),
    ("0xbc", "SPARE_(IN)"),
    ("0xbd", "MECHANISM_STATUS/SPARE_(OUT)"),
    ("0xbe", "READ_CD/VOLUME_SET_(IN)"),
    ("0xbf", "SEND_DVD_STRUCTURE/VOLUME_SET_(OUT)"),
    ("0xfe", "Third-party_GENERIC_(VAAI_ATS)"),
];

/// Host status (H:) codes
pub const HOST_STATUS: &[(u32, &str)] = &[
    (0x0, "GOOD"),
    (0x1, "NO_CONNECT"),
    (0x2, "BUS_BUSY"),
    (0x3, "TIME_OUT"),
    (0x4, "BAD_TARGET"),
    (0x5, "ABORT"),
    (0x6, "PARITY"),
    (0x7, "ERROR"),
    (0x8, "RESET"),
    (0x9, "BAD_INTR"),
    (0xa, "PASSTHROUGH"),
    (0xb, "SOFT_ERROR"),
    (0xc, "IMM_RETRY"),
    (0xd, "REQUEUE"),
];

/// Device status (D:) codes
pub const DEVICE_STATUS: &[(u32, &str)] = &[
    (0x0, "GOOD"),
    (0x2, "CHECK_CONDITION"),
    (0x4, "CONDITION_MET"),
    (0x8, "BUSY"),
    (0x10, "INTERMEDIATE"),
    (0x14, "INTERMEDIATE-CONDITION_MET"),
    (0x18, "RESERVATION_CONFLICT"),
    (0x22, "Obsolete"),
    (0x28, "TASK_SET_FULL"),
    (0x30, "ACA_ACTIVE"),
    (0x40, "TASK_ABORTED"),
];

/// Plugin status (P:) codes
pub const PLUGIN_STATUS: &[(u32, &str)] = &[
    (0x0, "GOOD"),
    (0x1, "TRANSIENT"),
    (0x2, "SNAPSHOT"),
    (0x3, "RESERVATION_LOST"),
    (0x4, "REQUEUE"),
    (0x5, "ATS_MISCOMPARE"),
    (0x6, "THINPROV_BUSY_GROWING"),
    (0x7, "THINPROV_ATQUOTA"),
    (0x8, "THINPROV_NOSPACE"),
];

static SENSE_TRIPLE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^\s*H:(?P<h>\S+)\s+D:(?P<d>\S+)\s+P:(?P<p>\S+)").unwrap()
});

/// Translate a logged opcode such as `0x28` to its T10 name
pub fn translate_command(code: &str) -> &'static str {
    let code = code.trim().to_ascii_lowercase();
    COMMAND_CODES
        .binary_search_by(|(key, _)| (*key).cmp(code.as_str()))
        .map(|idx| COMMAND_CODES[idx].1)
        .unwrap_or(T10_UNSPECIFIED)
}

/// Translate `H:<hex> D:<hex> P:<hex> ...` to `H:<name> D:<name> P:<name>`.
///
/// Anything after the triple (e.g. `Valid sense data: ...`) is ignored.
/// Returns the input unchanged when a token is not hex or not in its table.
pub fn translate_sense(sense: &str) -> String {
    let translated = SENSE_TRIPLE.captures(sense).and_then(|caps| {
        let host = lookup_status(HOST_STATUS, &caps["h"])?;
        let device = lookup_status(DEVICE_STATUS, &caps["d"])?;
        let plugin = lookup_status(PLUGIN_STATUS, &caps["p"])?;
        Some(format!("H:{} D:{} P:{}", host, device, plugin))
    });

    translated.unwrap_or_else(|| sense.to_string())
}

fn parse_hex(token: &str) -> Option<u32> {
    let digits = token
        .strip_prefix("0x")
        .or_else(|| token.strip_prefix("0X"))?;
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_hexdigit()) {
        return None;
    }
    u32::from_str_radix(digits, 16).ok()
}

fn lookup_status(table: &[(u32, &'static str)], token: &str) -> Option<&'static str> {
    let code = parse_hex(token)?;
    table
        .iter()
        .find(|(key, _)| *key == code)
        .map(|(_, name)| *name)
}
