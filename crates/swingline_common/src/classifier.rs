//! Line classification and field extraction
//!
//! A timestamped vmkernel/vobd line is tested against an ordered rule table.
//! The first rule whose signature matches, and whose exclusion does not,
//! decides the category:
//!
//! 1. `apd_pdl`       - APD Notify PERM LOSS
//! 2. `io_failure`    - ScsiDeviceIO command failure, minus S.M.A.R.T. polling
//! 3. `latency`       - performance has deteriorated, minus the vobd duplicate
//! 4. `sioc_throttle` - Restricting cmd ... to quiesced dev
//!
//! Reordering `RULES` changes classification of lines that match more than
//! one signature.

use regex::{Captures, Regex};
use std::io::{self, BufRead};
use std::sync::LazyLock;
use tracing::warn;

use crate::codes::{translate_command, translate_sense};
use crate::context::HostContext;
use crate::error::ExtractError;
use crate::event::{Category, Event, World, ALL_COMMANDS};
use crate::patterns::patterns;
use crate::store::EventStore;

/// Raw line slice quoted in malformed-record warnings
const EXCERPT_START: usize = 36;
const EXCERPT_LEN: usize = 80;

/// Category-specific fields pulled out of a matched line
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Extracted {
    pub dev: String,
    pub world: Option<World>,
    pub cmd: Option<String>,
    pub sense: Option<String>,
    pub latency: Option<u64>,
    pub lavg: Option<u64>,
}

/// One classification rule: signature, optional exclusion, extractor
pub struct Rule {
    pub category: Category,
    pub signature: &'static Regex,
    pub exclusion: Option<&'static Regex>,
    extract: fn(&str) -> Result<Extracted, ExtractError>,
}

impl Rule {
    pub fn matches(&self, line: &str) -> bool {
        self.signature.is_match(line)
            && !self.exclusion.is_some_and(|exclusion| exclusion.is_match(line))
    }

    pub fn extract(&self, line: &str) -> Result<Extracted, ExtractError> {
        (self.extract)(line)
    }
}

static RULES: LazyLock<Vec<Rule>> = LazyLock::new(|| {
    let p = patterns();
    vec![
        Rule {
            category: Category::ApdPdl,
            signature: &p.apd_pdl,
            exclusion: None,
            extract: extract_apd_pdl,
        },
        Rule {
            category: Category::IoFailure,
            signature: &p.io_failure,
            exclusion: Some(&p.io_failure_smart),
            extract: extract_io_failure,
        },
        Rule {
            category: Category::Latency,
            signature: &p.latency,
            exclusion: Some(&p.latency_vobd_dup),
            extract: extract_latency,
        },
        Rule {
            category: Category::SiocThrottle,
            signature: &p.sioc_throttle,
            exclusion: None,
            extract: extract_sioc_throttle,
        },
    ]
});

fn fields<'l>(re: &Regex, line: &'l str, category: Category) -> Result<Captures<'l>, ExtractError> {
    re.captures(line)
        .ok_or(ExtractError::Unparsed { category })
}

fn parse_micros(caps: &Captures<'_>, field: &'static str) -> Result<u64, ExtractError> {
    let value = &caps[field];
    value.parse().map_err(|_| ExtractError::InvalidNumber {
        field,
        value: value.to_string(),
    })
}

fn extract_apd_pdl(line: &str) -> Result<Extracted, ExtractError> {
    let caps = fields(&patterns().apd_pdl_fields, line, Category::ApdPdl)?;
    Ok(Extracted {
        dev: caps["dev"].to_string(),
        world: Some(World::Vmkernel),
        cmd: Some(ALL_COMMANDS.to_string()),
        ..Default::default()
    })
}

fn extract_io_failure(line: &str) -> Result<Extracted, ExtractError> {
    let caps = fields(&patterns().io_failure_fields, line, Category::IoFailure)?;
    Ok(Extracted {
        dev: caps["dev"].to_string(),
        world: Some(World::from_world_id(&caps["world"])),
        cmd: Some(caps["cmd"].to_string()),
        sense: Some(caps["sense"].to_string()),
        ..Default::default()
    })
}

fn extract_latency(line: &str) -> Result<Extracted, ExtractError> {
    let caps = fields(&patterns().latency_fields, line, Category::Latency)?;
    Ok(Extracted {
        dev: caps["dev"].to_string(),
        latency: Some(parse_micros(&caps, "latency")?),
        lavg: Some(parse_micros(&caps, "lavg")?),
        ..Default::default()
    })
}

fn extract_sioc_throttle(line: &str) -> Result<Extracted, ExtractError> {
    let caps = fields(&patterns().sioc_throttle_fields, line, Category::SiocThrottle)?;
    Ok(Extracted {
        dev: caps["dev"].to_string(),
        world: Some(World::from_world_id(&caps["world"])),
        cmd: Some(caps["cmd"].to_string()),
        ..Default::default()
    })
}

/// Counters for one ingested log file
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IngestStats {
    pub lines: usize,
    pub timestamped: usize,
    pub events: usize,
    pub malformed: usize,
}

impl IngestStats {
    pub fn add(&mut self, other: &IngestStats) {
        self.lines += other.lines;
        self.timestamped += other.timestamped;
        self.events += other.events;
        self.malformed += other.malformed;
    }
}

#[derive(Clone, Copy)]
pub struct LineClassifier {
    rules: &'static [Rule],
}

impl Default for LineClassifier {
    fn default() -> Self {
        Self::new()
    }
}

impl LineClassifier {
    pub fn new() -> Self {
        Self { rules: &RULES }
    }

    /// Rules in priority order
    pub fn rules(&self) -> &'static [Rule] {
        self.rules
    }

    /// First rule that claims the line, if any
    pub fn rule_for(&self, line: &str) -> Option<&'static Rule> {
        self.rules.iter().find(|rule| rule.matches(line))
    }

    /// Classify one line into an event for the bundle described by `ctx`.
    ///
    /// `Ok(None)` covers both untimestamped lines and lines matching no
    /// signature; neither is an error.
    pub fn classify(
        &self,
        line: &str,
        ctx: &HostContext,
        fname: &str,
    ) -> Result<Option<Event>, ExtractError> {
        let raw = line.trim_end_matches(['\n', '\r']);

        let Some(stamp) = patterns().timestamp.captures(raw) else {
            return Ok(None);
        };

        let Some(rule) = self.rule_for(raw) else {
            return Ok(None);
        };

        let fields = rule.extract(raw)?;

        let t10 = match rule.category {
            Category::ApdPdl => Some(ALL_COMMANDS.to_string()),
            _ => fields
                .cmd
                .as_deref()
                .map(|cmd| translate_command(cmd).to_string()),
        };

        Ok(Some(Event {
            category: rule.category,
            date: stamp["date"].to_string(),
            hour: stamp["hour"].to_string(),
            time: stamp["time"].to_string(),
            host: ctx.host().to_string(),
            fname: fname.to_string(),
            dsname: ctx.datastore_for(&fields.dev).to_string(),
            dev: fields.dev,
            latency: fields.latency,
            lavg: fields.lavg,
            world: fields.world,
            cmd: fields.cmd,
            t10,
            sense: fields.sense.as_deref().map(translate_sense),
            asense: fields.sense,
            raw: raw.to_string(),
        }))
    }

    /// Classify every line of `reader` and append the events to `store`.
    ///
    /// Malformed records are logged and skipped. Bytes that are not valid
    /// UTF-8 are replaced rather than aborting the file. A read error stops
    /// this file only; events already appended stay in the store.
    pub fn ingest<R: BufRead>(
        &self,
        reader: R,
        ctx: &HostContext,
        fname: &str,
        store: &mut EventStore,
    ) -> io::Result<IngestStats> {
        let mut stats = IngestStats::default();

        for chunk in reader.split(b'\n') {
            let bytes = chunk?;
            let line = String::from_utf8_lossy(&bytes);
            stats.lines += 1;

            if !patterns().timestamp.is_match(&line) {
                continue;
            }
            stats.timestamped += 1;

            match self.classify(&line, ctx, fname) {
                Ok(Some(event)) => {
                    store.append(event);
                    stats.events += 1;
                }
                Ok(None) => {}
                Err(e) => {
                    stats.malformed += 1;
                    warn!(
                        "Failed creating record from message \"{}[...]\" in {}: {}",
                        excerpt(&line),
                        fname,
                        e
                    );
                }
            }
        }

        Ok(stats)
    }
}

/// Bounded slice of a raw line for log messages, past the timestamp prefix
pub fn excerpt(line: &str) -> String {
    line.chars().skip(EXCERPT_START).take(EXCERPT_LEN).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    const IO_FAILURE: &str = "2016-05-02T10:11:12.345Z cpu0:1234)ScsiDeviceIO: 123: Cmd(0x28) 0x28, CmdSN 0x456 from world 0 to dev \"naa.deadbeef\" failed H:0x0 D:0x2 P:0x0.";
    const IO_FAILURE_GUEST: &str = "2016-05-02T11:00:01.002Z cpu12:32830)ScsiDeviceIO: 2652: Cmd(0x412e803d0ec0) 0x2a, CmdSN 0x8000001a from world 32830 to dev \"naa.600508b1001c3a4f\" failed H:0x8 D:0x0 P:0x0 Possible sense data: 0x0 0x0 0x0.";
    const IO_FAILURE_SMART: &str = "2016-05-02T10:11:12.345Z cpu0:1234)ScsiDeviceIO: 123: Cmd(0x412e803d0ec0) 0x85, CmdSN 0x456 from world 0 to dev \"naa.deadbeef\" failed H:0x0 D:0x2 P:0x0 Valid sense data: 0x5 0x20 0x0.";
    const LATENCY: &str = "2016-05-02T12:30:00.500Z cpu3:33012)WARNING: ScsiDeviceIO: 1223: Device naa.deadbeef performance has deteriorated. I/O latency increased from average value of 1343 microseconds to 28022 microseconds.";
    const LATENCY_VOBD: &str = "2016-05-02T12:30:00.501Z: [scsiCorrelator] 1234567us: [vob.scsi.device.io.latency.high] Device naa.deadbeef performance has deteriorated. I/O latency increased from average value of 1343 microseconds to 28022 microseconds.";
    const SIOC: &str = "2016-05-02T13:00:00.000Z cpu5:32781)ScsiDeviceIO: 2363: Restricting cmd 0x2a (4096 bytes) from WID 17 to quiesced dev naa.deadbeef:1 (vmkCmd=0x412e8004c5c0)";
    const APD_PDL: &str = "2016-05-02T14:00:00.000Z cpu1:32788)ScsiDevice: 5040: Device naa.deadbeef APD Notify PERM LOSS; token num:1";

    fn context() -> HostContext {
        let mut ctx = HostContext::new("/bundles/esx-esx01-2016-05-02--10.11");
        ctx.insert_datastore("naa.deadbeef", "MyDatastore");
        ctx
    }

    fn classify(line: &str) -> Option<Event> {
        LineClassifier::new()
            .classify(line, &context(), "vmkernel.log")
            .unwrap()
    }

    #[test]
    fn test_rule_priority_order() {
        let order: Vec<Category> = LineClassifier::new()
            .rules()
            .iter()
            .map(|r| r.category)
            .collect();
        assert_eq!(
            order,
            vec![
                Category::ApdPdl,
                Category::IoFailure,
                Category::Latency,
                Category::SiocThrottle
            ]
        );
    }

    #[test]
    fn test_io_failure_kernel_world() {
        let event = classify(IO_FAILURE).unwrap();
        assert_eq!(event.category, Category::IoFailure);
        assert_eq!(event.date, "2016-05-02");
        assert_eq!(event.hour, "10");
        assert_eq!(event.time, "10:11:12.345");
        assert_eq!(event.world, Some(World::Vmkernel));
        assert_eq!(event.cmd.as_deref(), Some("0x28"));
        assert_eq!(event.t10.as_deref(), Some("GET_MESSAGE/READ"));
        assert_eq!(event.dev, "naa.deadbeef");
        assert_eq!(event.dsname, "MyDatastore");
        assert_eq!(event.asense.as_deref(), Some("H:0x0 D:0x2 P:0x0"));
        assert_eq!(
            event.sense.as_deref(),
            Some("H:GOOD D:CHECK_CONDITION P:GOOD")
        );
        assert_eq!(event.host, "esx01");
        assert_eq!(event.fname, "vmkernel.log");
        assert_eq!(event.raw, IO_FAILURE);
        assert_eq!(event.latency, None);
    }

    #[test]
    fn test_io_failure_guest_world_unmapped_device() {
        let event = classify(IO_FAILURE_GUEST).unwrap();
        assert_eq!(event.world, Some(World::Vmguest));
        assert_eq!(event.cmd.as_deref(), Some("0x2a"));
        assert_eq!(event.dev, "naa.600508b1001c3a4f");
        assert_eq!(event.dsname, "N/A");
        assert_eq!(
            event.asense.as_deref(),
            Some("H:0x8 D:0x0 P:0x0 Possible sense data: 0x0 0x0 0x0")
        );
        assert_eq!(event.sense.as_deref(), Some("H:RESET D:GOOD P:GOOD"));
    }

    #[test]
    fn test_smart_commands_excluded() {
        assert!(classify(IO_FAILURE_SMART).is_none());
    }

    #[test]
    fn test_latency_fields() {
        let event = classify(LATENCY).unwrap();
        assert_eq!(event.category, Category::Latency);
        assert_eq!(event.dev, "naa.deadbeef");
        assert_eq!(event.dsname, "MyDatastore");
        assert_eq!(event.latency, Some(28022));
        assert_eq!(event.lavg, Some(1343));
        assert_eq!(event.world, None);
        assert_eq!(event.cmd, None);
    }

    #[test]
    fn test_vobd_latency_duplicate_excluded() {
        assert!(classify(LATENCY_VOBD).is_none());
    }

    #[test]
    fn test_sioc_throttle_fields() {
        let event = classify(SIOC).unwrap();
        assert_eq!(event.category, Category::SiocThrottle);
        assert_eq!(event.cmd.as_deref(), Some("0x2a"));
        assert_eq!(event.t10.as_deref(), Some("SEND_MESSAGE/SEND/WRITE"));
        assert_eq!(event.world, Some(World::Vmguest));
        assert_eq!(event.dev, "naa.deadbeef");
        assert_eq!(event.dsname, "MyDatastore");
        assert_eq!(event.sense, None);
    }

    #[test]
    fn test_apd_pdl_fields() {
        let event = classify(APD_PDL).unwrap();
        assert_eq!(event.category, Category::ApdPdl);
        assert_eq!(event.dev, "naa.deadbeef");
        assert_eq!(event.dsname, "MyDatastore");
        assert_eq!(event.world, Some(World::Vmkernel));
        assert_eq!(event.cmd.as_deref(), Some("(ALL)"));
        assert_eq!(event.t10.as_deref(), Some("(ALL)"));
    }

    #[test]
    fn test_untimestamped_lines_never_classified() {
        let continuation = IO_FAILURE.trim_start_matches("2016-05-02T10:11:12.345Z ");
        assert!(classify(continuation).is_none());
        assert!(classify("").is_none());
        assert!(classify(&format!(" {}", APD_PDL)).is_none());
    }

    #[test]
    fn test_unrelated_line_ignored() {
        let line = "2016-05-02T10:11:12.345Z cpu0:1234)NMP: nmp_ThrottleLogForDevice:3298: Cmd 0x28 to dev naa.deadbeef";
        assert!(classify(line).is_none());
    }

    #[test]
    fn test_latency_signature_without_values_is_malformed() {
        let line = "2016-05-02T12:30:00.500Z cpu3:33012)WARNING: ScsiDeviceIO: 1223: Device naa.deadbeef performance has deteriorated.";
        let err = LineClassifier::new()
            .classify(line, &context(), "vmkernel.log")
            .unwrap_err();
        assert_eq!(
            err,
            ExtractError::Unparsed {
                category: Category::Latency
            }
        );
    }

    #[test]
    fn test_latency_overflow_is_malformed() {
        let line = "2016-05-02T12:30:00.500Z cpu3:33012)WARNING: ScsiDeviceIO: 1223: Device naa.deadbeef performance has deteriorated. I/O latency increased from average value of 1343 microseconds to 99999999999999999999999 microseconds.";
        let err = LineClassifier::new()
            .classify(line, &context(), "vmkernel.log")
            .unwrap_err();
        assert!(matches!(
            err,
            ExtractError::InvalidNumber {
                field: "latency",
                ..
            }
        ));
    }

    #[test]
    fn test_ingest_counts_and_skips_malformed() {
        let log = format!(
            "{}\n  continuation of the previous line\n{}\n{}\r\n2016-05-02T12:30:00.500Z Device naa.x performance has deteriorated.\n{}\n",
            IO_FAILURE, LATENCY, SIOC, IO_FAILURE_SMART
        );
        let mut store = EventStore::new();
        let stats = LineClassifier::new()
            .ingest(Cursor::new(log), &context(), "vmkernel.log", &mut store)
            .unwrap();

        assert_eq!(stats.lines, 6);
        assert_eq!(stats.timestamped, 5);
        assert_eq!(stats.events, 3);
        assert_eq!(stats.malformed, 1);
        assert_eq!(store.len(), 3);
        assert!(store.iter().all(|e| !e.raw.ends_with('\r')));
    }

    #[test]
    fn test_ingest_tolerates_invalid_utf8() {
        let mut log = Vec::new();
        log.extend_from_slice(b"2016-05-02T10:00:00.000Z garbage \xff\xfe bytes\n");
        log.extend_from_slice(APD_PDL.as_bytes());
        log.push(b'\n');

        let mut store = EventStore::new();
        let stats = LineClassifier::new()
            .ingest(Cursor::new(log), &context(), "vobd.log", &mut store)
            .unwrap();
        assert_eq!(stats.events, 1);
    }

    #[test]
    fn test_excerpt_is_bounded() {
        let text = excerpt(IO_FAILURE);
        assert_eq!(text.chars().count(), 80);
        assert!(IO_FAILURE.contains(&text));
        assert_eq!(excerpt("short"), "");
    }
}
