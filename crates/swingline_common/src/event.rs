//! Normalized storage event records
//!
//! One `Event` per classified vmkernel/vobd line. The field names are the
//! record schema consumed by the report layer:
//! `category, date, hour, time, host, fname, dev, dsname, latency, lavg,
//! world, cmd, t10, sense, asense, raw`.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Datastore name used when a device has no known VMFS extent mapping
pub const DATASTORE_UNKNOWN: &str = "N/A";

/// Command and code value recorded for APD/PDL events (affects every command)
pub const ALL_COMMANDS: &str = "(ALL)";

/// Index of an event inside its `EventStore`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EventId(pub usize);

/// Fault signature category
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    IoFailure,
    Latency,
    SiocThrottle,
    ApdPdl,
}

impl Category {
    pub const ALL: [Category; 4] = [
        Category::IoFailure,
        Category::SiocThrottle,
        Category::Latency,
        Category::ApdPdl,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Category::IoFailure => "io_failure",
            Category::Latency => "latency",
            Category::SiocThrottle => "sioc_throttle",
            Category::ApdPdl => "apd_pdl",
        }
    }

    /// Columns shown for this category in per-category reports
    pub fn report_fields(&self) -> &'static [Field] {
        use Field::*;
        match self {
            Self::Latency => &[
                Date, Time, Host, Fname, Dev, Dsname, World, Latency, Lavg, Raw,
            ],
            Self::IoFailure => &[
                Date, Time, Host, Fname, Dev, Dsname, World, Cmd, T10, Sense, Raw,
            ],
            Self::SiocThrottle => &[Date, Time, Host, Fname, Dev, Dsname, World, Cmd, T10, Raw],
            Self::ApdPdl => &[Date, Time, Host, Fname, Dev, Dsname, Raw],
        }
    }

    /// Columns worth counting in a top-N summary.
    ///
    /// Same as `report_fields` with `time` coarsened to `hour` and the
    /// free-form or numeric columns (`raw`, `latency`, `lavg`) dropped.
    pub fn summary_fields(&self) -> Vec<Field> {
        self.report_fields()
            .iter()
            .filter_map(|f| match f {
                Field::Time => Some(Field::Hour),
                Field::Asense => Some(Field::Sense),
                Field::Raw | Field::Latency | Field::Lavg => None,
                other => Some(*other),
            })
            .collect()
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Execution context that issued the command
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum World {
    Vmkernel,
    Vmguest,
}

impl World {
    /// World id `0` is the kernel itself, anything else is a guest world
    pub fn from_world_id(id: &str) -> Self {
        if id == "0" {
            World::Vmkernel
        } else {
            World::Vmguest
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            World::Vmkernel => "vmkernel",
            World::Vmguest => "vmguest",
        }
    }
}

impl fmt::Display for World {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Record schema column
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Field {
    Category,
    Date,
    Hour,
    Time,
    Host,
    Fname,
    Dev,
    Dsname,
    Latency,
    Lavg,
    World,
    Cmd,
    T10,
    Sense,
    Asense,
    Raw,
}

impl Field {
    pub const SCHEMA: [Field; 16] = [
        Field::Category,
        Field::Date,
        Field::Hour,
        Field::Time,
        Field::Host,
        Field::Fname,
        Field::Dev,
        Field::Dsname,
        Field::Latency,
        Field::Lavg,
        Field::World,
        Field::Cmd,
        Field::T10,
        Field::Sense,
        Field::Asense,
        Field::Raw,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Field::Category => "category",
            Field::Date => "date",
            Field::Hour => "hour",
            Field::Time => "time",
            Field::Host => "host",
            Field::Fname => "fname",
            Field::Dev => "dev",
            Field::Dsname => "dsname",
            Field::Latency => "latency",
            Field::Lavg => "lavg",
            Field::World => "world",
            Field::Cmd => "cmd",
            Field::T10 => "t10",
            Field::Sense => "sense",
            Field::Asense => "asense",
            Field::Raw => "raw",
        }
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One classified occurrence of a storage fault signature
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Event {
    pub category: Category,
    /// `YYYY-MM-DD`
    pub date: String,
    /// `HH`
    pub hour: String,
    /// `HH:MM:SS.mmm`
    pub time: String,
    pub host: String,
    /// Source log file name (no directory)
    pub fname: String,
    /// Device or extent identifier, e.g. `naa.600508b1001c...`
    pub dev: String,
    /// Datastore backed by `dev`, or `N/A`
    pub dsname: String,
    /// New latency in microseconds (latency only)
    pub latency: Option<u64>,
    /// Previous rolling average in microseconds (latency only)
    pub lavg: Option<u64>,
    pub world: Option<World>,
    /// SCSI opcode as logged, e.g. `0x28`
    pub cmd: Option<String>,
    /// T10 name for `cmd`
    pub t10: Option<String>,
    /// Translated H/D/P sense triple (io_failure only)
    pub sense: Option<String>,
    /// Untranslated sense tail as logged (io_failure only)
    pub asense: Option<String>,
    /// Original line, untouched apart from the line terminator
    pub raw: String,
}

impl Event {
    /// Column value as text, `None` when the column is not populated
    pub fn value(&self, field: Field) -> Option<String> {
        match field {
            Field::Category => Some(self.category.as_str().to_string()),
            Field::Date => Some(self.date.clone()),
            Field::Hour => Some(self.hour.clone()),
            Field::Time => Some(self.time.clone()),
            Field::Host => Some(self.host.clone()),
            Field::Fname => Some(self.fname.clone()),
            Field::Dev => Some(self.dev.clone()),
            Field::Dsname => Some(self.dsname.clone()),
            Field::Latency => self.latency.map(|v| v.to_string()),
            Field::Lavg => self.lavg.map(|v| v.to_string()),
            Field::World => self.world.map(|w| w.as_str().to_string()),
            Field::Cmd => self.cmd.clone(),
            Field::T10 => self.t10.clone(),
            Field::Sense => self.sense.clone(),
            Field::Asense => self.asense.clone(),
            Field::Raw => Some(self.raw.clone()),
        }
    }
}
