//! Report export
//!
//! Writes the captured dataset as CSV, JSON, or a plain-text top-N summary.
//! Each report lands in `swingline-<YYYYmmdd-HHMMSS>.<ext>` inside the report
//! directory. CSV and JSON hold the distinct events ordered by date, time
//! and host; the summary counts over every captured event.

use anyhow::{Context, Result};
use chrono::Local;
use std::fmt::Write as _;
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use swingline_common::{Category, Event, EventStore, ExportFormat, Field};
use tracing::info;

const REPORT_PREFIX: &str = "swingline";

pub struct Reporter {
    output_dir: PathBuf,
    stamp: String,
    top_n: usize,
}

impl Reporter {
    pub fn new(output_dir: impl Into<PathBuf>, top_n: usize) -> Self {
        Self {
            output_dir: output_dir.into(),
            stamp: Local::now().format("%Y%m%d-%H%M%S").to_string(),
            top_n,
        }
    }

    /// Fixed timestamp for the report file names
    pub fn with_stamp(mut self, stamp: impl Into<String>) -> Self {
        self.stamp = stamp.into();
        self
    }

    pub fn path_for(&self, format: ExportFormat) -> PathBuf {
        self.output_dir.join(format!(
            "{}-{}.{}",
            REPORT_PREFIX,
            self.stamp,
            format.extension()
        ))
    }

    /// Write one report per format, returning the paths written
    pub fn export(&self, store: &EventStore, formats: &[ExportFormat]) -> Result<Vec<PathBuf>> {
        if formats.is_empty() {
            return Ok(Vec::new());
        }

        fs::create_dir_all(&self.output_dir).with_context(|| {
            format!("Failed to create report directory {}", self.output_dir.display())
        })?;

        let events = store.distinct_sorted();
        let mut written = Vec::with_capacity(formats.len());
        for &format in formats {
            let path = self.path_for(format);
            let file = File::create(&path)
                .with_context(|| format!("Failed to create report {}", path.display()))?;
            let mut out = BufWriter::new(file);

            match format {
                ExportFormat::Csv => write_csv(&events, &mut out)?,
                ExportFormat::Json => write_json(&events, &mut out)?,
                ExportFormat::Summary => out.write_all(render_summary(store, self.top_n).as_bytes())?,
            }
            out.flush()?;

            info!(
                "Exported {} report to \"{}\" - size {}",
                format.extension(),
                path.display(),
                file_size(&path)
            );
            written.push(path);
        }
        Ok(written)
    }
}

fn file_size(path: &Path) -> u64 {
    fs::metadata(path).map(|m| m.len()).unwrap_or(0)
}

/// CSV with the full record schema as header; unpopulated columns are empty
pub fn write_csv<W: Write>(events: &[&Event], writer: W) -> Result<()> {
    let mut wtr = csv::Writer::from_writer(writer);
    wtr.write_record(Field::SCHEMA.iter().map(|f| f.as_str()))?;
    for event in events {
        wtr.write_record(
            Field::SCHEMA
                .iter()
                .map(|&f| event.value(f).unwrap_or_default()),
        )?;
    }
    wtr.flush()?;
    Ok(())
}

pub fn write_json<W: Write>(events: &[&Event], writer: W) -> Result<()> {
    serde_json::to_writer_pretty(writer, events)?;
    Ok(())
}

/// Most frequent values per summary field, category by category
pub fn render_summary(store: &EventStore, top_n: usize) -> String {
    let mut out = format!("Top {} Summary for multiple vm-support bundles...", top_n);

    for category in Category::ALL {
        for field in category.summary_fields() {
            let top = store.top_values(category, field, top_n);
            if top.is_empty() {
                continue;
            }
            let _ = write!(out, "\n\n### {} summary for {} ###\n", category, field);
            for (value, count) in top {
                let _ = writeln!(out, "{:>10}\t{}", count, value);
            }
        }
    }
    out.push('\n');
    out
}
