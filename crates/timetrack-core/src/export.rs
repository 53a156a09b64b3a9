//! Structured and tabular renderings of time entries.
//!
//! Both renderings take the entry sequence as returned by the repository, so
//! "most recent first" ordering carries through unchanged.

use std::convert::Infallible;
use std::fmt;
use std::io::Write;
use std::str::FromStr;

use chrono::{DateTime, SecondsFormat, Utc};
use thiserror::Error;

use crate::entry::TimeEntry;

/// Column headers of the tabular rendering, in order.
pub const TABLE_HEADER: [&str; 9] = [
    "ID",
    "Username",
    "URL",
    "Description",
    "Start Time",
    "End Time",
    "Duration (minutes)",
    "Created At",
    "Updated At",
];

/// Placeholder for the end time of an open entry.
pub const OPEN_END_TIME: &str = "N/A";

/// Export errors.
#[derive(Debug, Error)]
pub enum ExportError {
    #[error("failed to encode JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("failed to encode CSV: {0}")]
    Csv(#[from] csv::Error),
    #[error("failed to write output: {0}")]
    Io(#[from] std::io::Error),
    #[error("encoded output is not valid UTF-8: {0}")]
    Utf8(#[from] std::string::FromUtf8Error),
}

/// Output format selector.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ExportFormat {
    #[default]
    Json,
    Csv,
}

impl ExportFormat {
    /// Selects a format by name. Anything other than `csv` means JSON.
    pub fn from_name(name: &str) -> Self {
        if name.trim().eq_ignore_ascii_case("csv") {
            Self::Csv
        } else {
            Self::Json
        }
    }

    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Json => "json",
            Self::Csv => "csv",
        }
    }

    pub const fn content_type(&self) -> &'static str {
        match self {
            Self::Json => "application/json",
            Self::Csv => "text/csv",
        }
    }
}

impl fmt::Display for ExportFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for ExportFormat {
    type Err = Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self::from_name(s))
    }
}

/// Renders a timestamp the way every table cell shows time.
pub fn format_timestamp(timestamp: DateTime<Utc>) -> String {
    timestamp.to_rfc3339_opts(SecondsFormat::Secs, true)
}

/// Flattens one entry into table cells, in [`TABLE_HEADER`] order.
pub fn table_row(entry: &TimeEntry) -> [String; 9] {
    [
        entry.id.to_string(),
        entry.username.clone(),
        entry.item_url.clone(),
        entry.description.clone(),
        format_timestamp(entry.start_time),
        entry
            .end_time
            .map_or_else(|| OPEN_END_TIME.to_string(), format_timestamp),
        entry.duration_minutes.unwrap_or(0).to_string(),
        format_timestamp(entry.created_at),
        format_timestamp(entry.updated_at),
    ]
}

/// Writes the tabular rendering as CSV.
pub fn write_csv<W: Write>(writer: W, entries: &[TimeEntry]) -> Result<(), ExportError> {
    let mut table = csv::WriterBuilder::new()
        .terminator(csv::Terminator::Any(b'\n'))
        .from_writer(writer);
    table.write_record(TABLE_HEADER)?;
    for entry in entries {
        table.write_record(table_row(entry))?;
    }
    table.flush()?;
    Ok(())
}

/// Renders entries in the requested format.
pub fn render(entries: &[TimeEntry], format: ExportFormat) -> Result<String, ExportError> {
    match format {
        ExportFormat::Json => Ok(serde_json::to_string(entries)?),
        ExportFormat::Csv => {
            let mut buf = Vec::new();
            write_csv(&mut buf, entries)?;
            Ok(String::from_utf8(buf)?)
        }
    }
}
