//! Entries command: lists time entries as CSV or a readable listing.

use std::io::Write;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};

use timetrack_core::{EntryFilter, ExportFormat, TimeEntry};

use crate::client::ApiClient;

const SEPARATOR: &str = "------------------------------";
const DISPLAY_TIME_FORMAT: &str = "%a, %d %b %Y %H:%M:%S UTC";

pub async fn run<W: Write>(
    writer: &mut W,
    client: &ApiClient,
    username: Option<&str>,
    url: Option<&str>,
    format: &str,
) -> Result<()> {
    let format = ExportFormat::from_name(format);
    let filter = EntryFilter::new(username, url);

    let body = client
        .entries(&filter, format)
        .await
        .context("failed to retrieve entries")?;

    match format {
        ExportFormat::Csv => write!(writer, "{body}")?,
        ExportFormat::Json => {
            let entries: Vec<TimeEntry> =
                serde_json::from_str(&body).context("failed to parse entries response")?;
            write_listing(writer, &entries)?;
        }
    }
    Ok(())
}

/// Writes entries as a human-readable listing.
pub fn write_listing<W: Write>(writer: &mut W, entries: &[TimeEntry]) -> std::io::Result<()> {
    if entries.is_empty() {
        return writeln!(writer, "No time entries found.");
    }

    writeln!(writer, "Time Entries:")?;
    writeln!(writer, "{SEPARATOR}")?;
    for entry in entries {
        writeln!(writer, "ID: {}", entry.id)?;
        writeln!(writer, "Username: {}", entry.username)?;
        writeln!(writer, "URL: {}", entry.item_url)?;
        writeln!(writer, "Description: {}", entry.description)?;
        writeln!(writer, "Start Time: {}", display_time(entry.start_time))?;
        match entry.end_time {
            Some(end_time) => {
                writeln!(writer, "End Time: {}", display_time(end_time))?;
                writeln!(
                    writer,
                    "Duration: {} minutes",
                    entry.duration_minutes.unwrap_or(0)
                )?;
            }
            None => {
                writeln!(writer, "End Time: ---")?;
                writeln!(writer, "Duration: ---")?;
            }
        }
        writeln!(writer, "{SEPARATOR}")?;
    }
    Ok(())
}

fn display_time(timestamp: DateTime<Utc>) -> String {
    timestamp.format(DISPLAY_TIME_FORMAT).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    use insta::assert_snapshot;

    fn at(timestamp: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(timestamp)
            .unwrap()
            .with_timezone(&Utc)
    }

    #[test]
    fn empty_listing() {
        let mut output = Vec::new();
        write_listing(&mut output, &[]).unwrap();
        assert_eq!(String::from_utf8(output).unwrap(), "No time entries found.\n");
    }

    #[test]
    fn listing_shows_open_and_closed_entries() {
        let start = at("2025-03-01T09:00:00Z");
        let closed = TimeEntry {
            id: 2,
            username: "alice".to_string(),
            item_url: "https://x/1".to_string(),
            description: "fix bug".to_string(),
            start_time: start,
            end_time: Some(at("2025-03-01T09:25:00Z")),
            duration_minutes: Some(25),
            created_at: start,
            updated_at: at("2025-03-01T09:25:00Z"),
        };
        let open = TimeEntry {
            id: 3,
            item_url: "https://x/2".to_string(),
            description: "review".to_string(),
            start_time: at("2025-03-01T10:00:00Z"),
            end_time: None,
            duration_minutes: None,
            ..closed.clone()
        };

        let mut output = Vec::new();
        write_listing(&mut output, &[open, closed]).unwrap();

        assert_snapshot!(String::from_utf8(output).unwrap(), @r"
        Time Entries:
        ------------------------------
        ID: 3
        Username: alice
        URL: https://x/2
        Description: review
        Start Time: Sat, 01 Mar 2025 10:00:00 UTC
        End Time: ---
        Duration: ---
        ------------------------------
        ID: 2
        Username: alice
        URL: https://x/1
        Description: fix bug
        Start Time: Sat, 01 Mar 2025 09:00:00 UTC
        End Time: Sat, 01 Mar 2025 09:25:00 UTC
        Duration: 25 minutes
        ------------------------------
        ");
    }
}
