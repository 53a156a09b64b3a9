//! Stop command.

use std::io::Write;

use anyhow::{Context, Result};

use timetrack_core::ItemUrl;

use crate::Config;
use crate::client::ApiClient;

pub async fn run<W: Write>(
    writer: &mut W,
    client: &ApiClient,
    config: &Config,
    url: &str,
) -> Result<()> {
    let url = ItemUrl::new(url)?;

    let entry = client
        .stop(&config.username, url.as_str())
        .await
        .context("failed to stop tracking")?;

    writeln!(
        writer,
        "Stopped tracking for URL '{}'. Duration: {} minutes.",
        entry.item_url,
        entry.duration_minutes.unwrap_or(0)
    )?;
    Ok(())
}
