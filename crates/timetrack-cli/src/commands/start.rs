//! Start command.

use std::io::Write;

use anyhow::{Context, Result};

use timetrack_core::{Description, ItemUrl};

use crate::Config;
use crate::client::ApiClient;

pub async fn run<W: Write>(
    writer: &mut W,
    client: &ApiClient,
    config: &Config,
    url: &str,
    description: &str,
) -> Result<()> {
    let url = ItemUrl::new(url)?;
    let description = Description::new(description)?;

    let entry = client
        .start(&config.username, url.as_str(), description.as_str())
        .await
        .context("failed to start tracking")?;

    writeln!(
        writer,
        "Started tracking ID {} for URL '{}'.",
        entry.id, entry.item_url
    )?;
    Ok(())
}
