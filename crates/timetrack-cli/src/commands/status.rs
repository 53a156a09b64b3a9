//! Status command for showing what the user is tracking.

use std::io::Write;

use anyhow::{Context, Result};

use timetrack_core::TrackingStatus;

use crate::Config;
use crate::client::ApiClient;

pub async fn run<W: Write>(writer: &mut W, client: &ApiClient, config: &Config) -> Result<()> {
    let status = client
        .status(&config.username)
        .await
        .context("failed to fetch status")?;

    match status {
        TrackingStatus::Idle => writeln!(writer, "Idle.")?,
        TrackingStatus::Active { entry_id, item_url } => {
            writeln!(writer, "Tracking ID {entry_id} for URL '{item_url}'.")?;
        }
    }
    Ok(())
}
