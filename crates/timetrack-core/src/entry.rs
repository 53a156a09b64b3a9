//! Time entries and the values used to query them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::types::{Description, ItemUrl, Username};

/// Repository-assigned identifier of a time entry.
pub type EntryId = i64;

/// One start/stop interval a user spent on a work item.
///
/// An entry without `end_time` is open and still accumulating time. Once
/// closed, `end_time` and `duration_minutes` are fixed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeEntry {
    /// Unique, monotonically assigned identifier.
    pub id: EntryId,
    /// The tracking actor.
    pub username: String,
    /// The tracked work item.
    #[serde(rename = "url")]
    pub item_url: String,
    /// Description recorded at start.
    pub description: String,
    /// When tracking started.
    pub start_time: DateTime<Utc>,
    /// When tracking stopped. Absent while the entry is open.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_time: Option<DateTime<Utc>>,
    /// Whole minutes between start and end. Absent while the entry is open.
    #[serde(default, rename = "duration", skip_serializing_if = "Option::is_none")]
    pub duration_minutes: Option<i64>,
    /// When the record was inserted.
    pub created_at: DateTime<Utc>,
    /// When the record was last written.
    pub updated_at: DateTime<Utc>,
}

impl TimeEntry {
    /// Returns true while the entry has no end time.
    pub const fn is_open(&self) -> bool {
        self.end_time.is_none()
    }
}

/// A validated request to open a new entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewEntry {
    pub username: Username,
    pub item_url: ItemUrl,
    pub description: Description,
    pub start_time: DateTime<Utc>,
}

/// Exact-match filter for listing entries.
///
/// Fields that are absent, empty or whitespace-only do not constrain the result.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntryFilter {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(default, rename = "url", skip_serializing_if = "Option::is_none")]
    pub item_url: Option<String>,
}

impl EntryFilter {
    /// Builds a filter, dropping blank fields.
    pub fn new(username: Option<&str>, item_url: Option<&str>) -> Self {
        Self {
            username: non_blank(username),
            item_url: non_blank(item_url),
        }
    }

    /// Returns the username constraint, if any.
    pub fn username(&self) -> Option<&str> {
        self.username.as_deref().filter(|s| !s.trim().is_empty())
    }

    /// Returns the item constraint, if any.
    pub fn item_url(&self) -> Option<&str> {
        self.item_url.as_deref().filter(|s| !s.trim().is_empty())
    }

    /// Checks an entry against the filter.
    pub fn matches(&self, entry: &TimeEntry) -> bool {
        self.username().is_none_or(|u| entry.username == u)
            && self.item_url().is_none_or(|url| entry.item_url == url)
    }
}

fn non_blank(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

/// Whether a user currently has an open entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum TrackingStatus {
    /// No open entry.
    Idle,
    /// An open entry exists.
    Active {
        #[serde(rename = "id")]
        entry_id: EntryId,
        #[serde(rename = "url")]
        item_url: String,
    },
}

impl TrackingStatus {
    pub const fn is_active(&self) -> bool {
        matches!(self, Self::Active { .. })
    }
}
