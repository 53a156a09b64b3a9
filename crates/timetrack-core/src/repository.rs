//! Storage contract for time entries.

use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::entry::{EntryFilter, EntryId, NewEntry, TimeEntry};
use crate::types::{ItemUrl, Username};

/// Repository errors.
///
/// Storage-engine detail is logged by the implementation and never carried here.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RepositoryError {
    /// An open entry already exists for the pair.
    #[error("an open entry already exists for {username} on {item_url}")]
    Conflict { username: String, item_url: String },
    /// The entry does not exist or is no longer open.
    #[error("no open time entry with id {0}")]
    NotFound(EntryId),
    /// The storage backend could not complete the operation.
    #[error("storage unavailable during {operation}")]
    StorageUnavailable { operation: &'static str },
}

/// Durable storage for time entries.
///
/// Implementations own the "at most one open entry per (username, item)"
/// invariant: `create` must be atomic with respect to other `create` calls for
/// the same pair, and `close` must only ever affect an entry that is still open.
///
/// Calls may block on I/O. Async callers should run them on a blocking thread.
pub trait EntryRepository: Send + Sync {
    /// Inserts a new open entry unless one already exists for the pair.
    fn create(&self, entry: &NewEntry) -> Result<TimeEntry, RepositoryError>;

    /// Returns the open entry for the pair, if any.
    fn find_open(
        &self,
        username: &Username,
        item_url: &ItemUrl,
    ) -> Result<Option<TimeEntry>, RepositoryError>;

    /// Closes an open entry.
    ///
    /// Fails with [`RepositoryError::NotFound`] if the entry does not exist or
    /// has already been closed.
    fn close(
        &self,
        entry_id: EntryId,
        end_time: DateTime<Utc>,
        duration_minutes: i64,
    ) -> Result<TimeEntry, RepositoryError>;

    /// Lists matching entries, most recently started first.
    fn list(&self, filter: &EntryFilter) -> Result<Vec<TimeEntry>, RepositoryError>;

    /// Returns the most recently started open entry for the user, on any item.
    fn find_active(&self, username: &Username) -> Result<Option<TimeEntry>, RepositoryError>;

    /// Checks that the storage backend is reachable.
    fn ping(&self) -> Result<(), RepositoryError> {
        Ok(())
    }
}
