//! In-process entry repository.

use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, SubsecRound, Utc};

use crate::entry::{EntryFilter, EntryId, NewEntry, TimeEntry};
use crate::repository::{EntryRepository, RepositoryError};
use crate::types::{ItemUrl, Username};

/// Entry repository kept in memory.
///
/// All state sits behind one mutex, so each check-and-write runs under a
/// single lock acquisition. Nothing survives the process.
#[derive(Debug, Default)]
pub struct MemoryRepository {
    state: Mutex<MemoryState>,
}

#[derive(Debug, Default)]
struct MemoryState {
    last_id: EntryId,
    entries: Vec<TimeEntry>,
}

impl MemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self, operation: &'static str) -> Result<MutexGuard<'_, MemoryState>, RepositoryError> {
        self.state.lock().map_err(|_| {
            tracing::warn!(operation, "memory repository lock poisoned");
            RepositoryError::StorageUnavailable { operation }
        })
    }
}

impl MemoryState {
    fn open_entry(&self, username: &str, item_url: &str) -> Option<&TimeEntry> {
        self.entries
            .iter()
            .find(|e| e.is_open() && e.username == username && e.item_url == item_url)
    }
}

/// Timestamps keep millisecond precision, matching what durable storage keeps.
fn stored(timestamp: DateTime<Utc>) -> DateTime<Utc> {
    timestamp.trunc_subsecs(3)
}

fn newest_first(entries: &mut [TimeEntry]) {
    entries.sort_by(|a, b| b.start_time.cmp(&a.start_time).then(b.id.cmp(&a.id)));
}

impl EntryRepository for MemoryRepository {
    fn create(&self, entry: &NewEntry) -> Result<TimeEntry, RepositoryError> {
        let mut state = self.lock("create")?;
        if state
            .open_entry(entry.username.as_str(), entry.item_url.as_str())
            .is_some()
        {
            return Err(RepositoryError::Conflict {
                username: entry.username.to_string(),
                item_url: entry.item_url.to_string(),
            });
        }

        state.last_id += 1;
        let now = stored(Utc::now());
        let created = TimeEntry {
            id: state.last_id,
            username: entry.username.to_string(),
            item_url: entry.item_url.to_string(),
            description: entry.description.to_string(),
            start_time: stored(entry.start_time),
            end_time: None,
            duration_minutes: None,
            created_at: now,
            updated_at: now,
        };
        state.entries.push(created.clone());
        Ok(created)
    }

    fn find_open(
        &self,
        username: &Username,
        item_url: &ItemUrl,
    ) -> Result<Option<TimeEntry>, RepositoryError> {
        let state = self.lock("find_open")?;
        Ok(state
            .open_entry(username.as_str(), item_url.as_str())
            .cloned())
    }

    fn close(
        &self,
        entry_id: EntryId,
        end_time: DateTime<Utc>,
        duration_minutes: i64,
    ) -> Result<TimeEntry, RepositoryError> {
        let mut state = self.lock("close")?;
        let entry = state
            .entries
            .iter_mut()
            .find(|e| e.id == entry_id && e.is_open())
            .ok_or(RepositoryError::NotFound(entry_id))?;
        entry.end_time = Some(stored(end_time));
        entry.duration_minutes = Some(duration_minutes);
        entry.updated_at = stored(Utc::now());
        Ok(entry.clone())
    }

    fn list(&self, filter: &EntryFilter) -> Result<Vec<TimeEntry>, RepositoryError> {
        let state = self.lock("list")?;
        let mut entries: Vec<TimeEntry> = state
            .entries
            .iter()
            .filter(|e| filter.matches(e))
            .cloned()
            .collect();
        newest_first(&mut entries);
        Ok(entries)
    }

    fn find_active(&self, username: &Username) -> Result<Option<TimeEntry>, RepositoryError> {
        let state = self.lock("find_active")?;
        Ok(state
            .entries
            .iter()
            .filter(|e| e.is_open() && e.username == username.as_str())
            .max_by(|a, b| a.start_time.cmp(&b.start_time).then(a.id.cmp(&b.id)))
            .cloned())
    }

    fn ping(&self) -> Result<(), RepositoryError> {
        self.lock("ping").map(|_| ())
    }
}
