//! The tracking state machine: start, stop, status and list.

use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::entry::{EntryFilter, EntryId, NewEntry, TimeEntry, TrackingStatus};
use crate::repository::{EntryRepository, RepositoryError};
use crate::types::{Description, ItemUrl, Username, ValidationError};

/// Tracking errors, independent of any transport.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TrackingError {
    /// A required field was empty or whitespace-only.
    #[error(transparent)]
    InvalidInput(#[from] ValidationError),
    /// Start was rejected because the pair already has an open entry.
    #[error("an active time entry for {item_url} already exists")]
    AlreadyActive { username: String, item_url: String },
    /// Nothing to stop for the pair.
    #[error("no active time entry found for {item_url}")]
    NoActiveEntry { username: String, item_url: String },
    /// Storage failed; the caller may retry.
    #[error("storage unavailable during {operation}")]
    StorageUnavailable { operation: &'static str },
    /// An entry disappeared underneath an operation.
    #[error("time entry {0} not found")]
    NotFound(EntryId),
}

/// Stable classification of [`TrackingError`] for outward status mapping.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    InvalidInput,
    AlreadyActive,
    NoActiveEntry,
    StorageUnavailable,
    NotFound,
}

impl ErrorKind {
    /// Machine-readable code.
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::InvalidInput => "invalid_input",
            Self::AlreadyActive => "already_active",
            Self::NoActiveEntry => "no_active_entry",
            Self::StorageUnavailable => "storage_unavailable",
            Self::NotFound => "not_found",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl TrackingError {
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidInput(_) => ErrorKind::InvalidInput,
            Self::AlreadyActive { .. } => ErrorKind::AlreadyActive,
            Self::NoActiveEntry { .. } => ErrorKind::NoActiveEntry,
            Self::StorageUnavailable { .. } => ErrorKind::StorageUnavailable,
            Self::NotFound(_) => ErrorKind::NotFound,
        }
    }
}

impl From<RepositoryError> for TrackingError {
    fn from(err: RepositoryError) -> Self {
        match err {
            RepositoryError::Conflict { username, item_url } => {
                Self::AlreadyActive { username, item_url }
            }
            RepositoryError::NotFound(id) => Self::NotFound(id),
            RepositoryError::StorageUnavailable { operation } => {
                Self::StorageUnavailable { operation }
            }
        }
    }
}

/// Whole minutes elapsed from `start` to `end`, never negative.
pub fn elapsed_minutes(start: DateTime<Utc>, end: DateTime<Utc>) -> i64 {
    (end - start).num_minutes().max(0)
}

/// Runs tracking operations against an explicitly supplied repository.
#[derive(Clone)]
pub struct TrackingEngine {
    repo: Arc<dyn EntryRepository>,
}

impl fmt::Debug for TrackingEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TrackingEngine").finish_non_exhaustive()
    }
}

impl TrackingEngine {
    pub fn new(repo: Arc<dyn EntryRepository>) -> Self {
        Self { repo }
    }

    /// Opens a new entry for the pair.
    pub fn start(
        &self,
        username: &str,
        item_url: &str,
        description: &str,
        now: DateTime<Utc>,
    ) -> Result<TimeEntry, TrackingError> {
        let new_entry = NewEntry {
            username: Username::new(username)?,
            item_url: ItemUrl::new(item_url)?,
            description: Description::new(description)?,
            start_time: now,
        };
        let entry = self.repo.create(&new_entry)?;
        tracing::debug!(
            id = entry.id,
            username = %entry.username,
            url = %entry.item_url,
            "started tracking"
        );
        Ok(entry)
    }

    /// Closes the open entry for the pair.
    ///
    /// Losing a race with a concurrent stop reports [`TrackingError::NoActiveEntry`],
    /// the same as finding nothing to stop.
    pub fn stop(
        &self,
        username: &str,
        item_url: &str,
        now: DateTime<Utc>,
    ) -> Result<TimeEntry, TrackingError> {
        let username = Username::new(username)?;
        let item_url = ItemUrl::new(item_url)?;
        let no_active = || TrackingError::NoActiveEntry {
            username: username.to_string(),
            item_url: item_url.to_string(),
        };

        let Some(open) = self.repo.find_open(&username, &item_url)? else {
            return Err(no_active());
        };

        // Clock skew must not produce an interval that ends before it starts.
        let end_time = now.max(open.start_time);
        let duration = elapsed_minutes(open.start_time, end_time);

        let closed = match self.repo.close(open.id, end_time, duration) {
            Ok(entry) => entry,
            Err(RepositoryError::NotFound(id)) => {
                tracing::debug!(id, "entry closed concurrently");
                return Err(no_active());
            }
            Err(err) => return Err(err.into()),
        };
        tracing::debug!(
            id = closed.id,
            duration_minutes = duration,
            "stopped tracking"
        );
        Ok(closed)
    }

    /// Reports whether the user has any open entry.
    pub fn status(&self, username: &str) -> Result<TrackingStatus, TrackingError> {
        let username = Username::new(username)?;
        Ok(match self.repo.find_active(&username)? {
            Some(entry) => TrackingStatus::Active {
                entry_id: entry.id,
                item_url: entry.item_url,
            },
            None => TrackingStatus::Idle,
        })
    }

    /// Lists entries, most recently started first.
    pub fn list(&self, filter: &EntryFilter) -> Result<Vec<TimeEntry>, TrackingError> {
        Ok(self.repo.list(filter)?)
    }

    /// Checks that storage is reachable.
    pub fn ping(&self) -> Result<(), TrackingError> {
        Ok(self.repo.ping()?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::sync::Mutex;

    use chrono::Duration;

    use crate::memory::MemoryRepository;

    fn at(timestamp: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(timestamp)
            .unwrap()
            .with_timezone(&Utc)
    }

    fn engine() -> TrackingEngine {
        TrackingEngine::new(Arc::new(MemoryRepository::new()))
    }

    #[test]
    fn start_then_immediate_stop_has_zero_duration() {
        let engine = engine();
        let now = at("2025-01-01T09:00:00Z");
        let started = engine.start("alice", "u1", "desc", now).unwrap();
        assert!(started.is_open());
        assert_eq!(started.duration_minutes, None);

        let stopped = engine.stop("alice", "u1", now).unwrap();
        assert_eq!(stopped.duration_minutes, Some(0));
        assert!(stopped.end_time.unwrap() >= stopped.start_time);
    }

    #[test]
    fn duration_is_floored_to_whole_minutes() {
        let engine = engine();
        let start = at("2025-01-01T09:00:00Z");
        engine.start("alice", "u1", "desc", start).unwrap();
        let stopped = engine
            .stop("alice", "u1", start + Duration::seconds(59 * 60 + 59))
            .unwrap();
        assert_eq!(stopped.duration_minutes, Some(59));
    }

    #[test]
    fn clock_moving_backwards_clamps_to_zero() {
        let engine = engine();
        let start = at("2025-01-01T09:00:00Z");
        engine.start("alice", "u1", "desc", start).unwrap();
        let stopped = engine
            .stop("alice", "u1", start - Duration::minutes(5))
            .unwrap();
        assert_eq!(stopped.duration_minutes, Some(0));
        assert_eq!(stopped.end_time, Some(start));
    }

    #[test]
    fn blank_inputs_are_invalid() {
        let engine = engine();
        let now = at("2025-01-01T09:00:00Z");
        for (user, url, desc) in [(" ", "u1", "d"), ("alice", "", "d"), ("alice", "u1", "\n")] {
            let err = engine.start(user, url, desc, now).unwrap_err();
            assert_eq!(err.kind(), ErrorKind::InvalidInput);
        }
        assert_eq!(
            engine.stop("", "u1", now).unwrap_err().kind(),
            ErrorKind::InvalidInput
        );
        assert_eq!(
            engine.status("  ").unwrap_err().kind(),
            ErrorKind::InvalidInput
        );
    }

    #[test]
    fn stop_without_open_entry_reports_no_active_entry() {
        let engine = engine();
        let err = engine
            .stop("alice", "u-unknown", at("2025-01-01T09:00:00Z"))
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NoActiveEntry);
    }

    #[test]
    fn status_transitions_idle_active_idle() {
        let engine = engine();
        let now = at("2025-01-01T09:00:00Z");
        assert_eq!(engine.status("alice").unwrap(), TrackingStatus::Idle);

        let entry = engine.start("alice", "u1", "desc", now).unwrap();
        assert_eq!(
            engine.status("alice").unwrap(),
            TrackingStatus::Active {
                entry_id: entry.id,
                item_url: "u1".to_string(),
            }
        );

        engine.stop("alice", "u1", now).unwrap();
        assert_eq!(engine.status("alice").unwrap(), TrackingStatus::Idle);
    }

    #[test]
    fn scenario_restart_after_stop_gets_new_id() {
        let engine = engine();
        let now = at("2025-01-01T09:00:00Z");
        let url = "https://x/1";

        let first = engine.start("alice", url, "fix bug", now).unwrap();
        assert_eq!(first.id, 1);
        assert!(first.end_time.is_none());

        let err = engine.start("alice", url, "again", now).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::AlreadyActive);

        let stopped = engine
            .stop("alice", url, now + Duration::minutes(3))
            .unwrap();
        assert_eq!(stopped.id, 1);
        assert!(stopped.end_time.is_some());
        assert_eq!(stopped.duration_minutes, Some(3));

        let second = engine
            .start("alice", url, "again", now + Duration::minutes(4))
            .unwrap();
        assert_eq!(second.id, 2);
    }

    #[test]
    fn list_is_stable_without_writes() {
        let engine = engine();
        let now = at("2025-01-01T09:00:00Z");
        engine.start("alice", "u1", "a", now).unwrap();
        engine
            .start("bob", "u1", "b", now + Duration::minutes(1))
            .unwrap();
        engine
            .start("alice", "u2", "c", now + Duration::minutes(2))
            .unwrap();

        let first = engine.list(&EntryFilter::default()).unwrap();
        let second = engine.list(&EntryFilter::default()).unwrap();
        assert_eq!(first, second);

        let alice = engine.list(&EntryFilter::new(Some("alice"), None)).unwrap();
        assert_eq!(alice.len(), 2);
        assert!(alice.iter().all(|e| e.username == "alice"));
        assert!(alice[0].start_time > alice[1].start_time);
    }

    #[test]
    fn concurrent_starts_for_one_pair_admit_exactly_one() {
        let engine = engine();
        let now = at("2025-01-01T09:00:00Z");
        let results = Mutex::new(Vec::new());

        std::thread::scope(|scope| {
            for i in 0..16 {
                let engine = engine.clone();
                let results = &results;
                scope.spawn(move || {
                    let result = engine.start("alice", "u1", &format!("attempt {i}"), now);
                    results.lock().unwrap().push(result);
                });
            }
        });

        let results = results.into_inner().unwrap();
        let successes = results.iter().filter(|r| r.is_ok()).count();
        assert_eq!(successes, 1);
        assert!(
            results
                .iter()
                .filter_map(|r| r.as_ref().err())
                .all(|e| e.kind() == ErrorKind::AlreadyActive)
        );
    }

    /// Repository whose open entry vanishes between lookup and close.
    struct RacingRepository {
        inner: MemoryRepository,
    }

    impl EntryRepository for RacingRepository {
        fn create(&self, entry: &NewEntry) -> Result<TimeEntry, RepositoryError> {
            self.inner.create(entry)
        }

        fn find_open(
            &self,
            username: &Username,
            item_url: &ItemUrl,
        ) -> Result<Option<TimeEntry>, RepositoryError> {
            let found = self.inner.find_open(username, item_url)?;
            if let Some(entry) = &found {
                self.inner.close(entry.id, entry.start_time, 0)?;
            }
            Ok(found)
        }

        fn close(
            &self,
            entry_id: EntryId,
            end_time: DateTime<Utc>,
            duration_minutes: i64,
        ) -> Result<TimeEntry, RepositoryError> {
            self.inner.close(entry_id, end_time, duration_minutes)
        }

        fn list(&self, filter: &EntryFilter) -> Result<Vec<TimeEntry>, RepositoryError> {
            self.inner.list(filter)
        }

        fn find_active(&self, username: &Username) -> Result<Option<TimeEntry>, RepositoryError> {
            self.inner.find_active(username)
        }
    }

    #[test]
    fn stop_that_loses_race_reports_no_active_entry() {
        let engine = TrackingEngine::new(Arc::new(RacingRepository {
            inner: MemoryRepository::new(),
        }));
        let now = at("2025-01-01T09:00:00Z");
        engine.start("alice", "u1", "desc", now).unwrap();

        let err = engine.stop("alice", "u1", now).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NoActiveEntry);
    }

    struct FailingRepository;

    impl EntryRepository for FailingRepository {
        fn create(&self, _entry: &NewEntry) -> Result<TimeEntry, RepositoryError> {
            Err(RepositoryError::StorageUnavailable { operation: "create" })
        }

        fn find_open(
            &self,
            _username: &Username,
            _item_url: &ItemUrl,
        ) -> Result<Option<TimeEntry>, RepositoryError> {
            Err(RepositoryError::StorageUnavailable {
                operation: "find_open",
            })
        }

        fn close(
            &self,
            _entry_id: EntryId,
            _end_time: DateTime<Utc>,
            _duration_minutes: i64,
        ) -> Result<TimeEntry, RepositoryError> {
            Err(RepositoryError::StorageUnavailable { operation: "close" })
        }

        fn list(&self, _filter: &EntryFilter) -> Result<Vec<TimeEntry>, RepositoryError> {
            Err(RepositoryError::StorageUnavailable { operation: "list" })
        }

        fn find_active(&self, _username: &Username) -> Result<Option<TimeEntry>, RepositoryError> {
            Err(RepositoryError::StorageUnavailable {
                operation: "find_active",
            })
        }

        fn ping(&self) -> Result<(), RepositoryError> {
            Err(RepositoryError::StorageUnavailable { operation: "ping" })
        }
    }

    #[test]
    fn storage_failures_propagate_unchanged() {
        let engine = TrackingEngine::new(Arc::new(FailingRepository));
        let now = at("2025-01-01T09:00:00Z");

        let errors = [
            engine.start("alice", "u1", "d", now).unwrap_err(),
            engine.stop("alice", "u1", now).unwrap_err(),
            engine.status("alice").unwrap_err(),
            engine.list(&EntryFilter::default()).unwrap_err(),
            engine.ping().unwrap_err(),
        ];
        assert!(
            errors
                .iter()
                .all(|e| e.kind() == ErrorKind::StorageUnavailable)
        );
    }
}
