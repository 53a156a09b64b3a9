//! Storage layer for the team time tracker.
//!
//! Provides durable persistence for time entries using `rusqlite`.
//!
//! # Thread Safety
//!
//! `rusqlite::Connection` is `Send` but not `Sync`. [`Database`] keeps its
//! connection behind a `Mutex`, so one handle can be shared across threads
//! (for example inside an `Arc`). Each repository call holds the lock for a
//! single statement or transaction and never across an `.await`.
//!
//! Several handles (or processes) may open the same file. Writers wait on the
//! SQLite busy timeout instead of failing immediately.
//!
//! # Schema
//!
//! A single `time_entries` table keyed by an auto-incremented id. Ids are never
//! reused, even after rows are removed by hand.
//!
//! The "at most one open entry per (username, item)" rule is a partial unique
//! index over `(username, item_url) WHERE end_time IS NULL`. It holds no matter
//! which connection writes.
//!
//! ## Timestamp Format
//!
//! Timestamps are stored as TEXT in RFC 3339 with millisecond precision and a
//! `Z` suffix (e.g., `2024-01-15T10:30:00.000Z`). The fixed width means
//! lexicographic ordering matches chronological ordering.

use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::{
    Connection, ErrorCode, OptionalExtension, Row, TransactionBehavior, params, params_from_iter,
};
use thiserror::Error;

use timetrack_core::{
    EntryFilter, EntryId, EntryRepository, ItemUrl, NewEntry, RepositoryError, TimeEntry,
    Username,
};

/// How long a writer waits for another connection's lock.
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

const ENTRY_COLUMNS: &str = "id, username, item_url, description, start_time, end_time, duration_minutes, created_at, updated_at";

/// Database errors.
#[derive(Debug, Error)]
pub enum DbError {
    /// An error from the underlying database.
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    /// Failed to parse a stored timestamp.
    #[error("invalid timestamp for entry {entry_id}: {timestamp}")]
    TimestampParse {
        entry_id: EntryId,
        timestamp: String,
        #[source]
        source: chrono::ParseError,
    },
    /// The pair already has an open entry.
    #[error("an open entry already exists for {username} on {item_url}")]
    OpenEntryExists { username: String, item_url: String },
    /// The entry does not exist or is already closed.
    #[error("no open entry with id {0}")]
    EntryNotOpen(EntryId),
    /// A thread panicked while holding the connection.
    #[error("database connection lock poisoned")]
    LockPoisoned,
}

/// Database connection wrapper.
///
/// See the [module documentation](self) for thread safety considerations.
pub struct Database {
    conn: Mutex<Connection>,
}

impl std::fmt::Debug for Database {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Database").finish_non_exhaustive()
    }
}

impl Database {
    /// Opens a database at the given path, creating it if necessary.
    ///
    /// The database schema is automatically initialized on first open.
    pub fn open(path: &Path) -> Result<Self, DbError> {
        let conn = Connection::open(path)?;
        Self::from_connection(conn)
    }

    /// Opens an in-memory database.
    ///
    /// Useful for testing. The database is destroyed when the connection closes.
    pub fn open_in_memory() -> Result<Self, DbError> {
        let conn = Connection::open_in_memory()?;
        Self::from_connection(conn)
    }

    fn from_connection(conn: Connection) -> Result<Self, DbError> {
        conn.busy_timeout(BUSY_TIMEOUT)?;
        init(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>, DbError> {
        self.conn.lock().map_err(|_| DbError::LockPoisoned)
    }

    /// Inserts a new open entry, unless the pair already has one.
    ///
    /// The lookup and insert share one `IMMEDIATE` transaction; the partial
    /// unique index rejects anything that slips past the lookup.
    pub fn insert_entry(&self, entry: &NewEntry) -> Result<TimeEntry, DbError> {
        let mut conn = self.lock()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        let conflict = || DbError::OpenEntryExists {
            username: entry.username.to_string(),
            item_url: entry.item_url.to_string(),
        };
        if select_open(&tx, entry.username.as_str(), entry.item_url.as_str())?.is_some() {
            return Err(conflict());
        }

        let now = format_timestamp(Utc::now());
        let inserted = tx.execute(
            "
            INSERT INTO time_entries
            (username, item_url, description, start_time, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?)
            ",
            params![
                entry.username.as_str(),
                entry.item_url.as_str(),
                entry.description.as_str(),
                format_timestamp(entry.start_time),
                now,
                now,
            ],
        );
        match inserted {
            Ok(_) => {}
            Err(err) if is_unique_violation(&err) => return Err(conflict()),
            Err(err) => return Err(err.into()),
        }

        let id = tx.last_insert_rowid();
        let created = select_entry(&tx, id)?.ok_or(DbError::EntryNotOpen(id))?;
        tx.commit()?;
        Ok(created)
    }

    /// Closes an entry that is still open.
    pub fn close_entry(
        &self,
        entry_id: EntryId,
        end_time: DateTime<Utc>,
        duration_minutes: i64,
    ) -> Result<TimeEntry, DbError> {
        let mut conn = self.lock()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let changed = tx.execute(
            "
            UPDATE time_entries
            SET end_time = ?, duration_minutes = ?, updated_at = ?
            WHERE id = ? AND end_time IS NULL
            ",
            params![
                format_timestamp(end_time),
                duration_minutes,
                format_timestamp(Utc::now()),
                entry_id,
            ],
        )?;
        if changed == 0 {
            return Err(DbError::EntryNotOpen(entry_id));
        }
        let closed = select_entry(&tx, entry_id)?.ok_or(DbError::EntryNotOpen(entry_id))?;
        tx.commit()?;
        Ok(closed)
    }

    /// Returns the open entry for a (username, item) pair.
    pub fn open_entry(&self, username: &str, item_url: &str) -> Result<Option<TimeEntry>, DbError> {
        let conn = self.lock()?;
        select_open(&conn, username, item_url)
    }

    /// Returns the most recently started open entry for a user.
    pub fn active_entry(&self, username: &str) -> Result<Option<TimeEntry>, DbError> {
        let conn = self.lock()?;
        let row = conn
            .query_row(
                &format!(
                    "
                    SELECT {ENTRY_COLUMNS}
                    FROM time_entries
                    WHERE username = ? AND end_time IS NULL
                    ORDER BY start_time DESC, id DESC
                    LIMIT 1
                    "
                ),
                [username],
                EntryRow::from_row,
            )
            .optional()?;
        row.map(EntryRow::into_entry).transpose()
    }

    /// Lists entries matching the filter, most recently started first.
    pub fn list_entries(&self, filter: &EntryFilter) -> Result<Vec<TimeEntry>, DbError> {
        let mut clauses = Vec::new();
        let mut values = Vec::new();
        if let Some(username) = filter.username() {
            clauses.push("username = ?");
            values.push(username);
        }
        if let Some(item_url) = filter.item_url() {
            clauses.push("item_url = ?");
            values.push(item_url);
        }
        let where_clause = if clauses.is_empty() {
            String::new()
        } else {
            format!("WHERE {}", clauses.join(" AND "))
        };

        let conn = self.lock()?;
        let mut stmt = conn.prepare(&format!(
            "
            SELECT {ENTRY_COLUMNS}
            FROM time_entries
            {where_clause}
            ORDER BY start_time DESC, id DESC
            "
        ))?;
        let rows = stmt.query_map(params_from_iter(values), EntryRow::from_row)?;
        let mut entries = Vec::new();
        for row in rows {
            entries.push(row?.into_entry()?);
        }
        Ok(entries)
    }

    /// Runs a trivial query to confirm the database answers.
    pub fn ping(&self) -> Result<(), DbError> {
        let conn = self.lock()?;
        conn.query_row("SELECT 1", [], |row| row.get::<_, i64>(0))?;
        Ok(())
    }
}

/// Initializes the database schema.
///
/// This is idempotent - safe to call on an already-initialized database.
fn init(conn: &Connection) -> Result<(), DbError> {
    conn.execute_batch(
        "
        -- Time entries: one row per start/stop interval
        -- end_time NULL means the entry is still open
        -- timestamps: RFC 3339, millisecond precision, UTC ('Z')
        CREATE TABLE IF NOT EXISTS time_entries (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            username TEXT NOT NULL,
            item_url TEXT NOT NULL,
            description TEXT NOT NULL,
            start_time TEXT NOT NULL,
            end_time TEXT,
            duration_minutes INTEGER,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL,
            CHECK (end_time IS NULL OR end_time >= start_time),
            CHECK (duration_minutes IS NULL OR duration_minutes >= 0)
        );

        CREATE UNIQUE INDEX IF NOT EXISTS idx_time_entries_open_pair
            ON time_entries(username, item_url) WHERE end_time IS NULL;
        CREATE INDEX IF NOT EXISTS idx_time_entries_start ON time_entries(start_time);
        CREATE INDEX IF NOT EXISTS idx_time_entries_username ON time_entries(username);
        ",
    )?;
    Ok(())
}

fn select_open(
    conn: &Connection,
    username: &str,
    item_url: &str,
) -> Result<Option<TimeEntry>, DbError> {
    let row = conn
        .query_row(
            &format!(
                "
                SELECT {ENTRY_COLUMNS}
                FROM time_entries
                WHERE username = ? AND item_url = ? AND end_time IS NULL
                "
            ),
            [username, item_url],
            EntryRow::from_row,
        )
        .optional()?;
    row.map(EntryRow::into_entry).transpose()
}

fn select_entry(conn: &Connection, id: EntryId) -> Result<Option<TimeEntry>, DbError> {
    let row = conn
        .query_row(
            &format!("SELECT {ENTRY_COLUMNS} FROM time_entries WHERE id = ?"),
            [id],
            EntryRow::from_row,
        )
        .optional()?;
    row.map(EntryRow::into_entry).transpose()
}

fn is_unique_violation(err: &rusqlite::Error) -> bool {
    matches!(
        err,
        rusqlite::Error::SqliteFailure(failure, _)
            if failure.code == ErrorCode::ConstraintViolation
                && failure.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE
    )
}

/// A `time_entries` row with timestamps still in their stored form.
struct EntryRow {
    id: EntryId,
    username: String,
    item_url: String,
    description: String,
    start_time: String,
    end_time: Option<String>,
    duration_minutes: Option<i64>,
    created_at: String,
    updated_at: String,
}

impl EntryRow {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            username: row.get(1)?,
            item_url: row.get(2)?,
            description: row.get(3)?,
            start_time: row.get(4)?,
            end_time: row.get(5)?,
            duration_minutes: row.get(6)?,
            created_at: row.get(7)?,
            updated_at: row.get(8)?,
        })
    }

    fn into_entry(self) -> Result<TimeEntry, DbError> {
        let id = self.id;
        Ok(TimeEntry {
            id,
            start_time: parse_timestamp(&self.start_time, id)?,
            end_time: self
                .end_time
                .as_deref()
                .map(|t| parse_timestamp(t, id))
                .transpose()?,
            duration_minutes: self.duration_minutes,
            created_at: parse_timestamp(&self.created_at, id)?,
            updated_at: parse_timestamp(&self.updated_at, id)?,
            username: self.username,
            item_url: self.item_url,
            description: self.description,
        })
    }
}

fn parse_timestamp(timestamp: &str, entry_id: EntryId) -> Result<DateTime<Utc>, DbError> {
    DateTime::parse_from_rfc3339(timestamp)
        .map(|parsed| parsed.with_timezone(&Utc))
        .map_err(|source| DbError::TimestampParse {
            entry_id,
            timestamp: timestamp.to_string(),
            source,
        })
}

fn format_timestamp(timestamp: DateTime<Utc>) -> String {
    timestamp.to_rfc3339_opts(SecondsFormat::Millis, true)
}

fn repository_error(err: DbError, operation: &'static str) -> RepositoryError {
    match err {
        DbError::OpenEntryExists { username, item_url } => {
            RepositoryError::Conflict { username, item_url }
        }
        DbError::EntryNotOpen(id) => RepositoryError::NotFound(id),
        other => {
            tracing::warn!(operation, error = %other, "database operation failed");
            RepositoryError::StorageUnavailable { operation }
        }
    }
}

impl EntryRepository for Database {
    fn create(&self, entry: &NewEntry) -> Result<TimeEntry, RepositoryError> {
        self.insert_entry(entry)
            .map_err(|err| repository_error(err, "create"))
    }

    fn find_open(
        &self,
        username: &Username,
        item_url: &ItemUrl,
    ) -> Result<Option<TimeEntry>, RepositoryError> {
        self.open_entry(username.as_str(), item_url.as_str())
            .map_err(|err| repository_error(err, "find_open"))
    }

    fn close(
        &self,
        entry_id: EntryId,
        end_time: DateTime<Utc>,
        duration_minutes: i64,
    ) -> Result<TimeEntry, RepositoryError> {
        self.close_entry(entry_id, end_time, duration_minutes)
            .map_err(|err| repository_error(err, "close"))
    }

    fn list(&self, filter: &EntryFilter) -> Result<Vec<TimeEntry>, RepositoryError> {
        self.list_entries(filter)
            .map_err(|err| repository_error(err, "list"))
    }

    fn find_active(&self, username: &Username) -> Result<Option<TimeEntry>, RepositoryError> {
        self.active_entry(username.as_str())
            .map_err(|err| repository_error(err, "find_active"))
    }

    fn ping(&self) -> Result<(), RepositoryError> {
        Database::ping(self).map_err(|err| repository_error(err, "ping"))
    }
}
