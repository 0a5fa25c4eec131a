//! Record store - SQLite tables for log records and the stream status row.

use parking_lot::Mutex;
use rusqlite::functions::FunctionFlags;
use rusqlite::{params, Connection, Row, Transaction, TransactionBehavior};
use std::path::Path;
use std::sync::Arc;

use crate::error::{DashboardError, Result};
use crate::models::{from_nanos, to_nanos, LogRecord, NewLogEntry};

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS logs (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    timestamp INTEGER NOT NULL,
    level TEXT NOT NULL CHECK (level IN ('debug', 'info', 'warn', 'error', 'fatal')),
    type TEXT NOT NULL CHECK (type IN ('system', 'application', 'network', 'security', 'other')),
    source TEXT NOT NULL,
    message TEXT NOT NULL,
    raw_content TEXT NOT NULL,
    created_at INTEGER NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_logs_timestamp ON logs(timestamp DESC, id DESC);
CREATE INDEX IF NOT EXISTS idx_logs_created ON logs(created_at DESC, id DESC);
CREATE INDEX IF NOT EXISTS idx_logs_source ON logs(source);

-- Exactly one row, ever
CREATE TABLE IF NOT EXISTS stream_status (
    id INTEGER PRIMARY KEY CHECK (id = 1),
    is_paused INTEGER NOT NULL DEFAULT 0,
    last_update INTEGER NOT NULL,
    total_logs INTEGER NOT NULL DEFAULT 0 CHECK (total_logs >= 0)
);
"#;

/// Columns selected for every `LogRecord` query, in `map_record` order
pub(crate) const RECORD_COLUMNS: &str =
    "id, timestamp, level, type, source, message, raw_content, created_at";

/// Shared handle to the log database.
///
/// Cloning is cheap; all clones use the same connection, so every operation
/// is serialized behind the mutex.
#[derive(Clone)]
pub struct LogStore {
    conn: Arc<Mutex<Connection>>,
}

impl LogStore {
    /// Open (or create) a database file
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(|e| {
                    DashboardError::Storage(format!("cannot create {}: {}", parent.display(), e))
                })?;
            }
        }

        let conn = Connection::open(path)?;
        conn.pragma_update_and_check(None, "journal_mode", "WAL", |_| Ok(()))?;
        tracing::info!(path = %path.display(), "opened log database");
        Self::init(conn)
    }

    /// Database that lives only as long as this store
    pub fn open_in_memory() -> Result<Self> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> Result<Self> {
        conn.busy_timeout(std::time::Duration::from_secs(5))?;
        conn.execute_batch(SCHEMA)?;
        register_functions(&conn)?;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Insert a record; `id` and `created_at` are assigned here
    pub fn insert(&self, entry: &NewLogEntry) -> Result<LogRecord> {
        let created_at = chrono::Utc::now();
        let timestamp = entry.timestamp.unwrap_or(created_at);
        let ts_nanos = to_nanos(timestamp)?;
        let created_nanos = to_nanos(created_at)?;

        let conn = self.conn.lock();
        conn.execute(
            "INSERT INTO logs (timestamp, level, type, source, message, raw_content, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                ts_nanos,
                entry.level.as_str(),
                entry.log_type.as_str(),
                entry.source,
                entry.message,
                entry.raw_content,
                created_nanos,
            ],
        )?;

        Ok(LogRecord {
            id: conn.last_insert_rowid(),
            timestamp: from_nanos(ts_nanos),
            level: entry.level,
            log_type: entry.log_type,
            source: entry.source.clone(),
            message: entry.message.clone(),
            raw_content: entry.raw_content.clone(),
            created_at: from_nanos(created_nanos),
        })
    }

    /// Number of stored records
    pub fn count(&self) -> Result<u64> {
        self.read(|conn| {
            let n: i64 = conn.query_row("SELECT COUNT(*) FROM logs", [], |row| row.get(0))?;
            Ok(n as u64)
        })
    }

    /// Number of rows in the status table (0 before first access, 1 after)
    pub fn status_rows(&self) -> Result<u64> {
        self.read(|conn| {
            let n: i64 =
                conn.query_row("SELECT COUNT(*) FROM stream_status", [], |row| row.get(0))?;
            Ok(n as u64)
        })
    }

    /// Run a read against the connection
    pub(crate) fn read<T>(&self, f: impl FnOnce(&Connection) -> Result<T>) -> Result<T> {
        let conn = self.conn.lock();
        f(&conn)
    }

    /// Run `f` in an IMMEDIATE transaction, committing only if it succeeds
    pub(crate) fn write<T>(&self, f: impl FnOnce(&Transaction<'_>) -> Result<T>) -> Result<T> {
        let mut conn = self.conn.lock();
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let value = f(&tx)?;
        tx.commit()?;
        Ok(value)
    }
}

/// `contains_ci(haystack, needle)` - Unicode case-insensitive literal substring test
fn register_functions(conn: &Connection) -> Result<()> {
    conn.create_scalar_function(
        "contains_ci",
        2,
        FunctionFlags::SQLITE_UTF8 | FunctionFlags::SQLITE_DETERMINISTIC,
        |ctx| {
            let haystack = ctx.get::<String>(0)?;
            let needle = ctx.get::<String>(1)?;
            Ok(haystack.to_lowercase().contains(&needle.to_lowercase()))
        },
    )?;
    Ok(())
}

/// Map a row selected with `RECORD_COLUMNS`
pub(crate) fn map_record(row: &Row<'_>) -> rusqlite::Result<LogRecord> {
    let level: String = row.get(2)?;
    let log_type: String = row.get(3)?;

    Ok(LogRecord {
        id: row.get(0)?,
        timestamp: from_nanos(row.get(1)?),
        level: level.parse().map_err(|e| invalid_column(2, e))?,
        log_type: log_type.parse().map_err(|e| invalid_column(3, e))?,
        source: row.get(4)?,
        message: row.get(5)?,
        raw_content: row.get(6)?,
        created_at: from_nanos(row.get(7)?),
    })
}

fn invalid_column(index: usize, e: DashboardError) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(
        index,
        rusqlite::types::Type::Text,
        Box::new(std::io::Error::new(std::io::ErrorKind::InvalidData, e.to_string())),
    )
}
