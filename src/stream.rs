//! Stream controller - the pause/resume/clear state machine.
//!
//! The status lives in a single-row table. Every read-or-create and every
//! control action runs in one IMMEDIATE transaction, so concurrent actions
//! serialize, never produce a second row, and a clear's record deletion is
//! committed together with its counter reset.

use chrono::{DateTime, Utc};
use rusqlite::{params, OptionalExtension, Transaction};

use crate::error::Result;
use crate::models::{from_nanos, next_stamp, to_nanos, ClearOutcome, StreamAction, StreamStatus};
use crate::store::LogStore;

pub const CLEARED_MESSAGE: &str = "All logs cleared successfully";

#[derive(Clone)]
pub struct StreamController {
    store: LogStore,
}

impl StreamController {
    pub fn new(store: LogStore) -> Self {
        Self { store }
    }

    /// Current status, creating the default row on first access
    pub fn status(&self) -> Result<StreamStatus> {
        self.store
            .write(|tx| load_or_create(tx, Utc::now()).map(|(status, _)| status))
    }

    /// Apply a control action and return the resulting status
    pub fn control(&self, action: StreamAction) -> Result<StreamStatus> {
        let result = self.store.write(|tx| apply(tx, action, Utc::now()));

        match &result {
            Ok(status) => tracing::info!(
                %action,
                is_paused = status.is_paused,
                total_logs = status.total_logs,
                "stream control applied"
            ),
            Err(e) => tracing::error!(%action, error = %e, "stream control failed"),
        }

        result
    }

    pub fn pause(&self) -> Result<StreamStatus> {
        self.control(StreamAction::Pause)
    }

    pub fn resume(&self) -> Result<StreamStatus> {
        self.control(StreamAction::Resume)
    }

    /// Delete every record and zero the counter, keeping the pause state
    pub fn reset(&self) -> Result<StreamStatus> {
        self.control(StreamAction::Clear)
    }

    /// `clearLogs` entry point; same effect as the `clear` action
    pub fn clear_all(&self) -> Result<ClearOutcome> {
        self.reset()?;
        Ok(ClearOutcome {
            success: true,
            message: CLEARED_MESSAGE.to_string(),
        })
    }
}

/// Read the status row, inserting the default one if absent.
/// The flag reports whether the row was created by this call.
fn load_or_create(tx: &Transaction<'_>, now: DateTime<Utc>) -> Result<(StreamStatus, bool)> {
    let existing = tx
        .query_row(
            "SELECT is_paused, last_update, total_logs FROM stream_status WHERE id = 1",
            [],
            |row| {
                Ok(StreamStatus {
                    is_paused: row.get(0)?,
                    last_update: from_nanos(row.get(1)?),
                    total_logs: row.get::<_, i64>(2)? as u64,
                })
            },
        )
        .optional()?;

    if let Some(status) = existing {
        return Ok((status, false));
    }

    let status = StreamStatus {
        is_paused: false,
        last_update: now,
        total_logs: 0,
    };
    tx.execute(
        "INSERT INTO stream_status (id, is_paused, last_update, total_logs) VALUES (1, ?1, ?2, ?3)",
        params![status.is_paused, to_nanos(now)?, 0i64],
    )?;
    tracing::debug!("created stream status row");

    Ok((status, true))
}

fn apply(tx: &Transaction<'_>, action: StreamAction, now: DateTime<Utc>) -> Result<StreamStatus> {
    let (mut status, created) = load_or_create(tx, now)?;

    status.last_update = if created {
        now
    } else {
        next_stamp(status.last_update, now)
    };

    match action {
        StreamAction::Pause => status.is_paused = true,
        StreamAction::Resume => status.is_paused = false,
        StreamAction::Clear => {
            let deleted = tx.execute("DELETE FROM logs", [])?;
            tracing::debug!(deleted, "purged log records");
            status.total_logs = 0;
        }
    }

    tx.execute(
        "UPDATE stream_status SET is_paused = ?1, last_update = ?2, total_logs = ?3 WHERE id = 1",
        params![
            status.is_paused,
            to_nanos(status.last_update)?,
            status.total_logs as i64
        ],
    )?;

    Ok(status)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_created_lazily() {
        let store = LogStore::open_in_memory().unwrap();
        let controller = StreamController::new(store.clone());

        assert_eq!(store.status_rows().unwrap(), 0);
        let status = controller.status().unwrap();
        assert!(!status.is_paused);
        assert_eq!(status.total_logs, 0);
        assert_eq!(store.status_rows().unwrap(), 1);
    }

    #[test]
    fn test_resume_is_idempotent() {
        let controller = StreamController::new(LogStore::open_in_memory().unwrap());
        let first = controller.resume().unwrap();
        let second = controller.resume().unwrap();

        assert!(!first.is_paused);
        assert!(!second.is_paused);
        assert!(second.last_update > first.last_update);
    }

    #[test]
    fn test_clear_keeps_pause_state() {
        let controller = StreamController::new(LogStore::open_in_memory().unwrap());
        controller.pause().unwrap();
        let status = controller.reset().unwrap();

        assert!(status.is_paused);
        assert_eq!(status.total_logs, 0);
    }

    #[test]
    fn test_total_logs_preserved_by_pause() {
        let store = LogStore::open_in_memory().unwrap();
        store
            .write(|tx| {
                tx.execute(
                    "INSERT INTO stream_status (id, is_paused, last_update, total_logs) VALUES (1, 0, 0, 10)",
                    [],
                )?;
                Ok(())
            })
            .unwrap();

        let controller = StreamController::new(store);
        let status = controller.pause().unwrap();
        assert!(status.is_paused);
        assert_eq!(status.total_logs, 10);
    }

    #[test]
    fn test_clear_all_message() {
        let controller = StreamController::new(LogStore::open_in_memory().unwrap());
        let outcome = controller.clear_all().unwrap();
        assert!(outcome.success);
        assert_eq!(outcome.message, CLEARED_MESSAGE);
    }
}
