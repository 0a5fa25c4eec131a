//! Log service - one method per RPC procedure.
//!
//! Both the HTTP server and the in-process backend go through this type, so
//! validation and logging behave identically regardless of transport.

use std::path::Path;

use crate::error::Result;
use crate::models::{
    ClearOutcome, Health, LogRecord, NewLogEntry, StreamAction, StreamStatus,
};
use crate::query::{FilterSpec, QueryEngine};
use crate::store::LogStore;
use crate::stream::StreamController;

#[derive(Clone)]
pub struct LogService {
    store: LogStore,
    query: QueryEngine,
    stream: StreamController,
}

impl LogService {
    pub fn new(store: LogStore) -> Self {
        Self {
            query: QueryEngine::new(store.clone()),
            stream: StreamController::new(store.clone()),
            store,
        }
    }

    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        Ok(Self::new(LogStore::open(path)?))
    }

    pub fn in_memory() -> Result<Self> {
        Ok(Self::new(LogStore::open_in_memory()?))
    }

    pub fn store(&self) -> &LogStore {
        &self.store
    }

    pub fn create_log_entry(&self, entry: &NewLogEntry) -> Result<LogRecord> {
        let record = self
            .store
            .insert(entry)
            .inspect_err(|e| tracing::error!(error = %e, "log entry creation failed"))?;
        tracing::debug!(id = record.id, level = %record.level, source = %record.source, "log entry created");
        Ok(record)
    }

    pub fn get_logs(&self, filter: &FilterSpec) -> Result<Vec<LogRecord>> {
        self.query
            .get_logs(filter)
            .inspect_err(|e| log_failure("getLogs", e))
    }

    pub fn get_recent_logs(&self, limit: i64) -> Result<Vec<LogRecord>> {
        self.query
            .recent(limit)
            .inspect_err(|e| log_failure("getRecentLogs", e))
    }

    pub fn search_logs(&self, keyword: &str, limit: i64) -> Result<Vec<LogRecord>> {
        self.query
            .search(keyword, limit)
            .inspect_err(|e| log_failure("searchLogs", e))
    }

    pub fn get_stream_status(&self) -> Result<StreamStatus> {
        self.stream
            .status()
            .inspect_err(|e| log_failure("getStreamStatus", e))
    }

    pub fn control_stream(&self, action: StreamAction) -> Result<StreamStatus> {
        self.stream.control(action)
    }

    pub fn clear_logs(&self) -> Result<ClearOutcome> {
        self.stream.clear_all()
    }

    pub fn get_log_sources(&self) -> Result<Vec<String>> {
        self.query
            .list_sources()
            .inspect_err(|e| log_failure("getLogSources", e))
    }

    pub fn healthcheck(&self) -> Health {
        Health::ok()
    }
}

fn log_failure(procedure: &str, e: &crate::error::DashboardError) {
    if e.is_validation() {
        tracing::debug!(procedure, error = %e, "rejected invalid input");
    } else {
        tracing::error!(procedure, error = %e, "procedure failed");
    }
}
