//! Query engine - filter, search and list log records.
//!
//! Every listing is ordered by `timestamp` descending with ties broken by `id`
//! descending, so pagination over an unchanged store is deterministic.

use chrono::{DateTime, Utc};
use rusqlite::params_from_iter;
use rusqlite::types::Value;
use serde::{Deserialize, Serialize};

use crate::error::{DashboardError, Result};
use crate::models::{to_nanos, LogLevel, LogRecord, LogType};
use crate::store::{map_record, LogStore, RECORD_COLUMNS};

pub const DEFAULT_LIMIT: i64 = 100;
pub const MAX_LIMIT: i64 = 1000;

/// Predicates and pagination bounds for `getLogs`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FilterSpec {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub level: Option<LogLevel>,
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub log_type: Option<LogType>,
    /// Exact, case-sensitive match
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    /// Case-insensitive substring of `message` or `raw_content`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub keyword: Option<String>,
    /// Inclusive lower bound on `timestamp`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start_time: Option<DateTime<Utc>>,
    /// Inclusive upper bound on `timestamp`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end_time: Option<DateTime<Utc>>,
    pub limit: i64,
    pub offset: i64,
}

impl Default for FilterSpec {
    fn default() -> Self {
        Self {
            level: None,
            log_type: None,
            source: None,
            keyword: None,
            start_time: None,
            end_time: None,
            limit: DEFAULT_LIMIT,
            offset: 0,
        }
    }
}

impl FilterSpec {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_level(mut self, level: LogLevel) -> Self {
        self.level = Some(level);
        self
    }

    pub fn with_type(mut self, log_type: LogType) -> Self {
        self.log_type = Some(log_type);
        self
    }

    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }

    pub fn with_keyword(mut self, keyword: impl Into<String>) -> Self {
        self.keyword = Some(keyword.into());
        self
    }

    pub fn with_time_range(
        mut self,
        start: Option<DateTime<Utc>>,
        end: Option<DateTime<Utc>>,
    ) -> Self {
        self.start_time = start;
        self.end_time = end;
        self
    }

    pub fn with_page(mut self, limit: i64, offset: i64) -> Self {
        self.limit = limit;
        self.offset = offset;
        self
    }

    /// Reject out-of-range pagination before touching storage
    pub fn validate(&self) -> Result<()> {
        validate_limit(self.limit)?;
        if self.offset < 0 {
            return Err(DashboardError::Validation(format!(
                "offset must be non-negative, got {}",
                self.offset
            )));
        }
        Ok(())
    }

    /// Source predicate, if one was really supplied
    pub fn source_filter(&self) -> Option<&str> {
        self.source.as_deref().filter(|s| !s.is_empty())
    }

    /// Keyword predicate, if one was really supplied
    pub fn keyword_filter(&self) -> Option<&str> {
        self.keyword.as_deref().filter(|k| !k.is_empty())
    }

    /// Whether any predicate (not pagination) is set
    pub fn has_predicates(&self) -> bool {
        self.level.is_some()
            || self.log_type.is_some()
            || self.source_filter().is_some()
            || self.keyword_filter().is_some()
            || self.start_time.is_some()
            || self.end_time.is_some()
    }
}

pub fn validate_limit(limit: i64) -> Result<()> {
    if !(1..=MAX_LIMIT).contains(&limit) {
        return Err(DashboardError::Validation(format!(
            "limit must be between 1 and {}, got {}",
            MAX_LIMIT, limit
        )));
    }
    Ok(())
}

const MATCH_NOTHING: &str = "0 = 1";

/// A time bound relative to the storable nanosecond range
enum Bound {
    Stored(i64),
    BeforeRange,
    AfterRange,
}

fn clamp_bound(ts: DateTime<Utc>) -> Bound {
    match to_nanos(ts) {
        Ok(nanos) => Bound::Stored(nanos),
        Err(_) if ts.timestamp() < 0 => Bound::BeforeRange,
        Err(_) => Bound::AfterRange,
    }
}

/// WHERE clause plus its positional parameters
struct Conditions {
    clauses: Vec<&'static str>,
    params: Vec<Value>,
}

impl Conditions {
    fn from_filter(filter: &FilterSpec) -> Result<Self> {
        let mut clauses = Vec::new();
        let mut params = Vec::new();

        if let Some(level) = filter.level {
            clauses.push("level = ?");
            params.push(Value::Text(level.as_str().to_string()));
        }

        if let Some(log_type) = filter.log_type {
            clauses.push("type = ?");
            params.push(Value::Text(log_type.as_str().to_string()));
        }

        if let Some(source) = filter.source_filter() {
            clauses.push("source = ?");
            params.push(Value::Text(source.to_string()));
        }

        if let Some(keyword) = filter.keyword_filter() {
            clauses.push("(contains_ci(message, ?) OR contains_ci(raw_content, ?))");
            params.push(Value::Text(keyword.to_string()));
            params.push(Value::Text(keyword.to_string()));
        }

        if let Some(start) = filter.start_time {
            match clamp_bound(start) {
                Bound::Stored(nanos) => {
                    clauses.push("timestamp >= ?");
                    params.push(Value::Integer(nanos));
                }
                Bound::BeforeRange => {}
                Bound::AfterRange => clauses.push(MATCH_NOTHING),
            }
        }

        if let Some(end) = filter.end_time {
            match clamp_bound(end) {
                Bound::Stored(nanos) => {
                    clauses.push("timestamp <= ?");
                    params.push(Value::Integer(nanos));
                }
                Bound::BeforeRange => clauses.push(MATCH_NOTHING),
                Bound::AfterRange => {}
            }
        }

        Ok(Self { clauses, params })
    }

    fn where_sql(&self) -> String {
        if self.clauses.is_empty() {
            String::new()
        } else {
            format!(" WHERE {}", self.clauses.join(" AND "))
        }
    }
}

/// Read-side operations over the record store
#[derive(Clone)]
pub struct QueryEngine {
    store: LogStore,
}

impl QueryEngine {
    pub fn new(store: LogStore) -> Self {
        Self { store }
    }

    /// Records matching every supplied predicate, newest first, paginated
    pub fn get_logs(&self, filter: &FilterSpec) -> Result<Vec<LogRecord>> {
        filter.validate()?;
        let conditions = Conditions::from_filter(filter)?;

        let sql = format!(
            "SELECT {} FROM logs{} ORDER BY timestamp DESC, id DESC LIMIT ? OFFSET ?",
            RECORD_COLUMNS,
            conditions.where_sql()
        );

        let mut params = conditions.params;
        params.push(Value::Integer(filter.limit));
        params.push(Value::Integer(filter.offset));

        tracing::debug!(%sql, predicates = conditions.clauses.len(), "querying logs");

        self.store.read(|conn| {
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt.query_map(params_from_iter(params), map_record)?;
            rows.collect::<rusqlite::Result<Vec<_>>>().map_err(Into::into)
        })
    }

    /// Keyword search with the same matching rules as `get_logs`
    pub fn search(&self, keyword: &str, limit: i64) -> Result<Vec<LogRecord>> {
        if keyword.is_empty() {
            return Err(DashboardError::Validation(
                "search keyword must not be empty".to_string(),
            ));
        }

        let filter = FilterSpec::new()
            .with_keyword(keyword)
            .with_page(limit, 0);
        self.get_logs(&filter)
    }

    /// Most recently inserted records, by `created_at`
    pub fn recent(&self, limit: i64) -> Result<Vec<LogRecord>> {
        validate_limit(limit)?;

        self.store.read(|conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {} FROM logs ORDER BY created_at DESC, id DESC LIMIT ?",
                RECORD_COLUMNS
            ))?;
            let rows = stmt.query_map([limit], map_record)?;
            rows.collect::<rusqlite::Result<Vec<_>>>().map_err(Into::into)
        })
    }

    /// Distinct non-empty sources, sorted by code point
    pub fn list_sources(&self) -> Result<Vec<String>> {
        self.store.read(|conn| {
            let mut stmt = conn.prepare(
                "SELECT DISTINCT source FROM logs
                 WHERE source <> ''
                 ORDER BY source COLLATE BINARY ASC",
            )?;
            let rows = stmt.query_map([], |row| row.get::<_, String>(0))?;
            rows.collect::<rusqlite::Result<Vec<_>>>().map_err(Into::into)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_default_filter() {
        let filter = FilterSpec::default();
        assert_eq!(filter.limit, 100);
        assert_eq!(filter.offset, 0);
        assert!(!filter.has_predicates());
        assert!(filter.validate().is_ok());
    }

    #[test]
    fn test_limit_bounds() {
        assert!(FilterSpec::new().with_page(1, 0).validate().is_ok());
        assert!(FilterSpec::new().with_page(1000, 0).validate().is_ok());
        assert!(FilterSpec::new().with_page(0, 0).validate().unwrap_err().is_validation());
        assert!(FilterSpec::new().with_page(1001, 0).validate().unwrap_err().is_validation());
        assert!(FilterSpec::new().with_page(10, -1).validate().unwrap_err().is_validation());
    }

    #[test]
    fn test_empty_strings_are_not_predicates() {
        let filter = FilterSpec::new().with_source("").with_keyword("");
        assert!(!filter.has_predicates());
        assert_eq!(Conditions::from_filter(&filter).unwrap().where_sql(), "");
    }

    #[test]
    fn test_conditions_are_conjunctive() {
        let filter = FilterSpec::new()
            .with_level(LogLevel::Error)
            .with_source("nginx")
            .with_keyword("timeout");
        let conditions = Conditions::from_filter(&filter).unwrap();

        assert_eq!(
            conditions.where_sql(),
            " WHERE level = ? AND source = ? AND (contains_ci(message, ?) OR contains_ci(raw_content, ?))"
        );
        assert_eq!(conditions.params.len(), 4);
    }

    #[test]
    fn test_time_bounds_outside_storable_range() {
        let ancient = Utc.with_ymd_and_hms(1600, 1, 1, 0, 0, 0).unwrap();
        let far_future = Utc.with_ymd_and_hms(2400, 1, 1, 0, 0, 0).unwrap();

        let open = FilterSpec::new().with_time_range(Some(ancient), Some(far_future));
        assert_eq!(Conditions::from_filter(&open).unwrap().where_sql(), "");

        let late_start = FilterSpec::new().with_time_range(Some(far_future), None);
        assert_eq!(
            Conditions::from_filter(&late_start).unwrap().where_sql(),
            " WHERE 0 = 1"
        );

        let early_end = FilterSpec::new().with_time_range(None, Some(ancient));
        assert_eq!(
            Conditions::from_filter(&early_end).unwrap().where_sql(),
            " WHERE 0 = 1"
        );
    }

    #[test]
    fn test_filter_deserializes_with_defaults() {
        let filter: FilterSpec = serde_json::from_str(r#"{"type":"security"}"#).unwrap();
        assert_eq!(filter.log_type, Some(LogType::Security));
        assert_eq!(filter.limit, DEFAULT_LIMIT);
        assert_eq!(filter.offset, 0);
    }
}
