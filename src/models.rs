//! Log records, stream status and the small value types shared by every layer.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::{DashboardError, Result};

/// Severity of a log record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Debug,
    Info,
    Warn,
    Error,
    Fatal,
}

impl LogLevel {
    pub const ALL: [LogLevel; 5] = [
        LogLevel::Debug,
        LogLevel::Info,
        LogLevel::Warn,
        LogLevel::Error,
        LogLevel::Fatal,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
            LogLevel::Fatal => "fatal",
        }
    }
}

impl FromStr for LogLevel {
    type Err = DashboardError;

    fn from_str(s: &str) -> Result<Self> {
        LogLevel::ALL
            .into_iter()
            .find(|level| level.as_str() == s)
            .ok_or_else(|| DashboardError::Validation(format!("invalid log level: {}", s)))
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Category of a log record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogType {
    System,
    Application,
    Network,
    Security,
    Other,
}

impl LogType {
    pub const ALL: [LogType; 5] = [
        LogType::System,
        LogType::Application,
        LogType::Network,
        LogType::Security,
        LogType::Other,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            LogType::System => "system",
            LogType::Application => "application",
            LogType::Network => "network",
            LogType::Security => "security",
            LogType::Other => "other",
        }
    }
}

impl FromStr for LogType {
    type Err = DashboardError;

    fn from_str(s: &str) -> Result<Self> {
        LogType::ALL
            .into_iter()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| DashboardError::Validation(format!("invalid log type: {}", s)))
    }
}

impl fmt::Display for LogType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A stored log record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogRecord {
    pub id: i64,
    pub timestamp: DateTime<Utc>,
    pub level: LogLevel,
    #[serde(rename = "type")]
    pub log_type: LogType,
    pub source: String,
    pub message: String,
    pub raw_content: String,
    pub created_at: DateTime<Utc>,
}

/// Input for `createLogEntry`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewLogEntry {
    /// Event time; defaults to the insertion time
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<DateTime<Utc>>,
    pub level: LogLevel,
    #[serde(rename = "type")]
    pub log_type: LogType,
    pub source: String,
    pub message: String,
    pub raw_content: String,
}

impl NewLogEntry {
    /// Entry whose raw content equals its message
    pub fn new(
        level: LogLevel,
        log_type: LogType,
        source: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        let message = message.into();
        Self {
            timestamp: None,
            level,
            log_type,
            source: source.into(),
            raw_content: message.clone(),
            message,
        }
    }

    pub fn with_timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = Some(timestamp);
        self
    }

    pub fn with_raw_content(mut self, raw_content: impl Into<String>) -> Self {
        self.raw_content = raw_content.into();
        self
    }
}

/// The singleton stream status
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StreamStatus {
    pub is_paused: bool,
    pub last_update: DateTime<Utc>,
    pub total_logs: u64,
}

impl StreamStatus {
    /// Status shown while the backend is unreachable
    pub fn disconnected() -> Self {
        Self {
            is_paused: false,
            last_update: Utc::now(),
            total_logs: 0,
        }
    }
}

/// Stream control action
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StreamAction {
    Pause,
    Resume,
    Clear,
}

impl StreamAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            StreamAction::Pause => "pause",
            StreamAction::Resume => "resume",
            StreamAction::Clear => "clear",
        }
    }
}

impl FromStr for StreamAction {
    type Err = DashboardError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "pause" => Ok(StreamAction::Pause),
            "resume" => Ok(StreamAction::Resume),
            "clear" => Ok(StreamAction::Clear),
            other => Err(DashboardError::Validation(format!(
                "invalid stream action: {}",
                other
            ))),
        }
    }
}

impl fmt::Display for StreamAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Input for `controlStream`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamControl {
    pub action: StreamAction,
}

/// Result of `clearLogs`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClearOutcome {
    pub success: bool,
    pub message: String,
}

/// Result of `healthcheck`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Health {
    pub status: String,
    pub timestamp: DateTime<Utc>,
}

impl Health {
    pub fn ok() -> Self {
        Self {
            status: "ok".to_string(),
            timestamp: Utc::now(),
        }
    }
}

// ============================================
// Timestamp storage encoding
// ============================================

/// Nanoseconds since the Unix epoch, as stored in SQLite
pub(crate) fn to_nanos(ts: DateTime<Utc>) -> Result<i64> {
    ts.timestamp_nanos_opt().ok_or_else(|| {
        DashboardError::Validation(format!("timestamp out of supported range: {}", ts))
    })
}

pub(crate) fn from_nanos(nanos: i64) -> DateTime<Utc> {
    DateTime::from_timestamp_nanos(nanos)
}

/// Next stamp strictly after `previous`
pub(crate) fn next_stamp(previous: DateTime<Utc>, now: DateTime<Utc>) -> DateTime<Utc> {
    if now > previous {
        now
    } else {
        previous + Duration::nanoseconds(1)
    }
}
