//! Error types for log-dashboard

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DashboardError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Not connected: {0}")]
    NotConnected(String),

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Unknown procedure: {0}")]
    UnknownProcedure(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl DashboardError {
    /// Stable identifier used in the RPC error envelope
    pub fn kind(&self) -> &'static str {
        match self {
            DashboardError::Validation(_) => "VALIDATION_ERROR",
            DashboardError::Storage(_) => "STORAGE_ERROR",
            DashboardError::NotConnected(_) => "NOT_CONNECTED",
            DashboardError::Transport(_) => "TRANSPORT_ERROR",
            DashboardError::UnknownProcedure(_) => "UNKNOWN_PROCEDURE",
            DashboardError::Config(_) => "CONFIG_ERROR",
        }
    }

    /// Rebuild an error from its wire representation
    pub fn from_kind(kind: &str, message: impl Into<String>) -> Self {
        let message = message.into();
        match kind {
            "VALIDATION_ERROR" => DashboardError::Validation(message),
            "STORAGE_ERROR" => DashboardError::Storage(message),
            "NOT_CONNECTED" => DashboardError::NotConnected(message),
            "UNKNOWN_PROCEDURE" => DashboardError::UnknownProcedure(message),
            "CONFIG_ERROR" => DashboardError::Config(message),
            _ => DashboardError::Transport(message),
        }
    }

    /// The message without the variant prefix
    pub fn message(&self) -> &str {
        match self {
            DashboardError::Validation(m)
            | DashboardError::Storage(m)
            | DashboardError::NotConnected(m)
            | DashboardError::Transport(m)
            | DashboardError::UnknownProcedure(m)
            | DashboardError::Config(m) => m,
        }
    }

    pub fn is_validation(&self) -> bool {
        matches!(self, DashboardError::Validation(_))
    }
}

impl From<rusqlite::Error> for DashboardError {
    fn from(e: rusqlite::Error) -> Self {
        DashboardError::Storage(e.to_string())
    }
}

impl From<reqwest::Error> for DashboardError {
    fn from(e: reqwest::Error) -> Self {
        DashboardError::Transport(e.to_string())
    }
}

impl From<tokio::task::JoinError> for DashboardError {
    fn from(e: tokio::task::JoinError) -> Self {
        DashboardError::Storage(format!("storage task failed: {}", e))
    }
}

pub type Result<T> = std::result::Result<T, DashboardError>;
