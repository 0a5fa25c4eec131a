//! Log Dashboard - filterable log store with stream control
//!
//! Provides log storage and querying, pause/resume/clear stream control, an
//! RPC server, and a polling sync client for dashboard views.

pub mod api;
pub mod client;
pub mod config;
pub mod error;
pub mod models;
pub mod query;
pub mod service;
pub mod store;
pub mod stream;
pub mod sync;

#[cfg(feature = "server")]
pub mod server;

// Re-export commonly used types
pub use api::{ApiError, ApiResponse, Procedure};
pub use client::{LogBackend, RpcClient, RpcClientConfig};
pub use config::{ClientConfig, DashboardConfig, ServerConfig};
pub use error::{DashboardError, Result};
pub use models::{
    ClearOutcome, Health, LogLevel, LogRecord, LogType, NewLogEntry, StreamAction, StreamStatus,
};
pub use query::{FilterSpec, QueryEngine};
pub use service::LogService;
pub use store::LogStore;
pub use stream::StreamController;
pub use sync::{DashboardState, SyncClient};
