//! Backends the dashboard can talk to.
//!
//! [`LogBackend`] is the full procedure surface. [`RpcClient`] reaches a remote
//! `log-server` over HTTP; [`LogService`] implements it in-process by running
//! each call on tokio's blocking pool.

use std::future::Future;
use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::api::{ApiResponse, Procedure, RecentInput, SearchInput, RPC_PATH};
use crate::error::{DashboardError, Result};
use crate::models::{
    ClearOutcome, Health, LogRecord, NewLogEntry, StreamAction, StreamControl, StreamStatus,
};
use crate::query::FilterSpec;
use crate::service::LogService;

/// Every RPC procedure, as async calls
pub trait LogBackend: Send + Sync + 'static {
    fn create_log_entry(
        &self,
        entry: &NewLogEntry,
    ) -> impl Future<Output = Result<LogRecord>> + Send;

    fn get_logs(&self, filter: &FilterSpec) -> impl Future<Output = Result<Vec<LogRecord>>> + Send;

    fn get_recent_logs(&self, limit: i64) -> impl Future<Output = Result<Vec<LogRecord>>> + Send;

    fn search_logs(
        &self,
        keyword: &str,
        limit: i64,
    ) -> impl Future<Output = Result<Vec<LogRecord>>> + Send;

    fn get_stream_status(&self) -> impl Future<Output = Result<StreamStatus>> + Send;

    fn control_stream(
        &self,
        action: StreamAction,
    ) -> impl Future<Output = Result<StreamStatus>> + Send;

    fn clear_logs(&self) -> impl Future<Output = Result<ClearOutcome>> + Send;

    fn get_log_sources(&self) -> impl Future<Output = Result<Vec<String>>> + Send;

    fn healthcheck(&self) -> impl Future<Output = Result<Health>> + Send;
}

/// Client configuration
#[derive(Debug, Clone)]
pub struct RpcClientConfig {
    /// Server URL
    pub server_url: String,
    /// Per-request timeout
    pub timeout: Duration,
}

impl Default for RpcClientConfig {
    fn default() -> Self {
        Self {
            server_url: "http://127.0.0.1:2022".to_string(),
            timeout: Duration::from_secs(10),
        }
    }
}

/// HTTP client for a remote `log-server`
#[derive(Clone)]
pub struct RpcClient {
    base_url: String,
    http_client: reqwest::Client,
}

impl RpcClient {
    pub fn new(config: RpcClientConfig) -> Result<Self> {
        let http_client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()?;

        Ok(Self {
            base_url: config.server_url.trim_end_matches('/').to_string(),
            http_client,
        })
    }

    /// Client with default timeout for `server_url`
    pub fn connect(server_url: impl Into<String>) -> Result<Self> {
        Self::new(RpcClientConfig {
            server_url: server_url.into(),
            ..Default::default()
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Invoke a procedure and unwrap its envelope
    pub async fn call<I, O>(&self, procedure: Procedure, input: Option<&I>) -> Result<O>
    where
        I: Serialize + ?Sized,
        O: DeserializeOwned,
    {
        let url = format!("{}{}/{}", self.base_url, RPC_PATH, procedure);
        let mut request = self.http_client.post(&url);
        if let Some(input) = input {
            request = request.json(input);
        }

        let response = request.send().await.map_err(|e| {
            DashboardError::Transport(format!("failed to reach {}: {}", self.base_url, e))
        })?;

        let status = response.status();
        let envelope: ApiResponse<O> = response.json().await.map_err(|e| {
            DashboardError::Transport(format!(
                "invalid response to {} (HTTP {}): {}",
                procedure, status, e
            ))
        })?;

        envelope.into_result()
    }
}

impl LogBackend for RpcClient {
    async fn create_log_entry(&self, entry: &NewLogEntry) -> Result<LogRecord> {
        self.call(Procedure::CreateLogEntry, Some(entry)).await
    }

    async fn get_logs(&self, filter: &FilterSpec) -> Result<Vec<LogRecord>> {
        self.call(Procedure::GetLogs, Some(filter)).await
    }

    async fn get_recent_logs(&self, limit: i64) -> Result<Vec<LogRecord>> {
        self.call(Procedure::GetRecentLogs, Some(&RecentInput { limit }))
            .await
    }

    async fn search_logs(&self, keyword: &str, limit: i64) -> Result<Vec<LogRecord>> {
        let input = SearchInput {
            keyword: keyword.to_string(),
            limit,
        };
        self.call(Procedure::SearchLogs, Some(&input)).await
    }

    async fn get_stream_status(&self) -> Result<StreamStatus> {
        self.call::<(), _>(Procedure::GetStreamStatus, None).await
    }

    async fn control_stream(&self, action: StreamAction) -> Result<StreamStatus> {
        self.call(Procedure::ControlStream, Some(&StreamControl { action }))
            .await
    }

    async fn clear_logs(&self) -> Result<ClearOutcome> {
        self.call::<(), _>(Procedure::ClearLogs, None).await
    }

    async fn get_log_sources(&self) -> Result<Vec<String>> {
        self.call::<(), _>(Procedure::GetLogSources, None).await
    }

    async fn healthcheck(&self) -> Result<Health> {
        self.call::<(), _>(Procedure::Healthcheck, None).await
    }
}

impl LogService {
    /// Run a blocking service call off the async executor
    async fn blocking<T, F>(&self, f: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&LogService) -> Result<T> + Send + 'static,
    {
        let service = self.clone();
        tokio::task::spawn_blocking(move || f(&service)).await?
    }
}

impl LogBackend for LogService {
    async fn create_log_entry(&self, entry: &NewLogEntry) -> Result<LogRecord> {
        let entry = entry.clone();
        self.blocking(move |s| s.create_log_entry(&entry)).await
    }

    async fn get_logs(&self, filter: &FilterSpec) -> Result<Vec<LogRecord>> {
        let filter = filter.clone();
        self.blocking(move |s| s.get_logs(&filter)).await
    }

    async fn get_recent_logs(&self, limit: i64) -> Result<Vec<LogRecord>> {
        self.blocking(move |s| s.get_recent_logs(limit)).await
    }

    async fn search_logs(&self, keyword: &str, limit: i64) -> Result<Vec<LogRecord>> {
        let keyword = keyword.to_string();
        self.blocking(move |s| s.search_logs(&keyword, limit)).await
    }

    async fn get_stream_status(&self) -> Result<StreamStatus> {
        self.blocking(|s| s.get_stream_status()).await
    }

    async fn control_stream(&self, action: StreamAction) -> Result<StreamStatus> {
        self.blocking(move |s| s.control_stream(action)).await
    }

    async fn clear_logs(&self) -> Result<ClearOutcome> {
        self.blocking(|s| s.clear_logs()).await
    }

    async fn get_log_sources(&self) -> Result<Vec<String>> {
        self.blocking(|s| s.get_log_sources()).await
    }

    async fn healthcheck(&self) -> Result<Health> {
        Ok(LogService::healthcheck(self))
    }
}
