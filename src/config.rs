//! Dashboard Configuration
//!
//! Configuration can be loaded from:
//! - Default values
//! - Config file (~/.config/log-dashboard/config.toml)
//! - Environment variables (`SERVER_PORT`, `LOG_DASHBOARD_HOST`,
//!   `LOG_DASHBOARD_DB`, `LOG_DASHBOARD_URL`)

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::client::RpcClientConfig;
use crate::error::{DashboardError, Result};

const APP_DIR: &str = "log-dashboard";

/// Top-level configuration file
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DashboardConfig {
    pub server: ServerConfig,
    pub client: ClientConfig,
}

/// Server configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Host to bind to
    pub host: String,
    /// Port to listen on
    pub port: u16,
    /// SQLite database file; `None` (only via `--memory`) keeps everything in memory
    pub database_path: Option<PathBuf>,
    /// Whether to enable CORS for browser clients
    pub enable_cors: bool,
}

/// Client configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Server URL
    pub server_url: String,
    /// Per-request timeout in seconds
    pub request_timeout_secs: u64,
    /// Whether the watch view polls automatically on start
    pub auto_refresh: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 2022,
            database_path: Some(default_database_path()),
            enable_cors: true,
        }
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            server_url: "http://127.0.0.1:2022".to_string(),
            request_timeout_secs: 10,
            auto_refresh: true,
        }
    }
}

impl ServerConfig {
    /// `host:port` for the listener
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl ClientConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn rpc_config(&self) -> RpcClientConfig {
        RpcClientConfig {
            server_url: self.server_url.clone(),
            timeout: self.request_timeout(),
        }
    }
}

/// Default database location under the platform data directory
pub fn default_database_path() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(APP_DIR)
        .join("logs.db")
}

/// Default config file location
pub fn default_config_path() -> PathBuf {
    dirs::config_dir()
        .map(|d| d.join(APP_DIR).join("config.toml"))
        .unwrap_or_else(|| PathBuf::from("config.toml"))
}

impl DashboardConfig {
    /// Load the default config file (if any) and apply environment overrides
    pub fn load() -> Result<Self> {
        Self::load_from(default_config_path()).map(Self::with_env)
    }

    /// Load a specific file; a missing file yields defaults
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            tracing::debug!(path = %path.display(), "no config file, using defaults");
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|e| {
            DashboardError::Config(format!("cannot read {}: {}", path.display(), e))
        })?;

        toml::from_str(&content)
            .map_err(|e| DashboardError::Config(format!("invalid {}: {}", path.display(), e)))
    }

    /// Save configuration to file
    pub fn save_to(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                DashboardError::Config(format!("cannot create {}: {}", parent.display(), e))
            })?;
        }

        let content =
            toml::to_string_pretty(self).map_err(|e| DashboardError::Config(e.to_string()))?;

        std::fs::write(path, content)
            .map_err(|e| DashboardError::Config(format!("cannot write {}: {}", path.display(), e)))
    }

    /// Apply overrides from the process environment
    pub fn with_env(self) -> Self {
        self.with_overrides(|key| std::env::var(key).ok())
    }

    fn with_overrides(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        if let Some(port) = lookup("SERVER_PORT") {
            match port.parse() {
                Ok(port) => self.server.port = port,
                Err(_) => tracing::warn!(%port, "ignoring invalid SERVER_PORT"),
            }
        }
        if let Some(host) = lookup("LOG_DASHBOARD_HOST") {
            self.server.host = host;
        }
        if let Some(db) = lookup("LOG_DASHBOARD_DB") {
            self.server.database_path = Some(PathBuf::from(db));
        }
        if let Some(url) = lookup("LOG_DASHBOARD_URL") {
            self.client.server_url = url;
        }
        self
    }
}
