//! Log Server - RPC API over HTTP.
//!
//! Provides endpoints for:
//! - `POST /rpc/{procedure}` with an optional JSON body
//! - `GET /health` liveness check
//! - `GET /` procedure listing
//!
//! # Usage
//!
//! ```bash
//! cargo run --bin log-server -- --port 2022
//! ```

use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::api::{ApiResponse, Procedure, RecentInput, SearchInput};
use crate::config::ServerConfig;
use crate::error::{DashboardError, Result};
use crate::models::{NewLogEntry, StreamControl};
use crate::query::FilterSpec;
use crate::service::LogService;

/// Shared server state
pub struct ServerState {
    pub service: LogService,
}

impl ServerState {
    pub fn new(service: LogService) -> Arc<Self> {
        Arc::new(Self { service })
    }
}

/// Create the API router
pub fn create_router(state: Arc<ServerState>, enable_cors: bool) -> Router {
    let router = Router::new()
        .route("/", get(root_handler))
        .route("/health", get(health_handler))
        .route("/rpc/:procedure", post(rpc_handler))
        .layer(TraceLayer::new_for_http());

    let router = if enable_cors {
        router.layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
    } else {
        router
    };

    router.with_state(state)
}

/// Root endpoint - API info
async fn root_handler() -> impl IntoResponse {
    let procedures: Vec<_> = Procedure::ALL
        .iter()
        .map(|p| {
            serde_json::json!({
                "name": p.as_str(),
                "path": format!("POST /rpc/{}", p),
                "mutation": p.is_mutation(),
            })
        })
        .collect();

    Json(serde_json::json!({
        "name": "Log Dashboard Server",
        "version": env!("CARGO_PKG_VERSION"),
        "health": "GET /health",
        "procedures": procedures,
    }))
}

/// Health check endpoint
async fn health_handler(State(state): State<Arc<ServerState>>) -> impl IntoResponse {
    Json(ApiResponse::ok(state.service.healthcheck()))
}

async fn rpc_handler(
    State(state): State<Arc<ServerState>>,
    Path(name): Path<String>,
    body: Bytes,
) -> Response {
    let procedure = match name.parse::<Procedure>() {
        Ok(p) => p,
        Err(e) => {
            tracing::warn!(procedure = %name, "unknown procedure");
            return error_response(&e);
        }
    };

    let service = state.service.clone();
    match tokio::task::spawn_blocking(move || dispatch(&service, procedure, &body)).await {
        Ok(response) => response,
        Err(e) => error_response(&DashboardError::from(e)),
    }
}

fn dispatch(service: &LogService, procedure: Procedure, body: &[u8]) -> Response {
    match procedure {
        Procedure::CreateLogEntry => respond(
            required_input::<NewLogEntry>(body).and_then(|entry| service.create_log_entry(&entry)),
        ),
        Procedure::GetLogs => respond(
            optional_input::<FilterSpec>(body).and_then(|filter| service.get_logs(&filter)),
        ),
        Procedure::GetRecentLogs => respond(
            optional_input::<RecentInput>(body).and_then(|input| service.get_recent_logs(input.limit)),
        ),
        Procedure::SearchLogs => respond(
            required_input::<SearchInput>(body)
                .and_then(|input| service.search_logs(&input.keyword, input.limit)),
        ),
        Procedure::GetStreamStatus => respond(service.get_stream_status()),
        Procedure::ControlStream => respond(
            required_input::<StreamControl>(body).and_then(|c| service.control_stream(c.action)),
        ),
        Procedure::ClearLogs => respond(service.clear_logs()),
        Procedure::GetLogSources => respond(service.get_log_sources()),
        Procedure::Healthcheck => respond(Ok(service.healthcheck())),
    }
}

fn is_absent(body: &[u8]) -> bool {
    match std::str::from_utf8(body).map(str::trim) {
        Ok(text) => text.is_empty() || text == "null",
        Err(_) => false,
    }
}

fn parse_input<T: DeserializeOwned>(body: &[u8]) -> Result<T> {
    serde_json::from_slice(body)
        .map_err(|e| DashboardError::Validation(format!("invalid input: {}", e)))
}

/// Input that falls back to its default when no body is sent
fn optional_input<T: DeserializeOwned + Default>(body: &[u8]) -> Result<T> {
    if is_absent(body) {
        return Ok(T::default());
    }
    parse_input(body)
}

fn required_input<T: DeserializeOwned>(body: &[u8]) -> Result<T> {
    if is_absent(body) {
        return Err(DashboardError::Validation("input is required".to_string()));
    }
    parse_input(body)
}

fn respond<T: Serialize>(result: Result<T>) -> Response {
    match result {
        Ok(data) => (StatusCode::OK, Json(ApiResponse::ok(data))).into_response(),
        Err(e) => error_response(&e),
    }
}

fn error_response(error: &DashboardError) -> Response {
    let status = match error {
        DashboardError::Validation(_) => StatusCode::BAD_REQUEST,
        DashboardError::UnknownProcedure(_) => StatusCode::NOT_FOUND,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };
    (status, Json(ApiResponse::<()>::err(error))).into_response()
}

/// Start the log server and run until Ctrl+C or SIGTERM
pub async fn start_server(config: &ServerConfig, service: LogService) -> anyhow::Result<()> {
    let app = create_router(ServerState::new(service), config.enable_cors);
    let addr = config.bind_addr();

    tracing::info!("Starting Log Dashboard Server");
    match &config.database_path {
        Some(path) => tracing::info!("   Database: {}", path.display()),
        None => tracing::info!("   Database: in-memory"),
    }
    tracing::info!("   Listening on: http://{}", addr);
    tracing::info!("   CORS: {}", if config.enable_cors { "enabled" } else { "disabled" });

    let listener = tokio::net::TcpListener::bind(&addr).await?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Server stopped");
    Ok(())
}

/// Wait for shutdown signal
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C, shutting down...");
        },
        _ = terminate => {
            tracing::info!("Received terminate signal, shutting down...");
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_absent_body() {
        assert!(is_absent(b""));
        assert!(is_absent(b"  null\n"));
        assert!(!is_absent(b"{}"));
    }

    #[test]
    fn test_optional_input_defaults() {
        let filter: FilterSpec = optional_input(b"").unwrap();
        assert_eq!(filter, FilterSpec::default());

        let recent: RecentInput = optional_input(br#"{"limit": 5}"#).unwrap();
        assert_eq!(recent.limit, 5);
    }

    #[test]
    fn test_required_input_missing() {
        let err = required_input::<SearchInput>(b"").unwrap_err();
        assert!(err.is_validation());
    }

    #[test]
    fn test_malformed_json_is_validation_error() {
        let err = required_input::<StreamControl>(b"{\"action\":").unwrap_err();
        assert!(err.is_validation());

        let err = required_input::<StreamControl>(br#"{"action":"explode"}"#).unwrap_err();
        assert!(err.is_validation());
    }

    #[test]
    fn test_error_status_codes() {
        let response = error_response(&DashboardError::Validation("bad".into()));
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let response = error_response(&DashboardError::UnknownProcedure("nope".into()));
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        let response = error_response(&DashboardError::Storage("disk".into()));
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
