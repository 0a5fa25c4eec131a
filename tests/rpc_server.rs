#![cfg(feature = "server")]

use chrono::{Duration, TimeZone, Utc};
use log_dashboard::server::{create_router, ServerState};
use log_dashboard::{
    DashboardError, FilterSpec, LogBackend, LogLevel, LogService, LogType, NewLogEntry,
    RpcClient, StreamAction,
};

/// Serve a fresh in-memory service on an ephemeral port
async fn spawn_server() -> (RpcClient, String) {
    let service = LogService::in_memory().unwrap();
    let app = create_router(ServerState::new(service), true);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    let url = format!("http://{}", addr);
    (RpcClient::connect(&url).unwrap(), url)
}

#[tokio::test]
async fn create_and_query_round_trip() {
    let (client, _) = spawn_server().await;

    for (level, source, message) in [
        (LogLevel::Info, "nginx", "GET / 200"),
        (LogLevel::Error, "app.js", "User not found"),
        (LogLevel::Info, "nginx", "GET /favicon.ico 404"),
    ] {
        client
            .create_log_entry(&NewLogEntry::new(level, LogType::Network, source, message))
            .await
            .unwrap();
    }

    let errors = client
        .get_logs(&FilterSpec::new().with_level(LogLevel::Error))
        .await
        .unwrap();
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0].message, "User not found");

    assert_eq!(client.get_log_sources().await.unwrap(), vec!["app.js", "nginx"]);
    assert_eq!(client.search_logs("USER", 10).await.unwrap().len(), 1);
    assert_eq!(client.get_recent_logs(2).await.unwrap().len(), 2);
}

#[tokio::test]
async fn nanosecond_timestamp_preserved_over_the_wire() {
    let (client, _) = spawn_server().await;
    let ts = Utc.timestamp_opt(1_700_000_000, 0).unwrap() + Duration::nanoseconds(987_654_321);

    client
        .create_log_entry(
            &NewLogEntry::new(LogLevel::Debug, LogType::System, "kernel", "tick").with_timestamp(ts),
        )
        .await
        .unwrap();

    let logs = client.get_logs(&FilterSpec::default()).await.unwrap();
    assert_eq!(logs[0].timestamp, ts);
}

#[tokio::test]
async fn stream_control_over_rpc() {
    let (client, _) = spawn_server().await;
    client
        .create_log_entry(&NewLogEntry::new(LogLevel::Info, LogType::System, "s", "m"))
        .await
        .unwrap();

    let paused = client.control_stream(StreamAction::Pause).await.unwrap();
    assert!(paused.is_paused);
    assert_eq!(client.get_stream_status().await.unwrap(), paused);

    let outcome = client.clear_logs().await.unwrap();
    assert!(outcome.success);
    assert!(client.get_logs(&FilterSpec::default()).await.unwrap().is_empty());
    assert!(client.get_stream_status().await.unwrap().is_paused);
}

#[tokio::test]
async fn validation_errors_keep_their_kind() {
    let (client, _) = spawn_server().await;

    let err = client
        .get_logs(&FilterSpec::new().with_page(5000, 0))
        .await
        .unwrap_err();
    assert!(matches!(err, DashboardError::Validation(_)));

    let err = client.search_logs("", 10).await.unwrap_err();
    assert!(matches!(err, DashboardError::Validation(_)));
}

#[tokio::test]
async fn healthcheck_responds() {
    let (client, _) = spawn_server().await;
    assert_eq!(client.healthcheck().await.unwrap().status, "ok");
}

#[tokio::test]
async fn malformed_input_is_bad_request() {
    let (_, url) = spawn_server().await;
    let http = reqwest::Client::new();

    let response = http
        .post(format!("{}/rpc/controlStream", url))
        .header("content-type", "application/json")
        .body(r#"{"action": "explode"}"#)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), reqwest::StatusCode::BAD_REQUEST);

    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["success"], false);
    assert_eq!(body["error"]["kind"], "VALIDATION_ERROR");

    let response = http
        .post(format!("{}/rpc/getLogs", url))
        .body("{not json")
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), reqwest::StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn get_logs_without_body_uses_defaults() {
    let (client, url) = spawn_server().await;
    client
        .create_log_entry(&NewLogEntry::new(LogLevel::Info, LogType::System, "s", "m"))
        .await
        .unwrap();

    let response = reqwest::Client::new()
        .post(format!("{}/rpc/getLogs", url))
        .send()
        .await
        .unwrap();
    assert!(response.status().is_success());

    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["data"].as_array().map(Vec::len), Some(1));
}

#[tokio::test]
async fn unknown_procedure_is_not_found() {
    let (_, url) = spawn_server().await;

    let response = reqwest::Client::new()
        .post(format!("{}/rpc/dropTables", url))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), reqwest::StatusCode::NOT_FOUND);

    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["error"]["kind"], "UNKNOWN_PROCEDURE");
}
