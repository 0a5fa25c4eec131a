use log_dashboard::{
    FilterSpec, LogLevel, LogService, LogStore, LogType, NewLogEntry, StreamAction, StreamStatus,
};

fn add(service: &LogService, n: usize) {
    for i in 0..n {
        service
            .create_log_entry(&NewLogEntry::new(
                LogLevel::Info,
                LogType::System,
                "kernel",
                format!("line {}", i),
            ))
            .unwrap();
    }
}

#[test]
fn status_is_created_once_with_defaults() {
    let service = LogService::in_memory().unwrap();
    assert_eq!(service.store().status_rows().unwrap(), 0);

    let first = service.get_stream_status().unwrap();
    let second = service.get_stream_status().unwrap();

    assert!(!first.is_paused);
    assert_eq!(first.total_logs, 0);
    assert_eq!(first, second);
    assert_eq!(service.store().status_rows().unwrap(), 1);
}

#[test]
fn pause_then_resume_advances_last_update() {
    let service = LogService::in_memory().unwrap();
    let initial = service.get_stream_status().unwrap();

    let paused = service.control_stream(StreamAction::Pause).unwrap();
    assert!(paused.is_paused);
    assert!(paused.last_update > initial.last_update);

    let resumed = service.control_stream(StreamAction::Resume).unwrap();
    assert!(!resumed.is_paused);
    assert!(resumed.last_update > paused.last_update);

    assert_eq!(service.get_stream_status().unwrap(), resumed);
}

#[test]
fn repeated_pause_still_advances_last_update() {
    let service = LogService::in_memory().unwrap();

    let a = service.control_stream(StreamAction::Pause).unwrap();
    let b = service.control_stream(StreamAction::Pause).unwrap();

    assert!(a.is_paused && b.is_paused);
    assert!(b.last_update > a.last_update);
}

#[test]
fn pause_does_not_stop_ingestion() {
    let service = LogService::in_memory().unwrap();
    service.control_stream(StreamAction::Pause).unwrap();

    add(&service, 3);

    assert_eq!(service.get_logs(&FilterSpec::default()).unwrap().len(), 3);
    assert!(service.get_stream_status().unwrap().is_paused);
}

#[test]
fn clear_action_removes_records_and_keeps_pause_state() {
    let service = LogService::in_memory().unwrap();
    add(&service, 4);
    service.control_stream(StreamAction::Pause).unwrap();

    let status = service.control_stream(StreamAction::Clear).unwrap();

    assert!(status.is_paused);
    assert_eq!(status.total_logs, 0);
    assert!(service.get_logs(&FilterSpec::default()).unwrap().is_empty());
    assert!(service.get_log_sources().unwrap().is_empty());
}

#[test]
fn clear_logs_and_clear_action_have_same_effect() {
    let via_action = LogService::in_memory().unwrap();
    let via_procedure = LogService::in_memory().unwrap();
    for service in [&via_action, &via_procedure] {
        add(service, 5);
        service.control_stream(StreamAction::Pause).unwrap();
    }

    via_action.control_stream(StreamAction::Clear).unwrap();
    let outcome = via_procedure.clear_logs().unwrap();
    assert!(outcome.success);
    assert_eq!(outcome.message, "All logs cleared successfully");

    let a = via_action.get_stream_status().unwrap();
    let b = via_procedure.get_stream_status().unwrap();
    assert_eq!(a.is_paused, b.is_paused);
    assert_eq!(a.total_logs, b.total_logs);
    assert_eq!(via_action.store().count().unwrap(), 0);
    assert_eq!(via_procedure.store().count().unwrap(), 0);
}

#[test]
fn clear_logs_creates_missing_status_row() {
    let service = LogService::in_memory().unwrap();
    add(&service, 2);
    assert_eq!(service.store().status_rows().unwrap(), 0);

    service.clear_logs().unwrap();

    assert_eq!(service.store().status_rows().unwrap(), 1);
    let status = service.get_stream_status().unwrap();
    assert!(!status.is_paused);
    assert_eq!(status.total_logs, 0);
}

#[test]
fn clear_then_insert_does_not_reuse_ids() {
    let service = LogService::in_memory().unwrap();
    add(&service, 3);
    service.clear_logs().unwrap();

    let record = service
        .create_log_entry(&NewLogEntry::new(LogLevel::Warn, LogType::Other, "s", "after"))
        .unwrap();
    assert_eq!(record.id, 4);
}

#[test]
fn concurrent_actions_share_one_status_row() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("logs.db");

    // Separate connections to the same file so actions really race
    let services: Vec<LogService> = (0..4)
        .map(|_| LogService::new(LogStore::open(&path).unwrap()))
        .collect();

    let results: Vec<_> = std::thread::scope(|scope| {
        let handles: Vec<_> = services
            .iter()
            .enumerate()
            .map(|(i, service)| {
                scope.spawn(move || {
                    let action = if i % 2 == 0 {
                        StreamAction::Pause
                    } else {
                        StreamAction::Resume
                    };
                    (0..5)
                        .map(|_| service.control_stream(action).unwrap())
                        .collect::<Vec<_>>()
                })
            })
            .collect();
        handles
            .into_iter()
            .flat_map(|h| h.join().unwrap())
            .collect()
    });

    assert_eq!(services[0].store().status_rows().unwrap(), 1);

    let latest = results.iter().map(|s| s.last_update).max().unwrap();
    let stored = services[0].get_stream_status().unwrap();
    assert_eq!(stored.last_update, latest);

    // Every committed action got its own stamp
    let mut stamps: Vec<_> = results.iter().map(|s| s.last_update).collect();
    stamps.sort();
    stamps.dedup();
    assert_eq!(stamps.len(), results.len());
}

#[test]
fn concurrent_clears_with_interleaved_inserts() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("logs.db");

    let services: Vec<LogService> = (0..4)
        .map(|_| LogService::new(LogStore::open(&path).unwrap()))
        .collect();

    let cycle = [
        StreamAction::Pause,
        StreamAction::Clear,
        StreamAction::Resume,
        StreamAction::Clear,
    ];

    let results: Vec<(StreamAction, StreamStatus)> = std::thread::scope(|scope| {
        let handles: Vec<_> = services
            .iter()
            .enumerate()
            .map(|(i, service)| {
                scope.spawn(move || {
                    (0..20)
                        .map(|round| {
                            add(service, 2);
                            let action = cycle[(i + round) % cycle.len()];
                            (action, service.control_stream(action).unwrap())
                        })
                        .collect::<Vec<_>>()
                })
            })
            .collect();
        handles
            .into_iter()
            .flat_map(|h| h.join().unwrap())
            .collect()
    });

    let store = services[0].store();
    assert_eq!(store.status_rows().unwrap(), 1);

    let (latest_action, latest) = results
        .iter()
        .max_by_key(|(_, status)| status.last_update)
        .unwrap();
    let stored = services[0].get_stream_status().unwrap();

    assert_eq!(stored.total_logs, 0);
    assert_eq!(stored.last_update, latest.last_update);
    assert_eq!(stored, *latest);
    match latest_action {
        StreamAction::Pause => assert!(stored.is_paused),
        StreamAction::Resume => assert!(!stored.is_paused),
        StreamAction::Clear => assert_eq!(stored.is_paused, latest.is_paused),
    }

    // Each clear committed its deletion together with its status update
    for (action, status) in &results {
        if *action == StreamAction::Clear {
            assert_eq!(status.total_logs, 0);
        }
    }
    services[0].control_stream(StreamAction::Clear).unwrap();
    assert_eq!(store.count().unwrap(), 0);
}

#[test]
fn status_survives_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("logs.db");

    let paused = {
        let service = LogService::open(&path).unwrap();
        add(&service, 2);
        service.control_stream(StreamAction::Pause).unwrap()
    };

    let service = LogService::open(&path).unwrap();
    assert_eq!(service.get_stream_status().unwrap(), paused);
    assert_eq!(service.store().count().unwrap(), 2);
}
