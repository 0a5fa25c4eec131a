//! Sync client - keeps a dashboard view consistent with the server.
//!
//! ## Protocol
//!
//! Each tick reads logs (or a keyword search), the stream status and the
//! source list concurrently, then publishes the combined result as one
//! [`DashboardState`] update. A failed tick marks the backend disconnected and
//! substitutes a synthetic status instead of leaving the view stale.
//!
//! ```text
//!            ┌────────── every 2s while polling is allowed ──────────┐
//!            ▼                                                        │
//!   ┌──────────────┐   logs ─┐                                        │
//!   │    tick      │ status ─┼─▶ all settle ─▶ publish ─▶ reconcile ──┘
//!   └──────────────┘ sources ┘                             timer
//! ```
//!
//! Polling is allowed only while connected, not paused, and auto-refresh is
//! on. [`SyncClient::reconcile_timer`] starts or stops the single timer task
//! whenever one of those inputs changes.

use parking_lot::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::sync::{oneshot, watch};
use tokio::time::{Instant, MissedTickBehavior};

use crate::client::LogBackend;
use crate::error::{DashboardError, Result};
use crate::models::{ClearOutcome, LogRecord, StreamAction, StreamStatus};
use crate::query::FilterSpec;

/// Fixed auto-refresh cadence
pub const POLL_INTERVAL: Duration = Duration::from_secs(2);

pub const CONNECTION_ERROR: &str =
    "Unable to connect to the log server. Please check if the backend is running.";
pub const DISCONNECTED_BANNER: &str =
    "Backend disconnected. Auto-refresh is suspended until the next successful refresh.";

/// Everything a view renders
#[derive(Debug, Clone, PartialEq)]
pub struct DashboardState {
    pub logs: Vec<LogRecord>,
    pub status: Option<StreamStatus>,
    pub sources: Vec<String>,
    pub connected: bool,
    pub loading: bool,
    /// Banner for the most recent failed tick or action
    pub error: Option<String>,
    pub auto_refresh: bool,
    pub filter: FilterSpec,
    /// Keyword while in search mode
    pub search: Option<String>,
    /// Completed ticks, successful or not
    pub ticks: u64,
}

impl Default for DashboardState {
    fn default() -> Self {
        Self {
            logs: Vec::new(),
            status: None,
            sources: Vec::new(),
            connected: false,
            loading: false,
            error: None,
            auto_refresh: true,
            filter: FilterSpec::default(),
            search: None,
            ticks: 0,
        }
    }
}

impl DashboardState {
    pub fn is_paused(&self) -> bool {
        self.status.as_ref().is_some_and(|s| s.is_paused)
    }

    pub fn in_search_mode(&self) -> bool {
        self.search.is_some()
    }

    /// Whether the timer should be running
    pub fn should_poll(&self) -> bool {
        self.auto_refresh && self.connected && !self.is_paused()
    }

    /// Persistent banner shown while the backend is unreachable
    pub fn disconnected_banner(&self) -> Option<&'static str> {
        (!self.connected && self.ticks > 0).then_some(DISCONNECTED_BANNER)
    }
}

/// Handle to a polling dashboard session. Clones share the same session.
pub struct SyncClient<B: LogBackend> {
    inner: Arc<Inner<B>>,
}

impl<B: LogBackend> Clone for SyncClient<B> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

struct Inner<B> {
    backend: B,
    state: watch::Sender<DashboardState>,
    /// Held for the duration of a tick
    tick_lock: tokio::sync::Mutex<()>,
    /// Dropping the sender stops the running timer
    timer: Mutex<Option<oneshot::Sender<()>>>,
    timer_starts: AtomicU64,
    timer_stops: AtomicU64,
}

impl<B: LogBackend> SyncClient<B> {
    pub fn new(backend: B) -> Self {
        let (state, _) = watch::channel(DashboardState::default());
        Self {
            inner: Arc::new(Inner {
                backend,
                state,
                tick_lock: tokio::sync::Mutex::new(()),
                timer: Mutex::new(None),
                timer_starts: AtomicU64::new(0),
                timer_stops: AtomicU64::new(0),
            }),
        }
    }

    pub fn backend(&self) -> &B {
        &self.inner.backend
    }

    /// Snapshot of the current view state
    pub fn state(&self) -> DashboardState {
        self.inner.state.borrow().clone()
    }

    /// Receiver notified on every state change
    pub fn subscribe(&self) -> watch::Receiver<DashboardState> {
        self.inner.state.subscribe()
    }

    pub fn timer_active(&self) -> bool {
        self.inner.timer.lock().is_some()
    }

    /// How many times the timer has been started
    pub fn timer_starts(&self) -> u64 {
        self.inner.timer_starts.load(Ordering::Relaxed)
    }

    /// How many times a running timer has been stopped
    pub fn timer_stops(&self) -> u64 {
        self.inner.timer_stops.load(Ordering::Relaxed)
    }

    /// Initial load
    pub async fn start(&self) {
        self.refresh().await;
    }

    /// Run one tick
    pub async fn refresh(&self) {
        let tick = self.inner.tick_lock.lock().await;

        let (filter, search) = {
            let state = self.inner.state.borrow();
            (state.filter.clone(), state.search.clone())
        };
        self.update(|s| s.loading = true);

        let backend = &self.inner.backend;
        let logs = async {
            match &search {
                Some(keyword) => backend.search_logs(keyword, filter.limit).await,
                None => backend.get_logs(&filter).await,
            }
        };

        let (logs, status, sources) = tokio::join!(
            logs,
            backend.get_stream_status(),
            backend.get_log_sources()
        );

        match (logs, status, sources) {
            (Ok(logs), Ok(status), Ok(sources)) => {
                tracing::debug!(logs = logs.len(), paused = status.is_paused, "refresh succeeded");
                self.update(|s| {
                    s.logs = logs;
                    s.status = Some(status);
                    s.sources = sources;
                    s.connected = true;
                    s.error = None;
                    s.loading = false;
                    s.ticks += 1;
                });
            }
            (logs, status, sources) => {
                let cause = logs.err().or(status.err()).or(sources.err());
                if let Some(e) = &cause {
                    tracing::warn!(error = %e, "refresh failed");
                }
                self.update(|s| {
                    s.connected = false;
                    s.error = Some(CONNECTION_ERROR.to_string());
                    s.status = Some(StreamStatus::disconnected());
                    s.loading = false;
                    s.ticks += 1;
                });
            }
        }

        drop(tick);
        self.reconcile_timer();
    }

    /// Apply a control action, then re-read the status
    pub async fn control(&self, action: StreamAction) -> Result<StreamStatus> {
        self.ensure_connected("Cannot control stream: Backend not connected")?;

        let backend = &self.inner.backend;
        let result = async {
            backend.control_stream(action).await?;
            backend.get_stream_status().await
        }
        .await;

        match result {
            Ok(status) => {
                self.update(|s| {
                    s.status = Some(status.clone());
                    if action == StreamAction::Clear {
                        s.logs.clear();
                    }
                    s.error = None;
                });
                self.reconcile_timer();
                Ok(status)
            }
            Err(e) => {
                tracing::warn!(%action, error = %e, "stream control failed");
                self.update(|s| {
                    s.error = Some(format!("Failed to {} stream. Please try again.", action))
                });
                Err(e)
            }
        }
    }

    pub async fn pause(&self) -> Result<StreamStatus> {
        self.control(StreamAction::Pause).await
    }

    pub async fn resume(&self) -> Result<StreamStatus> {
        self.control(StreamAction::Resume).await
    }

    /// Resume a paused stream, pause a live one
    pub async fn toggle_pause(&self) -> Result<StreamStatus> {
        let paused = self.inner.state.borrow().is_paused();
        if paused {
            self.resume().await
        } else {
            self.pause().await
        }
    }

    /// Delete every record through `clearLogs`, then re-read the status
    pub async fn clear_all(&self) -> Result<ClearOutcome> {
        self.ensure_connected("Cannot clear logs: Backend not connected")?;

        let backend = &self.inner.backend;
        let result = async {
            let outcome = backend.clear_logs().await?;
            let status = backend.get_stream_status().await?;
            Ok::<_, DashboardError>((outcome, status))
        }
        .await;

        match result {
            Ok((outcome, status)) => {
                self.update(|s| {
                    s.logs.clear();
                    s.status = Some(status);
                    s.error = None;
                });
                self.reconcile_timer();
                Ok(outcome)
            }
            Err(e) => {
                tracing::warn!(error = %e, "clear logs failed");
                self.update(|s| s.error = Some("Failed to clear logs. Please try again.".into()));
                Err(e)
            }
        }
    }

    /// Switch the log query to a keyword search. Blank keywords are ignored.
    pub async fn search(&self, keyword: &str) -> Result<()> {
        self.ensure_connected("Cannot search: Backend not connected")?;

        let keyword = keyword.trim();
        if keyword.is_empty() {
            return Ok(());
        }

        let keyword = keyword.to_string();
        self.update(|s| s.search = Some(keyword));
        self.refresh().await;
        Ok(())
    }

    /// Leave search mode
    pub async fn clear_search(&self) {
        self.update(|s| s.search = None);
        let connected = self.inner.state.borrow().connected;
        if connected {
            self.refresh().await;
        }
    }

    /// Replace the filter and refresh
    pub async fn set_filter(&self, filter: FilterSpec) {
        self.update(|s| s.filter = filter);
        self.refresh().await;
    }

    pub async fn clear_filters(&self) {
        self.set_filter(FilterSpec::default()).await;
    }

    /// Enable or disable automatic polling.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn set_auto_refresh(&self, enabled: bool) {
        self.update(|s| s.auto_refresh = enabled);
        self.reconcile_timer();
    }

    /// Start or stop the timer so that exactly one runs iff polling is allowed
    pub fn reconcile_timer(&self) {
        let mut timer = self.inner.timer.lock();
        let wanted = self.inner.state.borrow().should_poll();

        match (wanted, timer.is_some()) {
            (true, false) => {
                let (stop_tx, stop_rx) = oneshot::channel();
                tokio::spawn(poll_loop(Arc::downgrade(&self.inner), stop_rx));
                *timer = Some(stop_tx);
                self.inner.timer_starts.fetch_add(1, Ordering::Relaxed);
                tracing::debug!("auto-refresh timer started");
            }
            (false, true) => {
                timer.take();
                self.inner.timer_stops.fetch_add(1, Ordering::Relaxed);
                tracing::debug!("auto-refresh timer stopped");
            }
            _ => {}
        }
    }

    fn ensure_connected(&self, message: &str) -> Result<()> {
        let connected = self.inner.state.borrow().connected;
        if connected {
            return Ok(());
        }
        self.update(|s| s.error = Some(message.to_string()));
        Err(DashboardError::NotConnected(message.to_string()))
    }

    fn update(&self, f: impl FnOnce(&mut DashboardState)) {
        self.inner.state.send_modify(f);
    }
}

/// Timer task. Holds only a weak reference so dropping every client handle
/// ends polling; a dropped stop sender ends it too.
async fn poll_loop<B: LogBackend>(inner: Weak<Inner<B>>, mut stop: oneshot::Receiver<()>) {
    let mut ticker = tokio::time::interval_at(Instant::now() + POLL_INTERVAL, POLL_INTERVAL);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            biased;
            _ = &mut stop => break,
            _ = ticker.tick() => {}
        }

        let Some(inner) = inner.upgrade() else {
            break;
        };
        SyncClient { inner }.refresh().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_state_does_not_poll() {
        let state = DashboardState::default();
        assert!(state.auto_refresh);
        assert!(!state.connected);
        assert!(!state.should_poll());
        assert_eq!(state.disconnected_banner(), None);
    }

    #[test]
    fn test_paused_status_suppresses_polling() {
        let mut state = DashboardState {
            connected: true,
            ..Default::default()
        };
        assert!(state.should_poll());

        let mut status = StreamStatus::disconnected();
        status.is_paused = true;
        state.status = Some(status);
        assert!(!state.should_poll());
    }

    #[test]
    fn test_banner_after_failed_tick() {
        let state = DashboardState {
            ticks: 1,
            ..Default::default()
        };
        assert_eq!(state.disconnected_banner(), Some(DISCONNECTED_BANNER));
    }
}
