//! Result sink - append-only event log shared with the presentation layer

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::broadcast;
use tracing::{info, warn};

use netprobe_common::{RunState, ScanError, ScanEvent, ScanResult, Severity};

const SUBSCRIBER_BUFFER: usize = 1024;

#[derive(Debug)]
struct SinkState {
    events: Vec<ScanEvent>,
    progress: f64,
    state: RunState,
    status: String,
}

/// Consistent copy of the sink taken under one lock.
#[derive(Debug, Clone)]
pub struct SinkSnapshot {
    pub events: Vec<ScanEvent>,
    pub progress: f64,
    pub state: RunState,
    pub status: String,
}

/// Lock-protected event log plus progress, run state and status line.
///
/// One mutex guards all of it so a probe completion updates them as a
/// unit. The lock is never held across an await point. Clones share state.
#[derive(Debug, Clone)]
pub struct ResultSink {
    inner: Arc<Mutex<SinkState>>,
    events_tx: broadcast::Sender<ScanEvent>,
}

impl ResultSink {
    pub fn new() -> Self {
        let (events_tx, _) = broadcast::channel(SUBSCRIBER_BUFFER);
        Self {
            inner: Arc::new(Mutex::new(SinkState {
                events: Vec::new(),
                progress: 0.0,
                state: RunState::Idle,
                status: String::from("Ready to scan"),
            })),
            events_tx,
        }
    }

    fn lock(&self) -> MutexGuard<'_, SinkState> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn push(&self, inner: &mut SinkState, event: ScanEvent) {
        match event.severity {
            Severity::Info | Severity::Success => info!("{}", event.message),
            Severity::Warning | Severity::Error => warn!("{}", event.message),
        }
        // no subscribers is fine
        let _ = self.events_tx.send(event.clone());
        inner.events.push(event);
    }

    /// Append one event. Safe from any number of tasks; arrival order is kept.
    pub fn append(&self, event: ScanEvent) {
        let mut inner = self.lock();
        self.push(&mut inner, event);
    }

    /// Update progress and optionally append an event in one step.
    pub fn record(&self, progress: f64, event: Option<ScanEvent>) {
        let mut inner = self.lock();
        inner.progress = progress.clamp(0.0, 1.0);
        if let Some(event) = event {
            self.push(&mut inner, event);
        }
    }

    /// Reset the log and mark a run as started.
    ///
    /// Fails with `AlreadyRunning` if another run holds the sink.
    pub fn begin_run(&self) -> ScanResult<()> {
        let mut inner = self.lock();
        if inner.state.is_running() {
            return Err(ScanError::AlreadyRunning);
        }
        inner.events.clear();
        inner.progress = 0.0;
        inner.state = RunState::Running;
        inner.status.clear();
        Ok(())
    }

    /// Move to a terminal state with a closing event and status line.
    pub fn finish(&self, state: RunState, event: ScanEvent, status: String) {
        let mut inner = self.lock();
        self.push(&mut inner, event);
        inner.state = state;
        inner.status = status;
    }

    /// Drop every event and reset progress. Refused while a run is active.
    pub fn clear(&self) -> ScanResult<()> {
        let mut inner = self.lock();
        if inner.state.is_running() {
            return Err(ScanError::ScanInProgress);
        }
        inner.events.clear();
        inner.progress = 0.0;
        inner.state = RunState::Idle;
        inner.status = String::from("Results cleared - Ready to scan");
        Ok(())
    }

    pub fn set_status<S: Into<String>>(&self, status: S) {
        self.lock().status = status.into();
    }

    pub fn status(&self) -> String {
        self.lock().status.clone()
    }

    pub fn state(&self) -> RunState {
        self.lock().state
    }

    pub fn is_running(&self) -> bool {
        self.lock().state.is_running()
    }

    pub fn progress(&self) -> f64 {
        self.lock().progress
    }

    pub fn events(&self) -> Vec<ScanEvent> {
        self.lock().events.clone()
    }

    pub fn len(&self) -> usize {
        self.lock().events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().events.is_empty()
    }

    pub fn snapshot(&self) -> SinkSnapshot {
        let inner = self.lock();
        SinkSnapshot {
            events: inner.events.clone(),
            progress: inner.progress,
            state: inner.state,
            status: inner.status.clone(),
        }
    }

    /// Live feed of events appended after this call.
    pub fn subscribe(&self) -> broadcast::Receiver<ScanEvent> {
        self.events_tx.subscribe()
    }
}

impl Default for ResultSink {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn append_keeps_arrival_order() {
        let sink = ResultSink::new();
        sink.append(ScanEvent::info("one"));
        sink.append(ScanEvent::success("two"));
        sink.append(ScanEvent::error("three"));

        let messages: Vec<_> = sink.events().into_iter().map(|e| e.message).collect();
        assert_eq!(messages, vec!["one", "two", "three"]);
        assert_eq!(sink.len(), 3);
    }

    #[tokio::test]
    async fn concurrent_appends_are_all_kept() {
        let sink = ResultSink::new();
        let mut handles = Vec::new();
        for t in 0..16 {
            let sink = sink.clone();
            handles.push(tokio::spawn(async move {
                for i in 0..50 {
                    sink.append(ScanEvent::info(format!("{}-{}", t, i)));
                }
            }));
        }
        for h in handles {
            h.await.unwrap();
        }
        assert_eq!(sink.len(), 16 * 50);
    }

    #[test]
    fn begin_run_refuses_second_run() {
        let sink = ResultSink::new();
        sink.append(ScanEvent::info("stale"));
        sink.begin_run().unwrap();
        assert!(sink.is_empty());
        assert!(sink.is_running());
        assert!(matches!(sink.begin_run(), Err(ScanError::AlreadyRunning)));
    }

    #[test]
    fn clear_only_when_idle() {
        let sink = ResultSink::new();
        sink.begin_run().unwrap();
        sink.record(0.5, Some(ScanEvent::success("hit")));
        assert!(matches!(sink.clear(), Err(ScanError::ScanInProgress)));

        sink.finish(RunState::Completed, ScanEvent::info("done"), "done".into());
        assert_eq!(sink.state(), RunState::Completed);
        sink.clear().unwrap();
        assert!(sink.is_empty());
        assert_eq!(sink.progress(), 0.0);
        assert_eq!(sink.state(), RunState::Idle);
    }

    #[test]
    fn record_updates_progress_and_log_together() {
        let sink = ResultSink::new();
        sink.record(0.25, None);
        sink.record(1.5, Some(ScanEvent::success("x")));
        let snap = sink.snapshot();
        assert_eq!(snap.progress, 1.0);
        assert_eq!(snap.events.len(), 1);
    }

    #[tokio::test]
    async fn subscribers_see_new_events() {
        let sink = ResultSink::new();
        sink.append(ScanEvent::info("before"));
        let mut rx = sink.subscribe();
        sink.append(ScanEvent::warning("after"));
        let ev = rx.recv().await.unwrap();
        assert_eq!(ev.message, "after");
        assert_eq!(ev.severity, Severity::Warning);
    }
}
