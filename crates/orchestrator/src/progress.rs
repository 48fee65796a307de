//! Per-run counters and cancellation

use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::info;
use uuid::Uuid;

use netprobe_common::{RunState, ScanSummary};

/// Mutable state of one run. Created when the run starts and dropped when
/// it ends; nothing in here outlives or is shared with another run.
///
/// Counters are written by a single aggregator and read by anyone.
#[derive(Debug)]
pub struct ScanRunState {
    total: usize,
    scanned: AtomicUsize,
    matched: AtomicUsize,
    cancel: CancellationToken,
    started: Instant,
}

impl ScanRunState {
    pub fn new(total: usize, cancel: CancellationToken) -> Self {
        Self {
            total,
            scanned: AtomicUsize::new(0),
            matched: AtomicUsize::new(0),
            cancel,
            started: Instant::now(),
        }
    }

    /// Count one processed target. Returns `(scanned, matched)` after the update.
    pub fn record(&self, success: bool) -> (usize, usize) {
        let scanned = self.scanned.fetch_add(1, Ordering::SeqCst) + 1;
        let matched = if success {
            self.matched.fetch_add(1, Ordering::SeqCst) + 1
        } else {
            self.matched.load(Ordering::SeqCst)
        };
        (scanned, matched)
    }

    pub fn total(&self) -> usize {
        self.total
    }

    pub fn scanned(&self) -> usize {
        self.scanned.load(Ordering::SeqCst)
    }

    pub fn matched(&self) -> usize {
        self.matched.load(Ordering::SeqCst)
    }

    /// Fraction of targets processed, in `[0.0, 1.0]`.
    pub fn progress(&self) -> f64 {
        if self.total == 0 {
            0.0
        } else {
            self.scanned() as f64 / self.total as f64
        }
    }

    /// Non-blocking check of the cancellation signal.
    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Stop the clock and build the terminal summary.
    pub fn finish(&self, job_id: Uuid, state: RunState, truncated: bool) -> ScanSummary {
        ScanSummary {
            job_id,
            state,
            scanned: self.scanned(),
            matched: self.matched(),
            total: self.total,
            truncated,
            elapsed: self.started.elapsed(),
        }
    }
}

/// Log a terminal summary.
pub fn log_summary(summary: &ScanSummary) {
    info!("Scan Summary ({}):", summary.state);
    info!("  Total targets: {}", summary.total);
    info!("  Scanned: {}", summary.scanned);
    info!("  Matched: {}", summary.matched);
    if summary.truncated {
        info!("  Target list was truncated");
    }
    info!("  Elapsed: {:.2?}", summary.elapsed);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counters_track_matches() {
        let state = ScanRunState::new(4, CancellationToken::new());
        assert_eq!(state.record(false), (1, 0));
        assert_eq!(state.record(true), (2, 1));
        assert_eq!(state.record(true), (3, 2));
        assert!((state.progress() - 0.75).abs() < f64::EPSILON);

        let summary = state.finish(Uuid::new_v4(), RunState::Completed, false);
        assert_eq!(summary.scanned, 3);
        assert_eq!(summary.matched, 2);
        assert_eq!(summary.total, 4);
    }

    #[test]
    fn cancellation_is_observed_and_idempotent() {
        let token = CancellationToken::new();
        let state = ScanRunState::new(1, token.clone());
        assert!(!state.is_cancelled());
        token.cancel();
        token.cancel();
        assert!(state.is_cancelled());
    }

    #[test]
    fn empty_run_has_zero_progress() {
        let state = ScanRunState::new(0, CancellationToken::new());
        assert_eq!(state.progress(), 0.0);
    }
}
