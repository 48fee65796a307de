//! Core data types for the netprobe engine
//!
//! Jobs are immutable descriptions built by the caller; events and
//! summaries are what the engine hands back. Validation of job contents is
//! deferred to the coordinator so that a malformed job can still be
//! reported as an event in the result log.

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::RangeInclusive;
use std::time::{Duration, SystemTime};
use uuid::Uuid;

use crate::error::{ScanError, ScanResult};

/// Severity attached to every scan event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Info,
    Success,
    Warning,
    Error,
}

impl Severity {
    #[inline]
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Severity::Info => "info",
            Severity::Success => "success",
            Severity::Warning => "warning",
            Severity::Error => "error",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One entry of the result log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScanEvent {
    pub message: String,
    pub severity: Severity,
    pub timestamp: DateTime<Local>,
}

impl ScanEvent {
    /// Create an event stamped with the current wall-clock time.
    #[must_use]
    pub fn new<S: Into<String>>(severity: Severity, message: S) -> Self {
        Self {
            message: message.into(),
            severity,
            timestamp: Local::now(),
        }
    }

    #[inline]
    #[must_use]
    pub fn info<S: Into<String>>(message: S) -> Self {
        Self::new(Severity::Info, message)
    }

    #[inline]
    #[must_use]
    pub fn success<S: Into<String>>(message: S) -> Self {
        Self::new(Severity::Success, message)
    }

    #[inline]
    #[must_use]
    pub fn warning<S: Into<String>>(message: S) -> Self {
        Self::new(Severity::Warning, message)
    }

    #[inline]
    #[must_use]
    pub fn error<S: Into<String>>(message: S) -> Self {
        Self::new(Severity::Error, message)
    }

    /// Wall-clock time formatted as `HH:MM:SS` for display.
    #[must_use]
    pub fn time_label(&self) -> String {
        self.timestamp.format("%H:%M:%S").to_string()
    }
}

impl fmt::Display for ScanEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {:<7} {}", self.time_label(), self.severity, self.message)
    }
}

/// What a probe tested.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ProbeKind {
    PortOpen,
    Liveness,
}

/// Result of one unit of work.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProbeOutcome {
    /// `host` for liveness probes, `host:port` for port probes.
    pub target: String,
    pub success: bool,
    pub kind: ProbeKind,
}

impl ProbeOutcome {
    #[must_use]
    pub fn port(host: &str, port: u16, open: bool) -> Self {
        Self {
            target: format!("{}:{}", host, port),
            success: open,
            kind: ProbeKind::PortOpen,
        }
    }

    #[must_use]
    pub fn liveness<S: Into<String>>(host: S, alive: bool) -> Self {
        Self {
            target: host.into(),
            success: alive,
            kind: ProbeKind::Liveness,
        }
    }
}

/// Target of a scan job, kept as the raw text the caller supplied.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ScanTarget {
    /// Host name or IP literal.
    Host(String),
    /// `a.b.c.d/len`
    Cidr(String),
    /// `a.b.c.d-e.f.g.h`
    Range(String),
}

impl ScanTarget {
    #[inline]
    #[must_use]
    pub fn value(&self) -> &str {
        match self {
            ScanTarget::Host(v) | ScanTarget::Cidr(v) | ScanTarget::Range(v) => v,
        }
    }
}

impl fmt::Display for ScanTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.value())
    }
}

/// Closed port interval as supplied by the caller.
///
/// Bounds are kept wide (`u32`) so out-of-range input can be rejected with
/// the offending values rather than truncated on the way in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PortRange {
    pub start: u32,
    pub end: u32,
}

impl PortRange {
    #[inline]
    #[must_use]
    pub const fn new(start: u32, end: u32) -> Self {
        Self { start, end }
    }

    /// Check `1 <= start <= end <= 65535` and return the usable interval.
    pub fn validate(&self) -> ScanResult<RangeInclusive<u16>> {
        let invalid = || ScanError::InvalidPortRange {
            start: self.start,
            end: self.end,
        };
        if self.start == 0 || self.start > self.end {
            return Err(invalid());
        }
        let start = u16::try_from(self.start).map_err(|_| invalid())?;
        let end = u16::try_from(self.end).map_err(|_| invalid())?;
        Ok(start..=end)
    }

    /// Number of ports in the interval (0 when reversed).
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        if self.start > self.end {
            0
        } else {
            (self.end - self.start) as usize + 1
        }
    }

    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl fmt::Display for PortRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.start, self.end)
    }
}

/// Immutable description of one scan run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanJob {
    pub id: Uuid,
    pub target: ScanTarget,
    /// Present only for single-host port scans.
    pub ports: Option<PortRange>,
    /// Sweeps only: emit an explicit event for hosts that did not answer.
    pub report_unresponsive: bool,
    pub created_at: SystemTime,
}

impl ScanJob {
    fn new(target: ScanTarget, ports: Option<PortRange>) -> Self {
        Self {
            id: Uuid::new_v4(),
            target,
            ports,
            report_unresponsive: true,
            created_at: SystemTime::now(),
        }
    }

    /// TCP connect scan of `host` over `[start_port, end_port]`.
    #[must_use]
    pub fn port_scan<S: Into<String>>(host: S, start_port: u32, end_port: u32) -> Self {
        Self::new(
            ScanTarget::Host(host.into()),
            Some(PortRange::new(start_port, end_port)),
        )
    }

    /// One echo request against a single host.
    #[must_use]
    pub fn liveness_check<S: Into<String>>(host: S) -> Self {
        Self::new(ScanTarget::Host(host.into()), None)
    }

    /// Liveness sweep over every address of a CIDR block.
    #[must_use]
    pub fn cidr_sweep<S: Into<String>>(cidr: S) -> Self {
        Self::new(ScanTarget::Cidr(cidr.into()), None)
    }

    /// Liveness sweep over an explicit `IP1-IP2` range.
    #[must_use]
    pub fn range_sweep<S: Into<String>>(range: S) -> Self {
        Self::new(ScanTarget::Range(range.into()), None)
    }

    /// CIDR sweep that only reports hosts that answered.
    #[must_use]
    pub fn network_discovery<S: Into<String>>(cidr: S) -> Self {
        Self::cidr_sweep(cidr).with_report_unresponsive(false)
    }

    #[inline]
    #[must_use]
    pub fn with_report_unresponsive(mut self, report: bool) -> Self {
        self.report_unresponsive = report;
        self
    }
}

/// Lifecycle of one run: `Idle -> Running -> {Completed, Cancelled, Failed}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunState {
    Idle,
    Running,
    Completed,
    Cancelled,
    Failed,
}

impl RunState {
    #[inline]
    #[must_use]
    pub const fn is_running(&self) -> bool {
        matches!(self, RunState::Running)
    }
}

impl fmt::Display for RunState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            RunState::Idle => "idle",
            RunState::Running => "running",
            RunState::Completed => "completed",
            RunState::Cancelled => "cancelled",
            RunState::Failed => "failed",
        };
        f.write_str(s)
    }
}

/// Engine tuning.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanConfig {
    /// Upper bound on a single probe, name resolution included.
    pub probe_timeout: Duration,
    /// Admission pool size for multi-host sweeps.
    pub sweep_concurrency: usize,
    /// Maximum number of addresses taken from an explicit range.
    pub range_cap: usize,
    /// Refresh the status line every this many processed targets (0 disables).
    pub status_every: usize,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            probe_timeout: Duration::from_secs(1),
            sweep_concurrency: 50,
            range_cap: 1000,
            status_every: 25,
        }
    }
}

impl ScanConfig {
    /// Fast preset: short timeout, infrequent status updates.
    #[inline]
    #[must_use]
    pub fn fast() -> Self {
        Self {
            probe_timeout: Duration::from_millis(500),
            status_every: 100,
            ..Self::default()
        }
    }

    /// Thorough preset: longer timeout and a smaller admission pool.
    #[inline]
    #[must_use]
    pub fn thorough() -> Self {
        Self {
            probe_timeout: Duration::from_secs(2),
            sweep_concurrency: 25,
            ..Self::default()
        }
    }

    #[inline]
    #[must_use]
    pub fn with_probe_timeout(mut self, timeout: Duration) -> Self {
        self.probe_timeout = timeout;
        self
    }

    #[inline]
    #[must_use]
    pub fn with_sweep_concurrency(mut self, concurrency: usize) -> Self {
        self.sweep_concurrency = concurrency.max(1);
        self
    }

    #[inline]
    #[must_use]
    pub fn with_range_cap(mut self, cap: usize) -> Self {
        self.range_cap = cap.max(1);
        self
    }

    #[inline]
    #[must_use]
    pub fn with_status_every(mut self, every: usize) -> Self {
        self.status_every = every;
        self
    }
}

/// Terminal report of one run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanSummary {
    pub job_id: Uuid,
    pub state: RunState,
    pub scanned: usize,
    pub matched: usize,
    pub total: usize,
    /// The explicit range was cut at the safety cap.
    pub truncated: bool,
    pub elapsed: Duration,
}

impl ScanSummary {
    /// Fraction of targets processed, in `[0.0, 1.0]`.
    #[inline]
    #[must_use]
    pub fn progress(&self) -> f64 {
        if self.total == 0 {
            0.0
        } else {
            self.scanned as f64 / self.total as f64
        }
    }
}
