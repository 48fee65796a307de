// crates/orchestrator/src/coordinator.rs
//! Scan coordinator - validates jobs, dispatches probes, aggregates outcomes

use std::ops::RangeInclusive;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};
use uuid::Uuid;

use netprobe_common::{
    LivenessProber, PortProber, ProbeOutcome, RunState, ScanConfig, ScanError, ScanEvent,
    ScanJob, ScanResult, ScanSummary, ScanTarget,
};
use netprobe_target_resolver::{AddressRange, Extent};

use crate::limiter::ConcurrencyLimiter;
use crate::progress::{log_summary, ScanRunState};
use crate::sink::ResultSink;

/// Validated form of a job.
#[derive(Debug)]
enum ScanPlan {
    Ports {
        host: String,
        ports: RangeInclusive<u16>,
    },
    Liveness {
        host: String,
    },
    Sweep {
        label: String,
        range: AddressRange,
        extent: Extent,
        report_unresponsive: bool,
    },
}

impl ScanPlan {
    fn build(job: &ScanJob, config: &ScanConfig) -> ScanResult<Self> {
        match &job.target {
            ScanTarget::Host(host) => {
                let host = host.trim();
                if host.is_empty() {
                    return Err(ScanError::InvalidHost("please enter a host".into()));
                }
                match job.ports {
                    Some(ports) => Ok(ScanPlan::Ports {
                        host: host.to_string(),
                        ports: ports.validate()?,
                    }),
                    None => Ok(ScanPlan::Liveness {
                        host: host.to_string(),
                    }),
                }
            }
            target @ (ScanTarget::Cidr(_) | ScanTarget::Range(_)) => {
                if job.ports.is_some() {
                    return Err(ScanError::InvalidAddressSpec(format!(
                        "{}: port scans take a single host",
                        target
                    )));
                }
                if target.value().trim().is_empty() {
                    return Err(ScanError::InvalidAddressSpec(
                        "please enter a network or range".into(),
                    ));
                }
                let range = AddressRange::from_target(target, config.range_cap)?;
                Ok(ScanPlan::Sweep {
                    label: target.value().trim().to_string(),
                    extent: range.extent(),
                    range,
                    report_unresponsive: job.report_unresponsive,
                })
            }
        }
    }
}

/// Wording of the events a run emits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    PortScan,
    Liveness,
    PingSweep,
    Discovery,
}

impl Mode {
    fn status(self, scanned: usize, total: usize, matched: usize) -> String {
        match self {
            Mode::PortScan => format!("Scanning... {}/{} ports ({} open)", scanned, total, matched),
            Mode::Liveness => format!("Pinging... {}/{} hosts", scanned, total),
            Mode::PingSweep => format!(
                "Pinging... {}/{} hosts ({} responding)",
                scanned, total, matched
            ),
            Mode::Discovery => format!("Scanning... {}/{} hosts ({} alive)", scanned, total, matched),
        }
    }

    fn stopped(self, scanned: usize, total: usize) -> String {
        let what = match self {
            Mode::PortScan | Mode::Discovery => "Scan",
            Mode::Liveness => "Ping",
            Mode::PingSweep => "Ping sweep",
        };
        format!("{} stopped by user ({}/{} processed)", what, scanned, total)
    }

    fn complete(self, matched: usize, scanned: usize) -> String {
        match self {
            Mode::PortScan => format!(
                "Scan complete! Found {} open ports out of {} scanned",
                matched, scanned
            ),
            Mode::Liveness => format!(
                "Ping complete! {} hosts responded out of {} pinged",
                matched, scanned
            ),
            Mode::PingSweep => format!(
                "Ping sweep complete! {} hosts responded out of {} pinged",
                matched, scanned
            ),
            Mode::Discovery => format!(
                "Network scan complete! Found {} alive hosts out of {} scanned",
                matched, scanned
            ),
        }
    }

    fn sweep_outcome(self, outcome: &ProbeOutcome) -> Option<ScanEvent> {
        match (self, outcome.success) {
            (Mode::Discovery, true) => Some(ScanEvent::success(format!(
                "Host {}: ALIVE",
                outcome.target
            ))),
            (Mode::Discovery, false) => None,
            (_, true) => Some(ScanEvent::success(format!(
                "{}: ALIVE (ping successful)",
                outcome.target
            ))),
            (_, false) => Some(ScanEvent::error(format!("{}: No response", outcome.target))),
        }
    }
}

/// Moves the sink to `Failed` if a run task unwinds or is dropped before
/// reaching a terminal state.
struct FinishGuard {
    sink: ResultSink,
    armed: bool,
}

impl FinishGuard {
    fn new(sink: ResultSink) -> Self {
        Self { sink, armed: true }
    }

    fn disarm(&mut self) {
        self.armed = false;
    }
}

impl Drop for FinishGuard {
    fn drop(&mut self) {
        if self.armed {
            error!("scan task ended without a terminal state");
            self.sink.finish(
                RunState::Failed,
                ScanEvent::error("Error: scan aborted unexpectedly"),
                String::from("Scan failed"),
            );
        }
    }
}

/// Everything one run needs, owned by the spawned run task.
struct RunContext {
    job_id: Uuid,
    config: ScanConfig,
    port_prober: Arc<dyn PortProber>,
    liveness_prober: Arc<dyn LivenessProber>,
    limiter: ConcurrencyLimiter,
    sink: ResultSink,
    cancel: CancellationToken,
}

impl RunContext {
    #[instrument(skip_all, fields(job = %self.job_id))]
    async fn run(self, plan: ScanPlan) -> ScanSummary {
        let mut guard = FinishGuard::new(self.sink.clone());
        let summary = match plan {
            ScanPlan::Ports { host, ports } => self.scan_ports(&host, ports).await,
            ScanPlan::Liveness { host } => self.check_liveness(&host).await,
            ScanPlan::Sweep {
                label,
                range,
                extent,
                report_unresponsive,
            } => {
                let mode = if report_unresponsive {
                    Mode::PingSweep
                } else {
                    Mode::Discovery
                };
                self.sweep(mode, &label, range, extent).await
            }
        };
        guard.disarm();
        log_summary(&summary);
        summary
    }

    /// A probe that overruns the configured timeout counts as closed.
    async fn probe_port(&self, host: &str, port: u16) -> bool {
        timeout(self.config.probe_timeout, self.port_prober.probe_port(host, port))
            .await
            .unwrap_or(false)
    }

    async fn probe_liveness(&self, host: &str) -> bool {
        timeout(self.config.probe_timeout, self.liveness_prober.probe_liveness(host))
            .await
            .unwrap_or(false)
    }

    /// Count one processed target and refresh progress and status.
    fn record(&self, state: &ScanRunState, mode: Mode, success: bool, event: Option<ScanEvent>) {
        let (scanned, matched) = state.record(success);
        self.sink.record(state.progress(), event);

        let every = self.config.status_every;
        if every > 0 && scanned % every == 0 {
            let status = mode.status(scanned, state.total(), matched);
            debug!("{}", status);
            self.sink.set_status(status);
        }
    }

    fn stop(&self, state: &ScanRunState, mode: Mode, truncated: bool) -> ScanSummary {
        let summary = state.finish(self.job_id, RunState::Cancelled, truncated);
        self.sink.finish(
            RunState::Cancelled,
            ScanEvent::warning(mode.stopped(summary.scanned, summary.total)),
            String::from("Scan stopped"),
        );
        summary
    }

    fn complete(&self, state: &ScanRunState, mode: Mode, truncated: bool) -> ScanSummary {
        let summary = state.finish(self.job_id, RunState::Completed, truncated);
        self.sink.finish(
            RunState::Completed,
            ScanEvent::info(mode.complete(summary.matched, summary.scanned)),
            format!("Complete. {} found.", summary.matched),
        );
        summary
    }

    /// Sequential scan in ascending port order, no admission pool.
    async fn scan_ports(&self, host: &str, ports: RangeInclusive<u16>) -> ScanSummary {
        let mode = Mode::PortScan;
        let total = usize::from(*ports.end()) - usize::from(*ports.start()) + 1;
        let state = ScanRunState::new(total, self.cancel.clone());
        self.sink.append(ScanEvent::info(format!(
            "Starting port scan on {} (ports {}-{})",
            host,
            ports.start(),
            ports.end()
        )));
        self.sink.set_status("Scanning ports...");

        for port in ports {
            if state.is_cancelled() {
                return self.stop(&state, mode, false);
            }

            let open = self.probe_port(host, port).await;
            let outcome = ProbeOutcome::port(host, port, open);
            debug!(target = %outcome.target, open, "probe finished");

            let event = open.then(|| ScanEvent::success(format!("Port {}: OPEN", port)));
            self.record(&state, mode, open, event);
        }

        self.complete(&state, mode, false)
    }

    /// One echo request against one host.
    async fn check_liveness(&self, host: &str) -> ScanSummary {
        let mode = Mode::Liveness;
        let state = ScanRunState::new(1, self.cancel.clone());
        self.sink.set_status("Pinging host...");

        if state.is_cancelled() {
            return self.stop(&state, mode, false);
        }

        let alive = self.probe_liveness(host).await;
        let event = if alive {
            ScanEvent::success(format!("Host {}: ALIVE", host))
        } else {
            ScanEvent::error(format!("Host {}: NOT REACHABLE", host))
        };
        self.record(&state, mode, alive, Some(event));

        self.complete(&state, mode, false)
    }

    /// Bounded-parallel liveness sweep.
    ///
    /// Probes report over a channel to a single aggregator, which is the only
    /// writer of the run counters. Cancellation stops dispatch; admitted
    /// probes still finish and are counted before the run ends.
    async fn sweep(&self, mode: Mode, label: &str, range: AddressRange, extent: Extent) -> ScanSummary {
        let total = usize::try_from(extent.count).unwrap_or(usize::MAX);
        let state = ScanRunState::new(total, self.cancel.clone());

        let intro = match mode {
            Mode::Discovery => format!("Starting network discovery on {}", label),
            _ => format!("Starting ping sweep on {} ({} addresses)", label, total),
        };
        self.sink.append(ScanEvent::info(intro));
        if extent.truncated {
            self.sink.append(ScanEvent::warning(format!(
                "Warning: Range too large (max {} IPs), truncating",
                self.config.range_cap
            )));
        }
        self.sink.set_status("Sweeping network...");

        let (tx, mut rx) = mpsc::channel::<ProbeOutcome>(self.limiter.capacity());
        let dispatch = self.dispatch(range, tx);
        let aggregate = async {
            while let Some(outcome) = rx.recv().await {
                let event = mode.sweep_outcome(&outcome);
                self.record(&state, mode, outcome.success, event);
            }
        };
        let (cancelled, ()) = tokio::join!(dispatch, aggregate);

        if cancelled {
            info!(
                "cancelled after {} of {} targets",
                state.scanned(),
                state.total()
            );
            self.stop(&state, mode, extent.truncated)
        } else {
            self.complete(&state, mode, extent.truncated)
        }
    }

    /// Admit and spawn one probe per address. Returns true if cancelled.
    async fn dispatch(&self, range: AddressRange, tx: mpsc::Sender<ProbeOutcome>) -> bool {
        for addr in range.iter() {
            if self.cancel.is_cancelled() {
                return true;
            }

            let admission = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => None,
                admission = self.limiter.acquire() => admission,
            };
            let Some(admission) = admission else {
                return true;
            };

            let prober = self.liveness_prober.clone();
            let probe_timeout = self.config.probe_timeout;
            let tx = tx.clone();
            tokio::spawn(async move {
                let host = addr.to_string();
                // a panicking prober still yields an outcome, so the run
                // counts every admitted address
                let probe = {
                    let host = host.clone();
                    tokio::spawn(async move {
                        timeout(probe_timeout, prober.probe_liveness(&host))
                            .await
                            .unwrap_or(false)
                    })
                };
                let alive = match probe.await {
                    Ok(alive) => alive,
                    Err(e) => {
                        warn!("{}: probe task failed: {}", host, e);
                        false
                    }
                };
                admission.release();
                // receiver only goes away if the run task itself is gone
                let _ = tx.send(ProbeOutcome::liveness(host, alive)).await;
            });
        }
        false
    }
}

/// Handle to a run started with [`ScanCoordinator::start`].
#[derive(Debug)]
pub struct ScanHandle {
    job_id: Uuid,
    cancel: CancellationToken,
    task: JoinHandle<ScanSummary>,
}

impl ScanHandle {
    pub fn job_id(&self) -> Uuid {
        self.job_id
    }

    /// Request cancellation of this run. Idempotent, never blocks.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Wait for the run to reach a terminal state.
    pub async fn wait(self) -> ScanResult<ScanSummary> {
        self.task
            .await
            .map_err(|e| ScanError::Task(e.to_string()))
    }
}

/// Coordinates scan runs against a shared admission pool and result sink.
///
/// At most one run is active at a time. Each run gets its own counters and
/// cancellation token; nothing carries over from one run to the next.
pub struct ScanCoordinator {
    config: ScanConfig,
    port_prober: Arc<dyn PortProber>,
    liveness_prober: Arc<dyn LivenessProber>,
    limiter: ConcurrencyLimiter,
    sink: ResultSink,
    active: Mutex<Option<CancellationToken>>,
}

impl ScanCoordinator {
    pub fn new(
        config: ScanConfig,
        port_prober: Arc<dyn PortProber>,
        liveness_prober: Arc<dyn LivenessProber>,
    ) -> Self {
        let limiter = ConcurrencyLimiter::new(config.sweep_concurrency);
        Self {
            config,
            port_prober,
            liveness_prober,
            limiter,
            sink: ResultSink::new(),
            active: Mutex::new(None),
        }
    }

    fn active(&self) -> MutexGuard<'_, Option<CancellationToken>> {
        self.active.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Validate `job` and launch it in the background.
    ///
    /// Must be called from within a Tokio runtime. Returns immediately.
    /// Invalid input is reported as a single error event, leaves the sink in
    /// `Failed`, and is returned as the error.
    #[instrument(skip_all, fields(job = %job.id, target = %job.target))]
    pub fn start(&self, job: ScanJob) -> ScanResult<ScanHandle> {
        let mut active = self.active();
        self.sink.begin_run()?;

        let plan = match ScanPlan::build(&job, &self.config) {
            Ok(plan) => plan,
            Err(e) => {
                warn!("rejected job: {}", e);
                self.sink.finish(
                    RunState::Failed,
                    ScanEvent::error(format!("Error: {}", e)),
                    String::from("Invalid input"),
                );
                return Err(e);
            }
        };
        info!(
            prober.port = self.port_prober.name(),
            prober.liveness = self.liveness_prober.name(),
            "starting {:?}",
            plan
        );

        let cancel = CancellationToken::new();
        *active = Some(cancel.clone());
        drop(active);

        let ctx = RunContext {
            job_id: job.id,
            config: self.config.clone(),
            port_prober: self.port_prober.clone(),
            liveness_prober: self.liveness_prober.clone(),
            limiter: self.limiter.clone(),
            sink: self.sink.clone(),
            cancel: cancel.clone(),
        };
        let task = tokio::spawn(ctx.run(plan));

        Ok(ScanHandle {
            job_id: job.id,
            cancel,
            task,
        })
    }

    /// Start `job` and wait for it to finish.
    pub async fn run(&self, job: ScanJob) -> ScanResult<ScanSummary> {
        self.start(job)?.wait().await
    }

    /// Ask the active run to stop.
    ///
    /// Returns true only for the first request against a running scan. With
    /// no active run, or after an earlier request, this is a no-op.
    pub fn cancel(&self) -> bool {
        let active = self.active();
        if !self.sink.is_running() {
            return false;
        }
        match active.as_ref() {
            Some(token) if !token.is_cancelled() => {
                info!("cancellation requested");
                token.cancel();
                true
            }
            _ => false,
        }
    }

    /// Clear the result log. Refused while a run is active.
    pub fn clear(&self) -> ScanResult<()> {
        self.sink.clear()
    }

    pub fn is_running(&self) -> bool {
        self.sink.is_running()
    }

    pub fn sink(&self) -> &ResultSink {
        &self.sink
    }

    pub fn limiter(&self) -> &ConcurrencyLimiter {
        &self.limiter
    }

    pub fn config(&self) -> &ScanConfig {
        &self.config
    }
}
