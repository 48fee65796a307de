// runner.rs
use anyhow::{Context, Result};
use std::sync::Arc;
use tokio::sync::broadcast::error::{RecvError, TryRecvError};
use tracing::{info, warn};

use netprobe_common::{ScanConfig, ScanJob};
use netprobe_orchestrator::ScanCoordinator;
use netprobe_scanner_echo::EchoProber;
use netprobe_scanner_tcp::TcpProber;

use crate::args::Commands;
use crate::output::{print_event, print_report, OutputFormat};

/// Map a subcommand onto a scan job.
pub fn build_job(command: Commands) -> ScanJob {
    match command {
        Commands::Ping { host } => ScanJob::liveness_check(host),
        Commands::Portscan {
            host,
            start_port,
            end_port,
        } => ScanJob::port_scan(host, start_port, end_port),
        Commands::Netscan { network } => ScanJob::network_discovery(network),
        Commands::Pingsweep { target } => {
            // IP1-IP2 is a range, anything else is treated as CIDR
            if target.contains('-') {
                ScanJob::range_sweep(target)
            } else {
                ScanJob::cidr_sweep(target)
            }
        }
    }
}

pub async fn run_command(command: Commands, config: ScanConfig, output_format: &str) -> Result<()> {
    let format = OutputFormat::parse(output_format);
    let job = build_job(command);
    info!("Target: {}", job.target);
    info!("Probe timeout: {:?}", config.probe_timeout);
    info!("Sweep concurrency: {}", config.sweep_concurrency);

    let timeout = config.probe_timeout;
    let coordinator = Arc::new(ScanCoordinator::new(
        config,
        Arc::new(TcpProber::new().with_timeout(timeout)),
        Arc::new(EchoProber::new().with_timeout(timeout)),
    ));

    let mut events = coordinator.sink().subscribe();
    let handle = coordinator
        .start(job)
        .context("Scan was not started")?;

    // Ctrl-C stops dispatch; probes already admitted still finish
    let ctrl_c = {
        let coordinator = coordinator.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() && coordinator.cancel() {
                eprintln!("\nStopping scan, waiting for in-flight probes...");
            }
        })
    };

    let wait = handle.wait();
    tokio::pin!(wait);
    let summary = loop {
        tokio::select! {
            res = &mut wait => break res.context("Scan task failed")?,
            ev = events.recv() => match ev {
                Ok(ev) => {
                    if format == OutputFormat::Text {
                        print_event(&ev);
                    }
                }
                Err(RecvError::Lagged(n)) => warn!("display fell behind, skipped {} events", n),
                Err(RecvError::Closed) => {}
            },
        }
    };
    ctrl_c.abort();

    // events appended just before the run finished
    loop {
        match events.try_recv() {
            Ok(ev) => {
                if format == OutputFormat::Text {
                    print_event(&ev);
                }
            }
            Err(TryRecvError::Lagged(_)) => continue,
            Err(_) => break,
        }
    }

    print_report(&summary, &coordinator.sink().events(), format)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use netprobe_common::{PortRange, ScanTarget};

    #[test]
    fn ping_builds_liveness_check() {
        let job = build_job(Commands::Ping {
            host: "example.com".into(),
        });
        assert_eq!(job.target, ScanTarget::Host("example.com".into()));
        assert!(job.ports.is_none());
    }

    #[test]
    fn portscan_keeps_raw_bounds() {
        let job = build_job(Commands::Portscan {
            host: "192.168.1.1".into(),
            start_port: 1,
            end_port: 70000,
        });
        assert_eq!(job.ports, Some(PortRange::new(1, 70000)));
    }

    #[test]
    fn pingsweep_picks_range_or_cidr() {
        let job = build_job(Commands::Pingsweep {
            target: "10.0.0.1-10.0.0.9".into(),
        });
        assert!(matches!(job.target, ScanTarget::Range(_)));

        let job = build_job(Commands::Pingsweep {
            target: "10.0.0.0/24".into(),
        });
        assert!(matches!(job.target, ScanTarget::Cidr(_)));
        assert!(job.report_unresponsive);
    }

    #[test]
    fn netscan_reports_responders_only() {
        let job = build_job(Commands::Netscan {
            network: "10.0.0.0/24".into(),
        });
        assert!(!job.report_unresponsive);
    }

    #[tokio::test]
    async fn invalid_port_range_is_an_error() {
        let res = run_command(
            Commands::Portscan {
                host: "127.0.0.1".into(),
                start_port: 10,
                end_port: 1,
            },
            ScanConfig::default(),
            "text",
        )
        .await;
        assert!(res.is_err());
    }
}
