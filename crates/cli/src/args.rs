use clap::{Parser, Subcommand};
use std::time::Duration;

use netprobe_common::ScanConfig;

#[derive(Parser)]
#[command(name = "netprobe")]
#[command(version)]
#[command(about = "Host discovery and TCP port scanning", long_about = None)]
#[command(after_help = "Examples:\n  netprobe ping google.com\n  netprobe portscan 192.168.1.1 1 1000\n  netprobe netscan 192.168.1.0/24\n  netprobe pingsweep 192.168.1.1-192.168.1.50\n\nOnly scan networks you own or have permission to test.")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Per-probe timeout in milliseconds
    #[arg(long, default_value = "1000", global = true)]
    pub timeout: u64,

    /// Max probes in flight during sweeps
    #[arg(short, long, default_value = "50", global = true)]
    pub concurrency: usize,

    /// Refresh the status line every N processed targets (0 disables)
    #[arg(long, default_value = "25", global = true)]
    pub status_every: usize,

    /// Max addresses taken from an IP1-IP2 range
    #[arg(long, default_value = "1000", global = true)]
    pub range_cap: usize,

    /// Output format: text, json
    #[arg(short, long, default_value = "text", value_parser = ["text", "json"], global = true)]
    pub output_format: String,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Send one echo request to a host
    Ping {
        /// Host name or IP address
        host: String,
    },

    /// TCP connect scan of a port range on one host
    Portscan {
        /// Host name or IP address
        host: String,
        /// First port (1-65535)
        start_port: u32,
        /// Last port (1-65535)
        end_port: u32,
    },

    /// Discover live hosts in a CIDR block (reports responders only)
    Netscan {
        /// Network in CIDR form, e.g. 192.168.1.0/24
        network: String,
    },

    /// Ping every address of a CIDR block or IP1-IP2 range
    Pingsweep {
        /// CIDR block or range, e.g. 10.0.0.0/24 or 10.0.0.1-10.0.0.50
        target: String,
    },
}

impl Cli {
    pub fn scan_config(&self) -> ScanConfig {
        ScanConfig::default()
            .with_probe_timeout(Duration::from_millis(self.timeout.max(1)))
            .with_sweep_concurrency(self.concurrency)
            .with_status_every(self.status_every)
            .with_range_cap(self.range_cap)
    }
}
