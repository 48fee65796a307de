// crates/scanner_tcp/src/scanner.rs
//! TCP connect prober implementation

use async_trait::async_trait;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::time::timeout;
use tracing::{debug, instrument};

use netprobe_common::PortProber;

/// Single-attempt TCP connect prober.
///
/// Refused, unreachable, unresolvable and timed out all read as "not open".
#[derive(Debug, Clone)]
pub struct TcpProber {
    timeout: Duration,
}

impl TcpProber {
    /// Create a new prober with the default 1s timeout.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the connect timeout (name resolution included).
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }
}

impl Default for TcpProber {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(1),
        }
    }
}

#[async_trait]
impl PortProber for TcpProber {
    #[instrument(level = "trace", skip(self))]
    async fn probe_port(&self, host: &str, port: u16) -> bool {
        match timeout(self.timeout, TcpStream::connect((host, port))).await {
            Ok(Ok(stream)) => {
                // handshake done, close without sending anything
                drop(stream);
                true
            }
            Ok(Err(e)) => {
                debug!("{}:{} not open: {}", host, port, e);
                false
            }
            Err(_) => {
                debug!("{}:{} not open: timed out after {:?}", host, port, self.timeout);
                false
            }
        }
    }

    fn name(&self) -> &str {
        "TCP Connect Prober"
    }
}
