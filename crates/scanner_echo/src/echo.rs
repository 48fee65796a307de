//! Single echo request with a hard deadline

use async_trait::async_trait;
use socket2::Type;
use std::net::IpAddr;
use std::time::Duration;
use surge_ping::{Client, Config, PingIdentifier, PingSequence, ICMP};
use tokio::time::timeout;
use tracing::{debug, instrument};

use crate::error::EchoError;
use netprobe_common::LivenessProber;

const PAYLOAD: [u8; 56] = [0; 56];

/// One-shot ICMP echo prober.
///
/// Every probe opens its own datagram socket and closes it when the probe
/// returns, so concurrent probes share nothing.
#[derive(Debug, Clone)]
pub struct EchoProber {
    timeout: Duration,
}

impl EchoProber {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the deadline for resolution plus the echo round trip.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Send one echo request and wait for its reply.
    pub async fn echo_once(&self, host: &str) -> Result<Duration, EchoError> {
        let ip = resolve(host).await?;
        let kind = match ip {
            IpAddr::V4(_) => ICMP::V4,
            IpAddr::V6(_) => ICMP::V6,
        };
        let config = Config::builder()
            .kind(kind)
            .sock_type_hint(Type::DGRAM)
            .build();
        let client = Client::new(&config)?;

        let mut pinger = client.pinger(ip, PingIdentifier(rand::random())).await;
        pinger.timeout(self.timeout);
        let (_reply, rtt) = pinger.ping(PingSequence(0), &PAYLOAD).await?;
        Ok(rtt)
    }
}

impl Default for EchoProber {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(1),
        }
    }
}

async fn resolve(host: &str) -> Result<IpAddr, EchoError> {
    let host = host.trim();
    if host.is_empty() {
        return Err(EchoError::InvalidTarget("empty host".into()));
    }
    if let Ok(ip) = host.parse::<IpAddr>() {
        return Ok(ip);
    }

    let mut addrs = tokio::net::lookup_host((host, 0))
        .await
        .map_err(|_| EchoError::Unresolved(host.to_string()))?;
    addrs
        .next()
        .map(|sa| sa.ip())
        .ok_or_else(|| EchoError::Unresolved(host.to_string()))
}

#[async_trait]
impl LivenessProber for EchoProber {
    #[instrument(level = "trace", skip(self))]
    async fn probe_liveness(&self, host: &str) -> bool {
        let outcome = match timeout(self.timeout, self.echo_once(host)).await {
            Ok(res) => res,
            Err(_) => Err(EchoError::Timeout),
        };
        match outcome {
            Ok(rtt) => {
                debug!("{} replied in {:?}", host, rtt);
                true
            }
            Err(e) => {
                debug!("{} not alive: {}", host, e);
                false
            }
        }
    }

    fn name(&self) -> &str {
        "ICMP Echo Prober"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Instant;

    #[tokio::test]
    async fn test_empty_host_is_not_alive() {
        let prober = EchoProber::new();
        assert!(!prober.probe_liveness("").await);
        assert!(matches!(
            prober.echo_once("  ").await,
            Err(EchoError::InvalidTarget(_))
        ));
    }

    #[tokio::test]
    async fn test_unresolvable_host_is_not_alive() {
        let prober = EchoProber::new().with_timeout(Duration::from_millis(500));
        assert!(!prober.probe_liveness("no-such-host.invalid").await);
    }

    #[tokio::test]
    async fn test_probe_is_bounded_by_timeout() {
        // TEST-NET-1, never routed
        let prober = EchoProber::new().with_timeout(Duration::from_millis(300));
        let started = Instant::now();
        assert!(!prober.probe_liveness("192.0.2.1").await);
        assert!(started.elapsed() < Duration::from_secs(2));
    }

    #[tokio::test]
    async fn test_resolve_literal() {
        let ip = resolve("10.1.2.3").await.unwrap();
        assert_eq!(ip, "10.1.2.3".parse::<IpAddr>().unwrap());
    }
}
