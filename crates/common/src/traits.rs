//! Probe traits consumed by the scan coordinator
//!
//! A probe is one timeout-bounded attempt against a single target. Both
//! traits answer with a plain boolean: every kind of failure (refused,
//! timed out, unresolvable) collapses to `false`.

use async_trait::async_trait;

/// TCP connect probe
#[async_trait]
pub trait PortProber: Send + Sync {
    /// Returns true when a handshake with `host:port` completes in time.
    async fn probe_port(&self, host: &str, port: u16) -> bool;

    /// Prober name/identifier
    fn name(&self) -> &str;
}

/// Echo-request liveness probe
#[async_trait]
pub trait LivenessProber: Send + Sync {
    /// Returns true when at least one echo reply arrives before the deadline.
    async fn probe_liveness(&self, host: &str) -> bool;

    /// Prober name/identifier
    fn name(&self) -> &str;
}
