//! Echo-request liveness prober
//!
//! Sends exactly one unprivileged ICMP echo request (datagram socket, no
//! CAP_NET_RAW needed) and reports whether any reply arrived in time.

pub mod echo;
pub mod error;

pub use echo::EchoProber;
pub use error::EchoError;
