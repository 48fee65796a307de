use thiserror::Error;

/// Reasons an echo probe produced no reply. Callers fold all of these into
/// "not alive"; they only surface in debug logs.
#[derive(Error, Debug)]
pub enum EchoError {
    #[error("invalid target: {0}")]
    InvalidTarget(String),

    #[error("could not resolve {0}")]
    Unresolved(String),

    #[error("echo socket unavailable: {0}")]
    Socket(#[from] std::io::Error),

    #[error("ping failed: {0}")]
    Ping(#[from] surge_ping::SurgeError),

    #[error("timeout")]
    Timeout,
}
