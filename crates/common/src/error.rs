//! Error types for the netprobe engine
//!
//! Only input validation and coordinator misuse surface as errors. Probe
//! failures are ordinary negative outcomes and never reach this type.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ScanError {
    #[error("Invalid address spec: {0}")]
    InvalidAddressSpec(String),

    #[error("Invalid range: {0}")]
    InvalidRange(String),

    #[error("Invalid port range {start}-{end} (ports must satisfy 1 <= start <= end <= 65535)")]
    InvalidPortRange { start: u32, end: u32 },

    #[error("Invalid host: {0}")]
    InvalidHost(String),

    #[error("A scan is already running")]
    AlreadyRunning,

    #[error("Operation not allowed while a scan is in progress")]
    ScanInProgress,

    #[error("Scan task failed: {0}")]
    Task(String),
}

impl ScanError {
    /// True for the errors that mean the job itself was malformed.
    #[must_use]
    pub fn is_invalid_input(&self) -> bool {
        matches!(
            self,
            ScanError::InvalidAddressSpec(_)
                | ScanError::InvalidRange(_)
                | ScanError::InvalidPortRange { .. }
                | ScanError::InvalidHost(_)
        )
    }
}

/// Result type alias for netprobe operations
pub type ScanResult<T> = Result<T, ScanError>;
