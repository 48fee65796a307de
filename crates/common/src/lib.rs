//! Netprobe Common - Shared types and traits
//!
//! This crate provides the data model, probe traits, configuration and
//! error types used across the netprobe scanning engine.

pub mod error;
pub mod traits;
pub mod types;

// Re-export commonly used types
pub use error::{ScanError, ScanResult};
pub use traits::{LivenessProber, PortProber};
pub use types::{
    PortRange, ProbeKind, ProbeOutcome, RunState, ScanConfig, ScanEvent, ScanJob, ScanSummary,
    ScanTarget, Severity,
};

/// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
