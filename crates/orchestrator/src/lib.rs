//! Orchestrator - Scan coordination, admission control and result collection

mod coordinator;
mod limiter;
mod progress;
mod sink;

pub use coordinator::{ScanCoordinator, ScanHandle};
pub use limiter::{Admission, ConcurrencyLimiter};
pub use progress::{log_summary, ScanRunState};
pub use sink::{ResultSink, SinkSnapshot};
