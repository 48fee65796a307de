//! TCP connect prober
//!
//! Answers "is this port open" with a single connect attempt. No data is
//! exchanged and no banner is read.

mod scanner;

pub use scanner::TcpProber;
