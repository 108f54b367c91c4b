//! # Lorhammer Telemetry
//!
//! Logging setup and in-process counters shared by gateways and checkers.

pub mod logging;
pub mod metrics;

pub use logging::EventLogger;
pub use metrics::MetricsRecorder;
