//! ## lorhammer-telemetry::logging
//! Structured logging through `tracing`.
//!
//! The filter comes from `RUST_LOG` and falls back to `info`.

use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Clone)]
pub struct EventLogger;

impl EventLogger {
    fn filter() -> EnvFilter {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    }

    /// Installs the global subscriber. Panics if one is already set.
    pub fn init() {
        fmt()
            .with_env_filter(Self::filter())
            .with_thread_names(true)
            .with_span_events(FmtSpan::CLOSE)
            .init()
    }

    /// Installs the global subscriber unless one is already set.
    ///
    /// Returns `false` when another subscriber won the race.
    pub fn try_init() -> bool {
        fmt()
            .with_env_filter(Self::filter())
            .with_thread_names(true)
            .with_span_events(FmtSpan::CLOSE)
            .try_init()
            .is_ok()
    }
}
