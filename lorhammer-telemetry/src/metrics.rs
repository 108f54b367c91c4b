//! ## lorhammer-telemetry::metrics
//! Load-test counters kept in a private `prometheus` registry.
//!
//! Nothing here serves HTTP; `gather_metrics` renders the text format for
//! whoever wants to expose or print it.

use prometheus::{IntCounter, IntCounterVec, Opts, Registry};

#[derive(Debug, Clone)]
pub struct MetricsRecorder {
    pub registry: Registry,
    pub push_data_sent: IntCounter,
    /// Inbound frames by kind (`push_ack`, `pull_ack`, `pull_resp`, `unknown`).
    pub packets_received: IntCounterVec,
    pub decode_errors: IntCounter,
    pub check_successes: IntCounter,
    pub check_failures: IntCounter,
}

impl MetricsRecorder {
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new();

        let push_data_sent =
            IntCounter::new("lorhammer_push_data_sent_total", "PUSH_DATA frames sent")?;
        let packets_received = IntCounterVec::new(
            Opts::new(
                "lorhammer_packets_received_total",
                "Frames received from the network server",
            ),
            &["kind"],
        )?;
        let decode_errors = IntCounter::new(
            "lorhammer_decode_errors_total",
            "Malformed frames received from the network server",
        )?;
        let check_successes =
            IntCounter::new("lorhammer_check_successes_total", "Messages matching a check")?;
        let check_failures =
            IntCounter::new("lorhammer_check_failures_total", "Messages matching no check")?;

        registry.register(Box::new(push_data_sent.clone()))?;
        registry.register(Box::new(packets_received.clone()))?;
        registry.register(Box::new(decode_errors.clone()))?;
        registry.register(Box::new(check_successes.clone()))?;
        registry.register(Box::new(check_failures.clone()))?;

        Ok(Self {
            registry,
            push_data_sent,
            packets_received,
            decode_errors,
            check_successes,
            check_failures,
        })
    }

    pub fn inc_received(&self, kind: &str) {
        self.packets_received.with_label_values(&[kind]).inc();
    }

    pub fn gather_metrics(&self) -> Result<String, prometheus::Error> {
        use prometheus::Encoder;
        let encoder = prometheus::TextEncoder::new();
        let mut buffer = Vec::<u8>::new();
        encoder.encode(&self.registry.gather(), &mut buffer)?;
        Ok(String::from_utf8_lossy(&buffer).into_owned())
    }
}
