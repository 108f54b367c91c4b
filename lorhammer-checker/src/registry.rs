//! Maps a scenario's checker `type` to the backend that serves it.

use std::collections::HashMap;
use std::sync::Arc;

use lorhammer_config::{CheckerEntry, CheckerKind};
use lorhammer_telemetry::MetricsRecorder;

use crate::source::Connector;
use crate::stream::StreamChecker;
use crate::{Checker, CheckerError};

pub struct CheckerRegistry {
    connectors: HashMap<CheckerKind, Arc<dyn Connector>>,
    metrics: Option<MetricsRecorder>,
}

impl Default for CheckerRegistry {
    fn default() -> Self {
        let registry = Self::empty();
        #[cfg(feature = "nats")]
        let registry = registry.with_connector(CheckerKind::Nats, crate::nats::NatsConnector);
        registry
    }
}

impl CheckerRegistry {
    /// A registry with no backend; every `build` fails until one is added.
    pub fn empty() -> Self {
        Self {
            connectors: HashMap::new(),
            metrics: None,
        }
    }

    pub fn with_connector(
        mut self,
        kind: CheckerKind,
        connector: impl Connector + 'static,
    ) -> Self {
        self.connectors.insert(kind, Arc::new(connector));
        self
    }

    pub fn with_metrics(mut self, metrics: MetricsRecorder) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub fn build(&self, entry: &CheckerEntry) -> Result<Box<dyn Checker>, CheckerError> {
        let connector = self
            .connectors
            .get(&entry.kind)
            .ok_or(CheckerError::UnsupportedKind(entry.kind))?;
        let mut checker = StreamChecker::new(entry.stream_config()?, Arc::clone(connector))?;
        if let Some(metrics) = &self.metrics {
            checker = checker.with_metrics(metrics.clone());
        }
        Ok(Box::new(checker))
    }

    /// Builds every entry, failing on the first invalid one.
    pub fn build_all(
        &self,
        entries: &[CheckerEntry],
    ) -> Result<Vec<Box<dyn Checker>>, CheckerError> {
        entries.iter().map(|entry| self.build(entry)).collect()
    }
}
