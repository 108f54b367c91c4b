//! Sharded stream checker.
//!
//! `start` opens one consumer per shard and spawns a task for each. Every task
//! keeps its own tally. `check` broadcasts the stop, joins the tasks in shard
//! order and merges their tallies into one report.

use std::mem;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use lorhammer_config::CheckerConfig;
use lorhammer_telemetry::MetricsRecorder;

use crate::matcher::Matcher;
use crate::outcome::{CheckFailure, CheckOutcome, CheckReport};
use crate::source::{Connector, ShardConsumer, ShardSession};
use crate::{Checker, CheckerError};

enum State {
    Created,
    Running {
        cancel: CancellationToken,
        tasks: Vec<(String, JoinHandle<CheckReport>)>,
        // Held so the connection outlives the consumers.
        _session: Box<dyn ShardSession>,
    },
    Finalized,
}

pub struct StreamChecker {
    config: CheckerConfig,
    matcher: Arc<Matcher>,
    connector: Arc<dyn Connector>,
    observed: Arc<AtomicUsize>,
    metrics: Option<MetricsRecorder>,
    state: State,
}

impl StreamChecker {
    /// Validates `config` and compiles every remove pattern. No connection
    /// is made until [`Checker::start`].
    pub fn new(config: CheckerConfig, connector: Arc<dyn Connector>) -> Result<Self, CheckerError> {
        let config = config.validated()?;
        let matcher = Matcher::new(&config.checks)?;
        Ok(Self {
            config,
            matcher: Arc::new(matcher),
            connector,
            observed: Arc::new(AtomicUsize::new(0)),
            metrics: None,
            state: State::Created,
        })
    }

    pub fn with_metrics(mut self, metrics: MetricsRecorder) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Messages evaluated so far across all shards.
    pub fn observed(&self) -> usize {
        self.observed.load(Ordering::Relaxed)
    }

    pub fn topic(&self) -> &str {
        &self.config.topic
    }

    async fn open_all(
        &self,
        session: &dyn ShardSession,
    ) -> Result<Vec<(String, Box<dyn ShardConsumer>)>, CheckerError> {
        let topic = &self.config.topic;
        let shards = session
            .shards(topic)
            .await
            .map_err(|source| CheckerError::Shards {
                topic: topic.clone(),
                source,
            })?;

        // On failure the consumers opened so far drop here and release their shards.
        let mut consumers = Vec::with_capacity(shards.len());
        for shard in shards {
            let consumer =
                session
                    .open(topic, &shard)
                    .await
                    .map_err(|source| CheckerError::OpenShard {
                        topic: topic.clone(),
                        shard: shard.clone(),
                        source,
                    })?;
            consumers.push((shard, consumer));
        }
        Ok(consumers)
    }

    fn record_metrics(&self, report: &CheckReport) {
        if let Some(metrics) = &self.metrics {
            metrics.check_successes.inc_by(report.successes.len() as u64);
            metrics.check_failures.inc_by(report.failures.len() as u64);
        }
    }
}

async fn consume_shard(
    shard: String,
    mut consumer: Box<dyn ShardConsumer>,
    matcher: Arc<Matcher>,
    observed: Arc<AtomicUsize>,
    cancel: CancellationToken,
) -> CheckReport {
    let mut tally = CheckReport::default();
    loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            message = consumer.recv() => match message {
                Some(payload) => {
                    let outcome = matcher.evaluate(&payload);
                    if let CheckOutcome::Failure(failure) = &outcome {
                        debug!(%shard, value = %failure.value, "Message matched no check");
                    }
                    tally.record(outcome);
                    observed.fetch_add(1, Ordering::Relaxed);
                }
                None => {
                    debug!(%shard, "Shard closed");
                    break;
                }
            }
        }
    }
    tally
}

#[async_trait]
impl Checker for StreamChecker {
    async fn start(&mut self) -> Result<(), CheckerError> {
        match self.state {
            State::Created => {}
            State::Running { .. } => return Err(CheckerError::AlreadyStarted),
            State::Finalized => return Err(CheckerError::AlreadyFinalized),
        }

        let session = self
            .connector
            .connect(&self.config.address)
            .await
            .map_err(|source| CheckerError::Connect {
                addresses: self.config.address.clone(),
                source,
            })?;
        let consumers = self.open_all(session.as_ref()).await?;

        let cancel = CancellationToken::new();
        let tasks = consumers
            .into_iter()
            .map(|(shard, consumer)| {
                let handle = tokio::spawn(consume_shard(
                    shard.clone(),
                    consumer,
                    Arc::clone(&self.matcher),
                    Arc::clone(&self.observed),
                    cancel.clone(),
                ));
                (shard, handle)
            })
            .collect::<Vec<_>>();

        info!(topic = %self.config.topic, shards = tasks.len(), "Checker started");
        self.state = State::Running {
            cancel,
            tasks,
            _session: session,
        };
        Ok(())
    }

    async fn check(&mut self) -> Result<CheckReport, CheckerError> {
        let mut report = CheckReport::default();
        match mem::replace(&mut self.state, State::Finalized) {
            State::Finalized => return Err(CheckerError::AlreadyFinalized),
            State::Created => {
                warn!(topic = %self.config.topic, "Checker finalized before it was started");
            }
            State::Running { cancel, tasks, .. } => {
                cancel.cancel();
                for (shard, handle) in tasks {
                    match handle.await {
                        Ok(tally) => report.merge(tally),
                        Err(e) => error!(%shard, error = %e, "Shard task failed"),
                    }
                }
            }
        }

        if report.is_empty() {
            report.failures.push(CheckFailure::no_messages());
        }
        self.record_metrics(&report);
        info!(
            topic = %self.config.topic,
            successes = report.successes.len(),
            failures = report.failures.len(),
            "Checker finalized"
        );
        Ok(report)
    }
}

impl Drop for StreamChecker {
    fn drop(&mut self) {
        if let State::Running { cancel, .. } = &self.state {
            cancel.cancel();
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use lorhammer_config::{CheckSpec, ConfigError};
    use tracing_test::traced_test;

    use super::*;
    use crate::memory::MemoryBroker;
    use crate::outcome::FailureReason;
    use crate::SourceError;

    const TOPIC: &str = "uplinks";

    fn config(checks: Vec<CheckSpec>) -> CheckerConfig {
        CheckerConfig {
            address: vec!["memory://local".into()],
            topic: TOPIC.into(),
            checks,
        }
    }

    fn digits_check() -> CheckSpec {
        CheckSpec {
            description: "letters only".into(),
            remove: vec!["\\d+".into()],
            text: "A".into(),
        }
    }

    fn checker(broker: &MemoryBroker) -> StreamChecker {
        StreamChecker::new(config(vec![digits_check()]), Arc::new(broker.clone())).unwrap()
    }

    async fn wait_observed(checker: &StreamChecker, expected: usize) {
        tokio::time::timeout(Duration::from_secs(5), async {
            while checker.observed() < expected {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("messages were not observed in time");
    }

    #[tokio::test]
    async fn test_matching_message_is_success() {
        let broker = MemoryBroker::new();
        broker.create_topic(TOPIC, 1);
        let mut checker = checker(&broker);
        checker.start().await.unwrap();

        assert!(broker.publish(TOPIC, 0, "A123").unwrap());
        wait_observed(&checker, 1).await;

        let report = checker.check().await.unwrap();
        assert_eq!(report.successes.len(), 1);
        assert_eq!(report.successes[0].check.description, "letters only");
        assert!(report.failures.is_empty());
        assert!(report.passed());
    }

    #[tokio::test]
    async fn test_unmatched_message_is_mismatch() {
        let broker = MemoryBroker::new();
        broker.create_topic(TOPIC, 1);
        let mut checker = checker(&broker);
        checker.start().await.unwrap();

        broker.publish(TOPIC, 0, "B").unwrap();
        wait_observed(&checker, 1).await;

        let report = checker.check().await.unwrap();
        assert!(report.successes.is_empty());
        assert_eq!(report.failures, vec![CheckFailure::mismatch("B")]);
    }

    #[tokio::test]
    #[traced_test]
    async fn test_no_messages_reported() {
        let broker = MemoryBroker::new();
        broker.create_topic(TOPIC, 2);
        let mut checker = checker(&broker);
        checker.start().await.unwrap();

        let report = checker.check().await.unwrap();
        assert!(report.successes.is_empty());
        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].reason, FailureReason::NoMessagesReceived);
        assert!(logs_contain("Checker finalized"));
    }

    #[tokio::test]
    async fn test_check_without_start() {
        let broker = MemoryBroker::new();
        let mut checker = checker(&broker);
        let report = checker.check().await.unwrap();
        assert_eq!(report.failures, vec![CheckFailure::no_messages()]);
    }

    #[tokio::test]
    async fn test_lifecycle_is_one_way() {
        let broker = MemoryBroker::new();
        broker.create_topic(TOPIC, 1);
        let mut checker = checker(&broker);
        checker.start().await.unwrap();
        assert!(matches!(
            checker.start().await,
            Err(CheckerError::AlreadyStarted)
        ));

        checker.check().await.unwrap();
        assert!(matches!(
            checker.check().await,
            Err(CheckerError::AlreadyFinalized)
        ));
        assert!(matches!(
            checker.start().await,
            Err(CheckerError::AlreadyFinalized)
        ));
    }

    #[tokio::test]
    async fn test_every_shard_is_consumed() {
        let broker = MemoryBroker::new();
        broker.create_topic(TOPIC, 4);
        let mut checker = checker(&broker);
        checker.start().await.unwrap();

        for shard in 0..4 {
            assert!(broker.is_consumed(TOPIC, shard));
            assert!(broker.publish(TOPIC, shard, format!("A{shard}")).unwrap());
        }
        wait_observed(&checker, 4).await;

        let report = checker.check().await.unwrap();
        assert_eq!(report.successes.len(), 4);
        assert!(report.failures.is_empty());
    }

    #[tokio::test]
    async fn test_stop_reaches_every_task() {
        let broker = MemoryBroker::new();
        broker.create_topic(TOPIC, 3);
        let mut checker = checker(&broker);
        checker.start().await.unwrap();
        broker.publish(TOPIC, 2, "A1").unwrap();
        wait_observed(&checker, 1).await;

        checker.check().await.unwrap();
        for shard in 0..3 {
            assert!(!broker.is_consumed(TOPIC, shard));
            assert!(!broker.publish(TOPIC, shard, "A").unwrap());
        }
        assert_eq!(checker.observed(), 1);
    }

    #[tokio::test]
    async fn test_closed_shard_keeps_tally() {
        let broker = MemoryBroker::new();
        broker.create_topic(TOPIC, 1);
        let mut checker = checker(&broker);
        checker.start().await.unwrap();
        broker.publish(TOPIC, 0, "A7").unwrap();
        broker.publish(TOPIC, 0, "C").unwrap();
        wait_observed(&checker, 2).await;
        broker.close_topic(TOPIC);

        let report = checker.check().await.unwrap();
        assert_eq!(report.successes.len(), 1);
        assert_eq!(report.failures, vec![CheckFailure::mismatch("C")]);
    }

    #[tokio::test]
    async fn test_unknown_topic() {
        let broker = MemoryBroker::new();
        let mut checker = checker(&broker);
        assert!(matches!(
            checker.start().await,
            Err(CheckerError::Shards {
                source: SourceError::UnknownTopic(_),
                ..
            })
        ));
    }

    #[tokio::test]
    async fn test_busy_shard_aborts_start() {
        let broker = MemoryBroker::new();
        broker.create_topic(TOPIC, 3);
        let _held = broker.open(TOPIC, "2").await.unwrap();

        let mut checker = checker(&broker);
        match checker.start().await {
            Err(CheckerError::OpenShard { shard, .. }) => assert_eq!(shard, "2"),
            other => panic!("unexpected result {:?}", other.err()),
        }
        assert!(!broker.is_consumed(TOPIC, 0));
        assert!(!broker.is_consumed(TOPIC, 1));
    }

    #[tokio::test]
    async fn test_drop_stops_consumers() {
        let broker = MemoryBroker::new();
        broker.create_topic(TOPIC, 1);
        let mut checker = checker(&broker);
        checker.start().await.unwrap();
        drop(checker);

        tokio::time::timeout(Duration::from_secs(5), async {
            while broker.is_consumed(TOPIC, 0) {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("consumer was not released");
    }

    #[tokio::test]
    async fn test_metrics_updated() {
        let broker = MemoryBroker::new();
        broker.create_topic(TOPIC, 1);
        let metrics = MetricsRecorder::new().unwrap();
        let mut checker = checker(&broker).with_metrics(metrics.clone());
        checker.start().await.unwrap();
        broker.publish(TOPIC, 0, "A1").unwrap();
        broker.publish(TOPIC, 0, "nope").unwrap();
        wait_observed(&checker, 2).await;
        checker.check().await.unwrap();

        assert_eq!(metrics.check_successes.get(), 1);
        assert_eq!(metrics.check_failures.get(), 1);
    }

    #[test]
    fn test_invalid_config_rejected() {
        let broker = MemoryBroker::new();
        let mut bad = config(vec![digits_check()]);
        bad.address.clear();
        assert!(matches!(
            StreamChecker::new(bad, Arc::new(broker)),
            Err(CheckerError::Config(ConfigError::Validation(_)))
        ));
    }
}
